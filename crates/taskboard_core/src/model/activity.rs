use crate::clock::Millis;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Create,
    Edit,
    Complete,
    Uncomplete,
    Delete,
    ClearDone,
    ResetAll,
    Export,
    Import,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 9] = [
        ActivityKind::Create,
        ActivityKind::Edit,
        ActivityKind::Complete,
        ActivityKind::Uncomplete,
        ActivityKind::Delete,
        ActivityKind::ClearDone,
        ActivityKind::ResetAll,
        ActivityKind::Export,
        ActivityKind::Import,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::Create => "create",
            ActivityKind::Edit => "edit",
            ActivityKind::Complete => "complete",
            ActivityKind::Uncomplete => "uncomplete",
            ActivityKind::Delete => "delete",
            ActivityKind::ClearDone => "clear_done",
            ActivityKind::ResetAll => "reset_all",
            ActivityKind::Export => "export",
            ActivityKind::Import => "import",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActivityKind::Create => "Task created",
            ActivityKind::Edit => "Task edited",
            ActivityKind::Complete => "Task completed",
            ActivityKind::Uncomplete => "Task reopened",
            ActivityKind::Delete => "Task deleted",
            ActivityKind::ClearDone => "Completed tasks cleared",
            ActivityKind::ResetAll => "All data reset",
            ActivityKind::Export => "Data exported",
            ActivityKind::Import => "Data imported",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_title: Option<String>,
    pub timestamp: Millis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
