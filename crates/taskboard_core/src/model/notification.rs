use crate::clock::Millis;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Reminder,
    TaskCompleted,
    System,
    Warning,
    Info,
}

impl NotificationKind {
    pub fn icon(self) -> &'static str {
        match self {
            NotificationKind::Reminder => "fa-bell",
            NotificationKind::TaskCompleted => "fa-check-circle",
            NotificationKind::System => "fa-cog",
            NotificationKind::Warning => "fa-exclamation-triangle",
            NotificationKind::Info => "fa-info-circle",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            NotificationKind::Reminder => "#f59e0b",
            NotificationKind::TaskCompleted => "#10b981",
            NotificationKind::System => "#6366f1",
            NotificationKind::Warning => "#ef4444",
            NotificationKind::Info => "#3b82f6",
        }
    }

    /// Single-glyph marker for terminal output.
    pub fn glyph(self) -> &'static str {
        match self {
            NotificationKind::Reminder => "⏰",
            NotificationKind::TaskCompleted => "✔",
            NotificationKind::System => "⚙",
            NotificationKind::Warning => "⚠",
            NotificationKind::Info => "ℹ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCode {
    ViewTask,
    Snooze,
}

impl ActionCode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "view_task" | "view" => Some(ActionCode::ViewTask),
            "snooze" => Some(ActionCode::Snooze),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStyle {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub label: String,
    pub action: ActionCode,
    pub style: ActionStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub timestamp: Millis,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
}
