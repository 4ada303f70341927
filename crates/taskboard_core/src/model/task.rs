use crate::clock::Millis;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub date: Millis,
    #[serde(default)]
    pub notified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub done: bool,
    pub created_at: Millis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Millis>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder: Option<Reminder>,
}

impl Task {
    pub fn new(id: String, title: String, created_at: Millis) -> Self {
        Self {
            id,
            title,
            done: false,
            created_at,
            completed_at: None,
            tags: Vec::new(),
            reminder: None,
        }
    }

    /// Flips completion and keeps `completed_at` in step with `done`.
    pub fn set_done(&mut self, done: bool, now: Millis) {
        self.done = done;
        self.completed_at = if done { Some(now) } else { None };
    }

    /// Repairs records where `completed_at` and `done` disagree.
    pub fn normalize(&mut self) {
        match (self.done, self.completed_at) {
            (true, None) => self.completed_at = Some(self.created_at),
            (false, Some(_)) => self.completed_at = None,
            _ => {}
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|existing| existing.eq_ignore_ascii_case(tag))
    }

    /// Whether the reminder is still waiting to fire at `now`.
    pub fn reminder_pending(&self, now: Millis) -> bool {
        matches!(self.reminder, Some(reminder) if !reminder.notified && reminder.date > now)
    }
}
