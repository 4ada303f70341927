use crate::clock::Millis;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: String,
    pub username: String,
    pub email: String,
    pub created_at: Millis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub created_at: Millis,
    pub expires_at: Millis,
}

impl Session {
    pub fn is_expired(&self, now: Millis) -> bool {
        now >= self.expires_at
    }
}

/// Profile record. The counters below `bio` are a statistics cache and are
/// overwritten on every statistics read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub login_count: u32,
    #[serde(default)]
    pub last_login: Option<Millis>,
    #[serde(default)]
    pub streak_days: u32,
    #[serde(default)]
    pub productivity_score: u8,
    #[serde(default)]
    pub tasks_completed: usize,
    #[serde(default)]
    pub tasks_created: usize,
}
