use crate::clock::Millis;
use crate::error::AppError;
use crate::model::UserProfile;
use crate::stats::Statistics;
use crate::storage::{KeyValueStore, keys, load_record, mirror_record, save_record};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::HashMap;
use std::sync::Arc;

/// Profile key used when nobody is signed in.
pub const LOCAL_PROFILE_ID: &str = "local";
pub const MAX_AVATAR_BYTES: usize = 256 * 1024;
const MAX_DISPLAY_NAME_LEN: usize = 60;
const MAX_BIO_LEN: usize = 280;

pub struct ProfileService {
    store: Arc<dyn KeyValueStore>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn get(&self, user_id: &str) -> UserProfile {
        self.profiles()
            .remove(user_id)
            .unwrap_or_else(|| UserProfile {
                user_id: user_id.to_string(),
                ..UserProfile::default()
            })
    }

    pub fn update(
        &self,
        user_id: &str,
        display_name: Option<&str>,
        bio: Option<&str>,
    ) -> Result<UserProfile, AppError> {
        if let Some(name) = display_name {
            let name = name.trim();
            if name.is_empty() {
                return Err(AppError::invalid_input("display name is required"));
            }
            if name.chars().count() > MAX_DISPLAY_NAME_LEN {
                return Err(AppError::invalid_input(format!(
                    "display name must be at most {MAX_DISPLAY_NAME_LEN} characters"
                )));
            }
        }
        if let Some(bio) = bio
            && bio.trim().chars().count() > MAX_BIO_LEN
        {
            return Err(AppError::invalid_input(format!(
                "bio must be at most {MAX_BIO_LEN} characters"
            )));
        }

        self.modify(user_id, |profile| {
            if let Some(name) = display_name {
                profile.display_name = name.trim().to_string();
            }
            if let Some(bio) = bio {
                profile.bio = bio.trim().to_string();
            }
        })
    }

    pub fn record_login(&self, user_id: &str, display_name: &str, now: Millis) -> Result<UserProfile, AppError> {
        self.modify(user_id, |profile| {
            profile.login_count += 1;
            profile.last_login = Some(now);
            if profile.display_name.is_empty() {
                profile.display_name = display_name.to_string();
            }
        })
    }

    /// Overwrites the cached counters. Best effort: a failed write is logged
    /// and ignored.
    pub fn cache_statistics(&self, user_id: &str, stats: &Statistics) {
        let mut profiles = self.profiles();
        let profile = profiles
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile {
                user_id: user_id.to_string(),
                ..UserProfile::default()
            });
        profile.streak_days = stats.streak_days;
        profile.productivity_score = stats.productivity_score;
        profile.tasks_completed = stats.completed;
        profile.tasks_created = stats.total;
        mirror_record(self.store.as_ref(), keys::PROFILES, &profiles);
    }

    pub fn set_avatar(&self, user_id: &str, mime: &str, bytes: &[u8]) -> Result<String, AppError> {
        if bytes.is_empty() {
            return Err(AppError::invalid_input("avatar image is empty"));
        }
        if bytes.len() > MAX_AVATAR_BYTES {
            return Err(AppError::invalid_input(format!(
                "avatar must be at most {} KiB",
                MAX_AVATAR_BYTES / 1024
            )));
        }
        if !mime.starts_with("image/") {
            return Err(AppError::invalid_input("avatar must be an image"));
        }

        let data_url = format!("data:{mime};base64,{}", STANDARD.encode(bytes));
        let mut avatars = self.avatars();
        avatars.insert(user_id.to_string(), data_url.clone());
        save_record(self.store.as_ref(), keys::AVATARS, &avatars)?;
        Ok(data_url)
    }

    pub fn avatar(&self, user_id: &str) -> Option<String> {
        self.avatars().remove(user_id)
    }

    pub fn remove_avatar(&self, user_id: &str) -> Result<bool, AppError> {
        let mut avatars = self.avatars();
        let removed = avatars.remove(user_id).is_some();
        if removed {
            save_record(self.store.as_ref(), keys::AVATARS, &avatars)?;
        }
        Ok(removed)
    }

    fn modify<F>(&self, user_id: &str, change: F) -> Result<UserProfile, AppError>
    where
        F: FnOnce(&mut UserProfile),
    {
        let mut profiles = self.profiles();
        let profile = profiles
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile {
                user_id: user_id.to_string(),
                ..UserProfile::default()
            });
        change(profile);
        let updated = profile.clone();
        save_record(self.store.as_ref(), keys::PROFILES, &profiles)?;
        Ok(updated)
    }

    fn profiles(&self) -> HashMap<String, UserProfile> {
        load_record(self.store.as_ref(), keys::PROFILES).unwrap_or_default()
    }

    fn avatars(&self) -> HashMap<String, String> {
        load_record(self.store.as_ref(), keys::AVATARS).unwrap_or_default()
    }
}

/// Guesses an image MIME type from a file extension.
pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}
