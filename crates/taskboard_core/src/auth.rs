//! Simulated local accounts: registration, password check with lockout, and a
//! single session with a TTL. The store is the only state.

use crate::clock::{HOUR_MS, MINUTE_MS, Millis};
use crate::error::AppError;
use crate::id::generate_id;
use crate::model::{Session, UserAccount};
use crate::storage::{KeyValueStore, keys, load_record, save_record};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub const MAX_LOGIN_ATTEMPTS: u32 = 5;
pub const LOCKOUT_MS: Millis = 15 * MINUTE_MS;
pub const DEFAULT_SESSION_TTL_HOURS: u32 = 24;
const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Credential {
    salt: String,
    hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginAttempts {
    count: u32,
    last_attempt: Millis,
    #[serde(default)]
    locked_until: Option<Millis>,
}

pub struct AuthService {
    store: Arc<dyn KeyValueStore>,
    session_ttl_ms: Millis,
}

impl AuthService {
    pub fn new(store: Arc<dyn KeyValueStore>, session_ttl_hours: u32) -> Self {
        Self {
            store,
            session_ttl_ms: i64::from(session_ttl_hours.max(1)) * HOUR_MS,
        }
    }

    pub fn users(&self) -> Vec<UserAccount> {
        load_record(self.store.as_ref(), keys::USERS).unwrap_or_default()
    }

    pub fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        now: Millis,
    ) -> Result<UserAccount, AppError> {
        let username = username.trim();
        let email = email.trim().to_lowercase();
        if username.chars().count() < MIN_USERNAME_LEN {
            return Err(AppError::invalid_input(format!(
                "username must have at least {MIN_USERNAME_LEN} characters"
            )));
        }
        if !is_plausible_email(&email) {
            return Err(AppError::invalid_input("email address is not valid"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::invalid_input(format!(
                "password must have at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let mut users = self.users();
        if users
            .iter()
            .any(|user| user.username.eq_ignore_ascii_case(username))
        {
            return Err(AppError::invalid_input("username is already taken"));
        }
        if users.iter().any(|user| user.email == email) {
            return Err(AppError::invalid_input("email is already registered"));
        }

        let account = UserAccount {
            id: generate_id(),
            username: username.to_string(),
            email,
            created_at: now,
        };
        let mut credentials = self.credentials();
        let salt = random_salt();
        credentials.insert(
            account.id.clone(),
            Credential {
                hash: hash_password(&salt, password),
                salt,
            },
        );

        users.push(account.clone());
        save_record(self.store.as_ref(), keys::USERS, &users)?;
        save_record(self.store.as_ref(), keys::CREDENTIALS, &credentials)?;
        info!(user_id = %account.id, "account registered");
        Ok(account)
    }

    /// Checks the password against the username or email and opens a session.
    pub fn login(&self, identifier: &str, password: &str, now: Millis) -> Result<(UserAccount, Session), AppError> {
        let key = identifier.trim().to_lowercase();
        if key.is_empty() {
            return Err(AppError::invalid_input("username or email is required"));
        }

        let mut attempts = self.attempts();
        if let Some(locked_until) = attempts.get(&key).and_then(|entry| entry.locked_until)
            && locked_until > now
        {
            let minutes = (locked_until - now + MINUTE_MS - 1) / MINUTE_MS;
            return Err(AppError::invalid_input(format!(
                "too many failed attempts, try again in {minutes} min"
            )));
        }

        let user = self
            .users()
            .into_iter()
            .find(|user| user.username.to_lowercase() == key || user.email == key);
        let verified = user.as_ref().is_some_and(|user| {
            self.credentials()
                .get(&user.id)
                .is_some_and(|credential| hash_password(&credential.salt, password) == credential.hash)
        });

        let Some(user) = user.filter(|_| verified) else {
            let entry = attempts.entry(key.clone()).or_default();
            if entry.locked_until.is_some_and(|until| until <= now) {
                *entry = LoginAttempts::default();
            }
            entry.count += 1;
            entry.last_attempt = now;
            if entry.count >= MAX_LOGIN_ATTEMPTS {
                entry.locked_until = Some(now + LOCKOUT_MS);
                warn!(identifier = %key, "login locked after repeated failures");
            }
            save_record(self.store.as_ref(), keys::LOGIN_ATTEMPTS, &attempts)?;
            return Err(AppError::invalid_input("invalid credentials"));
        };

        if attempts.remove(&key).is_some() {
            save_record(self.store.as_ref(), keys::LOGIN_ATTEMPTS, &attempts)?;
        }

        let session = Session {
            token: format!("{}{}", generate_id(), random_salt()),
            user_id: user.id.clone(),
            created_at: now,
            expires_at: now + self.session_ttl_ms,
        };
        save_record(self.store.as_ref(), keys::SESSION, &session)?;
        info!(user_id = %user.id, "session opened");
        Ok((user, session))
    }

    pub fn logout(&self) -> Result<bool, AppError> {
        let had_session = self.store.get(keys::SESSION)?.is_some();
        self.store.remove(keys::SESSION)?;
        Ok(had_session)
    }

    /// The live session, dropping it when it has expired.
    pub fn session(&self, now: Millis) -> Option<Session> {
        let session: Session = load_record(self.store.as_ref(), keys::SESSION)?;
        if session.is_expired(now) {
            if let Err(err) = self.store.remove(keys::SESSION) {
                warn!(error = %err, "failed to drop expired session");
            }
            return None;
        }
        Some(session)
    }

    pub fn current_user(&self, now: Millis) -> Option<UserAccount> {
        let session = self.session(now)?;
        self.users().into_iter().find(|user| user.id == session.user_id)
    }

    fn credentials(&self) -> HashMap<String, Credential> {
        load_record(self.store.as_ref(), keys::CREDENTIALS).unwrap_or_default()
    }

    fn attempts(&self) -> HashMap<String, LoginAttempts> {
        load_record(self.store.as_ref(), keys::LOGIN_ATTEMPTS).unwrap_or_default()
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

fn random_salt() -> String {
    let bytes: [u8; 16] = rand::thread_rng().r#gen();
    to_hex(&bytes)
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    to_hex(&hasher.finalize())
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::{AuthService, LOCKOUT_MS, MAX_LOGIN_ATTEMPTS};
    use crate::clock::HOUR_MS;
    use crate::storage::{KeyValueStore, MemoryStore, keys};
    use std::sync::Arc;

    const NOW: i64 = 1_766_000_000_000;

    fn service() -> (Arc<MemoryStore>, AuthService) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), AuthService::new(store, 24))
    }

    #[test]
    fn register_validates_input() {
        let (_, auth) = service();
        assert_eq!(auth.register("ab", "a@b.co", "secret1", NOW).unwrap_err().code(), "invalid_input");
        assert_eq!(auth.register("alice", "nope", "secret1", NOW).unwrap_err().code(), "invalid_input");
        assert_eq!(auth.register("alice", "a@b.co", "short", NOW).unwrap_err().code(), "invalid_input");
    }

    #[test]
    fn register_rejects_duplicates_and_never_stores_plain_passwords() {
        let (store, auth) = service();
        auth.register("alice", "Alice@Example.com", "secret1", NOW).unwrap();

        assert!(auth.register("ALICE", "other@example.com", "secret1", NOW).is_err());
        assert!(auth.register("bob", "alice@example.com", "secret1", NOW).is_err());

        let credentials = store.get(keys::CREDENTIALS).unwrap().unwrap();
        assert!(!credentials.contains("secret1"));
    }

    #[test]
    fn login_by_username_or_email_opens_session() {
        let (_, auth) = service();
        let account = auth.register("alice", "alice@example.com", "secret1", NOW).unwrap();

        let (user, session) = auth.login("Alice", "secret1", NOW).unwrap();
        assert_eq!(user, account);
        assert_eq!(session.expires_at, NOW + 24 * HOUR_MS);
        assert_eq!(auth.current_user(NOW + 1), Some(account.clone()));

        auth.login("alice@example.com", "secret1", NOW).unwrap();
    }

    #[test]
    fn session_expires_after_ttl() {
        let (store, auth) = service();
        auth.register("alice", "alice@example.com", "secret1", NOW).unwrap();
        auth.login("alice", "secret1", NOW).unwrap();

        assert!(auth.current_user(NOW + 24 * HOUR_MS).is_none());
        assert_eq!(store.get(keys::SESSION).unwrap(), None);
    }

    #[test]
    fn repeated_failures_lock_the_account() {
        let (_, auth) = service();
        auth.register("alice", "alice@example.com", "secret1", NOW).unwrap();

        for _ in 0..MAX_LOGIN_ATTEMPTS {
            assert!(auth.login("alice", "wrong", NOW).is_err());
        }
        let err = auth.login("alice", "secret1", NOW + 1).unwrap_err();
        assert!(err.message().contains("too many failed attempts"));

        assert!(auth.login("alice", "secret1", NOW + LOCKOUT_MS + 1).is_ok());
    }

    #[test]
    fn logout_drops_session() {
        let (_, auth) = service();
        auth.register("alice", "alice@example.com", "secret1", NOW).unwrap();
        auth.login("alice", "secret1", NOW).unwrap();

        assert!(auth.logout().unwrap());
        assert!(!auth.logout().unwrap());
        assert!(auth.current_user(NOW).is_none());
    }
}
