pub mod activity;
pub mod app;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod id;
pub mod model;
pub mod notify;
pub mod profile;
pub mod reminders;
pub mod stats;
pub mod storage;
pub mod tasks;
pub mod transfer;

pub use app::{ActionOutcome, App, AppOptions, ImportSummary};
pub use error::AppError;
