//! Notification feed and the desktop alert cue raised when a reminder fires.

pub mod feed;

use crate::error::AppError;
use crate::model::Notification;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::LinuxAlerter;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::WindowsAlerter;

pub use feed::{NotificationFeed, SharedFeed, time_ago};

pub trait Alerter: Send + Sync {
    fn alert(&self, notification: &Notification) -> Result<(), AppError>;
}

pub struct NoopAlerter;

impl Alerter for NoopAlerter {
    fn alert(&self, _notification: &Notification) -> Result<(), AppError> {
        Ok(())
    }
}

/// Writes the alert to stderr with a terminal bell.
pub struct BellAlerter;

impl Alerter for BellAlerter {
    fn alert(&self, notification: &Notification) -> Result<(), AppError> {
        eprintln!(
            "\x07{} {}: {}",
            notification.kind.glyph(),
            notification.title,
            notification.message
        );
        Ok(())
    }
}

pub fn alerter_from_env() -> Box<dyn Alerter> {
    if std::env::var("TASKBOARD_DISABLE_NOTIFICATIONS").is_ok() {
        return Box::new(NoopAlerter);
    }

    match platform_alerter() {
        Ok(alerter) => alerter,
        Err(_) => Box::new(BellAlerter),
    }
}

const VIEW_ACTION: &str = "taskboard-view:";

/// Action key a desktop toast carries for "View task".
pub fn view_action(task_id: &str) -> String {
    format!("{VIEW_ACTION}{task_id}")
}

/// Task id behind a toast action key, if it is one of ours.
pub fn task_from_action(action: &str) -> Option<&str> {
    action.strip_prefix(VIEW_ACTION).filter(|id| !id.is_empty())
}

/// Opens the task in a fresh `taskboard show <id>` process; desktop callbacks
/// run outside the session that raised them.
pub fn open_task_view(task_id: &str) -> Result<(), AppError> {
    let exe = std::env::current_exe()
        .map_err(|err| AppError::io(format!("cannot locate taskboard binary: {err}")))?;
    std::process::Command::new(&exe)
        .args(["show", task_id])
        .spawn()
        .map(|_| ())
        .map_err(|err| AppError::io(format!("cannot start {}: {err}", exe.display())))
}

#[cfg(target_os = "linux")]
pub fn platform_alerter() -> Result<Box<dyn Alerter>, AppError> {
    Ok(Box::new(LinuxAlerter))
}

#[cfg(windows)]
pub fn platform_alerter() -> Result<Box<dyn Alerter>, AppError> {
    Ok(Box::new(WindowsAlerter))
}

#[cfg(not(any(target_os = "linux", windows)))]
pub fn platform_alerter() -> Result<Box<dyn Alerter>, AppError> {
    Err(AppError::invalid_data(
        "desktop notifications are not supported on this platform",
    ))
}
