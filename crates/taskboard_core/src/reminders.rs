//! One-shot reminder timers, at most one per task.
//!
//! Timers live only as long as the runtime that drives them: nothing here is
//! persisted, so ending the session drops every pending reminder.

use crate::clock::{MINUTE_MS, Millis, format_local_time, now_millis, to_datetime};
use crate::error::AppError;
use crate::notify::Alerter;
use crate::notify::feed::{SharedFeed, lock_feed, reminder_notification};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use time::UtcOffset;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Sent once a reminder has fired and its notification is in the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderFired {
    pub task_id: String,
    pub notification_id: String,
    pub fired_at: Millis,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledReminder {
    pub task_id: String,
    pub target: Millis,
    /// `HH:MM` of the target in local time, for the confirmation message.
    pub local_time: String,
}

/// Snapshot of a pending timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveReminder {
    pub task_id: String,
    pub task_title: String,
    pub target: Millis,
}

struct PendingTimer {
    task_title: String,
    target: Millis,
    generation: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct PendingSet {
    timers: HashMap<String, PendingTimer>,
    next_generation: u64,
}

type SharedPending = Arc<Mutex<PendingSet>>;

fn lock_pending(pending: &SharedPending) -> MutexGuard<'_, PendingSet> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct ReminderScheduler {
    pending: SharedPending,
    feed: SharedFeed,
    alerter: Arc<dyn Alerter>,
    events: Option<mpsc::UnboundedSender<ReminderFired>>,
    offset: UtcOffset,
}

impl ReminderScheduler {
    pub fn new(feed: SharedFeed, alerter: Arc<dyn Alerter>, offset: UtcOffset) -> Self {
        Self {
            pending: Arc::new(Mutex::new(PendingSet::default())),
            feed,
            alerter,
            events: None,
            offset,
        }
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<ReminderFired>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn schedule(
        &self,
        task_id: &str,
        task_title: &str,
        target: Millis,
    ) -> Result<ScheduledReminder, AppError> {
        self.schedule_from(task_id, task_title, target, now_millis())
    }

    /// Same as [`schedule`](Self::schedule) with `now + minutes`.
    pub fn snooze(
        &self,
        task_id: &str,
        task_title: &str,
        minutes: u32,
    ) -> Result<ScheduledReminder, AppError> {
        if minutes == 0 {
            return Err(AppError::invalid_input("snooze minutes must be positive"));
        }
        let now = now_millis();
        self.schedule_from(task_id, task_title, now + i64::from(minutes) * MINUTE_MS, now)
    }

    /// Fails exactly when `schedule` would reject `target`, without touching
    /// any timer.
    pub fn check_target(&self, target: Millis, now: Millis) -> Result<(), AppError> {
        if target <= now {
            return Err(AppError::invalid_input("reminder time must be in the future"));
        }
        tokio::runtime::Handle::try_current()
            .map_err(|_| AppError::io("reminders need a running async runtime"))?;
        to_datetime(target, self.offset)
            .map(|_| ())
            .map_err(|_| AppError::invalid_input(format!("reminder time is out of range: {target}")))
    }

    pub fn cancel(&self, task_id: &str) -> bool {
        let removed = lock_pending(&self.pending).timers.remove(task_id);
        match removed {
            Some(timer) => {
                timer.token.cancel();
                debug!(task_id, "reminder cancelled");
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) -> usize {
        let drained: Vec<PendingTimer> = lock_pending(&self.pending)
            .timers
            .drain()
            .map(|(_, timer)| timer)
            .collect();
        for timer in &drained {
            timer.token.cancel();
        }
        drained.len()
    }

    pub fn is_pending(&self, task_id: &str) -> bool {
        lock_pending(&self.pending).timers.contains_key(task_id)
    }

    pub fn pending(&self) -> Vec<ActiveReminder> {
        let mut active: Vec<ActiveReminder> = lock_pending(&self.pending)
            .timers
            .iter()
            .map(|(task_id, timer)| ActiveReminder {
                task_id: task_id.clone(),
                task_title: timer.task_title.clone(),
                target: timer.target,
            })
            .collect();
        active.sort_by_key(|reminder| reminder.target);
        active
    }

    fn schedule_from(
        &self,
        task_id: &str,
        task_title: &str,
        target: Millis,
        now: Millis,
    ) -> Result<ScheduledReminder, AppError> {
        self.check_target(target, now)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| AppError::io("reminders need a running async runtime"))?;
        let local_time = format_local_time(target, self.offset)?;

        let token = CancellationToken::new();
        let generation = {
            let mut pending = lock_pending(&self.pending);
            pending.next_generation += 1;
            let generation = pending.next_generation;
            let replaced = pending.timers.insert(
                task_id.to_string(),
                PendingTimer {
                    task_title: task_title.to_string(),
                    target,
                    generation,
                    token: token.clone(),
                },
            );
            if let Some(previous) = replaced {
                previous.token.cancel();
            }
            generation
        };

        let delay = Duration::from_millis((target - now) as u64);
        let firing = Firing {
            task_id: task_id.to_string(),
            task_title: task_title.to_string(),
            generation,
            pending: self.pending.clone(),
            feed: self.feed.clone(),
            alerter: self.alerter.clone(),
            events: self.events.clone(),
        };
        runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => firing.fire(),
            }
        });

        info!(task_id, target, delay_ms = delay.as_millis() as u64, "reminder scheduled");
        Ok(ScheduledReminder {
            task_id: task_id.to_string(),
            target,
            local_time,
        })
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

struct Firing {
    task_id: String,
    task_title: String,
    generation: u64,
    pending: SharedPending,
    feed: SharedFeed,
    alerter: Arc<dyn Alerter>,
    events: Option<mpsc::UnboundedSender<ReminderFired>>,
}

impl Firing {
    fn fire(self) {
        {
            let mut pending = lock_pending(&self.pending);
            match pending.timers.get(&self.task_id) {
                Some(timer) if timer.generation == self.generation => {
                    pending.timers.remove(&self.task_id);
                }
                _ => return,
            }
        }

        let now = now_millis();
        let notification = reminder_notification(&self.task_id, &self.task_title, now);
        let unread = lock_feed(&self.feed).add(notification.clone());
        info!(task_id = %self.task_id, unread, "reminder fired");

        if let Err(err) = self.alerter.alert(&notification) {
            warn!(task_id = %self.task_id, error = %err, "alert failed");
        }

        if let Some(events) = self.events {
            let _ = events.send(ReminderFired {
                task_id: self.task_id,
                notification_id: notification.id,
                fired_at: now,
            });
        }
    }
}
