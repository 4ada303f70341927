//! Session context: owns every collection and service and sequences the
//! side effects of each command (activity entry, reminder timers, feed).

use crate::activity::ActivityLog;
use crate::auth::{AuthService, DEFAULT_SESSION_TTL_HOURS};
use crate::clock::{Millis, local_offset, now_millis};
use crate::config::{Config, DEFAULT_SNOOZE_MINUTES};
use crate::error::AppError;
use crate::model::{
    ActionCode, Activity, ActivityKind, Notification, Reminder, Session, Task, UserAccount,
    UserProfile,
};
use crate::notify::Alerter;
use crate::notify::feed::{NotificationFeed, SharedFeed, lock_feed, task_completed_notification};
use crate::profile::{LOCAL_PROFILE_ID, ProfileService};
use crate::reminders::{ActiveReminder, ReminderFired, ReminderScheduler, ScheduledReminder};
use crate::stats::{self, Statistics};
use crate::storage::KeyValueStore;
use crate::tasks::{TaskFilter, TaskRepository};
use crate::transfer::{self, TransferFormat};
use std::sync::Arc;
use time::UtcOffset;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppOptions {
    pub snooze_minutes: u32,
    pub session_ttl_hours: u32,
    pub offset: UtcOffset,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            snooze_minutes: DEFAULT_SNOOZE_MINUTES,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            offset: local_offset(),
        }
    }
}

impl AppOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            snooze_minutes: config.snooze_minutes(),
            session_ttl_hours: config.session_ttl_hours(),
            offset: local_offset(),
        }
    }
}

/// Result of invoking a notification action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    ViewTask(Task),
    Snoozed(ScheduledReminder),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub format: TransferFormat,
    pub tasks: usize,
    pub tags: usize,
    pub activities_replaced: bool,
}

pub struct App {
    tasks: TaskRepository,
    activity: ActivityLog,
    feed: SharedFeed,
    reminders: ReminderScheduler,
    auth: AuthService,
    profiles: ProfileService,
    options: AppOptions,
}

impl App {
    /// Hydrates every collection from the store. Reminder timers start empty.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        alerter: Arc<dyn Alerter>,
        options: AppOptions,
        events: Option<mpsc::UnboundedSender<ReminderFired>>,
    ) -> Self {
        let feed = NotificationFeed::load(store.clone()).shared();
        let mut reminders = ReminderScheduler::new(feed.clone(), alerter, options.offset);
        if let Some(events) = events {
            reminders = reminders.with_events(events);
        }

        Self {
            tasks: TaskRepository::load(store.clone()),
            activity: ActivityLog::load(store.clone()),
            feed,
            reminders,
            auth: AuthService::new(store.clone(), options.session_ttl_hours),
            profiles: ProfileService::new(store),
            options,
        }
    }

    pub fn options(&self) -> &AppOptions {
        &self.options
    }

    pub fn tasks(&self) -> &[Task] {
        self.tasks.tasks()
    }

    pub fn tags(&self) -> &[String] {
        self.tasks.tags()
    }

    pub fn get_task(&self, id: &str) -> Result<Task, AppError> {
        self.tasks.get(id).cloned()
    }

    pub fn list_tasks(&self, filter: &TaskFilter, search: Option<&str>) -> Vec<Task> {
        self.tasks.list(filter, search, now_millis())
    }

    pub fn add_task(
        &mut self,
        title: &str,
        tags: &[String],
        reminder: Option<Millis>,
    ) -> Result<(Task, Option<ScheduledReminder>), AppError> {
        let now = now_millis();
        if let Some(target) = reminder {
            self.reminders.check_target(target, now)?;
        }

        let task = self.tasks.add(title, tags, now)?;
        let scheduled = match reminder {
            Some(target) => match self.set_reminder(&task.id, target) {
                Ok(scheduled) => Some(scheduled),
                Err(err) => {
                    self.tasks.delete(&task.id)?;
                    return Err(err);
                }
            },
            None => None,
        };
        let task = self.get_task(&task.id)?;
        self.activity
            .record(ActivityKind::Create, Some(&task), None, now);
        Ok((task, scheduled))
    }

    pub fn edit_task(
        &mut self,
        id: &str,
        title: Option<&str>,
        tags: Option<&[String]>,
    ) -> Result<Task, AppError> {
        if title.is_none() && tags.is_none() {
            return Err(AppError::invalid_input("nothing to change"));
        }
        let previous_title = self.tasks.get(id)?.title.clone();
        let task = self.tasks.edit(id, title, tags)?;
        let details = (previous_title != task.title).then(|| format!("was: {previous_title}"));
        self.activity
            .record(ActivityKind::Edit, Some(&task), details, now_millis());

        // Keep a pending timer's notification text in step with the title.
        if task.title != previous_title
            && let Some(active) = self
                .reminders
                .pending()
                .into_iter()
                .find(|active| active.task_id == task.id)
            && let Err(err) = self.reminders.schedule(&task.id, &task.title, active.target)
        {
            warn!(task_id = %task.id, error = %err, "reminder not renamed");
        }
        Ok(task)
    }

    pub fn complete_task(&mut self, id: &str) -> Result<Task, AppError> {
        let now = now_millis();
        let task = self.tasks.set_done(id, true, now)?;
        self.reminders.cancel(&task.id);
        self.activity
            .record(ActivityKind::Complete, Some(&task), None, now);
        lock_feed(&self.feed).add(task_completed_notification(&task.id, &task.title, now));
        Ok(task)
    }

    /// Marks the task active again. A reminder still in the future is
    /// re-armed; one whose time already passed stays silent.
    pub fn reopen_task(&mut self, id: &str) -> Result<Task, AppError> {
        let now = now_millis();
        let task = self.tasks.set_done(id, false, now)?;
        self.activity
            .record(ActivityKind::Uncomplete, Some(&task), None, now);

        if task.reminder_pending(now)
            && let Some(reminder) = task.reminder
            && let Err(err) = self.reminders.schedule(&task.id, &task.title, reminder.date)
        {
            warn!(task_id = %task.id, error = %err, "reminder not re-armed");
        }
        Ok(task)
    }

    pub fn toggle_task(&mut self, id: &str) -> Result<Task, AppError> {
        if self.tasks.get(id)?.done {
            self.reopen_task(id)
        } else {
            self.complete_task(id)
        }
    }

    pub fn delete_task(&mut self, id: &str) -> Result<Task, AppError> {
        let task = self.tasks.delete(id)?;
        self.reminders.cancel(&task.id);
        self.activity
            .record(ActivityKind::Delete, Some(&task), None, now_millis());
        Ok(task)
    }

    /// Removes every completed task. Nothing is logged when none were done.
    pub fn clear_done(&mut self) -> Vec<Task> {
        let removed = self.tasks.clear_done();
        if removed.is_empty() {
            return removed;
        }
        for task in &removed {
            self.reminders.cancel(&task.id);
        }
        self.activity.record(
            ActivityKind::ClearDone,
            None,
            Some(format!("{} tasks", removed.len())),
            now_millis(),
        );
        removed
    }

    /// Drops every task, timer and activity, restores the seed tags and
    /// leaves a single `reset_all` entry behind.
    pub fn reset_all(&mut self) -> Vec<Task> {
        self.reminders.cancel_all();
        let removed = self.tasks.reset_all();
        self.activity.clear();
        self.activity.record(
            ActivityKind::ResetAll,
            None,
            Some(format!("{} tasks", removed.len())),
            now_millis(),
        );
        info!(removed = removed.len(), "all data reset");
        removed
    }

    /// Arms a reminder for the task. A target in the past is rejected and
    /// the previously pending timer, if any, stays as it was.
    pub fn set_reminder(&mut self, id: &str, target: Millis) -> Result<ScheduledReminder, AppError> {
        let task = self.tasks.get(id)?.clone();
        if task.done {
            return Err(AppError::invalid_input("task is already completed"));
        }
        let scheduled = self.reminders.schedule(&task.id, &task.title, target)?;
        self.tasks.set_reminder(
            &task.id,
            Some(Reminder {
                date: target,
                notified: false,
            }),
        )?;
        Ok(scheduled)
    }

    pub fn clear_reminder(&mut self, id: &str) -> Result<Task, AppError> {
        let task_id = self.tasks.get(id)?.id.clone();
        self.reminders.cancel(&task_id);
        self.tasks.set_reminder(&task_id, None)
    }

    pub fn snooze(&mut self, id: &str, minutes: Option<u32>) -> Result<ScheduledReminder, AppError> {
        let task = self.tasks.get(id)?.clone();
        let minutes = minutes.unwrap_or(self.options.snooze_minutes);
        let scheduled = self.reminders.snooze(&task.id, &task.title, minutes)?;
        self.tasks.set_reminder(
            &task.id,
            Some(Reminder {
                date: scheduled.target,
                notified: false,
            }),
        )?;
        Ok(scheduled)
    }

    pub fn pending_reminders(&self) -> Vec<ActiveReminder> {
        self.reminders.pending()
    }

    /// Records delivery of a fired reminder on its task.
    pub fn handle_reminder_fired(&mut self, fired: &ReminderFired) -> Option<Task> {
        if !self.tasks.mark_reminder_notified(&fired.task_id) {
            return None;
        }
        self.tasks.get(&fired.task_id).ok().cloned()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        lock_feed(&self.feed).entries().to_vec()
    }

    pub fn unread_count(&self) -> usize {
        lock_feed(&self.feed).unread_count()
    }

    pub fn mark_all_read(&mut self) -> usize {
        lock_feed(&self.feed).mark_all_read()
    }

    pub fn dismiss_notification(&mut self, id: &str) -> Result<Notification, AppError> {
        lock_feed(&self.feed).remove(id)
    }

    pub fn clear_notifications(&mut self) -> usize {
        lock_feed(&self.feed).clear_all()
    }

    /// Runs one of the notification's actions and then removes the
    /// notification from the feed.
    pub fn invoke_action(
        &mut self,
        notification_id: &str,
        action: ActionCode,
    ) -> Result<ActionOutcome, AppError> {
        let notification = lock_feed(&self.feed)
            .get(notification_id.trim())
            .cloned()
            .ok_or_else(|| {
                AppError::not_found(format!("notification not found: {}", notification_id.trim()))
            })?;
        if !notification.actions.iter().any(|offered| offered.action == action) {
            return Err(AppError::invalid_input(
                "notification does not offer that action",
            ));
        }
        let task_id = notification
            .task_id
            .as_deref()
            .ok_or_else(|| AppError::invalid_input("notification is not linked to a task"))?;

        let outcome = match action {
            ActionCode::ViewTask => ActionOutcome::ViewTask(self.get_task(task_id)?),
            ActionCode::Snooze => ActionOutcome::Snoozed(self.snooze(task_id, None)?),
        };
        lock_feed(&self.feed).remove(&notification.id)?;
        Ok(outcome)
    }

    pub fn activities(&self, limit: Option<usize>) -> &[Activity] {
        match limit {
            Some(limit) => self.activity.recent(limit),
            None => self.activity.entries(),
        }
    }

    pub fn add_tag(&mut self, tag: &str) -> Result<String, AppError> {
        self.tasks.add_tag(tag)
    }

    pub fn remove_tag(&mut self, tag: &str) -> Result<usize, AppError> {
        self.tasks.remove_tag(tag)
    }

    /// Recomputes the metrics and refreshes the cached copy on the profile.
    pub fn statistics(&self) -> Result<Statistics, AppError> {
        let now = now_millis();
        let statistics = stats::compute(
            self.tasks.tasks(),
            self.activity.entries(),
            now,
            self.options.offset,
        )?;
        self.profiles
            .cache_statistics(&self.profile_id(now), &statistics);
        Ok(statistics)
    }

    pub fn export(&mut self, format: TransferFormat) -> Result<String, AppError> {
        let now = now_millis();
        let content = match format {
            TransferFormat::Json => transfer::export_json(
                self.tasks.tasks(),
                self.tasks.tags(),
                self.activity.entries(),
                now,
            )?,
            TransferFormat::Csv => transfer::export_csv(self.tasks.tasks(), self.options.offset)?,
        };
        self.activity.record(
            ActivityKind::Export,
            None,
            Some(format!("{} tasks ({})", self.tasks.tasks().len(), format_name(format))),
            now,
        );
        Ok(content)
    }

    /// Replaces the task collection with the file's content. Parsing happens
    /// first, so a malformed file changes nothing. Pending timers are dropped
    /// and not re-armed for imported reminders.
    pub fn import(&mut self, format: TransferFormat, raw: &str) -> Result<ImportSummary, AppError> {
        let now = now_millis();
        let (tasks, tags, activities) = match format {
            TransferFormat::Json => {
                let parsed = transfer::parse_json_import(raw)?;
                (parsed.tasks, parsed.available_tags, parsed.activities)
            }
            TransferFormat::Csv => (
                transfer::parse_csv_import(raw, self.options.offset, now)?,
                None,
                None,
            ),
        };

        self.reminders.cancel_all();
        let count = tasks.len();
        self.tasks.replace_all(tasks, tags);
        let activities_replaced = activities.is_some();
        if let Some(activities) = activities {
            self.activity.replace_all(activities);
        }
        self.activity.record(
            ActivityKind::Import,
            None,
            Some(format!("{count} tasks ({})", format_name(format))),
            now,
        );
        info!(count, format = format_name(format), "data imported");

        Ok(ImportSummary {
            format,
            tasks: count,
            tags: self.tasks.tags().len(),
            activities_replaced,
        })
    }

    pub fn register(&self, username: &str, email: &str, password: &str) -> Result<UserAccount, AppError> {
        self.auth.register(username, email, password, now_millis())
    }

    pub fn login(&self, identifier: &str, password: &str) -> Result<(UserAccount, Session), AppError> {
        let now = now_millis();
        let (user, session) = self.auth.login(identifier, password, now)?;
        self.profiles.record_login(&user.id, &user.username, now)?;
        Ok((user, session))
    }

    pub fn logout(&self) -> Result<bool, AppError> {
        self.auth.logout()
    }

    pub fn current_user(&self) -> Option<UserAccount> {
        self.auth.current_user(now_millis())
    }

    pub fn profile(&self) -> UserProfile {
        self.profiles.get(&self.profile_id(now_millis()))
    }

    pub fn update_profile(
        &self,
        display_name: Option<&str>,
        bio: Option<&str>,
    ) -> Result<UserProfile, AppError> {
        self.profiles
            .update(&self.profile_id(now_millis()), display_name, bio)
    }

    pub fn set_avatar(&self, mime: &str, bytes: &[u8]) -> Result<String, AppError> {
        self.profiles
            .set_avatar(&self.profile_id(now_millis()), mime, bytes)
    }

    pub fn avatar(&self) -> Option<String> {
        self.profiles.avatar(&self.profile_id(now_millis()))
    }

    pub fn remove_avatar(&self) -> Result<bool, AppError> {
        self.profiles.remove_avatar(&self.profile_id(now_millis()))
    }

    fn profile_id(&self, now: Millis) -> String {
        self.auth
            .current_user(now)
            .map(|user| user.id)
            .unwrap_or_else(|| LOCAL_PROFILE_ID.to_string())
    }
}

fn format_name(format: TransferFormat) -> &'static str {
    match format {
        TransferFormat::Json => "json",
        TransferFormat::Csv => "csv",
    }
}
