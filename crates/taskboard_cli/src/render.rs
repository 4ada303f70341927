//! Plain-text rendering for the terminal. JSON output is produced directly
//! from the core types with `serde_json`.

use taskboard_core::clock::{Millis, format_local};
use taskboard_core::config::Palette;
use taskboard_core::error::AppError;
use taskboard_core::model::{Activity, Notification, Task, UserProfile};
use taskboard_core::notify::time_ago;
use taskboard_core::reminders::ActiveReminder;
use taskboard_core::stats::Statistics;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use time::UtcOffset;

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = " ")]
    status: &'static str,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Tags")]
    tags: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Reminder")]
    reminder: String,
}

#[derive(Tabled)]
struct ReminderRow {
    #[tabled(rename = "Task")]
    task_id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Fires at")]
    target: String,
}

fn check(done: bool) -> &'static str {
    if done { "[x]" } else { "[ ]" }
}

fn reminder_label(task: &Task, now: Millis, offset: UtcOffset) -> Result<String, AppError> {
    let Some(reminder) = task.reminder else {
        return Ok("-".to_string());
    };
    let at = format_local(reminder.date, offset)?;
    Ok(if reminder.notified {
        format!("{at} (sent)")
    } else if reminder.date <= now {
        format!("{at} (missed)")
    } else {
        at
    })
}

pub fn task_table(tasks: &[Task], now: Millis, offset: UtcOffset) -> Result<String, AppError> {
    if tasks.is_empty() {
        return Ok("No tasks.".to_string());
    }
    let mut rows = Vec::with_capacity(tasks.len());
    for task in tasks {
        rows.push(TaskRow {
            id: task.id.clone(),
            status: check(task.done),
            title: task.title.clone(),
            tags: task.tags.join(", "),
            created: format_local(task.created_at, offset)?,
            reminder: reminder_label(task, now, offset)?,
        });
    }
    let mut table = Table::new(rows);
    table.with(Style::psql());
    Ok(table.to_string())
}

pub fn task_detail(
    task: &Task,
    now: Millis,
    offset: UtcOffset,
    palette: &Palette,
) -> Result<String, AppError> {
    let mut lines = vec![
        format!("{} {}", check(task.done), palette.accentize(&task.title)),
        format!("  id:        {}", task.id),
        format!("  created:   {}", format_local(task.created_at, offset)?),
    ];
    if let Some(completed_at) = task.completed_at {
        lines.push(format!("  completed: {}", format_local(completed_at, offset)?));
    }
    if !task.tags.is_empty() {
        lines.push(format!("  tags:      {}", task.tags.join(", ")));
    }
    if task.reminder.is_some() {
        lines.push(format!("  reminder:  {}", reminder_label(task, now, offset)?));
    }
    Ok(lines.join("\n"))
}

pub fn reminder_table(reminders: &[ActiveReminder], offset: UtcOffset) -> Result<String, AppError> {
    if reminders.is_empty() {
        return Ok("No reminders pending in this session.".to_string());
    }
    let mut rows = Vec::with_capacity(reminders.len());
    for reminder in reminders {
        rows.push(ReminderRow {
            task_id: reminder.task_id.clone(),
            title: reminder.task_title.clone(),
            target: format_local(reminder.target, offset)?,
        });
    }
    let mut table = Table::new(rows);
    table.with(Style::psql());
    Ok(table.to_string())
}

pub fn notification_line(notification: &Notification, now: Millis, palette: &Palette) -> String {
    let marker = if notification.read { " " } else { "•" };
    let mut line = format!(
        "{marker} {} {} {}: {} ({})",
        notification.kind.glyph(),
        notification.id,
        palette.accentize(&notification.title),
        notification.message,
        time_ago(notification.timestamp, now),
    );
    if !notification.actions.is_empty() {
        let actions: Vec<String> = notification
            .actions
            .iter()
            .map(|action| action.label.clone())
            .collect();
        line.push_str(&palette.mutedize(&format!(" [{}]", actions.join(" | "))));
    }
    line
}

pub fn notification_list(
    notifications: &[Notification],
    unread: usize,
    now: Millis,
    palette: &Palette,
) -> String {
    if notifications.is_empty() {
        return "No notifications.".to_string();
    }
    let mut lines = vec![format!("Notifications ({unread} unread)")];
    lines.extend(
        notifications
            .iter()
            .map(|notification| notification_line(notification, now, palette)),
    );
    lines.join("\n")
}

pub fn activity_list(activities: &[Activity], offset: UtcOffset) -> Result<String, AppError> {
    if activities.is_empty() {
        return Ok("No activity yet.".to_string());
    }
    let mut lines = Vec::with_capacity(activities.len());
    for activity in activities {
        let mut line = format!(
            "{}  {}",
            format_local(activity.timestamp, offset)?,
            activity.kind.label()
        );
        if let Some(title) = activity.task_title.as_deref() {
            line.push_str(&format!(": {title}"));
        }
        if let Some(details) = activity.details.as_deref() {
            line.push_str(&format!(" ({details})"));
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

pub fn statistics(stats: &Statistics, palette: &Palette) -> String {
    let mut lines = vec![
        palette.accentize("Statistics"),
        format!(
            "  tasks:        {} total, {} active, {} completed",
            stats.total, stats.active, stats.completed
        ),
        format!("  completion:   {:.1}%", stats.completion_rate),
        format!(
            "  this week:    {} created, {} completed",
            stats.created_this_week, stats.completed_this_week
        ),
        format!("  productivity: {}/100", stats.productivity_score),
        format!("  streak:       {} days", stats.streak_days),
    ];
    if !stats.tag_counts.is_empty() {
        let tags: Vec<String> = stats
            .tag_counts
            .iter()
            .map(|(tag, count)| format!("{tag} {count}"))
            .collect();
        lines.push(format!("  tags:         {}", tags.join(", ")));
    }
    let activity: Vec<String> = stats
        .activity_counts
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(kind, count)| format!("{} {count}", kind.as_str()))
        .collect();
    if !activity.is_empty() {
        lines.push(format!("  activity:     {}", activity.join(", ")));
    }
    let series: Vec<String> = stats
        .daily_completions
        .iter()
        .map(|day| day.count.to_string())
        .collect();
    lines.push(palette.mutedize(&format!("  last 7 days:  {}", series.join(" "))));
    lines.join("\n")
}

pub fn profile(profile: &UserProfile, offset: UtcOffset) -> Result<String, AppError> {
    let name = if profile.display_name.is_empty() {
        "(no display name)"
    } else {
        profile.display_name.as_str()
    };
    let mut lines = vec![
        format!("{name} [{}]", profile.user_id),
        format!("  logins:       {}", profile.login_count),
    ];
    if let Some(last_login) = profile.last_login {
        lines.push(format!("  last login:   {}", format_local(last_login, offset)?));
    }
    if !profile.bio.is_empty() {
        lines.push(format!("  bio:          {}", profile.bio));
    }
    lines.push(format!(
        "  cached stats: {} completed of {}, score {}, streak {}",
        profile.tasks_completed,
        profile.tasks_created,
        profile.productivity_score,
        profile.streak_days
    ));
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::{activity_list, notification_line, task_detail, task_table};
    use taskboard_core::clock::MINUTE_MS;
    use taskboard_core::config::Palette;
    use taskboard_core::model::{Activity, ActivityKind, Reminder, Task};
    use taskboard_core::notify::feed::reminder_notification;
    use time::UtcOffset;

    const NOW: i64 = 1_766_188_800_000;

    #[test]
    fn empty_table_has_placeholder() {
        assert_eq!(task_table(&[], NOW, UtcOffset::UTC).unwrap(), "No tasks.");
    }

    #[test]
    fn table_lists_titles_and_reminder_state() {
        let mut task = Task::new("t1".into(), "Buy milk".into(), NOW);
        task.tags = vec!["Home".into()];
        task.reminder = Some(Reminder {
            date: NOW - MINUTE_MS,
            notified: false,
        });
        let table = task_table(&[task], NOW, UtcOffset::UTC).unwrap();
        assert!(table.contains("Buy milk"));
        assert!(table.contains("Home"));
        assert!(table.contains("(missed)"));
        assert!(table.contains("20/12/2025 00:00:00"));
    }

    #[test]
    fn detail_includes_completion() {
        let mut task = Task::new("t1".into(), "Ship".into(), NOW);
        task.set_done(true, NOW + MINUTE_MS);
        let detail = task_detail(&task, NOW, UtcOffset::UTC, &Palette::plain()).unwrap();
        assert!(detail.starts_with("[x] Ship"));
        assert!(detail.contains("completed: 20/12/2025 00:01:00"));
    }

    #[test]
    fn notification_line_shows_age_and_actions() {
        let notification = reminder_notification("t1", "Call mom", NOW - 5 * MINUTE_MS);
        let line = notification_line(&notification, NOW, &Palette::plain());
        assert!(line.starts_with("•"));
        assert!(line.contains("Call mom (5m)"));
        assert!(line.contains("[View task | Snooze]"));
    }

    #[test]
    fn activity_list_includes_title_and_details() {
        let activity = Activity {
            id: "a1".into(),
            kind: ActivityKind::Import,
            task_id: None,
            task_title: None,
            timestamp: NOW,
            details: Some("3 tasks (csv)".into()),
        };
        let rendered = activity_list(&[activity], UtcOffset::UTC).unwrap();
        assert!(rendered.contains("(3 tasks (csv))"));
    }
}
