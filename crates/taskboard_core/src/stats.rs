//! Read-time metrics derived from tasks and activities. Nothing here is a
//! system of record; callers may cache the result but never read it back.

use crate::clock::{DAY_MS, Millis, local_date};
use crate::error::AppError;
use crate::model::{Activity, ActivityKind, Task};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use time::{Date, UtcOffset};

const WEEK_MS: Millis = 7 * DAY_MS;
const SERIES_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyCount {
    pub date: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    /// Percentage in [0, 100], one decimal.
    pub completion_rate: f64,
    pub created_this_week: usize,
    pub completed_this_week: usize,
    pub productivity_score: u8,
    pub streak_days: u32,
    pub tag_counts: BTreeMap<String, usize>,
    pub activity_counts: BTreeMap<ActivityKind, usize>,
    pub daily_completions: Vec<DailyCount>,
}

pub fn compute(
    tasks: &[Task],
    activities: &[Activity],
    now: Millis,
    offset: UtcOffset,
) -> Result<Statistics, AppError> {
    let total = tasks.len();
    let completed = tasks.iter().filter(|task| task.done).count();
    let week_start = now - WEEK_MS;

    let created_this_week = tasks
        .iter()
        .filter(|task| task.created_at >= week_start && task.created_at <= now)
        .count();
    let completed_this_week = tasks
        .iter()
        .filter_map(|task| task.completed_at)
        .filter(|completed_at| *completed_at >= week_start && *completed_at <= now)
        .count();

    let mut tag_counts = BTreeMap::new();
    for tag in tasks.iter().flat_map(|task| task.tags.iter()) {
        *tag_counts.entry(tag.clone()).or_insert(0) += 1;
    }

    let mut activity_counts: BTreeMap<ActivityKind, usize> =
        ActivityKind::ALL.iter().map(|kind| (*kind, 0)).collect();
    for activity in activities {
        *activity_counts.entry(activity.kind).or_insert(0) += 1;
    }

    let rate = completion_rate(total, completed);
    Ok(Statistics {
        total,
        active: total - completed,
        completed,
        completion_rate: (rate * 10.0).round() / 10.0,
        created_this_week,
        completed_this_week,
        productivity_score: productivity_score(
            total,
            completed,
            created_this_week,
            completed_this_week,
        ),
        streak_days: streak_days(tasks, now, offset)?,
        tag_counts,
        activity_counts,
        daily_completions: daily_completions(tasks, now, offset)?,
    })
}

pub fn completion_rate(total: usize, completed: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64 * 100.0
    }
}

/// `min(100, round(rate * 0.6 + min(created * 5, 30) + min(completed * 10, 10)))`.
pub fn productivity_score(
    total: usize,
    completed: usize,
    recent_created: usize,
    recent_completed: usize,
) -> u8 {
    let rate = completion_rate(total, completed);
    let created_points = (recent_created as f64 * 5.0).min(30.0);
    let completed_points = (recent_completed as f64 * 10.0).min(10.0);
    let score = (rate * 0.6 + created_points + completed_points).round();
    score.clamp(0.0, 100.0) as u8
}

/// Consecutive local calendar days ending today with at least one completion.
pub fn streak_days(tasks: &[Task], now: Millis, offset: UtcOffset) -> Result<u32, AppError> {
    let mut days: BTreeSet<Date> = BTreeSet::new();
    for completed_at in tasks
        .iter()
        .filter(|task| task.done)
        .filter_map(|task| task.completed_at)
    {
        days.insert(local_date(completed_at, offset)?);
    }

    let mut streak = 0;
    let mut day = Some(local_date(now, offset)?);
    while let Some(current) = day {
        if !days.contains(&current) {
            break;
        }
        streak += 1;
        day = current.previous_day();
    }
    Ok(streak)
}

/// Completions per local day for the trailing week, oldest first.
fn daily_completions(
    tasks: &[Task],
    now: Millis,
    offset: UtcOffset,
) -> Result<Vec<DailyCount>, AppError> {
    let today = local_date(now, offset)?;
    let mut counts: BTreeMap<Date, usize> = BTreeMap::new();
    for completed_at in tasks.iter().filter_map(|task| task.completed_at) {
        *counts.entry(local_date(completed_at, offset)?).or_insert(0) += 1;
    }

    let mut series = Vec::with_capacity(SERIES_DAYS as usize);
    for back in (0..SERIES_DAYS).rev() {
        let Some(date) = today.checked_sub(time::Duration::days(back)) else {
            continue;
        };
        series.push(DailyCount {
            date: date.to_string(),
            count: counts.get(&date).copied().unwrap_or(0),
        });
    }
    Ok(series)
}
