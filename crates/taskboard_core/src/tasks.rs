use crate::clock::{DAY_MS, Millis};
use crate::error::AppError;
use crate::id::generate_id;
use crate::model::{Reminder, Task};
use crate::storage::{KeyValueStore, keys, load_record, mirror_record};
use std::sync::Arc;
use tracing::debug;

pub const SEED_TAGS: [&str; 4] = ["Trabajo", "Personal", "Urgente", "Estudio"];

const RECENT_WINDOW_MS: Millis = DAY_MS;
const OLD_THRESHOLD_MS: Millis = 7 * DAY_MS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFilter {
    All,
    Active,
    Completed,
    /// Created within the last 24 hours.
    Recent,
    /// Created more than 7 days ago.
    Old,
    Tag(String),
}

impl TaskFilter {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        if let Some(tag) = trimmed.strip_prefix("tag:") {
            let tag = tag.trim();
            if tag.is_empty() {
                return Err(AppError::invalid_input("tag filter requires a tag name"));
            }
            return Ok(TaskFilter::Tag(tag.to_string()));
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "" | "all" => Ok(TaskFilter::All),
            "active" | "pending" => Ok(TaskFilter::Active),
            "completed" | "done" => Ok(TaskFilter::Completed),
            "recent" => Ok(TaskFilter::Recent),
            "old" => Ok(TaskFilter::Old),
            other => Err(AppError::invalid_input(format!("unknown filter '{other}'"))),
        }
    }

    pub fn matches(&self, task: &Task, now: Millis) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Active => !task.done,
            TaskFilter::Completed => task.done,
            TaskFilter::Recent => now.saturating_sub(task.created_at) < RECENT_WINDOW_MS,
            TaskFilter::Old => now.saturating_sub(task.created_at) > OLD_THRESHOLD_MS,
            TaskFilter::Tag(tag) => task.has_tag(tag),
        }
    }
}

pub fn filter_tasks(tasks: &[Task], filter: &TaskFilter, search: Option<&str>, now: Millis) -> Vec<Task> {
    let needle = search
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty());

    tasks
        .iter()
        .filter(|task| filter.matches(task, now))
        .filter(|task| match needle.as_deref() {
            Some(needle) => {
                task.title.to_lowercase().contains(needle)
                    || task.tags.iter().any(|tag| tag.to_lowercase().contains(needle))
            }
            None => true,
        })
        .cloned()
        .collect()
}

/// Trims, drops blanks and removes case-insensitive duplicates, keeping the
/// first spelling.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let trimmed = tag.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        if normalized
            .iter()
            .any(|existing| existing.eq_ignore_ascii_case(trimmed))
        {
            continue;
        }
        normalized.push(trimmed.to_string());
    }
    normalized
}

fn seed_tags() -> Vec<String> {
    SEED_TAGS.iter().map(|tag| tag.to_string()).collect()
}

/// Ordered task collection plus the tag catalogue, mirrored to the store on
/// every mutation.
pub struct TaskRepository {
    store: Arc<dyn KeyValueStore>,
    tasks: Vec<Task>,
    tags: Vec<String>,
}

impl TaskRepository {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let mut tasks: Vec<Task> = load_record(store.as_ref(), keys::TASKS).unwrap_or_default();
        for task in &mut tasks {
            task.normalize();
        }
        let tags = load_record::<Vec<String>>(store.as_ref(), keys::TAGS)
            .map(normalize_tags)
            .unwrap_or_else(seed_tags);

        Self { store, tasks, tags }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn get(&self, id: &str) -> Result<&Task, AppError> {
        let trimmed_id = required_id(id)?;
        self.tasks
            .iter()
            .find(|task| task.id == trimmed_id)
            .ok_or_else(|| AppError::task_not_found(trimmed_id))
    }

    pub fn list(&self, filter: &TaskFilter, search: Option<&str>, now: Millis) -> Vec<Task> {
        filter_tasks(&self.tasks, filter, search, now)
    }

    pub fn add(&mut self, title: &str, tags: &[String], now: Millis) -> Result<Task, AppError> {
        let trimmed = required_title(title)?;
        let mut task = Task::new(generate_id(), trimmed.to_string(), now);
        task.tags = normalize_tags(tags);

        self.register_tags(&task.tags);
        self.tasks.push(task.clone());
        self.persist_tasks();
        debug!(task_id = %task.id, "task added");

        Ok(task)
    }

    pub fn edit(
        &mut self,
        id: &str,
        title: Option<&str>,
        tags: Option<&[String]>,
    ) -> Result<Task, AppError> {
        let trimmed_title = title.map(required_title).transpose()?;
        let normalized_tags = tags.map(normalize_tags);

        let task = self.find_mut(id)?;
        if let Some(title) = trimmed_title {
            task.title = title.to_string();
        }
        if let Some(tags) = normalized_tags.as_ref() {
            task.tags = tags.clone();
        }
        let updated = task.clone();

        if let Some(tags) = normalized_tags.as_ref() {
            self.register_tags(tags);
        }
        self.persist_tasks();

        Ok(updated)
    }

    pub fn set_done(&mut self, id: &str, done: bool, now: Millis) -> Result<Task, AppError> {
        let task = self.find_mut(id)?;
        if task.done == done {
            let state = if done { "completed" } else { "active" };
            return Err(AppError::invalid_input(format!("task already {state}")));
        }
        task.set_done(done, now);
        let updated = task.clone();
        self.persist_tasks();
        Ok(updated)
    }

    pub fn toggle(&mut self, id: &str, now: Millis) -> Result<Task, AppError> {
        let done = !self.get(id)?.done;
        self.set_done(id, done, now)
    }

    pub fn set_reminder(&mut self, id: &str, reminder: Option<Reminder>) -> Result<Task, AppError> {
        let task = self.find_mut(id)?;
        task.reminder = reminder;
        let updated = task.clone();
        self.persist_tasks();
        Ok(updated)
    }

    /// Flags the task's reminder as delivered. Returns false when the task or
    /// its reminder is gone.
    pub fn mark_reminder_notified(&mut self, id: &str) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == id) else {
            return false;
        };
        let Some(reminder) = task.reminder.as_mut() else {
            return false;
        };
        reminder.notified = true;
        self.persist_tasks();
        true
    }

    pub fn delete(&mut self, id: &str) -> Result<Task, AppError> {
        let trimmed_id = required_id(id)?;
        let index = self
            .tasks
            .iter()
            .position(|task| task.id == trimmed_id)
            .ok_or_else(|| AppError::task_not_found(trimmed_id))?;
        let removed = self.tasks.remove(index);
        self.persist_tasks();
        Ok(removed)
    }

    pub fn clear_done(&mut self) -> Vec<Task> {
        let (done, active): (Vec<Task>, Vec<Task>) =
            self.tasks.drain(..).partition(|task| task.done);
        self.tasks = active;
        if !done.is_empty() {
            self.persist_tasks();
        }
        done
    }

    /// Drops every task and restores the seed tags.
    pub fn reset_all(&mut self) -> Vec<Task> {
        let removed = std::mem::take(&mut self.tasks);
        self.tags = seed_tags();
        self.persist_tasks();
        self.persist_tags();
        removed
    }

    /// Wholesale replacement used by imports. `tags` of `None` keeps the
    /// current catalogue; tags used by the new tasks are always registered.
    pub fn replace_all(&mut self, mut tasks: Vec<Task>, tags: Option<Vec<String>>) {
        for task in &mut tasks {
            task.normalize();
            task.tags = normalize_tags(&task.tags);
        }
        self.tasks = tasks;
        if let Some(tags) = tags {
            self.tags = normalize_tags(tags);
        }
        let used: Vec<String> = self
            .tasks
            .iter()
            .flat_map(|task| task.tags.iter().cloned())
            .collect();
        self.register_tags(&used);
        self.persist_tasks();
        self.persist_tags();
    }

    pub fn add_tag(&mut self, tag: &str) -> Result<String, AppError> {
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            return Err(AppError::invalid_input("tag name is required"));
        }
        if self.tags.iter().any(|existing| existing.eq_ignore_ascii_case(trimmed)) {
            return Err(AppError::invalid_input(format!("tag already exists: {trimmed}")));
        }
        self.tags.push(trimmed.to_string());
        self.persist_tags();
        Ok(trimmed.to_string())
    }

    /// Removes a tag from the catalogue and strips it from every task.
    pub fn remove_tag(&mut self, tag: &str) -> Result<usize, AppError> {
        let trimmed = tag.trim();
        let index = self
            .tags
            .iter()
            .position(|existing| existing.eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| AppError::not_found(format!("tag not found: {trimmed}")))?;
        self.tags.remove(index);

        let mut stripped = 0;
        for task in &mut self.tasks {
            let before = task.tags.len();
            task.tags.retain(|existing| !existing.eq_ignore_ascii_case(trimmed));
            if task.tags.len() != before {
                stripped += 1;
            }
        }

        self.persist_tags();
        if stripped > 0 {
            self.persist_tasks();
        }
        Ok(stripped)
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut Task, AppError> {
        let trimmed_id = required_id(id)?;
        self.tasks
            .iter_mut()
            .find(|task| task.id == trimmed_id)
            .ok_or_else(|| AppError::task_not_found(trimmed_id))
    }

    fn register_tags(&mut self, tags: &[String]) {
        let mut changed = false;
        for tag in tags {
            if !self.tags.iter().any(|existing| existing.eq_ignore_ascii_case(tag)) {
                self.tags.push(tag.clone());
                changed = true;
            }
        }
        if changed {
            self.persist_tags();
        }
    }

    fn persist_tasks(&self) {
        mirror_record(self.store.as_ref(), keys::TASKS, &self.tasks);
    }

    fn persist_tags(&self) {
        mirror_record(self.store.as_ref(), keys::TAGS, &self.tags);
    }
}

fn required_id(id: &str) -> Result<&str, AppError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input("id is required"));
    }
    Ok(trimmed)
}

fn required_title(title: &str) -> Result<&str, AppError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input("title is required"));
    }
    Ok(trimmed)
}
