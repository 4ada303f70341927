use clap::{Parser, Subcommand};
use std::str::FromStr;
use taskboard_core::clock::{DAY_MS, HOUR_MS, MINUTE_MS, Millis, parse_instant};
use taskboard_core::config::ConfigOverrides;
use taskboard_core::error::AppError;
use time::UtcOffset;

#[derive(Parser, Debug)]
#[command(name = "taskboard", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Answer yes to confirmation prompts
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new task
    ///
    /// Example: taskboard add "Buy milk" --tag Personal --remind +30m
    Add {
        title: Option<String>,
        #[arg(short, long = "tag", value_name = "TAG")]
        tags: Vec<String>,
        /// When to remind: +15m, +2h, +1d, RFC 3339 or "DD/MM/YYYY HH:MM"
        #[arg(long, value_name = "WHEN")]
        remind: Option<String>,
    },
    /// Edit a task's title or tags
    ///
    /// Example: taskboard edit <id> --title "Buy oat milk"
    /// Example: taskboard edit <id> --tag Trabajo --tag Urgente
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long = "tag", value_name = "TAG")]
        tags: Vec<String>,
        /// Remove every tag from the task
        #[arg(long, conflicts_with = "tags")]
        clear_tags: bool,
    },
    /// Mark a task as completed
    Done { id: String },
    /// Mark a completed task as active again
    Undo { id: String },
    /// Flip a task between active and completed
    Toggle { id: String },
    /// Delete a task
    Delete { id: String },
    /// Show details of a task
    Show { id: String },
    /// List tasks
    ///
    /// Example: taskboard list --filter active
    /// Example: taskboard list --filter tag:Trabajo --search report
    List {
        /// all, active, completed, recent, old or tag:<name>
        #[arg(short, long, default_value = "all")]
        filter: String,
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Remove every completed task
    ClearDone,
    /// Delete all tasks and activity and restore the default tags
    Reset,
    /// List, add or remove tags
    Tags {
        #[command(subcommand)]
        action: Option<TagCommand>,
    },
    /// Set a reminder on a task
    ///
    /// Example: taskboard remind <id> +45m
    /// Example: taskboard remind <id> "24/12/2025 18:30"
    Remind { id: String, when: String },
    /// Clear a task's reminder
    Unremind { id: String },
    /// Push a task's reminder forward
    Snooze {
        id: String,
        #[arg(short, long)]
        minutes: Option<u32>,
    },
    /// List reminders armed in this session
    Reminders,
    /// Show or manage notifications
    Notifications {
        #[command(subcommand)]
        action: Option<NotificationCommand>,
    },
    /// Show recent activity
    Activity {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Show productivity statistics
    Stats,
    /// Export tasks as JSON or CSV
    ///
    /// Example: taskboard export --format csv --output tasks.csv
    Export {
        #[arg(short, long, default_value = "json")]
        format: String,
        #[arg(short, long, value_name = "PATH")]
        output: Option<String>,
    },
    /// Replace all tasks with the content of a JSON or CSV file
    Import {
        path: String,
        /// Defaults to the file extension
        #[arg(short, long)]
        format: Option<String>,
    },
    /// Create a local account
    Register {
        username: String,
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign in with a username or email
    Login {
        identifier: String,
        #[arg(long)]
        password: String,
    },
    /// End the current session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Show or edit the profile
    Profile {
        #[command(subcommand)]
        action: Option<ProfileCommand>,
    },
}

#[derive(Subcommand, Debug)]
pub enum TagCommand {
    Add { name: String },
    Remove { name: String },
}

#[derive(Subcommand, Debug)]
pub enum NotificationCommand {
    /// List notifications, newest first
    List,
    /// Mark every notification as read
    ReadAll,
    Dismiss { id: String },
    Clear,
    /// Run a notification action: view-task or snooze
    Act { id: String, action: String },
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    Show,
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        bio: Option<String>,
    },
    /// Set the avatar from an image file, or remove it
    Avatar {
        #[arg(required_unless_present = "remove")]
        path: Option<String>,
        #[arg(long)]
        remove: bool,
    },
}

pub const CONFIG_OVERRIDE_FLAG: &str = "--config-override";

/// One `--config-override KEY=VALUE` setting, already type-checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverride {
    Theme(String),
    Alias { name: String, expansion: String },
    SnoozeMinutes(u32),
    SessionTtlHours(u32),
}

impl FromStr for ConfigOverride {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| AppError::invalid_input(format!("override '{raw}' is not KEY=VALUE")))?;
        let value = value.trim();
        let key = key.trim().to_ascii_lowercase().replace('-', "_");
        let (field, sub) = match key.split_once('.') {
            Some((field, sub)) => (field.trim(), Some(sub.trim())),
            None => (key.as_str(), None),
        };

        match (field, sub) {
            ("alias" | "aliases", Some(name)) if !name.is_empty() => Ok(ConfigOverride::Alias {
                name: name.to_string(),
                expansion: value.to_string(),
            }),
            ("alias" | "aliases", _) => Err(AppError::invalid_input(
                "alias override needs a name: alias.NAME=COMMAND",
            )),
            ("theme", None) => Ok(ConfigOverride::Theme(value.to_string())),
            ("snooze_minutes", None) => {
                positive_number(value, field).map(ConfigOverride::SnoozeMinutes)
            }
            ("session_ttl_hours", None) => {
                positive_number(value, field).map(ConfigOverride::SessionTtlHours)
            }
            ("theme" | "snooze_minutes" | "session_ttl_hours", Some(_)) => {
                Err(AppError::invalid_input(format!("{field} takes no sub-key")))
            }
            (other, _) => Err(AppError::invalid_input(format!("unknown config key '{other}'"))),
        }
    }
}

/// Folds raw override strings into [`ConfigOverrides`]; later values win.
pub fn collect_overrides<'a, I>(raw: I) -> Result<ConfigOverrides, AppError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut overrides = ConfigOverrides::default();
    for entry in raw {
        match entry.parse::<ConfigOverride>()? {
            ConfigOverride::Theme(theme) => overrides.theme = Some(theme),
            ConfigOverride::Alias { name, expansion } => {
                overrides.aliases.insert(name, expansion);
            }
            ConfigOverride::SnoozeMinutes(minutes) => overrides.snooze_minutes = Some(minutes),
            ConfigOverride::SessionTtlHours(hours) => overrides.session_ttl_hours = Some(hours),
        }
    }
    Ok(overrides)
}

/// Pulls every `--config-override` value out of raw arguments, returning the
/// values and the remaining arguments.
pub fn split_config_overrides(args: Vec<String>) -> Result<(Vec<String>, Vec<String>), AppError> {
    let mut overrides = Vec::new();
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == CONFIG_OVERRIDE_FLAG {
            let value = iter.next().ok_or_else(|| {
                AppError::invalid_input(format!("{CONFIG_OVERRIDE_FLAG} requires a value"))
            })?;
            overrides.push(value);
        } else if let Some(value) = arg
            .strip_prefix(CONFIG_OVERRIDE_FLAG)
            .and_then(|tail| tail.strip_prefix('='))
        {
            overrides.push(value.to_string());
        } else {
            rest.push(arg);
        }
    }
    Ok((overrides, rest))
}

/// Resolves a reminder time. `+15m`, `+2h` and `+1d` are relative to `now`;
/// anything else goes through the absolute datetime parser.
pub fn parse_when(raw: &str, now: Millis, offset: UtcOffset) -> Result<Millis, AppError> {
    let trimmed = raw.trim();
    let Some(relative) = trimmed.strip_prefix('+') else {
        return parse_instant(trimmed, offset);
    };

    let split = relative
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(relative.len());
    let (amount, unit) = relative.split_at(split);
    let amount: i64 = amount
        .parse()
        .map_err(|_| AppError::invalid_input(format!("invalid relative time: {trimmed}")))?;
    let unit_ms = match unit.trim() {
        "" | "m" | "min" => MINUTE_MS,
        "h" => HOUR_MS,
        "d" => DAY_MS,
        other => {
            return Err(AppError::invalid_input(format!(
                "unknown time unit '{other}', use m, h or d"
            )));
        }
    };
    amount
        .checked_mul(unit_ms)
        .and_then(|offset| now.checked_add(offset))
        .ok_or_else(|| AppError::invalid_input(format!("relative time is too far away: {trimmed}")))
}

fn positive_number(value: &str, field: &str) -> Result<u32, AppError> {
    match value.parse::<u32>() {
        Ok(number) if number > 0 => Ok(number),
        _ => Err(AppError::invalid_input(format!(
            "{field} must be a positive whole number"
        ))),
    }
}
