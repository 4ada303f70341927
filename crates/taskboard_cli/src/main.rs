use clap::{CommandFactory, Parser};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use taskboard_cli::cli::{
    Cli, Command, NotificationCommand, ProfileCommand, TagCommand, collect_overrides, parse_when,
    split_config_overrides,
};
use taskboard_cli::render;
use taskboard_core::clock::{format_local, now_millis};
use taskboard_core::config::{Config, Palette, load_config};
use taskboard_core::error::AppError;
use taskboard_core::model::{ActionCode, Task};
use taskboard_core::notify::alerter_from_env;
use taskboard_core::profile::mime_for_extension;
use taskboard_core::reminders::ReminderFired;
use taskboard_core::storage::JsonDirStore;
use taskboard_core::storage::json_store::data_dir;
use taskboard_core::tasks::TaskFilter;
use taskboard_core::transfer::TransferFormat;
use taskboard_core::{ActionOutcome, App, AppOptions};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_ENV_VAR: &str = "TASKBOARD_LOG";

struct Session {
    app: App,
    config: Config,
    palette: Palette,
}

/// Line source shared by the interactive loop and confirmation prompts.
struct Console {
    lines: Lines<BufReader<Stdin>>,
}

impl Console {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    async fn next_line(&mut self) -> Result<Option<String>, AppError> {
        self.lines
            .next_line()
            .await
            .map_err(|err| AppError::io(err.to_string()))
    }

    /// Asks on stderr; anything but `y`/`yes` (or end of input) declines.
    async fn confirm(&mut self, question: &str) -> Result<bool, AppError> {
        eprint!("{question} [y/N] ");
        let answer = self.next_line().await?.unwrap_or_default();
        Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}

enum Input {
    Line(Option<String>),
    Fired(ReminderFired),
}

fn init_tracing() {
    let filter = [LOG_ENV_VAR, "RUST_LOG"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find_map(|raw| {
            let raw = raw.trim();
            if raw.is_empty() {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new("off"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn print_task(task: &Task, json: bool, verb: &str) -> Result<(), AppError> {
    if json {
        print_json(task)
    } else {
        println!("{verb} task: {} ({})", task.title, task.id);
        Ok(())
    }
}

/// Keeps clap's headline without its `error:` prefix.
fn clap_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let headline = rendered
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("invalid command");
    AppError::invalid_input(headline.trim_start_matches("error:").trim())
}

/// Splits a REPL line into words. Double quotes group words and may be
/// empty; inside them `\"` and `\\` are escapes, other backslashes are kept.
fn split_command_line(line: &str) -> Result<Vec<String>, AppError> {
    let unterminated = || AppError::invalid_input("unterminated quote in command");
    let mut words = Vec::new();
    let mut word: Option<String> = None;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                let quoted = word.get_or_insert_with(String::new);
                loop {
                    match chars.next().ok_or_else(unterminated)? {
                        '"' => break,
                        '\\' => match chars.next().ok_or_else(unterminated)? {
                            escaped @ ('"' | '\\') => quoted.push(escaped),
                            other => {
                                quoted.push('\\');
                                quoted.push(other);
                            }
                        },
                        other => quoted.push(other),
                    }
                }
            }
            ch if ch.is_whitespace() => words.extend(word.take()),
            ch => word.get_or_insert_with(String::new).push(ch),
        }
    }
    words.extend(word);
    Ok(words)
}

fn print_help() {
    let mut cmd = Cli::command();
    let help = cmd.render_help();
    println!("{help}");
}

fn parse_tags(raw: &[String]) -> Vec<String> {
    raw.iter()
        .flat_map(|value| value.split(','))
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

async fn run_command(session: &mut Session, console: &mut Console, cli: Cli) -> Result<(), AppError> {
    let json = cli.json;
    let offset = session.app.options().offset;
    let palette = session.palette.clone();

    match cli.command {
        Command::Add {
            title,
            tags,
            remind,
        } => {
            let title = match title {
                Some(value) if !value.trim().is_empty() => value,
                _ => return Err(AppError::invalid_input("title is required")),
            };
            let reminder = remind
                .as_deref()
                .map(|raw| parse_when(raw, now_millis(), offset))
                .transpose()?;

            let (task, scheduled) = session.app.add_task(&title, &parse_tags(&tags), reminder)?;
            if json {
                print_json(&task)?;
            } else {
                println!("Added task: {} ({})", task.title, task.id);
                if let Some(scheduled) = scheduled {
                    println!("Reminder set for {}", scheduled.local_time);
                }
            }
        }
        Command::Edit {
            id,
            title,
            tags,
            clear_tags,
        } => {
            let tags = if clear_tags {
                Some(Vec::new())
            } else if tags.is_empty() {
                None
            } else {
                Some(parse_tags(&tags))
            };
            let task = session
                .app
                .edit_task(&id, title.as_deref(), tags.as_deref())?;
            print_task(&task, json, "Updated")?;
        }
        Command::Done { id } => {
            let task = session.app.complete_task(&id)?;
            print_task(&task, json, "Completed")?;
        }
        Command::Undo { id } => {
            let task = session.app.reopen_task(&id)?;
            print_task(&task, json, "Reopened")?;
        }
        Command::Toggle { id } => {
            let task = session.app.toggle_task(&id)?;
            let verb = if task.done { "Completed" } else { "Reopened" };
            print_task(&task, json, verb)?;
        }
        Command::Delete { id } => {
            let task = session.app.delete_task(&id)?;
            print_task(&task, json, "Deleted")?;
        }
        Command::Show { id } => {
            let task = session.app.get_task(&id)?;
            if json {
                print_json(&task)?;
            } else {
                println!("{}", render::task_detail(&task, now_millis(), offset, &palette)?);
            }
        }
        Command::List { filter, search } => {
            let filter = TaskFilter::parse(&filter)?;
            let tasks = session.app.list_tasks(&filter, search.as_deref());
            if json {
                print_json(&tasks)?;
            } else {
                println!("{}", render::task_table(&tasks, now_millis(), offset)?);
            }
        }
        Command::ClearDone => {
            let done = session.app.tasks().iter().filter(|task| task.done).count();
            if done > 0
                && !cli.yes
                && !console
                    .confirm(&format!("Remove {done} completed tasks?"))
                    .await?
            {
                println!("Cancelled.");
                return Ok(());
            }
            let removed = session.app.clear_done();
            if json {
                print_json(&removed)?;
            } else {
                println!("Cleared {} completed tasks", removed.len());
            }
        }
        Command::Reset => {
            if !cli.yes
                && !console
                    .confirm("Delete ALL tasks and activity history?")
                    .await?
            {
                println!("Cancelled.");
                return Ok(());
            }
            let removed = session.app.reset_all();
            if json {
                print_json(&serde_json::json!({ "removed": removed.len() }))?;
            } else {
                println!("Reset complete: removed {} tasks", removed.len());
            }
        }
        Command::Tags { action } => match action {
            None => {
                if json {
                    print_json(session.app.tags())?;
                } else {
                    for tag in session.app.tags() {
                        println!("{tag}");
                    }
                }
            }
            Some(TagCommand::Add { name }) => {
                let tag = session.app.add_tag(&name)?;
                println!("Added tag: {tag}");
            }
            Some(TagCommand::Remove { name }) => {
                let stripped = session.app.remove_tag(&name)?;
                println!("Removed tag: {} (stripped from {stripped} tasks)", name.trim());
            }
        },
        Command::Remind { id, when } => {
            let target = parse_when(&when, now_millis(), offset)?;
            let scheduled = session.app.set_reminder(&id, target)?;
            if json {
                print_json(&serde_json::json!({
                    "taskId": scheduled.task_id,
                    "target": scheduled.target,
                    "localTime": scheduled.local_time,
                }))?;
            } else {
                println!("Reminder set for {}", scheduled.local_time);
            }
        }
        Command::Unremind { id } => {
            let task = session.app.clear_reminder(&id)?;
            print_task(&task, json, "Cleared reminder on")?;
        }
        Command::Snooze { id, minutes } => {
            let scheduled = session.app.snooze(&id, minutes)?;
            println!("Snoozed until {}", scheduled.local_time);
        }
        Command::Reminders => {
            let pending = session.app.pending_reminders();
            if json {
                let payload: Vec<_> = pending
                    .iter()
                    .map(|reminder| {
                        serde_json::json!({
                            "taskId": reminder.task_id,
                            "taskTitle": reminder.task_title,
                            "target": reminder.target,
                        })
                    })
                    .collect();
                print_json(&payload)?;
            } else {
                println!("{}", render::reminder_table(&pending, offset)?);
            }
        }
        Command::Notifications { action } => {
            run_notification_command(session, action.unwrap_or(NotificationCommand::List), json)?;
        }
        Command::Activity { limit } => {
            let entries = session.app.activities(Some(limit));
            if json {
                print_json(entries)?;
            } else {
                println!("{}", render::activity_list(entries, offset)?);
            }
        }
        Command::Stats => {
            let stats = session.app.statistics()?;
            if json {
                print_json(&stats)?;
            } else {
                println!("{}", render::statistics(&stats, &palette));
            }
        }
        Command::Export { format, output } => {
            let format = TransferFormat::parse(&format)?;
            let content = session.app.export(format)?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, content.as_bytes())
                        .await
                        .map_err(|err| AppError::io(format!("{path}: {err}")))?;
                    println!("Exported {} tasks to {path}", session.app.tasks().len());
                }
                None => print!("{content}"),
            }
        }
        Command::Import { path, format } => {
            let format = match format {
                Some(raw) => TransferFormat::parse(&raw)?,
                None => TransferFormat::from_path(Path::new(&path)),
            };
            let raw = tokio::fs::read_to_string(&path)
                .await
                .map_err(|err| AppError::io(format!("{path}: {err}")))?;
            let current = session.app.tasks().len();
            if !cli.yes
                && !console
                    .confirm(&format!("Import replaces all {current} current tasks. Continue?"))
                    .await?
            {
                println!("Cancelled.");
                return Ok(());
            }
            let summary = session.app.import(format, &raw)?;
            if json {
                print_json(&serde_json::json!({
                    "tasks": summary.tasks,
                    "tags": summary.tags,
                    "activitiesReplaced": summary.activities_replaced,
                }))?;
            } else {
                println!("Imported {} tasks", summary.tasks);
            }
        }
        Command::Register {
            username,
            email,
            password,
        } => {
            let account = session.app.register(&username, &email, &password)?;
            if json {
                print_json(&account)?;
            } else {
                println!("Registered user: {} ({})", account.username, account.id);
            }
        }
        Command::Login {
            identifier,
            password,
        } => {
            let (user, session_record) = session.app.login(&identifier, &password)?;
            if json {
                print_json(&serde_json::json!({
                    "user": user,
                    "expiresAt": session_record.expires_at,
                }))?;
            } else {
                println!(
                    "Logged in as {} until {}",
                    user.username,
                    format_local(session_record.expires_at, offset)?
                );
            }
        }
        Command::Logout => {
            if session.app.logout()? {
                println!("Logged out");
            } else {
                println!("No active session");
            }
        }
        Command::Whoami => match session.app.current_user() {
            Some(user) if json => print_json(&user)?,
            Some(user) => println!("{} <{}>", user.username, user.email),
            None if json => println!("null"),
            None => println!("Not logged in"),
        },
        Command::Profile { action } => match action.unwrap_or(ProfileCommand::Show) {
            ProfileCommand::Show => {
                let profile = session.app.profile();
                if json {
                    print_json(&profile)?;
                } else {
                    println!("{}", render::profile(&profile, offset)?);
                }
            }
            ProfileCommand::Update { name, bio } => {
                if name.is_none() && bio.is_none() {
                    return Err(AppError::invalid_input("nothing to change"));
                }
                let profile = session.app.update_profile(name.as_deref(), bio.as_deref())?;
                if json {
                    print_json(&profile)?;
                } else {
                    println!("Profile updated");
                }
            }
            ProfileCommand::Avatar { path, remove } => {
                if remove {
                    let removed = session.app.remove_avatar()?;
                    println!("{}", if removed { "Avatar removed" } else { "No avatar set" });
                } else if let Some(path) = path {
                    let extension = Path::new(&path)
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .unwrap_or_default();
                    let mime = mime_for_extension(extension).ok_or_else(|| {
                        AppError::invalid_input(format!("unsupported image type: {path}"))
                    })?;
                    let bytes = tokio::fs::read(&path)
                        .await
                        .map_err(|err| AppError::io(format!("{path}: {err}")))?;
                    let data_url = session.app.set_avatar(mime, &bytes)?;
                    println!("Avatar updated ({} bytes)", data_url.len());
                }
            }
        },
    }

    Ok(())
}

fn run_notification_command(
    session: &mut Session,
    action: NotificationCommand,
    json: bool,
) -> Result<(), AppError> {
    let offset = session.app.options().offset;
    match action {
        NotificationCommand::List => {
            let notifications = session.app.notifications();
            if json {
                print_json(&notifications)?;
            } else {
                println!(
                    "{}",
                    render::notification_list(
                        &notifications,
                        session.app.unread_count(),
                        now_millis(),
                        &session.palette,
                    )
                );
            }
        }
        NotificationCommand::ReadAll => {
            let changed = session.app.mark_all_read();
            println!("Marked {changed} notifications as read");
        }
        NotificationCommand::Dismiss { id } => {
            let removed = session.app.dismiss_notification(&id)?;
            println!("Dismissed notification: {}", removed.title);
        }
        NotificationCommand::Clear => {
            let removed = session.app.clear_notifications();
            println!("All notifications cleared ({removed})");
        }
        NotificationCommand::Act { id, action } => {
            let code = ActionCode::parse(&action).ok_or_else(|| {
                AppError::invalid_input(format!("unknown action '{action}', use view-task or snooze"))
            })?;
            match session.app.invoke_action(&id, code)? {
                ActionOutcome::ViewTask(task) if json => print_json(&task)?,
                ActionOutcome::ViewTask(task) => println!(
                    "{}",
                    render::task_detail(&task, now_millis(), offset, &session.palette)?
                ),
                ActionOutcome::Snoozed(scheduled) => {
                    println!("Snoozed until {}", scheduled.local_time)
                }
            }
        }
    }
    Ok(())
}

fn on_reminder_fired(session: &mut Session, fired: &ReminderFired) {
    match session.app.handle_reminder_fired(fired) {
        Some(task) => println!(
            "{} {} [{}]",
            session.palette.accentize("⏰ Reminder:"),
            task.title,
            fired.notification_id
        ),
        None => debug!(task_id = %fired.task_id, "reminder fired for a task that is gone"),
    }
}

fn parse_line(session: &Session, line: &str) -> Result<Option<Cli>, AppError> {
    let args = split_command_line(line)?;
    if args.is_empty() {
        return Ok(None);
    }
    let args = session.config.expand_alias(args);
    let mut argv = Vec::with_capacity(args.len() + 1);
    argv.push("taskboard".to_string());
    argv.extend(args);
    Cli::try_parse_from(argv)
        .map(Some)
        .map_err(clap_error)
}

async fn run_interactive(
    session: &mut Session,
    console: &mut Console,
    events: &mut mpsc::UnboundedReceiver<ReminderFired>,
) -> Result<(), AppError> {
    let unread = session.app.unread_count();
    if unread > 0 {
        println!("{unread} unread notifications");
    }

    loop {
        let input = tokio::select! {
            line = console.next_line() => Input::Line(line?),
            Some(fired) = events.recv() => Input::Fired(fired),
        };

        let line = match input {
            Input::Fired(fired) => {
                on_reminder_fired(session, &fired);
                continue;
            }
            Input::Line(None) => break,
            Input::Line(Some(line)) => line,
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        if line == "help" || line == "?" {
            print_help();
            continue;
        }

        let cli = match parse_line(session, line) {
            Ok(Some(cli)) => cli,
            Ok(None) => continue,
            Err(err) => {
                eprintln!("ERROR: {}", err);
                continue;
            }
        };
        if !cli.config_override.is_empty() {
            eprintln!("config overrides only apply at startup");
        }

        if let Err(err) = run_command(session, console, cli).await {
            eprintln!("ERROR: {}", err);
        }
    }

    let dropped = session.app.pending_reminders().len();
    if dropped > 0 {
        warn!(dropped, "session ended with pending reminders");
    }
    Ok(())
}

fn open_session(
    overrides: &[String],
    events: mpsc::UnboundedSender<ReminderFired>,
) -> Result<Session, AppError> {
    let loaded = load_config();
    if let Some(err) = loaded.warning.as_ref() {
        eprintln!("WARNING: using default config: {err}");
    }
    let overrides = collect_overrides(overrides.iter().map(String::as_str))?;
    let config = loaded.config.with_overrides(&overrides);

    let store = JsonDirStore::new(data_dir()?).with_quota(config.storage_quota_bytes());
    debug!(dir = %store.dir().display(), "opening data directory");
    let app = App::new(
        Arc::new(store),
        Arc::from(alerter_from_env()),
        AppOptions::from_config(&config),
        Some(events),
    );
    let palette = config.theme.palette();

    Ok(Session {
        app,
        config,
        palette,
    })
}

async fn run(args: Vec<String>) -> Result<(), AppError> {
    let (overrides, args) = split_config_overrides(args)?;
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut session = open_session(&overrides, events_tx)?;
    let mut console = Console::new();

    if args.is_empty() {
        return run_interactive(&mut session, &mut console, &mut events_rx).await;
    }

    let args = session.config.expand_alias(args);
    let mut argv = Vec::with_capacity(args.len() + 1);
    argv.push("taskboard".to_string());
    argv.extend(args);
    let cli = Cli::try_parse_from(argv).map_err(|err| match err.kind() {
        clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
            let _ = err.print();
            std::process::exit(0);
        }
        _ => clap_error(err),
    })?;

    run_command(&mut session, &mut console, cli).await?;
    if !session.app.pending_reminders().is_empty() {
        eprintln!("note: reminders fire only while an interactive session is running");
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(err) = run(args).await {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
