use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("taskboard-{nanos}-{name}"))
}

fn run(data_dir: &Path, args: &[&str]) -> Output {
    let exe = env!("CARGO_BIN_EXE_taskboard");
    Command::new(exe)
        .args(args)
        .env("TASKBOARD_DATA_DIR", data_dir)
        .env("TASKBOARD_CONFIG_PATH", data_dir.join("missing-config.json"))
        .env("TASKBOARD_DISABLE_NOTIFICATIONS", "1")
        .output()
        .expect("failed to run taskboard")
}

fn add_task(data_dir: &Path, args: &[&str]) -> serde_json::Value {
    let mut full = vec!["--json", "add"];
    full.extend_from_slice(args);
    let output = run(data_dir, &full);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).expect("task json")
}

#[test]
fn add_command_succeeds() {
    let data_dir = temp_path("cli-add");
    let output = run(&data_dir, &["add", "demo task"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Added task: demo task"));

    let stored = std::fs::read_to_string(data_dir.join("tasks.json")).unwrap();
    std::fs::remove_dir_all(&data_dir).ok();
    assert!(stored.contains("demo task"));
}

#[test]
fn add_command_rejects_missing_title() {
    let data_dir = temp_path("cli-add-missing");
    let output = run(&data_dir, &["add"]);

    std::fs::remove_dir_all(&data_dir).ok();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_input"));
}

#[test]
fn done_and_undo_keep_completed_at_in_step() {
    let data_dir = temp_path("cli-done");
    let task = add_task(&data_dir, &["ship it", "--tag", "Trabajo"]);
    let id = task["id"].as_str().unwrap();

    let done = run(&data_dir, &["--json", "done", id]);
    assert!(done.status.success());
    let done: serde_json::Value = serde_json::from_slice(&done.stdout).unwrap();
    assert_eq!(done["done"], true);
    assert!(done["completedAt"].is_i64());

    let again = run(&data_dir, &["done", id]);
    assert!(!again.status.success());
    assert!(String::from_utf8_lossy(&again.stderr).contains("ERROR: invalid_input"));

    let undo = run(&data_dir, &["--json", "undo", id]);
    let undo: serde_json::Value = serde_json::from_slice(&undo.stdout).unwrap();
    std::fs::remove_dir_all(&data_dir).ok();
    assert_eq!(undo["done"], false);
    assert!(undo.get("completedAt").is_none());
}

#[test]
fn unknown_id_reports_not_found() {
    let data_dir = temp_path("cli-missing");
    let output = run(&data_dir, &["done", "nope"]);

    std::fs::remove_dir_all(&data_dir).ok();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ERROR: not_found - task not found: nope"));
}

#[test]
fn list_filters_by_state_tag_and_search() {
    let data_dir = temp_path("cli-list");
    let first = add_task(&data_dir, &["Write report", "-t", "Trabajo"]);
    add_task(&data_dir, &["Buy milk", "-t", "Personal"]);
    run(&data_dir, &["done", first["id"].as_str().unwrap()]);

    let list = |args: &[&str]| -> Vec<String> {
        let mut full = vec!["--json", "list"];
        full.extend_from_slice(args);
        let output = run(&data_dir, &full);
        let tasks: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
        tasks
            .iter()
            .map(|task| task["title"].as_str().unwrap().to_string())
            .collect()
    };

    assert_eq!(list(&[]).len(), 2);
    assert_eq!(list(&["--filter", "completed"]), ["Write report"]);
    assert_eq!(list(&["--filter", "active"]), ["Buy milk"]);
    assert_eq!(list(&["--filter", "tag:personal"]), ["Buy milk"]);
    assert_eq!(list(&["--search", "REPORT"]), ["Write report"]);
    assert!(list(&["--filter", "old"]).is_empty());

    let plain = run(&data_dir, &["list"]);
    std::fs::remove_dir_all(&data_dir).ok();
    let stdout = String::from_utf8_lossy(&plain.stdout);
    assert!(stdout.contains("[x]"));
    assert!(stdout.contains("Buy milk"));
}

#[test]
fn edit_and_delete_update_the_store() {
    let data_dir = temp_path("cli-edit-delete");
    let task = add_task(&data_dir, &["draft"]);
    let id = task["id"].as_str().unwrap();

    let edit = run(&data_dir, &["edit", id, "--title", "final", "--tag", "Estudio,Urgente"]);
    assert!(String::from_utf8_lossy(&edit.stdout).contains("Updated task: final"));

    let shown = run(&data_dir, &["--json", "show", id]);
    let shown: serde_json::Value = serde_json::from_slice(&shown.stdout).unwrap();
    assert_eq!(shown["tags"], serde_json::json!(["Estudio", "Urgente"]));

    let delete = run(&data_dir, &["delete", id]);
    assert!(String::from_utf8_lossy(&delete.stdout).contains("Deleted task: final"));

    let activity = run(&data_dir, &["--json", "activity"]);
    std::fs::remove_dir_all(&data_dir).ok();
    let activity: Vec<serde_json::Value> = serde_json::from_slice(&activity.stdout).unwrap();
    let kinds: Vec<&str> = activity
        .iter()
        .map(|entry| entry["type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, ["delete", "edit", "create"]);
}

#[test]
fn clear_done_asks_for_confirmation() {
    let data_dir = temp_path("cli-clear-done");
    let task = add_task(&data_dir, &["finished"]);
    run(&data_dir, &["done", task["id"].as_str().unwrap()]);

    let declined = run(&data_dir, &["clear-done"]);
    assert!(String::from_utf8_lossy(&declined.stdout).contains("Cancelled."));

    let accepted = run(&data_dir, &["clear-done", "--yes"]);
    assert!(String::from_utf8_lossy(&accepted.stdout).contains("Cleared 1 completed tasks"));

    let list = run(&data_dir, &["list"]);
    std::fs::remove_dir_all(&data_dir).ok();
    assert!(String::from_utf8_lossy(&list.stdout).contains("No tasks."));
}

#[test]
fn reset_restores_seed_tags() {
    let data_dir = temp_path("cli-reset");
    add_task(&data_dir, &["one", "--tag", "Custom"]);

    let reset = run(&data_dir, &["reset", "-y"]);
    assert!(String::from_utf8_lossy(&reset.stdout).contains("removed 1 tasks"));

    let tags = run(&data_dir, &["--json", "tags"]);
    std::fs::remove_dir_all(&data_dir).ok();
    let tags: Vec<String> = serde_json::from_slice(&tags.stdout).unwrap();
    assert_eq!(tags, ["Trabajo", "Personal", "Urgente", "Estudio"]);
}

#[test]
fn alias_override_expands_first_word() {
    let data_dir = temp_path("cli-alias");
    add_task(&data_dir, &["pending thing"]);

    let output = run(
        &data_dir,
        &["--config-override", "aliases.todo=list --filter active", "todo"],
    );
    std::fs::remove_dir_all(&data_dir).ok();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("pending thing"));
}

#[test]
fn past_reminder_is_rejected_without_creating_task() {
    let data_dir = temp_path("cli-past-reminder");
    let output = run(&data_dir, &["add", "late", "--remind", "2001-01-01 10:00"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("reminder time must be in the future"));

    let list = run(&data_dir, &["list"]);
    std::fs::remove_dir_all(&data_dir).ok();
    assert!(String::from_utf8_lossy(&list.stdout).contains("No tasks."));
}

#[test]
fn help_lists_commands() {
    let data_dir = temp_path("cli-help");
    let output = run(&data_dir, &["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("remind"));
    assert!(stdout.contains("export"));
}

#[test]
fn unreachable_reminder_times_are_rejected_cleanly() {
    let data_dir = temp_path("cli-far-reminder");
    let far = run(&data_dir, &["add", "far", "--remind", "4611686018427387903"]);
    assert!(!far.status.success());
    assert!(String::from_utf8_lossy(&far.stderr).contains("ERROR: invalid_input"));

    let task = add_task(&data_dir, &["near"]);
    let id = task["id"].as_str().unwrap();
    let overflow = run(&data_dir, &["remind", id, "+999999999999999d"]);
    assert!(!overflow.status.success());
    assert!(String::from_utf8_lossy(&overflow.stderr).contains("ERROR: invalid_input"));

    let list = run(&data_dir, &["--json", "list"]);
    let activity = run(&data_dir, &["--json", "activity"]);
    std::fs::remove_dir_all(&data_dir).ok();
    let tasks: Vec<serde_json::Value> = serde_json::from_slice(&list.stdout).unwrap();
    let activity: Vec<serde_json::Value> = serde_json::from_slice(&activity.stdout).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["title"], "near");
    assert_eq!(activity.len(), 1);
}
