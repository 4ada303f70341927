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

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn register_login_and_profile_flow() {
    let data_dir = temp_path("cli-account");

    let register = run(
        &data_dir,
        &["register", "alice", "alice@example.com", "--password", "secret1"],
    );
    assert!(register.status.success(), "{}", String::from_utf8_lossy(&register.stderr));
    assert!(stdout(&register).contains("Registered user: alice"));

    let wrong = run(&data_dir, &["login", "alice", "--password", "nope"]);
    assert!(!wrong.status.success());
    assert!(String::from_utf8_lossy(&wrong.stderr).contains("invalid credentials"));

    let login = run(&data_dir, &["login", "alice@example.com", "--password", "secret1"]);
    assert!(stdout(&login).contains("Logged in as alice"));
    assert!(stdout(&run(&data_dir, &["whoami"])).contains("alice <alice@example.com>"));

    run(&data_dir, &["profile", "update", "--name", "Alice", "--bio", "hello"]);
    let profile = run(&data_dir, &["--json", "profile"]);
    let profile: serde_json::Value = serde_json::from_slice(&profile.stdout).unwrap();
    assert_eq!(profile["displayName"], "Alice");
    assert_eq!(profile["loginCount"], 1);

    let logout = run(&data_dir, &["logout"]);
    let whoami = run(&data_dir, &["whoami"]);
    std::fs::remove_dir_all(&data_dir).ok();

    assert!(stdout(&logout).contains("Logged out"));
    assert!(stdout(&whoami).contains("Not logged in"));
}

#[test]
fn credentials_are_not_stored_in_plain_text() {
    let data_dir = temp_path("cli-credentials");
    run(
        &data_dir,
        &["register", "bobby", "bob@example.com", "--password", "hunter22"],
    );
    let stored = std::fs::read_to_string(data_dir.join("credentials.json")).unwrap();
    std::fs::remove_dir_all(&data_dir).ok();
    assert!(!stored.contains("hunter22"));
}

#[test]
fn stats_refresh_profile_cache() {
    let data_dir = temp_path("cli-stats");
    let add = run(&data_dir, &["--json", "add", "finish"]);
    let task: serde_json::Value = serde_json::from_slice(&add.stdout).unwrap();
    run(&data_dir, &["done", task["id"].as_str().unwrap()]);

    let stats = run(&data_dir, &["--json", "stats"]);
    let stats: serde_json::Value = serde_json::from_slice(&stats.stdout).unwrap();
    let profile = run(&data_dir, &["--json", "profile"]);
    let profile: serde_json::Value = serde_json::from_slice(&profile.stdout).unwrap();
    std::fs::remove_dir_all(&data_dir).ok();

    assert_eq!(stats["completed"], 1);
    assert_eq!(stats["streakDays"], 1);
    assert_eq!(stats["activityCounts"]["complete"], 1);
    let score = stats["productivityScore"].as_u64().unwrap();
    assert!(score <= 100);
    assert_eq!(profile["productivityScore"].as_u64(), Some(score));
    assert_eq!(profile["userId"], "local");
}

#[test]
fn completion_notification_can_be_viewed_and_dismissed() {
    let data_dir = temp_path("cli-notifications");
    let add = run(&data_dir, &["--json", "add", "wrap up"]);
    let task: serde_json::Value = serde_json::from_slice(&add.stdout).unwrap();
    run(&data_dir, &["done", task["id"].as_str().unwrap()]);

    let listing = run(&data_dir, &["notifications"]);
    assert!(stdout(&listing).contains("Notifications (1 unread)"));

    let feed = run(&data_dir, &["--json", "notifications"]);
    let feed: Vec<serde_json::Value> = serde_json::from_slice(&feed.stdout).unwrap();
    assert_eq!(feed[0]["type"], "task_completed");
    let id = feed[0]["id"].as_str().unwrap().to_string();

    let snooze = run(&data_dir, &["notifications", "act", &id, "snooze"]);
    assert!(String::from_utf8_lossy(&snooze.stderr).contains("does not offer that action"));

    let view = run(&data_dir, &["notifications", "act", &id, "view-task"]);
    assert!(stdout(&view).contains("wrap up"));

    let after = run(&data_dir, &["notifications"]);
    std::fs::remove_dir_all(&data_dir).ok();
    assert!(stdout(&after).contains("No notifications."));
}
