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

fn json_list(data_dir: &Path, args: &[&str]) -> Vec<serde_json::Value> {
    let mut full = vec!["--json"];
    full.extend_from_slice(args);
    serde_json::from_slice(&run(data_dir, &full).stdout).expect("json array")
}

#[test]
fn json_export_import_round_trip_logs_one_import() {
    let source = temp_path("cli-export-source");
    let target = temp_path("cli-export-target");
    let export_file = temp_path("export.json");

    run(&source, &["add", "Say \"hi\"", "--tag", "Trabajo"]);
    run(&source, &["add", "second"]);
    let export = run(&source, &["export", "--output", export_file.to_str().unwrap()]);
    assert!(export.status.success());
    assert!(stdout(&export).contains("Exported 2 tasks"));

    let document: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&export_file).unwrap()).unwrap();
    assert_eq!(document["version"], "1.0");
    assert!(document["exportDate"].is_string());
    assert_eq!(document["tasks"].as_array().unwrap().len(), 2);

    run(&target, &["add", "to be replaced"]);
    let import = run(&target, &["import", export_file.to_str().unwrap(), "--yes"]);
    assert!(import.status.success(), "{}", String::from_utf8_lossy(&import.stderr));
    assert!(stdout(&import).contains("Imported 2 tasks"));

    let source_tasks = json_list(&source, &["list"]);
    let target_tasks = json_list(&target, &["list"]);
    let activity = json_list(&target, &["activity"]);

    std::fs::remove_dir_all(&source).ok();
    std::fs::remove_dir_all(&target).ok();
    std::fs::remove_file(&export_file).ok();

    assert_eq!(source_tasks, target_tasks);
    let imports = activity
        .iter()
        .filter(|entry| entry["type"] == "import")
        .count();
    assert_eq!(imports, 1);
    assert_eq!(activity[0]["type"], "import");
}

#[test]
fn csv_export_quotes_titles() {
    let data_dir = temp_path("cli-export-csv");
    run(&data_dir, &["add", "Say \"hi\"", "--tag", "A", "--tag", "B"]);

    let export = run(&data_dir, &["export", "--format", "csv"]);
    std::fs::remove_dir_all(&data_dir).ok();

    let csv = stdout(&export);
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("ID,Título,Estado,Creada,Completada,Etiquetas"));
    let row = lines.next().unwrap();
    assert!(row.contains(",\"Say \"\"hi\"\"\",Pendiente,"));
    assert!(row.ends_with(",\"A;B\""));
}

#[test]
fn csv_import_applies_placeholders() {
    let data_dir = temp_path("cli-import-csv");
    let csv_file = temp_path("import.csv");
    std::fs::write(
        &csv_file,
        "ID,Título,Estado,Creada,Completada,Etiquetas\n\
         x1,\"Say \"\"hi\"\"\",Completada,20/12/2025 10:00:00,20/12/2025 11:00:00,\"A;B\"\n\
         ,,pendiente\n\
         short,row\n",
    )
    .unwrap();

    let import = run(&data_dir, &["import", csv_file.to_str().unwrap(), "-y"]);
    assert!(import.status.success(), "{}", String::from_utf8_lossy(&import.stderr));
    let tasks = json_list(&data_dir, &["list"]);

    std::fs::remove_dir_all(&data_dir).ok();
    std::fs::remove_file(&csv_file).ok();

    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0]["id"], "x1");
    assert_eq!(tasks[0]["title"], "Say \"hi\"");
    assert_eq!(tasks[0]["done"], true);
    assert_eq!(tasks[0]["tags"], serde_json::json!(["A", "B"]));
    assert_eq!(tasks[1]["title"], "Sin título");
    assert_eq!(tasks[1]["done"], false);
    assert!(!tasks[1]["id"].as_str().unwrap().is_empty());
}

#[test]
fn malformed_import_leaves_tasks_untouched() {
    let data_dir = temp_path("cli-import-bad");
    let bad_file = temp_path("bad.json");
    std::fs::write(&bad_file, "{\"items\": []}").unwrap();
    run(&data_dir, &["add", "keep me"]);

    let import = run(&data_dir, &["import", bad_file.to_str().unwrap(), "--yes"]);
    let tasks = json_list(&data_dir, &["list"]);

    std::fs::remove_dir_all(&data_dir).ok();
    std::fs::remove_file(&bad_file).ok();

    assert!(!import.status.success());
    assert!(String::from_utf8_lossy(&import.stderr).contains("ERROR: invalid_input"));
    assert_eq!(tasks.len(), 1);
}

#[test]
fn declined_import_changes_nothing() {
    let data_dir = temp_path("cli-import-declined");
    let empty_file = temp_path("empty.json");
    std::fs::write(&empty_file, "{\"tasks\": []}").unwrap();
    run(&data_dir, &["add", "keep me"]);

    let import = run(&data_dir, &["import", empty_file.to_str().unwrap()]);
    let tasks = json_list(&data_dir, &["list"]);

    std::fs::remove_dir_all(&data_dir).ok();
    std::fs::remove_file(&empty_file).ok();

    assert!(stdout(&import).contains("Cancelled."));
    assert_eq!(tasks.len(), 1);
}
