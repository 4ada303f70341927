//! JSON and CSV export/import. Imports only parse; replacing the live
//! collections is the caller's job once the user has confirmed.

use crate::clock::{Millis, format_iso, format_local, is_representable, parse_instant};
use crate::error::AppError;
use crate::id::generate_id;
use crate::model::{Activity, Task};
use crate::tasks::normalize_tags;
use serde::{Deserialize, Serialize};
use time::UtcOffset;
use tracing::debug;

pub const EXPORT_VERSION: &str = "1.0";
pub const CSV_HEADER: &str = "ID,Título,Estado,Creada,Completada,Etiquetas";
pub const CSV_DONE_TOKEN: &str = "Completada";
pub const CSV_PENDING_TOKEN: &str = "Pendiente";
pub const UNTITLED_PLACEHOLDER: &str = "Sin título";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub tasks: Vec<Task>,
    pub available_tags: Vec<String>,
    pub activities: Vec<Activity>,
    pub export_date: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonImport {
    pub tasks: Vec<Task>,
    pub available_tags: Option<Vec<String>>,
    pub activities: Option<Vec<Activity>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFormat {
    Json,
    Csv,
}

impl TransferFormat {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(TransferFormat::Json),
            "csv" => Ok(TransferFormat::Csv),
            other => Err(AppError::invalid_input(format!("unknown format '{other}'"))),
        }
    }

    /// Guesses the format from a file name, defaulting to JSON.
    pub fn from_path(path: &std::path::Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => TransferFormat::Csv,
            _ => TransferFormat::Json,
        }
    }
}

pub fn export_json(
    tasks: &[Task],
    tags: &[String],
    activities: &[Activity],
    now: Millis,
) -> Result<String, AppError> {
    let document = ExportDocument {
        tasks: tasks.to_vec(),
        available_tags: tags.to_vec(),
        activities: activities.to_vec(),
        export_date: format_iso(now)?,
        version: EXPORT_VERSION.to_string(),
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

pub fn parse_json_import(raw: &str) -> Result<JsonImport, AppError> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|err| AppError::invalid_input(format!("import file is not valid JSON: {err}")))?;
    let tasks_value = value
        .get("tasks")
        .filter(|tasks| tasks.is_array())
        .cloned()
        .ok_or_else(|| AppError::invalid_input("import file must contain a tasks array"))?;

    let mut tasks: Vec<Task> = serde_json::from_value(tasks_value)
        .map_err(|err| AppError::invalid_input(format!("invalid task in import: {err}")))?;
    for task in &mut tasks {
        task.normalize();
        let instants = [Some(task.created_at), task.completed_at, task.reminder.map(|r| r.date)];
        if !instants.into_iter().flatten().all(is_representable) {
            return Err(AppError::invalid_input(format!(
                "task {} has a timestamp outside the supported range",
                task.id
            )));
        }
    }

    let available_tags = value
        .get("availableTags")
        .and_then(|tags| serde_json::from_value::<Vec<String>>(tags.clone()).ok());
    let activities = value
        .get("activities")
        .and_then(|activities| serde_json::from_value::<Vec<Activity>>(activities.clone()).ok());
    if let Some(activity) = activities
        .iter()
        .flatten()
        .find(|activity| !is_representable(activity.timestamp))
    {
        return Err(AppError::invalid_input(format!(
            "activity {} has a timestamp outside the supported range",
            activity.id
        )));
    }

    Ok(JsonImport {
        tasks,
        available_tags,
        activities,
    })
}

pub fn export_csv(tasks: &[Task], offset: UtcOffset) -> Result<String, AppError> {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for task in tasks {
        let status = if task.done {
            CSV_DONE_TOKEN
        } else {
            CSV_PENDING_TOKEN
        };
        let completed = match task.completed_at {
            Some(completed_at) => format_local(completed_at, offset)?,
            None => String::new(),
        };
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            quote_csv(&task.id),
            quote_csv(&task.title),
            status,
            format_local(task.created_at, offset)?,
            completed,
            quote_csv(&task.tags.join(";")),
        ));
    }
    Ok(out)
}

pub fn parse_csv_import(raw: &str, offset: UtcOffset, now: Millis) -> Result<Vec<Task>, AppError> {
    let mut records = parse_csv_records(raw)?.into_iter();
    let header = records
        .next()
        .ok_or_else(|| AppError::invalid_input("CSV file is empty"))?;
    if header.len() < 3 {
        return Err(AppError::invalid_input(
            "CSV header must have at least 3 columns",
        ));
    }

    let mut tasks = Vec::new();
    for (row, fields) in records.enumerate() {
        if fields.len() < 3 {
            debug!(row = row + 2, "skipping short CSV row");
            continue;
        }

        let id = match fields[0].trim() {
            "" => generate_id(),
            value => value.to_string(),
        };
        let title = match fields[1].trim() {
            "" => UNTITLED_PLACEHOLDER.to_string(),
            value => value.to_string(),
        };
        let done = fields[2].trim().eq_ignore_ascii_case(CSV_DONE_TOKEN);
        let created_at = optional_instant(fields.get(3), offset).unwrap_or(now);
        let completed_at = if done {
            Some(optional_instant(fields.get(4), offset).unwrap_or(now))
        } else {
            None
        };
        let tags = fields
            .get(5)
            .map(|raw| normalize_tags(raw.split(';')))
            .unwrap_or_default();

        tasks.push(Task {
            id,
            title,
            done,
            created_at,
            completed_at,
            tags,
            reminder: None,
        });
    }
    Ok(tasks)
}

fn optional_instant(field: Option<&String>, offset: UtcOffset) -> Option<Millis> {
    let raw = field?.trim();
    if raw.is_empty() {
        return None;
    }
    parse_instant(raw, offset).ok().filter(|millis| is_representable(*millis))
}

pub fn quote_csv(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Splits CSV text into records. Quoted fields may contain commas, doubled
/// quotes and line breaks; blank lines are dropped.
pub fn parse_csv_records(raw: &str) -> Result<Vec<Vec<String>>, AppError> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = raw.trim_start_matches('\u{feff}').chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                other => field.push(other),
            }
            continue;
        }

        match ch {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                push_record(&mut records, std::mem::take(&mut record));
            }
            other => field.push(other),
        }
    }

    if in_quotes {
        return Err(AppError::invalid_input("unterminated quote in CSV"));
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        push_record(&mut records, record);
    }
    Ok(records)
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    let blank = record.len() == 1 && record[0].trim().is_empty();
    if !blank {
        records.push(record);
    }
}
