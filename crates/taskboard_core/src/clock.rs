//! Wall-clock helpers. Every persisted instant is epoch milliseconds.

use crate::error::AppError;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

pub type Millis = i64;

pub const MINUTE_MS: Millis = 60_000;
pub const HOUR_MS: Millis = 60 * MINUTE_MS;
pub const DAY_MS: Millis = 24 * HOUR_MS;

pub fn now_millis() -> Millis {
    to_millis(OffsetDateTime::now_utc())
}

pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

pub fn to_millis(datetime: OffsetDateTime) -> Millis {
    (datetime.unix_timestamp_nanos() / 1_000_000) as Millis
}

pub fn to_datetime(millis: Millis, offset: UtcOffset) -> Result<OffsetDateTime, AppError> {
    let utc = |millis: Millis| {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
    };
    // A day of slack on both sides keeps `to_offset` inside the supported range.
    let shiftable = millis.checked_sub(DAY_MS).and_then(utc).is_some()
        && millis.checked_add(DAY_MS).and_then(utc).is_some();
    match utc(millis) {
        Some(datetime) if shiftable => Ok(datetime.to_offset(offset)),
        _ => Err(AppError::invalid_data(format!("timestamp out of range: {millis}"))),
    }
}

/// Whether `millis` can be rendered as a calendar date in any offset.
pub fn is_representable(millis: Millis) -> bool {
    to_datetime(millis, UtcOffset::UTC).is_ok()
}

pub fn local_date(millis: Millis, offset: UtcOffset) -> Result<Date, AppError> {
    Ok(to_datetime(millis, offset)?.date())
}

/// RFC 3339 rendering in UTC, used for export metadata.
pub fn format_iso(millis: Millis) -> Result<String, AppError> {
    to_datetime(millis, UtcOffset::UTC)?
        .format(&Rfc3339)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

/// `DD/MM/YYYY HH:MM:SS` in the given offset.
pub fn format_local(millis: Millis, offset: UtcOffset) -> Result<String, AppError> {
    let format = format_description!("[day]/[month]/[year] [hour]:[minute]:[second]");
    to_datetime(millis, offset)?
        .format(&format)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

/// `HH:MM` in the given offset.
pub fn format_local_time(millis: Millis, offset: UtcOffset) -> Result<String, AppError> {
    let format = format_description!("[hour]:[minute]");
    to_datetime(millis, offset)?
        .format(&format)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

/// Accepts RFC 3339, raw epoch milliseconds, `DD/MM/YYYY[,] HH:MM[:SS]`,
/// `YYYY-MM-DD HH:MM[:SS]` and `YYYY-MM-DD` (midnight). Zone-less inputs
/// are read in `offset`.
pub fn parse_instant(raw: &str, offset: UtcOffset) -> Result<Millis, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input("datetime is required"));
    }

    if let Ok(parsed) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Ok(to_millis(parsed));
    }

    if trimmed.chars().all(|ch| ch.is_ascii_digit()) {
        return trimmed
            .parse::<Millis>()
            .map_err(|_| AppError::invalid_input(format!("invalid timestamp: {trimmed}")));
    }

    let normalized = trimmed.replace(", ", " ").replace(',', " ").replace('T', " ");
    parse_local_primitive(&normalized)
        .map(|primitive| to_millis(primitive.assume_offset(offset)))
        .ok_or_else(|| AppError::invalid_input(format!("unrecognized datetime: {trimmed}")))
}

fn parse_local_primitive(value: &str) -> Option<PrimitiveDateTime> {
    let day_first_seconds = format_description!(
        "[day padding:none]/[month padding:none]/[year] [hour padding:none]:[minute]:[second]"
    );
    let day_first_minutes =
        format_description!("[day padding:none]/[month padding:none]/[year] [hour padding:none]:[minute]");
    let iso_seconds = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let iso_minutes = format_description!("[year]-[month]-[day] [hour]:[minute]");
    let iso_date = format_description!("[year]-[month]-[day]");
    let day_first_date = format_description!("[day padding:none]/[month padding:none]/[year]");

    PrimitiveDateTime::parse(value, &day_first_seconds)
        .or_else(|_| PrimitiveDateTime::parse(value, &day_first_minutes))
        .or_else(|_| PrimitiveDateTime::parse(value, &iso_seconds))
        .or_else(|_| PrimitiveDateTime::parse(value, &iso_minutes))
        .ok()
        .or_else(|| {
            Date::parse(value, &iso_date)
                .or_else(|_| Date::parse(value, &day_first_date))
                .ok()
                .map(|date| date.midnight())
        })
}
