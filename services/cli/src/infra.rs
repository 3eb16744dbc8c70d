use std::io::{self, Write};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use lodge_ledger::membership::{MemberDocumentKind, Position, Stage, VoteLevel, VoteValue};
use serde::Serialize;

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Midnight UTC of a `YYYY-MM-DD` date.
pub(crate) fn parse_day(raw: &str) -> Result<DateTime<Utc>, String> {
    let date = parse_date(raw)?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| format!("'{raw}' has no midnight"))?;
    Ok(Utc.from_utc_datetime(&midnight))
}

fn parse_variant<T>(raw: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|err| err.to_string())
}

pub(crate) fn parse_stage(raw: &str) -> Result<Stage, String> {
    parse_variant(raw)
}

pub(crate) fn parse_level(raw: &str) -> Result<VoteLevel, String> {
    parse_variant(raw)
}

pub(crate) fn parse_value(raw: &str) -> Result<VoteValue, String> {
    parse_variant(raw)
}

pub(crate) fn parse_position(raw: &str) -> Result<Position, String> {
    parse_variant(raw)
}

pub(crate) fn parse_document_kind(raw: &str) -> Result<MemberDocumentKind, String> {
    parse_variant(raw)
}

/// Chooses between readable text and pretty JSON on stdout.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Output {
    pub(crate) json: bool,
}

impl Output {
    /// Emits `value` as JSON, or runs `text` to print the readable form.
    pub(crate) fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T)) -> io::Result<()> {
        if self.json {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, value)?;
            writeln!(stdout)?;
        } else {
            text(value);
        }
        Ok(())
    }
}
