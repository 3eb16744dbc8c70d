use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::io::Read;

use crate::membership::domain::CandidateApplication;

pub(crate) const FULL_NAME: &str = "Emrin dhe Mbiemrin";
pub(crate) const EMAIL: &str = "Email Address";
pub const REQUIRED_COLUMNS: [&str; 2] = [FULL_NAME, EMAIL];
const CITIZENSHIP: &str = "Jeni qytetar i Republikes së Kosoves?";
const AFFIRMATIVE: [&str; 4] = ["po", "yes", "true", "1"];

/// One data row after decoding, numbered as the spreadsheet shows it (header is row 1).
#[derive(Debug)]
pub(crate) struct ParsedRow {
    pub(crate) row_number: usize,
    pub(crate) outcome: Result<CandidateApplication, String>,
}

/// Sheet-level failure that aborts the whole upload.
#[derive(Debug)]
pub(crate) enum SheetError {
    MissingColumns(Vec<String>),
    Csv(csv::Error),
}

impl From<csv::Error> for SheetError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<ParsedRow>, SheetError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|required| !headers.iter().any(|header| header == **required))
        .map(|required| required.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(SheetError::MissingColumns(missing));
    }
    let has_citizenship = headers.iter().any(|header| header == CITIZENSHIP);

    let mut rows = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let row_number = index + 2;
        let outcome = record
            .and_then(|record| record.deserialize::<CandidateRow>(Some(&headers)))
            .map_err(|err| err.to_string())
            .map(|row| row.into_application(has_citizenship));
        rows.push(ParsedRow {
            row_number,
            outcome,
        });
    }

    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct CandidateRow {
    #[serde(rename = "Email Address", default, deserialize_with = "empty_string_as_none")]
    email: Option<String>,
    #[serde(rename = "Emrin dhe Mbiemrin", default, deserialize_with = "empty_string_as_none")]
    full_name: Option<String>,
    #[serde(rename = "Timestamp", default, deserialize_with = "empty_string_as_none")]
    timestamp: Option<String>,
    #[serde(rename = "Nr. e Telefonit", default, deserialize_with = "empty_string_as_none")]
    phone_number: Option<String>,
    #[serde(rename = "Adresa", default, deserialize_with = "empty_string_as_none")]
    address: Option<String>,
    #[serde(rename = "Qyteti", default, deserialize_with = "empty_string_as_none")]
    city: Option<String>,
    #[serde(
        rename = "Jeni qytetar i Republikes së Kosoves?",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    citizenship: Option<String>,
    #[serde(
        rename = "Shto vegzën e profilit tuaj (LinkedIn, Facebook etj).",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    social_profile_url: Option<String>,
}

impl CandidateRow {
    fn into_application(self, has_citizenship: bool) -> CandidateApplication {
        // Without the question on the form every applicant is assumed to be a citizen.
        let is_kosovo_citizen = if has_citizenship {
            self.citizenship
                .as_deref()
                .map(|answer| AFFIRMATIVE.contains(&answer.trim().to_lowercase().as_str()))
                .unwrap_or(false)
        } else {
            true
        };

        CandidateApplication {
            email: self.email.unwrap_or_default(),
            full_name: self.full_name.unwrap_or_default(),
            phone_number: self.phone_number.unwrap_or_default(),
            address: self.address.unwrap_or_default(),
            city: self.city.unwrap_or_default(),
            is_kosovo_citizen,
            social_profile_url: self.social_profile_url.unwrap_or_default(),
            social_profile_url2: String::new(),
            application_date: self.timestamp.as_deref().and_then(parse_timestamp),
        }
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

/// Accepts RFC 3339, ISO date-times, bare dates and the `M/D/YYYY H:M:S` form exports use.
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M:%S", "%d.%m.%Y %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Cursor;

    #[test]
    fn missing_required_columns_are_listed() {
        let csv = "Timestamp,Qyteti\n2025-01-01,Prizren\n";
        match parse_rows(Cursor::new(csv)) {
            Err(SheetError::MissingColumns(columns)) => {
                assert_eq!(columns, vec![FULL_NAME.to_string(), EMAIL.to_string()]);
            }
            other => panic!("expected missing columns, got {other:?}"),
        }
    }

    #[test]
    fn header_whitespace_is_ignored() {
        let csv = " Emrin dhe Mbiemrin , Email Address \nBesa Gashi,besa@example.com\n";
        let rows = parse_rows(Cursor::new(csv)).expect("headers match after trimming");
        let application = rows[0].outcome.as_ref().expect("row decodes");
        assert_eq!(application.full_name, "Besa Gashi");
        assert_eq!(rows[0].row_number, 2);
    }

    #[test]
    fn citizenship_defaults_to_true_without_the_question() {
        let csv = "Emrin dhe Mbiemrin,Email Address\nBesa Gashi,besa@example.com\n";
        let rows = parse_rows(Cursor::new(csv)).unwrap();
        assert!(rows[0].outcome.as_ref().unwrap().is_kosovo_citizen);
    }

    #[test]
    fn citizenship_answers_are_read_when_asked() {
        let csv = "Emrin dhe Mbiemrin,Email Address,Jeni qytetar i Republikes së Kosoves?\n\
                   A,a@example.com,Po\n\
                   B,b@example.com,Jo\n\
                   C,c@example.com,\n";
        let rows = parse_rows(Cursor::new(csv)).unwrap();
        let answers: Vec<bool> = rows
            .iter()
            .map(|row| row.outcome.as_ref().unwrap().is_kosovo_citizen)
            .collect();
        assert_eq!(answers, vec![true, false, false]);
    }

    #[test]
    fn short_rows_leave_optional_fields_empty() {
        let csv = "Emrin dhe Mbiemrin,Email Address,Qyteti\nBesa Gashi,besa@example.com\n";
        let rows = parse_rows(Cursor::new(csv)).unwrap();
        let application = rows[0].outcome.as_ref().expect("short row decodes");
        assert_eq!(application.city, "");
    }

    #[test]
    fn timestamps_accept_form_export_layouts() {
        let expected = Utc.with_ymd_and_hms(2024, 11, 3, 14, 5, 9).unwrap();
        assert_eq!(parse_timestamp("11/3/2024 14:05:09"), Some(expected));
        assert_eq!(parse_timestamp("2024-11-03 14:05:09"), Some(expected));
        assert_eq!(parse_timestamp("2024-11-03T14:05:09Z"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-11-03"),
            Some(Utc.with_ymd_and_hms(2024, 11, 3, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
