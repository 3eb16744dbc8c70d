//! Bulk candidate intake from the application form's CSV export.

mod parser;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{Candidate, UploadStatus, ValidationError};
use super::repository::{CandidateRepository, RepositoryError};
use parser::{parse_rows, SheetError};

pub use parser::REQUIRED_COLUMNS;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read upload: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<SheetError> for ImportError {
    fn from(err: SheetError) -> Self {
        match err {
            SheetError::MissingColumns(columns) => Self::MissingColumns(columns),
            SheetError::Csv(err) => Self::Csv(err),
        }
    }
}

/// Row-level tally of one upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub processed: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl ImportSummary {
    pub fn status(&self) -> UploadStatus {
        if self.errors.is_empty() {
            UploadStatus::Completed
        } else {
            UploadStatus::CompletedWithErrors
        }
    }

    pub fn error_log(&self) -> String {
        if self.errors.is_empty() {
            "All records processed successfully".to_string()
        } else {
            self.errors.join("\n")
        }
    }

    pub fn message(&self) -> String {
        let mut parts = Vec::new();
        if self.processed > 0 {
            parts.push(format!(
                "Successfully processed {} new candidates",
                self.processed
            ));
        }
        if self.skipped > 0 {
            parts.push(format!("Skipped {} existing candidates", self.skipped));
        }
        let mut message = parts.join(" | ");
        if !self.errors.is_empty() {
            message.push_str(&format!(". {} errors found.", self.errors.len()));
        }
        message
    }
}

/// Creates candidates from form rows. Only the email is required; existing emails are skipped,
/// never overwritten.
pub struct CandidateImporter<'a, R: CandidateRepository + ?Sized> {
    repository: &'a R,
}

impl<'a, R: CandidateRepository + ?Sized> CandidateImporter<'a, R> {
    pub fn new(repository: &'a R) -> Self {
        Self { repository }
    }

    pub fn import_path(
        &self,
        path: impl AsRef<Path>,
        now: DateTime<Utc>,
    ) -> Result<ImportSummary, ImportError> {
        let file = File::open(path)?;
        self.import_reader(file, now)
    }

    pub fn import_reader<T: Read>(
        &self,
        reader: T,
        now: DateTime<Utc>,
    ) -> Result<ImportSummary, ImportError> {
        let rows = parse_rows(reader)?;
        let mut summary = ImportSummary::default();

        for row in rows {
            let application = match row.outcome {
                Ok(application) => application.trimmed(),
                Err(reason) => {
                    summary.errors.push(format!("Row {}: {}", row.row_number, reason));
                    continue;
                }
            };
            if application.email.is_empty() {
                summary.errors.push(format!(
                    "Row {}: {}",
                    row.row_number,
                    ValidationError::MissingEmail
                ));
                continue;
            }

            if self
                .repository
                .fetch_candidate_by_email(&application.email)?
                .is_some()
            {
                summary.skipped += 1;
                summary.errors.push(format!(
                    "Row {}: Candidate with email {} already exists",
                    row.row_number, application.email
                ));
                continue;
            }

            let email = application.email.clone();
            match self
                .repository
                .insert_candidate(Candidate::from_application(application, now))
            {
                Ok(candidate) => {
                    tracing::debug!(
                        candidate = %candidate.id,
                        row = row.row_number,
                        "imported candidate"
                    );
                    summary.processed += 1;
                }
                Err(err) if err.is_constraint_violation() => {
                    summary.skipped += 1;
                    summary.errors.push(format!(
                        "Row {}: Candidate with email {} already exists",
                        row.row_number, email
                    ));
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(summary)
    }
}
