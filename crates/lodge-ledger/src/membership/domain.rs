use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            Default,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Store-assigned identifier for a candidate.
    CandidateId
);
record_id!(MemberId);
record_id!(LodgeId);
record_id!(VoteId);
record_id!(DocumentId);
record_id!(UploadId);

/// Raised when a textual enum value does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Uppercases and folds `-`/space separators into `_` so `lodge-review` matches `LODGE_REVIEW`.
pub(crate) fn normalize_variant(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|ch| match ch {
            '-' | ' ' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

/// Position of a candidate in the application pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Applied,
    Documents,
    Interview,
    LodgeReview,
    Voting,
    Accepted,
    Rejected,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Applied,
        Stage::Documents,
        Stage::Interview,
        Stage::LodgeReview,
        Stage::Voting,
        Stage::Accepted,
        Stage::Rejected,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Stage::Applied => "APPLIED",
            Stage::Documents => "DOCUMENTS",
            Stage::Interview => "INTERVIEW",
            Stage::LodgeReview => "LODGE_REVIEW",
            Stage::Voting => "VOTING",
            Stage::Accepted => "ACCEPTED",
            Stage::Rejected => "REJECTED",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Applied => "Application Submitted",
            Stage::Documents => "Document Review",
            Stage::Interview => "Interview Stage",
            Stage::LodgeReview => "Lodge Review",
            Stage::Voting => "Final Voting",
            Stage::Accepted => "Accepted",
            Stage::Rejected => "Rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Accepted | Stage::Rejected)
    }

    /// Linear successor. Voting has none because leadership picks the outcome.
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Applied => Some(Stage::Documents),
            Stage::Documents => Some(Stage::Interview),
            Stage::Interview => Some(Stage::LodgeReview),
            Stage::LodgeReview => Some(Stage::Voting),
            Stage::Voting | Stage::Accepted | Stage::Rejected => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Stage {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_variant(value);
        Stage::ALL
            .into_iter()
            .find(|stage| stage.code() == normalized)
            .ok_or_else(|| UnknownVariant {
                kind: "stage",
                value: value.to_string(),
            })
    }
}

/// Prospective member tracked through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub email: String,
    pub full_name: String,
    pub phone_number: String,
    pub address: String,
    pub city: String,
    pub is_kosovo_citizen: bool,
    pub social_profile_url: String,
    pub social_profile_url2: String,
    pub current_stage: Stage,
    pub created_at: DateTime<Utc>,
    pub application_date: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub interview_date: Option<DateTime<Utc>>,
    pub interview_passed: Option<bool>,
}

/// Submission payload for a new candidate, whether typed in or imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateApplication {
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default = "default_citizenship")]
    pub is_kosovo_citizen: bool,
    #[serde(default)]
    pub social_profile_url: String,
    #[serde(default)]
    pub social_profile_url2: String,
    #[serde(default)]
    pub application_date: Option<DateTime<Utc>>,
}

fn default_citizenship() -> bool {
    true
}

impl CandidateApplication {
    pub fn new(email: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            full_name: full_name.into(),
            phone_number: String::new(),
            address: String::new(),
            city: String::new(),
            is_kosovo_citizen: true,
            social_profile_url: String::new(),
            social_profile_url2: String::new(),
            application_date: None,
        }
    }

    /// Trims every field and lowercases the email, rejecting applications without identity.
    pub fn normalized(self) -> Result<Self, ValidationError> {
        let mut application = self.trimmed();
        application.email = normalize_email(&application.email)?;
        if application.full_name.is_empty() {
            return Err(ValidationError::MissingName);
        }
        Ok(application)
    }

    /// Whitespace and case cleanup only. Form imports accept whatever else the sheet holds.
    pub fn trimmed(mut self) -> Self {
        self.email = self.email.trim().to_lowercase();
        for field in [
            &mut self.full_name,
            &mut self.phone_number,
            &mut self.address,
            &mut self.city,
            &mut self.social_profile_url,
            &mut self.social_profile_url2,
        ] {
            *field = field.trim().to_string();
        }
        self
    }
}

pub(crate) fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(ValidationError::MissingEmail);
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(ValidationError::InvalidEmail(email)),
    }
}

/// Rejected candidate input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Email is required")]
    MissingEmail,
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
    #[error("Full name is required")]
    MissingName,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("no changes given")]
    EmptyUpdate,
    #[error("candidate is already at {0}")]
    NoFurtherStage(Stage),
    #[error("page size {0} is not offered (choose 10, 20, 50 or 100)")]
    PageSize(usize),
}

impl Candidate {
    /// Fresh candidate at APPLIED. The store assigns the id.
    pub fn from_application(application: CandidateApplication, now: DateTime<Utc>) -> Self {
        Self {
            id: CandidateId(0),
            email: application.email,
            full_name: application.full_name,
            phone_number: application.phone_number,
            address: application.address,
            city: application.city,
            is_kosovo_citizen: application.is_kosovo_citizen,
            social_profile_url: application.social_profile_url,
            social_profile_url2: application.social_profile_url2,
            current_stage: Stage::Applied,
            created_at: now,
            application_date: application.application_date.unwrap_or(now),
            last_updated: now,
            interview_date: None,
            interview_passed: None,
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.full_name, self.current_stage.label())
    }
}

/// Partial edit of a candidate profile; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub social_profile_url: Option<String>,
    pub social_profile_url2: Option<String>,
    pub is_kosovo_citizen: Option<bool>,
    pub current_stage: Option<Stage>,
}

impl CandidateUpdate {
    pub fn is_empty(&self) -> bool {
        self == &CandidateUpdate::default()
    }
}

/// Office held by a member. Serialized with the organization's short codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "FNMM")]
    GrandMaster,
    #[serde(rename = "ZFNMM")]
    DeputyGrandMaster,
    #[serde(rename = "FMB1")]
    SeniorGrandWarden,
    #[serde(rename = "FNMB2")]
    GrandJuniorWarden,
    #[serde(rename = "FNS")]
    GrandSecretary,
    #[serde(rename = "FNT")]
    GrandTreasurer,
    #[serde(rename = "FNO")]
    GrandOrator,
    #[serde(rename = "MN")]
    WorshipfulMaster,
    #[serde(rename = "MB1")]
    SeniorWarden,
    #[serde(rename = "MB2")]
    JuniorWarden,
    #[serde(rename = "SE")]
    Secretary,
    #[serde(rename = "TR")]
    Treasurer,
    #[serde(rename = "OR")]
    Orator,
    #[default]
    #[serde(rename = "Antare")]
    RegularMember,
}

impl Position {
    pub const ALL: [Position; 14] = [
        Position::GrandMaster,
        Position::DeputyGrandMaster,
        Position::SeniorGrandWarden,
        Position::GrandJuniorWarden,
        Position::GrandSecretary,
        Position::GrandTreasurer,
        Position::GrandOrator,
        Position::WorshipfulMaster,
        Position::SeniorWarden,
        Position::JuniorWarden,
        Position::Secretary,
        Position::Treasurer,
        Position::Orator,
        Position::RegularMember,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Position::GrandMaster => "FNMM",
            Position::DeputyGrandMaster => "ZFNMM",
            Position::SeniorGrandWarden => "FMB1",
            Position::GrandJuniorWarden => "FNMB2",
            Position::GrandSecretary => "FNS",
            Position::GrandTreasurer => "FNT",
            Position::GrandOrator => "FNO",
            Position::WorshipfulMaster => "MN",
            Position::SeniorWarden => "MB1",
            Position::JuniorWarden => "MB2",
            Position::Secretary => "SE",
            Position::Treasurer => "TR",
            Position::Orator => "OR",
            Position::RegularMember => "Antare",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Position::GrandMaster => "Grand Master",
            Position::DeputyGrandMaster => "Deputy Grand Master",
            Position::SeniorGrandWarden => "Senior Grand Warden",
            Position::GrandJuniorWarden => "Grand Junior Warden",
            Position::GrandSecretary => "Grand Secretary",
            Position::GrandTreasurer => "Grand Treasurer",
            Position::GrandOrator => "Grand Orator",
            Position::WorshipfulMaster => "Worshipful Master",
            Position::SeniorWarden => "Senior Warden",
            Position::JuniorWarden => "Junior Warden",
            Position::Secretary => "Secretary",
            Position::Treasurer => "Treasurer",
            Position::Orator => "Orator",
            Position::RegularMember => "Regular Member",
        }
    }

    pub fn is_grand_office(&self) -> bool {
        matches!(
            self,
            Position::GrandMaster
                | Position::DeputyGrandMaster
                | Position::SeniorGrandWarden
                | Position::GrandJuniorWarden
                | Position::GrandSecretary
                | Position::GrandTreasurer
                | Position::GrandOrator
        )
    }
}

impl FromStr for Position {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Position::ALL
            .into_iter()
            .find(|position| position.code().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownVariant {
                kind: "position",
                value: value.to_string(),
            })
    }
}

/// Authenticated member identity carrying the role flags used by access checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub position: Position,
    pub is_dignitary: bool,
    pub is_senior_member: bool,
    pub is_lodge_member: bool,
    pub primary_lodge: Option<LodgeId>,
    pub phone_number: String,
    pub address: String,
    pub city: String,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_leadership(&self) -> bool {
        self.position != Position::RegularMember
    }

    pub fn is_grand_officer(&self) -> bool {
        self.position.is_grand_office()
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.full_name(), self.position.label())
    }
}

/// Registration payload for a member account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRegistration {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub is_dignitary: bool,
    #[serde(default)]
    pub is_senior_member: bool,
    #[serde(default)]
    pub primary_lodge: Option<LodgeId>,
}

/// Named lodge and its membership roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lodge {
    pub id: LodgeId,
    pub name: String,
    pub members: BTreeSet<MemberId>,
}

impl Lodge {
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn has_member(&self, member: MemberId) -> bool {
        self.members.contains(&member)
    }
}

/// Supporting document attached to a candidate. `storage_ref` is opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub candidate: CandidateId,
    pub name: String,
    pub storage_ref: String,
    pub uploaded_at: DateTime<Utc>,
    pub verified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberDocumentKind {
    Id,
    Passport,
    Certificate,
    Other,
}

impl MemberDocumentKind {
    pub fn label(&self) -> &'static str {
        match self {
            MemberDocumentKind::Id => "ID Card",
            MemberDocumentKind::Passport => "Passport",
            MemberDocumentKind::Certificate => "Certificate",
            MemberDocumentKind::Other => "Other Document",
        }
    }
}

impl FromStr for MemberDocumentKind {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalize_variant(value).as_str() {
            "ID" => Ok(Self::Id),
            "PASSPORT" => Ok(Self::Passport),
            "CERTIFICATE" => Ok(Self::Certificate),
            "OTHER" => Ok(Self::Other),
            _ => Err(UnknownVariant {
                kind: "document type",
                value: value.to_string(),
            }),
        }
    }
}

/// Document kept on file for a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDocument {
    pub id: DocumentId,
    pub member: MemberId,
    pub kind: MemberDocumentKind,
    pub title: String,
    pub description: String,
    pub storage_ref: String,
    pub uploaded_by: Option<MemberId>,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadStatus {
    #[default]
    Pending,
    Completed,
    CompletedWithErrors,
    Failed,
}

impl UploadStatus {
    pub fn label(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "PENDING",
            UploadStatus::Completed => "COMPLETED",
            UploadStatus::CompletedWithErrors => "COMPLETED_WITH_ERRORS",
            UploadStatus::Failed => "FAILED",
        }
    }
}

/// Audit record for one bulk candidate import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkUpload {
    pub id: UploadId,
    pub source: String,
    pub uploaded_by: Option<MemberId>,
    pub uploaded_at: DateTime<Utc>,
    pub status: UploadStatus,
    pub processed_count: usize,
    pub error_log: String,
}
