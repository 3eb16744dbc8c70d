use super::domain::{
    BulkUpload, Candidate, CandidateId, Document, DocumentId, Lodge, LodgeId, Member,
    MemberDocument, MemberId, Stage,
};
use super::voting::{Vote, VoteTally};

/// Storage for candidates. Email addresses are unique.
pub trait CandidateRepository: Send + Sync {
    /// Assigns the id; `candidate.id` on input is ignored.
    fn insert_candidate(&self, candidate: Candidate) -> Result<Candidate, RepositoryError>;
    fn update_candidate(&self, candidate: Candidate) -> Result<(), RepositoryError>;
    fn fetch_candidate(&self, id: CandidateId) -> Result<Option<Candidate>, RepositoryError>;
    fn fetch_candidate_by_email(&self, email: &str) -> Result<Option<Candidate>, RepositoryError>;
    /// Newest application first, optionally restricted to one stage.
    fn list_candidates(&self, stage: Option<Stage>) -> Result<Vec<Candidate>, RepositoryError>;
}

/// Ballot storage. Enforces one ballot per (candidate, voter, stage, level).
pub trait VoteRepository: VoteTally + Send + Sync {
    fn insert_vote(&self, vote: Vote) -> Result<Vote, RepositoryError>;
    fn votes_for(&self, candidate: CandidateId) -> Result<Vec<Vote>, RepositoryError>;
}

/// Members and lodges.
pub trait DirectoryRepository: Send + Sync {
    fn insert_member(&self, member: Member) -> Result<Member, RepositoryError>;
    fn fetch_member(&self, id: MemberId) -> Result<Option<Member>, RepositoryError>;
    fn fetch_member_by_username(&self, username: &str) -> Result<Option<Member>, RepositoryError>;
    fn insert_lodge(&self, lodge: Lodge) -> Result<Lodge, RepositoryError>;
    fn fetch_lodge(&self, id: LodgeId) -> Result<Option<Lodge>, RepositoryError>;
    fn list_lodges(&self) -> Result<Vec<Lodge>, RepositoryError>;
    fn add_lodge_member(&self, lodge: LodgeId, member: MemberId) -> Result<Lodge, RepositoryError>;
}

/// Candidate documents, member documents and bulk upload audit records.
pub trait RecordRepository: Send + Sync {
    fn insert_document(&self, document: Document) -> Result<Document, RepositoryError>;
    fn update_document(&self, document: Document) -> Result<(), RepositoryError>;
    fn fetch_document(&self, id: DocumentId) -> Result<Option<Document>, RepositoryError>;
    fn documents_for(&self, candidate: CandidateId) -> Result<Vec<Document>, RepositoryError>;
    fn insert_member_document(
        &self,
        document: MemberDocument,
    ) -> Result<MemberDocument, RepositoryError>;
    fn delete_member_document(&self, id: DocumentId) -> Result<MemberDocument, RepositoryError>;
    fn recent_member_documents(&self, limit: usize) -> Result<Vec<MemberDocument>, RepositoryError>;
    fn insert_upload(&self, upload: BulkUpload) -> Result<BulkUpload, RepositoryError>;
    fn recent_uploads(&self, limit: usize) -> Result<Vec<BulkUpload>, RepositoryError>;
}

/// Everything the membership service needs from a backing store.
pub trait MembershipStore:
    CandidateRepository + VoteRepository + DirectoryRepository + RecordRepository
{
}

impl<T> MembershipStore for T where
    T: CandidateRepository + VoteRepository + DirectoryRepository + RecordRepository
{
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("constraint violated: {constraint}")]
    ConstraintViolation { constraint: &'static str },
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, RepositoryError::ConstraintViolation { .. })
    }
}
