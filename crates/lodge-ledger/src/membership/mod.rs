//! Candidates, lodges, ballots and the decision rule that reads them.

pub mod access;
pub mod domain;
pub mod import;
pub mod repository;
pub mod service;
pub mod store;
pub mod voting;

#[cfg(test)]
mod tests;

pub use access::{can_cast_vote, can_manage_candidates, AccessError};
pub use domain::{
    BulkUpload, Candidate, CandidateApplication, CandidateId, CandidateUpdate, Document, DocumentId,
    Lodge, LodgeId, Member, MemberDocument, MemberDocumentKind, MemberId, MemberRegistration,
    Position, Stage, UnknownVariant, UploadId, UploadStatus, ValidationError, VoteId,
};
pub use import::{CandidateImporter, ImportError, ImportSummary};
pub use repository::{
    CandidateRepository, DirectoryRepository, MembershipStore, RecordRepository, RepositoryError,
    VoteRepository,
};
pub use service::{
    BulkUploadReport, CandidateOverview, CandidatePage, ControlPanel, MemberDocumentUpload,
    MembershipService, ServiceError, StageDecision,
};
pub use store::{InMemoryStore, SnapshotError, StoreSnapshot};
pub use voting::{
    DecisionEvaluator, DecisionStatus, ValueMatch, Vote, VoteBallot, VoteFilter, VoteKey, VoteLevel,
    VoteTally, VoteValue,
};
