use std::collections::BTreeSet;
use std::io::Read;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::access::{can_cast_vote, require_manager, AccessError};
use super::domain::{
    normalize_email, BulkUpload, Candidate, CandidateApplication, CandidateId, CandidateUpdate,
    Document, DocumentId, Lodge, LodgeId, Member, MemberDocument, MemberDocumentKind, MemberId,
    MemberRegistration, Stage, UploadId, UploadStatus, ValidationError,
};
use super::import::{CandidateImporter, ImportError, ImportSummary};
use super::repository::{MembershipStore, RepositoryError};
use super::voting::{DecisionEvaluator, DecisionStatus, Vote, VoteBallot, VoteLevel};
use crate::config::{ListingConfig, PAGE_SIZES};

const RECENT_MEMBER_DOCUMENTS: usize = 10;
const RECENT_UPLOADS: usize = 5;

/// Service composing the store, access checks and the decision rule.
pub struct MembershipService<S> {
    store: Arc<S>,
    listing: ListingConfig,
}

impl<S> MembershipService<S>
where
    S: MembershipStore + 'static,
{
    pub fn new(store: Arc<S>, listing: ListingConfig) -> Self {
        Self { store, listing }
    }

    /// Resolves the acting member by username.
    pub fn authenticate(&self, username: &str) -> Result<Member, ServiceError> {
        self.store
            .fetch_member_by_username(username.trim())?
            .ok_or_else(|| ServiceError::UnknownMember(username.trim().to_string()))
    }

    // --- candidates -----------------------------------------------------------------------

    pub fn submit_application(
        &self,
        application: CandidateApplication,
    ) -> Result<Candidate, ServiceError> {
        let application = application.normalized()?;
        let candidate = self
            .store
            .insert_candidate(Candidate::from_application(application, Utc::now()))?;
        info!(candidate = %candidate.id, email = %candidate.email, "application submitted");
        Ok(candidate)
    }

    pub fn candidate(&self, id: CandidateId) -> Result<Candidate, ServiceError> {
        self.store
            .fetch_candidate(id)?
            .ok_or(ServiceError::CandidateNotFound(id))
    }

    pub fn update_candidate(
        &self,
        actor: &Member,
        id: CandidateId,
        update: CandidateUpdate,
    ) -> Result<Candidate, ServiceError> {
        self.guard(actor, "edit candidate profiles")?;
        if update.is_empty() {
            return Err(ValidationError::EmptyUpdate.into());
        }
        let mut candidate = self.candidate(id)?;

        let CandidateUpdate {
            full_name,
            email,
            phone_number,
            address,
            city,
            social_profile_url,
            social_profile_url2,
            is_kosovo_citizen,
            current_stage,
        } = update;

        if let Some(full_name) = full_name {
            let full_name = full_name.trim().to_string();
            if full_name.is_empty() {
                return Err(ValidationError::MissingName.into());
            }
            candidate.full_name = full_name;
        }
        if let Some(email) = email {
            candidate.email = normalize_email(&email)?;
        }
        for (slot, value) in [
            (&mut candidate.phone_number, phone_number),
            (&mut candidate.address, address),
            (&mut candidate.city, city),
            (&mut candidate.social_profile_url, social_profile_url),
            (&mut candidate.social_profile_url2, social_profile_url2),
        ] {
            if let Some(value) = value {
                *slot = value.trim().to_string();
            }
        }
        if let Some(is_kosovo_citizen) = is_kosovo_citizen {
            candidate.is_kosovo_citizen = is_kosovo_citizen;
        }
        if let Some(stage) = current_stage {
            if stage != candidate.current_stage {
                info!(
                    candidate = %id,
                    from = %candidate.current_stage,
                    to = %stage,
                    actor = %actor.username,
                    "stage changed"
                );
            }
            candidate.current_stage = stage;
        }

        candidate.last_updated = Utc::now();
        self.store.update_candidate(candidate.clone())?;
        info!(candidate = %id, actor = %actor.username, "candidate profile updated");
        Ok(candidate)
    }

    /// Moves a candidate to any stage. Votes never trigger this on their own.
    pub fn set_stage(
        &self,
        actor: &Member,
        id: CandidateId,
        stage: Stage,
    ) -> Result<Candidate, ServiceError> {
        self.update_candidate(
            actor,
            id,
            CandidateUpdate {
                current_stage: Some(stage),
                ..CandidateUpdate::default()
            },
        )
    }

    pub fn advance_stage(
        &self,
        actor: &Member,
        id: CandidateId,
    ) -> Result<Candidate, ServiceError> {
        self.guard(actor, "advance candidates")?;
        let current = self.candidate(id)?.current_stage;
        let next = current
            .next()
            .ok_or(ValidationError::NoFurtherStage(current))?;
        self.set_stage(actor, id, next)
    }

    pub fn record_interview(
        &self,
        actor: &Member,
        id: CandidateId,
        interview_date: DateTime<Utc>,
        passed: Option<bool>,
    ) -> Result<Candidate, ServiceError> {
        self.guard(actor, "record interviews")?;
        let mut candidate = self.candidate(id)?;
        candidate.interview_date = Some(interview_date);
        candidate.interview_passed = passed;
        candidate.last_updated = Utc::now();
        self.store.update_candidate(candidate.clone())?;
        info!(candidate = %id, passed = ?passed, "interview recorded");
        Ok(candidate)
    }

    /// Newest applications first. Pages are 1-based; a page past the end is empty.
    pub fn list_candidates(
        &self,
        stage: Option<Stage>,
        page: usize,
        page_size: Option<usize>,
    ) -> Result<CandidatePage, ServiceError> {
        let page_size = page_size.unwrap_or(self.listing.page_size);
        if !PAGE_SIZES.contains(&page_size) {
            return Err(ValidationError::PageSize(page_size).into());
        }

        let all = self.store.list_candidates(stage)?;
        let total = all.len();
        let total_pages = total.div_ceil(page_size).max(1);
        let page = page.max(1);
        let candidates = all
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();

        Ok(CandidatePage {
            candidates,
            page,
            page_size,
            total,
            total_pages,
        })
    }

    pub fn candidate_overview(&self, id: CandidateId) -> Result<CandidateOverview, ServiceError> {
        let candidate = self.candidate(id)?;
        let documents = self.store.documents_for(id)?;
        let votes = self.store.votes_for(id)?;

        let stages: BTreeSet<Stage> = votes.iter().map(|vote| vote.stage).collect();
        let evaluator = DecisionEvaluator::new(votes.as_slice());
        let decisions = stages
            .into_iter()
            .map(|stage| {
                evaluator
                    .status(id, stage)
                    .map(|status| StageDecision { stage, status })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CandidateOverview {
            candidate,
            documents,
            votes_cast: votes.len(),
            decisions,
        })
    }

    // --- voting ---------------------------------------------------------------------------

    /// Records a ballot. A second ballot for the same tuple surfaces the store's constraint error.
    pub fn cast_vote(&self, voter: &Member, ballot: VoteBallot) -> Result<Vote, ServiceError> {
        self.candidate(ballot.candidate)?;
        let lodge = self.lodge(ballot.lodge)?;
        if !can_cast_vote(voter, &lodge, ballot.level) {
            warn!(
                voter = %voter.username,
                lodge = %lodge.name,
                level = %ballot.level,
                "vote refused"
            );
            let action = match ballot.level {
                VoteLevel::Lodge => format!("vote for lodge {}", lodge.name),
                VoteLevel::GrandLodge => "vote at grand lodge level".to_string(),
            };
            return Err(AccessError::forbidden(voter, action).into());
        }

        let vote = Vote {
            id: Default::default(),
            candidate: ballot.candidate,
            voter: voter.id,
            lodge: ballot.lodge,
            value: ballot.value,
            level: ballot.level,
            stage: ballot.stage,
            timestamp: Utc::now(),
            comments: ballot.comments.trim().to_string(),
        };

        match self.store.insert_vote(vote) {
            Ok(vote) => {
                info!(
                    candidate = %vote.candidate,
                    voter = %voter.username,
                    stage = %vote.stage,
                    level = %vote.level,
                    "vote recorded"
                );
                Ok(vote)
            }
            Err(err) => {
                if err.is_constraint_violation() {
                    warn!(
                        candidate = %ballot.candidate,
                        voter = %voter.username,
                        "duplicate vote rejected"
                    );
                }
                Err(err.into())
            }
        }
    }

    pub fn is_unanimous(
        &self,
        id: CandidateId,
        stage: Stage,
        level: VoteLevel,
    ) -> Result<bool, ServiceError> {
        Ok(DecisionEvaluator::new(self.store.as_ref()).is_unanimous(id, stage, level)?)
    }

    pub fn final_decision(&self, id: CandidateId, stage: Stage) -> Result<bool, ServiceError> {
        Ok(DecisionEvaluator::new(self.store.as_ref()).final_decision(id, stage)?)
    }

    pub fn decision_status(
        &self,
        id: CandidateId,
        stage: Stage,
    ) -> Result<DecisionStatus, ServiceError> {
        self.candidate(id)?;
        Ok(DecisionEvaluator::new(self.store.as_ref()).status(id, stage)?)
    }

    // --- directory ------------------------------------------------------------------------

    pub fn register_member(
        &self,
        registration: MemberRegistration,
    ) -> Result<Member, ServiceError> {
        let username = registration.username.trim().to_string();
        if username.is_empty() {
            return Err(ValidationError::MissingField("username").into());
        }
        if let Some(lodge) = registration.primary_lodge {
            self.lodge(lodge)?;
        }

        let member = self.store.insert_member(Member {
            id: MemberId::default(),
            username,
            first_name: registration.first_name.trim().to_string(),
            last_name: registration.last_name.trim().to_string(),
            email: registration.email.trim().to_lowercase(),
            position: registration.position,
            is_dignitary: registration.is_dignitary,
            is_senior_member: registration.is_senior_member,
            is_lodge_member: registration.primary_lodge.is_some(),
            primary_lodge: registration.primary_lodge,
            phone_number: String::new(),
            address: String::new(),
            city: String::new(),
        })?;

        if let Some(lodge) = member.primary_lodge {
            self.store.add_lodge_member(lodge, member.id)?;
        }
        info!(member = %member.username, position = member.position.code(), "member registered");
        Ok(member)
    }

    pub fn create_lodge(&self, name: &str) -> Result<Lodge, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingField("lodge name").into());
        }
        let lodge = self.store.insert_lodge(Lodge {
            id: LodgeId::default(),
            name: name.to_string(),
            members: BTreeSet::new(),
        })?;
        info!(lodge = %lodge.id, name = %lodge.name, "lodge created");
        Ok(lodge)
    }

    pub fn add_lodge_member(
        &self,
        lodge: LodgeId,
        member: MemberId,
    ) -> Result<Lodge, ServiceError> {
        self.lodge(lodge)?;
        self.store
            .fetch_member(member)?
            .ok_or(ServiceError::MemberNotFound(member))?;
        Ok(self.store.add_lodge_member(lodge, member)?)
    }

    pub fn lodge(&self, id: LodgeId) -> Result<Lodge, ServiceError> {
        self.store
            .fetch_lodge(id)?
            .ok_or(ServiceError::LodgeNotFound(id))
    }

    pub fn lodges(&self) -> Result<Vec<Lodge>, ServiceError> {
        Ok(self.store.list_lodges()?)
    }

    // --- documents and uploads -------------------------------------------------------------

    pub fn attach_document(
        &self,
        actor: &Member,
        candidate: CandidateId,
        name: &str,
        storage_ref: &str,
    ) -> Result<Document, ServiceError> {
        self.guard(actor, "attach candidate documents")?;
        self.candidate(candidate)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingField("document name").into());
        }
        let document = self.store.insert_document(Document {
            id: DocumentId::default(),
            candidate,
            name: name.to_string(),
            storage_ref: storage_ref.trim().to_string(),
            uploaded_at: Utc::now(),
            verified: false,
        })?;
        info!(candidate = %candidate, document = %document.id, "candidate document attached");
        Ok(document)
    }

    pub fn verify_document(
        &self,
        actor: &Member,
        id: DocumentId,
    ) -> Result<Document, ServiceError> {
        self.guard(actor, "verify candidate documents")?;
        let mut document = self
            .store
            .fetch_document(id)?
            .ok_or(ServiceError::DocumentNotFound(id))?;
        document.verified = true;
        self.store.update_document(document.clone())?;
        info!(document = %id, actor = %actor.username, "candidate document verified");
        Ok(document)
    }

    pub fn upload_member_document(
        &self,
        actor: &Member,
        upload: MemberDocumentUpload,
    ) -> Result<MemberDocument, ServiceError> {
        self.guard(actor, "upload member documents")?;
        self.store
            .fetch_member(upload.member)?
            .ok_or(ServiceError::MemberNotFound(upload.member))?;
        let title = upload.title.trim();
        if title.is_empty() {
            return Err(ValidationError::MissingField("title").into());
        }

        let now = Utc::now();
        let document = self.store.insert_member_document(MemberDocument {
            id: DocumentId::default(),
            member: upload.member,
            kind: upload.kind,
            title: title.to_string(),
            description: upload.description.trim().to_string(),
            storage_ref: upload.storage_ref.trim().to_string(),
            uploaded_by: Some(actor.id),
            uploaded_at: now,
            updated_at: now,
        })?;
        info!(
            document = %document.id,
            member = %document.member,
            actor = %actor.username,
            "member document uploaded"
        );
        Ok(document)
    }

    pub fn delete_member_document(
        &self,
        actor: &Member,
        id: DocumentId,
    ) -> Result<MemberDocument, ServiceError> {
        self.guard(actor, "delete member documents")?;
        let document = self
            .store
            .delete_member_document(id)
            .map_err(|err| match err {
                RepositoryError::NotFound => ServiceError::DocumentNotFound(id),
                other => other.into(),
            })?;
        info!(document = %id, actor = %actor.username, "member document deleted");
        Ok(document)
    }

    /// Runs a bulk import and records its outcome, including sheet-level failures.
    pub fn import_candidates<R: Read>(
        &self,
        actor: &Member,
        source: &str,
        reader: R,
    ) -> Result<BulkUploadReport, ServiceError> {
        self.guard(actor, "import candidates")?;
        let now = Utc::now();
        let mut upload = BulkUpload {
            id: UploadId::default(),
            source: source.to_string(),
            uploaded_by: Some(actor.id),
            uploaded_at: now,
            status: UploadStatus::Pending,
            processed_count: 0,
            error_log: String::new(),
        };

        let summary = match CandidateImporter::new(self.store.as_ref()).import_reader(reader, now) {
            Ok(summary) => summary,
            Err(err) => {
                upload.status = UploadStatus::Failed;
                upload.error_log = err.to_string();
                if let Err(record_err) = self.store.insert_upload(upload) {
                    warn!(error = %record_err, "could not record failed upload");
                }
                warn!(source, error = %err, "bulk upload failed");
                return Err(err.into());
            }
        };

        upload.status = summary.status();
        upload.processed_count = summary.processed;
        upload.error_log = summary.error_log();
        let upload = self.store.insert_upload(upload)?;
        info!(
            upload = %upload.id,
            processed = summary.processed,
            skipped = summary.skipped,
            errors = summary.errors.len(),
            "bulk upload processed"
        );

        Ok(BulkUploadReport { upload, summary })
    }

    pub fn control_panel(&self, actor: &Member) -> Result<ControlPanel, ServiceError> {
        self.guard(actor, "open the control panel")?;
        Ok(ControlPanel {
            lodges: self.store.list_lodges()?,
            recent_documents: self.store.recent_member_documents(RECENT_MEMBER_DOCUMENTS)?,
            recent_uploads: self.store.recent_uploads(RECENT_UPLOADS)?,
        })
    }

    fn guard(&self, actor: &Member, action: &str) -> Result<(), ServiceError> {
        require_manager(actor, action).map_err(|err| {
            warn!(actor = %actor.username, action, "access denied");
            ServiceError::from(err)
        })
    }
}

/// One page of the candidate list.
#[derive(Debug, Clone, Serialize)]
pub struct CandidatePage {
    pub candidates: Vec<Candidate>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageDecision {
    pub stage: Stage,
    pub status: DecisionStatus,
}

/// Detail view of a candidate with the standing of every stage that has ballots.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateOverview {
    pub candidate: Candidate,
    pub documents: Vec<Document>,
    pub votes_cast: usize,
    pub decisions: Vec<StageDecision>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDocumentUpload {
    pub member: MemberId,
    pub kind: MemberDocumentKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub storage_ref: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkUploadReport {
    pub upload: BulkUpload,
    pub summary: ImportSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControlPanel {
    pub lodges: Vec<Lodge>,
    pub recent_documents: Vec<MemberDocument>,
    pub recent_uploads: Vec<BulkUpload>,
}

/// Error raised by the membership service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("candidate {0} not found")]
    CandidateNotFound(CandidateId),
    #[error("member {0} not found")]
    MemberNotFound(MemberId),
    #[error("lodge {0} not found")]
    LodgeNotFound(LodgeId),
    #[error("document {0} not found")]
    DocumentNotFound(DocumentId),
    #[error("no member named '{0}'")]
    UnknownMember(String),
}

impl ServiceError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, ServiceError::Repository(err) if err.is_constraint_violation())
    }
}
