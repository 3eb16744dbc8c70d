use std::cmp::Reverse;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::domain::{
    BulkUpload, Candidate, CandidateId, Document, DocumentId, Lodge, LodgeId, Member,
    MemberDocument, MemberId, Stage, UploadId, VoteId,
};
use super::repository::{
    CandidateRepository, DirectoryRepository, RecordRepository, RepositoryError, VoteRepository,
};
use super::voting::{Vote, VoteFilter, VoteTally};

const CANDIDATE_EMAIL_UNIQUE: &str = "candidate email must be unique";
const VOTE_BALLOT_UNIQUE: &str = "one vote per candidate, voter, stage and level";
const MEMBER_USERNAME_UNIQUE: &str = "member username must be unique";

/// Serialized form of the whole store. Ids share a single sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub sequence: u64,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub votes: Vec<Vote>,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub lodges: Vec<Lodge>,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub member_documents: Vec<MemberDocument>,
    #[serde(default)]
    pub uploads: Vec<BulkUpload>,
}

impl StoreSnapshot {
    fn next_id(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to access snapshot {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot {path} is not valid JSON: {source}")]
    Format {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("snapshot {path} changed on disk since it was loaded; rerun the command")]
    Stale { path: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Mutex-guarded store persisted as a single JSON document.
///
/// Remembers the file contents it was loaded from (or last saved), so a save never
/// overwrites records another process wrote in between.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreSnapshot>>,
    on_disk: Arc<Mutex<Option<String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            state: Arc::new(Mutex::new(snapshot)),
            on_disk: Arc::default(),
        }
    }

    /// Loads a snapshot; a missing file yields an empty store.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let Some(raw) = read_snapshot(path)? else {
            tracing::debug!(path = %path.display(), "no snapshot on disk, starting empty");
            return Ok(Self::new());
        };

        let snapshot = serde_json::from_str(&raw).map_err(|source| SnapshotError::Format {
            path: path.display().to_string(),
            source,
        })?;
        let store = Self::from_snapshot(snapshot);
        *store.disk_guard()? = Some(raw);
        Ok(store)
    }

    /// Writes the snapshot through a temp file in the same directory, then renames it over
    /// `path`. Fails with [`SnapshotError::Stale`] when the file no longer holds what this
    /// store loaded or last saved.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        let io_error = |source| SnapshotError::Io {
            path: path.display().to_string(),
            source,
        };

        let mut on_disk = self.disk_guard()?;
        if read_snapshot(path)? != *on_disk {
            tracing::warn!(path = %path.display(), "snapshot changed since load, refusing to save");
            return Err(SnapshotError::Stale {
                path: path.display().to_string(),
            });
        }

        let snapshot = self.snapshot()?;
        let json = serde_json::to_string_pretty(&snapshot).map_err(|source| SnapshotError::Format {
            path: path.display().to_string(),
            source,
        })?;

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(parent).map_err(io_error)?;
        tmp.write_all(json.as_bytes()).map_err(io_error)?;
        tmp.as_file().sync_all().map_err(io_error)?;
        tmp.persist(path).map_err(|err| io_error(err.error))?;

        *on_disk = Some(json);
        Ok(())
    }

    pub fn snapshot(&self) -> Result<StoreSnapshot, RepositoryError> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreSnapshot>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }

    fn disk_guard(&self) -> Result<MutexGuard<'_, Option<String>>, RepositoryError> {
        self.on_disk
            .lock()
            .map_err(|_| RepositoryError::Unavailable("snapshot mutex poisoned".to_string()))
    }
}

/// Current file contents, `None` when there is no file yet.
fn read_snapshot(path: &Path) -> Result<Option<String>, SnapshotError> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(SnapshotError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

impl CandidateRepository for InMemoryStore {
    fn insert_candidate(&self, mut candidate: Candidate) -> Result<Candidate, RepositoryError> {
        let mut state = self.lock()?;
        if state
            .candidates
            .iter()
            .any(|existing| existing.email == candidate.email)
        {
            return Err(RepositoryError::ConstraintViolation {
                constraint: CANDIDATE_EMAIL_UNIQUE,
            });
        }
        candidate.id = CandidateId(state.next_id());
        state.candidates.push(candidate.clone());
        Ok(candidate)
    }

    fn update_candidate(&self, candidate: Candidate) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state
            .candidates
            .iter()
            .any(|existing| existing.id != candidate.id && existing.email == candidate.email)
        {
            return Err(RepositoryError::ConstraintViolation {
                constraint: CANDIDATE_EMAIL_UNIQUE,
            });
        }
        let slot = state
            .candidates
            .iter_mut()
            .find(|existing| existing.id == candidate.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = candidate;
        Ok(())
    }

    fn fetch_candidate(&self, id: CandidateId) -> Result<Option<Candidate>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.candidates.iter().find(|c| c.id == id).cloned())
    }

    fn fetch_candidate_by_email(&self, email: &str) -> Result<Option<Candidate>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.candidates.iter().find(|c| c.email == email).cloned())
    }

    fn list_candidates(&self, stage: Option<Stage>) -> Result<Vec<Candidate>, RepositoryError> {
        let state = self.lock()?;
        let mut candidates: Vec<Candidate> = state
            .candidates
            .iter()
            .filter(|c| stage.map_or(true, |stage| c.current_stage == stage))
            .cloned()
            .collect();
        candidates.sort_by_key(|c| Reverse((c.application_date, c.id)));
        Ok(candidates)
    }
}

impl VoteTally for InMemoryStore {
    fn count_votes(&self, filter: &VoteFilter) -> Result<usize, RepositoryError> {
        let state = self.lock()?;
        state.votes.as_slice().count_votes(filter)
    }
}

impl VoteRepository for InMemoryStore {
    fn insert_vote(&self, mut vote: Vote) -> Result<Vote, RepositoryError> {
        let mut state = self.lock()?;
        let key = vote.key();
        if state.votes.iter().any(|existing| existing.key() == key) {
            return Err(RepositoryError::ConstraintViolation {
                constraint: VOTE_BALLOT_UNIQUE,
            });
        }
        vote.id = VoteId(state.next_id());
        state.votes.push(vote.clone());
        Ok(vote)
    }

    fn votes_for(&self, candidate: CandidateId) -> Result<Vec<Vote>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .votes
            .iter()
            .filter(|vote| vote.candidate == candidate)
            .cloned()
            .collect())
    }
}

impl DirectoryRepository for InMemoryStore {
    fn insert_member(&self, mut member: Member) -> Result<Member, RepositoryError> {
        let mut state = self.lock()?;
        if state
            .members
            .iter()
            .any(|existing| existing.username == member.username)
        {
            return Err(RepositoryError::ConstraintViolation {
                constraint: MEMBER_USERNAME_UNIQUE,
            });
        }
        member.id = MemberId(state.next_id());
        state.members.push(member.clone());
        Ok(member)
    }

    fn fetch_member(&self, id: MemberId) -> Result<Option<Member>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.members.iter().find(|m| m.id == id).cloned())
    }

    fn fetch_member_by_username(&self, username: &str) -> Result<Option<Member>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.members.iter().find(|m| m.username == username).cloned())
    }

    fn insert_lodge(&self, mut lodge: Lodge) -> Result<Lodge, RepositoryError> {
        let mut state = self.lock()?;
        lodge.id = LodgeId(state.next_id());
        state.lodges.push(lodge.clone());
        Ok(lodge)
    }

    fn fetch_lodge(&self, id: LodgeId) -> Result<Option<Lodge>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.lodges.iter().find(|l| l.id == id).cloned())
    }

    fn list_lodges(&self) -> Result<Vec<Lodge>, RepositoryError> {
        let state = self.lock()?;
        let mut lodges = state.lodges.clone();
        lodges.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(lodges)
    }

    fn add_lodge_member(&self, lodge: LodgeId, member: MemberId) -> Result<Lodge, RepositoryError> {
        let mut state = self.lock()?;
        if !state.members.iter().any(|m| m.id == member) {
            return Err(RepositoryError::NotFound);
        }
        let slot = state
            .lodges
            .iter_mut()
            .find(|l| l.id == lodge)
            .ok_or(RepositoryError::NotFound)?;
        slot.members.insert(member);
        Ok(slot.clone())
    }
}

impl RecordRepository for InMemoryStore {
    fn insert_document(&self, mut document: Document) -> Result<Document, RepositoryError> {
        let mut state = self.lock()?;
        document.id = DocumentId(state.next_id());
        state.documents.push(document.clone());
        Ok(document)
    }

    fn update_document(&self, document: Document) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let slot = state
            .documents
            .iter_mut()
            .find(|d| d.id == document.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = document;
        Ok(())
    }

    fn fetch_document(&self, id: DocumentId) -> Result<Option<Document>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.documents.iter().find(|d| d.id == id).cloned())
    }

    fn documents_for(&self, candidate: CandidateId) -> Result<Vec<Document>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .documents
            .iter()
            .filter(|d| d.candidate == candidate)
            .cloned()
            .collect())
    }

    fn insert_member_document(
        &self,
        mut document: MemberDocument,
    ) -> Result<MemberDocument, RepositoryError> {
        let mut state = self.lock()?;
        document.id = DocumentId(state.next_id());
        state.member_documents.push(document.clone());
        Ok(document)
    }

    fn delete_member_document(&self, id: DocumentId) -> Result<MemberDocument, RepositoryError> {
        let mut state = self.lock()?;
        let index = state
            .member_documents
            .iter()
            .position(|d| d.id == id)
            .ok_or(RepositoryError::NotFound)?;
        Ok(state.member_documents.remove(index))
    }

    fn recent_member_documents(
        &self,
        limit: usize,
    ) -> Result<Vec<MemberDocument>, RepositoryError> {
        let state = self.lock()?;
        let mut documents = state.member_documents.clone();
        documents.sort_by_key(|d| Reverse((d.uploaded_at, d.id)));
        documents.truncate(limit);
        Ok(documents)
    }

    fn insert_upload(&self, mut upload: BulkUpload) -> Result<BulkUpload, RepositoryError> {
        let mut state = self.lock()?;
        upload.id = UploadId(state.next_id());
        state.uploads.push(upload.clone());
        Ok(upload)
    }

    fn recent_uploads(&self, limit: usize) -> Result<Vec<BulkUpload>, RepositoryError> {
        let state = self.lock()?;
        let mut uploads = state.uploads.clone();
        uploads.sort_by_key(|u| Reverse((u.uploaded_at, u.id)));
        uploads.truncate(limit);
        Ok(uploads)
    }
}
