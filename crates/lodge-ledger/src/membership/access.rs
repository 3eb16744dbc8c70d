use super::domain::{Lodge, Member, Position};
use super::voting::VoteLevel;

/// Rejected attempt by an authenticated member.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("{username} is not permitted to {action}")]
    Forbidden { username: String, action: String },
}

impl AccessError {
    pub(crate) fn forbidden(member: &Member, action: impl Into<String>) -> Self {
        Self::Forbidden {
            username: member.username.clone(),
            action: action.into(),
        }
    }
}

/// Secretaries, dignitaries and senior members administer candidates, uploads and documents.
pub fn can_manage_candidates(member: &Member) -> bool {
    member.position == Position::Secretary || member.is_dignitary || member.is_senior_member
}

/// Lodge ballots come from that lodge's roll; grand-lodge ballots from grand officers or dignitaries.
pub fn can_cast_vote(member: &Member, lodge: &Lodge, level: VoteLevel) -> bool {
    match level {
        VoteLevel::Lodge => lodge.has_member(member.id),
        VoteLevel::GrandLodge => member.is_grand_officer() || member.is_dignitary,
    }
}

pub(crate) fn require_manager(member: &Member, action: &str) -> Result<(), AccessError> {
    if can_manage_candidates(member) {
        Ok(())
    } else {
        Err(AccessError::forbidden(member, action))
    }
}
