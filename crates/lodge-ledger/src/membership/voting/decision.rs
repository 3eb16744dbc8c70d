use serde::{Deserialize, Serialize};

use super::{ValueMatch, VoteFilter, VoteLevel, VoteTally, VoteValue};
use crate::membership::domain::{CandidateId, Stage};
use crate::membership::repository::RepositoryError;

/// Applies the two-tier unanimity rule over any [`VoteTally`].
///
/// Holds no state of its own, so repeated calls against unchanged ballots agree.
pub struct DecisionEvaluator<'a, T: VoteTally + ?Sized> {
    tally: &'a T,
}

impl<'a, T: VoteTally + ?Sized> DecisionEvaluator<'a, T> {
    pub fn new(tally: &'a T) -> Self {
        Self { tally }
    }

    /// True when at least one non-abstaining ballot exists and every one of them approves.
    pub fn is_unanimous(
        &self,
        candidate: CandidateId,
        stage: Stage,
        level: VoteLevel,
    ) -> Result<bool, RepositoryError> {
        let counted = self.count(
            candidate,
            stage,
            level,
            ValueMatch::Excluding(VoteValue::Abstain),
        )?;
        let approvals =
            self.count(candidate, stage, level, ValueMatch::Equal(VoteValue::Approve))?;

        Ok(counted > 0 && counted == approvals)
    }

    /// Grand-lodge ballots, once any exist for the stage, decide alone. Otherwise the lodge decides.
    pub fn final_decision(
        &self,
        candidate: CandidateId,
        stage: Stage,
    ) -> Result<bool, RepositoryError> {
        if self.has_ballots(candidate, stage, VoteLevel::GrandLodge)? {
            return self.is_unanimous(candidate, stage, VoteLevel::GrandLodge);
        }

        self.is_unanimous(candidate, stage, VoteLevel::Lodge)
    }

    /// Like [`final_decision`](Self::final_decision) but keeps "nobody voted" apart from "not approved".
    pub fn status(
        &self,
        candidate: CandidateId,
        stage: Stage,
    ) -> Result<DecisionStatus, RepositoryError> {
        let deciding = if self.has_ballots(candidate, stage, VoteLevel::GrandLodge)? {
            VoteLevel::GrandLodge
        } else if self.has_ballots(candidate, stage, VoteLevel::Lodge)? {
            VoteLevel::Lodge
        } else {
            return Ok(DecisionStatus::NoVotes);
        };

        if self.is_unanimous(candidate, stage, deciding)? {
            Ok(DecisionStatus::Approved { level: deciding })
        } else {
            Ok(DecisionStatus::NotApproved { level: deciding })
        }
    }

    // Abstentions count as cast ballots here; only the unanimity check ignores them.
    fn has_ballots(
        &self,
        candidate: CandidateId,
        stage: Stage,
        level: VoteLevel,
    ) -> Result<bool, RepositoryError> {
        let counted = self.count(
            candidate,
            stage,
            level,
            ValueMatch::Excluding(VoteValue::Abstain),
        )?;
        if counted > 0 {
            return Ok(true);
        }
        let abstained =
            self.count(candidate, stage, level, ValueMatch::Equal(VoteValue::Abstain))?;
        Ok(abstained > 0)
    }

    fn count(
        &self,
        candidate: CandidateId,
        stage: Stage,
        level: VoteLevel,
        value: ValueMatch,
    ) -> Result<usize, RepositoryError> {
        self.tally.count_votes(&VoteFilter {
            candidate,
            stage,
            level,
            value,
        })
    }
}

/// Outcome of a stage with the tier that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DecisionStatus {
    NoVotes,
    Approved { level: VoteLevel },
    NotApproved { level: VoteLevel },
}

impl DecisionStatus {
    pub fn is_approved(&self) -> bool {
        matches!(self, DecisionStatus::Approved { .. })
    }

    pub fn summary(&self) -> String {
        match self {
            DecisionStatus::NoVotes => "no votes cast".to_string(),
            DecisionStatus::Approved { level } => {
                format!("approved unanimously ({})", level.label())
            }
            DecisionStatus::NotApproved { level } => format!("not approved ({})", level.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::domain::{LodgeId, MemberId, VoteId};
    use crate::membership::voting::Vote;
    use chrono::{TimeZone, Utc};

    const CANDIDATE: CandidateId = CandidateId(7);

    fn ballot(voter: u64, stage: Stage, level: VoteLevel, value: VoteValue) -> Vote {
        Vote {
            id: VoteId(voter),
            candidate: CANDIDATE,
            voter: MemberId(voter),
            lodge: LodgeId(1),
            value,
            level,
            stage,
            timestamp: Utc.with_ymd_and_hms(2025, 1, 17, 13, 51, 0).unwrap(),
            comments: String::new(),
        }
    }

    fn lodge_votes(values: &[VoteValue]) -> Vec<Vote> {
        values
            .iter()
            .enumerate()
            .map(|(idx, value)| ballot(idx as u64 + 1, Stage::Voting, VoteLevel::Lodge, *value))
            .collect()
    }

    #[test]
    fn no_votes_is_never_unanimous() {
        let votes: Vec<Vote> = Vec::new();
        let evaluator = DecisionEvaluator::new(&votes);
        for stage in Stage::ALL {
            for level in [VoteLevel::Lodge, VoteLevel::GrandLodge] {
                assert!(!evaluator.is_unanimous(CANDIDATE, stage, level).unwrap());
            }
        }
    }

    #[test]
    fn all_abstain_is_not_unanimous() {
        let votes = lodge_votes(&[VoteValue::Abstain, VoteValue::Abstain]);
        let evaluator = DecisionEvaluator::new(&votes);
        assert!(!evaluator
            .is_unanimous(CANDIDATE, Stage::Voting, VoteLevel::Lodge)
            .unwrap());
    }

    #[test]
    fn three_approvals_are_unanimous() {
        let votes = lodge_votes(&[VoteValue::Approve, VoteValue::Approve, VoteValue::Approve]);
        let evaluator = DecisionEvaluator::new(&votes);
        assert!(evaluator
            .is_unanimous(CANDIDATE, Stage::Voting, VoteLevel::Lodge)
            .unwrap());
    }

    #[test]
    fn abstentions_do_not_break_unanimity() {
        let votes = lodge_votes(&[VoteValue::Approve, VoteValue::Abstain]);
        let evaluator = DecisionEvaluator::new(&votes);
        assert!(evaluator
            .is_unanimous(CANDIDATE, Stage::Voting, VoteLevel::Lodge)
            .unwrap());
    }

    #[test]
    fn a_single_rejection_breaks_unanimity() {
        let votes = lodge_votes(&[VoteValue::Approve, VoteValue::Reject]);
        let evaluator = DecisionEvaluator::new(&votes);
        assert!(!evaluator
            .is_unanimous(CANDIDATE, Stage::Voting, VoteLevel::Lodge)
            .unwrap());
    }

    #[test]
    fn votes_at_other_stages_are_ignored() {
        let mut votes = lodge_votes(&[VoteValue::Approve]);
        votes.push(ballot(9, Stage::Interview, VoteLevel::Lodge, VoteValue::Reject));
        let evaluator = DecisionEvaluator::new(&votes);
        assert!(evaluator.final_decision(CANDIDATE, Stage::Voting).unwrap());
        assert!(!evaluator.final_decision(CANDIDATE, Stage::Interview).unwrap());
    }

    #[test]
    fn lodge_decides_without_grand_lodge_votes() {
        let votes = lodge_votes(&[VoteValue::Approve, VoteValue::Approve]);
        let evaluator = DecisionEvaluator::new(&votes);
        assert!(evaluator.final_decision(CANDIDATE, Stage::Voting).unwrap());
        assert_eq!(
            evaluator.status(CANDIDATE, Stage::Voting).unwrap(),
            DecisionStatus::Approved {
                level: VoteLevel::Lodge
            }
        );
    }

    #[test]
    fn split_grand_lodge_overrides_unanimous_lodge() {
        let mut votes = lodge_votes(&[VoteValue::Approve, VoteValue::Approve]);
        votes.push(ballot(10, Stage::Voting, VoteLevel::GrandLodge, VoteValue::Approve));
        votes.push(ballot(11, Stage::Voting, VoteLevel::GrandLodge, VoteValue::Reject));
        let evaluator = DecisionEvaluator::new(&votes);
        assert!(!evaluator.final_decision(CANDIDATE, Stage::Voting).unwrap());
    }

    #[test]
    fn grand_lodge_approval_overrides_lodge_rejection() {
        let mut votes = lodge_votes(&[VoteValue::Reject]);
        votes.push(ballot(10, Stage::Voting, VoteLevel::GrandLodge, VoteValue::Approve));
        let evaluator = DecisionEvaluator::new(&votes);
        assert!(evaluator.final_decision(CANDIDATE, Stage::Voting).unwrap());
    }

    #[test]
    fn abstaining_grand_lodge_still_overrides() {
        let mut votes = lodge_votes(&[VoteValue::Approve]);
        votes.push(ballot(10, Stage::Voting, VoteLevel::GrandLodge, VoteValue::Abstain));
        let evaluator = DecisionEvaluator::new(&votes);
        assert!(!evaluator.final_decision(CANDIDATE, Stage::Voting).unwrap());
        assert_eq!(
            evaluator.status(CANDIDATE, Stage::Voting).unwrap(),
            DecisionStatus::NotApproved {
                level: VoteLevel::GrandLodge
            }
        );
    }

    #[test]
    fn status_separates_no_votes_from_rejection() {
        let votes: Vec<Vote> = Vec::new();
        let evaluator = DecisionEvaluator::new(&votes);
        assert_eq!(
            evaluator.status(CANDIDATE, Stage::Voting).unwrap(),
            DecisionStatus::NoVotes
        );
        assert!(!evaluator.final_decision(CANDIDATE, Stage::Voting).unwrap());
    }

    #[test]
    fn status_agrees_with_final_decision() {
        let grand = |value| ballot(10, Stage::Voting, VoteLevel::GrandLodge, value);
        let mut overridden = lodge_votes(&[VoteValue::Reject]);
        overridden.push(grand(VoteValue::Approve));
        let mut abstaining = lodge_votes(&[VoteValue::Approve]);
        abstaining.push(grand(VoteValue::Abstain));

        for votes in [
            Vec::new(),
            lodge_votes(&[VoteValue::Approve, VoteValue::Abstain]),
            lodge_votes(&[VoteValue::Approve, VoteValue::Reject]),
            overridden,
            abstaining,
        ] {
            let evaluator = DecisionEvaluator::new(&votes);
            assert_eq!(
                evaluator.status(CANDIDATE, Stage::Voting).unwrap().is_approved(),
                evaluator.final_decision(CANDIDATE, Stage::Voting).unwrap(),
                "ballots: {votes:?}"
            );
        }
    }

    #[test]
    fn repeated_evaluation_is_stable() {
        let votes = lodge_votes(&[VoteValue::Approve, VoteValue::Reject, VoteValue::Abstain]);
        let evaluator = DecisionEvaluator::new(votes.as_slice());
        let first = evaluator.final_decision(CANDIDATE, Stage::Voting).unwrap();
        for _ in 0..5 {
            assert_eq!(evaluator.final_decision(CANDIDATE, Stage::Voting).unwrap(), first);
        }
    }
}
