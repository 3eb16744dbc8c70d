mod decision;

pub use decision::{DecisionEvaluator, DecisionStatus};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    normalize_variant, CandidateId, LodgeId, MemberId, Stage, UnknownVariant, VoteId,
};
use super::repository::RepositoryError;

/// Ballot value. Abstentions are recorded but never counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteValue {
    Approve,
    Reject,
    Abstain,
}

impl VoteValue {
    pub fn label(&self) -> &'static str {
        match self {
            VoteValue::Approve => "Approve",
            VoteValue::Reject => "Reject",
            VoteValue::Abstain => "Abstain",
        }
    }
}

impl FromStr for VoteValue {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalize_variant(value).as_str() {
            "APPROVE" => Ok(Self::Approve),
            "REJECT" => Ok(Self::Reject),
            "ABSTAIN" => Ok(Self::Abstain),
            _ => Err(UnknownVariant {
                kind: "vote",
                value: value.to_string(),
            }),
        }
    }
}

/// Tier a ballot is cast at. Grand-lodge ballots override lodge ballots for the same stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteLevel {
    #[default]
    Lodge,
    GrandLodge,
}

impl VoteLevel {
    pub fn label(&self) -> &'static str {
        match self {
            VoteLevel::Lodge => "Lodge Level",
            VoteLevel::GrandLodge => "Grand Lodge Level",
        }
    }
}

impl fmt::Display for VoteLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VoteLevel::Lodge => "LODGE",
            VoteLevel::GrandLodge => "GRAND_LODGE",
        })
    }
}

impl FromStr for VoteLevel {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalize_variant(value).as_str() {
            "LODGE" => Ok(Self::Lodge),
            "GRAND_LODGE" | "GRAND" => Ok(Self::GrandLodge),
            _ => Err(UnknownVariant {
                kind: "vote level",
                value: value.to_string(),
            }),
        }
    }
}

/// One recorded ballot. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub id: VoteId,
    pub candidate: CandidateId,
    pub voter: MemberId,
    pub lodge: LodgeId,
    pub value: VoteValue,
    pub level: VoteLevel,
    pub stage: Stage,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub comments: String,
}

impl Vote {
    pub fn key(&self) -> VoteKey {
        VoteKey {
            candidate: self.candidate,
            voter: self.voter,
            stage: self.stage,
            level: self.level,
        }
    }
}

/// Uniqueness tuple: one ballot per voter per candidate, stage and level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteKey {
    pub candidate: CandidateId,
    pub voter: MemberId,
    pub stage: Stage,
    pub level: VoteLevel,
}

/// Ballot as submitted by a voter, before the store assigns identity and time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteBallot {
    pub candidate: CandidateId,
    pub lodge: LodgeId,
    pub stage: Stage,
    #[serde(default)]
    pub level: VoteLevel,
    pub value: VoteValue,
    #[serde(default)]
    pub comments: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueMatch {
    Equal(VoteValue),
    Excluding(VoteValue),
}

impl ValueMatch {
    fn accepts(&self, value: VoteValue) -> bool {
        match self {
            ValueMatch::Equal(expected) => value == *expected,
            ValueMatch::Excluding(excluded) => value != *excluded,
        }
    }
}

/// Count query over the vote table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteFilter {
    pub candidate: CandidateId,
    pub stage: Stage,
    pub level: VoteLevel,
    pub value: ValueMatch,
}

impl VoteFilter {
    pub fn matches(&self, vote: &Vote) -> bool {
        vote.candidate == self.candidate
            && vote.stage == self.stage
            && vote.level == self.level
            && self.value.accepts(vote.value)
    }
}

/// Capability to count ballots. This is all the decision rule needs from storage.
pub trait VoteTally {
    fn count_votes(&self, filter: &VoteFilter) -> Result<usize, RepositoryError>;
}

impl VoteTally for [Vote] {
    fn count_votes(&self, filter: &VoteFilter) -> Result<usize, RepositoryError> {
        Ok(self.iter().filter(|vote| filter.matches(vote)).count())
    }
}

impl VoteTally for Vec<Vote> {
    fn count_votes(&self, filter: &VoteFilter) -> Result<usize, RepositoryError> {
        self.as_slice().count_votes(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn ballot(voter: u64, level: VoteLevel, value: VoteValue) -> Vote {
        Vote {
            id: VoteId(voter),
            candidate: CandidateId(4),
            voter: MemberId(voter),
            lodge: LodgeId(1),
            value,
            level,
            stage: Stage::Voting,
            timestamp: Utc.with_ymd_and_hms(2025, 4, 2, 19, 30, 0).unwrap(),
            comments: String::new(),
        }
    }

    #[test]
    fn keys_separate_levels_but_ignore_the_value() {
        let lodge = ballot(1, VoteLevel::Lodge, VoteValue::Approve);
        let changed_mind = ballot(1, VoteLevel::Lodge, VoteValue::Reject);
        let grand = ballot(1, VoteLevel::GrandLodge, VoteValue::Approve);

        assert_eq!(lodge.key(), changed_mind.key());
        let keys: HashSet<VoteKey> = [&lodge, &changed_mind, &grand]
            .into_iter()
            .map(Vote::key)
            .collect();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn filters_count_by_value_match() {
        let votes = vec![
            ballot(1, VoteLevel::Lodge, VoteValue::Approve),
            ballot(2, VoteLevel::Lodge, VoteValue::Abstain),
            ballot(3, VoteLevel::GrandLodge, VoteValue::Reject),
        ];
        let filter = |value| VoteFilter {
            candidate: CandidateId(4),
            stage: Stage::Voting,
            level: VoteLevel::Lodge,
            value,
        };

        assert_eq!(
            votes
                .count_votes(&filter(ValueMatch::Excluding(VoteValue::Abstain)))
                .unwrap(),
            1
        );
        assert_eq!(
            votes
                .count_votes(&filter(ValueMatch::Equal(VoteValue::Abstain)))
                .unwrap(),
            1
        );
    }
}
