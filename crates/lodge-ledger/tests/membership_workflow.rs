//! Integration scenarios for the candidate pipeline and the unanimity rule.
//!
//! Scenarios drive the public service facade and the JSON snapshot so ballots and audit records
//! are checked the way the command line sees them across runs.

mod common {
    use std::sync::Arc;

    use lodge_ledger::config::ListingConfig;
    use lodge_ledger::membership::{
        InMemoryStore, Lodge, Member, MemberRegistration, MembershipService, Position,
    };

    pub(super) struct Ledger {
        pub(super) service: MembershipService<InMemoryStore>,
        pub(super) store: Arc<InMemoryStore>,
    }

    pub(super) fn ledger(store: InMemoryStore) -> Ledger {
        let store = Arc::new(store);
        Ledger {
            service: MembershipService::new(store.clone(), ListingConfig::default()),
            store,
        }
    }

    pub(super) fn member(
        ledger: &Ledger,
        username: &str,
        position: Position,
        lodge: Option<&Lodge>,
    ) -> Member {
        ledger
            .service
            .register_member(MemberRegistration {
                username: username.to_string(),
                first_name: username.to_string(),
                last_name: "Krasniqi".to_string(),
                email: format!("{username}@lodge.test"),
                position,
                is_dignitary: false,
                is_senior_member: false,
                primary_lodge: lodge.map(|lodge| lodge.id),
            })
            .expect("member registered")
    }
}

use std::io::Cursor;

use common::{ledger, member};
use lodge_ledger::membership::{
    CandidateApplication, DecisionEvaluator, DecisionStatus, InMemoryStore, Position, Stage,
    UploadStatus, VoteBallot, VoteLevel, VoteValue,
};

#[test]
fn candidate_moves_from_application_to_acceptance() {
    let ledger = ledger(InMemoryStore::new());
    let lodge = ledger.service.create_lodge("Iliria").unwrap();
    let secretary = member(&ledger, "sekretari", Position::Secretary, Some(&lodge));
    let voters: Vec<_> = ["agron", "blerim"]
        .into_iter()
        .map(|name| member(&ledger, name, Position::RegularMember, Some(&lodge)))
        .collect();

    let candidate = ledger
        .service
        .submit_application(CandidateApplication::new("Fatos@Example.com", "Fatos Gashi"))
        .unwrap();
    for _ in 0..4 {
        ledger.service.advance_stage(&secretary, candidate.id).unwrap();
    }
    assert_eq!(
        ledger.service.candidate(candidate.id).unwrap().current_stage,
        Stage::Voting
    );

    for voter in &voters {
        ledger
            .service
            .cast_vote(
                voter,
                VoteBallot {
                    candidate: candidate.id,
                    lodge: lodge.id,
                    stage: Stage::Voting,
                    level: VoteLevel::Lodge,
                    value: VoteValue::Approve,
                    comments: "Recommended".to_string(),
                },
            )
            .unwrap();
    }

    assert!(ledger.service.final_decision(candidate.id, Stage::Voting).unwrap());
    let accepted = ledger
        .service
        .set_stage(&secretary, candidate.id, Stage::Accepted)
        .unwrap();
    assert!(accepted.current_stage.is_terminal());
}

#[test]
fn snapshot_round_trip_preserves_ballots_and_uniqueness() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("ledger.json");

    let first = ledger(InMemoryStore::load(&path).expect("missing file starts empty"));
    let lodge = first.service.create_lodge("Arbëria").unwrap();
    let voter = member(&first, "dukagjin", Position::RegularMember, Some(&lodge));
    let grand = member(&first, "madhi", Position::GrandSecretary, None);
    let candidate = first
        .service
        .submit_application(CandidateApplication::new("teuta@example.com", "Teuta Rama"))
        .unwrap();

    let ballot = |level, value| VoteBallot {
        candidate: candidate.id,
        lodge: lodge.id,
        stage: Stage::Voting,
        level,
        value,
        comments: String::new(),
    };
    first
        .service
        .cast_vote(&voter, ballot(VoteLevel::Lodge, VoteValue::Approve))
        .unwrap();
    first
        .service
        .cast_vote(&grand, ballot(VoteLevel::GrandLodge, VoteValue::Reject))
        .unwrap();
    first.store.save(&path).expect("snapshot written");

    let second = ledger(InMemoryStore::load(&path).expect("snapshot read"));
    assert_eq!(
        second.service.decision_status(candidate.id, Stage::Voting).unwrap(),
        DecisionStatus::NotApproved {
            level: VoteLevel::GrandLodge
        }
    );
    assert!(second
        .service
        .is_unanimous(candidate.id, Stage::Voting, VoteLevel::Lodge)
        .unwrap());

    let voter = second.service.authenticate("dukagjin").unwrap();
    let err = second
        .service
        .cast_vote(&voter, ballot(VoteLevel::Lodge, VoteValue::Reject))
        .expect_err("ballot already on file");
    assert!(err.is_duplicate());

    let fresh = second
        .service
        .submit_application(CandidateApplication::new("new@example.com", "New Candidate"))
        .unwrap();
    assert!(fresh.id.0 > candidate.id.0);
}

#[test]
fn evaluator_reads_any_tally() {
    let ledger = ledger(InMemoryStore::new());
    let lodge = ledger.service.create_lodge("Kastrioti").unwrap();
    let voter = member(&ledger, "gent", Position::RegularMember, Some(&lodge));
    let candidate = ledger
        .service
        .submit_application(CandidateApplication::new("liri@example.com", "Liri Shala"))
        .unwrap();
    ledger
        .service
        .cast_vote(
            &voter,
            VoteBallot {
                candidate: candidate.id,
                lodge: lodge.id,
                stage: Stage::LodgeReview,
                level: VoteLevel::Lodge,
                value: VoteValue::Abstain,
                comments: String::new(),
            },
        )
        .unwrap();

    let evaluator = DecisionEvaluator::new(ledger.store.as_ref());
    assert!(!evaluator
        .is_unanimous(candidate.id, Stage::LodgeReview, VoteLevel::Lodge)
        .unwrap());
    assert!(!evaluator.final_decision(candidate.id, Stage::LodgeReview).unwrap());
}

#[test]
fn form_export_import_is_audited_on_the_control_panel() {
    let ledger = ledger(InMemoryStore::new());
    let secretary = member(&ledger, "sekretari", Position::Secretary, None);
    let csv = "Timestamp,Emrin dhe Mbiemrin,Email Address,Nr. e Telefonit,Qyteti\n\
               2025-02-01 09:30:00,Arta Hoxha,arta@example.com,+38344111222,Ferizaj\n\
               2025-02-02 10:00:00,Blerta Shala,,,\n";

    let report = ledger
        .service
        .import_candidates(&secretary, "formulari.csv", Cursor::new(csv))
        .unwrap();
    assert_eq!(report.summary.processed, 1);
    assert_eq!(report.summary.errors, vec!["Row 3: Email is required".to_string()]);

    let panel = ledger.service.control_panel(&secretary).unwrap();
    assert_eq!(panel.recent_uploads[0].status, UploadStatus::CompletedWithErrors);
    assert_eq!(panel.recent_uploads[0].error_log, "Row 3: Email is required");

    let page = ledger.service.list_candidates(Some(Stage::Applied), 1, None).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.candidates[0].phone_number, "+38344111222");
}
