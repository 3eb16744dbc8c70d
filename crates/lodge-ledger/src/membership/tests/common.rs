use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::config::ListingConfig;
use crate::membership::domain::{
    CandidateApplication, Lodge, Member, MemberRegistration, Position,
};
use crate::membership::{Candidate, InMemoryStore, MembershipService};

pub(super) struct Fixture {
    pub(super) service: MembershipService<InMemoryStore>,
    pub(super) store: Arc<InMemoryStore>,
    pub(super) lodge: Lodge,
    pub(super) secretary: Member,
    pub(super) brothers: Vec<Member>,
    pub(super) grand_master: Member,
    pub(super) outsider: Member,
}

pub(super) fn registration(username: &str, position: Position) -> MemberRegistration {
    MemberRegistration {
        username: username.to_string(),
        first_name: username.to_string(),
        last_name: "Tester".to_string(),
        email: format!("{username}@lodge.test"),
        position,
        is_dignitary: false,
        is_senior_member: false,
        primary_lodge: None,
    }
}

pub(super) fn fixture() -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let service = MembershipService::new(store.clone(), ListingConfig::default());

    let lodge = service.create_lodge("Dardania").expect("lodge created");

    let mut secretary = registration("sekretari", Position::Secretary);
    secretary.primary_lodge = Some(lodge.id);
    let secretary = service.register_member(secretary).expect("secretary registered");

    let brothers = ["arben", "besnik", "dardan"]
        .into_iter()
        .map(|name| {
            let mut registration = registration(name, Position::RegularMember);
            registration.primary_lodge = Some(lodge.id);
            service.register_member(registration).expect("member registered")
        })
        .collect();

    let grand_master = service
        .register_member(registration("madhi", Position::GrandMaster))
        .expect("grand master registered");
    let outsider = service
        .register_member(registration("jashte", Position::RegularMember))
        .expect("outsider registered");

    let lodge = service.lodge(lodge.id).expect("lodge reloads");

    Fixture {
        service,
        store,
        lodge,
        secretary,
        brothers,
        grand_master,
        outsider,
    }
}

pub(super) fn applied_on(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, day, 12, 0, 0).unwrap()
}

pub(super) fn application(email: &str, name: &str, day: u32) -> CandidateApplication {
    CandidateApplication {
        application_date: Some(applied_on(day)),
        city: "Prishtinë".to_string(),
        ..CandidateApplication::new(email, name)
    }
}

pub(super) fn submit(fixture: &Fixture, email: &str) -> Candidate {
    fixture
        .service
        .submit_application(application(email, "Valon Morina", 10))
        .expect("application accepted")
}
