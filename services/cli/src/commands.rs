use std::fs::File;

use lodge_ledger::error::AppError;
use lodge_ledger::membership::{
    CandidateApplication, CandidateId, CandidateUpdate, DecisionStatus, DocumentId, InMemoryStore,
    LodgeId, Member, MemberDocumentUpload, MemberId, MemberRegistration, MembershipService, Stage,
    VoteBallot, VoteLevel,
};
use serde::Serialize;

use crate::cli::{
    ActorArgs, CandidateCommand, CastArgs, Command, DecisionArgs, DocumentCommand, ImportArgs,
    LodgeCommand, MemberCommand, MemberDocCommand, RegisterArgs, UpdateArgs, VoteCommand,
};
use crate::infra::Output;

type Service = MembershipService<InMemoryStore>;

pub(crate) fn execute(service: &Service, command: Command, output: Output) -> Result<(), AppError> {
    match command {
        Command::Candidates { command } => candidates(service, command, output),
        Command::Vote {
            command: VoteCommand::Cast(args),
        } => cast_vote(service, args, output),
        Command::Decision(args) => decision(service, args, output),
        Command::Import(args) => import(service, args, output),
        Command::Members {
            command: MemberCommand::Add(args),
        } => {
            let member = service.register_member(MemberRegistration {
                username: args.username,
                first_name: args.first_name,
                last_name: args.last_name,
                email: args.email,
                position: args.position,
                is_dignitary: args.dignitary,
                is_senior_member: args.senior,
                primary_lodge: args.lodge.map(LodgeId),
            })?;
            output.emit(&member, |member| {
                println!("Registered member {} ({})", member.id, member)
            })?;
            Ok(())
        }
        Command::Lodges { command } => lodges(service, command, output),
        Command::Documents { command } => documents(service, command, output),
        Command::MemberDocs { command } => member_documents(service, command, output),
        Command::ControlPanel(actor) => {
            let actor = authenticate(service, &actor)?;
            let panel = service.control_panel(&actor)?;
            output.emit(&panel, |panel| {
                println!("Lodges");
                for lodge in &panel.lodges {
                    println!("- {} {} ({} members)", lodge.id, lodge.name, lodge.member_count());
                }
                println!("\nRecent member documents");
                for document in &panel.recent_documents {
                    println!(
                        "- {} {} [{}] member {} on {}",
                        document.id,
                        document.title,
                        document.kind.label(),
                        document.member,
                        document.uploaded_at.format("%Y-%m-%d")
                    );
                }
                println!("\nRecent uploads");
                for upload in &panel.recent_uploads {
                    println!(
                        "- {} {} {} ({} processed) on {}",
                        upload.id,
                        upload.source,
                        upload.status.label(),
                        upload.processed_count,
                        upload.uploaded_at.format("%Y-%m-%d %H:%M")
                    );
                }
            })?;
            Ok(())
        }
    }
}

fn authenticate(service: &Service, actor: &ActorArgs) -> Result<Member, AppError> {
    Ok(service.authenticate(&actor.actor)?)
}

fn candidates(
    service: &Service,
    command: CandidateCommand,
    output: Output,
) -> Result<(), AppError> {
    match command {
        CandidateCommand::List(args) => {
            let page = service.list_candidates(args.stage, args.page, args.page_size)?;
            output.emit(&page, |page| {
                println!(
                    "Candidates (page {} of {}, {} total)",
                    page.page, page.total_pages, page.total
                );
                for candidate in &page.candidates {
                    println!(
                        "- {} {} <{}> {} applied {}",
                        candidate.id,
                        candidate.full_name,
                        candidate.email,
                        candidate.current_stage.label(),
                        candidate.application_date.format("%Y-%m-%d")
                    );
                }
            })?;
        }
        CandidateCommand::Show { id } => {
            let overview = service.candidate_overview(CandidateId(id))?;
            output.emit(&overview, |overview| {
                let candidate = &overview.candidate;
                println!("{} ({})", candidate, candidate.email);
                println!("  City: {}", candidate.city);
                println!("  Phone: {}", candidate.phone_number);
                println!("  Kosovo citizen: {}", candidate.is_kosovo_citizen);
                println!("  Applied: {}", candidate.application_date.format("%Y-%m-%d"));
                if let Some(date) = candidate.interview_date {
                    let outcome = match candidate.interview_passed {
                        Some(true) => "passed",
                        Some(false) => "failed",
                        None => "pending",
                    };
                    println!("  Interview: {} ({outcome})", date.format("%Y-%m-%d"));
                }
                println!("  Documents:");
                for document in &overview.documents {
                    let mark = if document.verified { "verified" } else { "unverified" };
                    println!("    - {} {} ({mark})", document.id, document.name);
                }
                println!("  Ballots cast: {}", overview.votes_cast);
                for decision in &overview.decisions {
                    println!(
                        "    - {}: {}",
                        decision.stage.label(),
                        decision.status.summary()
                    );
                }
            })?;
        }
        CandidateCommand::Register(args) => {
            let candidate = service.submit_application(application(args))?;
            output.emit(&candidate, |candidate| {
                println!("Registered candidate {} ({})", candidate.id, candidate)
            })?;
        }
        CandidateCommand::Update(args) => {
            let actor = authenticate(service, &args.actor)?;
            let id = CandidateId(args.id);
            let update = update(args);
            let candidate = service.update_candidate(&actor, id, update)?;
            output.emit(&candidate, |candidate| {
                println!("Updated candidate {} ({})", candidate.id, candidate)
            })?;
        }
        CandidateCommand::Stage { id, stage, actor } => {
            let actor = authenticate(service, &actor)?;
            let candidate = service.set_stage(&actor, CandidateId(id), stage)?;
            output.emit(&candidate, |candidate| println!("{}", candidate))?;
        }
        CandidateCommand::Advance { id, actor } => {
            let actor = authenticate(service, &actor)?;
            let candidate = service.advance_stage(&actor, CandidateId(id))?;
            output.emit(&candidate, |candidate| println!("{}", candidate))?;
        }
        CandidateCommand::Interview(args) => {
            let actor = authenticate(service, &args.actor)?;
            let candidate =
                service.record_interview(&actor, CandidateId(args.id), args.date, args.passed)?;
            output.emit(&candidate, |candidate| {
                println!("Interview recorded for {}", candidate)
            })?;
        }
    }
    Ok(())
}

fn application(args: RegisterArgs) -> CandidateApplication {
    CandidateApplication {
        phone_number: args.phone,
        address: args.address,
        city: args.city,
        is_kosovo_citizen: !args.non_citizen,
        social_profile_url: args.social_profile,
        social_profile_url2: args.social_profile2,
        application_date: args.applied_on,
        ..CandidateApplication::new(args.email, args.name)
    }
}

fn update(args: UpdateArgs) -> CandidateUpdate {
    CandidateUpdate {
        full_name: args.name,
        email: args.email,
        phone_number: args.phone,
        address: args.address,
        city: args.city,
        social_profile_url: args.social_profile,
        social_profile_url2: args.social_profile2,
        is_kosovo_citizen: args.citizen,
        current_stage: args.stage,
    }
}

fn cast_vote(service: &Service, args: CastArgs, output: Output) -> Result<(), AppError> {
    let voter = authenticate(service, &args.actor)?;
    let vote = service.cast_vote(
        &voter,
        VoteBallot {
            candidate: CandidateId(args.candidate),
            lodge: LodgeId(args.lodge),
            stage: args.stage,
            level: args.level,
            value: args.value,
            comments: args.comments,
        },
    )?;
    output.emit(&vote, |vote| {
        println!(
            "Recorded {} from {} on candidate {} ({} / {})",
            vote.value.label(),
            voter.username,
            vote.candidate,
            vote.stage.label(),
            vote.level.label()
        )
    })?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct DecisionReport {
    candidate: CandidateId,
    stage: Stage,
    lodge_unanimous: bool,
    grand_lodge_unanimous: bool,
    approved: bool,
    status: DecisionStatus,
}

fn decision(service: &Service, args: DecisionArgs, output: Output) -> Result<(), AppError> {
    let candidate = CandidateId(args.candidate);
    let status = service.decision_status(candidate, args.stage)?;
    let report = DecisionReport {
        candidate,
        stage: args.stage,
        lodge_unanimous: service.is_unanimous(candidate, args.stage, VoteLevel::Lodge)?,
        grand_lodge_unanimous: service.is_unanimous(candidate, args.stage, VoteLevel::GrandLodge)?,
        approved: service.final_decision(candidate, args.stage)?,
        status,
    };
    output.emit(&report, |report| {
        println!("Candidate {} at {}", report.candidate, report.stage.label());
        println!("  Lodge unanimous: {}", report.lodge_unanimous);
        println!("  Grand lodge unanimous: {}", report.grand_lodge_unanimous);
        println!("  Final decision: {}", report.status.summary());
    })?;
    Ok(())
}

fn import(service: &Service, args: ImportArgs, output: Output) -> Result<(), AppError> {
    let actor = authenticate(service, &args.actor)?;
    let file = File::open(&args.path)?;
    let source = args
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.path.display().to_string());
    let report = service.import_candidates(&actor, &source, file)?;
    output.emit(&report, |report| {
        println!("{}", report.summary.message());
        for error in &report.summary.errors {
            println!("  {error}");
        }
        println!("Upload {} {}", report.upload.id, report.upload.status.label());
    })?;
    Ok(())
}

fn lodges(service: &Service, command: LodgeCommand, output: Output) -> Result<(), AppError> {
    match command {
        LodgeCommand::Add { name } => {
            let lodge = service.create_lodge(&name)?;
            output.emit(&lodge, |lodge| println!("Created lodge {} {}", lodge.id, lodge.name))?;
        }
        LodgeCommand::Join { lodge, member } => {
            let lodge = service.add_lodge_member(LodgeId(lodge), MemberId(member))?;
            output.emit(&lodge, |lodge| {
                println!("{} now has {} members", lodge.name, lodge.member_count())
            })?;
        }
        LodgeCommand::List => {
            let lodges = service.lodges()?;
            output.emit(&lodges, |lodges| {
                for lodge in lodges {
                    println!("- {} {} ({} members)", lodge.id, lodge.name, lodge.member_count());
                }
            })?;
        }
    }
    Ok(())
}

fn documents(service: &Service, command: DocumentCommand, output: Output) -> Result<(), AppError> {
    match command {
        DocumentCommand::Attach {
            candidate,
            name,
            storage_ref,
            actor,
        } => {
            let actor = authenticate(service, &actor)?;
            let document =
                service.attach_document(&actor, CandidateId(candidate), &name, &storage_ref)?;
            output.emit(&document, |document| {
                println!("Attached document {} to candidate {}", document.id, document.candidate)
            })?;
        }
        DocumentCommand::Verify { id, actor } => {
            let actor = authenticate(service, &actor)?;
            let document = service.verify_document(&actor, DocumentId(id))?;
            output.emit(&document, |document| {
                println!("Verified document {} {}", document.id, document.name)
            })?;
        }
    }
    Ok(())
}

fn member_documents(
    service: &Service,
    command: MemberDocCommand,
    output: Output,
) -> Result<(), AppError> {
    match command {
        MemberDocCommand::Upload {
            member,
            kind,
            title,
            description,
            storage_ref,
            actor,
        } => {
            let actor = authenticate(service, &actor)?;
            let document = service.upload_member_document(
                &actor,
                MemberDocumentUpload {
                    member: MemberId(member),
                    kind,
                    title,
                    description,
                    storage_ref,
                },
            )?;
            output.emit(&document, |document| {
                println!("Stored {} for member {}", document.title, document.member)
            })?;
        }
        MemberDocCommand::Delete { id, actor } => {
            let actor = authenticate(service, &actor)?;
            let document = service.delete_member_document(&actor, DocumentId(id))?;
            output.emit(&document, |document| {
                println!("Deleted {} ({})", document.title, document.id)
            })?;
        }
    }
    Ok(())
}
