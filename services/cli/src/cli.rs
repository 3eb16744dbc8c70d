use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use lodge_ledger::config::AppConfig;
use lodge_ledger::error::AppError;
use lodge_ledger::membership::{
    InMemoryStore, MemberDocumentKind, MembershipService, Position, SnapshotError, Stage, VoteLevel,
    VoteValue,
};
use lodge_ledger::telemetry;
use tracing::{debug, error, info};

use crate::commands;
use crate::infra::{
    parse_day, parse_document_kind, parse_level, parse_position, parse_stage, parse_value, Output,
};

#[derive(Parser, Debug)]
#[command(
    name = "lodge-ledger",
    about = "Track lodge membership candidates, ballots and decisions",
    version
)]
struct Cli {
    /// Override the configured snapshot file
    #[arg(long, global = true)]
    data: Option<PathBuf>,
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Candidate intake and pipeline management
    Candidates {
        #[command(subcommand)]
        command: CandidateCommand,
    },
    /// Record ballots
    Vote {
        #[command(subcommand)]
        command: VoteCommand,
    },
    /// Show the standing of a candidate at one stage
    Decision(DecisionArgs),
    /// Import candidates from the application form's CSV export
    Import(ImportArgs),
    /// Register members
    Members {
        #[command(subcommand)]
        command: MemberCommand,
    },
    /// Create lodges and manage their rolls
    Lodges {
        #[command(subcommand)]
        command: LodgeCommand,
    },
    /// Candidate documents
    Documents {
        #[command(subcommand)]
        command: DocumentCommand,
    },
    /// Member documents
    MemberDocs {
        #[command(subcommand)]
        command: MemberDocCommand,
    },
    /// Lodges, recent member documents and recent uploads
    ControlPanel(ActorArgs),
}

impl Command {
    /// Whether the command can change stored records.
    fn mutates(&self) -> bool {
        match self {
            Command::Candidates { command } => !matches!(
                command,
                CandidateCommand::List(_) | CandidateCommand::Show { .. }
            ),
            Command::Lodges { command } => !matches!(command, LodgeCommand::List),
            Command::Decision(_) | Command::ControlPanel(_) => false,
            Command::Vote { .. }
            | Command::Import(_)
            | Command::Members { .. }
            | Command::Documents { .. }
            | Command::MemberDocs { .. } => true,
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct ActorArgs {
    /// Username of the member performing the action
    #[arg(long)]
    pub(crate) actor: String,
}

#[derive(Subcommand, Debug)]
pub(crate) enum CandidateCommand {
    /// List candidates, newest application first
    List(ListArgs),
    /// Show a candidate with documents and per-stage decisions
    Show { id: u64 },
    /// Submit a new application
    Register(RegisterArgs),
    /// Edit a candidate profile
    Update(UpdateArgs),
    /// Move a candidate to a stage
    Stage {
        id: u64,
        #[arg(value_parser = parse_stage)]
        stage: Stage,
        #[command(flatten)]
        actor: ActorArgs,
    },
    /// Move a candidate to the next pipeline stage
    Advance {
        id: u64,
        #[command(flatten)]
        actor: ActorArgs,
    },
    /// Record the interview date and outcome
    Interview(InterviewArgs),
}

#[derive(Args, Debug)]
pub(crate) struct ListArgs {
    /// Only candidates at this stage
    #[arg(long, value_parser = parse_stage)]
    pub(crate) stage: Option<Stage>,
    /// 1-based page number
    #[arg(long, default_value_t = 1)]
    pub(crate) page: usize,
    /// One of 10, 20, 50 or 100. Defaults to APP_PAGE_SIZE.
    #[arg(long)]
    pub(crate) page_size: Option<usize>,
}

#[derive(Args, Debug)]
pub(crate) struct RegisterArgs {
    #[arg(long)]
    pub(crate) email: String,
    #[arg(long)]
    pub(crate) name: String,
    #[arg(long, default_value = "")]
    pub(crate) phone: String,
    #[arg(long, default_value = "")]
    pub(crate) address: String,
    #[arg(long, default_value = "")]
    pub(crate) city: String,
    #[arg(long, default_value = "")]
    pub(crate) social_profile: String,
    #[arg(long, default_value = "")]
    pub(crate) social_profile2: String,
    /// Mark the candidate as not holding Kosovo citizenship
    #[arg(long)]
    pub(crate) non_citizen: bool,
    /// Application date (YYYY-MM-DD). Defaults to now.
    #[arg(long, value_parser = parse_day)]
    pub(crate) applied_on: Option<DateTime<Utc>>,
}

#[derive(Args, Debug)]
pub(crate) struct UpdateArgs {
    pub(crate) id: u64,
    #[command(flatten)]
    pub(crate) actor: ActorArgs,
    #[arg(long)]
    pub(crate) name: Option<String>,
    #[arg(long)]
    pub(crate) email: Option<String>,
    #[arg(long)]
    pub(crate) phone: Option<String>,
    #[arg(long)]
    pub(crate) address: Option<String>,
    #[arg(long)]
    pub(crate) city: Option<String>,
    #[arg(long)]
    pub(crate) social_profile: Option<String>,
    #[arg(long)]
    pub(crate) social_profile2: Option<String>,
    #[arg(long)]
    pub(crate) citizen: Option<bool>,
    #[arg(long, value_parser = parse_stage)]
    pub(crate) stage: Option<Stage>,
}

#[derive(Args, Debug)]
pub(crate) struct InterviewArgs {
    pub(crate) id: u64,
    #[command(flatten)]
    pub(crate) actor: ActorArgs,
    /// Interview date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_day)]
    pub(crate) date: DateTime<Utc>,
    /// Outcome; omit while the interview is still pending
    #[arg(long)]
    pub(crate) passed: Option<bool>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum VoteCommand {
    /// Cast one ballot
    Cast(CastArgs),
}

#[derive(Args, Debug)]
pub(crate) struct CastArgs {
    #[command(flatten)]
    pub(crate) actor: ActorArgs,
    #[arg(long)]
    pub(crate) candidate: u64,
    /// Lodge the ballot is cast through
    #[arg(long)]
    pub(crate) lodge: u64,
    #[arg(long, value_parser = parse_stage)]
    pub(crate) stage: Stage,
    #[arg(long, value_parser = parse_level, default_value = "LODGE")]
    pub(crate) level: VoteLevel,
    #[arg(long, value_parser = parse_value)]
    pub(crate) value: VoteValue,
    #[arg(long, default_value = "")]
    pub(crate) comments: String,
}

#[derive(Args, Debug)]
pub(crate) struct DecisionArgs {
    pub(crate) candidate: u64,
    #[arg(long, value_parser = parse_stage)]
    pub(crate) stage: Stage,
}

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// CSV export of the application form
    pub(crate) path: PathBuf,
    #[command(flatten)]
    pub(crate) actor: ActorArgs,
}

#[derive(Subcommand, Debug)]
pub(crate) enum MemberCommand {
    /// Register a member
    Add(MemberArgs),
}

#[derive(Args, Debug)]
pub(crate) struct MemberArgs {
    #[arg(long)]
    pub(crate) username: String,
    #[arg(long, default_value = "")]
    pub(crate) first_name: String,
    #[arg(long, default_value = "")]
    pub(crate) last_name: String,
    #[arg(long, default_value = "")]
    pub(crate) email: String,
    /// Office code, e.g. SE or FNMM
    #[arg(long, value_parser = parse_position, default_value = "Antare")]
    pub(crate) position: Position,
    #[arg(long)]
    pub(crate) dignitary: bool,
    #[arg(long)]
    pub(crate) senior: bool,
    /// Primary lodge; the member joins its roll
    #[arg(long)]
    pub(crate) lodge: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum LodgeCommand {
    /// Create a lodge
    Add { name: String },
    /// Add a member to a lodge roll
    Join { lodge: u64, member: u64 },
    /// List lodges
    List,
}

#[derive(Subcommand, Debug)]
pub(crate) enum DocumentCommand {
    /// Attach a document to a candidate
    Attach {
        candidate: u64,
        #[arg(long)]
        name: String,
        /// Where the file is kept
        #[arg(long)]
        storage_ref: String,
        #[command(flatten)]
        actor: ActorArgs,
    },
    /// Mark a candidate document verified
    Verify {
        id: u64,
        #[command(flatten)]
        actor: ActorArgs,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum MemberDocCommand {
    /// Store a document for a member
    Upload {
        #[arg(long)]
        member: u64,
        #[arg(long, value_parser = parse_document_kind)]
        kind: MemberDocumentKind,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        storage_ref: String,
        #[command(flatten)]
        actor: ActorArgs,
    },
    /// Remove a member document
    Delete {
        id: u64,
        #[command(flatten)]
        actor: ActorArgs,
    },
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let mut config = AppConfig::load()?;
    if let Some(data) = cli.data {
        config.storage.data_path = data;
    }

    telemetry::init(&config.telemetry, config.environment)?;

    let data_path = config.storage.data_path.clone();
    let store = Arc::new(InMemoryStore::load(&data_path)?);
    let service = MembershipService::new(store.clone(), config.listing.clone());
    let output = Output { json: cli.json };

    let mutates = cli.command.mutates();
    let result = commands::execute(&service, cli.command, output);

    if !mutates {
        debug!(path = %data_path.display(), "read-only command, snapshot untouched");
        return result;
    }
    // Failed imports still leave an audit record worth keeping.
    let saved = store.save(&data_path);
    finish(result, saved, &data_path)
}

/// The command's own error wins; a save failure behind it is logged instead of replacing it.
fn finish(
    result: Result<(), AppError>,
    saved: Result<(), SnapshotError>,
    path: &Path,
) -> Result<(), AppError> {
    match (result, saved) {
        (result, Ok(())) => {
            info!(path = %path.display(), "snapshot saved");
            result
        }
        (Ok(()), Err(save_err)) => Err(save_err.into()),
        (Err(err), Err(save_err)) => {
            error!(
                path = %path.display(),
                error = %save_err,
                "snapshot not saved after failed command"
            );
            Err(err)
        }
    }
}
