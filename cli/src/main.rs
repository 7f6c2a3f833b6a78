//! MEDTRAIL operator CLI.
//!
//! Appends to, lists and verifies a SQLite-backed audit log, and runs the
//! ward-round demo against a throwaway in-memory log.
//!
//! Usage:
//!   medtrail keygen >> .env
//!   medtrail append --actor 7 --action READ_RECORDS
//!   medtrail list --actor 7 --from 2026-03-06 --page-size 50
//!   medtrail verify --all
//!   medtrail demo
//!
//! Results go to stdout as JSON; logs go to stderr. Set `RUST_LOG=debug`
//! for verbose output.

mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use medtrail_contracts::{
    error::{MedResult, MedtrailError},
    query::{AuditFilter, PageRequest, TimeBound, DEFAULT_PAGE_SIZE},
    verify::VerificationReport,
};
use medtrail_core::{
    traits::{AuditStore, ChainAuditor},
    AuditTrail,
};
use medtrail_ref_records::{mock_data::ward_roster, scenarios::ward_round, RecordsError};
use medtrail_signing::{Ed25519Verifier, KeyPair};
use medtrail_store::SqliteAuditStore;
use medtrail_verify::ChainVerifier;

use config::MedtrailConfig;

/// Exit status for a chain that failed verification.
const EXIT_CHAIN_BROKEN: i32 = 2;

// ── CLI definition ────────────────────────────────────────────────────────────

/// MEDTRAIL: tamper-evident audit trail for medical-record access.
#[derive(Parser)]
#[command(name = "medtrail", version, about)]
struct Cli {
    /// Configuration file. Missing is fine; defaults apply.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a fresh Ed25519 keypair as environment assignments.
    Keygen,

    /// Record one action and print the sealed entry.
    Append {
        #[arg(long)]
        actor: u64,
        /// Action kind, e.g. READ_RECORDS.
        #[arg(long)]
        action: String,
        /// Record or patient the action touched.
        #[arg(long)]
        subject: Option<u64>,
    },

    /// List entries matching all given filters, oldest first.
    List {
        #[arg(long)]
        actor: Option<u64>,
        #[arg(long)]
        action: Option<String>,
        /// Lower bound: YYYY-MM-DD (start of day) or an RFC 3339 instant.
        #[arg(long, value_name = "DATE|INSTANT")]
        from: Option<TimeBound>,
        /// Upper bound: YYYY-MM-DD (end of day) or an RFC 3339 instant.
        #[arg(long, value_name = "DATE|INSTANT")]
        to: Option<TimeBound>,
        /// Pages count from 1; smaller values are clamped.
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        page: i64,
        /// At most 100; zero or negative falls back to the default.
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE as i64, allow_negative_numbers = true)]
        page_size: i64,
    },

    /// Replay the chain from genesis. Exits 2 when it is broken.
    Verify {
        /// Report every broken entry instead of stopping at the first.
        #[arg(long)]
        all: bool,
    },

    /// Run the ward-round scenario against an in-memory log.
    Demo,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Audit(#[from] MedtrailError),

    #[error(transparent)]
    Records(#[from] RecordsError),

    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

type CliResult<T> = Result<T, CliError>;

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let config = match MedtrailConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("medtrail: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let result = match cli.command {
        Command::Keygen => keygen(&config),
        Command::Append {
            actor,
            action,
            subject,
        } => append(&config, actor, &action, subject),
        Command::List {
            actor,
            action,
            from,
            to,
            page,
            page_size,
        } => {
            let filter = AuditFilter {
                actor_id: actor,
                action_kind: action,
                from,
                to,
            };
            list(&config, &filter, PageRequest::new(page, page_size))
        }
        Command::Verify { all } => verify(&config, all),
        Command::Demo => demo(),
    };

    match result {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("medtrail: {e}");
            std::process::exit(1);
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn print_json(value: &impl Serialize) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_store(config: &MedtrailConfig) -> MedResult<SqliteAuditStore> {
    SqliteAuditStore::open(
        &config.storage.database_path,
        config.storage.busy_timeout(),
    )
}

/// Readers never create a database; a wrong path is an error.
fn open_existing_store(config: &MedtrailConfig) -> MedResult<SqliteAuditStore> {
    SqliteAuditStore::open_existing(
        &config.storage.database_path,
        config.storage.busy_timeout(),
    )
}

fn chain_verifier(config: &MedtrailConfig, verifier: Ed25519Verifier) -> ChainVerifier {
    ChainVerifier::new(Box::new(verifier))
        .enumerate_all(config.verification.enumerate_all_breaks)
        .batch_size(config.verification.batch_size)
}

fn keygen(config: &MedtrailConfig) -> CliResult<i32> {
    let keys = KeyPair::generate();
    println!("{}={}", config.keys.private_key_env, keys.private_key_hex());
    println!("{}={}", config.keys.public_key_env, keys.public_key_hex());
    Ok(0)
}

fn append(
    config: &MedtrailConfig,
    actor_id: u64,
    action_kind: &str,
    subject_id: Option<u64>,
) -> CliResult<i32> {
    let (signer, verifier) = config.keypair(env_var)?.into_parts();
    let trail = AuditTrail::new(
        Box::new(open_store(config)?),
        Box::new(signer),
        Box::new(chain_verifier(config, verifier)),
    );

    let entry = trail.append(actor_id, action_kind, subject_id)?;
    print_json(&entry)?;
    Ok(0)
}

fn list(config: &MedtrailConfig, filter: &AuditFilter, page: PageRequest) -> CliResult<i32> {
    let store = open_existing_store(config)?;
    let page = store.query(filter, page)?;
    info!(total = page.total, page = page.page, pages = page.pages, "listed audit entries");
    print_json(&page)?;
    Ok(0)
}

fn verify(config: &MedtrailConfig, all: bool) -> CliResult<i32> {
    let store = open_existing_store(config)?;
    let auditor = chain_verifier(config, config.verifier(env_var)?);
    let auditor = if all { auditor.enumerate_all(true) } else { auditor };

    let report = auditor.audit(&store)?;
    print_json(&report)?;
    Ok(report_status(&report))
}

fn report_status(report: &VerificationReport) -> i32 {
    eprintln!("{}", report.summary());
    if report.valid {
        0
    } else {
        EXIT_CHAIN_BROKEN
    }
}

fn demo() -> CliResult<i32> {
    let service = ward_round::in_memory_service();
    let summary = ward_round::run(&service)?;
    print_json(&json!({
        "roster": ward_roster(),
        "audit_public_key": service.trail().public_key_hex(),
        "summary": summary,
    }))?;
    Ok(report_status(&summary.verification))
}
