//! themine-node: runs the MINE token sale against a tick-ordered call log.
//!
//! Startup sequence:
//!   1. Open (or initialise) the state database
//!   2. Apply genesis if the DB is fresh
//!   3. Start the JSON-RPC 2.0 server, if requested
//!   4. Feed calls from `--calls` (or stdin) into the apply queue
//!   5. Run the main loop: move the clock to each call's tick, then apply
//!
//! Logs go to stderr. When the queue drains, a JSON run summary is printed
//! to stdout.

mod input;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{info, warn};

use themine_core::clock::{LogicalClock, TickSource};
use themine_core::params::SaleParams;
use themine_core::types::{Balance, Tick};
use themine_genesis::{apply_genesis, dev_params, load_params};
use themine_rpc::{QueuedCall, RpcServer, RpcServerState};
use themine_state::{Outcome, PayoutReason, SaleEngine, StateDb};

#[derive(Parser, Debug)]
#[command(
    name = "themine-node",
    version,
    about = "TheMine sale node: applies tick-ordered calls to the MINE token sale ledger"
)]
struct Args {
    /// Directory for the persistent state database.
    #[arg(long, default_value = "~/.themine/data")]
    data_dir: PathBuf,

    /// Path to sale params JSON (only read on first run).
    #[arg(long)]
    params: Option<PathBuf>,

    /// Tick stamped on genesis (only used on first run).
    #[arg(long, default_value_t = 0)]
    genesis_tick: Tick,

    /// Call log, one JSON envelope per line. Reads stdin when omitted.
    #[arg(long)]
    calls: Option<PathBuf>,

    /// JSON-RPC listen address. With RPC enabled the node keeps serving
    /// after the call log is exhausted. Submitted calls are not
    /// authenticated; keep this on loopback.
    #[arg(long)]
    rpc_addr: Option<SocketAddr>,
}

/// Totals printed when the node stops.
#[derive(Debug, Default, Serialize)]
struct RunSummary {
    applied: u64,
    awaiting_confirmation: u64,
    rejected: u64,
    malformed: u64,
    last_tick: Tick,
    phase: String,
    total_supply: String,
    held_funds: String,
    refunded: String,
    kyc_refunded: String,
    retrieved: String,
    ledger_consistent: bool,
}

#[derive(Debug, Default)]
struct Payouts {
    refunded: Balance,
    kyc_refunded: Balance,
    retrieved: Balance,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,themine=debug")),
        )
        .init();

    let args = Args::parse();
    info!("TheMine node starting");

    // ── State database ────────────────────────────────────────────────────────
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;

    let db = Arc::new(StateDb::open(&data_dir).context("opening state database")?);

    // ── Genesis if fresh ──────────────────────────────────────────────────────
    if !db.is_initialized() {
        info!("fresh database, applying genesis");
        let params = load_or_default_params(args.params.as_deref(), args.genesis_tick)?;
        let summary = apply_genesis(&db, &params, args.genesis_tick).context("applying genesis")?;
        info!(
            presale = %summary.presale_account,
            funding_start = summary.schedule.funding_start,
            funding_end = summary.schedule.funding_end,
            "genesis applied"
        );
    } else {
        info!("existing database found, skipping genesis");
        if args.params.is_some() {
            warn!("--params ignored: sale already initialised");
        }
    }

    // ── Sale engine ───────────────────────────────────────────────────────────
    let resume_at = db.get_global().context("reading global state")?.last_tick;
    let clock = Arc::new(LogicalClock::new(resume_at));
    let engine = SaleEngine::open(Arc::clone(&db), clock.clone()).context("opening sale engine")?;

    // ── Inbound call queue ────────────────────────────────────────────────────
    let (call_sender, mut call_receiver) = mpsc::channel::<QueuedCall>(512);

    // ── RPC server ────────────────────────────────────────────────────────────
    let _rpc_handle = match args.rpc_addr {
        Some(addr) => {
            let rpc_state = Arc::new(RpcServerState {
                db: Arc::clone(&db),
                clock: clock.clone(),
                call_sender: Some(call_sender.clone()),
            });
            let (_, handle) = RpcServer::new(rpc_state)
                .start(addr)
                .await
                .context("starting RPC server")?;
            Some(handle)
        }
        None => None,
    };

    // ── Call log reader ───────────────────────────────────────────────────────
    let reader = match &args.calls {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening call log {}", path.display()))?;
            tokio::spawn(input::feed_calls(BufReader::new(file), call_sender))
        }
        None => tokio::spawn(input::feed_calls(BufReader::new(tokio::io::stdin()), call_sender)),
    };

    // ── Main loop: advance & apply ────────────────────────────────────────────
    let mut summary = RunSummary::default();
    let mut paid = Payouts::default();

    info!(tick = clock.current_tick(), "node ready");
    while let Some(queued) = call_receiver.recv().await {
        let envelope = &queued.envelope;
        let verdict = clock
            .advance_to(envelope.tick)
            .and_then(|_| engine.apply(&envelope.submission()));

        match &verdict {
            Ok(receipt) => {
                match receipt.outcome {
                    Outcome::Executed => summary.applied += 1,
                    _ => summary.awaiting_confirmation += 1,
                }
                for payout in &receipt.payouts {
                    let bucket = match payout.reason {
                        PayoutReason::Refund => &mut paid.refunded,
                        PayoutReason::KycRejection => &mut paid.kyc_refunded,
                        PayoutReason::Retrieval => &mut paid.retrieved,
                    };
                    *bucket = bucket.saturating_add(payout.amount);
                }
            }
            Err(e) => {
                summary.rejected += 1;
                warn!(
                    tick = envelope.tick,
                    caller = %envelope.caller,
                    call = envelope.call.name(),
                    kind = ?e.kind(),
                    error = %e,
                    "call rejected"
                );
            }
        }

        if let Some(reply) = queued.reply {
            let _ = reply.send(verdict);
        }
    }

    summary.malformed = reader.await.context("call reader task")?;

    // ── Run summary ───────────────────────────────────────────────────────────
    let query = engine.query();
    let global = query.global().context("reading global state")?;
    let audit = query.audit().context("auditing ledger")?;
    if !audit.is_consistent() {
        warn!(?audit, "ledger totals disagree with account records");
    }
    summary.last_tick = global.last_tick;
    summary.phase = format!("{:?}", global.phase);
    summary.total_supply = global.total_supply.to_string();
    summary.held_funds = global.held_funds().to_string();
    summary.refunded = paid.refunded.to_string();
    summary.kyc_refunded = paid.kyc_refunded.to_string();
    summary.retrieved = paid.retrieved.to_string();
    summary.ledger_consistent = audit.is_consistent();

    db.flush().context("flushing state database")?;
    info!(
        applied = summary.applied,
        rejected = summary.rejected,
        phase = %summary.phase,
        "call log exhausted"
    );
    println!("{}", serde_json::to_string(&summary).context("encoding run summary")?);

    Ok(())
}

/// Load sale parameters from a JSON file, or fall back to the development
/// parameters with funding opening ten ticks after genesis.
///
/// # Warning
/// Development parameters use the well-known addresses `0x…01`–`0x…05` as
/// admins, KYC validator and presale account. Only use them for local
/// testing.
fn load_or_default_params(path: Option<&Path>, genesis_tick: Tick) -> anyhow::Result<SaleParams> {
    if let Some(p) = path {
        return load_params(p).with_context(|| format!("loading sale params from {}", p.display()));
    }
    warn!("No --params provided. Using development parameters with well-known addresses. DO NOT USE IN PRODUCTION.");
    Ok(dev_params(genesis_tick.saturating_add(10)))
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tilde_expands_to_home() {
        std::env::set_var("HOME", "/home/miner");
        assert_eq!(expand_tilde(Path::new("~/.themine/data")), PathBuf::from("/home/miner/.themine/data"));
        assert_eq!(expand_tilde(Path::new("/var/lib/themine")), PathBuf::from("/var/lib/themine"));
    }

    #[test]
    fn dev_params_open_funding_after_genesis() {
        let params = load_or_default_params(None, 100).unwrap();
        assert_eq!(params.funding_start, 110);
    }
}
