//! themine-genesis
//!
//! Builds the initial sale state, writing directly into a `StateDb` without
//! going through the engine. This is the construction step of the sale:
//!
//! 1. Validate and persist the `SaleParams`.
//! 2. Credit the presale allocation to the presale account.
//! 3. Create the Global State: phase Active, funding start as configured,
//!    total supply equal to the presale allocation.
//!
//! Every later token comes from a contribution, the team allocation at
//! finalization, or a committed mint.

pub mod params;

pub use params::{dev_address, dev_params, load_params};

use themine_core::account::AccountRecord;
use themine_core::error::SaleError;
use themine_core::ledger::GlobalState;
use themine_core::params::SaleParams;
use themine_core::schedule::FundingSchedule;
use themine_core::types::{Address, Balance, Tick};
use themine_state::db::CommitBatch;
use themine_state::StateDb;
use tracing::info;

/// What genesis created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenesisSummary {
    pub presale_account: Address,
    pub presale_allocation: Balance,
    pub schedule: FundingSchedule,
    pub genesis_tick: Tick,
}

/// Apply the genesis state to an empty `StateDb`.
///
/// Fails with `AlreadyInitialized` if the store already holds a sale, and
/// with `InvalidParams` before writing anything if `params` do not validate.
pub fn apply_genesis(db: &StateDb, params: &SaleParams, genesis_tick: Tick) -> Result<GenesisSummary, SaleError> {
    if db.is_initialized() {
        return Err(SaleError::AlreadyInitialized);
    }
    params.validate()?;
    info!("applying TheMine sale genesis");

    db.put_params(params)?;

    // ── Presale allocation ───────────────────────────────────────────────────
    let allocation = params.economics.presale_allocation;
    let mut presale = AccountRecord::new(params.presale_account);
    presale.token_balance = allocation;
    info!(
        account = %params.presale_account,
        units = allocation,
        "genesis: presale allocation"
    );

    // ── Global state ─────────────────────────────────────────────────────────
    let mut global = GlobalState::new(params.funding_start, genesis_tick);
    global.total_supply = allocation;
    let schedule = params.schedule(params.funding_start);
    info!(
        funding_start = schedule.funding_start,
        round_two = schedule.round_two,
        round_three = schedule.round_three,
        funding_end = schedule.funding_end,
        minimum_cap = params.economics.minimum_cap,
        "genesis: funding schedule"
    );

    db.commit(&CommitBatch { global: Some(global), accounts: vec![presale], pending: Vec::new() })?;

    // ── Verify supply ────────────────────────────────────────────────────────
    verify_genesis_supply(db, params)?;

    db.flush()?;
    info!("genesis state committed to disk");

    Ok(GenesisSummary {
        presale_account: params.presale_account,
        presale_allocation: allocation,
        schedule,
        genesis_tick,
    })
}

/// Stored balances and the recorded total supply must both equal the
/// presale allocation.
fn verify_genesis_supply(db: &StateDb, params: &SaleParams) -> Result<(), SaleError> {
    let expected = params.economics.presale_allocation;
    let balances: Balance = db.iter_accounts()?.iter().map(|a| a.token_balance).sum();
    if balances != expected {
        return Err(SaleError::GenesisSupplyMismatch { expected, got: balances });
    }
    let recorded = db.get_global()?.total_supply;
    if recorded != expected {
        return Err(SaleError::GenesisSupplyMismatch { expected, got: recorded });
    }
    info!(total_supply = expected, "genesis supply verified");
    Ok(())
}
