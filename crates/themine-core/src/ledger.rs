use serde::{Deserialize, Serialize};

use crate::types::{Address, Balance, Tick};

// ── Phase ─────────────────────────────────────────────────────────────────────

/// Top-level lifecycle of the sale.
///
///   Active ⇄ Paused      (admin quorum, before finalization only)
///   Active | Paused → Finalized   (terminal; unlocks transfers)
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Active,
    Paused,
    Finalized,
}

// ── MintRequest ───────────────────────────────────────────────────────────────

/// A prepared supply expansion awaiting its commit window.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MintRequest {
    pub beneficiary: Address,
    pub amount: Balance,
    pub prepared_at: Tick,
}

// ── GlobalState ───────────────────────────────────────────────────────────────

/// The single sale-wide record. Created once at genesis, mutated by every
/// admitted call, never torn down.
///
/// Invariants:
///   total_supply == Σ account.token_balance
///   unapproved_funds + approved_funds == Σ contributed over unrefunded accounts
///                                        minus retrieved funds
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GlobalState {
    pub phase: Phase,
    /// First tick of round one. The only stored boundary; the others derive
    /// from it and the round duration.
    pub funding_start: Tick,
    pub total_supply: Balance,
    /// Wei held for accounts whose KYC is not yet approved.
    pub unapproved_funds: Balance,
    /// Wei held for approved accounts; the only pool `retrieveEth` may draw on.
    pub approved_funds: Balance,
    /// Cumulative wei paid out through `retrieveEth`.
    #[serde(default)]
    pub retrieved_funds: Balance,
    pub finalized_at: Option<Tick>,
    /// Tick of the last committed mint, if any.
    pub last_mint_at: Option<Tick>,
    pub mint_request: Option<MintRequest>,
    /// Tick of the last admitted call.
    pub last_tick: Tick,
}

impl GlobalState {
    pub fn new(funding_start: Tick, genesis_tick: Tick) -> Self {
        Self {
            phase: Phase::Active,
            funding_start,
            total_supply: 0,
            unapproved_funds: 0,
            approved_funds: 0,
            retrieved_funds: 0,
            finalized_at: None,
            last_mint_at: None,
            mint_request: None,
            last_tick: genesis_tick,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.phase == Phase::Finalized
    }

    /// Total wei currently in custody.
    pub fn held_funds(&self) -> Balance {
        self.unapproved_funds.saturating_add(self.approved_funds)
    }
}
