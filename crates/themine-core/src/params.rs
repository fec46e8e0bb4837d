use serde::{Deserialize, Serialize};

use crate::constants::{
    ADMIN_COUNT, CONVERSION_DIVISOR, DEFAULT_MAX_CONTRIBUTION_WEI, ETH_USD_EXCHANGE_RATE_IN_CENTS,
    FUNDING_ROUNDS, MIN_CONTRIBUTION_WEI, TOKENS_PRESALE, TOKENS_TEAM, TOKEN_CREATED_MIN,
    TOKEN_FIRST_BONUS_MULTIPLIER, TOKEN_SECOND_BONUS_MULTIPLIER, TOKEN_THIRD_BONUS_MULTIPLIER,
};
use crate::error::SaleError;
use crate::schedule::FundingSchedule;
use crate::types::{Address, Balance, Tick};

fn default_max_contribution() -> Balance {
    DEFAULT_MAX_CONTRIBUTION_WEI
}

// ── CapPolicy ─────────────────────────────────────────────────────────────────

/// How `max_contribution` is applied.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum CapPolicy {
    /// Cumulative `contributed` of one account may not exceed the cap.
    #[default]
    PerAccount,
    /// Each single contribution may not exceed the cap.
    PerCall,
}

// ── TokenEconomics ────────────────────────────────────────────────────────────

/// Conversion and allocation figures. Every field defaults to the value in
/// `constants`, so parameter files only name what they change.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TokenEconomics {
    pub exchange_rate_cents: u128,
    /// Percent multipliers for rounds one, two and three.
    pub bonus_multipliers: [u128; 3],
    pub conversion_divisor: u128,
    pub minimum_cap: Balance,
    pub presale_allocation: Balance,
    pub team_allocation: Balance,
    pub min_contribution: Balance,
    pub cap_policy: CapPolicy,
}

impl Default for TokenEconomics {
    fn default() -> Self {
        Self {
            exchange_rate_cents: ETH_USD_EXCHANGE_RATE_IN_CENTS,
            bonus_multipliers: [
                TOKEN_FIRST_BONUS_MULTIPLIER,
                TOKEN_SECOND_BONUS_MULTIPLIER,
                TOKEN_THIRD_BONUS_MULTIPLIER,
            ],
            conversion_divisor: CONVERSION_DIVISOR,
            minimum_cap: TOKEN_CREATED_MIN,
            presale_allocation: TOKENS_PRESALE,
            team_allocation: TOKENS_TEAM,
            min_contribution: MIN_CONTRIBUTION_WEI,
            cap_policy: CapPolicy::PerAccount,
        }
    }
}

// ── SaleParams ────────────────────────────────────────────────────────────────

/// Construction parameters of the sale.
///
/// Supplied once at genesis and persisted alongside the ledger. Only
/// `funding_start` can change afterwards, and that copy lives in
/// `GlobalState`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SaleParams {
    /// The three administrators; any two distinct ones form a quorum.
    pub admins: [Address; ADMIN_COUNT],
    pub kyc_validator: Address,
    pub presale_account: Address,
    pub funding_start: Tick,
    /// Total length of the funding period, split into three bonus rounds.
    pub funding_round_duration: Tick,
    pub minting_prepare_delay: Tick,
    pub minting_commit_delay: Tick,
    #[serde(default = "default_max_contribution")]
    pub max_contribution: Balance,
    #[serde(default)]
    pub economics: TokenEconomics,
}

impl SaleParams {
    /// Reject parameter sets the engine cannot run safely.
    pub fn validate(&self) -> Result<(), SaleError> {
        let [a, b, c] = &self.admins;
        if a == b || a == c || b == c {
            return Err(SaleError::InvalidParams("administrators must be distinct".into()));
        }
        if self.funding_round_duration < FUNDING_ROUNDS {
            return Err(SaleError::InvalidParams(format!(
                "funding_round_duration must be at least {FUNDING_ROUNDS} ticks"
            )));
        }
        if self.funding_start.checked_add(self.funding_round_duration).is_none() {
            return Err(SaleError::InvalidParams("funding period overflows the tick range".into()));
        }
        let econ = &self.economics;
        if econ.conversion_divisor == 0 {
            return Err(SaleError::InvalidParams("conversion_divisor must be non-zero".into()));
        }
        let [first, second, third] = econ.bonus_multipliers;
        if !(first > second && second > third) {
            return Err(SaleError::InvalidParams(
                "bonus multipliers must decrease from round to round".into(),
            ));
        }
        if econ.min_contribution == 0 || econ.min_contribution > self.max_contribution {
            return Err(SaleError::InvalidParams(format!(
                "min_contribution {} must be non-zero and at most max_contribution {}",
                econ.min_contribution, self.max_contribution
            )));
        }
        Ok(())
    }

    /// Round boundaries for a given (possibly updated) funding start.
    pub fn schedule(&self, funding_start: Tick) -> FundingSchedule {
        FundingSchedule::new(funding_start, self.funding_round_duration)
    }

    pub fn is_admin(&self, who: &Address) -> bool {
        self.admins.contains(who)
    }
}
