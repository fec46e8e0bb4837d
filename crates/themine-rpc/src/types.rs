use serde::{Deserialize, Serialize};
use themine_core::account::AccountRecord;
use themine_core::ledger::GlobalState;
use themine_core::params::SaleParams;
use themine_core::schedule::Stage;
use themine_core::types::Tick;
use themine_mint::MintStatus;
use themine_quorum::PendingAction;
use themine_state::{Outcome, Payout, Receipt};

/// Account summary returned by `themine_getAccount`.
/// Amounts are u128 rendered as decimal strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcAccount {
    pub address: String,
    pub contributed_wei: String,
    pub token_balance: String,
    pub kyc_status: String,
    pub refunded: bool,
    pub first_contribution_at: Option<Tick>,
}

impl From<&AccountRecord> for RpcAccount {
    fn from(a: &AccountRecord) -> Self {
        Self {
            address: a.address.to_hex(),
            contributed_wei: a.contributed.to_string(),
            token_balance: a.token_balance.to_string(),
            kyc_status: format!("{:?}", a.kyc_status),
            refunded: a.refunded,
            first_contribution_at: a.first_contribution_at,
        }
    }
}

/// Sale-wide view returned by `themine_getSaleInfo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcSaleInfo {
    pub current_tick: Tick,
    pub last_applied_tick: Tick,
    pub phase: String,
    pub stage: String,
    pub funding_start: Tick,
    pub round_two: Tick,
    pub round_three: Tick,
    pub funding_end: Tick,
    /// Bonus multiplier (percent) in effect now, if a round is running.
    pub current_bonus: Option<String>,
    pub bonus_multipliers: [String; 3],
    pub exchange_rate_cents: String,
    pub total_supply: String,
    pub minimum_cap: String,
    pub unapproved_funds: String,
    pub approved_funds: String,
    pub retrieved_funds: String,
    pub max_contribution: String,
    pub finalized_at: Option<Tick>,
}

impl RpcSaleInfo {
    pub fn build(params: &SaleParams, global: &GlobalState, now: Tick) -> Self {
        let schedule = params.schedule(global.funding_start);
        let stage: Stage = schedule.stage_at(now);
        let econ = &params.economics;
        let [b1, b2, b3] = econ.bonus_multipliers;
        Self {
            current_tick: now,
            last_applied_tick: global.last_tick,
            phase: format!("{:?}", global.phase),
            stage: format!("{stage:?}"),
            funding_start: schedule.funding_start,
            round_two: schedule.round_two,
            round_three: schedule.round_three,
            funding_end: schedule.funding_end,
            current_bonus: econ.bonus_multiplier(stage).map(|b| b.to_string()),
            bonus_multipliers: [b1.to_string(), b2.to_string(), b3.to_string()],
            exchange_rate_cents: econ.exchange_rate_cents.to_string(),
            total_supply: global.total_supply.to_string(),
            minimum_cap: econ.minimum_cap.to_string(),
            unapproved_funds: global.unapproved_funds.to_string(),
            approved_funds: global.approved_funds.to_string(),
            retrieved_funds: global.retrieved_funds.to_string(),
            max_contribution: params.max_contribution.to_string(),
            finalized_at: global.finalized_at,
        }
    }
}

/// Mint governor state returned by `themine_getMintRequest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcMintInfo {
    pub status: String,
    pub beneficiary: Option<String>,
    pub amount: Option<String>,
    pub prepared_at: Option<Tick>,
    pub last_mint_at: Option<Tick>,
}

impl RpcMintInfo {
    pub fn build(status: &MintStatus, global: &GlobalState, now: Tick) -> Self {
        let request = global.mint_request.as_ref();
        Self {
            status: status.describe(now),
            beneficiary: request.map(|r| r.beneficiary.to_hex()),
            amount: request.map(|r| r.amount.to_string()),
            prepared_at: request.map(|r| r.prepared_at),
            last_mint_at: global.last_mint_at,
        }
    }
}

/// One open proposal returned by `themine_getPendingActions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcPendingAction {
    pub action: String,
    /// The proposed arguments as JSON.
    pub params: serde_json::Value,
    pub confirmed_by: Vec<String>,
    pub proposed_at: Tick,
}

impl From<&PendingAction> for RpcPendingAction {
    fn from(p: &PendingAction) -> Self {
        Self {
            action: p.kind.as_str().to_string(),
            params: serde_json::to_value(&p.params).unwrap_or(serde_json::Value::Null),
            confirmed_by: p.confirmed_by.iter().map(|a| a.to_hex()).collect(),
            proposed_at: p.proposed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcPayout {
    pub to: String,
    pub amount_wei: String,
    pub reason: String,
}

impl From<&Payout> for RpcPayout {
    fn from(p: &Payout) -> Self {
        Self {
            to: p.to.to_hex(),
            amount_wei: p.amount.to_string(),
            reason: format!("{:?}", p.reason),
        }
    }
}

/// Result of `themine_submitCall`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcReceipt {
    pub tick: Tick,
    pub executed: bool,
    /// `executed`, `awaiting_confirmation` or `already_confirmed`.
    pub outcome: String,
    pub confirmations: Option<usize>,
    pub required: Option<usize>,
    pub payouts: Vec<RpcPayout>,
}

impl From<&Receipt> for RpcReceipt {
    fn from(r: &Receipt) -> Self {
        let (outcome, confirmations, required) = match &r.outcome {
            Outcome::Executed => ("executed", None, None),
            Outcome::AwaitingConfirmation { confirmations, required, .. } => {
                ("awaiting_confirmation", Some(*confirmations), Some(*required))
            }
            Outcome::AlreadyConfirmed { confirmations, required, .. } => {
                ("already_confirmed", Some(*confirmations), Some(*required))
            }
        };
        Self {
            tick: r.tick,
            executed: r.outcome.is_executed(),
            outcome: outcome.to_string(),
            confirmations,
            required,
            payouts: r.payouts.iter().map(RpcPayout::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use themine_genesis::dev_params;

    #[test]
    fn sale_info_keeps_wide_bonus_multipliers() {
        let mut params = dev_params(10);
        let wide = u128::from(u64::MAX) + 7;
        params.economics.bonus_multipliers = [wide, 115, 105];
        let info = RpcSaleInfo::build(&params, &GlobalState::new(10, 0), 10);
        assert_eq!(info.stage, "Round1");
        assert_eq!(info.current_bonus.as_deref(), Some("18446744073709551622"));
        assert_eq!(info.bonus_multipliers[0], wide.to_string());
    }
}
