//! Contribution ledger: contributions, KYC decisions, refunds and the
//! retrieval of approved funds.

use themine_core::account::{AccountRecord, KycStatus};
use themine_core::error::SaleError;
use themine_core::ledger::Phase;
use themine_core::params::CapPolicy;
use themine_core::schedule::Stage;
use themine_core::types::{Address, Balance, Tick};
use themine_quorum::{ActionKind, ActionParams, ConfirmationGate};
use tracing::info;

use crate::engine::{Outcome, SaleEngine, Staged};
use crate::payout::{Payout, PayoutReason};

/// The record a KYC decision applies to. Only contributors are subject to
/// review; allocations, mint and transfer recipients are not.
fn kyc_subject(staged: &Staged<'_>, account: &Address) -> Result<AccountRecord, SaleError> {
    let record = staged
        .lookup(account)?
        .filter(|r| r.first_contribution_at.is_some())
        .ok_or_else(|| SaleError::UnknownAccount(account.to_string()))?;
    if record.kyc_status.is_decided() {
        return Err(SaleError::KycAlreadyDecided { status: record.kyc_status });
    }
    Ok(record)
}

impl SaleEngine {
    pub(crate) fn contribute(
        &self,
        staged: &mut Staged<'_>,
        caller: Address,
        amount: Balance,
        now: Tick,
    ) -> Result<Outcome, SaleError> {
        if staged.global.phase != Phase::Active {
            return Err(SaleError::WrongPhase { phase: staged.global.phase });
        }
        let stage = self.stage(&staged.global, now);
        if !stage.is_funding() {
            return Err(SaleError::WrongStage { stage });
        }
        let econ = &self.params.economics;
        if amount < econ.min_contribution {
            return Err(SaleError::ContributionTooSmall { min: econ.min_contribution });
        }
        let tokens = econ.tokens_for(amount, stage)?;
        let new_supply = staged
            .global
            .total_supply
            .checked_add(tokens)
            .ok_or(SaleError::Overflow("total supply"))?;

        let cap = self.params.max_contribution;
        let account = staged.account(caller)?;
        if account.kyc_status == KycStatus::Rejected {
            return Err(SaleError::KycRejected(caller.to_string()));
        }
        let new_contributed = account
            .contributed
            .checked_add(amount)
            .ok_or(SaleError::Overflow("contribution"))?;
        let attempted = match econ.cap_policy {
            CapPolicy::PerAccount => new_contributed,
            CapPolicy::PerCall => amount,
        };
        if attempted > cap {
            return Err(SaleError::ContributionCapExceeded { cap, attempted });
        }
        let new_balance = account
            .token_balance
            .checked_add(tokens)
            .ok_or(SaleError::Overflow("token balance"))?;

        account.contributed = new_contributed;
        account.token_balance = new_balance;
        account.first_contribution_at.get_or_insert(now);
        let approved = account.kyc_status == KycStatus::Approved;

        // Funds of an already-approved contributor skip the review pool.
        let pool = if approved {
            &mut staged.global.approved_funds
        } else {
            &mut staged.global.unapproved_funds
        };
        *pool = pool.checked_add(amount).ok_or(SaleError::Overflow("held funds"))?;
        staged.global.total_supply = new_supply;

        info!(
            contributor = %caller,
            amount,
            tokens,
            stage = ?stage,
            "contribution accepted"
        );
        Ok(Outcome::Executed)
    }

    // ── KYC ───────────────────────────────────────────────────────────────────

    pub(crate) fn approve_kyc(
        &self,
        staged: &mut Staged<'_>,
        caller: Address,
        account: Address,
        now: Tick,
    ) -> Result<Outcome, SaleError> {
        ConfirmationGate::new(&self.kyc).authorize(&caller, "approve KYC")?;
        let record = kyc_subject(staged, &account)?;
        if let Some(waiting) =
            self.confirm(staged, &self.kyc, ActionKind::ApproveKyc, ActionParams::Account(account), caller, now)?
        {
            return Ok(waiting);
        }

        let moved = record.contributed;
        staged.global.unapproved_funds = staged
            .global
            .unapproved_funds
            .checked_sub(moved)
            .ok_or(SaleError::Overflow("unapproved funds"))?;
        staged.global.approved_funds = staged
            .global
            .approved_funds
            .checked_add(moved)
            .ok_or(SaleError::Overflow("approved funds"))?;
        staged.account(account)?.kyc_status = KycStatus::Approved;

        info!(account = %account, moved, "KYC approved");
        Ok(Outcome::Executed)
    }

    pub(crate) fn reject_kyc(
        &self,
        staged: &mut Staged<'_>,
        caller: Address,
        account: Address,
        now: Tick,
    ) -> Result<Outcome, SaleError> {
        ConfirmationGate::new(&self.kyc).authorize(&caller, "reject KYC")?;
        let record = kyc_subject(staged, &account)?;
        if let Some(waiting) =
            self.confirm(staged, &self.kyc, ActionKind::RejectKyc, ActionParams::Account(account), caller, now)?
        {
            return Ok(waiting);
        }

        let refunded = record.contributed;
        let burned = record.token_balance;
        staged.global.unapproved_funds = staged
            .global
            .unapproved_funds
            .checked_sub(refunded)
            .ok_or(SaleError::Overflow("unapproved funds"))?;
        staged.global.total_supply = staged
            .global
            .total_supply
            .checked_sub(burned)
            .ok_or(SaleError::Overflow("total supply"))?;

        let entry = staged.account(account)?;
        entry.kyc_status = KycStatus::Rejected;
        entry.contributed = 0;
        entry.token_balance = 0;
        if refunded > 0 {
            entry.refunded = true;
            staged.pay(Payout { to: account, amount: refunded, reason: PayoutReason::KycRejection });
        }

        info!(account = %account, refunded, burned, "KYC rejected");
        Ok(Outcome::Executed)
    }

    // ── Refund ────────────────────────────────────────────────────────────────

    pub(crate) fn refund(&self, staged: &mut Staged<'_>, caller: Address, now: Tick) -> Result<Outcome, SaleError> {
        // Allowed while paused.
        if staged.global.phase == Phase::Finalized {
            return Err(SaleError::WrongPhase { phase: staged.global.phase });
        }
        let stage = self.stage(&staged.global, now);
        if stage != Stage::Ended {
            return Err(SaleError::WrongStage { stage });
        }
        if staged.global.total_supply >= self.params.economics.minimum_cap {
            return Err(SaleError::MinimumCapReached { supply: staged.global.total_supply });
        }
        let record = match staged.lookup(&caller)? {
            Some(r) if r.contributed > 0 => r,
            _ => return Err(SaleError::NothingToRefund(caller.to_string())),
        };

        let amount = record.contributed;
        let burned = record.token_balance;
        let pool = if record.kyc_status == KycStatus::Approved {
            &mut staged.global.approved_funds
        } else {
            &mut staged.global.unapproved_funds
        };
        *pool = pool.checked_sub(amount).ok_or(SaleError::Overflow("held funds"))?;
        staged.global.total_supply = staged
            .global
            .total_supply
            .checked_sub(burned)
            .ok_or(SaleError::Overflow("total supply"))?;

        let entry = staged.account(caller)?;
        entry.contributed = 0;
        entry.token_balance = 0;
        entry.refunded = true;
        staged.pay(Payout { to: caller, amount, reason: PayoutReason::Refund });

        info!(contributor = %caller, amount, burned, "refund issued");
        Ok(Outcome::Executed)
    }

    // ── Retrieval ─────────────────────────────────────────────────────────────

    pub(crate) fn retrieve_eth(
        &self,
        staged: &mut Staged<'_>,
        caller: Address,
        amount: Balance,
        destination: Address,
        now: Tick,
    ) -> Result<Outcome, SaleError> {
        ConfirmationGate::new(&self.admins).authorize(&caller, "retrieve ETH")?;
        if staged.global.phase != Phase::Finalized {
            return Err(SaleError::WrongPhase { phase: staged.global.phase });
        }
        if amount == 0 {
            return Err(SaleError::ZeroAmount);
        }
        let have = staged.global.approved_funds;
        if have < amount {
            return Err(SaleError::InsufficientApprovedFunds { need: amount, have });
        }
        let params = ActionParams::Retrieve { amount, destination };
        if let Some(waiting) = self.confirm(staged, &self.admins, ActionKind::RetrieveEth, params, caller, now)? {
            return Ok(waiting);
        }

        staged.global.approved_funds = have - amount;
        staged.global.retrieved_funds = staged
            .global
            .retrieved_funds
            .checked_add(amount)
            .ok_or(SaleError::Overflow("retrieved funds"))?;
        staged.pay(Payout { to: destination, amount, reason: PayoutReason::Retrieval });

        info!(destination = %destination, amount, "approved funds retrieved");
        Ok(Outcome::Executed)
    }
}
