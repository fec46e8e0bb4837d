//! Funding state machine and the two-step mint, all behind the admin quorum.

use themine_core::error::SaleError;
use themine_core::ledger::Phase;
use themine_core::schedule::Stage;
use themine_core::types::{Address, Balance, Tick};
use themine_mint::MintGovernor;
use themine_quorum::{ActionKind, ActionParams, ConfirmationGate};
use tracing::info;

use crate::engine::{Outcome, SaleEngine, Staged};

impl SaleEngine {
    fn authorize_admin(&self, caller: &Address, action: &'static str) -> Result<(), SaleError> {
        ConfirmationGate::new(&self.admins).authorize(caller, action)
    }

    // ── Pause / unpause ───────────────────────────────────────────────────────

    pub(crate) fn pause(&self, staged: &mut Staged<'_>, caller: Address, now: Tick) -> Result<Outcome, SaleError> {
        self.authorize_admin(&caller, "pause")?;
        if staged.global.phase != Phase::Active {
            return Err(SaleError::WrongPhase { phase: staged.global.phase });
        }
        if let Some(waiting) = self.confirm(staged, &self.admins, ActionKind::Pause, ActionParams::None, caller, now)? {
            return Ok(waiting);
        }
        staged.global.phase = Phase::Paused;
        info!(tick = now, "sale paused");
        Ok(Outcome::Executed)
    }

    pub(crate) fn unpause(&self, staged: &mut Staged<'_>, caller: Address, now: Tick) -> Result<Outcome, SaleError> {
        self.authorize_admin(&caller, "unpause")?;
        if staged.global.phase != Phase::Paused {
            return Err(SaleError::WrongPhase { phase: staged.global.phase });
        }
        if let Some(waiting) = self.confirm(staged, &self.admins, ActionKind::Unpause, ActionParams::None, caller, now)? {
            return Ok(waiting);
        }
        staged.global.phase = Phase::Active;
        info!(tick = now, "sale resumed");
        Ok(Outcome::Executed)
    }

    // ── Finalize ──────────────────────────────────────────────────────────────

    /// Close a successful sale. Preconditions are checked on every
    /// confirmation, including the one that reaches quorum.
    pub(crate) fn finalize(
        &self,
        staged: &mut Staged<'_>,
        caller: Address,
        beneficiary: Address,
        now: Tick,
    ) -> Result<Outcome, SaleError> {
        self.authorize_admin(&caller, "finalize")?;
        if staged.global.phase == Phase::Finalized {
            return Err(SaleError::WrongPhase { phase: staged.global.phase });
        }
        let stage = self.stage(&staged.global, now);
        if stage != Stage::Ended {
            return Err(SaleError::WrongStage { stage });
        }
        let econ = &self.params.economics;
        let supply = staged.global.total_supply;
        if supply < econ.minimum_cap {
            return Err(SaleError::MinimumCapNotReached { supply, minimum_cap: econ.minimum_cap });
        }
        let team = econ.team_allocation;
        let new_supply = supply.checked_add(team).ok_or(SaleError::Overflow("total supply"))?;

        let params = ActionParams::Beneficiary(beneficiary);
        if let Some(waiting) = self.confirm(staged, &self.admins, ActionKind::Finalize, params, caller, now)? {
            return Ok(waiting);
        }

        if team > 0 {
            let account = staged.account(beneficiary)?;
            account.token_balance = account
                .token_balance
                .checked_add(team)
                .ok_or(SaleError::Overflow("team allocation"))?;
        }
        staged.global.total_supply = new_supply;
        staged.global.phase = Phase::Finalized;
        staged.global.finalized_at = Some(now);

        info!(
            beneficiary = %beneficiary,
            team_allocation = team,
            total_supply = new_supply,
            approved_funds = staged.global.approved_funds,
            "sale finalized"
        );
        Ok(Outcome::Executed)
    }

    // ── Funding start ─────────────────────────────────────────────────────────

    pub(crate) fn update_funding_start(
        &self,
        staged: &mut Staged<'_>,
        caller: Address,
        tick: Tick,
        now: Tick,
    ) -> Result<Outcome, SaleError> {
        self.authorize_admin(&caller, "update funding start")?;
        let start = staged.global.funding_start;
        if now >= start {
            return Err(SaleError::FundingAlreadyStarted { start });
        }
        if tick <= now {
            return Err(SaleError::FundingStartInPast { requested: tick, now });
        }
        tick.checked_add(self.params.funding_round_duration)
            .ok_or(SaleError::Overflow("funding schedule"))?;

        let params = ActionParams::FundingStart(tick);
        if let Some(waiting) = self.confirm(staged, &self.admins, ActionKind::UpdateFundingStart, params, caller, now)? {
            return Ok(waiting);
        }

        staged.global.funding_start = tick;
        let schedule = self.schedule(&staged.global);
        info!(
            previous = start,
            funding_start = tick,
            round_two = schedule.round_two,
            round_three = schedule.round_three,
            funding_end = schedule.funding_end,
            "funding start moved"
        );
        Ok(Outcome::Executed)
    }

    // ── Mint ──────────────────────────────────────────────────────────────────

    pub(crate) fn mint_prepare(
        &self,
        staged: &mut Staged<'_>,
        caller: Address,
        beneficiary: Address,
        amount: Balance,
        now: Tick,
    ) -> Result<Outcome, SaleError> {
        self.authorize_admin(&caller, "prepare mint")?;
        let governor = MintGovernor::new(&self.params);
        governor.check_prepare(&staged.global, amount, now)?;

        let params = ActionParams::MintPrepare { beneficiary, amount };
        if let Some(waiting) = self.confirm(staged, &self.admins, ActionKind::MintPrepare, params, caller, now)? {
            return Ok(waiting);
        }
        governor.prepare(&mut staged.global, beneficiary, amount, now);
        Ok(Outcome::Executed)
    }

    pub(crate) fn mint_commit(&self, staged: &mut Staged<'_>, caller: Address, now: Tick) -> Result<Outcome, SaleError> {
        self.authorize_admin(&caller, "commit mint")?;
        let governor = MintGovernor::new(&self.params);
        let request = governor.check_commit(&staged.global, now)?.clone();

        let params = ActionParams::MintCommit {
            beneficiary: request.beneficiary,
            amount: request.amount,
            prepared_at: request.prepared_at,
        };
        if let Some(waiting) = self.confirm(staged, &self.admins, ActionKind::MintCommit, params, caller, now)? {
            return Ok(waiting);
        }

        let mut account = staged.take_account(request.beneficiary)?;
        let committed = governor.commit(&mut staged.global, &mut account, now);
        staged.put_account(account);
        committed?;
        Ok(Outcome::Executed)
    }
}
