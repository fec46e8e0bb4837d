use serde::{Deserialize, Serialize};
use themine_core::account::AccountRecord;
use themine_core::error::SaleError;
use themine_core::ledger::{GlobalState, MintRequest, Phase};
use themine_core::params::SaleParams;
use themine_core::types::{Address, Balance, Tick};
use tracing::info;

/// Where the mint protocol stands at a given tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MintStatus {
    /// Sale not finalized; minting unavailable.
    Locked,
    /// Waiting out the prepare delay.
    Cooling { ready_at: Tick },
    /// A prepare may be confirmed now.
    Open,
    /// Prepared; waiting out the commit delay.
    Prepared { request: MintRequest, commit_ready_at: Tick },
    /// Prepared and past the commit delay.
    Committable { request: MintRequest },
}

impl MintStatus {
    pub fn describe(&self, now: Tick) -> String {
        match self {
            MintStatus::Locked => "Locked: sale not finalized".to_string(),
            MintStatus::Cooling { ready_at } => {
                format!("Cooling: prepare possible in {} ticks", ready_at.saturating_sub(now))
            }
            MintStatus::Open => "Open: a mint may be prepared".to_string(),
            MintStatus::Prepared { request, commit_ready_at } => format!(
                "Prepared: {} units for {} | commit possible in {} ticks",
                request.amount,
                request.beneficiary,
                commit_ready_at.saturating_sub(now)
            ),
            MintStatus::Committable { request } => format!(
                "Committable: {} units for {} prepared at tick {}",
                request.amount, request.beneficiary, request.prepared_at
            ),
        }
    }
}

/// Timing rules and ledger effects of the two mint steps.
pub struct MintGovernor<'a> {
    params: &'a SaleParams,
}

impl<'a> MintGovernor<'a> {
    pub fn new(params: &'a SaleParams) -> Self {
        Self { params }
    }

    /// First tick at which a prepare may execute: `mintingPrepareDelay` after
    /// finalization, or after the last committed mint.
    pub fn prepare_ready_at(&self, global: &GlobalState) -> Option<Tick> {
        let anchor = global.last_mint_at.or(global.finalized_at)?;
        Some(anchor.saturating_add(self.params.minting_prepare_delay))
    }

    pub fn commit_ready_at(&self, request: &MintRequest) -> Tick {
        request.prepared_at.saturating_add(self.params.minting_commit_delay)
    }

    /// Validate a prepare request against the current state.
    pub fn check_prepare(&self, global: &GlobalState, amount: Balance, now: Tick) -> Result<(), SaleError> {
        if global.phase != Phase::Finalized {
            return Err(SaleError::WrongPhase { phase: global.phase });
        }
        if global.mint_request.is_some() {
            return Err(SaleError::MintRequestOutstanding);
        }
        if amount == 0 {
            return Err(SaleError::ZeroAmount);
        }
        let ready_at = self
            .prepare_ready_at(global)
            .ok_or(SaleError::WrongPhase { phase: global.phase })?;
        if now < ready_at {
            return Err(SaleError::MintPrepareNotReady { ready_at });
        }
        global
            .total_supply
            .checked_add(amount)
            .ok_or(SaleError::Overflow("mint amount"))?;
        Ok(())
    }

    /// Store the request once the prepare quorum is reached.
    pub fn prepare(&self, global: &mut GlobalState, beneficiary: Address, amount: Balance, now: Tick) {
        global.mint_request = Some(MintRequest { beneficiary, amount, prepared_at: now });
        info!(
            beneficiary = %beneficiary,
            amount,
            commit_ready_at = now.saturating_add(self.params.minting_commit_delay),
            "mint prepared"
        );
    }

    /// Validate a commit and return the request it would execute.
    pub fn check_commit<'g>(&self, global: &'g GlobalState, now: Tick) -> Result<&'g MintRequest, SaleError> {
        if global.phase != Phase::Finalized {
            return Err(SaleError::WrongPhase { phase: global.phase });
        }
        let request = global.mint_request.as_ref().ok_or(SaleError::NoMintRequest)?;
        let ready_at = self.commit_ready_at(request);
        if now < ready_at {
            return Err(SaleError::MintCommitNotReady { ready_at });
        }
        Ok(request)
    }

    /// Credit the prepared amount to `beneficiary` and the total supply, then
    /// clear the request. `beneficiary` must be the request's beneficiary.
    pub fn commit(
        &self,
        global: &mut GlobalState,
        beneficiary: &mut AccountRecord,
        now: Tick,
    ) -> Result<MintRequest, SaleError> {
        let request = self.check_commit(global, now)?.clone();
        if beneficiary.address != request.beneficiary {
            return Err(SaleError::UnknownAccount(beneficiary.address.to_string()));
        }
        let new_supply = global
            .total_supply
            .checked_add(request.amount)
            .ok_or(SaleError::Overflow("total supply"))?;
        let new_balance = beneficiary
            .token_balance
            .checked_add(request.amount)
            .ok_or(SaleError::Overflow("beneficiary balance"))?;

        global.total_supply = new_supply;
        beneficiary.token_balance = new_balance;
        global.mint_request = None;
        global.last_mint_at = Some(now);

        info!(
            beneficiary = %request.beneficiary,
            amount = request.amount,
            total_supply = new_supply,
            "mint committed"
        );
        Ok(request)
    }

    pub fn status(&self, global: &GlobalState, now: Tick) -> MintStatus {
        if global.phase != Phase::Finalized {
            return MintStatus::Locked;
        }
        if let Some(request) = &global.mint_request {
            let commit_ready_at = self.commit_ready_at(request);
            return if now >= commit_ready_at {
                MintStatus::Committable { request: request.clone() }
            } else {
                MintStatus::Prepared { request: request.clone(), commit_ready_at }
            };
        }
        match self.prepare_ready_at(global) {
            Some(ready_at) if now < ready_at => MintStatus::Cooling { ready_at },
            Some(_) => MintStatus::Open,
            None => MintStatus::Locked,
        }
    }
}
