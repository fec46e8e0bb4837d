//! MINE token transfers, locked until the sale is finalized.

use themine_core::error::SaleError;
use themine_core::ledger::GlobalState;
use themine_core::types::{Address, Balance};
use tracing::debug;

use crate::engine::{Outcome, SaleEngine, Staged};

fn ensure_unlocked(global: &GlobalState) -> Result<(), SaleError> {
    if global.is_finalized() {
        Ok(())
    } else {
        Err(SaleError::TransfersLocked)
    }
}

impl SaleEngine {
    pub(crate) fn transfer(
        &self,
        staged: &mut Staged<'_>,
        caller: Address,
        to: Address,
        amount: Balance,
    ) -> Result<Outcome, SaleError> {
        ensure_unlocked(&staged.global)?;
        if amount == 0 {
            return Err(SaleError::ZeroAmount);
        }
        if to == caller {
            return Err(SaleError::SelfTransfer);
        }
        move_tokens(staged, caller, to, amount)?;
        debug!(from = %caller, to = %to, amount, "transfer");
        Ok(Outcome::Executed)
    }

    /// Set the allowance `spender` may draw from the caller. Allowed in any
    /// phase; zero clears it.
    pub(crate) fn approve(
        &self,
        staged: &mut Staged<'_>,
        caller: Address,
        spender: Address,
        amount: Balance,
    ) -> Result<Outcome, SaleError> {
        let owner = staged.account(caller)?;
        if amount == 0 {
            owner.allowances.remove(&spender);
        } else {
            owner.allowances.insert(spender, amount);
        }
        debug!(owner = %caller, spender = %spender, amount, "allowance set");
        Ok(Outcome::Executed)
    }

    pub(crate) fn transfer_from(
        &self,
        staged: &mut Staged<'_>,
        caller: Address,
        from: Address,
        to: Address,
        amount: Balance,
    ) -> Result<Outcome, SaleError> {
        ensure_unlocked(&staged.global)?;
        if amount == 0 {
            return Err(SaleError::ZeroAmount);
        }
        if to == from {
            return Err(SaleError::SelfTransfer);
        }
        let owner = staged.account(from)?;
        let have = owner.allowance(&caller);
        if have < amount {
            return Err(SaleError::InsufficientAllowance { need: amount, have });
        }
        let remaining = have - amount;
        if remaining == 0 {
            owner.allowances.remove(&caller);
        } else {
            owner.allowances.insert(caller, remaining);
        }
        move_tokens(staged, from, to, amount)?;
        debug!(spender = %caller, from = %from, to = %to, amount, "transfer from");
        Ok(Outcome::Executed)
    }
}

/// Debit `from` and credit `to`. `from` and `to` must differ.
fn move_tokens(staged: &mut Staged<'_>, from: Address, to: Address, amount: Balance) -> Result<(), SaleError> {
    let sender = staged.account(from)?;
    if sender.token_balance < amount {
        return Err(SaleError::InsufficientBalance { need: amount, have: sender.token_balance });
    }
    sender.token_balance -= amount;

    let recipient = staged.account(to)?;
    recipient.token_balance = recipient
        .token_balance
        .checked_add(amount)
        .ok_or(SaleError::Overflow("recipient balance"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use themine_core::account::AccountRecord;
    use themine_core::call::{Call, Submission};
    use themine_core::clock::LogicalClock;
    use themine_core::constants::WEI_PER_ETH;
    use themine_core::ledger::Phase;
    use themine_core::params::{SaleParams, TokenEconomics};

    use super::*;
    use crate::db::{CommitBatch, StateDb};
    use crate::engine::Receipt;

    fn addr(n: u8) -> Address {
        Address::from_bytes([n; 20])
    }

    const PRESALE: u8 = 5;

    fn setup(phase: Phase) -> SaleEngine {
        let params = SaleParams {
            admins: [addr(1), addr(2), addr(3)],
            kyc_validator: addr(4),
            presale_account: addr(PRESALE),
            funding_start: 100,
            funding_round_duration: 30,
            minting_prepare_delay: 10,
            minting_commit_delay: 10,
            max_contribution: 20 * WEI_PER_ETH,
            economics: TokenEconomics::default(),
        };
        let db = Arc::new(StateDb::open_temporary().unwrap());
        db.put_params(&params).unwrap();
        let mut global = GlobalState::new(params.funding_start, 0);
        global.phase = phase;
        let mut presale = AccountRecord::new(addr(PRESALE));
        presale.token_balance = 1_000;
        global.total_supply = 1_000;
        db.commit(&CommitBatch { global: Some(global), accounts: vec![presale], pending: vec![] })
            .unwrap();
        SaleEngine::open(db, Arc::new(LogicalClock::new(200))).unwrap()
    }

    fn call(engine: &SaleEngine, who: u8, call: Call) -> Result<Receipt, SaleError> {
        engine.apply(&Submission::new(addr(who), call))
    }

    fn balance(engine: &SaleEngine, who: u8) -> Balance {
        engine.db.get_account(&addr(who)).unwrap().map(|a| a.token_balance).unwrap_or(0)
    }

    #[test]
    fn transfers_are_locked_before_finalization() {
        for phase in [Phase::Active, Phase::Paused] {
            let engine = setup(phase);
            let err = call(&engine, PRESALE, Call::Transfer { to: addr(9), amount: 1 }).unwrap_err();
            assert!(matches!(err, SaleError::TransfersLocked));
            let err = call(&engine, 9, Call::TransferFrom { from: addr(PRESALE), to: addr(9), amount: 1 })
                .unwrap_err();
            assert!(matches!(err, SaleError::TransfersLocked));
        }
    }

    #[test]
    fn transfer_moves_balance_and_keeps_supply() {
        let engine = setup(Phase::Finalized);
        call(&engine, PRESALE, Call::Transfer { to: addr(9), amount: 400 }).unwrap();
        assert_eq!(balance(&engine, PRESALE), 600);
        assert_eq!(balance(&engine, 9), 400);
        assert_eq!(engine.db.get_global().unwrap().total_supply, 1_000);
    }

    #[test]
    fn transfer_rejects_zero_self_and_overdraft() {
        let engine = setup(Phase::Finalized);
        assert!(matches!(
            call(&engine, PRESALE, Call::Transfer { to: addr(9), amount: 0 }),
            Err(SaleError::ZeroAmount)
        ));
        assert!(matches!(
            call(&engine, PRESALE, Call::Transfer { to: addr(PRESALE), amount: 1 }),
            Err(SaleError::SelfTransfer)
        ));
        assert!(matches!(
            call(&engine, PRESALE, Call::Transfer { to: addr(9), amount: 1_001 }),
            Err(SaleError::InsufficientBalance { need: 1_001, have: 1_000 })
        ));
        assert!(engine.db.get_account(&addr(9)).unwrap().is_none());
    }

    #[test]
    fn approve_works_before_finalization_and_transfer_from_spends_it() {
        let engine = setup(Phase::Active);
        call(&engine, PRESALE, Call::Approve { spender: addr(8), amount: 300 }).unwrap();
        let owner = engine.db.get_account(&addr(PRESALE)).unwrap().unwrap();
        assert_eq!(owner.allowance(&addr(8)), 300);

        let mut global = engine.db.get_global().unwrap();
        global.phase = Phase::Finalized;
        engine.db.put_global(&global).unwrap();

        let err = call(&engine, 8, Call::TransferFrom { from: addr(PRESALE), to: addr(9), amount: 301 })
            .unwrap_err();
        assert!(matches!(err, SaleError::InsufficientAllowance { need: 301, have: 300 }));

        call(&engine, 8, Call::TransferFrom { from: addr(PRESALE), to: addr(9), amount: 300 }).unwrap();
        assert_eq!(balance(&engine, 9), 300);
        let owner = engine.db.get_account(&addr(PRESALE)).unwrap().unwrap();
        assert_eq!(owner.allowance(&addr(8)), 0);
        assert!(owner.allowances.is_empty());
    }
}
