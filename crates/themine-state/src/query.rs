use serde::{Deserialize, Serialize};
use themine_core::account::{AccountRecord, KycStatus};
use themine_core::error::SaleError;
use themine_core::ledger::GlobalState;
use themine_core::params::SaleParams;
use themine_core::schedule::{FundingSchedule, Stage};
use themine_core::types::{Address, Balance, Tick};
use themine_mint::{MintGovernor, MintStatus};
use themine_quorum::PendingAction;

use crate::db::StateDb;

/// Ledger totals recomputed from every account record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyAudit {
    pub total_supply: Balance,
    pub sum_of_balances: Balance,
    pub unapproved_funds: Balance,
    pub approved_funds: Balance,
    pub retrieved_funds: Balance,
    /// Outstanding contributions of accounts not yet approved.
    pub pending_contributions: Balance,
    /// Outstanding contributions of approved accounts.
    pub approved_contributions: Balance,
}

impl SupplyAudit {
    /// Supply equals the sum of balances, and each custody pool matches the
    /// contributions it holds.
    pub fn is_consistent(&self) -> bool {
        self.total_supply == self.sum_of_balances
            && self.unapproved_funds == self.pending_contributions
            && self.approved_funds.checked_add(self.retrieved_funds) == Some(self.approved_contributions)
    }
}

/// Read-only accessors over the sale state.
pub struct SaleQuery<'a> {
    db: &'a StateDb,
}

impl<'a> SaleQuery<'a> {
    pub fn new(db: &'a StateDb) -> Self {
        Self { db }
    }

    pub fn params(&self) -> Result<SaleParams, SaleError> {
        self.db.get_params()
    }

    pub fn global(&self) -> Result<GlobalState, SaleError> {
        self.db.get_global()
    }

    pub fn account(&self, address: &Address) -> Result<Option<AccountRecord>, SaleError> {
        self.db.get_account(address)
    }

    /// Token balance; zero for unknown addresses.
    pub fn balance_of(&self, address: &Address) -> Result<Balance, SaleError> {
        Ok(self.db.get_account(address)?.map(|a| a.token_balance).unwrap_or(0))
    }

    pub fn contributed_of(&self, address: &Address) -> Result<Balance, SaleError> {
        Ok(self.db.get_account(address)?.map(|a| a.contributed).unwrap_or(0))
    }

    pub fn kyc_status(&self, address: &Address) -> Result<Option<KycStatus>, SaleError> {
        Ok(self.db.get_account(address)?.map(|a| a.kyc_status))
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Result<Balance, SaleError> {
        Ok(self.db.get_account(owner)?.map(|a| a.allowance(spender)).unwrap_or(0))
    }

    pub fn total_supply(&self) -> Result<Balance, SaleError> {
        Ok(self.db.get_global()?.total_supply)
    }

    /// Current round boundaries, reflecting any funding start update.
    pub fn schedule(&self) -> Result<FundingSchedule, SaleError> {
        let params = self.db.get_params()?;
        let global = self.db.get_global()?;
        Ok(params.schedule(global.funding_start))
    }

    pub fn stage_at(&self, now: Tick) -> Result<Stage, SaleError> {
        Ok(self.schedule()?.stage_at(now))
    }

    /// Bonus multiplier (percent) in effect at `now`, if a round is running.
    pub fn bonus_multiplier(&self, now: Tick) -> Result<Option<u128>, SaleError> {
        let params = self.db.get_params()?;
        let stage = self.stage_at(now)?;
        Ok(params.economics.bonus_multiplier(stage))
    }

    pub fn exchange_rate(&self) -> Result<u128, SaleError> {
        Ok(self.db.get_params()?.economics.exchange_rate_cents)
    }

    pub fn pending_actions(&self) -> Result<Vec<PendingAction>, SaleError> {
        self.db.iter_pending()
    }

    pub fn mint_status(&self, now: Tick) -> Result<MintStatus, SaleError> {
        let params = self.db.get_params()?;
        let global = self.db.get_global()?;
        Ok(MintGovernor::new(&params).status(&global, now))
    }

    pub fn audit(&self) -> Result<SupplyAudit, SaleError> {
        let global = self.db.get_global()?;
        let mut sum_of_balances: Balance = 0;
        let mut pending_contributions: Balance = 0;
        let mut approved_contributions: Balance = 0;
        for account in self.db.iter_accounts()? {
            sum_of_balances = sum_of_balances.saturating_add(account.token_balance);
            if account.kyc_status == KycStatus::Approved {
                approved_contributions = approved_contributions.saturating_add(account.contributed);
            } else {
                pending_contributions = pending_contributions.saturating_add(account.contributed);
            }
        }
        Ok(SupplyAudit {
            total_supply: global.total_supply,
            sum_of_balances,
            unapproved_funds: global.unapproved_funds,
            approved_funds: global.approved_funds,
            retrieved_funds: global.retrieved_funds,
            pending_contributions,
            approved_contributions,
        })
    }

    /// Human-readable summary of one account.
    pub fn describe_account(&self, address: &Address) -> Result<String, SaleError> {
        let a = self
            .db
            .get_account(address)?
            .ok_or_else(|| SaleError::UnknownAccount(address.to_string()))?;
        let refund_note = if a.refunded { " (refunded)" } else { "" };
        Ok(format!(
            "{}: {} MINE units, contributed {} wei, KYC {:?}{}",
            a.address, a.token_balance, a.contributed, a.kyc_status, refund_note
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::CommitBatch;
    use themine_core::params::TokenEconomics;

    fn addr(n: u8) -> Address {
        Address::from_bytes([n; 20])
    }

    fn seeded() -> StateDb {
        let db = StateDb::open_temporary().unwrap();
        let params = SaleParams {
            admins: [addr(1), addr(2), addr(3)],
            kyc_validator: addr(4),
            presale_account: addr(5),
            funding_start: 100,
            funding_round_duration: 30,
            minting_prepare_delay: 10,
            minting_commit_delay: 10,
            max_contribution: 1_000,
            economics: TokenEconomics::default(),
        };
        db.put_params(&params).unwrap();

        let mut global = GlobalState::new(120, 0);
        let mut pending = AccountRecord::new(addr(10));
        pending.contributed = 30;
        pending.token_balance = 7;
        let mut approved = AccountRecord::new(addr(11));
        approved.contributed = 50;
        approved.token_balance = 3;
        approved.kyc_status = KycStatus::Approved;
        global.unapproved_funds = 30;
        global.approved_funds = 40;
        global.retrieved_funds = 10;
        global.total_supply = 10;
        db.commit(&CommitBatch {
            global: Some(global),
            accounts: vec![pending, approved],
            pending: vec![],
        })
        .unwrap();
        db
    }

    #[test]
    fn schedule_follows_the_stored_funding_start() {
        let db = seeded();
        let q = SaleQuery::new(&db);
        assert_eq!(q.stage_at(119).unwrap(), Stage::NotStarted);
        assert_eq!(q.stage_at(120).unwrap(), Stage::Round1);
        assert_eq!(q.bonus_multiplier(145).unwrap(), Some(105));
        assert_eq!(q.bonus_multiplier(150).unwrap(), None);
        assert_eq!(q.exchange_rate().unwrap(), 50_000);
    }

    #[test]
    fn unknown_accounts_read_as_zero() {
        let db = seeded();
        let q = SaleQuery::new(&db);
        assert_eq!(q.balance_of(&addr(99)).unwrap(), 0);
        assert_eq!(q.kyc_status(&addr(99)).unwrap(), None);
        assert!(q.describe_account(&addr(99)).is_err());
        assert_eq!(q.balance_of(&addr(10)).unwrap(), 7);
        assert!(q.describe_account(&addr(11)).unwrap().contains("Approved"));
    }

    #[test]
    fn audit_balances_pools_against_accounts() {
        let db = seeded();
        let audit = SaleQuery::new(&db).audit().unwrap();
        assert_eq!(audit.sum_of_balances, 10);
        assert_eq!(audit.pending_contributions, 30);
        assert_eq!(audit.approved_contributions, 50);
        assert!(audit.is_consistent());
    }

    #[test]
    fn mint_status_is_locked_before_finalization() {
        let db = seeded();
        assert_eq!(SaleQuery::new(&db).mint_status(500).unwrap(), MintStatus::Locked);
    }
}
