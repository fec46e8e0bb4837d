use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use themine_core::account::AccountRecord;
use themine_core::call::{Call, Submission};
use themine_core::clock::TickSource;
use themine_core::error::SaleError;
use themine_core::ledger::GlobalState;
use themine_core::params::SaleParams;
use themine_core::schedule::{FundingSchedule, Stage};
use themine_core::types::{Address, Tick};
use themine_quorum::{ActionKind, ActionParams, Confirmation, ConfirmationGate, PendingAction, Quorum};
use tracing::{debug, info};

use crate::db::{CommitBatch, StateDb};
use crate::payout::{LogSink, Payout, PayoutSink};
use crate::query::SaleQuery;

// ── Outcome / Receipt ─────────────────────────────────────────────────────────

/// What an admitted call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The operation's effects are committed.
    Executed,
    /// The caller's confirmation is recorded; more are required.
    AwaitingConfirmation { action: ActionKind, confirmations: usize, required: usize },
    /// The caller had already confirmed the same params. Nothing changed.
    AlreadyConfirmed { action: ActionKind, confirmations: usize, required: usize },
}

impl Outcome {
    /// `None` when the gate reached its threshold and the action must run.
    fn waiting(action: ActionKind, confirmation: Confirmation) -> Option<Self> {
        match confirmation {
            Confirmation::Reached { .. } => None,
            Confirmation::Recorded { confirmations, required } => {
                Some(Outcome::AwaitingConfirmation { action, confirmations, required })
            }
            Confirmation::AlreadyConfirmed { confirmations, required } => {
                Some(Outcome::AlreadyConfirmed { action, confirmations, required })
            }
        }
    }

    pub fn is_executed(&self) -> bool {
        matches!(self, Outcome::Executed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tick: Tick,
    pub outcome: Outcome,
    /// Outbound transfers, already handed to the payout sink.
    pub payouts: Vec<Payout>,
}

// ── Staged mutations ──────────────────────────────────────────────────────────

/// Working copy of everything a call may touch. Nothing reaches the store
/// until `commit`; dropping it discards the call.
pub(crate) struct Staged<'db> {
    db: &'db StateDb,
    pub(crate) global: GlobalState,
    accounts: BTreeMap<Address, AccountRecord>,
    pending: BTreeMap<ActionKind, Option<PendingAction>>,
    payouts: Vec<Payout>,
}

impl<'db> Staged<'db> {
    fn new(db: &'db StateDb, global: GlobalState) -> Self {
        Self {
            db,
            global,
            accounts: BTreeMap::new(),
            pending: BTreeMap::new(),
            payouts: Vec::new(),
        }
    }

    /// Read-only view of an account, staged copy first.
    pub(crate) fn lookup(&self, address: &Address) -> Result<Option<AccountRecord>, SaleError> {
        match self.accounts.get(address) {
            Some(record) => Ok(Some(record.clone())),
            None => self.db.get_account(address),
        }
    }

    /// Mutable staged account, created empty if the address is new.
    pub(crate) fn account(&mut self, address: Address) -> Result<&mut AccountRecord, SaleError> {
        match self.accounts.entry(address) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                let record = self
                    .db
                    .get_account(&address)?
                    .unwrap_or_else(|| AccountRecord::new(address));
                Ok(e.insert(record))
            }
        }
    }

    /// Detach an account so it can be mutated alongside `global`.
    /// Hand it back with `put_account`.
    pub(crate) fn take_account(&mut self, address: Address) -> Result<AccountRecord, SaleError> {
        match self.accounts.remove(&address) {
            Some(record) => Ok(record),
            None => Ok(self
                .db
                .get_account(&address)?
                .unwrap_or_else(|| AccountRecord::new(address))),
        }
    }

    pub(crate) fn put_account(&mut self, record: AccountRecord) {
        self.accounts.insert(record.address, record);
    }

    /// The pending-confirmation slot for `kind`.
    pub(crate) fn slot(&mut self, kind: ActionKind) -> Result<&mut Option<PendingAction>, SaleError> {
        match self.pending.entry(kind) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                let current = self.db.get_pending(kind)?;
                Ok(e.insert(current))
            }
        }
    }

    pub(crate) fn pay(&mut self, payout: Payout) {
        self.payouts.push(payout);
    }

    /// Write everything in one transaction and hand back the payouts.
    fn commit(self) -> Result<Vec<Payout>, SaleError> {
        let batch = CommitBatch {
            global: Some(self.global),
            accounts: self.accounts.into_values().collect(),
            pending: self.pending.into_iter().collect(),
        };
        self.db.commit(&batch)?;
        Ok(self.payouts)
    }
}

// ── SaleEngine ────────────────────────────────────────────────────────────────

/// The sale state machine.
///
/// Each `apply` call is atomic: every check runs against a staged copy, the
/// copy is committed in one transaction, and only then are payouts handed
/// to the sink. A rejected call leaves the store untouched.
pub struct SaleEngine {
    pub db: Arc<StateDb>,
    clock: Arc<dyn TickSource>,
    pub(crate) params: SaleParams,
    pub(crate) admins: Quorum,
    pub(crate) kyc: Quorum,
    sink: Arc<dyn PayoutSink>,
    write_lock: Mutex<()>,
}

impl SaleEngine {
    /// Attach to an initialized store. Fails with `NotInitialized` before
    /// genesis has run.
    pub fn open(db: Arc<StateDb>, clock: Arc<dyn TickSource>) -> Result<Self, SaleError> {
        let params = db.get_params()?;
        Ok(Self {
            admins: Quorum::admins(&params),
            kyc: Quorum::kyc(&params),
            params,
            db,
            clock,
            sink: Arc::new(LogSink),
            write_lock: Mutex::new(()),
        })
    }

    /// Replace the default logging sink.
    pub fn with_sink(mut self, sink: Arc<dyn PayoutSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn params(&self) -> &SaleParams {
        &self.params
    }

    pub fn now(&self) -> Tick {
        self.clock.current_tick()
    }

    pub fn query(&self) -> SaleQuery<'_> {
        SaleQuery::new(&self.db)
    }

    /// Validate and apply one submission, delivering payouts to the
    /// configured sink.
    pub fn apply(&self, submission: &Submission) -> Result<Receipt, SaleError> {
        let sink = Arc::clone(&self.sink);
        self.apply_with(submission, sink.as_ref())
    }

    /// Like `apply`, delivering payouts to `sink`.
    pub fn apply_with(&self, submission: &Submission, sink: &dyn PayoutSink) -> Result<Receipt, SaleError> {
        let receipt = {
            let _guard = self
                .write_lock
                .lock()
                .map_err(|_| SaleError::Storage("engine lock poisoned".into()))?;

            let now = self.clock.current_tick();
            let global = self.db.get_global()?;
            if now < global.last_tick {
                return Err(SaleError::TickRegression { last: global.last_tick, got: now });
            }

            let mut staged = Staged::new(&self.db, global);
            let outcome = match self.dispatch(submission, &mut staged, now) {
                Ok(outcome) => outcome,
                Err(e) => {
                    debug!(
                        caller = %submission.caller,
                        call = submission.call.name(),
                        kind = ?e.kind(),
                        error = %e,
                        "call rejected"
                    );
                    return Err(e);
                }
            };
            staged.global.last_tick = now;
            let payouts = staged.commit()?;

            match &outcome {
                Outcome::Executed => info!(
                    tick = now,
                    caller = %submission.caller,
                    call = submission.call.name(),
                    "applied call"
                ),
                other => debug!(
                    tick = now,
                    caller = %submission.caller,
                    call = submission.call.name(),
                    outcome = ?other,
                    "confirmation recorded"
                ),
            }
            Receipt { tick: now, outcome, payouts }
        };

        // Lock released: a sink may re-enter the engine.
        for payout in &receipt.payouts {
            sink.deliver(payout);
        }
        Ok(receipt)
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    fn dispatch(&self, submission: &Submission, staged: &mut Staged<'_>, now: Tick) -> Result<Outcome, SaleError> {
        let caller = submission.caller;
        match &submission.call {
            Call::Contribute { amount } => self.contribute(staged, caller, *amount, now),
            Call::ApproveKyc { account } => self.approve_kyc(staged, caller, *account, now),
            Call::RejectKyc { account } => self.reject_kyc(staged, caller, *account, now),
            Call::Refund => self.refund(staged, caller, now),
            Call::RetrieveEth { amount, destination } => {
                self.retrieve_eth(staged, caller, *amount, *destination, now)
            }
            Call::Pause => self.pause(staged, caller, now),
            Call::Unpause => self.unpause(staged, caller, now),
            Call::Finalize { beneficiary } => self.finalize(staged, caller, *beneficiary, now),
            Call::UpdateFundingStart { tick } => self.update_funding_start(staged, caller, *tick, now),
            Call::MintPrepare { beneficiary, amount } => {
                self.mint_prepare(staged, caller, *beneficiary, *amount, now)
            }
            Call::MintCommit => self.mint_commit(staged, caller, now),
            Call::Transfer { to, amount } => self.transfer(staged, caller, *to, *amount),
            Call::Approve { spender, amount } => self.approve(staged, caller, *spender, *amount),
            Call::TransferFrom { from, to, amount } => {
                self.transfer_from(staged, caller, *from, *to, *amount)
            }
        }
    }

    // ── Shared helpers ────────────────────────────────────────────────────────

    pub(crate) fn schedule(&self, global: &GlobalState) -> FundingSchedule {
        self.params.schedule(global.funding_start)
    }

    pub(crate) fn stage(&self, global: &GlobalState, now: Tick) -> Stage {
        self.schedule(global).stage_at(now)
    }

    /// Run `signer`'s confirmation through `quorum`'s gate against the staged
    /// slot. Returns the outcome to report when the action must not execute
    /// yet.
    pub(crate) fn confirm(
        &self,
        staged: &mut Staged<'_>,
        quorum: &Quorum,
        kind: ActionKind,
        params: ActionParams,
        signer: Address,
        now: Tick,
    ) -> Result<Option<Outcome>, SaleError> {
        let slot = staged.slot(kind)?;
        let confirmation = ConfirmationGate::new(quorum).confirm(slot, kind, params, signer, now)?;
        Ok(Outcome::waiting(kind, confirmation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payout::{PayoutReason, RecordingSink};
    use themine_core::account::KycStatus;
    use themine_core::clock::LogicalClock;
    use themine_core::constants::{UNITS_PER_TOKEN, WEI_PER_ETH};
    use themine_core::error::ErrorKind;
    use themine_core::ledger::Phase;
    use themine_core::params::TokenEconomics;

    fn addr(n: u8) -> Address {
        Address::from_bytes([n; 20])
    }

    const ADMIN_A: u8 = 1;
    const ADMIN_B: u8 = 2;
    const KYC: u8 = 4;
    const PRESALE: u8 = 5;

    fn params() -> SaleParams {
        SaleParams {
            admins: [addr(ADMIN_A), addr(ADMIN_B), addr(3)],
            kyc_validator: addr(KYC),
            presale_account: addr(PRESALE),
            funding_start: 100,
            funding_round_duration: 30,
            minting_prepare_delay: 10,
            minting_commit_delay: 10,
            max_contribution: 20 * WEI_PER_ETH,
            economics: TokenEconomics::default(),
        }
    }

    struct Harness {
        engine: SaleEngine,
        clock: Arc<LogicalClock>,
    }

    impl Harness {
        fn new(params: SaleParams) -> Self {
            let db = Arc::new(StateDb::open_temporary().unwrap());
            let mut global = GlobalState::new(params.funding_start, 0);
            let mut presale = AccountRecord::new(params.presale_account);
            presale.token_balance = params.economics.presale_allocation;
            global.total_supply = presale.token_balance;
            db.put_params(&params).unwrap();
            db.commit(&CommitBatch { global: Some(global), accounts: vec![presale], pending: vec![] })
                .unwrap();
            let clock = Arc::new(LogicalClock::new(0));
            let engine = SaleEngine::open(db, clock.clone()).unwrap();
            Self { engine, clock }
        }

        fn at(&self, tick: Tick) -> &Self {
            self.clock.advance_to(tick).unwrap();
            self
        }

        fn call(&self, who: u8, call: Call) -> Result<Receipt, SaleError> {
            self.engine.apply(&Submission::new(addr(who), call))
        }

        fn global(&self) -> GlobalState {
            self.engine.db.get_global().unwrap()
        }

        fn account(&self, who: u8) -> AccountRecord {
            self.engine.db.get_account(&addr(who)).unwrap().unwrap_or_else(|| AccountRecord::new(addr(who)))
        }
    }

    #[test]
    fn one_eth_in_round_one_buys_625_tokens() {
        let h = Harness::new(params());
        h.at(100).call(10, Call::Contribute { amount: WEI_PER_ETH }).unwrap();
        let acc = h.account(10);
        assert_eq!(acc.token_balance, 625 * UNITS_PER_TOKEN);
        assert_eq!(acc.contributed, WEI_PER_ETH);
        assert_eq!(h.global().unapproved_funds, WEI_PER_ETH);
        assert_eq!(h.global().last_tick, 100);
    }

    #[test]
    fn contribution_outside_rounds_is_rejected_without_effects() {
        let h = Harness::new(params());
        let before = h.global();
        let err = h.at(99).call(10, Call::Contribute { amount: WEI_PER_ETH }).unwrap_err();
        assert!(matches!(err, SaleError::WrongStage { stage: Stage::NotStarted }));
        assert_eq!(h.global(), before);
        assert!(h.engine.db.get_account(&addr(10)).unwrap().is_none());
    }

    #[test]
    fn rejected_call_does_not_advance_last_tick() {
        let h = Harness::new(params());
        h.at(50).call(ADMIN_A, Call::Refund).unwrap_err();
        assert_eq!(h.global().last_tick, 0);
    }

    #[test]
    fn stale_clock_is_a_tick_regression() {
        let h = Harness::new(params());
        h.at(100).call(10, Call::Contribute { amount: WEI_PER_ETH }).unwrap();
        let mut global = h.global();
        global.last_tick = 200;
        h.engine.db.put_global(&global).unwrap();
        let err = h.call(10, Call::Contribute { amount: WEI_PER_ETH }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(matches!(err, SaleError::TickRegression { last: 200, got: 100 }));
    }

    #[test]
    fn outsider_cannot_pause() {
        let h = Harness::new(params());
        let err = h.at(100).call(9, Call::Pause).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert!(h.engine.db.get_pending(ActionKind::Pause).unwrap().is_none());
    }

    #[test]
    fn pending_confirmation_is_persisted() {
        let h = Harness::new(params());
        let receipt = h.at(100).call(ADMIN_A, Call::Pause).unwrap();
        assert_eq!(
            receipt.outcome,
            Outcome::AwaitingConfirmation { action: ActionKind::Pause, confirmations: 1, required: 2 }
        );
        let pending = h.engine.db.get_pending(ActionKind::Pause).unwrap().unwrap();
        assert_eq!(pending.confirmed_by, vec![addr(ADMIN_A)]);
        assert_eq!(h.global().phase, Phase::Active);

        let again = h.call(ADMIN_A, Call::Pause).unwrap();
        assert!(matches!(again.outcome, Outcome::AlreadyConfirmed { .. }));

        h.call(ADMIN_B, Call::Pause).unwrap();
        assert_eq!(h.global().phase, Phase::Paused);
        assert!(h.engine.db.get_pending(ActionKind::Pause).unwrap().is_none());
    }

    #[test]
    fn payouts_reach_the_sink_after_commit() {
        let h = Harness::new(params());
        let sink = RecordingSink::new();
        h.at(100).call(10, Call::Contribute { amount: 2 * WEI_PER_ETH }).unwrap();
        let receipt = h
            .engine
            .apply_with(&Submission::new(addr(KYC), Call::RejectKyc { account: addr(10) }), &sink)
            .unwrap();
        assert_eq!(receipt.payouts.len(), 1);
        assert_eq!(sink.total(PayoutReason::KycRejection), 2 * WEI_PER_ETH);
        assert_eq!(h.account(10).kyc_status, KycStatus::Rejected);
    }

    /// A sink that tries to claim the same refund again from inside delivery.
    struct ReentrantSink {
        engine: Arc<SaleEngine>,
        attempts: Mutex<Vec<Result<Receipt, String>>>,
    }

    impl PayoutSink for ReentrantSink {
        fn deliver(&self, payout: &Payout) {
            let again = self
                .engine
                .apply_with(&Submission::new(payout.to, Call::Refund), self)
                .map_err(|e| e.to_string());
            self.attempts.lock().unwrap().push(again);
        }
    }

    #[test]
    fn reentrant_refund_finds_nothing_left() {
        let h = Harness::new(params());
        h.at(100).call(10, Call::Contribute { amount: WEI_PER_ETH }).unwrap();
        h.at(130);

        let engine = Arc::new(h.engine);
        let sink = ReentrantSink { engine: engine.clone(), attempts: Mutex::new(vec![]) };
        let receipt = engine.apply_with(&Submission::new(addr(10), Call::Refund), &sink).unwrap();
        assert_eq!(receipt.payouts[0].amount, WEI_PER_ETH);

        let attempts = sink.attempts.lock().unwrap();
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].as_ref().unwrap_err().contains("nothing to refund"));
        let acc = engine.db.get_account(&addr(10)).unwrap().unwrap();
        assert_eq!(acc.contributed, 0);
        assert_eq!(engine.db.get_global().unwrap().held_funds(), 0);
    }
}
