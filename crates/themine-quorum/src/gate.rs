use serde::{Deserialize, Serialize};
use themine_core::error::SaleError;
use themine_core::types::{Address, Balance, Tick};
use tracing::debug;

use crate::roles::Quorum;

// ── ActionKind ────────────────────────────────────────────────────────────────

/// Each gated operation owns exactly one pending-confirmation slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionKind {
    Pause,
    Unpause,
    Finalize,
    RetrieveEth,
    UpdateFundingStart,
    MintPrepare,
    MintCommit,
    ApproveKyc,
    RejectKyc,
}

impl ActionKind {
    pub const ALL: [ActionKind; 9] = [
        ActionKind::Pause,
        ActionKind::Unpause,
        ActionKind::Finalize,
        ActionKind::RetrieveEth,
        ActionKind::UpdateFundingStart,
        ActionKind::MintPrepare,
        ActionKind::MintCommit,
        ActionKind::ApproveKyc,
        ActionKind::RejectKyc,
    ];

    /// Stable key used for the pending-action slot in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Pause => "pause",
            ActionKind::Unpause => "unpause",
            ActionKind::Finalize => "finalize",
            ActionKind::RetrieveEth => "retrieve_eth",
            ActionKind::UpdateFundingStart => "update_funding_start",
            ActionKind::MintPrepare => "mint_prepare",
            ActionKind::MintCommit => "mint_commit",
            ActionKind::ApproveKyc => "approve_kyc",
            ActionKind::RejectKyc => "reject_kyc",
        }
    }
}

// ── ActionParams ──────────────────────────────────────────────────────────────

/// The arguments a confirmation agrees to. Two confirmations only combine
/// when their params are identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionParams {
    None,
    Beneficiary(Address),
    Account(Address),
    Retrieve { amount: Balance, destination: Address },
    FundingStart(Tick),
    MintPrepare { beneficiary: Address, amount: Balance },
    /// Bound to the outstanding request so a vote cannot carry over to
    /// a later one.
    MintCommit { beneficiary: Address, amount: Balance, prepared_at: Tick },
}

// ── PendingAction ─────────────────────────────────────────────────────────────

/// An outstanding proposal waiting for more distinct confirmations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    pub kind: ActionKind,
    pub params: ActionParams,
    /// Distinct members that confirmed, proposer first.
    pub confirmed_by: Vec<Address>,
    pub proposed_at: Tick,
}

impl PendingAction {
    pub fn proposer(&self) -> Option<&Address> {
        self.confirmed_by.first()
    }
}

// ── Confirmation ──────────────────────────────────────────────────────────────

/// Result of one call through the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// Recorded, still short of the threshold.
    Recorded { confirmations: usize, required: usize },
    /// The signer had already confirmed these params; nothing changed.
    AlreadyConfirmed { confirmations: usize, required: usize },
    /// Threshold met: the caller must execute the action now. The slot has
    /// been cleared.
    Reached { confirmed_by: Vec<Address> },
}

impl Confirmation {
    pub fn is_reached(&self) -> bool {
        matches!(self, Confirmation::Reached { .. })
    }
}

// ── ConfirmationGate ──────────────────────────────────────────────────────────

/// Propose-or-execute on a matching confirmation from a distinct member.
///
///   empty slot                      → record {params, [signer]}
///   same params, new member         → add confirmation; execute at threshold
///   same params, already confirmed  → no-op
///   different params (any member)   → replace with {params, [signer]}
///
/// The gate only rewrites the slot it is handed. Callers stage that slot
/// together with the rest of the call's mutations so a failed execution
/// leaves the previous proposal in place.
pub struct ConfirmationGate<'q> {
    quorum: &'q Quorum,
}

impl<'q> ConfirmationGate<'q> {
    pub fn new(quorum: &'q Quorum) -> Self {
        Self { quorum }
    }

    /// Fail unless `signer` belongs to the quorum.
    pub fn authorize(&self, signer: &Address, action: &'static str) -> Result<(), SaleError> {
        if self.quorum.is_member(signer) {
            Ok(())
        } else {
            Err(SaleError::Unauthorized { caller: signer.to_string(), action })
        }
    }

    /// Record `signer`'s confirmation of `params` in `slot`.
    pub fn confirm(
        &self,
        slot: &mut Option<PendingAction>,
        kind: ActionKind,
        params: ActionParams,
        signer: Address,
        now: Tick,
    ) -> Result<Confirmation, SaleError> {
        self.authorize(&signer, kind.as_str())?;
        let required = self.quorum.threshold();

        let pending = match slot.take() {
            Some(mut p) if p.params == params => {
                if p.confirmed_by.contains(&signer) {
                    let confirmations = p.confirmed_by.len();
                    *slot = Some(p);
                    return Ok(Confirmation::AlreadyConfirmed { confirmations, required });
                }
                p.confirmed_by.push(signer);
                p
            }
            previous => {
                if let Some(prev) = previous {
                    debug!(
                        action = kind.as_str(),
                        replaced_by = %signer,
                        dropped_confirmations = prev.confirmed_by.len(),
                        "pending proposal replaced by differing params"
                    );
                }
                PendingAction { kind, params, confirmed_by: vec![signer], proposed_at: now }
            }
        };

        if pending.confirmed_by.len() >= required {
            return Ok(Confirmation::Reached { confirmed_by: pending.confirmed_by });
        }

        let confirmations = pending.confirmed_by.len();
        debug!(
            action = kind.as_str(),
            signer = %signer,
            confirmations,
            required,
            "confirmation recorded"
        );
        *slot = Some(pending);
        Ok(Confirmation::Recorded { confirmations, required })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::from_bytes([n; 20])
    }

    fn admins() -> Quorum {
        Quorum::new(vec![addr(1), addr(2), addr(3)], 2)
    }

    #[test]
    fn two_distinct_members_reach_quorum() {
        let q = admins();
        let gate = ConfirmationGate::new(&q);
        let mut slot = None;

        let first = gate
            .confirm(&mut slot, ActionKind::Pause, ActionParams::None, addr(1), 5)
            .unwrap();
        assert_eq!(first, Confirmation::Recorded { confirmations: 1, required: 2 });
        assert_eq!(slot.as_ref().and_then(|p| p.proposer()), Some(&addr(1)));

        let second = gate
            .confirm(&mut slot, ActionKind::Pause, ActionParams::None, addr(3), 6)
            .unwrap();
        assert_eq!(second, Confirmation::Reached { confirmed_by: vec![addr(1), addr(3)] });
        assert!(slot.is_none(), "slot must be cleared once quorum is reached");
    }

    #[test]
    fn same_signer_twice_is_a_noop() {
        let q = admins();
        let gate = ConfirmationGate::new(&q);
        let mut slot = None;

        gate.confirm(&mut slot, ActionKind::Pause, ActionParams::None, addr(2), 1).unwrap();
        let again = gate
            .confirm(&mut slot, ActionKind::Pause, ActionParams::None, addr(2), 2)
            .unwrap();
        assert_eq!(again, Confirmation::AlreadyConfirmed { confirmations: 1, required: 2 });
        assert_eq!(slot.unwrap().proposed_at, 1);
    }

    #[test]
    fn differing_params_reset_the_vote() {
        let q = admins();
        let gate = ConfirmationGate::new(&q);
        let mut slot = None;

        gate.confirm(&mut slot, ActionKind::UpdateFundingStart, ActionParams::FundingStart(20), addr(1), 1)
            .unwrap();
        let other = gate
            .confirm(&mut slot, ActionKind::UpdateFundingStart, ActionParams::FundingStart(21), addr(2), 2)
            .unwrap();
        assert_eq!(other, Confirmation::Recorded { confirmations: 1, required: 2 });

        let pending = slot.clone().unwrap();
        assert_eq!(pending.params, ActionParams::FundingStart(21));
        assert_eq!(pending.confirmed_by, vec![addr(2)]);

        // admin 1 now has to agree with admin 2's params
        let done = gate
            .confirm(&mut slot, ActionKind::UpdateFundingStart, ActionParams::FundingStart(21), addr(1), 3)
            .unwrap();
        assert!(done.is_reached());
    }

    #[test]
    fn outsider_is_rejected_without_touching_the_slot() {
        let q = admins();
        let gate = ConfirmationGate::new(&q);
        let mut slot = None;
        gate.confirm(&mut slot, ActionKind::Finalize, ActionParams::Beneficiary(addr(9)), addr(1), 1)
            .unwrap();
        let before = slot.clone();

        let err = gate
            .confirm(&mut slot, ActionKind::Finalize, ActionParams::Beneficiary(addr(9)), addr(7), 2)
            .unwrap_err();
        assert!(matches!(err, SaleError::Unauthorized { .. }));
        assert_eq!(slot, before);
    }

    #[test]
    fn single_member_quorum_executes_immediately() {
        let q = Quorum::new(vec![addr(4)], 1);
        let gate = ConfirmationGate::new(&q);
        let mut slot = None;
        let res = gate
            .confirm(&mut slot, ActionKind::ApproveKyc, ActionParams::Account(addr(8)), addr(4), 1)
            .unwrap();
        assert_eq!(res, Confirmation::Reached { confirmed_by: vec![addr(4)] });
        assert!(slot.is_none());
    }

    #[test]
    fn storage_keys_are_unique() {
        let keys: std::collections::HashSet<_> =
            ActionKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(keys.len(), ActionKind::ALL.len());
    }
}
