use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Address, Balance, Tick};

// ── KycStatus ─────────────────────────────────────────────────────────────────

/// Know-your-customer decision for a contributing account.
///
/// Starts `Pending` and moves at most once, to either `Approved` or
/// `Rejected`. Never reversed.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum KycStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl KycStatus {
    pub fn is_decided(&self) -> bool {
        !matches!(self, KycStatus::Pending)
    }
}

// ── AccountRecord ─────────────────────────────────────────────────────────────

/// Per-address ledger entry as stored in the state DB.
///
/// Created lazily on first contribution (or first incoming token credit) and
/// never deleted; a refund zeroes `contributed` and `token_balance` instead.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AccountRecord {
    pub address: Address,
    /// Wei received from this account during the sale.
    pub contributed: Balance,
    pub kyc_status: KycStatus,
    /// MINE balance in base units.
    pub token_balance: Balance,
    /// Delegated-transfer allowances granted by this account, keyed by spender.
    #[serde(default)]
    pub allowances: BTreeMap<Address, Balance>,
    /// Tick of the first accepted contribution.
    #[serde(default)]
    pub first_contribution_at: Option<Tick>,
    /// Set once the account has been paid back (refund or KYC rejection).
    #[serde(default)]
    pub refunded: bool,
}

impl AccountRecord {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            contributed: 0,
            kyc_status: KycStatus::Pending,
            token_balance: 0,
            allowances: BTreeMap::new(),
            first_contribution_at: None,
            refunded: false,
        }
    }

    /// Allowance `spender` may still draw from this account.
    pub fn allowance(&self, spender: &Address) -> Balance {
        self.allowances.get(spender).copied().unwrap_or(0)
    }

    /// True if this account holds funds that a refund would return.
    pub fn has_refundable_funds(&self) -> bool {
        self.contributed > 0
    }
}
