use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use themine_core::types::{Address, Balance};
use tracing::info;

/// Why value leaves custody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutReason {
    /// KYC rejection returns the contribution.
    KycRejection,
    /// Contributor reclaims funds after a failed sale.
    Refund,
    /// Admin quorum withdraws approved funds.
    Retrieval,
}

/// An outbound value transfer on the external ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub to: Address,
    pub amount: Balance,
    pub reason: PayoutReason,
}

/// Receiver of outbound transfers.
///
/// The engine calls `deliver` only after the call's ledger changes are
/// committed. An implementation may call back into the engine; it will see
/// the post-commit state.
pub trait PayoutSink: Send + Sync {
    fn deliver(&self, payout: &Payout);
}

/// Writes each payout to the log.
#[derive(Debug, Default)]
pub struct LogSink;

impl PayoutSink for LogSink {
    fn deliver(&self, payout: &Payout) {
        info!(to = %payout.to, amount = payout.amount, reason = ?payout.reason, "payout");
    }
}

/// Keeps every payout in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<Payout>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Payout> {
        self.delivered.lock().map(|d| d.clone()).unwrap_or_default()
    }

    /// Sum of delivered amounts for one reason.
    pub fn total(&self, reason: PayoutReason) -> Balance {
        self.delivered()
            .iter()
            .filter(|p| p.reason == reason)
            .map(|p| p.amount)
            .sum()
    }
}

impl PayoutSink for RecordingSink {
    fn deliver(&self, payout: &Payout) {
        if let Ok(mut delivered) = self.delivered.lock() {
            delivered.push(payout.clone());
        }
    }
}
