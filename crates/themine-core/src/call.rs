use serde::{Deserialize, Serialize};

use crate::error::SaleError;
use crate::types::{Address, Balance, Tick};

// ── Call ──────────────────────────────────────────────────────────────────────

/// Every operation the sale accepts. The caller identity travels separately
/// in `Submission`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Call {
    // ── Contribution ledger ──────────────────────────────────────────────────

    /// Contribute `amount` wei; converted to MINE at the current round's rate.
    Contribute { amount: Balance },

    /// KYC validator approves `account`, moving its funds to the approved pool.
    ApproveKyc { account: Address },

    /// KYC validator rejects `account`; its funds are refunded immediately.
    RejectKyc { account: Address },

    /// Caller reclaims its own contribution after a failed sale.
    Refund,

    /// Admin quorum pays `amount` wei of approved funds to `destination`.
    RetrieveEth { amount: Balance, destination: Address },

    // ── Funding state machine ────────────────────────────────────────────────

    /// Admin quorum halts contributions.
    Pause,

    /// Admin quorum resumes contributions.
    Unpause,

    /// Admin quorum closes a successful sale; team tokens go to `beneficiary`.
    Finalize { beneficiary: Address },

    /// Admin quorum moves the funding start before it is reached.
    UpdateFundingStart { tick: Tick },

    // ── Mint governor ────────────────────────────────────────────────────────

    /// Admin quorum announces a supply expansion.
    MintPrepare { beneficiary: Address, amount: Balance },

    /// Admin quorum executes the announced expansion after the commit delay.
    MintCommit,

    // ── Token transfers ──────────────────────────────────────────────────────

    Transfer { to: Address, amount: Balance },

    /// Set the allowance `spender` may draw from the caller.
    Approve { spender: Address, amount: Balance },

    TransferFrom { from: Address, to: Address, amount: Balance },
}

impl Call {
    /// Short operation name used in logs and authorization errors.
    pub fn name(&self) -> &'static str {
        match self {
            Call::Contribute { .. } => "contribute",
            Call::ApproveKyc { .. } => "approve KYC",
            Call::RejectKyc { .. } => "reject KYC",
            Call::Refund => "refund",
            Call::RetrieveEth { .. } => "retrieve ETH",
            Call::Pause => "pause",
            Call::Unpause => "unpause",
            Call::Finalize { .. } => "finalize",
            Call::UpdateFundingStart { .. } => "update funding start",
            Call::MintPrepare { .. } => "prepare mint",
            Call::MintCommit => "commit mint",
            Call::Transfer { .. } => "transfer",
            Call::Approve { .. } => "approve allowance",
            Call::TransferFrom { .. } => "transfer from",
        }
    }
}

// ── Submission ────────────────────────────────────────────────────────────────

/// A call together with the identity the external ledger authenticated.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Submission {
    pub caller: Address,
    pub call: Call,
}

impl Submission {
    pub fn new(caller: Address, call: Call) -> Self {
        Self { caller, call }
    }
}

// ── CallEnvelope ──────────────────────────────────────────────────────────────

/// A submission stamped with the tick at which the external ledger ordered
/// it. This is the unit the node consumes, one JSON object per line:
///
/// `{"tick": 42, "caller": "0x…", "call": {"Contribute": {"amount": 1000}}}`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallEnvelope {
    pub tick: Tick,
    pub caller: Address,
    pub call: Call,
}

impl CallEnvelope {
    pub fn from_json_line(line: &str) -> Result<Self, SaleError> {
        serde_json::from_str(line).map_err(|e| SaleError::Serialization(e.to_string()))
    }

    pub fn submission(&self) -> Submission {
        Submission::new(self.caller, self.call.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parses_from_json_line() {
        let caller = Address::from_bytes([9; 20]);
        let line = format!(
            r#"{{"tick": 42, "caller": "{caller}", "call": {{"Contribute": {{"amount": 1000000000000000000}}}}}}"#
        );
        let env = CallEnvelope::from_json_line(&line).unwrap();
        assert_eq!(env.tick, 42);
        assert_eq!(env.caller, caller);
        assert_eq!(env.call, Call::Contribute { amount: 1_000_000_000_000_000_000 });
    }

    #[test]
    fn unit_variants_parse_as_strings() {
        let caller = Address::from_bytes([1; 20]);
        let line = format!(r#"{{"tick": 7, "caller": "{caller}", "call": "MintCommit"}}"#);
        let env = CallEnvelope::from_json_line(&line).unwrap();
        assert_eq!(env.call, Call::MintCommit);
        assert_eq!(env.submission().caller, caller);
    }

    #[test]
    fn malformed_line_is_a_serialization_error() {
        assert!(matches!(
            CallEnvelope::from_json_line("{not json"),
            Err(SaleError::Serialization(_))
        ));
    }
}
