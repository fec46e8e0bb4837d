use thiserror::Error;

use crate::account::KycStatus;
use crate::ledger::Phase;
use crate::schedule::Stage;
use crate::types::{Balance, Tick};

/// Coarse classification of every failure. A failed call never leaves a
/// partial mutation behind regardless of kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Wrong stage or phase, or a tick threshold not yet reached.
    Precondition,
    /// Caller lacks the role the operation requires.
    Authorization,
    /// Amount below a minimum, above a cap, or supply below the minimum cap.
    Threshold,
    /// Duplicate decision, double refund, or an outstanding request.
    StateConflict,
    /// Store, encoding or configuration failure outside the sale rules.
    Storage,
}

#[derive(Debug, Error)]
pub enum SaleError {
    // ── Preconditions ────────────────────────────────────────────────────────
    #[error("operation not allowed in stage {stage:?}")]
    WrongStage { stage: Stage },

    #[error("operation not allowed in phase {phase:?}")]
    WrongPhase { phase: Phase },

    #[error("funding already started at tick {start}")]
    FundingAlreadyStarted { start: Tick },

    #[error("requested funding start {requested} is not after current tick {now}")]
    FundingStartInPast { requested: Tick, now: Tick },

    #[error("mint prepare delay not elapsed (ready at tick {ready_at})")]
    MintPrepareNotReady { ready_at: Tick },

    #[error("mint commit delay not elapsed (ready at tick {ready_at})")]
    MintCommitNotReady { ready_at: Tick },

    #[error("no mint request outstanding")]
    NoMintRequest,

    #[error("transfers are locked until the sale is finalized")]
    TransfersLocked,

    #[error("unknown account: {0}")]
    UnknownAccount(String),

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("self-transfer not allowed")]
    SelfTransfer,

    #[error("tick {got} precedes the last applied tick {last}")]
    TickRegression { last: Tick, got: Tick },

    // ── Authorization ────────────────────────────────────────────────────────
    #[error("{caller} is not authorized to {action}")]
    Unauthorized { caller: String, action: &'static str },

    // ── Thresholds ───────────────────────────────────────────────────────────
    #[error("contribution below minimum ({min} wei required)")]
    ContributionTooSmall { min: Balance },

    #[error("contribution cap exceeded: cap {cap} wei, attempted {attempted}")]
    ContributionCapExceeded { cap: Balance, attempted: Balance },

    #[error("minimum cap not reached: supply {supply}, required {minimum_cap}")]
    MinimumCapNotReached { supply: Balance, minimum_cap: Balance },

    #[error("minimum cap reached: supply {supply}, refunds are closed")]
    MinimumCapReached { supply: Balance },

    #[error("insufficient approved funds: need {need} wei, have {have}")]
    InsufficientApprovedFunds { need: Balance, have: Balance },

    #[error("insufficient token balance: need {need}, have {have}")]
    InsufficientBalance { need: Balance, have: Balance },

    #[error("insufficient allowance: need {need}, have {have}")]
    InsufficientAllowance { need: Balance, have: Balance },

    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    // ── State conflicts ──────────────────────────────────────────────────────
    #[error("KYC already decided: {status:?}")]
    KycAlreadyDecided { status: KycStatus },

    #[error("account {0} failed KYC and may not contribute")]
    KycRejected(String),

    #[error("nothing to refund for {0}")]
    NothingToRefund(String),

    #[error("a mint request is already outstanding")]
    MintRequestOutstanding,

    // ── Storage / configuration ──────────────────────────────────────────────
    #[error("invalid address {0}")]
    InvalidAddress(String),

    #[error("invalid sale parameters: {0}")]
    InvalidParams(String),

    #[error("sale state already initialized")]
    AlreadyInitialized,

    #[error("sale state not initialized")]
    NotInitialized,

    #[error("genesis supply mismatch: expected {expected}, got {got}")]
    GenesisSupplyMismatch { expected: Balance, got: Balance },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl SaleError {
    pub fn kind(&self) -> ErrorKind {
        use SaleError::*;
        match self {
            WrongStage { .. }
            | WrongPhase { .. }
            | FundingAlreadyStarted { .. }
            | FundingStartInPast { .. }
            | MintPrepareNotReady { .. }
            | MintCommitNotReady { .. }
            | NoMintRequest
            | TransfersLocked
            | UnknownAccount(_)
            | ZeroAmount
            | SelfTransfer
            | TickRegression { .. } => ErrorKind::Precondition,

            Unauthorized { .. } => ErrorKind::Authorization,

            ContributionTooSmall { .. }
            | ContributionCapExceeded { .. }
            | MinimumCapNotReached { .. }
            | MinimumCapReached { .. }
            | InsufficientApprovedFunds { .. }
            | InsufficientBalance { .. }
            | InsufficientAllowance { .. }
            | Overflow(_) => ErrorKind::Threshold,

            KycAlreadyDecided { .. }
            | KycRejected(_)
            | NothingToRefund(_)
            | MintRequestOutstanding => ErrorKind::StateConflict,

            InvalidAddress(_)
            | InvalidParams(_)
            | AlreadyInitialized
            | NotInitialized
            | GenesisSupplyMismatch { .. }
            | Serialization(_)
            | Storage(_) => ErrorKind::Storage,
        }
    }
}
