//! themine-quorum
//!
//! N-of-M confirmation primitive behind every privileged operation: pause,
//! unpause, finalize, fund retrieval, funding-start adjustment, mint prepare
//! and mint commit (2-of-3 administrators) plus the KYC decisions (1-of-1
//! validator).

pub mod gate;
pub mod roles;

pub use gate::{ActionKind, ActionParams, Confirmation, ConfirmationGate, PendingAction};
pub use roles::Quorum;
