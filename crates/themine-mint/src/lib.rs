//! themine-mint
//!
//! Post-sale supply expansion. A mint is announced (prepare) and executed
//! (commit) in two separately confirmed steps, each gated by its own tick
//! delay, so holders can see a pending inflation before it lands.
//!
//! The confirmation rounds themselves run through `themine-quorum`; this
//! crate owns the timing rules and the ledger effect of each step.

pub mod governor;

pub use governor::{MintGovernor, MintStatus};
