pub mod db;
pub mod engine;
pub mod payout;
pub mod query;

mod funding;
mod ledger;
mod transfer;

pub use db::StateDb;
pub use engine::{Outcome, Receipt, SaleEngine};
pub use payout::{LogSink, Payout, PayoutReason, PayoutSink, RecordingSink};
pub use query::{SaleQuery, SupplyAudit};
