pub mod constants;
pub mod error;
pub mod types;
pub mod account;
pub mod ledger;
pub mod params;
pub mod schedule;
pub mod call;
pub mod clock;

pub use constants::*;
pub use error::{ErrorKind, SaleError};
pub use types::*;
pub use account::*;
pub use ledger::*;
pub use params::*;
pub use schedule::*;
pub use call::*;
pub use clock::*;
