//! themine-rpc
//!
//! JSON-RPC 2.0 server for a TheMine sale node.
//!
//! Namespace: "themine"
//! Methods:
//!   themine_getAccount         account record of an address
//!   themine_getBalance         MINE balance in base units
//!   themine_getSaleInfo        schedule, stage, phase, rates, supply and fund pools
//!   themine_getMintRequest     outstanding mint request and mint status
//!   themine_getPendingActions  proposals waiting for confirmations
//!   themine_submitCall         queue a tick-stamped call and wait for its receipt

pub mod api;
pub mod server;
pub mod types;

pub use server::{QueuedCall, RpcServer, RpcServerState};
pub use types::{RpcAccount, RpcMintInfo, RpcPayout, RpcPendingAction, RpcReceipt, RpcSaleInfo};
