use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;
use themine_core::call::CallEnvelope;

use crate::types::{RpcAccount, RpcMintInfo, RpcPendingAction, RpcReceipt, RpcSaleInfo};

/// TheMine JSON-RPC 2.0 API definition.
///
/// All method names are prefixed with "themine_" via `namespace = "themine"`.
#[rpc(server, namespace = "themine")]
pub trait TheMineApi {
    /// Account record by `0x`-prefixed hex address, or null if unknown.
    #[method(name = "getAccount")]
    async fn get_account(&self, address: String) -> RpcResult<Option<RpcAccount>>;

    /// MINE balance in base units (u128 as string). Zero for unknown addresses.
    #[method(name = "getBalance")]
    async fn get_balance(&self, address: String) -> RpcResult<String>;

    #[method(name = "getSaleInfo")]
    async fn get_sale_info(&self) -> RpcResult<RpcSaleInfo>;

    #[method(name = "getMintRequest")]
    async fn get_mint_request(&self) -> RpcResult<RpcMintInfo>;

    #[method(name = "getPendingActions")]
    async fn get_pending_actions(&self) -> RpcResult<Vec<RpcPendingAction>>;

    /// Queue a tick-stamped call for the node and wait until it is applied.
    /// Sale rule violations come back as errors with codes -32001..-32004.
    #[method(name = "submitCall")]
    async fn submit_call(&self, envelope: CallEnvelope) -> RpcResult<RpcReceipt>;
}
