use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use themine_core::call::CallEnvelope;
use themine_core::clock::TickSource;
use themine_core::error::{ErrorKind, SaleError};
use themine_core::types::Address;
use themine_state::{Receipt, SaleQuery, StateDb};

use crate::api::TheMineApiServer;
use crate::types::{RpcAccount, RpcMintInfo, RpcPendingAction, RpcReceipt, RpcSaleInfo};

fn rpc_err(code: i32, msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned(code, msg.into(), None::<()>)
}

/// Sale rule violations get one code per error kind; store failures are
/// internal errors.
fn sale_err(e: &SaleError) -> ErrorObject<'static> {
    let code = match e.kind() {
        ErrorKind::Precondition => -32001,
        ErrorKind::Authorization => -32002,
        ErrorKind::Threshold => -32003,
        ErrorKind::StateConflict => -32004,
        ErrorKind::Storage => -32603,
    };
    rpc_err(code, e.to_string())
}

fn parse_address(s: &str) -> Result<Address, ErrorObject<'static>> {
    Address::from_hex(s).map_err(|e| rpc_err(-32602, e.to_string()))
}

/// True when unauthenticated call submission would be reachable from other
/// hosts.
fn exposes_submission(addr: &SocketAddr, submission_enabled: bool) -> bool {
    submission_enabled && !addr.ip().is_loopback()
}

/// A call handed to the node's apply loop. `reply` receives the engine's
/// verdict once the call has been applied.
#[derive(Debug)]
pub struct QueuedCall {
    pub envelope: CallEnvelope,
    pub reply: Option<oneshot::Sender<Result<Receipt, SaleError>>>,
}

/// Shared state passed to the RPC server.
pub struct RpcServerState {
    pub db: Arc<StateDb>,
    /// Tick used for stage reporting.
    pub clock: Arc<dyn TickSource>,
    /// Optional sender to forward submitted calls to the node pipeline.
    pub call_sender: Option<mpsc::Sender<QueuedCall>>,
}

/// The RPC server implementation.
pub struct RpcServer {
    state: Arc<RpcServerState>,
}

impl RpcServer {
    pub fn new(state: Arc<RpcServerState>) -> Self {
        Self { state }
    }

    /// Start the JSON-RPC server on `addr`. Returns the bound address and a
    /// handle to stop it.
    ///
    /// `submitCall` takes the caller address from the envelope as given, so
    /// anyone who can reach the server can act as any admin. Bind it to a
    /// loopback address.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<(SocketAddr, ServerHandle)> {
        if exposes_submission(&addr, self.state.call_sender.is_some()) {
            warn!(
                addr = %addr,
                "RPC listens beyond loopback with call submission enabled; callers are not authenticated"
            );
        }
        let server = Server::builder().build(addr).await?;
        let local = server.local_addr()?;
        let handle = server.start(self.into_rpc());
        info!(addr = %local, "RPC server started");
        Ok((local, handle))
    }

    fn query(&self) -> SaleQuery<'_> {
        SaleQuery::new(&self.state.db)
    }
}

#[async_trait]
impl TheMineApiServer for RpcServer {
    async fn get_account(&self, address: String) -> RpcResult<Option<RpcAccount>> {
        let address = parse_address(&address)?;
        let account = self.query().account(&address).map_err(|e| sale_err(&e))?;
        Ok(account.as_ref().map(RpcAccount::from))
    }

    async fn get_balance(&self, address: String) -> RpcResult<String> {
        let address = parse_address(&address)?;
        let balance = self.query().balance_of(&address).map_err(|e| sale_err(&e))?;
        Ok(balance.to_string())
    }

    async fn get_sale_info(&self) -> RpcResult<RpcSaleInfo> {
        let query = self.query();
        let params = query.params().map_err(|e| sale_err(&e))?;
        let global = query.global().map_err(|e| sale_err(&e))?;
        Ok(RpcSaleInfo::build(&params, &global, self.state.clock.current_tick()))
    }

    async fn get_mint_request(&self) -> RpcResult<RpcMintInfo> {
        let query = self.query();
        let now = self.state.clock.current_tick();
        let global = query.global().map_err(|e| sale_err(&e))?;
        let status = query.mint_status(now).map_err(|e| sale_err(&e))?;
        Ok(RpcMintInfo::build(&status, &global, now))
    }

    async fn get_pending_actions(&self) -> RpcResult<Vec<RpcPendingAction>> {
        let pending = self.query().pending_actions().map_err(|e| sale_err(&e))?;
        Ok(pending.iter().map(RpcPendingAction::from).collect())
    }

    async fn submit_call(&self, envelope: CallEnvelope) -> RpcResult<RpcReceipt> {
        let Some(sender) = &self.state.call_sender else {
            warn!("RPC: submitCall called but no call pipeline configured");
            return Err(rpc_err(-32603, "node call pipeline not connected"));
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        sender
            .send(QueuedCall { envelope, reply: Some(reply_tx) })
            .await
            .map_err(|_| rpc_err(-32603, "call queue closed"))?;

        let verdict = reply_rx
            .await
            .map_err(|_| rpc_err(-32603, "node dropped the call"))?;
        match verdict {
            Ok(receipt) => Ok(RpcReceipt::from(&receipt)),
            Err(e) => Err(sale_err(&e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_non_loopback_submission_is_flagged() {
        let local: SocketAddr = "127.0.0.1:8546".parse().unwrap();
        let local_v6: SocketAddr = "[::1]:8546".parse().unwrap();
        let public: SocketAddr = "0.0.0.0:8546".parse().unwrap();
        assert!(!exposes_submission(&local, true));
        assert!(!exposes_submission(&local_v6, true));
        assert!(exposes_submission(&public, true));
        assert!(!exposes_submission(&public, false));
    }
}
