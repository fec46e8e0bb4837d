use std::sync::Arc;

use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde_json::json;
use themine_core::call::{Call, CallEnvelope};
use themine_core::clock::LogicalClock;
use themine_core::constants::WEI_PER_ETH;
use themine_genesis::{apply_genesis, dev_address, dev_params};
use themine_rpc::{QueuedCall, RpcAccount, RpcReceipt, RpcSaleInfo, RpcServer, RpcServerState};
use themine_state::{SaleEngine, StateDb};
use tokio::sync::mpsc;

/// Node stand-in: applies queued calls in order and answers each one.
async fn start() -> (HttpClient, jsonrpsee::server::ServerHandle) {
    let db = Arc::new(StateDb::open_temporary().unwrap());
    apply_genesis(&db, &dev_params(10), 0).unwrap();
    let clock = Arc::new(LogicalClock::new(0));
    let engine = SaleEngine::open(db.clone(), clock.clone()).unwrap();

    let (tx, mut rx) = mpsc::channel::<QueuedCall>(16);
    let loop_clock = clock.clone();
    tokio::spawn(async move {
        while let Some(queued) = rx.recv().await {
            let verdict = loop_clock
                .advance_to(queued.envelope.tick)
                .and_then(|_| engine.apply(&queued.envelope.submission()));
            if let Some(reply) = queued.reply {
                let _ = reply.send(verdict);
            }
        }
    });

    let state = Arc::new(RpcServerState { db, clock, call_sender: Some(tx) });
    let (addr, handle) = RpcServer::new(state)
        .start("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let client = HttpClientBuilder::default().build(format!("http://{addr}")).unwrap();
    (client, handle)
}

fn envelope(tick: u64, caller: u8, call: Call) -> CallEnvelope {
    CallEnvelope { tick, caller: dev_address(caller), call }
}

#[tokio::test]
async fn sale_info_reports_genesis_state() {
    let (client, _handle) = start().await;
    let info: RpcSaleInfo = client.request("themine_getSaleInfo", rpc_params![]).await.unwrap();
    assert_eq!(info.phase, "Active");
    assert_eq!(info.stage, "NotStarted");
    assert_eq!(info.funding_start, 10);
    assert_eq!(info.round_two, 110);
    assert_eq!(info.funding_end, 310);
    assert_eq!(info.bonus_multipliers, ["125", "115", "105"]);
    assert_eq!(info.current_bonus, None);
    assert_eq!(info.total_supply, (200_000u128 * WEI_PER_ETH).to_string());
}

#[tokio::test]
async fn submitted_contribution_shows_up_in_balance() {
    let (client, _handle) = start().await;
    let contributor = dev_address(42).to_hex();

    let receipt: RpcReceipt = client
        .request(
            "themine_submitCall",
            rpc_params![envelope(10, 42, Call::Contribute { amount: WEI_PER_ETH })],
        )
        .await
        .unwrap();
    assert!(receipt.executed);
    assert_eq!(receipt.outcome, "executed");

    let balance: String = client
        .request("themine_getBalance", rpc_params![contributor.clone()])
        .await
        .unwrap();
    assert_eq!(balance, (625 * WEI_PER_ETH).to_string());

    let account: Option<RpcAccount> = client
        .request("themine_getAccount", rpc_params![contributor])
        .await
        .unwrap();
    let account = account.unwrap();
    assert_eq!(account.kyc_status, "Pending");
    assert_eq!(account.contributed_wei, WEI_PER_ETH.to_string());
}

#[tokio::test]
async fn first_admin_vote_is_pending() {
    let (client, _handle) = start().await;
    let receipt: RpcReceipt = client
        .request("themine_submitCall", rpc_params![envelope(5, 1, Call::Pause)])
        .await
        .unwrap();
    assert!(!receipt.executed);
    assert_eq!(receipt.confirmations, Some(1));
    assert_eq!(receipt.required, Some(2));

    let pending: serde_json::Value = client
        .request("themine_getPendingActions", rpc_params![])
        .await
        .unwrap();
    assert_eq!(pending[0]["action"], json!("pause"));
    assert_eq!(pending[0]["confirmed_by"][0], json!(dev_address(1).to_hex()));
}

#[tokio::test]
async fn sale_rule_violation_maps_to_error_code() {
    let (client, _handle) = start().await;
    let err = client
        .request::<RpcReceipt, _>("themine_submitCall", rpc_params![envelope(5, 99, Call::Pause)])
        .await
        .unwrap_err();
    match err {
        jsonrpsee::core::ClientError::Call(obj) => assert_eq!(obj.code(), -32002),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_address_is_invalid_params() {
    let (client, _handle) = start().await;
    let err = client
        .request::<String, _>("themine_getBalance", rpc_params!["0x1234"])
        .await
        .unwrap_err();
    match err {
        jsonrpsee::core::ClientError::Call(obj) => assert_eq!(obj.code(), -32602),
        other => panic!("unexpected error: {other:?}"),
    }
}
