// File: tests/protocol_integration.rs
//
// End-to-end integration test driving the real `StratumClient` over a
// loopback TCP socket, simulating the pool server side by hand. Covers
// the "happy-path share" fixture from spec.md §8 scenario 1: subscribe,
// authorize, a `mining.notify` for job 5, a `mining.set_target` that
// guarantees the next hash wins, and the resulting `mining.submit`
// carrying the job id in force at submit time.
//
// Tree Location:
// - tests/protocol_integration.rs (end-to-end socket test)
// - Depends on: opr_stratum_miner, tokio, serde_json, tempfile

use std::sync::Arc;
use std::time::Duration;

use opr_stratum_miner::core::{Credentials, Identity};
use opr_stratum_miner::StratumClient;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

const FIXTURE_OPR_HASH: &str = "00037f39cf870a1f49129f9c82d935665d352ffd25ea3296208f6f7b16fd654f";

#[tokio::test]
async fn happy_path_share_is_submitted_under_the_notified_job_id() {
    // Small table so the test doesn't spend real time building a
    // multi-megabyte lookup table.
    std::env::set_var("LXRBITSIZE", "8");

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let identity = Identity {
        username: "user".to_string(),
        minername: "miner".to_string(),
        version: "1.0".to_string(),
    };
    let (client, _hashrate_rx, _submission_rx) =
        StratumClient::new(identity, Credentials::default(), 1, dir.path().to_path_buf()).unwrap();

    let run_client = Arc::clone(&client);
    let target_addr = addr.to_string();
    let run_handle = tokio::spawn(async move { run_client.run(target_addr).await });

    let (stream, _) = listener.accept().await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    // subscribe
    let subscribe_line = lines.next_line().await.unwrap().unwrap();
    let subscribe: Value = serde_json::from_str(&subscribe_line).unwrap();
    assert_eq!(subscribe["method"], "mining.subscribe");
    let sub_id = subscribe["id"].as_i64().unwrap();
    write_half
        .write_all(format!("{{\"id\":{sub_id},\"result\":[],\"error\":null}}\n").as_bytes())
        .await
        .unwrap();

    // authorize
    let authorize_line = lines.next_line().await.unwrap().unwrap();
    let authorize: Value = serde_json::from_str(&authorize_line).unwrap();
    assert_eq!(authorize["method"], "mining.authorize");
    let auth_id = authorize["id"].as_i64().unwrap();
    write_half
        .write_all(format!("{{\"id\":{auth_id},\"result\":true,\"error\":null}}\n").as_bytes())
        .await
        .unwrap();

    // Announce job 5, then drop the target to zero so the very next
    // hash is guaranteed to win (score >= 0 always holds).
    write_half
        .write_all(
            format!(
                "{{\"method\":\"mining.notify\",\"params\":[\"5\",\"{FIXTURE_OPR_HASH}\"]}}\n"
            )
            .as_bytes(),
        )
        .await
        .unwrap();
    write_half
        .write_all(b"{\"method\":\"mining.set_target\",\"params\":[\"0x0000000000000000\"]}\n")
        .await
        .unwrap();

    let submit_line = tokio::time::timeout(Duration::from_secs(10), lines.next_line())
        .await
        .expect("timed out waiting for mining.submit")
        .unwrap()
        .unwrap();
    let submit: Value = serde_json::from_str(&submit_line).unwrap();
    assert_eq!(submit["method"], "mining.submit");
    let params = submit["params"].as_array().unwrap();
    assert_eq!(params[0], "user,miner");
    assert_eq!(params[1], "5");
    assert_eq!(params[3], FIXTURE_OPR_HASH);
    assert_eq!(params[4], "0000000000000000");

    client.close().await;
    let _ = tokio::time::timeout(Duration::from_secs(2), run_handle).await;
    std::env::remove_var("LXRBITSIZE");
}

#[tokio::test]
async fn authorize_denied_closes_client_without_reconnecting() {
    std::env::set_var("LXRBITSIZE", "8");

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let identity = Identity {
        username: "user".to_string(),
        minername: "miner".to_string(),
        version: "1.0".to_string(),
    };
    let (client, _hashrate_rx, _submission_rx) =
        StratumClient::new(identity, Credentials::default(), 1, dir.path().to_path_buf()).unwrap();

    let run_client = Arc::clone(&client);
    let target_addr = addr.to_string();
    let run_handle = tokio::spawn(async move { run_client.run(target_addr).await });

    let (stream, _) = listener.accept().await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let subscribe_line = lines.next_line().await.unwrap().unwrap();
    let subscribe: Value = serde_json::from_str(&subscribe_line).unwrap();
    let sub_id = subscribe["id"].as_i64().unwrap();
    write_half
        .write_all(format!("{{\"id\":{sub_id},\"result\":[],\"error\":null}}\n").as_bytes())
        .await
        .unwrap();

    let authorize_line = lines.next_line().await.unwrap().unwrap();
    let authorize: Value = serde_json::from_str(&authorize_line).unwrap();
    let auth_id = authorize["id"].as_i64().unwrap();
    write_half
        .write_all(format!("{{\"id\":{auth_id},\"result\":false,\"error\":null}}\n").as_bytes())
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), run_handle)
        .await
        .expect("client did not close after authorization denial")
        .unwrap()
        .unwrap();

    let status = client.status().await;
    assert_eq!(status.state, opr_stratum_miner::State::Closed);
    std::env::remove_var("LXRBITSIZE");
}
