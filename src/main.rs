// File: src/main.rs
//
// Binary entry point: parse arguments, initialize logging, construct
// the stratum client, run it until a shutdown signal arrives. Grounded
// on the teacher's `main.rs` (clap::Args::parse + validate, tracing
// init, constructing and running a long-lived client), stripped of
// the teacher's feature-gated CPU/GPU/hybrid dispatch and web
// dashboard — this crate has exactly one mode.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use opr_stratum_miner::cli::Args;
use opr_stratum_miner::core::{Credentials, Identity};
use opr_stratum_miner::utils::format::FormatUtils;
use opr_stratum_miner::{ClientError, Result, StratumClient};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if let Err(message) = args.validate() {
        eprintln!("Error: {message}");
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let identity = Identity {
        username: args.username.clone(),
        minername: args.minername.clone(),
        version: args.version_string.clone(),
    };
    let credentials = Credentials {
        password: args.password.clone(),
        invite_code: args.invite_code.clone(),
        payout_address: args.payout_address.clone(),
    };
    let worker_count = args.worker_count();

    info!(pool = %args.pool, workers = worker_count, "starting opr-miner");

    let (client, mut hashrate_rx, mut submission_rx) = StratumClient::new(
        identity,
        credentials,
        worker_count,
        args.hash_table_dir.clone(),
    )?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                maybe = hashrate_rx.recv() => match maybe {
                    Some(rate) => info!(hashrate = %FormatUtils::format_hashrate(rate), "hashrate report"),
                    None => break,
                },
                maybe = submission_rx.recv() => match maybe {
                    Some(_) => info!("share accepted by pool"),
                    None => break,
                },
            }
        }
    });

    let run_client = Arc::clone(&client);
    let pool_address = args.pool.clone();
    let run_handle = tokio::spawn(async move { run_client.run(pool_address).await });

    tokio::signal::ctrl_c().await.map_err(ClientError::Io)?;
    info!("shutdown signal received, closing client");
    client.close().await;

    match run_handle.await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(error = %e, "client task panicked");
            Ok(())
        }
    }
}
