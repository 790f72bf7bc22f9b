// File: src/protocol/client.rs
//
// The protocol state machine (component D, the largest single piece
// of the core per spec.md §2). Owns job state, the pending-request
// table, and the worker pool handle; translates server messages into
// worker commands and worker winners into submit requests. Grounded
// on original_source/stratum/client.go's `HandleRequest` / `HandleResponse`
// / `AggregateStats*` / `ListenForSuccess` / `ReportHashRate`, with the
// TCP/reconnect concerns (§4.E) deliberately left to client::lifecycle
// — this module never dials or redials a socket itself.
//
// Tree Location:
// - src/protocol/client.rs (protocol state machine)
// - Depends on: protocol::{messages, pending, session}, worker::WorkerPool, status

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::mpsc::Receiver;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{error, info, trace, warn};

use crate::core::{difficulty, Command, Credentials, Identity, JobState, StatsSnapshot, Winner};
use crate::error::{ClientError, Result};
use crate::protocol::messages::{self, Frame, Subscription};
use crate::protocol::pending::{self, Continuation, PendingRequests};
use crate::protocol::session::{self, WriteHandle};
use crate::status::StatusChannels;
use crate::worker::WorkerPool;

const AGGREGATE_DEADLINE: Duration = Duration::from_secs(3);
const HASHRATE_REPORT_INTERVAL: Duration = Duration::from_secs(10);
const NEAR_FULL_WARNING_COOLDOWN: Duration = Duration::from_secs(1);
/// Mirrors worker::pool::SUCCESS_CHANNEL_CAPACITY; kept as a local
/// constant since the pump only needs the ratio, not the channel.
const SUCCESS_CHANNEL_CAPACITY: usize = 100;

/// What the caller (client::lifecycle's listen loop) must do after a
/// frame has been handled. Most frames resolve to `None`; only
/// `client.reconnect` asks the caller to act.
pub enum Signal {
    None,
    Reconnect {
        host: String,
        port: u16,
        wait_seconds: u64,
    },
}

pub struct ProtocolClient {
    identity: Identity,
    credentials: Credentials,
    job: RwLock<JobState>,
    pending: PendingRequests,
    pool: Arc<WorkerPool>,
    channels: Arc<StatusChannels>,
    writer: RwLock<Option<WriteHandle>>,
    total_successes: AtomicU64,
    paused: AtomicBool,
    closed: AtomicBool,
    last_near_full_warning: Mutex<Option<Instant>>,
}

impl ProtocolClient {
    pub fn new(
        identity: Identity,
        credentials: Credentials,
        pool: Arc<WorkerPool>,
        channels: Arc<StatusChannels>,
    ) -> Arc<Self> {
        Arc::new(Self {
            identity,
            credentials,
            job: RwLock::new(JobState::default()),
            pending: PendingRequests::new(),
            pool,
            channels,
            writer: RwLock::new(None),
            total_successes: AtomicU64::new(0),
            paused: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            last_near_full_warning: Mutex::new(None),
        })
    }

    pub async fn set_writer(&self, writer: WriteHandle) {
        *self.writer.write().await = Some(writer);
    }

    pub async fn clear_writer(&self) {
        *self.writer.write().await = None;
    }

    /// Marks the client permanently closed (called from
    /// `client::lifecycle`'s `finalize_close`). Once set, outbound
    /// calls report `ClientError::Closed` instead of `NotConnected`.
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    async fn writer(&self) -> Result<WriteHandle> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(ClientError::Closed);
        }
        self.writer
            .read()
            .await
            .clone()
            .ok_or(ClientError::NotConnected)
    }

    pub async fn current_job(&self) -> JobState {
        self.job.read().await.clone()
    }

    pub fn total_successes(&self) -> u64 {
        self.total_successes.load(Ordering::Relaxed)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub async fn pending_request_count(&self) -> usize {
        self.pending.pending_count().await
    }

    // ---- Outbound requests (§4.D) ------------------------------------

    pub async fn send_subscribe(&self) -> Result<()> {
        let id = self.pending.next_id();
        self.pending.register(id, Continuation::Subscribe).await;
        let req = messages::subscribe_request(id, &self.identity.version);
        session::encode(&self.writer().await?, &req).await
    }

    pub async fn send_authorize(&self) -> Result<()> {
        let id = self.pending.next_id();
        self.pending.register(id, Continuation::Authorize).await;
        let req = messages::authorize_request(
            id,
            &self.identity.username,
            &self.identity.minername,
            &self.credentials.password,
            &self.credentials.invite_code,
            &self.credentials.payout_address,
        );
        session::encode(&self.writer().await?, &req).await
    }

    pub async fn send_get_oprhash(&self, job_id: i64) -> Result<()> {
        let id = self.pending.next_id();
        self.pending
            .register(id, Continuation::GetOprHash { job_id })
            .await;
        let req = messages::get_oprhash_request(id, &job_id.to_string());
        session::encode(&self.writer().await?, &req).await
    }

    async fn send_submit(&self, winner: &Winner) -> Result<()> {
        let job_id = self.job.read().await.current_job_id;
        let id = self.pending.next_id();
        self.pending.register(id, Continuation::Submit).await;
        let req = messages::submit_request(
            id,
            &self.identity.username,
            &self.identity.minername,
            &job_id.to_string(),
            &winner.nonce,
            &winner.opr_hash,
            &winner.target,
        );
        session::encode(&self.writer().await?, &req).await
    }

    pub async fn send_suggest_target(&self, preferred_target_hex: &str) -> Result<()> {
        let id = self.pending.next_id();
        let req = messages::suggest_target_request(id, preferred_target_hex);
        session::encode(&self.writer().await?, &req).await
    }

    // ---- Inbound dispatch ---------------------------------------------

    /// Handle one decoded frame. Returns `Signal::Reconnect` when the
    /// caller (the listen loop) must redial; everything else is fully
    /// handled here.
    pub async fn handle_frame(&self, frame: Frame) -> Result<Signal> {
        match frame {
            Frame::Response { id, result, error } => {
                self.handle_response(id, result, error).await?;
                Ok(Signal::None)
            }
            Frame::Request { id, method, params } => self.handle_request(id, &method, &params).await,
            Frame::Notification { method, params } => {
                self.handle_notification(&method, &params).await?;
                Ok(Signal::None)
            }
        }
    }

    async fn handle_response(&self, id: i32, result: Value, error: Option<Value>) -> Result<()> {
        let Some(continuation) = self.pending.take(id).await else {
            warn!(id, "response for unknown or already-handled request id");
            return Err(ClientError::Protocol(format!("unmatched response id {id}")));
        };

        if let Some(err) = error {
            if !err.is_null() {
                warn!(id, error = %err, "server returned an error for request");
                return Ok(());
            }
        }

        match continuation {
            Continuation::Subscribe => {
                let subscriptions: Vec<Subscription> = serde_json::from_value(result)?;
                for sub in subscriptions {
                    info!(kind = %sub.kind, id = %sub.id, "subscription entry");
                    if sub.kind == "mining.set_nonce" {
                        match sub.id.parse::<u32>() {
                            Ok(prefix) => {
                                self.job.write().await.current_nonce_prefix = prefix;
                                self.pool.broadcast(Command::new_nonce_prefix(prefix));
                            }
                            Err(e) => warn!(error = %e, "subscribe: nonce id not a u32"),
                        }
                    }
                }
            }
            Continuation::Authorize => {
                let authorized = result.as_bool().unwrap_or(false);
                if authorized {
                    info!("authorization accepted");
                } else {
                    error!("authorization denied; refusing to mine uncredited, closing client");
                    return Err(ClientError::AuthorizationDenied);
                }
            }
            Continuation::GetOprHash { job_id } => {
                let hash_hex = result
                    .as_str()
                    .ok_or_else(|| ClientError::Malformed("get_oprhash: result not a string".into()))?;
                let current = self.job.read().await.current_job_id;
                if job_id == current {
                    let hash_bytes = hex::decode(hash_hex)?;
                    self.pool.broadcast(Command::reset_new_opr_hash_resume(hash_bytes));
                } else {
                    trace!(job_id, current, "get_oprhash result for stale job id, ignoring");
                }
            }
            Continuation::Submit => {
                trace!(result = %result, "submission result");
            }
        }
        Ok(())
    }

    async fn handle_request(&self, id: i32, method: &str, params: &[Value]) -> Result<Signal> {
        match method {
            "client.get_version" => {
                let resp = messages::OutboundResponse {
                    id,
                    result: Value::String(self.identity.version.clone()),
                    error: None,
                };
                session::encode(&self.writer().await?, &resp).await?;
                Ok(Signal::None)
            }
            "client.reconnect" => {
                let host = messages::string_param(method, params, 0)?;
                let port_str = messages::string_param(method, params, 1)?;
                let port: u16 = port_str
                    .parse()
                    .map_err(|e| ClientError::Malformed(format!("client.reconnect: bad port {port_str:?}: {e}")))?;
                let wait_seconds = match params.get(2).and_then(Value::as_str) {
                    Some(s) => s
                        .parse::<u64>()
                        .map_err(|e| ClientError::Malformed(format!("client.reconnect: bad waitSeconds {s:?}: {e}")))?,
                    None => 0,
                };
                Ok(Signal::Reconnect {
                    host,
                    port,
                    wait_seconds,
                })
            }
            "client.show_message" => {
                let message = messages::string_param(method, params, 0)?;
                println!("{message}");
                Ok(Signal::None)
            }
            other => {
                warn!(method = other, "unexpected inbound request, ignoring");
                Ok(Signal::None)
            }
        }
    }

    async fn handle_notification(&self, method: &str, params: &[Value]) -> Result<()> {
        match method {
            "mining.notify" => self.handle_notify(params).await,
            "mining.set_target" => self.handle_set_target(params).await,
            "mining.set_nonce" => self.handle_set_nonce(params).await,
            "mining.stop_mining" => {
                self.paused.store(true, Ordering::Relaxed);
                self.pool.broadcast(Command::pause());
                Ok(())
            }
            other => {
                warn!(method = other, "unknown notification method, ignoring");
                Ok(())
            }
        }
    }

    async fn handle_notify(&self, params: &[Value]) -> Result<()> {
        let job_id_str = messages::string_param("mining.notify", params, 0)?;
        let job_id: i64 = job_id_str
            .parse()
            .map_err(|e| ClientError::Malformed(format!("mining.notify: bad job id {job_id_str:?}: {e}")))?;
        let opr_hash_hex = messages::string_param("mining.notify", params, 1)?;

        let (previous_job_id, target) = {
            let job = self.job.read().await;
            if job_id < job.current_job_id {
                trace!(job_id, current = job.current_job_id, "stale notify, ignoring");
                return Ok(());
            }
            (job.current_job_id, job.current_target)
        };

        let opr_hash_bytes = hex::decode(&opr_hash_hex)?;
        {
            let mut job = self.job.write().await;
            job.accept_notify(job_id, opr_hash_hex);
        }

        let expected = self.pool.worker_count().max(1);
        let (stats_tx, stats_rx) = pending::stats_channel(expected);
        self.pool
            .broadcast(Command::notify(opr_hash_bytes, target, stats_tx));
        self.paused.store(false, Ordering::Relaxed);

        tokio::spawn(aggregate_job_stats(previous_job_id, stats_rx, expected));
        Ok(())
    }

    async fn handle_set_target(&self, params: &[Value]) -> Result<()> {
        let hex_str = messages::string_param("mining.set_target", params, 0)?;
        let target = difficulty::parse_target_hex(&hex_str)?;
        self.job.write().await.current_target = target;
        self.pool.broadcast(Command::minimum_difficulty(target));
        Ok(())
    }

    async fn handle_set_nonce(&self, params: &[Value]) -> Result<()> {
        let nonce_str = messages::string_param("mining.set_nonce", params, 0)?;
        let prefix: u32 = nonce_str
            .parse()
            .map_err(|e| ClientError::Malformed(format!("mining.set_nonce: bad nonce {nonce_str:?}: {e}")))?;
        self.job.write().await.current_nonce_prefix = prefix;
        self.pool.broadcast(Command::new_nonce_prefix(prefix));
        Ok(())
    }

    // ---- Background tasks (§4.D) ---------------------------------------

    /// Consumes the worker pool's shared success channel for the
    /// lifetime of the client, submitting every winner in turn.
    pub async fn run_submission_pump(
        self: Arc<Self>,
        mut success_rx: Receiver<Winner>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                maybe_winner = success_rx.recv() => {
                    let Some(winner) = maybe_winner else { break };
                    self.warn_if_near_full(success_rx.len()).await;
                    match self.send_submit(&winner).await {
                        Ok(()) => {
                            self.total_successes.fetch_add(1, Ordering::Relaxed);
                            self.channels.send_submission_tick();
                        }
                        Err(e) => warn!(error = %e, "failed to submit winning share"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    async fn warn_if_near_full(&self, current_len: usize) {
        if (current_len as f64) < 0.9 * SUCCESS_CHANNEL_CAPACITY as f64 {
            return;
        }
        let mut last = self.last_near_full_warning.lock().await;
        let now = Instant::now();
        let should_warn = last.map(|t| now.duration_since(t) >= NEAR_FULL_WARNING_COOLDOWN).unwrap_or(true);
        if should_warn {
            warn!(len = current_len, "success channel over 90% full");
            *last = Some(now);
        }
    }

    /// Every 10 seconds, collect a fresh hashrate snapshot from every
    /// worker and publish the total to the hashrate observer channel.
    /// Stops when `shutdown` fires.
    pub async fn run_hashrate_reporter(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(HASHRATE_REPORT_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let expected = self.pool.worker_count().max(1);
                    let (stats_tx, stats_rx) = pending::stats_channel(expected);
                    self.pool.broadcast(Command::current_hash_rate(stats_tx));
                    let snapshots = collect_snapshots(stats_rx, expected).await;
                    let total_rate: f64 = snapshots.iter().map(StatsSnapshot::hashrate).sum();
                    self.channels.send_hashrate(total_rate);
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

/// Wait for up to `expected` snapshots, bounded by a 3-second
/// deadline, whichever comes first (spec.md §4.D).
async fn collect_snapshots(mut rx: Receiver<StatsSnapshot>, expected: usize) -> Vec<StatsSnapshot> {
    let sleep = tokio::time::sleep(AGGREGATE_DEADLINE);
    tokio::pin!(sleep);
    let mut snapshots = Vec::with_capacity(expected);
    loop {
        tokio::select! {
            _ = &mut sleep => break,
            maybe = rx.recv() => match maybe {
                Some(snapshot) => {
                    snapshots.push(snapshot);
                    if snapshots.len() >= expected {
                        break;
                    }
                }
                None => break,
            }
        }
    }
    snapshots
}

/// The per-job-transition aggregator: logs the previous job's totals
/// and does not notify the hashrate channel (that is the periodic
/// reporter's job, per spec.md §4.D).
async fn aggregate_job_stats(job_id: i64, rx: Receiver<StatsSnapshot>, expected: usize) {
    let snapshots = collect_snapshots(rx, expected).await;
    let total_hashes: u64 = snapshots.iter().map(|s| s.hashes_since_reset).sum();
    let best_score = snapshots.iter().map(|s| s.best_score_seen).max().unwrap_or(0);
    info!(
        job_id,
        workers_reported = snapshots.len(),
        total_hashes,
        best_score,
        "job stats aggregated"
    );
}
