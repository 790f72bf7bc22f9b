// File: src/client/lifecycle.rs
//
// The top-level client lifecycle: connect, handshake, listen,
// reconnect-with-backoff, and shutdown ordering. The protocol state
// machine lives one layer down in protocol::client and never dials
// sockets itself; this module owns the TCP connection and the
// `Session`.
//
// Tree Location:
// - src/client/lifecycle.rs (client lifecycle / reconnect loop)
// - Depends on: protocol, worker, core::hash, status, tokio::net

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::sync::mpsc::Receiver;
use tokio::sync::{watch, RwLock};
use tracing::{error, info, warn};

use crate::core::{Credentials, HashEngine, Identity};
use crate::error::{ClientError, Result};
use crate::protocol::session::Session;
use crate::protocol::{Frame, ProtocolClient, Signal};
use crate::status::StatusChannels;
use crate::worker::WorkerPool;

/// Fixed reconnect delay for unplanned disconnects. `client.reconnect`
/// carries its own explicit wait instead of using this constant.
const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unstarted,
    Initialized,
    Connecting,
    Handshaking,
    Running,
    Reconnecting,
    Closed,
}

/// A point-in-time snapshot of the client's externally observable
/// state.
#[derive(Debug, Clone)]
pub struct ClientStatus {
    pub state: State,
    pub is_connected: bool,
    pub is_paused: bool,
    pub pool_address: Option<String>,
    pub duration_connected: Option<Duration>,
    pub blocks_submitted: u64,
}

enum ListenOutcome {
    ConnectionLost,
    Reconnect { host: String, port: u16, wait_seconds: u64 },
}

pub struct StratumClient {
    state: RwLock<State>,
    protocol: Arc<ProtocolClient>,
    pool: Arc<WorkerPool>,
    hash_engine: Arc<HashEngine>,
    remote_addr: RwLock<Option<String>>,
    autoreconnect: AtomicBool,
    connected_at: RwLock<Option<Instant>>,
    shutdown_tx: watch::Sender<bool>,
}

impl StratumClient {
    /// Initialized step: allocate the worker pool, acquire the hash
    /// engine handle, and start the submission pump and periodic
    /// hashrate reporter. Returns the client plus the two status
    /// observer channels — callers hold onto those independently of
    /// the client object.
    pub fn new(
        identity: Identity,
        credentials: Credentials,
        worker_count: u32,
        hash_table_dir: PathBuf,
    ) -> Result<(Arc<Self>, Receiver<f64>, Receiver<u32>)> {
        let hash_engine = Arc::new(HashEngine::new());
        let params = WorkerPool::default_hash_params();
        let table = hash_engine.acquire(params, &hash_table_dir)?;
        let pool = WorkerPool::init(worker_count, table);
        let success_rx = pool
            .take_success_receiver()
            .ok_or_else(|| ClientError::Protocol("success receiver already taken".into()))?;

        let (channels, hashrate_rx, submission_rx) = StatusChannels::new();
        let channels = Arc::new(channels);
        let protocol = ProtocolClient::new(identity, credentials, Arc::clone(&pool), channels);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(Arc::clone(&protocol).run_submission_pump(success_rx, shutdown_rx.clone()));
        tokio::spawn(Arc::clone(&protocol).run_hashrate_reporter(shutdown_rx.clone()));

        info!(workers = worker_count, "client initialized");

        let client = Arc::new(Self {
            state: RwLock::new(State::Initialized),
            protocol,
            pool,
            hash_engine,
            remote_addr: RwLock::new(None),
            autoreconnect: AtomicBool::new(true),
            connected_at: RwLock::new(None),
            shutdown_tx,
        });
        Ok((client, hashrate_rx, submission_rx))
    }

    async fn set_state(&self, state: State) {
        *self.state.write().await = state;
    }

    pub async fn status(&self) -> ClientStatus {
        let state = *self.state.read().await;
        let is_connected = state == State::Running;
        // Mirrors the Go reference's GetStatus(), which only reports
        // DurationConnected/PoolHostAndPort while connectedAt != nil.
        let (pool_address, duration_connected) = if is_connected {
            (
                self.remote_addr.read().await.clone(),
                self.connected_at.read().await.map(|t| t.elapsed()),
            )
        } else {
            (None, None)
        };
        ClientStatus {
            state,
            is_connected,
            is_paused: self.protocol.is_paused(),
            pool_address,
            duration_connected,
            blocks_submitted: self.protocol.total_successes(),
        }
    }

    /// Connecting → Handshaking → Running, then block in the listen
    /// loop until the connection drops, a `client.reconnect` arrives,
    /// or the client is closed. Reconnects with backoff, retaining
    /// the original remote address across cycles, until `close()` is
    /// called.
    pub async fn run(self: Arc<Self>, address: String) -> Result<()> {
        *self.remote_addr.write().await = Some(address.clone());
        let mut target = address;

        loop {
            self.set_state(State::Connecting).await;
            let mut session = match self.dial_and_handshake(&target).await {
                Ok(session) => session,
                Err(e) => {
                    error!(error = %e, target = %target, "connect/handshake failed");
                    if !self.wait_before_reconnect(DEFAULT_RECONNECT_DELAY_SECS).await {
                        break;
                    }
                    continue;
                }
            };

            self.set_state(State::Running).await;
            let outcome = self.listen(&mut session).await;
            self.protocol.clear_writer().await;
            drop(session);

            match outcome {
                Ok(ListenOutcome::Reconnect {
                    host,
                    port,
                    wait_seconds,
                }) => {
                    target = format!("{host}:{port}");
                    *self.remote_addr.write().await = Some(target.clone());
                    if !self.wait_before_reconnect(wait_seconds).await {
                        break;
                    }
                }
                Ok(ListenOutcome::ConnectionLost) => {
                    if !self.wait_before_reconnect(DEFAULT_RECONNECT_DELAY_SECS).await {
                        break;
                    }
                }
                Err(ClientError::AuthorizationDenied) => {
                    warn!("authorization denied; client will not reconnect");
                    self.autoreconnect.store(false, Ordering::Relaxed);
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "listen loop ended with an unexpected error");
                    break;
                }
            }
        }

        self.finalize_close().await;
        Ok(())
    }

    async fn dial_and_handshake(&self, address: &str) -> Result<Session> {
        let stream = TcpStream::connect(address).await.map_err(ClientError::Io)?;
        stream.set_nodelay(true).map_err(ClientError::Io)?;

        self.set_state(State::Handshaking).await;
        let session = Session::init(stream);
        self.protocol.set_writer(session.writer_handle()).await;
        *self.connected_at.write().await = Some(Instant::now());

        self.protocol.send_subscribe().await?;
        self.protocol.send_authorize().await?;
        Ok(session)
    }

    /// Checks cancellation before honoring a reconnect so a close
    /// mid-read never races into another reconnect attempt.
    async fn listen(&self, session: &mut Session) -> Result<ListenOutcome> {
        let mut shutdown = self.shutdown_tx.subscribe();
        loop {
            if *shutdown.borrow() {
                return Ok(ListenOutcome::ConnectionLost);
            }
            tokio::select! {
                frame = session.read_frame() => {
                    match frame {
                        Ok(Some(frame)) => match self.handle(frame).await? {
                            Some(outcome) => return Ok(outcome),
                            None => continue,
                        },
                        Ok(None) => return Ok(ListenOutcome::ConnectionLost),
                        Err(e) => {
                            warn!(error = %e, "session read error");
                            return Ok(ListenOutcome::ConnectionLost);
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return Ok(ListenOutcome::ConnectionLost);
                    }
                }
            }
        }
    }

    async fn handle(&self, frame: Frame) -> Result<Option<ListenOutcome>> {
        match self.protocol.handle_frame(frame).await {
            Ok(Signal::None) => Ok(None),
            Ok(Signal::Reconnect {
                host,
                port,
                wait_seconds,
            }) => Ok(Some(ListenOutcome::Reconnect {
                host,
                port,
                wait_seconds,
            })),
            Err(ClientError::AuthorizationDenied) => Err(ClientError::AuthorizationDenied),
            Err(e) => {
                warn!(error = %e, "error handling frame, continuing session");
                Ok(None)
            }
        }
    }

    /// `false` means the caller should stop trying (either `close()`
    /// was called, or it was called during the wait).
    async fn wait_before_reconnect(&self, wait_seconds: u64) -> bool {
        if !self.autoreconnect.load(Ordering::Relaxed) {
            return false;
        }
        self.set_state(State::Reconnecting).await;
        tokio::time::sleep(Duration::from_secs(wait_seconds)).await;
        self.autoreconnect.load(Ordering::Relaxed)
    }

    /// Explicit close: stop reconnecting, tear down background tasks
    /// and workers, release the hash handle. Safe to call more than
    /// once and safe to call from outside the `run()` task.
    pub async fn close(&self) {
        self.autoreconnect.store(false, Ordering::Relaxed);
        let _ = self.shutdown_tx.send(true);
        self.finalize_close().await;
    }

    async fn finalize_close(&self) {
        self.pool.shutdown();
        self.hash_engine.release();
        self.protocol.clear_writer().await;
        self.protocol.mark_closed();
        *self.connected_at.write().await = None;
        self.set_state(State::Closed).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_identity() -> Identity {
        Identity {
            username: "user".into(),
            minername: "miner".into(),
            version: "1.0".into(),
        }
    }

    #[tokio::test]
    async fn new_client_starts_initialized_and_not_connected() {
        let dir = tempfile::tempdir().unwrap();
        let (client, _hr, _sub) = StratumClient::new(
            test_identity(),
            Credentials::default(),
            1,
            dir.path().to_path_buf(),
        )
        .unwrap();
        let status = client.status().await;
        assert_eq!(status.state, State::Initialized);
        assert!(!status.is_connected);
        assert_eq!(status.blocks_submitted, 0);
        client.close().await;
    }

    #[tokio::test]
    async fn close_transitions_to_closed_and_stops_reconnecting() {
        let dir = tempfile::tempdir().unwrap();
        let (client, _hr, _sub) = StratumClient::new(
            test_identity(),
            Credentials::default(),
            1,
            dir.path().to_path_buf(),
        )
        .unwrap();
        client.close().await;
        let status = client.status().await;
        assert_eq!(status.state, State::Closed);
        assert!(!client.autoreconnect.load(Ordering::Relaxed));
        assert!(status.pool_address.is_none());
        assert!(status.duration_connected.is_none());
        assert!(client.connected_at.read().await.is_none());
    }
}
