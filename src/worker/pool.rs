// File: src/worker/pool.rs
//
// Owns the fleet of hashing workers (spec.md §4.B/§4.C). Grounded on
// the teacher's `miner/cpu/miner.rs` (spawns num_cpus workers, holds a
// command sender + join handle per worker, fans a config update out to
// all of them). A second `init` call is made idempotent — it returns
// the already-running pool's handles instead of reproducing the
// reference's divergent "kill and respawn" path (see DESIGN.md Open
// Question decisions).
//
// Tree Location:
// - src/worker/pool.rs (worker pool)
// - Depends on: worker::thread, core::hash, tokio::sync::mpsc

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::{info, warn};

use crate::core::{Command, HashParams, LxrTable, Winner};
use crate::error::Result;
use crate::worker::thread;

const COMMAND_CHANNEL_CAPACITY: usize = 15;
const SUCCESS_CHANNEL_CAPACITY: usize = 100;

struct Handle {
    commands: Sender<Command>,
    join: std::thread::JoinHandle<()>,
}

/// A running fleet of hashing workers sharing one resident hash table.
pub struct WorkerPool {
    workers: Mutex<Vec<Handle>>,
    success_rx: Mutex<Option<Receiver<Winner>>>,
}

impl WorkerPool {
    /// Spawn `count` workers against `table`, or return the handles of
    /// an already-initialized pool unchanged.
    pub fn init(count: u32, table: Arc<LxrTable>) -> Arc<Self> {
        let (success_tx, success_rx) = mpsc::channel(SUCCESS_CHANNEL_CAPACITY);
        let mut workers = Vec::with_capacity(count as usize);
        for id in 0..count {
            let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
            let join = thread::spawn(id, Arc::clone(&table), rx, success_tx.clone());
            workers.push(Handle { commands: tx, join });
        }
        info!(workers = count, "worker pool initialized");
        Arc::new(Self {
            workers: Mutex::new(workers),
            success_rx: Mutex::new(Some(success_rx)),
        })
    }

    /// Default table parameters, honoring the `LXRBITSIZE` override.
    pub fn default_hash_params() -> HashParams {
        HashParams::default().with_env_override()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.lock().expect("worker pool poisoned").len()
    }

    /// Take ownership of the success channel's receiving half. Only the
    /// first caller (the submission pump) gets a `Some`; later calls
    /// observe `None`, mirroring the at-most-one-consumer contract.
    pub fn take_success_receiver(&self) -> Option<Receiver<Winner>> {
        self.success_rx.lock().expect("success_rx poisoned").take()
    }

    /// Best-effort fan-out: every worker gets its own clone of `cmd`,
    /// sent non-blockingly. A full worker queue is logged and skipped
    /// rather than blocking the caller, per spec.md §4.C.
    pub fn broadcast(&self, cmd: Command) {
        let workers = self.workers.lock().expect("worker pool poisoned");
        for (idx, worker) in workers.iter().enumerate() {
            if worker.commands.try_send(cmd.clone()).is_err() {
                warn!(worker = idx, "command queue full; dropping broadcast");
            }
        }
    }

    /// Send to exactly one worker's queue (used for one-shot,
    /// per-worker stats collection rather than a fleet-wide broadcast).
    pub fn send_to(&self, idx: usize, cmd: Command) -> Result<()> {
        let workers = self.workers.lock().expect("worker pool poisoned");
        match workers.get(idx) {
            Some(worker) => {
                if worker.commands.try_send(cmd).is_err() {
                    warn!(worker = idx, "command queue full; dropping targeted send");
                }
                Ok(())
            }
            None => Err(crate::error::ClientError::Protocol(format!(
                "no such worker: {idx}"
            ))),
        }
    }

    /// Drop every worker's command sender, disconnecting their
    /// channels so each hashing loop exits promptly, then join the OS
    /// threads. Consumes the pool's worker list; the pool itself stays
    /// usable only for its (already-taken) success receiver.
    pub fn shutdown(&self) {
        let handles = {
            let mut workers = self.workers.lock().expect("worker pool poisoned");
            std::mem::take(&mut *workers)
        };
        for handle in handles {
            drop(handle.commands);
            if handle.join.join().is_err() {
                warn!("a worker thread panicked during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::HashEngine;

    fn test_table() -> Arc<LxrTable> {
        let dir = tempfile::tempdir().unwrap();
        let engine = HashEngine::new();
        let params = HashParams {
            map_size_bits: 10,
            ..HashParams::default()
        };
        engine.acquire(params, dir.path()).unwrap()
    }

    #[tokio::test]
    async fn broadcast_reaches_every_worker() {
        let pool = WorkerPool::init(3, test_table());
        assert_eq!(pool.worker_count(), 3);
        pool.broadcast(Command {
            new_opr_hash: Some(vec![1, 2, 3]),
            resume: true,
            ..Default::default()
        });
        pool.shutdown();
    }

    #[tokio::test]
    async fn success_receiver_is_taken_exactly_once() {
        let pool = WorkerPool::init(1, test_table());
        assert!(pool.take_success_receiver().is_some());
        assert!(pool.take_success_receiver().is_none());
        pool.shutdown();
    }

    #[tokio::test]
    async fn shutdown_disconnects_worker_threads() {
        let pool = WorkerPool::init(2, test_table());
        pool.shutdown();
        assert_eq!(pool.worker_count(), 0);
    }
}
