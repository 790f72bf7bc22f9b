// File: src/worker/thread.rs
//
// A single hashing worker (component B). Grounded on the teacher's
// `miner/cpu/thread.rs` (std::thread::spawn loop, try_recv interleaved
// with hashing, periodic stats), generalized from SHA3x batch-of-4
// hashing to this protocol's `opr_hash || nonce_prefix || suffix`
// single-hash loop with a growing-suffix nonce space (spec.md §4.B).
//
// Cancellation has no separate flag: when every `Command` sender is
// dropped (the pool shuts down), the channel disconnects and
// `blocking_recv`/`try_recv` report it, so the loop exits promptly —
// "its command channel is then garbage" per spec.md.
//
// Tree Location:
// - src/worker/thread.rs (worker hashing loop)
// - Depends on: core::hash, core::difficulty, tokio::sync::mpsc

use std::sync::Arc;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::warn;

use crate::core::{meets_target, score_of, Command, LxrTable, Winner};
use crate::worker::stats::WorkerStats;

/// Poll the command channel only every this-many hashes while resumed,
/// per spec.md §4.B ("every K hashes for efficiency") instead of
/// checking on every single hash.
const COMMAND_POLL_INTERVAL: u32 = 256;

/// Local, worker-owned mining state. Commands mutate this atomically
/// (one command application per `apply` call; no partial updates are
/// observable to the hash loop).
struct WorkerState {
    opr_hash: Option<Vec<u8>>,
    nonce_prefix: u32,
    target: u64,
    resumed: bool,
    suffix: Vec<u8>,
}

impl WorkerState {
    fn new() -> Self {
        Self {
            opr_hash: None,
            nonce_prefix: 0,
            target: u64::MAX,
            resumed: false,
            suffix: vec![0],
        }
    }

    fn is_ready(&self) -> bool {
        self.opr_hash.is_some() && self.resumed
    }

    fn zero_suffix(&mut self) {
        self.suffix = vec![0];
    }

    /// Grow the little-endian byte counter: increment the first byte
    /// that doesn't overflow; if every byte rolls over, extend by one.
    fn advance_suffix(&mut self) {
        for byte in self.suffix.iter_mut() {
            let (next, overflowed) = byte.overflowing_add(1);
            *byte = next;
            if !overflowed {
                return;
            }
        }
        self.suffix.push(1);
    }

    fn apply(&mut self, stats: &WorkerStats, cmd: Command) {
        if cmd.reset_records {
            self.zero_suffix();
            stats.reset();
        }
        if let Some(hash) = cmd.new_opr_hash {
            self.opr_hash = Some(hash);
            self.zero_suffix();
        }
        if let Some(prefix) = cmd.new_nonce_prefix {
            self.nonce_prefix = prefix;
            self.zero_suffix();
        }
        if let Some(target) = cmd.minimum_difficulty {
            self.target = target;
        }
        if cmd.pause {
            self.resumed = false;
        }
        if cmd.resume {
            self.resumed = true;
        }
        if let Some(ch) = cmd.submit_stats {
            send_stats_snapshot(&ch, stats);
        }
        if let Some(ch) = cmd.current_hash_rate {
            send_stats_snapshot(&ch, stats);
        }
    }

    fn nonce_hex(&self) -> String {
        let mut bytes = self.nonce_prefix.to_be_bytes().to_vec();
        bytes.extend_from_slice(&self.suffix);
        hex::encode(bytes)
    }
}

fn send_stats_snapshot(ch: &Sender<crate::core::StatsSnapshot>, stats: &WorkerStats) {
    if ch.try_send(stats.snapshot()).is_err() {
        warn!("stats reply channel unavailable or full; dropping snapshot");
    }
}

/// Spawn the worker's hashing loop on a dedicated OS thread.
pub fn spawn(
    id: u32,
    table: Arc<LxrTable>,
    mut commands: Receiver<Command>,
    success_tx: Sender<Winner>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || run(id, table, &mut commands, success_tx))
}

fn run(id: u32, table: Arc<LxrTable>, commands: &mut Receiver<Command>, success_tx: Sender<Winner>) {
    let stats = WorkerStats::new(id);
    let mut state = WorkerState::new();

    // Block until the first command makes the worker ready to hash.
    while !state.is_ready() {
        match commands.blocking_recv() {
            Some(cmd) => state.apply(&stats, cmd),
            None => return, // command channel closed before any work arrived
        }
    }

    let mut since_poll: u32 = 0;
    loop {
        if since_poll == 0 {
            match commands.try_recv() {
                Ok(cmd) => state.apply(&stats, cmd),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => return,
            }
        }

        if !state.resumed {
            // Parked: wait for the next command instead of busy-polling.
            match commands.blocking_recv() {
                Some(cmd) => state.apply(&stats, cmd),
                None => return,
            }
            since_poll = 0;
            continue;
        }

        let opr_hash = match state.opr_hash.as_ref() {
            Some(h) => h,
            None => continue,
        };

        let mut input = opr_hash.clone();
        input.extend_from_slice(&state.nonce_prefix.to_be_bytes());
        input.extend_from_slice(&state.suffix);

        let digest = table.hash(&input);
        let score = score_of(&digest);
        stats.record_hash(score);

        if meets_target(&digest, state.target) {
            let winner = Winner {
                nonce: state.nonce_hex(),
                opr_hash: hex::encode(opr_hash),
                target: crate::core::format_target_hex(state.target),
            };
            if success_tx.try_send(winner).is_err() {
                warn!(worker = id, "success channel full or closed; dropping winner");
            }
        }

        state.advance_suffix();
        since_poll = (since_poll + 1) % COMMAND_POLL_INTERVAL;
    }
}
