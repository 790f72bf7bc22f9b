// File: src/worker/stats.rs
//
// Per-worker statistics tracking. Grounded on the teacher's
// `miner/stats/thread_stats.rs` (atomics + Instant-based elapsed
// tracking), generalized from hashrate-display fields to exactly the
// `{id, hashes_since_reset, elapsed_since_reset, best_score_seen}`
// snapshot spec.md §4.B calls for. The worker derives the snapshot on
// demand; the aggregator derives hashrate from it, not the worker.
//
// Tree Location:
// - src/worker/stats.rs (per-worker statistics)
// - Depends on: std

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::core::StatsSnapshot;

pub struct WorkerStats {
    id: u32,
    hashes_since_reset: AtomicU64,
    best_score_seen: AtomicU64,
    reset_at: std::sync::Mutex<Instant>,
}

impl WorkerStats {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            hashes_since_reset: AtomicU64::new(0),
            best_score_seen: AtomicU64::new(0),
            reset_at: std::sync::Mutex::new(Instant::now()),
        }
    }

    pub fn record_hash(&self, score: u64) {
        self.hashes_since_reset.fetch_add(1, Ordering::Relaxed);
        let mut best = self.best_score_seen.load(Ordering::Relaxed);
        while score > best {
            match self.best_score_seen.compare_exchange_weak(
                best,
                score,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(current) => best = current,
            }
        }
    }

    /// `reset-records`: zero the suffix counter and the stats window.
    pub fn reset(&self) {
        self.hashes_since_reset.store(0, Ordering::Relaxed);
        self.best_score_seen.store(0, Ordering::Relaxed);
        *self.reset_at.lock().expect("stats reset_at poisoned") = Instant::now();
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            id: self.id,
            hashes_since_reset: self.hashes_since_reset.load(Ordering::Relaxed),
            elapsed_since_reset: self.reset_at.lock().expect("poisoned").elapsed(),
            best_score_seen: self.best_score_seen.load(Ordering::Relaxed),
        }
    }
}
