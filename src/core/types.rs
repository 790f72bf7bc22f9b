// File: src/core/types.rs
//
// Core data structures for the stratum client: session identity,
// first-connect credentials, the job state the workers mine against,
// the composable worker command, and the winner record a worker
// reports back.
//
// Tree Location:
// - src/core/types.rs (core data structures)
// - Depends on: serde, tokio (stats-reply channels embedded in Command)

use serde::{Deserialize, Serialize};

/// Immutable for the lifetime of a client, set at construction.
#[derive(Debug, Clone)]
pub struct Identity {
    pub username: String,
    pub minername: String,
    pub version: String,
}

/// Opaque strings passed once to the server during authorization. The
/// client never interprets them beyond forwarding.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub password: String,
    pub invite_code: String,
    pub payout_address: String,
}

/// What the workers are currently mining against. Guarded by the
/// client's lock; the listen loop is the sole writer.
#[derive(Debug, Clone)]
pub struct JobState {
    pub current_job_id: i64,
    pub current_opr_hash: String,
    pub current_target: u64,
    pub current_nonce_prefix: u32,
}

impl Default for JobState {
    fn default() -> Self {
        Self {
            current_job_id: 1,
            current_opr_hash:
                "00037f39cf870a1f49129f9c82d935665d352ffd25ea3296208f6f7b16fd654f".to_string(),
            current_target: 0xfffe_0000_0000_0000,
            current_nonce_prefix: 0,
        }
    }
}

impl JobState {
    /// Apply the acceptance rule from the data model: the caller must
    /// already have checked `job_id >= current_job_id`. Returns
    /// whether the job id itself advanced (strictly greater) as
    /// opposed to merely refreshing the hash for the same id.
    pub fn accept_notify(&mut self, job_id: i64, opr_hash: String) -> bool {
        let advanced = job_id > self.current_job_id;
        if advanced {
            self.current_job_id = job_id;
        }
        self.current_opr_hash = opr_hash;
        advanced
    }
}

/// A composable, orthogonal update fanned out to every worker. All
/// fields are optional; a single command may set several at once,
/// constructed inline rather than through a fluent builder.
#[derive(Debug, Clone, Default)]
pub struct Command {
    pub reset_records: bool,
    pub new_opr_hash: Option<Vec<u8>>,
    pub new_nonce_prefix: Option<u32>,
    pub minimum_difficulty: Option<u64>,
    pub pause: bool,
    pub resume: bool,
    pub submit_stats: Option<tokio::sync::mpsc::Sender<StatsSnapshot>>,
    pub current_hash_rate: Option<tokio::sync::mpsc::Sender<StatsSnapshot>>,
}

impl Command {
    /// `mining.get_oprhash` continuation: reset, swap hash, resume.
    pub fn reset_new_opr_hash_resume(opr_hash: Vec<u8>) -> Self {
        Self {
            reset_records: true,
            new_opr_hash: Some(opr_hash),
            resume: true,
            ..Default::default()
        }
    }

    /// `mining.notify` continuation: stats snapshot, reset, swap hash,
    /// raise the target, resume.
    pub fn notify(
        opr_hash: Vec<u8>,
        minimum_difficulty: u64,
        stats: tokio::sync::mpsc::Sender<StatsSnapshot>,
    ) -> Self {
        Self {
            reset_records: true,
            new_opr_hash: Some(opr_hash),
            minimum_difficulty: Some(minimum_difficulty),
            resume: true,
            submit_stats: Some(stats),
            ..Default::default()
        }
    }

    pub fn new_nonce_prefix(prefix: u32) -> Self {
        Self {
            new_nonce_prefix: Some(prefix),
            ..Default::default()
        }
    }

    pub fn minimum_difficulty(target: u64) -> Self {
        Self {
            minimum_difficulty: Some(target),
            ..Default::default()
        }
    }

    pub fn pause() -> Self {
        Self {
            pause: true,
            ..Default::default()
        }
    }

    pub fn current_hash_rate(stats: tokio::sync::mpsc::Sender<StatsSnapshot>) -> Self {
        Self {
            current_hash_rate: Some(stats),
            ..Default::default()
        }
    }
}

/// Produced by a worker when a hash meets the current target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Winner {
    pub nonce: String,
    pub opr_hash: String,
    pub target: String,
}

/// One-shot stats snapshot a worker sends in response to
/// `submit_stats` / `current_hash_rate`.
#[derive(Debug, Clone, Copy)]
pub struct StatsSnapshot {
    pub id: u32,
    pub hashes_since_reset: u64,
    pub elapsed_since_reset: std::time::Duration,
    pub best_score_seen: u64,
}

impl StatsSnapshot {
    pub fn hashrate(&self) -> f64 {
        let secs = self.elapsed_since_reset.as_secs_f64();
        if secs > 0.0 {
            self.hashes_since_reset as f64 / secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_job_id_refreshes_hash_without_advancing() {
        let mut job = JobState {
            current_job_id: 10,
            current_opr_hash: "aa".to_string(),
            current_target: 1,
            current_nonce_prefix: 0,
        };
        let advanced = job.accept_notify(10, "bb".to_string());
        assert!(!advanced);
        assert_eq!(job.current_job_id, 10);
        assert_eq!(job.current_opr_hash, "bb");
    }

    #[test]
    fn strictly_greater_job_id_advances() {
        let mut job = JobState {
            current_job_id: 10,
            current_opr_hash: "aa".to_string(),
            current_target: 1,
            current_nonce_prefix: 0,
        };
        let advanced = job.accept_notify(11, "cc".to_string());
        assert!(advanced);
        assert_eq!(job.current_job_id, 11);
        assert_eq!(job.current_opr_hash, "cc");
    }
}
