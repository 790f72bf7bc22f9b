// File: src/protocol/pending.rs
//
// The pending-request table (spec.md §3/§9): a map from outgoing
// request ID to a continuation invoked when the matching response
// arrives. Continuations are modeled as a tagged enum, one variant per
// outbound method, each carrying the request parameters needed to
// interpret the response — per spec.md §9's explicit preference over
// boxed closures. Grounded on the reference's
// `requestsMade map[int32]func(Response)` (original_source/stratum/
// client.go), re-expressed as data instead of closures.
//
// Tree Location:
// - src/protocol/pending.rs (pending-request table)
// - Depends on: std::collections::HashMap, tokio::sync::Mutex

use std::collections::HashMap;

use tokio::sync::mpsc::Sender;
use tokio::sync::Mutex;

use crate::core::StatsSnapshot;

/// What to do with the response that matches a given request ID.
/// Carries exactly the context captured when the request was sent.
pub enum Continuation {
    /// `mining.subscribe`: parse `[{type, id}, ...]` and apply any
    /// `mining.set_nonce` entries.
    Subscribe,
    /// `mining.authorize`: close the client if the result is `false`.
    Authorize,
    /// `mining.get_oprhash`: only acts if `job_id` is still current.
    GetOprHash { job_id: i64 },
    /// `mining.submit`: logged only; no state captured beyond logging
    /// context, which the caller already has via tracing spans.
    Submit,
}

/// Request IDs are 32-bit signed integers, monotonically issued
/// per-client (spec.md §6).
pub struct PendingRequests {
    next_id: std::sync::atomic::AtomicI32,
    table: Mutex<HashMap<i32, Continuation>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            next_id: std::sync::atomic::AtomicI32::new(1),
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a fresh monotonic ID. Every outgoing request ID is unique
    /// within a session (spec.md §8 invariant 4).
    pub fn next_id(&self) -> i32 {
        self.next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }

    /// Register `continuation` under `id` before the request is
    /// encoded. If encoding subsequently fails, the entry is left as
    /// an orphan; that is acceptable per spec.md §4.D/§7.
    pub async fn register(&self, id: i32, continuation: Continuation) {
        self.table.lock().await.insert(id, continuation);
    }

    /// Remove and return the continuation for `id`, if any. A miss
    /// (response for an unknown ID) is the caller's to report; it is
    /// not fatal to the session (spec.md §7).
    pub async fn take(&self, id: i32) -> Option<Continuation> {
        self.table.lock().await.remove(&id)
    }

    pub async fn pending_count(&self) -> usize {
        self.table.lock().await.len()
    }
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot stats-channel pair handed to a worker command and awaited
/// by a stats aggregator; kept here since both pending continuations
/// and the aggregator need the same channel shape.
pub fn stats_channel(capacity: usize) -> (Sender<StatsSnapshot>, tokio::sync::mpsc::Receiver<StatsSnapshot>) {
    tokio::sync::mpsc::channel(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ids_are_monotonic_and_unique() {
        let table = PendingRequests::new();
        let a = table.next_id();
        let b = table.next_id();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[tokio::test]
    async fn register_then_take_round_trips() {
        let table = PendingRequests::new();
        let id = table.next_id();
        table.register(id, Continuation::Authorize).await;
        assert_eq!(table.pending_count().await, 1);
        let cont = table.take(id).await;
        assert!(matches!(cont, Some(Continuation::Authorize)));
        assert_eq!(table.pending_count().await, 0);
    }

    #[tokio::test]
    async fn take_on_unknown_id_is_none_not_fatal() {
        let table = PendingRequests::new();
        assert!(table.take(999).await.is_none());
    }
}
