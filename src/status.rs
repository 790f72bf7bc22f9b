// File: src/status.rs
//
// The two external status outputs (spec.md §6): a hashrate observer
// channel and a submission-tick observer channel. Both are
// non-blocking and drop their value when no observer is ready —
// neither may ever backpressure the client. Grounded on the
// teacher's `miner/stats` notification pattern, generalized from the
// teacher's push-into-shared-struct style to a pair of bounded
// channels the caller can subscribe to independently.
//
// Tree Location:
// - src/status.rs (status observer channels)
// - Depends on: tokio::sync::mpsc

use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::trace;

const HASHRATE_CHANNEL_CAPACITY: usize = 4;
const SUBMISSION_CHANNEL_CAPACITY: usize = 32;

/// Shared by the protocol client and anything observing it. Senders
/// are non-blocking (`try_send`); a full or closed channel just means
/// nobody is currently listening.
pub struct StatusChannels {
    hashrate_tx: Sender<f64>,
    submission_tx: Sender<u32>,
}

impl StatusChannels {
    /// Construct the channel pair, returning the sending half (kept
    /// by the protocol client) and the two receiving halves (handed
    /// to whoever wants to observe this client).
    pub fn new() -> (Self, Receiver<f64>, Receiver<u32>) {
        let (hashrate_tx, hashrate_rx) = mpsc::channel(HASHRATE_CHANNEL_CAPACITY);
        let (submission_tx, submission_rx) = mpsc::channel(SUBMISSION_CHANNEL_CAPACITY);
        (
            Self {
                hashrate_tx,
                submission_tx,
            },
            hashrate_rx,
            submission_rx,
        )
    }

    /// Publish a fresh aggregate hashrate. Dropped silently if no
    /// observer is ready.
    pub fn send_hashrate(&self, rate: f64) {
        if self.hashrate_tx.try_send(rate).is_err() {
            trace!("hashrate observer channel full or closed; dropping sample");
        }
    }

    /// Publish one accepted-share tick. Dropped silently if no
    /// observer is ready.
    pub fn send_submission_tick(&self) {
        if self.submission_tx.try_send(1).is_err() {
            trace!("submission observer channel full or closed; dropping tick");
        }
    }
}

impl Default for StatusChannels {
    fn default() -> Self {
        Self::new().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashrate_delivers_to_a_ready_observer() {
        let (channels, mut rx, _sub_rx) = StatusChannels::new();
        channels.send_hashrate(42.0);
        assert_eq!(rx.recv().await, Some(42.0));
    }

    #[tokio::test]
    async fn submission_tick_delivers_to_a_ready_observer() {
        let (channels, _rx, mut sub_rx) = StatusChannels::new();
        channels.send_submission_tick();
        assert_eq!(sub_rx.recv().await, Some(1));
    }

    #[test]
    fn send_without_any_observer_does_not_panic() {
        let channels = StatusChannels::default();
        channels.send_hashrate(1.0);
        channels.send_submission_tick();
    }
}
