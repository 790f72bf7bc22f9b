// File: src/protocol/session.rs
//
// The framed session (component C): line-delimited JSON over a single
// TCP connection. Grounded on the teacher's `miner/cpu/miner.rs` `run`
// (stream.into_split(), writer wrapped in `Arc<Mutex<OwnedWriteHalf>>`,
// `BufReader::new(reader).lines()`), generalized from the teacher's
// inline login/share-submit calls into a reusable `encode`/`read_frame`
// pair (spec.md §4.C).
//
// Tree Location:
// - src/protocol/session.rs (framed session)
// - Depends on: tokio::net, tokio::io, serde

use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::protocol::messages::{self, Frame};

/// A write handle shared by every task that needs to send a message:
/// outbound requests, the submission pump, and server-reply sends.
pub type WriteHandle = Arc<Mutex<OwnedWriteHalf>>;

/// One framed connection. Reading is single-owner (the listen loop);
/// writing is shared via `WriteHandle`'s mutex, giving line-atomic
/// framing across concurrent encoders.
pub struct Session {
    writer: WriteHandle,
    lines: Lines<BufReader<OwnedReadHalf>>,
}

impl Session {
    /// `init(conn)`: install the encoder and line-reading decoder.
    /// Does not begin traffic on its own.
    pub fn init(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        let lines = BufReader::new(read_half).lines();
        Self {
            writer: Arc::new(Mutex::new(write_half)),
            lines,
        }
    }

    pub fn writer_handle(&self) -> WriteHandle {
        Arc::clone(&self.writer)
    }

    /// Read one newline-terminated message. `Ok(None)` is a clean EOF;
    /// callers treat it the same as an I/O error for reconnect
    /// purposes (spec.md §4.C).
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.lines.next_line().await? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return Ok(Some(messages::parse_frame(&line)?)),
                None => return Ok(None),
            }
        }
    }
}

/// Serialize `value`, append a newline, and write it under the
/// session's write lock. Any write failure is returned as an error,
/// never propagated as a panic.
pub async fn encode(writer: &WriteHandle, value: &impl Serialize) -> Result<()> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    let mut guard = writer.lock().await;
    guard.write_all(line.as_bytes()).await?;
    Ok(())
}
