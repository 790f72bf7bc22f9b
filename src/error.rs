// File: src/error.rs
//
// Crate-wide error type for the stratum client. Every fallible path in
// this crate (I/O, JSON framing, protocol dispatch, hash-table setup)
// resolves to one of these variants so callers can match on failure
// kind instead of downcasting an opaque error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("not connected")]
    NotConnected,

    #[error("authorization denied by pool")]
    AuthorizationDenied,

    #[error("client is closed")]
    Closed,

    #[error("hash table error: {0}")]
    HashTable(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
