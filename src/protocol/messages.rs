// File: src/protocol/messages.rs
//
// Wire message shapes for the line-delimited JSON-RPC session
// (spec.md §4.C/§6) and the outbound request builders for the five
// client-to-server methods (§4.D). Grounded on the teacher's
// `pool/protocol.rs` (a plain struct of `serde_json::json!` builders)
// and the reference's `*Request` constructors
// (original_source/stratum/client.go, e.g. `SubscribeRequest`,
// `SubmitRequest`) — those constructors live outside the filtered
// source pack, so the exact param arrays here are reconstructed from
// the call sites and from spec.md §8's literal fixtures.
//
// Tree Location:
// - src/protocol/messages.rs (wire types + request builders)
// - Depends on: serde, serde_json

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, Result};

/// An outbound request: `{id, method, params}`. Params are always an
/// array of strings on the wire, per spec.md §6.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundRequest {
    pub id: i32,
    pub method: String,
    pub params: Vec<String>,
}

/// An outbound response the client sends back to a server-initiated
/// request (only `client.get_version` needs this).
#[derive(Debug, Clone, Serialize)]
pub struct OutboundResponse {
    pub id: i32,
    pub result: Value,
    pub error: Option<Value>,
}

/// One element of a `mining.subscribe` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

/// A decoded inbound line, discriminated by the presence of `method`
/// and `id` (spec.md §4.C).
#[derive(Debug, Clone)]
pub enum Frame {
    Request {
        id: i32,
        method: String,
        params: Vec<Value>,
    },
    Response {
        id: i32,
        result: Value,
        error: Option<Value>,
    },
    Notification {
        method: String,
        params: Vec<Value>,
    },
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    id: Option<i32>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Vec<Value>>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Parse one newline-stripped line into a discriminated `Frame`.
pub fn parse_frame(line: &str) -> Result<Frame> {
    let raw: RawFrame = serde_json::from_str(line)?;
    match (raw.id, raw.method) {
        (Some(id), Some(method)) => Ok(Frame::Request {
            id,
            method,
            params: raw.params.unwrap_or_default(),
        }),
        (None, Some(method)) => Ok(Frame::Notification {
            method,
            params: raw.params.unwrap_or_default(),
        }),
        (Some(id), None) => Ok(Frame::Response {
            id,
            result: raw.result.unwrap_or(Value::Null),
            error: raw.error,
        }),
        (None, None) => Err(ClientError::Malformed(format!(
            "frame has neither id nor method: {line}"
        ))),
    }
}

/// Parse a string param at `index`, reporting a malformed-message
/// error naming the offending method on failure.
pub fn string_param(method: &str, params: &[Value], index: usize) -> Result<String> {
    params
        .get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            ClientError::Malformed(format!("{method}: missing or non-string param[{index}]"))
        })
}

/// `mining.subscribe` — announce the client version.
pub fn subscribe_request(id: i32, version: &str) -> OutboundRequest {
    OutboundRequest {
        id,
        method: "mining.subscribe".to_string(),
        params: vec![version.to_string()],
    }
}

/// `mining.authorize` — `username,minername` combined per spec.md §4.D.
pub fn authorize_request(
    id: i32,
    username: &str,
    minername: &str,
    password: &str,
    invite_code: &str,
    payout_address: &str,
) -> OutboundRequest {
    OutboundRequest {
        id,
        method: "mining.authorize".to_string(),
        params: vec![
            format!("{username},{minername}"),
            password.to_string(),
            invite_code.to_string(),
            payout_address.to_string(),
        ],
    }
}

/// `mining.get_oprhash` — refresh the OPR hash for `job_id`.
pub fn get_oprhash_request(id: i32, job_id: &str) -> OutboundRequest {
    OutboundRequest {
        id,
        method: "mining.get_oprhash".to_string(),
        params: vec![job_id.to_string()],
    }
}

/// `mining.submit` — report a winning share.
pub fn submit_request(
    id: i32,
    username: &str,
    minername: &str,
    job_id: &str,
    nonce: &str,
    opr_hash: &str,
    target: &str,
) -> OutboundRequest {
    OutboundRequest {
        id,
        method: "mining.submit".to_string(),
        params: vec![
            format!("{username},{minername}"),
            job_id.to_string(),
            nonce.to_string(),
            opr_hash.to_string(),
            target.to_string(),
        ],
    }
}

/// `mining.suggest_target` — fire-and-forget difficulty hint.
pub fn suggest_target_request(id: i32, preferred_target: &str) -> OutboundRequest {
    OutboundRequest {
        id,
        method: "mining.suggest_target".to_string(),
        params: vec![preferred_target.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminates_request_response_notification() {
        let req = parse_frame(r#"{"id":1,"method":"mining.subscribe","params":["v1"]}"#).unwrap();
        assert!(matches!(req, Frame::Request { id: 1, .. }));

        let resp = parse_frame(r#"{"id":1,"result":true,"error":null}"#).unwrap();
        assert!(matches!(resp, Frame::Response { id: 1, .. }));

        let notify =
            parse_frame(r#"{"method":"mining.notify","params":["5","aa"]}"#).unwrap();
        assert!(matches!(notify, Frame::Notification { .. }));
    }

    #[test]
    fn neither_id_nor_method_is_malformed() {
        assert!(parse_frame(r#"{"foo":"bar"}"#).is_err());
    }

    #[test]
    fn submit_request_matches_fixture_shape() {
        let req = submit_request(
            7,
            "user",
            "miner",
            "5",
            "0102030405",
            "00037f39cf870a1f49129f9c82d935665d352ffd25ea3296208f6f7b16fd654f",
            "fffe000000000000",
        );
        assert_eq!(req.method, "mining.submit");
        assert_eq!(req.params[0], "user,miner");
        assert_eq!(req.params[1], "5");
    }
}
