//! The `{type, result}` envelope snapd wraps every response in.

use serde_json::{json, Value};
use tracing::warn;

use crate::error::SnapdError;
use crate::http::HttpResponse;

const JSON_SEQ: &str = "application/json-seq";
const RECORD_SEPARATOR: u8 = 0x1e;

/// The `type` field of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    Sync,
    /// The request started a change; see `Envelope::change`.
    Async,
    Error,
    /// Missing or unrecognised `type`.
    Other,
}

/// A successfully parsed snapd response.
///
/// Holds the decoded JSON exactly as the daemon sent it; the accessors only
/// read from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope(Value);

impl Envelope {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Interprets a buffered response: decodes the body and fails on an
    /// error-typed envelope.
    pub fn from_response(response: &HttpResponse) -> Result<Self, SnapdError> {
        let is_json_seq = response
            .header("content-type")
            .is_some_and(|ct| ct.starts_with(JSON_SEQ));

        let value = if is_json_seq {
            decode_json_seq(&response.body)?
        } else {
            serde_json::from_slice(&response.body).map_err(SnapdError::Decode)?
        };

        let envelope = Self(value);

        if envelope.kind() == ResponseType::Error {
            return Err(envelope.into_error());
        }

        Ok(envelope)
    }

    pub fn kind(&self) -> ResponseType {
        match self.0.get("type").and_then(Value::as_str) {
            Some("sync") => ResponseType::Sync,
            Some("async") => ResponseType::Async,
            Some("error") => ResponseType::Error,
            _ => ResponseType::Other,
        }
    }

    /// The `result` member, or `null` when absent.
    pub fn result(&self) -> &Value {
        self.0.get("result").unwrap_or(&Value::Null)
    }

    /// Id of the change started by an async request.
    pub fn change(&self) -> Option<&str> {
        self.0.get("change").and_then(Value::as_str)
    }

    pub fn status_code(&self) -> Option<u16> {
        self.0
            .get("status-code")
            .and_then(Value::as_u64)
            .and_then(|code| u16::try_from(code).ok())
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    fn into_error(self) -> SnapdError {
        let result = self.result();

        let message = result
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| self.0.get("status").and_then(Value::as_str))
            .unwrap_or("snapd returned an error without a message")
            .to_string();

        let kind = result
            .get("kind")
            .and_then(Value::as_str)
            .map(str::to_string);

        let status_code = self.status_code();

        warn!(%message, ?kind, ?status_code, "snapd returned an error");

        SnapdError::Daemon {
            message,
            kind,
            status_code,
        }
    }
}

/// `/logs` answers with RFC 7464 JSON text sequences rather than an
/// envelope; the records are gathered into a synthetic sync envelope.
fn decode_json_seq(body: &[u8]) -> Result<Value, SnapdError> {
    let records = body
        .split(|byte| *byte == RECORD_SEPARATOR)
        .filter(|record| record.iter().any(|byte| !byte.is_ascii_whitespace()))
        .map(|record| serde_json::from_slice::<Value>(record).map_err(SnapdError::Decode))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(json!({
        "type": "sync",
        "result": records,
    }))
}
