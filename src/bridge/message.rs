//! Wire format for the debugger bridge.
//!
//! One message is a JSON object with `cmd`, `info`, and an optional
//! `callbackId`, terminated by the fixed `"|*|"` delimiter and a newline.
//! The delimiter predates this implementation and cannot change without
//! breaking deployed debuggee scripts.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{IntelError, IntelResult};

/// Message terminator on the wire, before the trailing newline.
pub const DELIMITER: &str = "|*|";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugMessage {
    pub cmd: String,

    #[serde(default)]
    pub info: Value,

    #[serde(rename = "callbackId", skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<u64>,
}

impl DebugMessage {
    pub fn new(cmd: impl Into<String>, info: Value) -> Self {
        Self {
            cmd: cmd.into(),
            info,
            callback_id: None,
        }
    }

    pub fn with_callback(mut self, id: u64) -> Self {
        self.callback_id = Some(id);
        self
    }
}

/// Serialize one message, delimiter and newline included.
pub fn encode(message: &DebugMessage) -> IntelResult<String> {
    let json = serde_json::to_string(message)?;
    Ok(format!("{json}{DELIMITER}\n"))
}

/// Parse one received line. Tolerates a missing delimiter, which happens
/// when the peer closes the stream mid-write.
pub fn decode(line: &str) -> IntelResult<DebugMessage> {
    let trimmed = line.trim_end_matches('\n').trim_end_matches('\r');
    let body = trimmed.strip_suffix(DELIMITER).unwrap_or(trimmed);
    if body.is_empty() {
        return Err(IntelError::Bridge {
            reason: "empty message".to_string(),
        });
    }
    Ok(serde_json::from_str(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_appends_delimiter_and_newline() {
        let msg = DebugMessage::new("initReq", json!({"emmyHelper": true}));
        let wire = encode(&msg).unwrap();
        assert!(wire.ends_with("|*|\n"));
        assert!(wire.contains("\"cmd\":\"initReq\""));
        // No callback id means no callbackId key at all.
        assert!(!wire.contains("callbackId"));
    }

    #[test]
    fn test_decode_round_trip_with_callback() {
        let msg = DebugMessage::new("evalReq", json!({"expr": "player.hp"})).with_callback(7);
        let decoded = decode(&encode(&msg).unwrap()).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.callback_id, Some(7));
    }

    #[test]
    fn test_decode_without_delimiter() {
        let decoded = decode(r#"{"cmd":"stopped","info":null}"#).unwrap();
        assert_eq!(decoded.cmd, "stopped");
        assert!(decoded.callback_id.is_none());
    }

    #[test]
    fn test_decode_rejects_empty_line() {
        assert!(decode("|*|\n").is_err());
        assert!(decode("\n").is_err());
    }
}
