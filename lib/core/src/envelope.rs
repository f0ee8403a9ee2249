//! Versioned envelope for records written to disk.
//!
//! Event log lines carry a version header so readers can tell old lines
//! from new ones after the event shape changes.

use serde::{Deserialize, Serialize};

/// The current envelope version.
pub const CURRENT_VERSION: u32 = 1;

/// A versioned wrapper around a serialized payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// The version of the envelope format.
    pub version: u32,
    /// The wrapped payload.
    pub payload: T,
}

impl<T> Envelope<T> {
    /// Wraps `payload` at the current version.
    #[must_use]
    pub fn new(payload: T) -> Self {
        Self {
            version: CURRENT_VERSION,
            payload,
        }
    }

    /// Unwraps the envelope, returning the payload.
    #[must_use]
    pub fn into_payload(self) -> T {
        self.payload
    }

    /// Returns true if this envelope uses the current version.
    #[must_use]
    pub fn is_current_version(&self) -> bool {
        self.version == CURRENT_VERSION
    }
}

impl<T: Serialize> Envelope<T> {
    /// Serializes the envelope as a single line of JSON, without the newline.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl<T: for<'de> Deserialize<'de>> Envelope<T> {
    /// Parses one JSON line written by [`Envelope::to_json_line`].
    ///
    /// # Errors
    ///
    /// Returns an error if the line is not a valid envelope of `T`.
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_has_version_and_payload() {
        let line = Envelope::new(serde_json::json!({ "kind": "chat.started" }))
            .to_json_line()
            .expect("serialize");

        assert!(!line.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&line).expect("json");
        assert_eq!(value["version"], CURRENT_VERSION);
        assert_eq!(value["payload"]["kind"], "chat.started");
    }

    #[test]
    fn parses_own_lines() {
        let envelope = Envelope::new("hello".to_string());
        let parsed: Envelope<String> =
            Envelope::from_json_line(&envelope.to_json_line().expect("serialize"))
                .expect("parse");

        assert!(parsed.is_current_version());
        assert_eq!(parsed.into_payload(), "hello");
    }
}
