use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for intercom operations
pub type Result<T> = std::result::Result<T, IntercomError>;

/// Errors that can occur when talking to intercom devices
#[derive(Error, Debug)]
pub enum IntercomError {
    /// A schema file could not be loaded or normalized
    #[error("Invalid schema {}: {reason}", path.display())]
    InvalidSchema {
        /// File that failed to load
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// The value shape cannot be encoded on the wire
    #[error("Unsupported value type: {0}")]
    UnsupportedValueType(String),

    /// The value does not fit the parameter it was sent to
    #[error("Invalid value for {setting}: {reason}")]
    InvalidValue {
        /// Setting name the value was destined for
        setting: String,
        /// Why the value was rejected
        reason: String,
    },

    /// No action registered under the given id
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// A received frame failed verification
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    /// No reply arrived before the ACK timer fired
    #[error("Timed out waiting for ACK from {model} at {addr}")]
    Timeout {
        /// Device model the command targeted
        model: String,
        /// Destination address of the command
        addr: SocketAddr,
    },

    /// Socket or file I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IntercomError {
    /// Whether this error comes from rejected input rather than the network
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            IntercomError::InvalidSchema { .. }
                | IntercomError::UnsupportedValueType(_)
                | IntercomError::InvalidValue { .. }
                | IntercomError::UnknownAction(_)
                | IntercomError::InvalidPacket(_)
                | IntercomError::Json(_)
        )
    }

    /// Whether this error is an ACK timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, IntercomError::Timeout { .. })
    }

    pub(crate) fn schema(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        IntercomError::InvalidSchema {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_value(setting: impl Into<String>, reason: impl Into<String>) -> Self {
        IntercomError::InvalidValue {
            setting: setting.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_errors() {
        let timeout = IntercomError::Timeout {
            model: "Model209".to_string(),
            addr: "192.168.1.20:8700".parse().unwrap(),
        };
        assert!(timeout.is_timeout());
        assert!(!timeout.is_validation());
        assert_eq!(
            timeout.to_string(),
            "Timed out waiting for ACK from Model209 at 192.168.1.20:8700"
        );

        let bad = IntercomError::UnsupportedValueType("string".to_string());
        assert!(bad.is_validation());
        assert!(!bad.is_timeout());

        let io = IntercomError::from(std::io::Error::other("boom"));
        assert!(!io.is_validation());
    }
}
