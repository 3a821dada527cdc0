//! Connection and queue state shared between the bridge, the session and callers.

use std::fmt;
use serde::{Deserialize, Serialize};

/// Coarse connection state derived from a single device enumeration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Bridge works, no authorized device attached
    #[default]
    Disconnected,
    /// At least one authorized device attached
    Connected,
    /// Bridge missing, unresponsive, or failed
    BridgeError,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "No device connected",
            ConnectionStatus::Connected => "Device connected",
            ConnectionStatus::BridgeError => "ADB call failed",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one install task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallResult {
    pub success: bool,
    pub message: String,
}

impl InstallResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}

impl From<&crate::error::InstallError> for InstallResult {
    fn from(err: &crate::error::InstallError) -> Self {
        Self::failure(err.user_message())
    }
}

/// Queue depth as reported after each task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueState {
    Empty,
    Processing { remaining: usize },
}

impl QueueState {
    pub fn from_remaining(remaining: usize) -> Self {
        if remaining == 0 {
            QueueState::Empty
        } else {
            QueueState::Processing { remaining }
        }
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueState::Empty => f.write_str("queue empty"),
            QueueState::Processing { .. } => f.write_str("processing queue"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_defaults_to_disconnected() {
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Disconnected);
        assert!(!ConnectionStatus::default().is_connected());
    }

    #[test]
    fn test_queue_state_text() {
        assert_eq!(QueueState::from_remaining(0).to_string(), "queue empty");
        assert_eq!(QueueState::from_remaining(3), QueueState::Processing { remaining: 3 });
        assert_eq!(QueueState::from_remaining(3).to_string(), "processing queue");
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = toml::Value::try_from(ConnectionStatus::BridgeError).unwrap();
        assert_eq!(json.as_str(), Some("bridge_error"));
    }
}
