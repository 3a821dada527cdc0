//! Error types for APK Drop
//!
//! Centralized error handling using thiserror.

use std::time::Duration;
use thiserror::Error;

/// Main error type for APK Drop
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("ADB executable not found or not runnable")]
    BridgeUnavailable,

    #[error("ADB did not respond within {0:?}")]
    BridgeTimeout(Duration),

    #[error("ADB rejected the request: {0}")]
    BridgeRejected(String),

    #[error("No authorized device connected")]
    DeviceDisconnected,

    #[error("{0} devices connected and no target selected")]
    AmbiguousTarget(usize),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Install queue is shutting down")]
    ShuttingDown,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Result type alias for APK Drop operations
pub type Result<T> = std::result::Result<T, InstallError>;

impl InstallError {
    /// Check if this error only affects the current task
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            InstallError::BridgeUnavailable
                | InstallError::BridgeTimeout(_)
                | InstallError::BridgeRejected(_)
                | InstallError::DeviceDisconnected
                | InstallError::AmbiguousTarget(_)
                | InstallError::InvalidInput(_)
        )
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            InstallError::BridgeUnavailable => {
                "ADB not found. Install the Android platform-tools or set bridge.adb_path".to_string()
            }
            InstallError::BridgeTimeout(_) => "Installation timed out".to_string(),
            InstallError::BridgeRejected(msg) => format!("Installation failed: {}", msg.trim()),
            InstallError::DeviceDisconnected => "Device connection lost".to_string(),
            InstallError::AmbiguousTarget(count) => {
                format!("{} devices connected, select one before installing", count)
            }
            InstallError::InvalidInput(msg) => format!("Not a valid APK file: {}", msg),
            InstallError::ShuttingDown => "Installer is shutting down".to_string(),
            InstallError::Io(e) => format!("File operation failed: {}", e),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_distinguish_cause() {
        let timeout = InstallError::BridgeTimeout(Duration::from_secs(60)).user_message();
        let rejected = InstallError::BridgeRejected("Failure [INSTALL_FAILED_OLDER_SDK]\n".into())
            .user_message();

        assert_eq!(timeout, "Installation timed out");
        assert_eq!(rejected, "Installation failed: Failure [INSTALL_FAILED_OLDER_SDK]");
        assert_ne!(
            InstallError::DeviceDisconnected.user_message(),
            InstallError::BridgeUnavailable.user_message()
        );
    }

    #[test]
    fn test_recoverable() {
        assert!(InstallError::DeviceDisconnected.is_recoverable());
        assert!(InstallError::InvalidInput("x.txt".into()).is_recoverable());
        assert!(!InstallError::ShuttingDown.is_recoverable());
    }
}
