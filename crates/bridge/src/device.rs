//! Device Types and State
//!
//! Device identifiers and parsing of `adb devices` output.

use std::fmt;
use serde::{Deserialize, Serialize};

/// Opaque device token assigned by ADB (serial or transport descriptor)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Device state as reported by `adb devices`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    /// Device is online and authorized
    Online,
    /// Device is offline
    Offline,
    /// Device is not authorized (need to accept on device)
    Unauthorized,
    /// Host lacks USB permissions (udev rules)
    NoPermissions,
    /// Device is in bootloader mode
    Bootloader,
    /// Device is in recovery mode
    Recovery,
    /// Device is in sideload mode
    Sideload,
    /// Unknown state
    Unknown,
}

impl DeviceState {
    pub fn parse(token: &str) -> Self {
        match token {
            "device" => DeviceState::Online,
            "offline" => DeviceState::Offline,
            "unauthorized" => DeviceState::Unauthorized,
            "bootloader" => DeviceState::Bootloader,
            "recovery" => DeviceState::Recovery,
            "sideload" => DeviceState::Sideload,
            t if t.starts_with("no permissions") => DeviceState::NoPermissions,
            _ => DeviceState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Online => "device",
            DeviceState::Offline => "offline",
            DeviceState::Unauthorized => "unauthorized",
            DeviceState::NoPermissions => "no permissions",
            DeviceState::Bootloader => "bootloader",
            DeviceState::Recovery => "recovery",
            DeviceState::Sideload => "sideload",
            DeviceState::Unknown => "unknown",
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, DeviceState::Online)
    }
}

/// One line of `adb devices` output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    pub id: DeviceId,
    pub state: DeviceState,
}

/// A device together with its resolved display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub name: Option<String>,
}

impl DeviceRecord {
    /// Get display name
    pub fn display_name(&self) -> String {
        match self.name {
            Some(ref name) if name != self.id.as_str() => format!("{} ({})", name, self.id),
            _ => self.id.to_string(),
        }
    }
}

/// Parse every device line of `adb devices` output, whatever its state.
///
/// The first line is the "List of devices attached" header and is skipped.
/// Lines are `<id>\t<state>`; lines without a tab are ignored.
pub fn parse_device_entries(output: &str) -> Vec<DeviceEntry> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let (id, state) = line.split_once('\t')?;
            let id = id.trim();
            if id.is_empty() {
                return None;
            }
            Some(DeviceEntry {
                id: DeviceId::new(id),
                state: DeviceState::parse(state.trim()),
            })
        })
        .collect()
}

/// Authorized devices only, in output order
pub fn parse_devices(output: &str) -> Vec<DeviceId> {
    parse_device_entries(output)
        .into_iter()
        .filter(|entry| entry.state.is_usable())
        .map(|entry| entry.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_authorized_devices_count() {
        let output = "List of devices attached\nABC123\tdevice\nXYZ999\tunauthorized\n";
        assert_eq!(parse_devices(output), vec![DeviceId::new("ABC123")]);
    }

    #[test]
    fn test_excluded_states() {
        let output = "List of devices attached\n\
                      emulator-5554\toffline\n\
                      0123456789ABCDEF\tno permissions (user in plugdev group; are your udev rules wrong?)\n\
                      R58M12ABCDE\tunauthorized\n\
                      192.168.1.20:5555\tdevice\n";

        let entries = parse_device_entries(output);
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].state, DeviceState::Offline);
        assert_eq!(entries[1].state, DeviceState::NoPermissions);
        assert_eq!(entries[2].state, DeviceState::Unauthorized);

        assert_eq!(parse_devices(output), vec![DeviceId::new("192.168.1.20:5555")]);
    }

    #[test]
    fn test_crlf_and_trailing_whitespace() {
        let output = "List of devices attached\r\nABC123\tdevice  \r\n\r\nDEF456\tdevice\r\n\r\n";
        assert_eq!(
            parse_devices(output),
            vec![DeviceId::new("ABC123"), DeviceId::new("DEF456")]
        );
    }

    #[test]
    fn test_header_only() {
        assert!(parse_devices("List of devices attached\n\n").is_empty());
        assert!(parse_devices("").is_empty());
    }

    #[test]
    fn test_header_is_never_a_device() {
        // A header line that happens to contain a tab must still be discarded
        let output = "List of devices\tdevice\nABC123\tdevice\n";
        assert_eq!(parse_devices(output), vec![DeviceId::new("ABC123")]);
    }

    #[test]
    fn test_record_display_name() {
        let record = DeviceRecord {
            id: DeviceId::new("ABC123"),
            name: Some("Google Pixel 7".into()),
        };
        assert_eq!(record.display_name(), "Google Pixel 7 (ABC123)");

        let bare = DeviceRecord { id: DeviceId::new("ABC123"), name: None };
        assert_eq!(bare.display_name(), "ABC123");
    }
}
