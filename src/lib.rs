//! APK Drop - serialized APK installs onto an attached Android device
//!
//! Packages are queued and installed one at a time through `adb`, while a
//! background poller keeps track of whether a device is connected.
//!
//! ## Architecture
//!
//! APK Drop is organized into specialized crates:
//!
//! - `apk-drop-core`: Configuration, errors, status types and the event bus
//! - `apk-drop-bridge`: ADB discovery, subprocess runner and device registry
//! - `apk-drop-session`: Install queue, status poller and session manager

#![warn(clippy::all)]

pub mod commands;

// Re-export main components for library usage
pub use apk_drop_bridge as bridge;
pub use apk_drop_core as core;
pub use apk_drop_session as session;

/// Prelude module for convenient imports
pub mod prelude {
    pub use apk_drop_bridge::{BridgeLocator, DeviceId, DeviceRecord, DeviceRegistry, SystemRunner};
    pub use apk_drop_core::{AppConfig, ConnectionStatus, Event, InstallError, InstallResult};
    pub use apk_drop_session::SessionManager;
}
