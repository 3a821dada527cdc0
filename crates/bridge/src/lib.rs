//! ADB Bridge
//!
//! Locates the ADB executable, runs it with bounded lifetimes and exposes
//! device enumeration and package installation on top of it.

pub mod adb;
pub mod device;
pub mod locator;
pub mod runner;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use adb::DeviceRegistry;
pub use device::{parse_device_entries, parse_devices, DeviceEntry, DeviceId, DeviceRecord, DeviceState};
pub use locator::{expand_path, BridgeLocator, ADB_BINARY};
pub use runner::{CommandOutput, CommandRunner, RunError, SystemRunner};
