//! Device Registry
//!
//! Talks to devices through the ADB executable: availability probes,
//! enumeration, property lookups and package installs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use apk_drop_core::config::TimeoutConfig;
use apk_drop_core::{ConnectionStatus, InstallError};
use tracing::{debug, info, warn};

use crate::device::{parse_device_entries, DeviceId, DeviceRecord};
use crate::locator::BridgeLocator;
use crate::runner::{CommandOutput, CommandRunner, RunError};

/// Marker ADB prints when a package was installed
pub const INSTALL_SUCCESS_MARKER: &str = "Success";

/// Property fallbacks used when `ro.product.model` is empty
const FALLBACK_NAME_PROPS: &[&str] = &["ro.product.name", "ro.product.device"];

/// Device registry backed by the ADB executable
pub struct DeviceRegistry {
    locator: Arc<BridgeLocator>,
    runner: Arc<dyn CommandRunner>,
    timeouts: TimeoutConfig,
}

impl DeviceRegistry {
    /// Create a new registry
    pub fn new(
        locator: Arc<BridgeLocator>,
        runner: Arc<dyn CommandRunner>,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self { locator, runner, timeouts }
    }

    pub fn locator(&self) -> &Arc<BridgeLocator> {
        &self.locator
    }

    /// Run an ADB command
    async fn run(
        &self,
        adb: &Path,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, RunError> {
        debug!("adb {:?}", args);
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.runner.run(adb, &args, timeout).await
    }

    /// Run an ADB command for a specific device
    async fn run_for_device(
        &self,
        adb: &Path,
        serial: Option<&DeviceId>,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, RunError> {
        let mut full_args = Vec::with_capacity(args.len() + 2);
        if let Some(serial) = serial {
            full_args.push("-s");
            full_args.push(serial.as_str());
        }
        full_args.extend_from_slice(args);
        self.run(adb, &full_args, timeout).await
    }

    /// Resolve the bridge and confirm `adb version` answers
    async fn available_bridge(&self) -> Option<PathBuf> {
        let Some(adb) = self.locator.resolve() else {
            debug!("ADB path not resolved, skipping version probe");
            return None;
        };

        match self.run(&adb, &["version"], self.timeouts.probe()).await {
            Ok(output) if output.success() => Some(adb),
            Ok(output) => {
                warn!(
                    exit_code = ?output.exit_code,
                    stderr = %output.stderr.trim(),
                    "ADB version check failed"
                );
                None
            }
            Err(e) => {
                warn!("ADB availability check failed: {}", e);
                None
            }
        }
    }

    /// Check if ADB is present and responding
    pub async fn is_bridge_available(&self) -> bool {
        self.available_bridge().await.is_some()
    }

    /// Enumerate authorized devices and derive the connection status.
    ///
    /// Never fails: every bridge problem is reported as `BridgeError`.
    pub async fn list_devices(&self) -> (ConnectionStatus, Vec<DeviceId>) {
        let Some(adb) = self.available_bridge().await else {
            return (ConnectionStatus::BridgeError, Vec::new());
        };

        let output = match self.run(&adb, &["devices"], self.timeouts.list()).await {
            Ok(output) if output.success() => output,
            Ok(output) => {
                warn!(exit_code = ?output.exit_code, "adb devices failed: {}", output.failure_text());
                return (ConnectionStatus::BridgeError, Vec::new());
            }
            Err(e) => {
                warn!("adb devices failed: {}", e);
                return (ConnectionStatus::BridgeError, Vec::new());
            }
        };

        let mut devices = Vec::new();
        for entry in parse_device_entries(&output.stdout) {
            if entry.state.is_usable() {
                devices.push(entry.id);
            } else {
                debug!(device = %entry.id, state = entry.state.as_str(), "Ignoring unusable device");
            }
        }

        let status = if devices.is_empty() {
            ConnectionStatus::Disconnected
        } else {
            ConnectionStatus::Connected
        };
        (status, devices)
    }

    /// Get device property, `None` when the query fails or is empty
    pub async fn get_prop(&self, adb: &Path, serial: &DeviceId, prop: &str) -> Option<String> {
        match self
            .run_for_device(adb, Some(serial), &["shell", "getprop", prop], self.timeouts.probe())
            .await
        {
            Ok(output) if output.success() => {
                let value = output.stdout.trim();
                (!value.is_empty()).then(|| value.to_string())
            }
            Ok(output) => {
                debug!(prop, exit_code = ?output.exit_code, "getprop failed");
                None
            }
            Err(e) => {
                debug!(prop, "getprop failed: {}", e);
                None
            }
        }
    }

    /// Human-readable device name.
    ///
    /// Without an id, the first authorized device is used; `None` means no
    /// device is connected. With a device, the result degrades down to the
    /// raw id and never fails.
    pub async fn device_display_name(&self, serial: Option<&DeviceId>) -> Option<String> {
        let serial = match serial {
            Some(serial) => serial.clone(),
            None => {
                let (_, devices) = self.list_devices().await;
                devices.into_iter().next()?
            }
        };

        let Some(adb) = self.locator.resolve() else {
            return Some(serial.to_string());
        };
        Some(self.resolve_name(&adb, &serial).await)
    }

    async fn resolve_name(&self, adb: &Path, serial: &DeviceId) -> String {
        if let Some(model) = self.get_prop(adb, serial, "ro.product.model").await {
            return match self.get_prop(adb, serial, "ro.product.brand").await {
                Some(brand) if !model.to_lowercase().contains(&brand.to_lowercase()) => {
                    format!("{} {}", brand, model)
                }
                _ => model,
            };
        }

        for prop in FALLBACK_NAME_PROPS {
            if let Some(value) = self.get_prop(adb, serial, prop).await {
                return value;
            }
        }

        serial.to_string()
    }

    /// Authorized devices with their display names
    pub async fn device_records(&self) -> Vec<DeviceRecord> {
        let (_, devices) = self.list_devices().await;
        let Some(adb) = self.locator.resolve() else {
            return Vec::new();
        };

        let mut records = Vec::with_capacity(devices.len());
        for id in devices {
            let name = self.resolve_name(&adb, &id).await;
            records.push(DeviceRecord { id, name: Some(name) });
        }
        records
    }

    /// Install an APK, replacing any existing copy.
    ///
    /// Success requires exit code zero *and* the success marker on stdout.
    pub async fn install(
        &self,
        target: Option<&DeviceId>,
        apk_path: &Path,
    ) -> Result<String, InstallError> {
        let adb = self.locator.resolve().ok_or(InstallError::BridgeUnavailable)?;
        let path_str = apk_path.to_string_lossy().into_owned();

        info!(device = ?target.map(DeviceId::as_str), apk = %apk_path.display(), "Installing APK");

        let output = self
            .run_for_device(&adb, target, &["install", "-r", path_str.as_str()], self.timeouts.install())
            .await
            .map_err(|e| match e {
                RunError::TimedOut(after) => InstallError::BridgeTimeout(after),
                RunError::Spawn(e) => {
                    warn!("Failed to start adb install: {}", e);
                    InstallError::BridgeUnavailable
                }
            })?;

        if output.success() && output.stdout.contains(INSTALL_SUCCESS_MARKER) {
            Ok("APK installed successfully".to_string())
        } else {
            let message = match output.failure_text() {
                "" => format!("adb exited with {:?}", output.exit_code),
                text => text.to_string(),
            };
            Err(InstallError::BridgeRejected(message))
        }
    }
}
