//! CLI commands for APK Drop
//!
//! Thin wrappers over [`SessionManager`] for scripting and automation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use apk_drop_bridge::{DeviceId, DeviceRecord};
use apk_drop_core::{ConnectionStatus, Event, EventSubscription, InstallResult};
use apk_drop_session::SessionManager;
use serde::Serialize;
use tracing::{debug, info};

/// Install command options
pub struct InstallCommand {
    pub paths: Vec<PathBuf>,
    pub device: Option<String>,
}

impl InstallCommand {
    /// Queue every package and wait for all of them. Returns the number of failures.
    pub async fn execute(&self, session: &SessionManager) -> Result<usize> {
        if let Some(device) = &self.device {
            session.select_target(Some(DeviceId::new(device.as_str())));
        }

        let events = session.subscribe();
        let ids = session.enqueue_install(self.paths.iter().cloned())?;
        let expected = ids.len();
        info!("Waiting for {} installs", expected);

        let results = tokio::task::spawn_blocking(move || collect_results(&events, expected))
            .await
            .context("install watcher failed")?;

        let mut failures = 0;
        for (path, result) in &results {
            if result.success {
                println!("OK    {}: {}", path.display(), result.message);
            } else {
                failures += 1;
                println!("FAIL  {}: {}", path.display(), result.message);
            }
        }

        if results.len() < expected {
            failures += expected - results.len();
            println!("{} installs did not finish", expected - results.len());
        }
        Ok(failures)
    }
}

fn collect_results(events: &EventSubscription, expected: usize) -> Vec<(PathBuf, InstallResult)> {
    let mut results = Vec::with_capacity(expected);
    for event in events.iter() {
        match event {
            Event::TaskStarted { path, .. } => println!("...   {}", path.display()),
            Event::TaskCompleted { path, result, .. } => {
                results.push((path, result));
                if results.len() == expected {
                    break;
                }
            }
            Event::Shutdown => break,
            other => debug!("{}", other),
        }
    }
    results
}

#[derive(Serialize)]
struct DeviceListing {
    status: ConnectionStatus,
    devices: Vec<DeviceRecord>,
}

/// Device list command
pub struct DevicesCommand {
    pub json: bool,
}

impl DevicesCommand {
    /// List all authorized devices
    pub async fn execute(&self, session: &SessionManager) -> Result<()> {
        let (status, _) = session.list_devices().await;
        let devices = session.device_records().await;

        if self.json {
            let listing = DeviceListing { status, devices };
            println!("{}", serde_json::to_string_pretty(&listing)?);
            return Ok(());
        }

        match status {
            ConnectionStatus::BridgeError => println!("ADB is not available"),
            _ if devices.is_empty() => println!("No devices connected"),
            _ => {
                println!("Connected devices:");
                for device in devices {
                    println!("  {}", device.display_name());
                }
            }
        }

        Ok(())
    }
}

/// Print connection status changes until Ctrl-C
pub struct WatchCommand;

impl WatchCommand {
    pub async fn execute(&self, session: &mut SessionManager) -> Result<()> {
        println!("Status: {}", session.current_status());

        loop {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal.context("failed to listen for Ctrl-C")?;
                    break;
                }
                changed = session.status_changed() => match changed {
                    Some(status) => {
                        let name = match status {
                            ConnectionStatus::Connected => session.device_display_name(None).await,
                            _ => None,
                        };
                        match name {
                            Some(name) => println!("Status: {} ({})", status, name),
                            None => println!("Status: {}", status),
                        }
                    }
                    None => break,
                },
            }
        }

        Ok(())
    }
}

/// Report where ADB was found
pub struct LocateCommand;

impl LocateCommand {
    /// Returns whether ADB was found
    pub fn execute(&self, session: &SessionManager) -> bool {
        match session.bridge_path() {
            Some(path) => {
                println!("{}", path.display());
                true
            }
            None => {
                println!("ADB not found");
                false
            }
        }
    }
}
