//! Session Manager
//!
//! Central coordinator owning the bridge, the install queue and the status
//! poller for the lifetime of the application:
//! - Background task lifecycle
//! - Caller-facing install and device API
//! - Event subscription

use std::path::PathBuf;
use std::sync::Arc;

use apk_drop_bridge::{BridgeLocator, CommandRunner, DeviceId, DeviceRecord, DeviceRegistry, SystemRunner};
use apk_drop_core::{AppConfig, ConnectionStatus, Event, EventBus, EventSubscription, Result};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::poller::StatusPoller;
use crate::queue::{InstallQueue, SharedTarget};

/// Handle to a running install session
pub struct SessionManager {
    config: AppConfig,
    events: Arc<EventBus>,
    registry: Arc<DeviceRegistry>,
    queue: InstallQueue,
    status: watch::Receiver<ConnectionStatus>,
    target: SharedTarget,
    cancel: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionManager {
    /// Start a session running real `adb` processes
    pub fn new(config: AppConfig) -> Self {
        Self::start(config, Arc::new(SystemRunner))
    }

    /// Start a session with the given runner. Must be called inside a tokio runtime.
    pub fn start(config: AppConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let locator = Arc::new(BridgeLocator::new(&config.bridge));
        Self::with_locator(config, locator, runner)
    }

    /// Start a session around an existing locator
    pub fn with_locator(
        config: AppConfig,
        locator: Arc<BridgeLocator>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        info!("Starting install session");

        let events = Arc::new(EventBus::new());
        let registry = Arc::new(DeviceRegistry::new(locator, runner, config.timeouts.clone()));
        let target = SharedTarget::default();
        let cancel = CancellationToken::new();

        let (queue, worker) = InstallQueue::spawn(
            Arc::clone(&registry),
            Arc::clone(&target),
            Arc::clone(&events),
            cancel.clone(),
        );
        let (status, poller) = StatusPoller::new(
            Arc::clone(&registry),
            Arc::clone(&events),
            config.poller.interval(),
            config.poller.backoff(),
        )
        .spawn(cancel.clone());

        Self {
            config,
            events,
            registry,
            queue,
            status,
            target,
            cancel,
            handles: Mutex::new(vec![worker, poller]),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Queue packages for installation, returning their task ids
    pub fn enqueue_install<I, P>(&self, paths: I) -> Result<Vec<Uuid>>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.queue.enqueue(paths)
    }

    /// Tasks accepted but not yet finished
    pub fn pending_installs(&self) -> usize {
        self.queue.pending()
    }

    /// Latest status published by the poller
    pub fn current_status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Wait until the poller publishes a status different from the last one seen
    pub async fn status_changed(&mut self) -> Option<ConnectionStatus> {
        self.status.changed().await.ok()?;
        Some(*self.status.borrow_and_update())
    }

    pub async fn device_display_name(&self, device: Option<&DeviceId>) -> Option<String> {
        self.registry.device_display_name(device).await
    }

    pub async fn list_devices(&self) -> (ConnectionStatus, Vec<DeviceId>) {
        self.registry.list_devices().await
    }

    pub async fn device_records(&self) -> Vec<DeviceRecord> {
        self.registry.device_records().await
    }

    /// Pin installs to one device, or clear the selection with `None`
    pub fn select_target(&self, device: Option<DeviceId>) {
        debug!(target_device = ?device, "Selecting install target");
        *self.target.write() = device;
    }

    pub fn selected_target(&self) -> Option<DeviceId> {
        self.target.read().clone()
    }

    /// Currently resolved ADB path
    pub fn bridge_path(&self) -> Option<PathBuf> {
        self.registry.locator().resolve()
    }

    /// Forget the memoized ADB path and search again
    pub fn recheck_bridge(&self) -> Option<PathBuf> {
        let locator = self.registry.locator();
        locator.invalidate();
        locator.resolve()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> EventSubscription {
        self.events.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop the worker and poller and wait for both to exit
    pub async fn shutdown(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        info!("Shutting down install session");
        self.cancel.cancel();

        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Background task ended abnormally: {}", e);
            }
        }

        self.events.emit(Event::Shutdown);
        info!("Install session stopped");
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    use apk_drop_bridge::testing::{fake_locator, missing_locator, ok, ScriptedRunner};
    use apk_drop_core::config::PollerConfig;
    use apk_drop_core::InstallError;

    const CONNECTED: &str = "List of devices attached\nABC123\tdevice\n";

    fn config() -> AppConfig {
        AppConfig {
            poller: PollerConfig { interval_ms: 10, backoff_ms: 10 },
            ..AppConfig::default()
        }
    }

    fn runner() -> Arc<ScriptedRunner> {
        Arc::new(ScriptedRunner::new(|args| match args {
            [a] if a == "version" => ok("Android Debug Bridge version 1.0.41\n"),
            [a] if a == "devices" => ok(CONNECTED),
            [_, _, _, _, prop] if prop == "ro.product.model" => ok("Pixel 7\n"),
            [_, _, _, _, prop] if prop == "ro.product.brand" => ok("google\n"),
            _ => ok("Success\n"),
        }))
    }

    async fn wait_for(events: &EventSubscription, matches: impl Fn(&Event) -> bool) -> Event {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match events.try_recv() {
                    Ok(event) if matches(&event) => return event,
                    Ok(_) => {}
                    Err(_) => tokio::time::sleep(Duration::from_millis(5)).await,
                }
            }
        })
        .await
        .expect("expected event did not arrive")
    }

    #[tokio::test]
    async fn test_status_reaches_caller() {
        let mut session = SessionManager::with_locator(config(), Arc::new(fake_locator()), runner());
        let events = session.subscribe();

        assert_eq!(session.status_changed().await, Some(ConnectionStatus::Connected));
        assert_eq!(session.current_status(), ConnectionStatus::Connected);
        wait_for(&events, |e| matches!(e, Event::StatusChanged(ConnectionStatus::Connected))).await;

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_install_through_session() {
        let dir = tempfile::tempdir().unwrap();
        let apk = dir.path().join("app.apk");
        fs::write(&apk, b"PK").unwrap();

        let runner = runner();
        let session = SessionManager::with_locator(config(), Arc::new(fake_locator()), runner.clone());
        let events = session.subscribe();

        let ids = session.enqueue_install([&apk]).unwrap();
        let completed = wait_for(&events, |e| matches!(e, Event::TaskCompleted { .. })).await;
        match completed {
            Event::TaskCompleted { id, path, result } => {
                assert_eq!(id, ids[0]);
                assert_eq!(path, apk);
                assert!(result.success);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(runner.max_install_concurrency(), 1);

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_device_queries() {
        let session = SessionManager::with_locator(config(), Arc::new(fake_locator()), runner());

        assert_eq!(session.device_display_name(None).await, Some("google Pixel 7".into()));
        let (status, devices) = session.list_devices().await;
        assert_eq!(status, ConnectionStatus::Connected);
        assert_eq!(devices, vec![DeviceId::new("ABC123")]);
        assert_eq!(session.device_records().await[0].display_name(), "google Pixel 7 (ABC123)");

        session.select_target(Some(DeviceId::new("ABC123")));
        assert_eq!(session.selected_target(), Some(DeviceId::new("ABC123")));
        session.select_target(None);
        assert_eq!(session.selected_target(), None);

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_bridge_recheck() {
        let session = SessionManager::with_locator(config(), Arc::new(fake_locator()), runner());
        assert_eq!(session.bridge_path(), Some(PathBuf::from("/fake/platform-tools/adb")));
        // The fake path does not exist, so a fresh search finds nothing
        assert_eq!(session.recheck_bridge(), None);
        session.shutdown().await;

        let missing = SessionManager::with_locator(config(), Arc::new(missing_locator()), runner());
        assert_eq!(missing.bridge_path(), None);
        missing.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_joins_and_rejects_new_work() {
        let session = SessionManager::with_locator(config(), Arc::new(fake_locator()), runner());
        let events = session.subscribe();

        session.shutdown().await;
        assert!(session.is_shutting_down());
        wait_for(&events, |e| matches!(e, Event::Shutdown)).await;

        let err = session.enqueue_install(["/tmp/app.apk"]).unwrap_err();
        assert!(matches!(err, InstallError::ShuttingDown));

        // Second shutdown is a no-op
        session.shutdown().await;
        assert!(events.drain().iter().all(|e| !matches!(e, Event::Shutdown)));
    }
}
