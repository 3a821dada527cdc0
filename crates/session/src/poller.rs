//! Status Poller
//!
//! Periodically re-derives the connection status and reports changes.

use std::sync::Arc;
use std::time::Duration;

use apk_drop_bridge::DeviceRegistry;
use apk_drop_core::{ConnectionStatus, Event, EventBus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Background connection status poller
pub struct StatusPoller {
    registry: Arc<DeviceRegistry>,
    events: Arc<EventBus>,
    interval: Duration,
    backoff: Duration,
}

impl StatusPoller {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        events: Arc<EventBus>,
        interval: Duration,
        backoff: Duration,
    ) -> Self {
        Self { registry, events, interval, backoff }
    }

    /// Start polling on the current runtime.
    ///
    /// The returned receiver always holds the latest status, `Disconnected`
    /// until the first probe completes.
    pub fn spawn(self, cancel: CancellationToken) -> (watch::Receiver<ConnectionStatus>, JoinHandle<()>) {
        let (sender, receiver) = watch::channel(ConnectionStatus::default());
        let handle = tokio::spawn(self.run(sender, cancel));
        (receiver, handle)
    }

    async fn run(self, sender: watch::Sender<ConnectionStatus>, cancel: CancellationToken) {
        info!(interval = ?self.interval, "Status poller started");
        let mut last: Option<ConnectionStatus> = None;

        loop {
            // A panicking probe only costs one tick
            let registry = Arc::clone(&self.registry);
            let mut probe = tokio::spawn(async move { registry.list_devices().await.0 });

            let delay = tokio::select! {
                _ = cancel.cancelled() => {
                    probe.abort();
                    break;
                }
                probed = &mut probe => match probed {
                    Ok(status) => {
                        if last != Some(status) {
                            info!(previous = ?last, current = %status, "Connection status changed");
                            last = Some(status);
                            sender.send_replace(status);
                            self.events.emit(Event::StatusChanged(status));
                        } else {
                            debug!(status = %status, "Connection status unchanged");
                        }
                        self.interval
                    }
                    Err(e) => {
                        warn!("Status probe failed, backing off: {}", e);
                        self.backoff
                    }
                },
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Status poller stopped");
    }
}
