//! Install Queue
//!
//! FIFO queue drained by a single worker task, so at most one install
//! subprocess runs at any time.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use apk_drop_bridge::{DeviceId, DeviceRegistry};
use apk_drop_core::{ConnectionStatus, Event, EventBus, InstallError, InstallResult, QueueState, Result};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::task::InstallTask;

/// Caller-selected install target shared with the worker
pub type SharedTarget = Arc<RwLock<Option<DeviceId>>>;

/// Handle used to feed the install worker
pub struct InstallQueue {
    sender: mpsc::UnboundedSender<InstallTask>,
    pending: Arc<AtomicUsize>,
    events: Arc<EventBus>,
    cancel: CancellationToken,
}

impl InstallQueue {
    /// Spawn the worker on the current runtime
    pub fn spawn(
        registry: Arc<DeviceRegistry>,
        target: SharedTarget,
        events: Arc<EventBus>,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));

        let worker = Worker {
            executor: Executor { registry, target },
            events: Arc::clone(&events),
            pending: Arc::clone(&pending),
        };
        let handle = tokio::spawn(worker.run(receiver, cancel.clone()));

        (Self { sender, pending, events, cancel }, handle)
    }

    /// Append one task per path, in order. Never waits for the worker.
    pub fn enqueue<I, P>(&self, paths: I) -> Result<Vec<Uuid>>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        if self.cancel.is_cancelled() {
            return Err(InstallError::ShuttingDown);
        }

        let tasks: Vec<InstallTask> = paths.into_iter().map(InstallTask::new).collect();
        let ids: Vec<Uuid> = tasks.iter().map(|task| task.id).collect();

        // Count the whole batch before the worker can see any of it
        self.pending.fetch_add(tasks.len(), Ordering::SeqCst);
        let total = tasks.len();
        for (sent, task) in tasks.into_iter().enumerate() {
            debug!(task = %task.id, path = %task.path.display(), "Queueing install");
            if self.sender.send(task).is_err() {
                self.pending.fetch_sub(total - sent, Ordering::SeqCst);
                return Err(InstallError::ShuttingDown);
            }
        }

        if !ids.is_empty() {
            info!("{} tasks queued", ids.len());
            self.events.emit(Event::TasksQueued { count: ids.len() });
        }
        Ok(ids)
    }

    /// Tasks accepted but not yet finished
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

struct Worker {
    executor: Executor,
    events: Arc<EventBus>,
    pending: Arc<AtomicUsize>,
}

impl Worker {
    async fn run(self, mut receiver: mpsc::UnboundedReceiver<InstallTask>, cancel: CancellationToken) {
        info!("Install worker started");

        loop {
            let task = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                task = receiver.recv() => match task {
                    Some(task) => task,
                    None => break,
                },
            };

            self.events.emit(Event::TaskStarted {
                id: task.id,
                path: task.path.clone(),
            });

            // A panicking install only fails its own task
            let executor = self.executor.clone();
            let spawned = task.clone();
            let outcome = tokio::spawn(async move { executor.execute(&spawned).await }).await;

            let result = match outcome {
                Ok(Ok(message)) => {
                    info!(task = %task.id, path = %task.path.display(), "{}", message);
                    InstallResult::success(message)
                }
                Ok(Err(e)) => {
                    error!(task = %task.id, path = %task.path.display(), "Install failed: {}", e);
                    InstallResult::from(&e)
                }
                Err(e) => {
                    error!(task = %task.id, path = %task.path.display(), "Install task faulted: {}", e);
                    InstallResult::failure("Installation failed: internal error")
                }
            };

            self.events.emit(Event::TaskCompleted {
                id: task.id,
                path: task.path,
                result,
            });

            let remaining = self.pending.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
            self.events.emit(Event::QueueStatus(QueueState::from_remaining(remaining)));
        }

        receiver.close();
        let mut dropped = 0;
        while receiver.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            self.pending.fetch_sub(dropped, Ordering::SeqCst);
            info!("Dropped {} queued installs", dropped);
        }

        info!("Install worker stopped");
    }
}

/// Per-task install logic, cloned into each spawned task
#[derive(Clone)]
struct Executor {
    registry: Arc<DeviceRegistry>,
    target: SharedTarget,
}

impl Executor {
    async fn execute(&self, task: &InstallTask) -> Result<String> {
        task.validate()?;

        let (status, devices) = self.registry.list_devices().await;
        match status {
            ConnectionStatus::Connected => {}
            ConnectionStatus::Disconnected => return Err(InstallError::DeviceDisconnected),
            ConnectionStatus::BridgeError => return Err(InstallError::BridgeUnavailable),
        }

        let target = self.choose_target(devices)?;
        self.registry.install(Some(&target), &task.path).await
    }

    fn choose_target(&self, mut devices: Vec<DeviceId>) -> Result<DeviceId> {
        if let Some(selected) = self.target.read().clone() {
            return if devices.contains(&selected) {
                Ok(selected)
            } else {
                Err(InstallError::DeviceDisconnected)
            };
        }

        match devices.len() {
            0 => Err(InstallError::DeviceDisconnected),
            1 => Ok(devices.remove(0)),
            n => Err(InstallError::AmbiguousTarget(n)),
        }
    }
}
