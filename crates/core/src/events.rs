//! Event System
//!
//! Pub/sub bus carrying status changes and install results back to the caller.

use std::fmt;
use std::path::PathBuf;
use parking_lot::RwLock;
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::debug;
use uuid::Uuid;

use crate::status::{ConnectionStatus, InstallResult, QueueState};

/// Events emitted by the session
#[derive(Debug, Clone)]
pub enum Event {
    /// Connection status differs from the previous probe
    StatusChanged(ConnectionStatus),
    /// A batch of install tasks was accepted
    TasksQueued { count: usize },
    /// Worker picked up a task
    TaskStarted { id: Uuid, path: PathBuf },
    /// Worker finished a task
    TaskCompleted { id: Uuid, path: PathBuf, result: InstallResult },
    /// Queue depth refresh after each task
    QueueStatus(QueueState),
    /// Application shutdown
    Shutdown,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::StatusChanged(status) => write!(f, "{}", status),
            Event::TasksQueued { count } => write!(f, "{} tasks queued", count),
            Event::TaskStarted { path, .. } => write!(f, "Installing {}", path.display()),
            Event::TaskCompleted { path, result, .. } => {
                let verdict = if result.success { "installed" } else { "failed" };
                write!(f, "{} {}: {}", path.display(), verdict, result.message)
            }
            Event::QueueStatus(state) => write!(f, "{}", state),
            Event::Shutdown => f.write_str("shutting down"),
        }
    }
}

/// Subscriber handle for receiving events
#[derive(Clone)]
pub struct EventSubscription {
    receiver: Receiver<Event>,
}

impl EventSubscription {
    /// Receive the next event (blocking)
    pub fn recv(&self) -> Result<Event, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Receive the next event, giving up after `timeout`
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<Event, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv(&self) -> Result<Event, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Get an iterator over events
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.receiver.iter()
    }

    /// Drain everything currently buffered
    pub fn drain(&self) -> Vec<Event> {
        self.receiver.try_iter().collect()
    }
}

/// Event bus for publish/subscribe pattern
pub struct EventBus {
    subscribers: RwLock<Vec<Sender<Event>>>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> EventSubscription {
        let (sender, receiver) = unbounded();
        self.subscribers.write().push(sender);
        EventSubscription { receiver }
    }

    /// Emit an event to all subscribers, dropping the ones that went away
    pub fn emit(&self, event: Event) -> usize {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
        let delivered = subscribers.len();

        debug!("Event {:?} delivered to {} subscribers", event, delivered);
        delivered
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_bus() {
        let bus = EventBus::new();
        let sub1 = bus.subscribe();
        let sub2 = bus.subscribe();

        assert_eq!(bus.subscriber_count(), 2);

        let delivered = bus.emit(Event::TasksQueued { count: 2 });
        assert_eq!(delivered, 2);

        assert!(sub1.try_recv().is_ok());
        assert!(sub2.try_recv().is_ok());
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let bus = EventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        assert_eq!(bus.emit(Event::Shutdown), 1);
        assert_eq!(bus.subscriber_count(), 1);
        assert!(matches!(kept.try_recv(), Ok(Event::Shutdown)));
    }

    #[test]
    fn test_event_text() {
        assert_eq!(Event::TasksQueued { count: 3 }.to_string(), "3 tasks queued");
        assert_eq!(Event::QueueStatus(QueueState::Empty).to_string(), "queue empty");
        assert_eq!(
            Event::StatusChanged(ConnectionStatus::Connected).to_string(),
            "Device connected"
        );
    }
}
