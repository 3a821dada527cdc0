//! APK Drop Session
//!
//! Serialized install queue and connection status poller, tied together by
//! a [`SessionManager`].

pub mod manager;
pub mod poller;
pub mod queue;
pub mod task;

pub use manager::SessionManager;
pub use poller::StatusPoller;
pub use queue::{InstallQueue, SharedTarget};
pub use task::{validate_package, InstallTask};
