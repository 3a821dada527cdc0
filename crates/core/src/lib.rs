//! APK Drop Core - shared types
//!
//! Configuration, error taxonomy, connection/queue state and the event bus
//! used by the bridge and session crates.

pub mod config;
pub mod error;
pub mod events;
pub mod status;

pub use config::AppConfig;
pub use error::{InstallError, Result};
pub use events::{Event, EventBus, EventSubscription};
pub use status::{ConnectionStatus, InstallResult, QueueState};

/// APK Drop version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "APK Drop";
