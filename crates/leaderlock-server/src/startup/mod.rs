//! Process startup: logging, shutdown signalling, worker bootstrap and the
//! event-bus consumer

pub mod bootstrap;
pub mod events;
pub mod logging;
pub mod shutdown;

pub use bootstrap::{StoreConnection, Worker, open_store, start_worker};
pub use events::{dispatch_events, subscribe_events};
pub use logging::{LogRotation, LoggingConfig, LoggingGuard, init_logging};
pub use shutdown::{ShutdownSignal, wait_for_shutdown_signal};
