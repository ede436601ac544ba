pub mod checks;
pub mod config;
pub mod error;
pub mod mock;
pub mod net;

pub use crate::checks::server::{ServerWatcher, ServerWatcherCheckResult};
pub use crate::checks::{Watcher, WatcherCheckResult};
pub use crate::config::*;
pub use crate::error::*;
pub use crate::net::*;
