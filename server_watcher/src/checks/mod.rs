use async_trait::async_trait;
use std::fmt;

use crate::error::WatcherError;

pub mod server;

/// Result of a single watcher run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherCheckResult {
    watcher_name: String,
    watcher_type: &'static str,
    is_valid: bool,
    description: String,
}

impl WatcherCheckResult {
    pub fn valid(
        watcher_name: impl Into<String>,
        watcher_type: &'static str,
        description: impl Into<String>,
    ) -> Self {
        Self {
            watcher_name: watcher_name.into(),
            watcher_type,
            is_valid: true,
            description: description.into(),
        }
    }

    pub fn invalid(
        watcher_name: impl Into<String>,
        watcher_type: &'static str,
        description: impl Into<String>,
    ) -> Self {
        Self {
            watcher_name: watcher_name.into(),
            watcher_type,
            is_valid: false,
            description: description.into(),
        }
    }

    pub fn watcher_name(&self) -> &str {
        &self.watcher_name
    }

    /// Kind of watcher that produced this result, e.g. `server`
    pub fn watcher_type(&self) -> &'static str {
        self.watcher_type
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Human-readable explanation. Consumers classify failures by its prefix.
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Display for WatcherCheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.watcher_name, self.description)
    }
}

/// A named check executed by an external scheduler
#[async_trait]
pub trait Watcher: Send + Sync {
    fn name(&self) -> &str;

    /// Run the check once.
    ///
    /// An unreachable target is an `Ok` result with `is_valid() == false`; `Err` is
    /// reserved for setup defects.
    async fn execute(&self) -> Result<WatcherCheckResult, WatcherError>;
}
