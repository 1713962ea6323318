//! Requeue decisions handed back to the scheduler

use std::time::Duration;

/// What the scheduler should do after a pass. The loop never sleeps itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    After(Duration),
    Immediately,
    Never,
}

/// Wait times used by the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequeuePolicy {
    /// After blocked references, transient failures and in-progress provisioning
    pub short_wait: Duration,
    /// After an up-to-date observation
    pub long_wait: Duration,
}

impl Default for RequeuePolicy {
    fn default() -> Self {
        Self {
            short_wait: Duration::from_secs(30),
            long_wait: Duration::from_secs(60),
        }
    }
}

impl RequeuePolicy {
    /// Requeue while waiting on the provider or after a recoverable error
    pub fn short(&self) -> Requeue {
        Requeue::After(self.short_wait)
    }

    /// Requeue for drift detection once the resource is up to date
    pub fn long(&self) -> Requeue {
        Requeue::After(self.long_wait)
    }
}
