//! Per-pass context handed to the loop, the resolver and every adapter call

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::error::Interrupted;

/// Source of "now" for condition transition times
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Namespace and name of a managed resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    /// Key of `namespace/name`
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Clock, cancellation, deadline and tracing span for a single reconcile pass
#[derive(Debug, Clone)]
pub struct PassContext {
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    deadline: Instant,
    timeout: Duration,
    span: Span,
}

impl PassContext {
    /// Start a pass that must finish within `timeout`
    pub fn new(clock: Arc<dyn Clock>, cancel: CancellationToken, timeout: Duration, span: Span) -> Self {
        Self {
            clock,
            cancel,
            deadline: Instant::now() + timeout,
            timeout,
            span,
        }
    }

    /// Current time from the pass clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Shutdown was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token cancelled on shutdown
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Span every log line of the pass is recorded under
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Run `fut` unless the pass is cancelled or its deadline passes first
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        if self.cancel.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupted::Cancelled),
            res = tokio::time::timeout_at(self.deadline, fut) => res.map_err(|_| Interrupted::TimedOut(self.timeout)),
        }
    }
}
