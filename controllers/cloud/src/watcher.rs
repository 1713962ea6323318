//! Kubernetes resource watchers.
//!
//! Every managed kind runs through the generic [`watch_resource`] helper: a
//! `kube_runtime::Controller` that hands each changed object to the kind's
//! [`ManagedReconciler`] and turns its [`Requeue`] decision into an [`Action`].
//!
//! Passes that fail to record their outcome are retried with a per-object
//! Fibonacci backoff, reset by the next successful pass.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::controller::{Action, Config as RuntimeConfig};
use kube_runtime::{Controller, watcher};
use managed_runtime::{ManagedReconciler, ObjectKey, PassContext, Requeue, RequeuePolicy, SystemClock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn};

use crate::adapters::CloudKind;
use crate::backoff::FibonacciBackoff;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics;

/// State shared by every reconcile of one kind
pub struct WatchContext<K: CloudKind> {
    reconciler: Arc<ManagedReconciler<K>>,
    backoff: Mutex<HashMap<ObjectKey, FibonacciBackoff>>,
    pass_timeout: Duration,
    shutdown: CancellationToken,
}

impl<K: CloudKind> WatchContext<K> {
    /// Context for one kind's watcher
    pub fn new(reconciler: Arc<ManagedReconciler<K>>, pass_timeout: Duration, shutdown: CancellationToken) -> Self {
        Self {
            reconciler,
            backoff: Mutex::new(HashMap::new()),
            pass_timeout,
            shutdown,
        }
    }

    /// Successful pass: restart the object's backoff, or forget it once nothing is queued
    fn reset_backoff(&self, key: &ObjectKey, requeue: Requeue) {
        let mut backoff = self.backoff.lock().unwrap_or_else(PoisonError::into_inner);
        if requeue == Requeue::Never {
            backoff.remove(key);
        } else if let Some(entry) = backoff.get_mut(key) {
            entry.reset();
        }
    }

    fn next_backoff(&self, key: &ObjectKey) -> Duration {
        self.backoff
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .next_backoff()
    }
}

fn key_of<K: CloudKind>(resource: &K) -> ObjectKey {
    ObjectKey::new(&resource.namespace().unwrap_or_default(), &resource.name_any())
}

/// Scheduler action for a requeue decision, with the reason label counted for it
pub fn requeue_action(requeue: Requeue, policy: RequeuePolicy) -> (Action, &'static str) {
    match requeue {
        Requeue::After(wait) => {
            let reason = if wait >= policy.long_wait { "long" } else { "short" };
            (Action::requeue(wait), reason)
        }
        Requeue::Immediately => (Action::requeue(Duration::ZERO), "immediate"),
        Requeue::Never => (Action::await_change(), "never"),
    }
}

async fn reconcile<K: CloudKind>(resource: Arc<K>, ctx: Arc<WatchContext<K>>) -> Result<Action, ControllerError> {
    let kind = K::kind(&());
    let key = key_of(resource.as_ref());
    metrics::increment_reconciliations(&kind);

    let span = info_span!("reconcile", kind = %kind, namespace = %key.namespace, name = %key.name);
    let pass = PassContext::new(Arc::new(SystemClock), ctx.shutdown.child_token(), ctx.pass_timeout, span);

    debug!("Reconciling {} {}", kind, key);
    match ctx.reconciler.reconcile(&pass, &key).await {
        Ok(requeue) => {
            ctx.reset_backoff(&key, requeue);
            let (action, reason) = requeue_action(requeue, ctx.reconciler.policy());
            metrics::increment_requeues(&kind, reason);
            Ok(action)
        }
        Err(e) => {
            metrics::increment_reconcile_errors(&kind);
            Err(e.into())
        }
    }
}

fn error_policy<K: CloudKind>(resource: Arc<K>, error: &ControllerError, ctx: Arc<WatchContext<K>>) -> Action {
    let kind = K::kind(&());
    let key = key_of(resource.as_ref());
    let wait = ctx.next_backoff(&key);
    error!("Reconciliation error for {} {}: {} (retrying in {:?})", kind, key, error, wait);
    metrics::increment_requeues(&kind, "backoff");
    Action::requeue(wait)
}

/// Watch one managed kind until shutdown
///
/// Returns an error if the watch stream ends on its own.
pub async fn watch_resource<K: CloudKind>(
    api: Api<K>,
    reconciler: Arc<ManagedReconciler<K>>,
    config: &ControllerConfig,
    shutdown: CancellationToken,
) -> Result<(), ControllerError> {
    let kind = K::kind(&()).to_string();
    info!("Starting {} watcher", kind);

    let context = Arc::new(WatchContext::new(reconciler, config.pass_timeout, shutdown.clone()));
    // Debounce batches the status writes of a pass into one follow-up event
    let runtime_config = RuntimeConfig::default()
        .debounce(Duration::from_secs(1))
        .concurrency(config.concurrency);

    let stream_kind = kind.clone();
    let controller = Controller::new(api, watcher::Config::default())
        .with_config(runtime_config)
        .run(reconcile::<K>, error_policy::<K>, context)
        .for_each(move |res| {
            let kind = stream_kind.clone();
            async move {
                match res {
                    Ok((object, _)) => debug!("Reconciled {} {}", kind, object.name),
                    Err(e) => warn!("Controller error for {}: {}", kind, e),
                }
            }
        });

    tokio::select! {
        () = controller => {
            error!("{} watch stream ended", kind);
            Err(ControllerError::Watch(format!("{kind} watch stream ended")))
        }
        () = shutdown.cancelled() => {
            info!("Stopped {} watcher", kind);
            Ok(())
        }
    }
}
