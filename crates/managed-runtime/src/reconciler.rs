//! The reconcile loop for managed resources
//!
//! One call to [`ManagedReconciler::reconcile`] is one pass over one resource:
//!
//! 1. fetch (gone means done)
//! 2. connect to the provider
//! 3. deletion: delete externally (unless retained), unpublish, drop the finalizer
//! 4. add the finalizer before anything external is created
//! 5. resolve attribute references; blocked means short requeue, nothing else.
//!    Newly resolved values are written back before anything is provisioned.
//! 6. observe, then create, update or confirm availability
//!
//! Every branch ends by writing the resource back. Only persistence failures and
//! cancellation are returned as errors; everything else becomes a condition plus a
//! [`Requeue`] decision.

use std::future::Future;
use std::sync::Arc;

use crds::{Condition, ConditionType, Managed, ReclaimPolicy};
use kube::{Resource, ResourceExt};
use tracing::{Instrument, debug, info, warn};

use crate::context::{ObjectKey, PassContext};
use crate::error::{ExternalError, Interrupted, ReconcileError, ResolveError};
use crate::external::{ConnectionDetails, ExternalClient, ExternalConnecter};
use crate::publisher::{ConnectionPublisher, PublishTarget};
use crate::requeue::{Requeue, RequeuePolicy};
use crate::resolver::{ReferenceResolver, Resolution};
use crate::store::ManagedStore;

/// Finalizer guarding external resources of every managed kind
pub const FINALIZER: &str = "finalizer.managed.cloudops.microscaler.io";

/// Run an adapter call under the pass's cancellation and deadline
async fn guarded<T, F>(ctx: &PassContext, fut: F) -> Result<T, ExternalError>
where
    F: Future<Output = Result<T, ExternalError>>,
{
    ctx.guard(fut).await.map_err(ExternalError::from)?
}

fn has_finalizer<K: Managed>(resource: &K) -> bool {
    resource.finalizers().iter().any(|f| f == FINALIZER)
}

/// Reconciles managed resources of kind `K`
pub struct ManagedReconciler<K: Managed> {
    store: Arc<dyn ManagedStore<K>>,
    connecter: Arc<dyn ExternalConnecter<K>>,
    resolver: ReferenceResolver,
    publisher: Arc<dyn ConnectionPublisher>,
    policy: RequeuePolicy,
}

impl<K: Managed> ManagedReconciler<K> {
    /// Reconciler over the given collaborators
    pub fn new(
        store: Arc<dyn ManagedStore<K>>,
        connecter: Arc<dyn ExternalConnecter<K>>,
        resolver: ReferenceResolver,
        publisher: Arc<dyn ConnectionPublisher>,
        policy: RequeuePolicy,
    ) -> Self {
        Self {
            store,
            connecter,
            resolver,
            publisher,
            policy,
        }
    }

    /// Requeue intervals used by this reconciler
    pub fn policy(&self) -> RequeuePolicy {
        self.policy
    }

    /// Run one reconcile pass for the resource identified by `key`
    pub async fn reconcile(&self, ctx: &PassContext, key: &ObjectKey) -> Result<Requeue, ReconcileError> {
        self.reconcile_pass(ctx, key).instrument(ctx.span().clone()).await
    }

    async fn reconcile_pass(&self, ctx: &PassContext, key: &ObjectKey) -> Result<Requeue, ReconcileError> {
        let kind = K::kind(&());
        let fetched = ctx.guard(self.store.get(key)).await?.map_err(ReconcileError::Fetch)?;
        let Some(mut original) = fetched else {
            debug!("{} {} no longer exists", kind, key);
            return Ok(Requeue::Never);
        };
        let mut resource = original.clone();

        let client = match guarded(ctx, self.connecter.connect(ctx, &resource)).await {
            Ok(client) => client,
            Err(err) => {
                if err.is_cancelled() {
                    return Err(Interrupted::Cancelled.into());
                }
                warn!("Failed to connect for {} {}: {}", kind, key, err);
                resource.conditions_mut().set(Condition::reconcile_error(ctx.now(), &err));
                self.persist(ctx, &original, &resource).await?;
                return Ok(self.policy.short());
            }
        };

        if resource.meta().deletion_timestamp.is_some() {
            return self.finalize(ctx, key, &original, resource, client.as_ref()).await;
        }

        if !has_finalizer(&resource) {
            resource.finalizers_mut().push(FINALIZER.to_string());
            original = self.persist(ctx, &original, &resource).await?;
            resource = original.clone();
        }

        match self.resolver.resolve(ctx, &mut resource).await {
            Ok(Resolution::Blocked(outcomes)) => {
                let namespace = resource.namespace().unwrap_or_default();
                let message = Resolution::blocked_message(&outcomes, &namespace);
                info!("{} {} waiting on references: {}", kind, key, message);
                resource
                    .conditions_mut()
                    .set(Condition::reference_resolution_blocked(ctx.now(), message));
                self.persist(ctx, &original, &resource).await?;
                return Ok(self.policy.short());
            }
            Ok(Resolution::Resolved(count)) => {
                info!("Resolved {} reference(s) for {} {}", count, kind, key);
                resource
                    .conditions_mut()
                    .set(Condition::reference_resolution_success(ctx.now()));
                original = self.persist(ctx, &original, &resource).await?;
                resource = original.clone();
            }
            Ok(Resolution::AlreadyResolved) => {
                if !resource.resource_spec().references.is_empty()
                    && !resource.condition_is_true(ConditionType::ReferencesResolved)
                {
                    resource
                        .conditions_mut()
                        .set(Condition::reference_resolution_success(ctx.now()));
                }
            }
            Err(ResolveError::Interrupted(Interrupted::Cancelled)) => {
                return Err(Interrupted::Cancelled.into());
            }
            Err(err) => {
                warn!("Failed to resolve references for {} {}: {}", kind, key, err);
                resource.conditions_mut().set(Condition::reconcile_error(ctx.now(), &err));
                self.persist(ctx, &original, &resource).await?;
                return Ok(self.policy.short());
            }
        }

        let observation = match guarded(ctx, client.observe(ctx, &mut resource)).await {
            Ok(observation) => observation,
            Err(err) => return self.external_failure(ctx, key, &original, resource, err, "observe").await,
        };

        if !observation.resource_exists {
            info!("Creating external resource for {} {}", kind, key);
            let creation = match guarded(ctx, client.create(ctx, &mut resource)).await {
                Ok(creation) => creation,
                Err(err) => return self.external_failure(ctx, key, &original, resource, err, "create").await,
            };
            return self
                .finish_progress(ctx, key, &original, resource, &creation.connection_details)
                .await;
        }

        if !observation.resource_up_to_date {
            info!("Updating external resource for {} {}", kind, key);
            let update = match guarded(ctx, client.update(ctx, &mut resource)).await {
                Ok(update) => update,
                Err(err) => return self.external_failure(ctx, key, &original, resource, err, "update").await,
            };
            return self
                .finish_progress(ctx, key, &original, resource, &update.connection_details)
                .await;
        }

        // Up to date: publish, then mark available
        if let Err(err) = self.publish(ctx, &resource, &observation.connection_details).await? {
            warn!("Failed to publish connection details for {} {}: {}", kind, key, err);
            resource.conditions_mut().set(Condition::reconcile_error(ctx.now(), &err));
            self.persist(ctx, &original, &resource).await?;
            return Ok(self.policy.short());
        }
        let now = ctx.now();
        resource
            .conditions_mut()
            .set_all([Condition::available(now), Condition::reconcile_success(now)]);
        self.persist(ctx, &original, &resource).await?;
        debug!("{} {} is up to date", kind, key);
        Ok(self.policy.long())
    }

    /// Deletion branch, entered regardless of reference state
    async fn finalize(
        &self,
        ctx: &PassContext,
        key: &ObjectKey,
        original: &K,
        mut resource: K,
        client: &dyn ExternalClient<K>,
    ) -> Result<Requeue, ReconcileError> {
        let kind = K::kind(&());
        if !has_finalizer(&resource) {
            return Ok(Requeue::Never);
        }

        resource.conditions_mut().set(Condition::deleting(ctx.now()));
        match resource.resource_spec().reclaim_policy {
            ReclaimPolicy::Delete => {
                if let Err(err) = guarded(ctx, client.delete(ctx, &mut resource)).await {
                    if err.is_cancelled() {
                        return Err(Interrupted::Cancelled.into());
                    }
                    warn!("Failed to delete external resource for {} {}: {}", kind, key, err);
                    resource.conditions_mut().set(Condition::reconcile_error(ctx.now(), &err));
                    self.persist(ctx, original, &resource).await?;
                    return Ok(self.policy.short());
                }
                info!("Deleted external resource for {} {}", kind, key);
            }
            ReclaimPolicy::Retain => {
                info!("Retaining external resource for {} {}", kind, key);
            }
        }

        if let Some(target) = PublishTarget::for_resource(&resource) {
            if let Err(err) = ctx.guard(self.publisher.unpublish(&target)).await? {
                warn!("Failed to unpublish connection secret for {} {}: {}", kind, key, err);
            }
        }

        resource.finalizers_mut().retain(|f| f != FINALIZER);
        resource.conditions_mut().set(Condition::reconcile_success(ctx.now()));
        self.persist(ctx, original, &resource).await?;
        Ok(Requeue::Never)
    }

    /// After a successful create or update: publish any details and wait for the next observation
    async fn finish_progress(
        &self,
        ctx: &PassContext,
        key: &ObjectKey,
        original: &K,
        mut resource: K,
        details: &ConnectionDetails,
    ) -> Result<Requeue, ReconcileError> {
        if let Err(err) = self.publish(ctx, &resource, details).await? {
            warn!("Failed to publish connection details for {} {}: {}", K::kind(&()), key, err);
            resource.conditions_mut().set(Condition::reconcile_error(ctx.now(), &err));
        } else {
            resource.conditions_mut().set(Condition::reconcile_success(ctx.now()));
        }
        self.persist(ctx, original, &resource).await?;
        Ok(self.policy.short())
    }

    async fn external_failure(
        &self,
        ctx: &PassContext,
        key: &ObjectKey,
        original: &K,
        mut resource: K,
        err: ExternalError,
        operation: &str,
    ) -> Result<Requeue, ReconcileError> {
        if err.is_cancelled() {
            return Err(Interrupted::Cancelled.into());
        }
        resource.conditions_mut().set(Condition::reconcile_error(ctx.now(), &err));
        self.persist(ctx, original, &resource).await?;
        if err.is_terminal() {
            warn!("{} of {} {} rejected, waiting for a spec change: {}", operation, K::kind(&()), key, err);
            Ok(Requeue::Never)
        } else {
            warn!("{} of {} {} failed: {}", operation, K::kind(&()), key, err);
            Ok(self.policy.short())
        }
    }

    async fn publish(
        &self,
        ctx: &PassContext,
        resource: &K,
        details: &ConnectionDetails,
    ) -> Result<Result<(), crate::error::PublishError>, Interrupted> {
        if details.is_empty() {
            return Ok(Ok(()));
        }
        match PublishTarget::for_resource(resource) {
            Some(target) => ctx.guard(self.publisher.publish(&target, details)).await,
            None => Ok(Ok(())),
        }
    }

    /// Write back; a cancelled pass writes nothing
    async fn persist(&self, ctx: &PassContext, original: &K, updated: &K) -> Result<K, ReconcileError> {
        if ctx.is_cancelled() {
            return Err(Interrupted::Cancelled.into());
        }
        self.store.update(original, updated).await.map_err(ReconcileError::Persist)
    }
}

#[cfg(test)]
#[path = "reconciler_test.rs"]
mod reconciler_test;
