//! Managed Resource Runtime
//!
//! The reconcile loop shared by every CloudOps managed kind, and the pieces it
//! drives: the attribute reference resolver, the external client adapter boundary,
//! connection secret publishing, persistence and credentials lookup.
//!
//! Kinds plug in by implementing [`ExternalConnecter`] and [`ExternalClient`];
//! everything else is generic over [`crds::Managed`].

pub mod context;
pub mod credentials;
pub mod error;
pub mod external;
pub mod publisher;
pub mod reconciler;
pub mod requeue;
pub mod resolver;
pub mod store;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use context::{Clock, ObjectKey, PassContext, SystemClock};
pub use credentials::{CredentialsReader, KubeCredentialsReader, ProviderCredentials};
pub use error::{CredentialsError, ExternalError, Interrupted, PublishError, ReconcileError, ResolveError, StoreError};
pub use external::{ConnectionDetails, ExternalClient, ExternalConnecter, ExternalCreation, ExternalObservation, ExternalUpdate};
pub use publisher::{ConnectionPublisher, PublishTarget, SecretPublisher};
pub use reconciler::{FINALIZER, ManagedReconciler};
pub use requeue::{Requeue, RequeuePolicy};
pub use resolver::{KubeReferenceReader, ReferenceOutcome, ReferenceReader, ReferenceResolver, ReferenceStatus, Resolution};
pub use store::{KubeStore, ManagedStore};
