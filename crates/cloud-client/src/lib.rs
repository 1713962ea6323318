//! Cloud Provider Gateway Client
//!
//! A Rust client for the cloud provider REST gateway used by the CloudOps controllers.
//! Operations are split into three traits so adapters only depend on what they use:
//!
//! - [`NetworkClientTrait`]: VPCs, subnets, security groups, internet gateways
//! - [`IdentityClientTrait`]: roles and policy attachments
//! - [`ComputeClientTrait`]: managed Kubernetes clusters and worker pools
//!
//! [`CloudClientTrait`] bundles all three and is what controllers hold.
//!
//! # Example
//!
//! ```no_run
//! use cloud_client::{CloudClient, CloudCredentials, IdentityClientTrait};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let creds = CloudCredentials::parse(br#"{"accessKeyId":"AKID","secretAccessKey":"secret"}"#)?;
//! let client = CloudClient::new("https://gateway.example.com", "us-west-2", &creds)?;
//! let policies = client.list_attached_role_policies("my-role").await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod common;
pub mod credentials;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod cloud_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::CloudClient;
pub use common::HttpClient;
pub use credentials::CloudCredentials;
pub use error::CloudError;
pub use models::*;
pub use cloud_trait::{CloudClientTrait, ComputeClientTrait, IdentityClientTrait, NetworkClientTrait};
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockCloudClient;
