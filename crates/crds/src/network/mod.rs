//! Network CRDs (VPCs, subnets, security groups and internet gateways)

pub mod vpc;
pub mod subnet;
pub mod security_group;
pub mod internet_gateway;

pub use vpc::*;
pub use subnet::*;
pub use security_group::*;
pub use internet_gateway::*;
