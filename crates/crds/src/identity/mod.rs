//! Identity CRDs (roles and policy attachments)

pub mod iam_role;
pub mod role_policy_attachment;

pub use iam_role::*;
pub use role_policy_attachment::*;
