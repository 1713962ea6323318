//! Compute CRDs

pub mod kubernetes_cluster;

pub use kubernetes_cluster::*;
