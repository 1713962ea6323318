//! # CRD Generator
//!
//! Prints every CloudOps CustomResourceDefinition as a multi-document YAML stream.
//!
//! ```bash
//! cargo run -p crds --bin crdgen > config/crd/cloudops.yaml
//! cargo run -p crds --bin crdgen | kubectl apply -f -
//! ```

use crds::{
    IamRole, InternetGateway, KubernetesCluster, ProviderConfig, RolePolicyAttachment, SecurityGroup, Subnet, Vpc,
};
use kube::core::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crds = [
        ProviderConfig::crd(),
        Vpc::crd(),
        Subnet::crd(),
        SecurityGroup::crd(),
        InternetGateway::crd(),
        IamRole::crd(),
        RolePolicyAttachment::crd(),
        KubernetesCluster::crd(),
    ];

    for crd in crds {
        print!("---\n{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}
