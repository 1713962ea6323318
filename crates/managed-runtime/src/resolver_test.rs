use super::*;
use crate::testing::{StaticReferenceReader, fixed_time, test_context};
use crds::{
    Condition, Conditions, KubernetesCluster, KubernetesClusterSpec, ResourceSpec, SecurityGroup, SecurityGroupSpec,
    SecurityGroupStatus, Subnet, SubnetSpec, Vpc, VpcSpec, VpcStatus, WorkerNodesSpec,
};
use serde_json::json;

fn vpc(name: &str, ready: bool, vpc_id: Option<&str>) -> Vpc {
    let mut vpc = Vpc::new(
        name,
        VpcSpec {
            resource: ResourceSpec::with_provider("default"),
            cidr_block: "10.0.0.0/16".to_string(),
            enable_dns_support: None,
        },
    );
    vpc.metadata.namespace = Some("default".to_string());
    vpc.status = Some(VpcStatus {
        vpc_id: vpc_id.map(str::to_string),
        state: None,
        conditions: Conditions::default(),
    });
    if ready {
        vpc.conditions_mut().set(Condition::available(fixed_time()));
    }
    vpc
}

fn security_group(name: &str, group_id: &str) -> SecurityGroup {
    let mut sg = SecurityGroup::new(
        name,
        SecurityGroupSpec {
            resource: ResourceSpec::with_provider("default"),
            group_name: name.to_string(),
            description: "test".to_string(),
            vpc_id: None,
        },
    );
    sg.metadata.namespace = Some("default".to_string());
    sg.status = Some(SecurityGroupStatus {
        security_group_id: Some(group_id.to_string()),
        conditions: Conditions::default(),
    });
    sg.conditions_mut().set(Condition::available(fixed_time()));
    sg
}

fn subnet_referencing(vpc_name: &str) -> Subnet {
    let mut resource = ResourceSpec::with_provider("default");
    resource.references = vec![AttributeReference::new("vpcId", "Vpc", vpc_name, "status.vpcId")];
    let mut subnet = Subnet::new(
        "subnet-a",
        SubnetSpec {
            resource,
            cidr_block: "10.0.1.0/24".to_string(),
            availability_zone: "us-west-2a".to_string(),
            vpc_id: None,
        },
    );
    subnet.metadata.namespace = Some("default".to_string());
    subnet
}

fn cluster_with_references(references: Vec<AttributeReference>) -> KubernetesCluster {
    let mut resource = ResourceSpec::with_provider("default");
    resource.references = references;
    let mut cluster = KubernetesCluster::new(
        "cluster",
        KubernetesClusterSpec {
            resource,
            region: "us-west-2".to_string(),
            role_arn: Some("arn:aws:iam::123:role/eks".to_string()),
            vpc_id: None,
            subnet_ids: vec![],
            security_group_ids: vec![],
            cluster_version: None,
            worker_nodes: WorkerNodesSpec {
                instance_type: "m5.large".to_string(),
                min_size: None,
                max_size: None,
                volume_size: None,
                node_image_id: None,
                key_name: None,
                bootstrap_arguments: None,
                cluster_control_plane_security_group: None,
            },
            map_roles: vec![],
            map_users: vec![],
        },
    );
    cluster.metadata.namespace = Some("default".to_string());
    cluster
}

fn resolver(reader: &Arc<StaticReferenceReader>) -> ReferenceResolver {
    ReferenceResolver::new(reader.clone())
}

#[tokio::test]
async fn test_no_references_is_already_resolved() {
    let reader = Arc::new(StaticReferenceReader::new());
    let (ctx, _) = test_context();
    let mut vpc = vpc("main", false, None);

    let res = resolver(&reader).resolve(&ctx, &mut vpc).await.unwrap();

    assert_eq!(res, Resolution::AlreadyResolved);
    assert!(reader.reads().is_empty());
}

#[tokio::test]
async fn test_missing_target_blocks_with_not_found() {
    let reader = Arc::new(StaticReferenceReader::new());
    let (ctx, _) = test_context();
    let mut subnet = subnet_referencing("main");

    let res = resolver(&reader).resolve(&ctx, &mut subnet).await.unwrap();

    match res {
        Resolution::Blocked(outcomes) => {
            assert_eq!(outcomes.len(), 1);
            assert_eq!(outcomes[0].status, ReferenceStatus::NotFound);
            assert_eq!(
                Resolution::blocked_message(&outcomes, "default"),
                "Vpc/default/main is NotFound"
            );
        }
        other => panic!("expected Blocked, got {other:?}"),
    }
    assert!(subnet.spec.vpc_id.is_none());
}

#[tokio::test]
async fn test_target_not_ready_leaves_field_empty() {
    let reader = Arc::new(StaticReferenceReader::new());
    reader.insert(&vpc("main", false, Some("vpc-123")));
    let (ctx, _) = test_context();
    let mut subnet = subnet_referencing("main");

    let res = resolver(&reader).resolve(&ctx, &mut subnet).await.unwrap();

    assert!(matches!(&res, Resolution::Blocked(o) if o[0].status == ReferenceStatus::NotReady));
    assert!(subnet.spec.vpc_id.is_none());
}

#[tokio::test]
async fn test_ready_target_without_attribute_is_not_ready() {
    let reader = Arc::new(StaticReferenceReader::new());
    reader.insert(&vpc("main", true, None));
    let (ctx, _) = test_context();
    let mut subnet = subnet_referencing("main");

    let res = resolver(&reader).resolve(&ctx, &mut subnet).await.unwrap();

    assert!(matches!(&res, Resolution::Blocked(o) if o[0].status == ReferenceStatus::NotReady));
}

#[tokio::test]
async fn test_ready_target_assigns_attribute() {
    let reader = Arc::new(StaticReferenceReader::new());
    reader.insert(&vpc("main", true, Some("vpc-123")));
    let (ctx, _) = test_context();
    let mut subnet = subnet_referencing("main");

    let res = resolver(&reader).resolve(&ctx, &mut subnet).await.unwrap();

    assert_eq!(res, Resolution::Resolved(1));
    assert_eq!(subnet.spec.vpc_id.as_deref(), Some("vpc-123"));
    // Metadata survives the round trip through JSON
    assert_eq!(subnet.metadata.name.as_deref(), Some("subnet-a"));
}

#[tokio::test]
async fn test_second_resolution_is_a_no_op() {
    let reader = Arc::new(StaticReferenceReader::new());
    reader.insert(&vpc("main", true, Some("vpc-123")));
    let (ctx, _) = test_context();
    let mut subnet = subnet_referencing("main");
    let resolver = resolver(&reader);

    resolver.resolve(&ctx, &mut subnet).await.unwrap();
    let reads_after_first = reader.reads().len();

    // The target now publishes a different value; the literal must not change
    reader.insert(&vpc("main", true, Some("vpc-999")));
    let res = resolver.resolve(&ctx, &mut subnet).await.unwrap();

    assert_eq!(res, Resolution::AlreadyResolved);
    assert_eq!(subnet.spec.vpc_id.as_deref(), Some("vpc-123"));
    assert_eq!(reader.reads().len(), reads_after_first);
}

#[tokio::test]
async fn test_literal_value_skips_reference() {
    let reader = Arc::new(StaticReferenceReader::new());
    let (ctx, _) = test_context();
    let mut subnet = subnet_referencing("main");
    subnet.spec.vpc_id = Some("vpc-literal".to_string());

    let res = resolver(&reader).resolve(&ctx, &mut subnet).await.unwrap();

    assert_eq!(res, Resolution::AlreadyResolved);
    assert!(reader.reads().is_empty());
}

#[tokio::test]
async fn test_array_field_appends_every_reference() {
    let reader = Arc::new(StaticReferenceReader::new());
    reader.insert(&security_group("web", "sg-1"));
    reader.insert(&security_group("db", "sg-2"));
    let (ctx, _) = test_context();
    let mut cluster = cluster_with_references(vec![
        AttributeReference::new("securityGroupIds", "SecurityGroup", "web", "status.securityGroupId"),
        AttributeReference::new("securityGroupIds", "SecurityGroup", "db", "status.securityGroupId"),
    ]);

    let res = resolver(&reader).resolve(&ctx, &mut cluster).await.unwrap();

    assert_eq!(res, Resolution::Resolved(2));
    assert_eq!(cluster.spec.security_group_ids, vec!["sg-1".to_string(), "sg-2".to_string()]);
}

#[tokio::test]
async fn test_partial_readiness_assigns_nothing() {
    let reader = Arc::new(StaticReferenceReader::new());
    reader.insert(&security_group("web", "sg-1"));
    reader.insert(&vpc("main", false, Some("vpc-1")));
    let (ctx, _) = test_context();
    let mut cluster = cluster_with_references(vec![
        AttributeReference::new("securityGroupIds", "SecurityGroup", "web", "status.securityGroupId"),
        AttributeReference::new("vpcId", "Vpc", "main", "status.vpcId"),
    ]);

    let res = resolver(&reader).resolve(&ctx, &mut cluster).await.unwrap();

    match res {
        Resolution::Blocked(outcomes) => {
            assert_eq!(outcomes[0].status, ReferenceStatus::Ready);
            assert_eq!(outcomes[1].status, ReferenceStatus::NotReady);
            assert_eq!(Resolution::blocked_message(&outcomes, "default"), "Vpc/default/main is NotReady");
        }
        other => panic!("expected Blocked, got {other:?}"),
    }
    assert!(cluster.spec.security_group_ids.is_empty());
    assert!(cluster.spec.vpc_id.is_none());
}

#[tokio::test]
async fn test_nested_source_field() {
    let reader = Arc::new(StaticReferenceReader::new());
    reader.insert(&security_group("control-plane", "sg-cp"));
    let (ctx, _) = test_context();
    let mut cluster = cluster_with_references(vec![AttributeReference::new(
        "workerNodes.clusterControlPlaneSecurityGroup",
        "SecurityGroup",
        "control-plane",
        "status.securityGroupId",
    )]);

    let res = resolver(&reader).resolve(&ctx, &mut cluster).await.unwrap();

    assert_eq!(res, Resolution::Resolved(1));
    assert_eq!(
        cluster.spec.worker_nodes.cluster_control_plane_security_group.as_deref(),
        Some("sg-cp")
    );
}

#[tokio::test]
async fn test_reference_into_other_namespace() {
    let reader = Arc::new(StaticReferenceReader::new());
    let mut shared = vpc("main", true, Some("vpc-shared"));
    shared.metadata.namespace = Some("network".to_string());
    reader.insert(&shared);
    let (ctx, _) = test_context();
    let mut subnet = subnet_referencing("main");
    subnet.spec.resource.references[0] = subnet.spec.resource.references[0].clone().with_namespace("network");

    let res = resolver(&reader).resolve(&ctx, &mut subnet).await.unwrap();

    assert_eq!(res, Resolution::Resolved(1));
    assert_eq!(subnet.spec.vpc_id.as_deref(), Some("vpc-shared"));
    assert_eq!(reader.reads(), vec!["Vpc/network/main".to_string()]);
}

#[tokio::test]
async fn test_cancelled_pass_reads_nothing() {
    let reader = Arc::new(StaticReferenceReader::new());
    let (ctx, token) = test_context();
    token.cancel();
    let mut subnet = subnet_referencing("main");

    let err = resolver(&reader).resolve(&ctx, &mut subnet).await.unwrap_err();

    assert!(matches!(err, ResolveError::Interrupted(crate::error::Interrupted::Cancelled)));
    assert!(reader.reads().is_empty());
}

#[test]
fn test_lookup_paths() {
    let doc = json!({ "status": { "ids": ["a", "b"], "empty": "" } });
    assert_eq!(lookup(&doc, "status.ids.1"), Some(&json!("b")));
    assert!(lookup(&doc, "status.missing").is_none());
    assert!(is_empty(lookup(&doc, "status.empty")));
    assert!(!is_empty(lookup(&doc, "status.ids")));
}

#[test]
fn test_assign_creates_parents_and_dedupes_arrays() {
    let mut spec = json!({ "ids": ["a"] });
    assign(&mut spec, "nested.value", json!("x")).unwrap();
    assign(&mut spec, "ids", json!("a")).unwrap();
    assign(&mut spec, "ids", json!("b")).unwrap();
    assert_eq!(spec, json!({ "ids": ["a", "b"], "nested": { "value": "x" } }));
}
