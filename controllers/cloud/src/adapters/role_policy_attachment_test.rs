use super::*;
use crate::test_utils::*;
use cloud_client::{CloudError, MockCloudClient};
use crds::{AttributeReference, ConditionReason, ConditionStatus, ConditionType, IamRoleStatus};
use managed_runtime::testing::{fixed_time, test_context};

const ROLE: &str = "eks-master";
const POLICY_A: &str = "arn:aws:iam::aws:policy/A";
const POLICY_B: &str = "arn:aws:iam::aws:policy/B";
const POLICY_C: &str = "arn:aws:iam::aws:policy/C";

fn adapter(mock: &Arc<MockCloudClient>) -> Box<dyn ExternalClient<RolePolicyAttachment>> {
    RolePolicyAttachment::external(mock.clone())
}

fn set(arns: &[&str]) -> BTreeSet<String> {
    arns.iter().map(|s| s.to_string()).collect()
}

fn with_recorded(mut attachment: RolePolicyAttachment, arns: &[&str]) -> RolePolicyAttachment {
    attachment.status = Some(RolePolicyAttachmentStatus {
        attached_policy_arns: arns.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    });
    attachment
}

#[tokio::test]
async fn test_observe_ignores_policies_attached_by_others() {
    let mock = Arc::new(MockCloudClient::new());
    let (ctx, _) = test_context();
    mock.seed_attachments(ROLE, &[POLICY_A, POLICY_C]);
    let mut attachment = test_role_policy_attachment("attach", Some(ROLE), &[POLICY_A]);

    let observation = adapter(&mock).observe(&ctx, &mut attachment).await.unwrap();

    assert_eq!(observation, ExternalObservation::present(true));
    assert_eq!(recorded_policies(&attachment), set(&[POLICY_A]));
}

#[tokio::test]
async fn test_observe_with_nothing_attached_is_absent() {
    let mock = Arc::new(MockCloudClient::new());
    let (ctx, _) = test_context();
    mock.seed_attachments(ROLE, &[POLICY_C]);
    let mut attachment = test_role_policy_attachment("attach", Some(ROLE), &[POLICY_A]);

    let observation = adapter(&mock).observe(&ctx, &mut attachment).await.unwrap();
    assert_eq!(observation, ExternalObservation::absent());
}

#[tokio::test]
async fn test_observe_requires_role_name() {
    let mock = Arc::new(MockCloudClient::new());
    let (ctx, _) = test_context();
    let mut attachment = test_role_policy_attachment("attach", None, &[POLICY_A]);

    let err = adapter(&mock).observe(&ctx, &mut attachment).await.unwrap_err();
    assert_eq!(err, ExternalError::Terminal("spec.roleName is not set".to_string()));
}

#[tokio::test]
async fn test_create_without_policies_is_terminal() {
    let mock = Arc::new(MockCloudClient::new());
    let (ctx, _) = test_context();
    let mut attachment = test_role_policy_attachment("attach", Some(ROLE), &[]);

    let err = adapter(&mock).create(&ctx, &mut attachment).await.unwrap_err();
    assert!(err.is_terminal());
    assert!(mock.calls_to("attach_role_policy").is_empty());
}

#[tokio::test]
async fn test_update_attaches_missing_and_detaches_dropped() {
    let mock = Arc::new(MockCloudClient::new());
    let (ctx, _) = test_context();
    mock.seed_attachments(ROLE, &[POLICY_A, POLICY_C]);
    let attachment = test_role_policy_attachment("attach", Some(ROLE), &[POLICY_A, POLICY_B]);
    let mut attachment = with_recorded(attachment, &[POLICY_A, POLICY_C]);

    adapter(&mock).update(&ctx, &mut attachment).await.unwrap();

    assert_eq!(
        mock.calls_to("attach_role_policy"),
        vec![format!("attach_role_policy:{ROLE}:{POLICY_B}")]
    );
    assert_eq!(
        mock.calls_to("detach_role_policy"),
        vec![format!("detach_role_policy:{ROLE}:{POLICY_C}")]
    );
    assert_eq!(mock.attached(ROLE), set(&[POLICY_A, POLICY_B]));
    assert_eq!(recorded_policies(&attachment), set(&[POLICY_A, POLICY_B]));
}

#[tokio::test]
async fn test_update_reports_failed_detach() {
    let mock = Arc::new(MockCloudClient::new());
    let (ctx, _) = test_context();
    mock.seed_attachments(ROLE, &[POLICY_A]);
    mock.fail_next("detach_role_policy", CloudError::Throttled("slow down".to_string()));
    let attachment = test_role_policy_attachment("attach", Some(ROLE), &[POLICY_B]);
    let mut attachment = with_recorded(attachment, &[POLICY_A]);

    let err = adapter(&mock).update(&ctx, &mut attachment).await.unwrap_err();

    assert!(matches!(err, ExternalError::Transient(ref m) if m.contains(POLICY_A)));
    // The recorded set is only replaced once the diff applied cleanly
    assert_eq!(recorded_policies(&attachment), set(&[POLICY_A]));
}

#[tokio::test]
async fn test_delete_tolerates_already_detached_policies() {
    let mock = Arc::new(MockCloudClient::new());
    let (ctx, _) = test_context();
    mock.seed_attachments(ROLE, &[POLICY_A, POLICY_C]);
    let attachment = test_role_policy_attachment("attach", Some(ROLE), &[POLICY_A, POLICY_B]);
    let mut attachment = with_recorded(attachment, &[POLICY_A, POLICY_B]);

    adapter(&mock).delete(&ctx, &mut attachment).await.unwrap();

    assert_eq!(mock.attached(ROLE), set(&[POLICY_C]));
    assert!(recorded_policies(&attachment).is_empty());
}

#[tokio::test]
async fn test_delete_without_role_is_a_no_op() {
    let mock = Arc::new(MockCloudClient::new());
    let (ctx, _) = test_context();
    let mut attachment = test_role_policy_attachment("attach", None, &[POLICY_A]);

    adapter(&mock).delete(&ctx, &mut attachment).await.unwrap();
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_reconcile_creates_single_policy_attachment() {
    let harness = Harness::<RolePolicyAttachment>::new();
    let mut attachment = test_role_policy_attachment("attach", Some(ROLE), &[]);
    attachment.spec.policy_arn = Some(POLICY_A.to_string());
    let key = harness.apply(attachment);
    let (ctx, _) = test_context();

    harness.reconciler.reconcile(&ctx, &key).await.unwrap();

    assert_eq!(harness.mock.attached(ROLE), set(&[POLICY_A]));
    let stored = harness.stored(&key);
    let ready = ready(&stored).unwrap();
    assert_eq!(ready.status, ConditionStatus::False);
    assert_eq!(ready.reason, ConditionReason::Creating);
    assert_eq!(recorded_policies(&stored), set(&[POLICY_A]));
}

#[tokio::test]
async fn test_reconcile_replaces_policy_it_attached_earlier() {
    let harness = Harness::<RolePolicyAttachment>::new();
    harness.mock.seed_attachments(ROLE, &[POLICY_A]);
    let attachment = test_role_policy_attachment("attach", Some(ROLE), &[POLICY_B]);
    let key = harness.apply(with_recorded(attachment, &[POLICY_A]));
    let (ctx, _) = test_context();

    harness.reconciler.reconcile(&ctx, &key).await.unwrap();

    assert_eq!(
        harness.mock.calls_to("attach_role_policy"),
        vec![format!("attach_role_policy:{ROLE}:{POLICY_B}")]
    );
    assert_eq!(
        harness.mock.calls_to("detach_role_policy"),
        vec![format!("detach_role_policy:{ROLE}:{POLICY_A}")]
    );
    assert_eq!(ready(&harness.stored(&key)).unwrap().reason, ConditionReason::Creating);

    // Next pass sees exactly the desired set
    harness.reconciler.reconcile(&ctx, &key).await.unwrap();
    let ready = ready(&harness.stored(&key)).unwrap();
    assert_eq!(ready.status, ConditionStatus::True);
}

#[tokio::test]
async fn test_reconcile_waits_for_role_reference() {
    let harness = Harness::<RolePolicyAttachment>::new();
    let mut attachment = test_role_policy_attachment("attach", None, &[POLICY_A]);
    attachment.spec.resource.references = vec![AttributeReference::new("roleName", "IamRole", ROLE, "spec.roleName")];
    let key = harness.apply(attachment);
    let (ctx, _) = test_context();

    harness.reconciler.reconcile(&ctx, &key).await.unwrap();
    let stored = harness.stored(&key);
    assert!(!stored.condition_is_true(ConditionType::ReferencesResolved));
    assert!(harness.mock.calls().is_empty());

    let mut role = test_iam_role(ROLE);
    role.status = Some(IamRoleStatus {
        role_arn: Some(format!("arn:aws:iam::000000000000:role/{ROLE}")),
        ..Default::default()
    });
    role.conditions_mut().set(crds::Condition::available(fixed_time()));
    harness.reader.insert(&role);

    harness.reconciler.reconcile(&ctx, &key).await.unwrap();
    let stored = harness.stored(&key);
    assert_eq!(stored.spec.role_name.as_deref(), Some(ROLE));
    assert_eq!(harness.mock.attached(ROLE), set(&[POLICY_A]));
}
