use conditioner::conditioner::k8s::node::{ConditionStatus, NodeCondition};
use conditioner::conditioner::patch::{
    is_allowed, locate, synthesize, ConditionIndex, MutationRequest, PatchOp,
};
use serde_json::Value;

fn condition(condition_type: &str, status: &str, reason: &str, message: &str) -> NodeCondition {
    NodeCondition {
        condition_type: condition_type.to_string(),
        status: status.to_string(),
        last_heartbeat_time: None,
        last_transition_time: None,
        reason: reason.to_string(),
        message: message.to_string(),
    }
}

fn request(condition_type: &str, status: Option<ConditionStatus>, remove: bool) -> MutationRequest {
    MutationRequest {
        status,
        remove,
        ..MutationRequest::new(condition_type)
    }
}

#[test]
fn add_on_empty_condition_list() {
    let conditions: Vec<NodeCondition> = Vec::new();
    let (old, index) = locate(&conditions, "Ready");
    assert_eq!(index, ConditionIndex::Absent);

    let patch = synthesize(
        index,
        false,
        old,
        &request("Ready", Some(ConditionStatus::True), false),
    );
    assert_eq!(patch.op, PatchOp::Add);
    assert_eq!(patch.path, "/status/conditions/-");
    let value = patch.value.expect("added condition");
    assert_eq!(value.condition_type, "Ready");
    assert_eq!(value.status, "True");
    assert!(value.last_heartbeat_time.is_some());
    assert_eq!(value.last_heartbeat_time, value.last_transition_time);
}

#[test]
fn replace_with_blank_fields_inherits_previous_reason() {
    let conditions = vec![condition("Ready", "False", "X", "Y")];
    let (old, index) = locate(&conditions, "Ready");
    assert_eq!(index, ConditionIndex::At(0));

    let patch = synthesize(
        index,
        false,
        old,
        &request("Ready", Some(ConditionStatus::True), false),
    );
    assert_eq!(patch.op, PatchOp::Replace);
    assert_eq!(patch.path, "/status/conditions/0");
    let value = patch.value.expect("replacement");
    assert_eq!(value.status, "True");
    assert_eq!(value.reason, "X");
    assert_eq!(value.message, "X");
}

#[test]
fn remove_existing_condition() {
    let conditions = vec![condition("DiskPressure", "True", "Full", "disk full")];
    let (old, index) = locate(&conditions, "DiskPressure");

    let patch = synthesize(index, true, old, &request("DiskPressure", None, true));
    assert_eq!(patch.op, PatchOp::Remove);
    assert_eq!(patch.path, "/status/conditions/0");

    let document: Value =
        serde_json::from_slice(&patch.to_patch_document().expect("encode")).expect("json");
    assert_eq!(
        document,
        serde_json::json!([{"op": "remove", "path": "/status/conditions/0"}])
    );
}

#[test]
fn remove_of_missing_condition_is_detectable_before_synthesis() {
    let conditions: Vec<NodeCondition> = Vec::new();
    let (old, index) = locate(&conditions, "DiskPressure");
    assert!(old.is_none());
    assert!(index.is_absent());
    assert_eq!(index.as_i64(), -1);
}

#[test]
fn disallowed_type_is_rejected() {
    assert!(!is_allowed("DiskPressure", &["Ready"]));
    assert!(is_allowed("Ready", &["Ready"]));
    assert!(is_allowed::<&str>("DiskPressure", &[]));
}
