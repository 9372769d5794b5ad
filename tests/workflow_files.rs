use lobbyflow_core::workflow::{
    AssignmentType, ConditionLogic, DelayUnit, NodeKind, TriggerType, Workflow, WorkflowStatus,
};

fn load_fixture() -> Workflow {
    let raw = std::fs::read_to_string(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/checkin_workflow.json"
    ))
    .expect("read fixture");
    serde_json::from_str(&raw).expect("parse fixture")
}

#[test]
fn test_designer_export_parses() {
    let wf = load_fixture();

    assert_eq!(wf.id, "wf-lobby-checkin");
    assert_eq!(wf.status, WorkflowStatus::Active);
    assert_eq!(wf.trigger_type, TriggerType::VisitorCheckin);
    assert!(wf.accepts(TriggerType::VisitorCheckin));
    assert_eq!(wf.start_node_id, "collect");
    assert_eq!(wf.nodes.len(), 5);
    assert_eq!(wf.connections.len(), 3);
    wf.validate().expect("fixture is a valid graph");
}

#[test]
fn test_designer_export_node_configs() {
    let wf = load_fixture();

    match &wf.node("collect").expect("collect").kind {
        NodeKind::Form(cfg) => {
            assert_eq!(cfg.form_fields.len(), 3);
            assert!(cfg.form_fields[0].required);
            assert_eq!(cfg.form_fields[2].options.as_ref().map(Vec::len), Some(3));
        }
        other => panic!("expected form, got {:?}", other),
    }
    match &wf.node("route").expect("route").kind {
        NodeKind::Condition(cfg) => assert_eq!(cfg.condition_logic, ConditionLogic::And),
        other => panic!("expected condition, got {:?}", other),
    }
    match &wf.node("escort").expect("escort").kind {
        NodeKind::Assignment(cfg) => {
            assert_eq!(cfg.assignment_type, AssignmentType::Role);
            assert_eq!(cfg.role.as_deref(), Some("front-desk"));
        }
        other => panic!("expected assignment, got {:?}", other),
    }
    match &wf.node("badge").expect("badge").kind {
        NodeKind::Delay(cfg) => assert_eq!(cfg.delay_unit, DelayUnit::Minutes),
        other => panic!("expected delay, got {:?}", other),
    }

    let guarded: Vec<&str> = wf
        .outgoing("route")
        .filter(|c| c.condition.is_some())
        .map(|c| c.to_node.as_str())
        .collect();
    assert_eq!(guarded, vec!["escort"]);
}

#[test]
fn test_unknown_node_type_rejected() {
    let raw = r#"{
        "id": "wf", "name": "bad", "startNodeId": "x",
        "nodes": [{"id": "x", "type": "teleport", "config": {}, "nextNodes": []}]
    }"#;
    assert!(serde_json::from_str::<Workflow>(raw).is_err());
}
