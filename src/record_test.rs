use serde_json::json;

use super::*;

fn sample_store() -> RecordStore {
    let mut store = RecordStore::new();
    store.domains.push(Domain { id: "d1".into(), title: "Work".into(), color: None, pos: None });
    store.projects.push(Project {
        id: "p1".into(),
        title: "Launch".into(),
        color: Some("#ff0000".into()),
        pos: None,
        domain_id: Some("d1".into()),
    });
    let mut task = Task::new("t1", "Write copy");
    task.project_id = Some("p1".into());
    store.tasks.push(task);
    let mut loose = Task::new("t2", "Call bank");
    loose.domain_id = Some("d1".into());
    store.tasks.push(loose);
    store
}

// =============================================================
// NodeKind
// =============================================================

#[test]
fn z_index_orders_kinds() {
    assert!(NodeKind::Domain.z_index() < NodeKind::Project.z_index());
    assert!(NodeKind::Project.z_index() < NodeKind::Task.z_index());
    assert!(NodeKind::Task.z_index() < LINK_Z_INDEX);
}

#[test]
fn kind_display_is_lowercase() {
    assert_eq!(NodeKind::Project.to_string(), "project");
}

// =============================================================
// Task radius
// =============================================================

#[test]
fn task_radius_grows_with_priority_and_caps() {
    assert!(task_radius(0) < task_radius(1));
    assert!(task_radius(2) < task_radius(3));
    assert_eq!(task_radius(3), task_radius(200));
}

// =============================================================
// Serde
// =============================================================

#[test]
fn store_parses_with_defaults() {
    let raw = json!({
        "domains": [{ "id": "d1", "title": "Home" }],
        "tasks": [{ "id": "t1", "title": "Laundry", "domain_id": "d1", "tags": ["chores"], "status": "doing" }]
    })
    .to_string();
    let store = RecordStore::from_json(&raw).unwrap();
    assert!(store.projects.is_empty());
    let task = store.task("t1").unwrap();
    assert_eq!(task.status, TaskStatus::Doing);
    assert_eq!(task.tags, vec!["chores".to_string()]);
    assert_eq!(task.priority, 0);
    assert!(task.pos.is_none());
}

#[test]
fn record_tagged_by_kind() {
    let record = Record::Task(Task::new("t9", "x"));
    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["kind"], "task");
    let back: Record = serde_json::from_value(value).unwrap();
    assert_eq!(back.kind(), NodeKind::Task);
    assert_eq!(back.id(), "t9");
}

#[test]
fn malformed_json_is_error() {
    assert!(RecordStore::from_json("{ not json").is_err());
}

// =============================================================
// Lookups
// =============================================================

#[test]
fn record_lookup_by_ref() {
    let store = sample_store();
    let rec = store.record(&NodeRef::project("p1")).unwrap();
    assert_eq!(rec.title(), "Launch");
    assert_eq!(rec.color(), Some("#ff0000"));
    assert!(store.record(&NodeRef::project("nope")).is_none());
}

#[test]
fn node_ref_from_shapes() {
    let store = sample_store();
    let rec = store.record(&NodeRef::task("t1")).unwrap();
    assert_eq!(NodeRef::from(&rec), NodeRef::task("t1"));
    assert_eq!(NodeRef::from((NodeKind::Domain, "d1")), NodeRef::domain("d1"));
}

#[test]
fn owning_domain_prefers_project() {
    let store = sample_store();
    assert_eq!(store.owning_domain(store.task("t1").unwrap()), Some("d1".to_string()));
    assert_eq!(store.owning_domain(store.task("t2").unwrap()), Some("d1".to_string()));
}

#[test]
fn tasks_in_project_filters() {
    let store = sample_store();
    let ids: Vec<&str> = store.tasks_in_project("p1").map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["t1"]);
}

// =============================================================
// Placement
// =============================================================

#[test]
fn placement_roundtrip_for_task() {
    let mut store = sample_store();
    let target = NodeRef::task("t1");
    let before = store.placement(&target).unwrap();
    assert_eq!(before.project_id.as_deref(), Some("p1"));

    let moved = Placement { project_id: None, domain_id: Some("d1".into()), pos: Some(Pos::new(4.0, 5.0)) };
    store.apply_placement(&target, &moved).unwrap();
    assert_eq!(store.placement(&target).unwrap(), moved);

    store.apply_placement(&target, &before).unwrap();
    assert_eq!(store.placement(&target).unwrap(), before);
}

#[test]
fn placement_for_domain_only_touches_pos() {
    let mut store = sample_store();
    let target = NodeRef::domain("d1");
    let placement =
        Placement { project_id: Some("p1".into()), domain_id: Some("x".into()), pos: Some(Pos::new(1.0, 2.0)) };
    store.apply_placement(&target, &placement).unwrap();
    assert_eq!(store.domain("d1").unwrap().pos, Some(Pos::new(1.0, 2.0)));
    assert_eq!(store.placement(&target).unwrap().domain_id, None);
}

#[test]
fn placement_missing_record_errors() {
    let mut store = sample_store();
    let target = NodeRef::task("ghost");
    assert!(matches!(store.placement(&target), Err(MutationError::MissingRecord { .. })));
    let err = store.apply_placement(&target, &Placement::default()).unwrap_err();
    assert_eq!(err.to_string(), "task `ghost` not found");
}
