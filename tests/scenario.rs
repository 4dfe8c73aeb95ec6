//! End to end: lay out three tasks, drag one onto another project, confirm,
//! then undo, all through the public engine API.

use taskmap::camera::Point;
use taskmap::config::EngineConfig;
use taskmap::engine::{EngineCore, Host, PendingPrompt, PersistError};
use taskmap::input::{Button, Modifiers};
use taskmap::record::{NodeRef, RecordStore};
use taskmap::transaction::PendingKind;

#[derive(Default)]
struct MemoryHost {
    saved: Vec<RecordStore>,
    prompts: Vec<PendingPrompt>,
}

impl Host for MemoryHost {
    fn persist(&mut self, records: &RecordStore) -> Result<(), PersistError> {
        self.saved.push(records.clone());
        Ok(())
    }

    fn now_ms(&self) -> f64 {
        0.0
    }

    fn show_confirm_cancel_prompt(&mut self, prompt: &PendingPrompt) {
        self.prompts.push(prompt.clone());
    }
}

const RECORDS: &str = r#"{
    "domains": [{"id": "d1", "title": "Work"}],
    "projects": [
        {"id": "p1", "title": "Launch", "domain_id": "d1"},
        {"id": "p2", "title": "Hiring", "domain_id": "d1"}
    ],
    "tasks": [
        {"id": "t1", "title": "Write copy", "project_id": "p1"},
        {"id": "t2", "title": "Pick date", "project_id": "p1"},
        {"id": "t3", "title": "Book venue", "project_id": "p1"}
    ]
}"#;

fn shift() -> Modifiers {
    Modifiers { shift: true, ..Modifiers::default() }
}

#[test]
fn drag_confirm_undo_round_trip() {
    let mut engine = EngineCore::new(EngineConfig::default(), MemoryHost::default());
    engine.set_viewport(1600.0, 900.0);
    engine.load_records(RecordStore::from_json(RECORDS).unwrap());

    // Containment and distinct centers after layout.
    let scene = engine.scene().clone();
    let p1 = scene.get(&NodeRef::project("p1")).unwrap();
    let tasks: Vec<_> = ["t1", "t2", "t3"].iter().map(|id| scene.get(&NodeRef::task(*id)).unwrap()).collect();
    for t in &tasks {
        assert!(t.center().distance(p1.center()) + t.r <= p1.r + 1e-9, "{} escapes p1", t.id);
    }
    for (i, a) in tasks.iter().enumerate() {
        for b in &tasks[i + 1..] {
            assert!(a.center().distance(b.center()) > 1e-6, "{} and {} coincide", a.id, b.id);
        }
    }

    // Screen and world coincide under the initial camera.
    let from = scene.get(&NodeRef::task("t1")).unwrap().center();
    let to = scene.get(&NodeRef::project("p2")).unwrap().center();
    engine.on_pointer_down(from, Button::Primary, shift());
    engine.on_pointer_move(Point::new(from.x, from.y + 10.0), shift());
    engine.on_pointer_move(to, shift());
    engine.on_pointer_up(to);

    let pending = engine.pending().unwrap();
    assert_eq!(pending.kind, PendingKind::Attach);
    assert_eq!(pending.task_id, "t1");
    assert_eq!(pending.from_parent, Some(NodeRef::project("p1")));
    assert_eq!(pending.to_parent, Some(NodeRef::project("p2")));
    assert_eq!(engine.host().prompts.len(), 1);
    assert!(engine.host().saved.is_empty());

    assert!(engine.confirm_pending());
    assert_eq!(engine.records().task("t1").unwrap().project_id.as_deref(), Some("p2"));
    let saved = engine.host().saved.last().unwrap();
    assert_eq!(saved.task("t1").unwrap().project_id.as_deref(), Some("p2"));

    assert!(engine.undo_last_move());
    assert_eq!(engine.records().task("t1").unwrap().project_id.as_deref(), Some("p1"));
    assert_eq!(engine.host().saved.len(), 2);
}
