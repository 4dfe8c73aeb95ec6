use super::*;
use crate::layout::LayoutParams;
use crate::record::{Domain, NodeRef, Pos, Project, RecordStore, Task};
use crate::transaction::PendingKind;

// =============================================================
// Recording painter
// =============================================================

#[derive(Debug, Clone, PartialEq)]
enum Op {
    Begin { width: f64, height: f64 },
    Circle { r: f64, fill: Option<String>, stroke: Option<String>, alpha: f64, glow: bool, dashed: bool },
    Line { dashed: bool },
    Label(String),
    End,
}

#[derive(Default)]
struct Recorder {
    ops: Vec<Op>,
    fail_on_line: bool,
}

impl Painter for Recorder {
    fn begin_frame(&mut self, width: f64, height: f64, _transform: Transform) -> Result<(), RenderError> {
        self.ops.push(Op::Begin { width, height });
        Ok(())
    }

    fn circle(&mut self, _center: Point, r: f64, style: &ShapeStyle<'_>) -> Result<(), RenderError> {
        self.ops.push(Op::Circle {
            r,
            fill: style.fill.map(str::to_string),
            stroke: style.stroke.map(str::to_string),
            alpha: style.alpha,
            glow: style.glow,
            dashed: style.dashed,
        });
        Ok(())
    }

    fn line(&mut self, _from: Point, _to: Point, style: &ShapeStyle<'_>) -> Result<(), RenderError> {
        if self.fail_on_line {
            return Err(RenderError::Painter("line refused".into()));
        }
        self.ops.push(Op::Line { dashed: style.dashed });
        Ok(())
    }

    fn label(&mut self, _at: Point, text: &str, _style: &ShapeStyle<'_>) -> Result<(), RenderError> {
        self.ops.push(Op::Label(text.to_string()));
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        self.ops.push(Op::End);
        Ok(())
    }
}

impl Recorder {
    fn lines(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, Op::Line { .. })).count()
    }

    fn circles_with_stroke(&self, color: &str) -> usize {
        self.ops.iter().filter(|op| matches!(op, Op::Circle { stroke: Some(s), .. } if s == color)).count()
    }
}

// =============================================================
// Fixture
// =============================================================

// One domain, one project holding four doing tasks that share a tag.
fn store() -> RecordStore {
    let mut store = RecordStore::new();
    store.domains.push(Domain { id: "d1".into(), title: "Work".into(), color: None, pos: None });
    store.projects.push(Project {
        id: "p1".into(),
        title: "Launch".into(),
        color: None,
        pos: None,
        domain_id: Some("d1".into()),
    });
    for i in 0..4 {
        let mut t = Task::new(format!("t{i}"), format!("task {i}"));
        t.project_id = Some("p1".into());
        t.status = TaskStatus::Doing;
        t.tags = vec!["x".into()];
        store.tasks.push(t);
    }
    store
}

fn scene(store: &RecordStore) -> SceneGraph {
    let mut scene = SceneGraph::new();
    scene.rebuild(store, &LayoutParams { viewport_width: 1600.0, viewport_height: 900.0, ..LayoutParams::default() });
    scene
}

fn camera() -> Camera {
    let mut camera = Camera::default();
    camera.set_viewport(1600.0, 900.0);
    camera
}

fn draw(store: &RecordStore, options: &RenderOptions<'_>) -> (Recorder, DrawStats) {
    let mut painter = Recorder::default();
    let stats = draw_scene(&mut painter, &scene(store), &camera(), options).unwrap();
    (painter, stats)
}

// =============================================================
// Adaptive quality
// =============================================================

#[test]
fn slow_streak_halves_cap_and_drops_glow() {
    let mut quality = AdaptiveQuality::new(300);
    for frame in 1..QUALITY_STREAK_FRAMES {
        assert!(!quality.record_frame(100.0), "changed early at frame {frame}");
    }
    assert!(quality.record_frame(100.0));
    assert_eq!(quality.edge_cap(), 150);
    assert!(!quality.glow_enabled());
}

#[test]
fn cap_never_drops_below_floor() {
    let mut quality = AdaptiveQuality::new(300);
    for _ in 0..200 {
        quality.record_frame(100.0);
    }
    assert_eq!(quality.edge_cap(), MIN_EDGE_CAP);
}

#[test]
fn floor_respects_small_configured_max() {
    let mut quality = AdaptiveQuality::new(10);
    for _ in 0..100 {
        quality.record_frame(100.0);
    }
    assert_eq!(quality.edge_cap(), 10);
}

#[test]
fn fast_streak_restores_quality() {
    let mut quality = AdaptiveQuality::new(300);
    for _ in 0..16 {
        quality.record_frame(100.0);
    }
    assert_eq!(quality.edge_cap(), 75);

    for _ in 0..500 {
        quality.record_frame(1.0);
    }
    assert_eq!(quality.edge_cap(), 300);
    assert!(quality.glow_enabled());
}

#[test]
fn recovery_doubles_one_step_at_a_time() {
    let mut quality = AdaptiveQuality::new(300);
    for _ in 0..8 {
        quality.record_frame(100.0);
    }
    assert_eq!(quality.edge_cap(), 150);

    let mut caps = Vec::new();
    for _ in 0..500 {
        if quality.record_frame(1.0) {
            caps.push(quality.edge_cap());
        }
    }
    assert_eq!(caps.last(), Some(&300));
    assert!(caps.windows(2).all(|w| w[1] <= w[0].saturating_mul(2)));
}

#[test]
fn middle_band_holds_steady() {
    let mut quality = AdaptiveQuality::new(300);
    for _ in 0..100 {
        assert!(!quality.record_frame(16.0));
    }
    assert!((quality.ema_ms() - 16.0).abs() < 1e-9);
}

#[test]
fn ema_follows_decay_formula() {
    let mut quality = AdaptiveQuality::new(300);
    quality.record_frame(26.0);
    assert!((quality.ema_ms() - (16.0 * 0.9 + 26.0 * 0.1)).abs() < 1e-9);
}

#[test]
fn bad_frame_times_ignored() {
    let mut quality = AdaptiveQuality::new(300);
    assert!(!quality.record_frame(f64::NAN));
    assert!(!quality.record_frame(-5.0));
    assert!((quality.ema_ms() - FRAME_EMA_SEED_MS).abs() < 1e-9);
}

// =============================================================
// Aging
// =============================================================

#[test]
fn aging_alpha_fades_to_floor() {
    let day = MS_PER_DAY;
    assert_eq!(aging_alpha(None, 0.0), 1.0);
    assert_eq!(aging_alpha(Some(0), 0.0), 1.0);
    assert!((aging_alpha(Some(0), 15.0 * day) - 0.725).abs() < 1e-9);
    assert!((aging_alpha(Some(0), 30.0 * day) - AGING_MIN_ALPHA).abs() < 1e-9);
    assert!((aging_alpha(Some(0), 90.0 * day) - AGING_MIN_ALPHA).abs() < 1e-9);
    // Timestamps in the future count as fresh.
    assert_eq!(aging_alpha(Some(1_000), 0.0), 1.0);
}

// =============================================================
// Frame drawing
// =============================================================

#[test]
fn layers_drawn_in_order() {
    let (painter, stats) = draw(&store(), &RenderOptions::default());
    assert_eq!(stats, DrawStats { domains: 1, projects: 1, tasks: 4, edges: 6, skipped: 0 });

    assert_eq!(painter.ops.first(), Some(&Op::Begin { width: 1600.0, height: 900.0 }));
    assert_eq!(painter.ops.last(), Some(&Op::End));
    let first_line = painter.ops.iter().position(|op| matches!(op, Op::Line { .. })).unwrap();
    let project_label = painter.ops.iter().position(|op| *op == Op::Label("Launch".into())).unwrap();
    let first_task = painter.ops.iter().position(|op| matches!(op, Op::Circle { r, .. } if *r < 20.0)).unwrap();
    assert!(project_label < first_line);
    assert!(first_line < first_task);
}

#[test]
fn links_toggle_and_cap() {
    let store = store();
    let (painter, stats) = draw(&store, &RenderOptions { show_links: false, ..RenderOptions::default() });
    assert_eq!((painter.lines(), stats.edges), (0, 0));

    let (painter, stats) = draw(&store, &RenderOptions { edge_cap: 2, ..RenderOptions::default() });
    assert_eq!((painter.lines(), stats.edges), (2, 2));
}

#[test]
fn wip_limit_marks_overloaded_project() {
    let store = store();
    let (painter, _) = draw(&store, &RenderOptions { wip_limit: Some(3), ..RenderOptions::default() });
    assert_eq!(painter.circles_with_stroke(WIP_STROKE), 1);

    let (painter, _) = draw(&store, &RenderOptions { wip_limit: Some(4), ..RenderOptions::default() });
    assert_eq!(painter.circles_with_stroke(WIP_STROKE), 0);
}

#[test]
fn glow_only_for_doing_tasks_when_enabled() {
    let mut store = store();
    store.tasks[0].status = TaskStatus::Done;
    let glowing =
        |painter: &Recorder| painter.ops.iter().filter(|op| matches!(op, Op::Circle { glow: true, .. })).count();

    let (painter, _) = draw(&store, &RenderOptions::default());
    assert_eq!(glowing(&painter), 3);
    let (painter, _) = draw(&store, &RenderOptions { glow: false, ..RenderOptions::default() });
    assert_eq!(glowing(&painter), 0);
}

#[test]
fn aging_applies_only_when_enabled() {
    let mut store = store();
    store.tasks[0].updated_at = Some(0);
    let now = 30.0 * MS_PER_DAY;
    let faded = |painter: &Recorder| {
        painter
            .ops
            .iter()
            .filter(|op| matches!(op, Op::Circle { alpha, .. } if (*alpha - AGING_MIN_ALPHA).abs() < 1e-9))
            .count()
    };

    let (painter, _) = draw(&store, &RenderOptions { now_ms: now, ..RenderOptions::default() });
    assert_eq!(faded(&painter), 0);
    let (painter, _) = draw(&store, &RenderOptions { now_ms: now, show_aging: true, ..RenderOptions::default() });
    assert_eq!(faded(&painter), 1);
}

#[test]
fn hover_draws_outline() {
    let store = store();
    let hovered = NodeRef::task("t1");
    let (painter, _) = draw(&store, &RenderOptions { hovered: Some(&hovered), ..RenderOptions::default() });
    assert_eq!(painter.circles_with_stroke(HOVER_STROKE), 1);
    let ghost = NodeRef::task("ghost");
    let (painter, _) = draw(&store, &RenderOptions { hovered: Some(&ghost), ..RenderOptions::default() });
    assert_eq!(painter.circles_with_stroke(HOVER_STROKE), 0);
}

#[test]
fn pending_overlay_links_task_to_target() {
    let store = store();
    let pending = PendingTransaction {
        kind: PendingKind::Detach,
        task_id: "t0".into(),
        from_parent: Some(NodeRef::project("p1")),
        to_parent: Some(NodeRef::domain("d1")),
        candidate_pos: Pos::new(600.0, 300.0),
    };
    let (painter, _) =
        draw(&store, &RenderOptions { show_links: false, pending: Some(&pending), ..RenderOptions::default() });
    assert_eq!(painter.ops.iter().filter(|op| matches!(op, Op::Line { dashed: true })).count(), 1);
    assert!(painter.ops.iter().any(|op| matches!(op, Op::Circle { dashed: true, .. })));
}

#[test]
fn non_finite_nodes_skipped() {
    let mut store = store();
    store.projects[0].pos = Some(Pos::new(f64::NAN, 0.0));
    let (_, stats) = draw(&store, &RenderOptions::default());
    // The project and its four ringed tasks.
    assert_eq!(stats.skipped, 5);
    assert_eq!((stats.projects, stats.tasks, stats.edges), (0, 0, 0));
}

#[test]
fn off_screen_nodes_culled() {
    let store = store();
    let mut cam = camera();
    cam.center_on(Point::new(50_000.0, 0.0));
    let mut painter = Recorder::default();
    let stats = draw_scene(&mut painter, &scene(&store), &cam, &RenderOptions::default()).unwrap();
    assert_eq!(stats, DrawStats::default());
    assert_eq!(painter.ops, vec![Op::Begin { width: 1600.0, height: 900.0 }, Op::End]);
}

#[test]
fn painter_failure_propagates() {
    let mut painter = Recorder { fail_on_line: true, ..Recorder::default() };
    let err = draw_scene(&mut painter, &scene(&store()), &camera(), &RenderOptions::default()).unwrap_err();
    assert_eq!(err.to_string(), "painter failed: line refused");
}
