//! Engine context: owns the records, camera, scene, gesture state, pending
//! slot, undo ring and render governor, and talks to the host through
//! [`Host`].
//!
//! DESIGN
//! ======
//! `EngineCore` is the single context object the host drives. Pointer
//! callbacks run the input machine and apply the resulting gestures right
//! away; drawing only happens in [`EngineCore::frame`], which the host calls
//! once per animation frame and which is a no-op unless something asked for
//! a repaint. Record mutations mark the scene dirty and the next read
//! rebuilds it. While a transaction is pending the task's record is left
//! alone and only its scene node is moved to the candidate position.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use crate::camera::{BBox, Camera, Point, Transform};
use crate::config::EngineConfig;
use crate::consts::{FIT_PADDING_RATIO, WHEEL_ZOOM_STEP};
use crate::input::{Button, Gesture, InputMachine, Modifiers, WheelDelta};
use crate::layout::LayoutParams;
use crate::record::{NodeKind, NodeRef, Record, RecordId, RecordStore};
use crate::render::{self, AdaptiveQuality, Painter, RenderError, RenderOptions};
use crate::scene::{SceneGraph, SceneNode};
use crate::transaction::{self, DropPlan, Mutation, PendingKind, PendingTransaction, Transactions};

// =============================================================================
// HOST SEAM
// =============================================================================

/// Severity of a transient host message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Warning,
    Error,
}

/// Error returned by [`Host::persist`].
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Hover tooltip content, anchored in screen space.
#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    pub target: NodeRef,
    pub title: String,
    pub screen: Point,
}

/// What the host shows while a transaction waits for confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPrompt {
    pub kind: PendingKind,
    pub task_id: RecordId,
    pub message: String,
}

/// Everything the engine needs from the surrounding application.
pub trait Host {
    /// Save the current records.
    ///
    /// # Errors
    ///
    /// Any storage failure; the engine reports it and does not retry.
    fn persist(&mut self, records: &RecordStore) -> Result<(), PersistError>;

    /// Milliseconds from any fixed origin; used for frame timing and aging.
    fn now_ms(&self) -> f64;

    fn request_sidebar_refresh(&mut self) {}

    fn open_inspector(&mut self, _record: &Record) {}

    fn show_transient_message(&mut self, _text: &str, _kind: MessageKind) {}

    /// The host answers by calling [`EngineCore::confirm_pending`] or
    /// [`EngineCore::cancel_pending`].
    fn show_confirm_cancel_prompt(&mut self, _prompt: &PendingPrompt) {}

    /// `None` hides the tooltip.
    fn show_tooltip(&mut self, _tooltip: Option<&Tooltip>) {}
}

// =============================================================================
// ENGINE
// =============================================================================

/// The map engine.
#[allow(clippy::struct_excessive_bools)]
pub struct EngineCore<H: Host> {
    config: EngineConfig,
    host: H,
    records: RecordStore,
    camera: Camera,
    scene: SceneGraph,
    input: InputMachine,
    transactions: Transactions,
    quality: AdaptiveQuality,
    active_domain: Option<RecordId>,
    active_project: Option<RecordId>,
    hovered: Option<NodeRef>,
    show_links: bool,
    show_aging: bool,
    show_glow: bool,
    repaint: bool,
}

impl<H: Host> EngineCore<H> {
    /// Build an engine. Unusable scale bounds fall back to the defaults.
    pub fn new(config: EngineConfig, host: H) -> Self {
        let camera = match config.validate() {
            Ok(()) => Camera::with_bounds(config.scale_bounds[0], config.scale_bounds[1]),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring scale bounds");
                Camera::default()
            }
        };
        Self {
            input: InputMachine::new(config.drag_modifier),
            quality: AdaptiveQuality::new(config.max_edges),
            config,
            host,
            records: RecordStore::new(),
            camera,
            scene: SceneGraph::new(),
            transactions: Transactions::new(),
            active_domain: None,
            active_project: None,
            hovered: None,
            show_links: true,
            show_aging: false,
            show_glow: true,
            repaint: true,
        }
    }

    // --- Records ---

    /// Replace every record. Drops the pending transaction and undo history.
    pub fn load_records(&mut self, records: RecordStore) {
        tracing::debug!(
            domains = records.domains.len(),
            projects = records.projects.len(),
            tasks = records.tasks.len(),
            "records loaded"
        );
        self.records = records;
        self.transactions = Transactions::new();
        self.hovered = None;
        self.mark_dirty();
    }

    #[must_use]
    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    /// Mutable access for external edits; the scene is rebuilt on next read.
    pub fn records_mut(&mut self) -> &mut RecordStore {
        self.mark_dirty();
        &mut self.records
    }

    pub fn mark_dirty(&mut self) {
        self.scene.mark_dirty();
        self.repaint = true;
    }

    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // --- Scene ---

    /// Rebuild the scene now.
    pub fn layout(&mut self) {
        self.scene.mark_dirty();
        self.ensure_scene();
        self.repaint = true;
    }

    fn layout_params(&self) -> LayoutParams {
        let (viewport_width, viewport_height) = self.camera.viewport();
        LayoutParams {
            active_domain: self.active_domain.clone(),
            viewport_width,
            viewport_height,
            mode: self.config.layout_mode,
            edge_cap: self.config.max_edges,
        }
    }

    fn ensure_scene(&mut self) {
        if !self.scene.is_dirty() {
            return;
        }
        let params = self.layout_params();
        self.scene.rebuild(&self.records, &params);
        if let Some(pending) = self.transactions.pending() {
            let at = Point::new(pending.candidate_pos.x, pending.candidate_pos.y);
            self.scene.set_node_position(&pending.target(), at);
        }
    }

    /// The up-to-date scene.
    pub fn scene(&mut self) -> &SceneGraph {
        self.ensure_scene();
        &self.scene
    }

    /// Look up a laid-out node.
    pub fn node(&mut self, target: &NodeRef) -> Option<&SceneNode> {
        self.ensure_scene();
        self.scene.get(target)
    }

    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Resize the drawing surface (CSS pixels).
    pub fn set_viewport(&mut self, width: f64, height: f64) {
        if self.camera.viewport() != (width.max(0.0), height.max(0.0)) {
            self.camera.set_viewport(width, height);
            self.mark_dirty();
        }
    }

    // --- Drawing ---

    pub fn request_repaint(&mut self) {
        self.repaint = true;
    }

    #[must_use]
    pub fn needs_repaint(&self) -> bool {
        self.repaint || self.camera.is_animating()
    }

    /// Advance animations and draw if anything changed.
    ///
    /// Returns whether a frame was drawn.
    ///
    /// # Errors
    ///
    /// Propagates painter failures; the repaint request stays set.
    pub fn frame(&mut self, painter: &mut dyn Painter) -> Result<bool, RenderError> {
        let start = self.host.now_ms();
        if self.camera.step_animation(start) {
            self.repaint = true;
        }
        if !self.repaint {
            return Ok(false);
        }
        self.ensure_scene();

        let options = RenderOptions {
            show_links: self.show_links,
            show_aging: self.show_aging,
            glow: self.show_glow && self.quality.glow_enabled(),
            edge_cap: self.config.max_edges.min(self.quality.edge_cap()),
            wip_limit: self.config.wip_limit,
            now_ms: start,
            hovered: self.hovered.as_ref(),
            pending: self.transactions.pending(),
        };
        let stats = render::draw_scene(painter, &self.scene, &self.camera, &options)?;
        tracing::trace!(?stats, "frame drawn");

        self.repaint = self.camera.is_animating();
        let elapsed = self.host.now_ms() - start;
        if self.quality.record_frame(elapsed) {
            self.repaint = true;
        }
        Ok(true)
    }

    // --- View state ---

    /// Show only one domain, or all with `None`.
    pub fn set_active_domain_filter(&mut self, domain_id: Option<&str>) {
        self.active_domain = domain_id.map(str::to_string);
        self.mark_dirty();
    }

    #[must_use]
    pub fn active_domain_filter(&self) -> Option<&str> {
        self.active_domain.as_deref()
    }

    /// Project targeted by [`Self::fit_active_project`]; set by clicks.
    #[must_use]
    pub fn active_project(&self) -> Option<&str> {
        self.active_project.as_deref()
    }

    pub fn set_show_links(&mut self, on: bool) {
        self.show_links = on;
        self.repaint = true;
    }

    pub fn set_show_aging(&mut self, on: bool) {
        self.show_aging = on;
        self.repaint = true;
    }

    pub fn set_show_glow(&mut self, on: bool) {
        self.show_glow = on;
        self.repaint = true;
    }

    fn fit(&mut self, bbox: Option<BBox>) -> Option<Transform> {
        self.repaint = true;
        self.camera.fit_to_bbox(bbox, FIT_PADDING_RATIO)
    }

    /// Animate to show every node. `None` when there is nothing to show.
    pub fn fit_all(&mut self) -> Option<Transform> {
        self.ensure_scene();
        let bbox = self.scene.bbox();
        self.fit(bbox)
    }

    /// Animate to the filtered domain, or the active project's domain.
    pub fn fit_active_domain(&mut self) -> Option<Transform> {
        self.ensure_scene();
        let domain = self.active_domain.clone().or_else(|| {
            let project = self.records.project(self.active_project.as_deref()?)?;
            project.domain_id.clone()
        });
        let bbox = domain.and_then(|d| self.scene.domain_bbox(&d, &self.records));
        self.fit(bbox)
    }

    /// Animate to the active project and its tasks.
    pub fn fit_active_project(&mut self) -> Option<Transform> {
        self.ensure_scene();
        let bbox = self.active_project.as_deref().and_then(|p| self.scene.project_bbox(p));
        self.fit(bbox)
    }

    /// Center on the active project, else the active domain, else everything.
    pub fn center_view(&mut self) {
        self.ensure_scene();
        let project = self.active_project.as_deref().and_then(|id| self.scene.get_node(NodeKind::Project, id));
        let focus = project
            .or_else(|| self.active_domain.as_deref().and_then(|id| self.scene.get_node(NodeKind::Domain, id)))
            .filter(|n| n.is_finite())
            .map(SceneNode::center)
            .or_else(|| self.scene.bbox().map(|b| b.center()));
        if let Some(world) = focus {
            self.camera.center_on(world);
        }
        self.repaint = true;
    }

    pub fn reset_view(&mut self) {
        self.camera.reset();
        self.repaint = true;
    }

    /// Zoom around the viewport center; `100.0` is 1:1.
    pub fn set_zoom_percent(&mut self, percent: f64) {
        self.camera.set_scale_centered(percent / 100.0);
        self.repaint = true;
    }

    #[must_use]
    pub fn zoom_percent(&self) -> f64 {
        self.camera.scale * 100.0
    }

    // --- Transactions ---

    #[must_use]
    pub fn pending(&self) -> Option<&PendingTransaction> {
        self.transactions.pending()
    }

    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.transactions.undo.len()
    }

    /// Apply the pending transaction. Returns whether records changed.
    pub fn confirm_pending(&mut self) -> bool {
        let Some(pending) = self.transactions.take_pending() else {
            return false;
        };
        let mutation = pending.mutation(self.config.layout_mode);
        self.commit(&pending.target(), &mutation)
    }

    /// Drop the pending transaction; the task snaps back.
    pub fn cancel_pending(&mut self) -> bool {
        let cancelled = self.transactions.take_pending().is_some();
        if cancelled {
            self.mark_dirty();
        }
        cancelled
    }

    /// Revert the most recent committed mutation.
    pub fn undo_last_move(&mut self) -> bool {
        let Some(entry) = self.transactions.undo.pop() else {
            return false;
        };
        if self.transactions.pending().is_some_and(|p| p.target() == entry.target) {
            self.transactions.take_pending();
        }
        self.mark_dirty();
        match transaction::revert(&mut self.records, &entry) {
            Ok(()) => {
                tracing::debug!(kind = ?entry.kind, id = %entry.target.id, "undo");
                self.persist();
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "undo target gone");
                false
            }
        }
    }

    fn commit(&mut self, target: &NodeRef, mutation: &Mutation) -> bool {
        self.mark_dirty();
        match transaction::apply(&mut self.records, target, mutation) {
            Ok(Some(entry)) => {
                self.transactions.undo.push(entry);
                self.persist();
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::debug!(error = %e, "mutation skipped");
                false
            }
        }
    }

    fn persist(&mut self) {
        if let Err(e) = self.host.persist(&self.records) {
            tracing::warn!(error = %e, "persist failed");
            self.host.show_transient_message(&format!("Could not save changes: {e}"), MessageKind::Error);
        }
        self.host.request_sidebar_refresh();
    }

    // --- Input events ---

    pub fn on_pointer_down(&mut self, screen: Point, button: Button, modifiers: Modifiers) -> Vec<Gesture> {
        self.ensure_scene();
        let gestures = self.input.pointer_down(screen, button, modifiers, &self.camera, &self.scene);
        self.apply_gestures(&gestures);
        gestures
    }

    pub fn on_pointer_move(&mut self, screen: Point, modifiers: Modifiers) -> Vec<Gesture> {
        self.ensure_scene();
        let gestures = self.input.pointer_move(screen, modifiers, &self.camera, &self.scene);
        self.apply_gestures(&gestures);
        gestures
    }

    pub fn on_pointer_up(&mut self, screen: Point) -> Vec<Gesture> {
        self.ensure_scene();
        let gestures = self.input.pointer_up(screen, &self.camera, &self.scene);
        self.apply_gestures(&gestures);
        gestures
    }

    pub fn on_pointer_cancel(&mut self) -> Vec<Gesture> {
        let gestures = self.input.pointer_cancel();
        self.apply_gestures(&gestures);
        gestures
    }

    /// Zoom around the cursor. Scrolling down zooms out.
    pub fn on_wheel(&mut self, screen: Point, delta: WheelDelta, _modifiers: Modifiers) {
        if !delta.dy.is_finite() {
            return;
        }
        self.camera.zoom_at((-delta.dy * WHEEL_ZOOM_STEP).exp(), screen);
        self.repaint = true;
    }

    pub fn on_modifiers_changed(&mut self, modifiers: Modifiers) {
        self.input.modifiers_changed(modifiers);
    }

    fn apply_gestures(&mut self, gestures: &[Gesture]) {
        for gesture in gestures {
            match gesture {
                Gesture::Hover { target, .. } => self.hover(target.as_ref()),
                Gesture::Click { target, .. } => self.click(target.as_ref()),
                Gesture::DragStart { .. } => self.hover(None),
                Gesture::Drag { target, world } => {
                    self.scene.move_subtree(target, *world);
                    self.repaint = true;
                }
                Gesture::DragEnd { target, world } => self.finish_drag(target, *world),
                Gesture::PanBy { dx, dy } => {
                    self.camera.translate(*dx, *dy);
                    self.repaint = true;
                }
                Gesture::PanEnd => {}
            }
        }
    }

    fn hover(&mut self, target: Option<&NodeRef>) {
        if target == self.hovered.as_ref() {
            return;
        }
        self.hovered = target.cloned();
        self.repaint = true;

        let tooltip = target.and_then(|t| self.scene.get(t)).map(|node| Tooltip {
            target: NodeRef::from(node),
            title: node.record.title().to_string(),
            screen: self.camera.world_to_screen(Point::new(node.x, node.y - node.r)),
        });
        self.host.show_tooltip(tooltip.as_ref());
    }

    fn click(&mut self, target: Option<&NodeRef>) {
        let Some(record) = target.and_then(|t| self.records.record(t)) else {
            return;
        };
        self.active_project = match &record {
            Record::Project(p) => Some(p.id.clone()),
            Record::Task(t) => t.project_id.clone(),
            Record::Domain(_) => None,
        };
        self.host.open_inspector(&record);
    }

    fn finish_drag(&mut self, target: &NodeRef, world: Point) {
        if self.transactions.pending().is_some_and(|p| p.target() == *target) {
            tracing::debug!(task = %target.id, "drop ignored while its transaction is pending");
            self.mark_dirty();
            return;
        }

        match transaction::plan_drop(&self.records, &self.scene, target, world, self.config.layout_mode) {
            DropPlan::Missing => {
                tracing::debug!(id = %target.id, "dropped record vanished");
                self.mark_dirty();
            }
            DropPlan::Unchanged => self.mark_dirty(),
            DropPlan::Commit(mutation) => {
                self.commit(target, &mutation);
            }
            DropPlan::Pending(pending) => {
                let prompt = self.prompt_for(&pending);
                if self.transactions.raise(pending) {
                    self.host.show_confirm_cancel_prompt(&prompt);
                } else {
                    tracing::debug!(task = %target.id, "second pending transaction rejected");
                }
                self.mark_dirty();
            }
        }
    }

    fn prompt_for(&self, pending: &PendingTransaction) -> PendingPrompt {
        let title_of = |r: &NodeRef| self.records.record(r).map(|rec| rec.title().to_string());
        let task = title_of(&pending.target()).unwrap_or_else(|| pending.task_id.clone());
        let message = match (pending.kind, pending.to_parent.as_ref().and_then(title_of)) {
            (PendingKind::Attach, Some(project)) => format!("Move \"{task}\" into {project}?"),
            (PendingKind::Detach, Some(domain)) => format!("Detach \"{task}\" into {domain}?"),
            _ => format!("Detach \"{task}\" from its project?"),
        };
        PendingPrompt { kind: pending.kind, task_id: pending.task_id.clone(), message }
    }
}
