//! Rendering: draws the culled scene through a [`Painter`].
//!
//! This module never touches a browser API. It receives read-only views of
//! the scene and camera and issues world-space draw calls; the painter owns
//! the surface and applies the camera transform handed to `begin_frame`.
//!
//! Layer order is fixed: domains, projects (with WIP warning), tag edges,
//! tasks, then overlays (hover outline, pending connector and target).
//!
//! [`AdaptiveQuality`] watches frame times and trades edge count and glow
//! for speed when frames run slow.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use std::collections::{HashMap, HashSet};

use crate::camera::{Camera, Point, Transform};
use crate::consts::{
    AGING_FULL_DAYS, AGING_MIN_ALPHA, FAST_FRAME_MS, FRAME_EMA_DECAY, FRAME_EMA_SEED_MS, MIN_EDGE_CAP, MS_PER_DAY,
    QUALITY_STREAK_FRAMES, SLOW_FRAME_MS,
};
use crate::record::{NodeKind, NodeRef, Record, TaskStatus};
use crate::scene::{SceneGraph, SceneNode};
use crate::transaction::PendingTransaction;

const DOMAIN_FILL: &str = "#eef2f7";
const PROJECT_FILL: &str = "#dbe7f3";
const TASK_FILL: &str = "#4a90d9";
const DONE_FILL: &str = "#9bc59d";
const EDGE_STROKE: &str = "#9aa5b1";
const OUTLINE_STROKE: &str = "#5b6b7b";
const WIP_STROKE: &str = "#d9534f";
const HOVER_STROKE: &str = "#f5a623";
const PENDING_STROKE: &str = "#f5a623";
const LABEL_FILL: &str = "#1f2933";

/// Hover outline distance outside the node rim, in world units.
const HOVER_OUTLINE_GAP: f64 = 4.0;

// =============================================================
// Painter seam
// =============================================================

/// Error raised by a painter backend.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("painter failed: {0}")]
    Painter(String),
}

/// How one shape is drawn. Colors are CSS color strings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeStyle<'a> {
    pub fill: Option<&'a str>,
    pub stroke: Option<&'a str>,
    /// In screen pixels.
    pub line_width: f64,
    pub alpha: f64,
    pub glow: bool,
    pub dashed: bool,
}

impl Default for ShapeStyle<'_> {
    fn default() -> Self {
        Self { fill: None, stroke: None, line_width: 1.0, alpha: 1.0, glow: false, dashed: false }
    }
}

impl<'a> ShapeStyle<'a> {
    #[must_use]
    pub fn filled(fill: &'a str) -> Self {
        Self { fill: Some(fill), ..Self::default() }
    }

    #[must_use]
    pub fn stroked(stroke: &'a str, line_width: f64) -> Self {
        Self { stroke: Some(stroke), line_width, ..Self::default() }
    }
}

/// Drawing backend. All coordinates are world space; the backend applies
/// the transform passed to [`Painter::begin_frame`].
pub trait Painter {
    /// Clear a `width` x `height` CSS-pixel surface and install `transform`.
    ///
    /// # Errors
    ///
    /// Backend-specific failure.
    fn begin_frame(&mut self, width: f64, height: f64, transform: Transform) -> Result<(), RenderError>;

    /// # Errors
    ///
    /// Backend-specific failure.
    fn circle(&mut self, center: Point, r: f64, style: &ShapeStyle<'_>) -> Result<(), RenderError>;

    /// # Errors
    ///
    /// Backend-specific failure.
    fn line(&mut self, from: Point, to: Point, style: &ShapeStyle<'_>) -> Result<(), RenderError>;

    /// # Errors
    ///
    /// Backend-specific failure.
    fn label(&mut self, at: Point, text: &str, style: &ShapeStyle<'_>) -> Result<(), RenderError>;

    /// # Errors
    ///
    /// Backend-specific failure.
    fn end_frame(&mut self) -> Result<(), RenderError> {
        Ok(())
    }
}

// =============================================================
// Adaptive quality
// =============================================================

/// Frame-time governor with hysteresis.
///
/// Keeps an exponential moving average of frame durations. Eight frames in
/// a row above the slow threshold halve the edge cap and disable glow;
/// eight in a row below the fast threshold double the cap back toward the
/// configured maximum and re-enable glow.
#[derive(Debug, Clone)]
pub struct AdaptiveQuality {
    ema_ms: f64,
    slow_streak: u32,
    fast_streak: u32,
    edge_cap: usize,
    max_edges: usize,
    glow: bool,
}

impl AdaptiveQuality {
    #[must_use]
    pub fn new(max_edges: usize) -> Self {
        Self { ema_ms: FRAME_EMA_SEED_MS, slow_streak: 0, fast_streak: 0, edge_cap: max_edges, max_edges, glow: true }
    }

    /// Feed one frame duration. Returns `true` when the cap or glow changed.
    pub fn record_frame(&mut self, dt_ms: f64) -> bool {
        if !dt_ms.is_finite() || dt_ms < 0.0 {
            return false;
        }
        self.ema_ms = self.ema_ms * FRAME_EMA_DECAY + dt_ms * (1.0 - FRAME_EMA_DECAY);

        if self.ema_ms > SLOW_FRAME_MS {
            self.slow_streak += 1;
            self.fast_streak = 0;
        } else if self.ema_ms < FAST_FRAME_MS {
            self.fast_streak += 1;
            self.slow_streak = 0;
        } else {
            self.slow_streak = 0;
            self.fast_streak = 0;
        }

        let before = (self.edge_cap, self.glow);
        if self.slow_streak >= QUALITY_STREAK_FRAMES {
            self.slow_streak = 0;
            self.edge_cap = (self.edge_cap / 2).max(MIN_EDGE_CAP.min(self.max_edges));
            self.glow = false;
        } else if self.fast_streak >= QUALITY_STREAK_FRAMES {
            self.fast_streak = 0;
            self.edge_cap = self.edge_cap.saturating_mul(2).min(self.max_edges);
            self.glow = true;
        }

        let changed = before != (self.edge_cap, self.glow);
        if changed {
            tracing::debug!(ema_ms = self.ema_ms, edge_cap = self.edge_cap, glow = self.glow, "render quality changed");
        }
        changed
    }

    #[must_use]
    pub fn ema_ms(&self) -> f64 {
        self.ema_ms
    }

    #[must_use]
    pub fn edge_cap(&self) -> usize {
        self.edge_cap
    }

    #[must_use]
    pub fn glow_enabled(&self) -> bool {
        self.glow
    }
}

// =============================================================
// Scene drawing
// =============================================================

/// Per-frame switches.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions<'a> {
    pub show_links: bool,
    pub show_aging: bool,
    /// User toggle and governor combined.
    pub glow: bool,
    /// Edges beyond this many are not drawn.
    pub edge_cap: usize,
    pub wip_limit: Option<usize>,
    pub now_ms: f64,
    pub hovered: Option<&'a NodeRef>,
    pub pending: Option<&'a PendingTransaction>,
}

impl Default for RenderOptions<'_> {
    fn default() -> Self {
        Self {
            show_links: true,
            show_aging: false,
            glow: true,
            edge_cap: usize::MAX,
            wip_limit: None,
            now_ms: 0.0,
            hovered: None,
            pending: None,
        }
    }
}

/// What one frame drew.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub domains: usize,
    pub projects: usize,
    pub tasks: usize,
    pub edges: usize,
    /// Nodes left out because their geometry is not finite.
    pub skipped: usize,
}

/// Draw one frame.
///
/// # Errors
///
/// Propagates the first painter failure.
pub fn draw_scene(
    painter: &mut dyn Painter,
    scene: &SceneGraph,
    camera: &Camera,
    options: &RenderOptions<'_>,
) -> Result<DrawStats, RenderError> {
    let (width, height) = camera.viewport();
    painter.begin_frame(width, height, camera.transform())?;

    let visible = scene.get_visible(camera);
    let mut stats = DrawStats {
        skipped: scene.nodes().iter().filter(|n| !n.is_finite()).count(),
        ..DrawStats::default()
    };
    let doing = doing_per_project(scene);

    for node in visible.iter().filter(|n| n.kind == NodeKind::Domain) {
        draw_container(painter, node, DOMAIN_FILL, None)?;
        stats.domains += 1;
    }

    for node in visible.iter().filter(|n| n.kind == NodeKind::Project) {
        let over_wip = options.wip_limit.is_some_and(|limit| doing.get(node.id.as_str()).copied().unwrap_or(0) > limit);
        draw_container(painter, node, PROJECT_FILL, over_wip.then_some(WIP_STROKE))?;
        stats.projects += 1;
    }

    if options.show_links {
        stats.edges = draw_edges(painter, scene, &visible, options.edge_cap)?;
    }

    for node in visible.iter().filter(|n| n.kind == NodeKind::Task) {
        draw_task(painter, node, options)?;
        stats.tasks += 1;
    }

    if let Some(node) = options.hovered.and_then(|target| scene.get(target)).filter(|n| n.is_finite()) {
        painter.circle(node.center(), node.r + HOVER_OUTLINE_GAP, &ShapeStyle::stroked(HOVER_STROKE, 2.0))?;
    }
    if let Some(pending) = options.pending {
        draw_pending(painter, scene, pending)?;
    }

    painter.end_frame()?;
    Ok(stats)
}

/// Opacity of a task last touched at `updated_at`: full when fresh, fading
/// linearly to the minimum over the aging window.
#[must_use]
pub fn aging_alpha(updated_at: Option<i64>, now_ms: f64) -> f64 {
    let Some(updated_at) = updated_at else {
        return 1.0;
    };
    #[allow(clippy::cast_precision_loss)]
    let age_days = ((now_ms - updated_at as f64) / MS_PER_DAY).max(0.0);
    let t = (age_days / AGING_FULL_DAYS).min(1.0);
    1.0 - t * (1.0 - AGING_MIN_ALPHA)
}

fn doing_per_project(scene: &SceneGraph) -> HashMap<&str, usize> {
    let mut doing = HashMap::new();
    let active = scene.nodes().iter().filter_map(|n| n.record.as_task()).filter(|t| t.status == TaskStatus::Doing);
    for pid in active.filter_map(|t| t.project_id.as_deref()) {
        *doing.entry(pid).or_insert(0) += 1;
    }
    doing
}

fn draw_container(
    painter: &mut dyn Painter,
    node: &SceneNode,
    default_fill: &str,
    warning: Option<&str>,
) -> Result<(), RenderError> {
    let style = ShapeStyle {
        fill: Some(node.record.color().unwrap_or(default_fill)),
        stroke: Some(warning.unwrap_or(OUTLINE_STROKE)),
        line_width: if warning.is_some() { 3.0 } else { 1.0 },
        ..ShapeStyle::default()
    };
    painter.circle(node.center(), node.r, &style)?;
    let title_at = Point::new(node.x, node.y - node.r * 0.8);
    painter.label(title_at, node.record.title(), &ShapeStyle::filled(LABEL_FILL))
}

fn draw_edges(
    painter: &mut dyn Painter,
    scene: &SceneGraph,
    visible: &[&SceneNode],
    cap: usize,
) -> Result<usize, RenderError> {
    let on_screen: HashSet<&str> = visible.iter().map(|n| n.id.as_str()).collect();
    let style = ShapeStyle { alpha: 0.6, ..ShapeStyle::stroked(EDGE_STROKE, 1.0) };
    let mut drawn = 0;
    for edge in scene.edges().iter().take(cap) {
        if !on_screen.contains(edge.a.as_str()) && !on_screen.contains(edge.b.as_str()) {
            continue;
        }
        let a = scene.get_node(NodeKind::Task, &edge.a);
        let b = scene.get_node(NodeKind::Task, &edge.b);
        let (Some(a), Some(b)) = (a, b) else {
            continue;
        };
        if !a.is_finite() || !b.is_finite() {
            continue;
        }
        painter.line(a.center(), b.center(), &style)?;
        drawn += 1;
    }
    Ok(drawn)
}

fn draw_task(painter: &mut dyn Painter, node: &SceneNode, options: &RenderOptions<'_>) -> Result<(), RenderError> {
    let Record::Task(task) = &node.record else {
        return Ok(());
    };
    let fill = match (task.color.as_deref(), task.status) {
        (Some(color), _) => color,
        (None, TaskStatus::Done) => DONE_FILL,
        (None, _) => TASK_FILL,
    };
    let style = ShapeStyle {
        fill: Some(fill),
        stroke: Some(OUTLINE_STROKE),
        alpha: if options.show_aging { aging_alpha(task.updated_at, options.now_ms) } else { 1.0 },
        glow: options.glow && task.status == TaskStatus::Doing,
        ..ShapeStyle::default()
    };
    painter.circle(node.center(), node.r, &style)
}

fn draw_pending(
    painter: &mut dyn Painter,
    scene: &SceneGraph,
    pending: &PendingTransaction,
) -> Result<(), RenderError> {
    let Some(task) = scene.get_node(NodeKind::Task, &pending.task_id).filter(|n| n.is_finite()) else {
        return Ok(());
    };
    let target = pending.to_parent.as_ref().and_then(|p| scene.get(p)).filter(|n| n.is_finite());
    let dashed = ShapeStyle { dashed: true, ..ShapeStyle::stroked(PENDING_STROKE, 2.0) };
    if let Some(target) = target {
        painter.line(target.center(), task.center(), &dashed)?;
        painter.circle(target.center(), target.r, &ShapeStyle::stroked(PENDING_STROKE, 3.0))?;
    }
    painter.circle(task.center(), task.r + HOVER_OUTLINE_GAP, &dashed)
}
