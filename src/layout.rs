//! Layout engine: records in, positioned circles and tag edges out.
//!
//! DESIGN
//! ======
//! Layout is a pure function of the record store and [`LayoutParams`], so the
//! same records always produce the same scene. Containment is strict:
//!
//! 1. Domains sit on one horizontal line, fixed radius, centered as a group.
//! 2. Projects orbit inside their domain. A project is sized from the area of
//!    its tasks and clamped so it never outgrows `domain_r - margin`.
//! 3. Tasks inside a project are packed into concentric rings whose spacing
//!    is derived from the largest sibling, so equal-sized tasks never overlap.
//! 4. Projects without a known domain form a row below the domains and
//!    only appear when no domain filter is active.
//! 5. Independent tasks use their manual position, a golden-angle belt around
//!    their domain, or a grid right of every domain and orphan project.
//! 6. Edges connect tasks that share a tag, with per-tag and global caps.
//!
//! KNOWN LIMITATION
//! ================
//! When a project's rings are full, remaining tasks are appended to the
//! outermost ring without re-checking spacing. Containment still holds but
//! siblings in that ring can overlap at high task counts. The same holds for
//! [`next_ring_slot`] once no slot is clear.

#[cfg(test)]
#[path = "layout_test.rs"]
mod layout_test;

use std::collections::{BTreeMap, HashSet};
use std::f64::consts::{FRAC_PI_2, TAU};

use crate::camera::Point;
use crate::config::LayoutMode;
use crate::consts::{
    BELT_OFFSET, DOMAIN_GAP, DOMAIN_RADIUS, GOLDEN_ANGLE, GRID_CELL, GRID_COLUMNS, GRID_GAP, MAX_TAG_FANOUT,
    PROJECT_AREA_FACTOR, PROJECT_MARGIN, PROJECT_MIN_RADIUS, RING_SPACING_FACTOR, TASK_MARGIN,
};
use crate::record::{Domain, NodeKind, Project, Record, RecordId, RecordStore, Task};
use crate::scene::SceneNode;

/// Inputs besides the records themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutParams {
    /// Only this domain (and what it contains) is laid out when set.
    pub active_domain: Option<RecordId>,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub mode: LayoutMode,
    /// Maximum number of edges to emit.
    pub edge_cap: usize,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            active_domain: None,
            viewport_width: 0.0,
            viewport_height: 0.0,
            mode: LayoutMode::Auto,
            edge_cap: crate::config::DEFAULT_MAX_EDGES,
        }
    }
}

/// A derived connection between two tasks sharing `tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub a: RecordId,
    pub b: RecordId,
    pub tag: String,
}

/// Output of [`layout`].
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub nodes: Vec<SceneNode>,
    pub edges: Vec<Edge>,
}

/// Position every visible record.
#[must_use]
pub fn layout(store: &RecordStore, params: &LayoutParams) -> Layout {
    let mut nodes = Vec::new();

    let domains: Vec<&Domain> = store
        .domains
        .iter()
        .filter(|d| params.active_domain.as_ref().is_none_or(|active| *active == d.id))
        .collect();

    let spacing = 2.0 * DOMAIN_RADIUS + DOMAIN_GAP;
    let span = spacing * domains.len().saturating_sub(1) as f64;
    let start_x = params.viewport_width * 0.5 - span * 0.5;
    let line_y = params.viewport_height * 0.5;

    for (i, domain) in domains.iter().enumerate() {
        let center = match domain.pos {
            Some(pos) => Point::new(pos.x, pos.y),
            None => Point::new(start_x + spacing * i as f64, line_y),
        };
        nodes.push(node(Record::Domain((*domain).clone()), center, DOMAIN_RADIUS));
        place_projects(store, domain, center, params.mode, &mut nodes);
        place_belt_tasks(store, domain, center, &mut nodes);
    }

    if params.active_domain.is_none() {
        place_orphan_projects(store, params, &mut nodes);
        place_free_tasks(store, params, &mut nodes);
    }

    let edges = tag_edges(&nodes, params.edge_cap);
    Layout { nodes, edges }
}

fn node(record: Record, center: Point, r: f64) -> SceneNode {
    let kind = record.kind();
    SceneNode {
        id: record.id().to_string(),
        kind,
        x: center.x,
        y: center.y,
        r,
        z_index: kind.z_index(),
        record,
    }
}

/// Radius that hosts tasks of the given radii, clamped to what the domain allows.
#[must_use]
pub fn project_radius(task_radii: &[f64], domain_r: f64) -> f64 {
    let area: f64 = task_radii.iter().map(|r| std::f64::consts::PI * r * r).sum();
    let wanted = (PROJECT_AREA_FACTOR * area / std::f64::consts::PI).sqrt() + PROJECT_MARGIN;
    wanted.max(PROJECT_MIN_RADIUS).min(domain_r - PROJECT_MARGIN)
}

/// Spacing between concentric task rings for a given largest sibling.
#[must_use]
pub fn ring_spacing(max_task_r: f64) -> f64 {
    RING_SPACING_FACTOR * max_task_r + TASK_MARGIN
}

/// Offsets (relative to the project center) for `count` tasks.
///
/// A single task sits at the center. Otherwise ring `k` has radius
/// `k * spacing` and holds `floor(2π·R / spacing)` tasks; rings stop once a
/// task would cross the project rim. Tasks that do not fit spill onto the
/// outermost ring.
#[must_use]
pub fn ring_slots(count: usize, max_task_r: f64, project_r: f64) -> Vec<Point> {
    match count {
        0 => return Vec::new(),
        1 => return vec![Point::new(0.0, 0.0)],
        _ => {}
    }

    let spacing = ring_spacing(max_task_r);
    let limit = project_r - max_task_r;

    let mut rings: Vec<(f64, usize)> = Vec::new();
    let mut radius = spacing;
    while radius <= limit {
        let capacity = (TAU * radius / spacing).floor() as usize;
        rings.push((radius, capacity.max(1)));
        radius += spacing;
    }
    if rings.is_empty() {
        rings.push((limit.max(0.0), 1));
    }

    let mut per_ring = vec![0_usize; rings.len()];
    let mut remaining = count;
    for (slot, (_, capacity)) in per_ring.iter_mut().zip(&rings) {
        let take = remaining.min(*capacity);
        *slot = take;
        remaining -= take;
    }
    if remaining > 0 {
        tracing::debug!(count, spilled = remaining, rings = rings.len(), "task rings full, spilling onto outer ring");
    }
    if let Some(last) = per_ring.last_mut() {
        *last += remaining;
    }

    let mut out = Vec::with_capacity(count);
    for ((ring_r, _), n) in rings.iter().zip(per_ring) {
        let step = TAU / n.max(1) as f64;
        for j in 0..n {
            let angle = -FRAC_PI_2 + step * j as f64;
            out.push(Point::new(ring_r * angle.cos(), ring_r * angle.sin()));
        }
    }
    out
}

fn place_projects(store: &RecordStore, domain: &Domain, center: Point, mode: LayoutMode, nodes: &mut Vec<SceneNode>) {
    let projects: Vec<&Project> = store.projects_in_domain(&domain.id).collect();
    let step = TAU / projects.len().max(1) as f64;

    for (i, project) in projects.iter().enumerate() {
        let r = project_radius(&task_radii(store, project), DOMAIN_RADIUS);
        let project_center = match project.pos {
            Some(pos) => Point::new(pos.x, pos.y),
            None => {
                let orbit = (DOMAIN_RADIUS - r - PROJECT_MARGIN).max(0.0);
                let angle = -FRAC_PI_2 + step * i as f64;
                Point::new(center.x + orbit * angle.cos(), center.y + orbit * angle.sin())
            }
        };
        place_project(store, project, project_center, r, mode, nodes);
    }
}

/// Projects with no domain, or naming one that does not exist, sit on a row
/// below the domain line.
fn place_orphan_projects(store: &RecordStore, params: &LayoutParams, nodes: &mut Vec<SceneNode>) {
    let orphans: Vec<&Project> = store
        .projects
        .iter()
        .filter(|p| p.domain_id.as_deref().is_none_or(|d| store.domain(d).is_none()))
        .collect();
    if orphans.is_empty() {
        return;
    }

    let domain_nodes = nodes.iter().filter(|n| n.kind == NodeKind::Domain);
    let left = domain_nodes.clone().map(|n| n.x - n.r).fold(f64::INFINITY, f64::min);
    let bottom = domain_nodes.map(|n| n.y + n.r).fold(f64::NEG_INFINITY, f64::max);
    let (mut x, row_top) = if left.is_finite() && bottom.is_finite() {
        (left, bottom + GRID_GAP)
    } else {
        (params.viewport_width * 0.5, params.viewport_height * 0.5)
    };

    for project in orphans {
        let r = project_radius(&task_radii(store, project), DOMAIN_RADIUS);
        let project_center = match project.pos {
            Some(pos) => Point::new(pos.x, pos.y),
            None => {
                let at = Point::new(x + r, row_top + r);
                x += 2.0 * r + GRID_GAP;
                at
            }
        };
        place_project(store, project, project_center, r, params.mode, nodes);
    }
}

fn task_radii(store: &RecordStore, project: &Project) -> Vec<f64> {
    store.tasks_in_project(&project.id).map(Task::radius).collect()
}

/// Push the project node and ring its tasks inside it.
fn place_project(
    store: &RecordStore,
    project: &Project,
    center: Point,
    r: f64,
    mode: LayoutMode,
    nodes: &mut Vec<SceneNode>,
) {
    nodes.push(node(Record::Project(project.clone()), center, r));

    let tasks: Vec<&Task> = store.tasks_in_project(&project.id).collect();
    let honors_pos = |t: &Task| mode == LayoutMode::Manual && t.pos.is_some();
    let ringed: Vec<&Task> = tasks.iter().copied().filter(|t| !honors_pos(t)).collect();
    let max_r = ringed.iter().map(|t| t.radius()).fold(0.0, f64::max);
    let mut slots = ring_slots(ringed.len(), max_r, r).into_iter();

    for task in &tasks {
        let at = match task.pos {
            Some(pos) if honors_pos(task) => Point::new(pos.x, pos.y),
            _ => {
                let offset = slots.next().unwrap_or(Point::new(0.0, 0.0));
                Point::new(center.x + offset.x, center.y + offset.y)
            }
        };
        nodes.push(node(Record::Task((*task).clone()), at, task.radius()));
    }
}

/// Whether a task is owned by a project that exists in the store.
fn in_known_project(store: &RecordStore, task: &Task) -> bool {
    task.project_id.as_deref().is_some_and(|pid| store.project(pid).is_some())
}

fn place_belt_tasks(store: &RecordStore, domain: &Domain, center: Point, nodes: &mut Vec<SceneNode>) {
    let belt_r = DOMAIN_RADIUS + BELT_OFFSET;
    let mut auto_index = 0_usize;

    let belt = store
        .tasks
        .iter()
        .filter(|t| !in_known_project(store, t) && t.domain_id.as_deref() == Some(domain.id.as_str()));
    for task in belt {
        let at = match task.pos {
            Some(pos) => Point::new(pos.x, pos.y),
            None => {
                let angle = GOLDEN_ANGLE * auto_index as f64;
                auto_index += 1;
                Point::new(center.x + belt_r * angle.cos(), center.y + belt_r * angle.sin())
            }
        };
        nodes.push(node(Record::Task(task.clone()), at, task.radius()));
    }
}

fn place_free_tasks(store: &RecordStore, params: &LayoutParams, nodes: &mut Vec<SceneNode>) {
    let containers = nodes.iter().filter(|n| n.kind != NodeKind::Task);
    let right = containers.clone().map(|n| n.x + n.r).fold(f64::NEG_INFINITY, f64::max);
    let top = containers.map(|n| n.y - n.r).fold(f64::INFINITY, f64::min);
    let origin = if right.is_finite() && top.is_finite() {
        Point::new(right + GRID_GAP, top)
    } else {
        Point::new(params.viewport_width * 0.5, params.viewport_height * 0.5)
    };

    let known_domain = |t: &Task| t.domain_id.as_deref().is_some_and(|d| store.domain(d).is_some());
    let free = store.tasks.iter().filter(|t| !in_known_project(store, t) && !known_domain(t));

    let mut grid_index = 0_usize;
    for task in free {
        let at = match task.pos {
            Some(pos) => Point::new(pos.x, pos.y),
            None => {
                let col = grid_index % GRID_COLUMNS;
                let row = grid_index / GRID_COLUMNS;
                grid_index += 1;
                Point::new(origin.x + GRID_CELL * col as f64, origin.y + GRID_CELL * row as f64)
            }
        };
        nodes.push(node(Record::Task(task.clone()), at, task.radius()));
    }
}

/// Pair up tasks sharing a tag.
///
/// Tags are visited in sorted order so truncation is deterministic; tags
/// on more than [`MAX_TAG_FANOUT`] tasks are skipped and a pair linked by
/// several tags yields one edge.
#[must_use]
pub fn tag_edges(nodes: &[SceneNode], cap: usize) -> Vec<Edge> {
    let mut by_tag: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for n in nodes {
        if let Some(task) = n.record.as_task() {
            for tag in &task.tags {
                by_tag.entry(tag.as_str()).or_default().push(n.id.as_str());
            }
        }
    }

    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut edges = Vec::new();
    for (tag, ids) in by_tag {
        if ids.len() < 2 || ids.len() > MAX_TAG_FANOUT {
            continue;
        }
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                if a == b {
                    continue;
                }
                let key = if a < b { (*a, *b) } else { (*b, *a) };
                if seen.insert(key) {
                    edges.push(Edge { a: (*a).to_string(), b: (*b).to_string(), tag: tag.to_string() });
                }
            }
        }
    }
    edges.truncate(cap);
    edges
}

/// World position for a task of radius `incoming_r` joining `project`,
/// given the laid-out tasks already inside it.
///
/// Tries the slots of a ring layout grown by one, then a denser ring
/// layout, and takes the first slot clear of every sibling. When none is
/// clear the last slot of the grown layout is used.
#[must_use]
pub fn next_ring_slot(project: &SceneNode, siblings: &[&SceneNode], incoming_r: f64) -> Point {
    let max_r = siblings.iter().map(|n| n.r).fold(incoming_r, f64::max);
    let grown = ring_slots(siblings.len() + 1, max_r, project.r);
    let denser = ring_slots(2 * (siblings.len() + 1), max_r, project.r);
    let to_world = |offset: Point| Point::new(project.x + offset.x, project.y + offset.y);
    let clear = |at: &Point| {
        siblings.iter().filter(|n| n.is_finite()).all(|n| n.center().distance(*at) >= n.r + incoming_r)
    };

    grown
        .iter()
        .chain(&denser)
        .copied()
        .map(to_world)
        .find(clear)
        .or_else(|| grown.last().copied().map(to_world))
        .unwrap_or_else(|| project.center())
}
