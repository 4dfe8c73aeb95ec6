//! Scene graph: the laid-out, hit-testable projection of the record store.
//!
//! The graph is rebuilt from scratch by [`SceneGraph::rebuild`]; callers mark
//! it dirty after any record mutation and the engine rebuilds before the
//! next read. Drags move nodes in place with [`SceneGraph::move_subtree`]
//! without a relayout.

#[cfg(test)]
#[path = "scene_test.rs"]
mod scene_test;

use std::collections::HashMap;

use serde::Serialize;

use crate::camera::{BBox, Camera, Point};
use crate::consts::{CULL_MARGIN_PX, HIT_INFLATE_DOMAIN, HIT_INFLATE_PROJECT, HIT_INFLATE_TASK};
use crate::layout::{self, Edge, Layout, LayoutParams};
use crate::record::{NodeKind, NodeRef, Record, RecordId, RecordStore};

/// A positioned record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneNode {
    pub id: RecordId,
    pub kind: NodeKind,
    pub x: f64,
    pub y: f64,
    pub r: f64,
    pub z_index: u8,
    pub record: Record,
}

impl SceneNode {
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Finite center and a positive finite radius.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.r.is_finite() && self.r > 0.0
    }

    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        self.is_finite() && self.center().distance(p) <= self.r
    }

    /// Extra pick radius used by [`SceneGraph::hit_test`].
    #[must_use]
    pub fn hit_inflation(&self) -> f64 {
        match self.kind {
            NodeKind::Task => HIT_INFLATE_TASK,
            NodeKind::Project => HIT_INFLATE_PROJECT,
            NodeKind::Domain => HIT_INFLATE_DOMAIN,
        }
    }

    /// Whether this node sits inside the domain `domain_id`, directly or via a project.
    fn belongs_to_domain(&self, domain_id: &str, store: &RecordStore) -> bool {
        match &self.record {
            Record::Domain(d) => d.id == domain_id,
            Record::Project(p) => p.domain_id.as_deref() == Some(domain_id),
            Record::Task(t) => store.owning_domain(t).as_deref() == Some(domain_id),
        }
    }
}

impl From<&SceneNode> for NodeRef {
    fn from(node: &SceneNode) -> Self {
        NodeRef::new(node.kind, node.id.clone())
    }
}

/// Rebuildable index of scene nodes.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
    edges: Vec<Edge>,
    index: HashMap<NodeKind, HashMap<RecordId, usize>>,
    dirty: bool,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self { nodes: Vec::new(), edges: Vec::new(), index: HashMap::new(), dirty: true }
    }
}

impl SceneGraph {
    /// An empty graph that still needs its first rebuild.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute every node from the records.
    pub fn rebuild(&mut self, store: &RecordStore, params: &LayoutParams) {
        let Layout { nodes, edges } = layout::layout(store, params);
        self.index.clear();
        for (i, n) in nodes.iter().enumerate() {
            self.index.entry(n.kind).or_default().insert(n.id.clone(), i);
        }
        self.nodes = nodes;
        self.edges = edges;
        self.dirty = false;
        tracing::debug!(nodes = self.nodes.len(), edges = self.edges.len(), "scene rebuilt");
    }

    /// Flag the graph for a rebuild before the next read.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node of `kind` with `id`. Ids are only unique within a kind.
    #[must_use]
    pub fn get_node(&self, kind: NodeKind, id: &str) -> Option<&SceneNode> {
        self.slot(kind, id).and_then(|i| self.nodes.get(i))
    }

    #[must_use]
    pub fn get(&self, target: &NodeRef) -> Option<&SceneNode> {
        self.get_node(target.kind, &target.id)
    }

    fn slot(&self, kind: NodeKind, id: &str) -> Option<usize> {
        self.index.get(&kind).and_then(|ids| ids.get(id)).copied()
    }

    #[must_use]
    pub fn get_by_type(&self, kind: NodeKind) -> Vec<&SceneNode> {
        self.nodes.iter().filter(|n| n.kind == kind).collect()
    }

    /// Move one node's center. Returns `false` for unknown nodes or non-finite points.
    pub fn set_node_position(&mut self, target: &NodeRef, at: Point) -> bool {
        if !at.is_finite() {
            return false;
        }
        let Some(node) = self.slot(target.kind, &target.id).and_then(|i| self.nodes.get_mut(i)) else {
            return false;
        };
        node.x = at.x;
        node.y = at.y;
        true
    }

    /// Move a node to `at` and shift everything it contains by the same delta.
    ///
    /// Containment follows the records: a domain carries its projects and
    /// their tasks plus its belt tasks; a project carries its tasks.
    pub fn move_subtree(&mut self, target: &NodeRef, at: Point) -> bool {
        let Some(node) = self.get(target) else {
            return false;
        };
        if !at.is_finite() {
            return false;
        }
        let (dx, dy) = (at.x - node.x, at.y - node.y);
        let id = target.id.as_str();

        let carried: Vec<usize> = match target.kind {
            NodeKind::Task => Vec::new(),
            NodeKind::Project => self
                .nodes
                .iter()
                .enumerate()
                .filter(|(_, n)| n.record.as_task().is_some_and(|t| t.project_id.as_deref() == Some(id)))
                .map(|(i, _)| i)
                .collect(),
            NodeKind::Domain => {
                let projects: Vec<&str> = self
                    .nodes
                    .iter()
                    .filter_map(|n| match &n.record {
                        Record::Project(p) if p.domain_id.as_deref() == Some(id) => Some(p.id.as_str()),
                        _ => None,
                    })
                    .collect();
                self.nodes
                    .iter()
                    .enumerate()
                    .filter(|(_, n)| match &n.record {
                        Record::Project(p) => p.domain_id.as_deref() == Some(id),
                        Record::Task(t) => match t.project_id.as_deref() {
                            Some(pid) if projects.contains(&pid) => true,
                            Some(pid) if self.slot(NodeKind::Project, pid).is_some() => false,
                            _ => t.domain_id.as_deref() == Some(id),
                        },
                        Record::Domain(_) => false,
                    })
                    .map(|(i, _)| i)
                    .collect()
            }
        };

        self.set_node_position(target, at);
        for i in carried {
            if let Some(n) = self.nodes.get_mut(i) {
                n.x += dx;
                n.y += dy;
            }
        }
        true
    }

    /// Direct pointer hit: among nodes whose drawn circle contains `world`,
    /// the topmost layer wins and the nearest center breaks ties within it.
    #[must_use]
    pub fn hit(&self, world: Point) -> Option<&SceneNode> {
        self.nodes.iter().filter(|n| n.contains(world)).min_by(|a, b| {
            b.z_index.cmp(&a.z_index).then_with(|| a.center().distance(world).total_cmp(&b.center().distance(world)))
        })
    }

    /// Nearest node of `kind` whose circle, grown by `slack`, contains `world`.
    #[must_use]
    pub fn containing(&self, world: Point, kind: NodeKind, slack: f64) -> Option<&SceneNode> {
        self.nodes
            .iter()
            .filter(|n| n.kind == kind && n.is_finite() && n.center().distance(world) <= n.r + slack)
            .min_by(|a, b| a.center().distance(world).total_cmp(&b.center().distance(world)))
    }

    /// Every node within its inflated pick radius (plus `radius`) of `(x, y)`,
    /// nearest center first.
    #[must_use]
    pub fn hit_test(&self, x: f64, y: f64, radius: Option<f64>) -> Vec<&SceneNode> {
        let p = Point::new(x, y);
        let extra = radius.unwrap_or(0.0).max(0.0);
        let mut hits: Vec<(&SceneNode, f64)> = self
            .nodes
            .iter()
            .filter(|n| n.is_finite())
            .map(|n| (n, n.center().distance(p)))
            .filter(|(n, d)| *d <= n.r + n.hit_inflation() + extra)
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| b.0.z_index.cmp(&a.0.z_index)));
        hits.into_iter().map(|(n, _)| n).collect()
    }

    /// Nodes overlapping the camera's viewport plus a screen-space margin,
    /// in draw order.
    #[must_use]
    pub fn get_visible(&self, camera: &Camera) -> Vec<&SceneNode> {
        let (w, h) = camera.viewport();
        let top_left = camera.screen_to_world(Point::new(-CULL_MARGIN_PX, -CULL_MARGIN_PX));
        let bottom_right = camera.screen_to_world(Point::new(w + CULL_MARGIN_PX, h + CULL_MARGIN_PX));

        let mut visible: Vec<&SceneNode> = self
            .nodes
            .iter()
            .filter(|n| {
                n.is_finite()
                    && n.x + n.r >= top_left.x
                    && n.x - n.r <= bottom_right.x
                    && n.y + n.r >= top_left.y
                    && n.y - n.r <= bottom_right.y
            })
            .collect();
        visible.sort_by_key(|n| n.z_index);
        visible
    }

    /// Bounds of every finite node.
    #[must_use]
    pub fn bbox(&self) -> Option<BBox> {
        self.bbox_where(|_| true)
    }

    /// Bounds of the named nodes. Unknown ids are ignored; an id shared by
    /// several kinds covers each of them.
    #[must_use]
    pub fn bbox_of(&self, ids: &[&str]) -> Option<BBox> {
        self.bbox_where(|n| ids.contains(&n.id.as_str()))
    }

    /// Bounds of the finite nodes matching `pred`.
    #[must_use]
    pub fn bbox_where(&self, pred: impl Fn(&SceneNode) -> bool) -> Option<BBox> {
        self.nodes
            .iter()
            .filter(|n| n.is_finite() && pred(n))
            .map(|n| BBox::around_circle(n.center(), n.r))
            .reduce(BBox::union)
    }

    /// Bounds of a domain and everything it contains.
    #[must_use]
    pub fn domain_bbox(&self, domain_id: &str, store: &RecordStore) -> Option<BBox> {
        self.bbox_where(|n| n.belongs_to_domain(domain_id, store))
    }

    /// Bounds of a project and its tasks.
    #[must_use]
    pub fn project_bbox(&self, project_id: &str) -> Option<BBox> {
        self.bbox_where(|n| {
            (n.id == project_id && n.kind == NodeKind::Project)
                || n.record.as_task().is_some_and(|t| t.project_id.as_deref() == Some(project_id))
        })
    }
}
