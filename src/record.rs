//! Record model: domains, projects and tasks, and the in-memory store.
//!
//! Records are owned by the host application; the engine reads them to build
//! the scene and rewrites their parent links and manual positions when a
//! drag is committed. `Record` is a closed union so every parent link is an
//! explicit `Option` rather than a field that may or may not exist.
//!
//! All mutation goes through [`RecordStore::apply_placement`], which is the
//! single record-graph mutator used by the transaction layer.

#[cfg(test)]
#[path = "record_test.rs"]
mod record_test;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::{TASK_BASE_RADIUS, TASK_MAX_PRIORITY, TASK_PRIORITY_STEP};

/// Opaque record identifier, unique within its collection.
pub type RecordId = String;

/// Manual position override in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pos {
    pub x: f64,
    pub y: f64,
}

impl Pos {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The three record kinds, in containment order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Domain,
    Project,
    Task,
}

impl NodeKind {
    /// Fixed draw and hit-test order: domain < project < task < link.
    #[must_use]
    pub fn z_index(self) -> u8 {
        match self {
            Self::Domain => 0,
            Self::Project => 1,
            Self::Task => 2,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain => f.write_str("domain"),
            Self::Project => f.write_str("project"),
            Self::Task => f.write_str("task"),
        }
    }
}

/// Z-index of tag edges; always above every node kind.
pub const LINK_Z_INDEX: u8 = 3;

/// Workflow status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Todo,
    Doing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub pos: Option<Pos>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub pos: Option<Pos>,
    #[serde(default)]
    pub domain_id: Option<RecordId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub pos: Option<Pos>,
    #[serde(default)]
    pub project_id: Option<RecordId>,
    #[serde(default)]
    pub domain_id: Option<RecordId>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: TaskStatus,
    /// 0 (lowest) to 3; higher priorities draw larger circles.
    #[serde(default)]
    pub priority: u8,
    /// Last update time in epoch milliseconds, used by the aging overlay.
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl Task {
    /// A todo task with no parent, tags or position.
    #[must_use]
    pub fn new(id: impl Into<RecordId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            color: None,
            pos: None,
            project_id: None,
            domain_id: None,
            tags: Vec::new(),
            status: TaskStatus::Todo,
            priority: 0,
            updated_at: None,
        }
    }

    /// Drawn radius of this task.
    #[must_use]
    pub fn radius(&self) -> f64 {
        task_radius(self.priority)
    }
}

/// Drawn radius for a task of the given priority.
#[must_use]
pub fn task_radius(priority: u8) -> f64 {
    TASK_BASE_RADIUS + f64::from(priority.min(TASK_MAX_PRIORITY)) * TASK_PRIORITY_STEP
}

/// Any record the engine can place on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Record {
    Domain(Domain),
    Project(Project),
    Task(Task),
}

impl Record {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Domain(d) => &d.id,
            Self::Project(p) => &p.id,
            Self::Task(t) => &t.id,
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::Domain(d) => &d.title,
            Self::Project(p) => &p.title,
            Self::Task(t) => &t.title,
        }
    }

    #[must_use]
    pub fn color(&self) -> Option<&str> {
        match self {
            Self::Domain(d) => d.color.as_deref(),
            Self::Project(p) => p.color.as_deref(),
            Self::Task(t) => t.color.as_deref(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Domain(_) => NodeKind::Domain,
            Self::Project(_) => NodeKind::Project,
            Self::Task(_) => NodeKind::Task,
        }
    }

    #[must_use]
    pub fn as_task(&self) -> Option<&Task> {
        match self {
            Self::Task(t) => Some(t),
            _ => None,
        }
    }
}

/// A `{type, id}` pair naming one record.
///
/// Callers hand the transaction layer scene nodes, records, or raw pairs;
/// all of them normalize into this before reaching the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub kind: NodeKind,
    pub id: RecordId,
}

impl NodeRef {
    #[must_use]
    pub fn new(kind: NodeKind, id: impl Into<RecordId>) -> Self {
        Self { kind, id: id.into() }
    }

    #[must_use]
    pub fn task(id: impl Into<RecordId>) -> Self {
        Self::new(NodeKind::Task, id)
    }

    #[must_use]
    pub fn project(id: impl Into<RecordId>) -> Self {
        Self::new(NodeKind::Project, id)
    }

    #[must_use]
    pub fn domain(id: impl Into<RecordId>) -> Self {
        Self::new(NodeKind::Domain, id)
    }
}

impl From<&Record> for NodeRef {
    fn from(record: &Record) -> Self {
        Self::new(record.kind(), record.id())
    }
}

impl From<(NodeKind, &str)> for NodeRef {
    fn from((kind, id): (NodeKind, &str)) -> Self {
        Self::new(kind, id)
    }
}

impl From<&NodeRef> for NodeRef {
    fn from(r: &NodeRef) -> Self {
        r.clone()
    }
}

/// The parent links and manual position of a record.
///
/// Domains only use `pos`; projects use `domain_id` and `pos`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Placement {
    pub project_id: Option<RecordId>,
    pub domain_id: Option<RecordId>,
    pub pos: Option<Pos>,
}

/// Error returned by record-graph mutations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MutationError {
    /// The referenced record no longer exists.
    #[error("{kind} `{id}` not found")]
    MissingRecord { kind: NodeKind, id: RecordId },
    /// The parent kind cannot contain the child kind.
    #[error("a {parent} cannot contain a {child}")]
    InvalidParent { parent: NodeKind, child: NodeKind },
    /// Only tasks can be detached from their parent.
    #[error("a {0} cannot be detached")]
    NotDetachable(NodeKind),
}

impl MutationError {
    pub(crate) fn missing(target: &NodeRef) -> Self {
        Self::MissingRecord { kind: target.kind, id: target.id.clone() }
    }
}

/// In-memory store of all records, in host order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordStore {
    #[serde(default)]
    pub domains: Vec<Domain>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl RecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a store from JSON `{domains, projects, tasks}`.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error for malformed input.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    #[must_use]
    pub fn domain(&self, id: &str) -> Option<&Domain> {
        self.domains.iter().find(|d| d.id == id)
    }

    #[must_use]
    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    #[must_use]
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Tasks whose `project_id` names `project_id`, in store order.
    pub fn tasks_in_project<'a>(&'a self, project_id: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks.iter().filter(move |t| t.project_id.as_deref() == Some(project_id))
    }

    /// Projects whose `domain_id` names `domain_id`, in store order.
    pub fn projects_in_domain<'a>(&'a self, domain_id: &'a str) -> impl Iterator<Item = &'a Project> + 'a {
        self.projects.iter().filter(move |p| p.domain_id.as_deref() == Some(domain_id))
    }

    /// Clone of the referenced record.
    #[must_use]
    pub fn record(&self, target: &NodeRef) -> Option<Record> {
        match target.kind {
            NodeKind::Domain => self.domain(&target.id).cloned().map(Record::Domain),
            NodeKind::Project => self.project(&target.id).cloned().map(Record::Project),
            NodeKind::Task => self.task(&target.id).cloned().map(Record::Task),
        }
    }

    #[must_use]
    pub fn contains(&self, target: &NodeRef) -> bool {
        match target.kind {
            NodeKind::Domain => self.domain(&target.id).is_some(),
            NodeKind::Project => self.project(&target.id).is_some(),
            NodeKind::Task => self.task(&target.id).is_some(),
        }
    }

    /// Domain a task belongs to: its project's domain, else its own `domain_id`.
    #[must_use]
    pub fn owning_domain(&self, task: &Task) -> Option<RecordId> {
        match task.project_id.as_deref().and_then(|pid| self.project(pid)) {
            Some(project) => project.domain_id.clone(),
            None => task.domain_id.clone(),
        }
    }

    /// Current placement of a record.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::MissingRecord`] when the record is gone.
    pub fn placement(&self, target: &NodeRef) -> Result<Placement, MutationError> {
        let placement = match target.kind {
            NodeKind::Domain => self.domain(&target.id).map(|d| Placement { pos: d.pos, ..Placement::default() }),
            NodeKind::Project => self
                .project(&target.id)
                .map(|p| Placement { domain_id: p.domain_id.clone(), pos: p.pos, ..Placement::default() }),
            NodeKind::Task => self.task(&target.id).map(|t| Placement {
                project_id: t.project_id.clone(),
                domain_id: t.domain_id.clone(),
                pos: t.pos,
            }),
        };
        placement.ok_or_else(|| MutationError::missing(target))
    }

    /// Overwrite the placement fields of a record.
    ///
    /// Fields a kind does not carry are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::MissingRecord`] when the record is gone.
    pub fn apply_placement(&mut self, target: &NodeRef, placement: &Placement) -> Result<(), MutationError> {
        match target.kind {
            NodeKind::Domain => {
                let domain =
                    self.domains.iter_mut().find(|d| d.id == target.id).ok_or_else(|| MutationError::missing(target))?;
                domain.pos = placement.pos;
            }
            NodeKind::Project => {
                let project =
                    self.projects.iter_mut().find(|p| p.id == target.id).ok_or_else(|| MutationError::missing(target))?;
                project.domain_id.clone_from(&placement.domain_id);
                project.pos = placement.pos;
            }
            NodeKind::Task => {
                let task = self.task_mut(&target.id).ok_or_else(|| MutationError::missing(target))?;
                task.project_id.clone_from(&placement.project_id);
                task.domain_id.clone_from(&placement.domain_id);
                task.pos = placement.pos;
            }
        }
        Ok(())
    }
}
