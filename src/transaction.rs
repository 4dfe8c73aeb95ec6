//! Mutation transactions: attach, detach and move records, with a single
//! pending slot awaiting confirmation and a bounded undo ring.
//!
//! DESIGN
//! ======
//! Every mutation goes through [`apply`], which snapshots the target's
//! [`Placement`] before writing the new one and returns an [`UndoEntry`]
//! holding both. A mutation that leaves the placement unchanged returns
//! `None` and must not be pushed. Undo restores the `from` placement
//! verbatim and never pushes a new entry.
//!
//! Drops are planned, not applied, by [`plan_drop`]: the engine decides
//! whether to commit the returned [`Mutation`] directly or hold it in the
//! pending slot until the host confirms.

#[cfg(test)]
#[path = "transaction_test.rs"]
mod transaction_test;

use std::collections::VecDeque;

use crate::camera::Point;
use crate::config::LayoutMode;
use crate::consts::{BELT_OFFSET, BELT_WIDTH, DETACH_MARGIN, UNDO_CAPACITY};
use crate::layout::next_ring_slot;
use crate::record::{MutationError, NodeKind, NodeRef, Placement, Pos, RecordId, RecordStore};
use crate::scene::{SceneGraph, SceneNode};

// =============================================================================
// TYPES
// =============================================================================

/// A record-graph change, relative to the target it is applied to.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Put the target under `parent`, optionally at a manual position.
    Attach { parent: NodeRef, pos: Option<Pos> },
    /// Take a task out of its project, into `domain` (or none) at `pos`.
    Detach { domain: Option<RecordId>, pos: Pos },
    /// Change the target's parent and clear its manual position.
    MoveTo { parent: NodeRef },
    /// Keep the parents, change the manual position.
    Reposition { pos: Pos },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoKind {
    Attach,
    Detach,
    Move,
}

impl From<&Mutation> for UndoKind {
    fn from(m: &Mutation) -> Self {
        match m {
            Mutation::Attach { .. } => Self::Attach,
            Mutation::Detach { .. } => Self::Detach,
            Mutation::MoveTo { .. } | Mutation::Reposition { .. } => Self::Move,
        }
    }
}

/// One committed mutation, with enough state to reverse it.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoEntry {
    pub kind: UndoKind,
    pub target: NodeRef,
    pub from: Placement,
    pub to: Placement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    Attach,
    Detach,
}

/// A task drop waiting for the host to confirm or cancel.
///
/// The task's record is untouched while pending; only its scene node sits
/// at `candidate_pos`.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTransaction {
    pub kind: PendingKind,
    pub task_id: RecordId,
    pub from_parent: Option<NodeRef>,
    /// Project for an attach; containing domain (if any) for a detach.
    pub to_parent: Option<NodeRef>,
    pub candidate_pos: Pos,
}

impl PendingTransaction {
    #[must_use]
    pub fn target(&self) -> NodeRef {
        NodeRef::task(self.task_id.clone())
    }

    /// The mutation a confirm applies.
    #[must_use]
    pub fn mutation(&self, mode: LayoutMode) -> Mutation {
        match (self.kind, &self.to_parent) {
            (PendingKind::Attach, Some(parent)) => Mutation::Attach {
                parent: parent.clone(),
                pos: (mode == LayoutMode::Manual).then_some(self.candidate_pos),
            },
            (PendingKind::Attach, None) | (PendingKind::Detach, _) => Mutation::Detach {
                domain: self.to_parent.as_ref().map(|d| d.id.clone()),
                pos: self.candidate_pos,
            },
        }
    }
}

/// What a drop at a point should do.
#[derive(Debug, Clone, PartialEq)]
pub enum DropPlan {
    /// The dragged record no longer exists.
    Missing,
    /// Snap back; nothing changes.
    Unchanged,
    /// Apply immediately.
    Commit(Mutation),
    /// Ask the host first.
    Pending(PendingTransaction),
}

// =============================================================================
// UNDO RING
// =============================================================================

/// Bounded LIFO of committed mutations; the oldest entry falls off when full.
#[derive(Debug, Clone)]
pub struct UndoStack {
    entries: VecDeque<UndoEntry>,
    capacity: usize,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::with_capacity(UNDO_CAPACITY)
    }
}

impl UndoStack {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: VecDeque::with_capacity(capacity), capacity: capacity.max(1) }
    }

    pub fn push(&mut self, entry: UndoEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn pop(&mut self) -> Option<UndoEntry> {
        self.entries.pop_back()
    }

    #[must_use]
    pub fn peek(&self) -> Option<&UndoEntry> {
        self.entries.back()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// PENDING SLOT
// =============================================================================

/// The pending slot plus the undo ring.
#[derive(Debug, Clone, Default)]
pub struct Transactions {
    pending: Option<PendingTransaction>,
    pub undo: UndoStack,
}

impl Transactions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupy the pending slot. Returns `false`, leaving the slot as is, when
    /// another transaction is already pending.
    pub fn raise(&mut self, pending: PendingTransaction) -> bool {
        if self.pending.is_some() {
            return false;
        }
        tracing::debug!(task = %pending.task_id, kind = ?pending.kind, "pending transaction raised");
        self.pending = Some(pending);
        true
    }

    #[must_use]
    pub fn pending(&self) -> Option<&PendingTransaction> {
        self.pending.as_ref()
    }

    pub fn take_pending(&mut self) -> Option<PendingTransaction> {
        self.pending.take()
    }
}

// =============================================================================
// MUTATIONS
// =============================================================================

/// Apply `mutation` to `target`.
///
/// Returns the undo entry, or `None` when the placement did not change.
///
/// # Errors
///
/// `MissingRecord` if the target or parent is gone, `InvalidParent` when the
/// parent kind cannot hold the target, `NotDetachable` for non-task detaches.
pub fn apply(
    store: &mut RecordStore,
    target: &NodeRef,
    mutation: &Mutation,
) -> Result<Option<UndoEntry>, MutationError> {
    let from = store.placement(target)?;
    let to = match mutation {
        Mutation::Attach { parent, pos } => Placement { pos: *pos, ..parent_links(store, parent, target.kind)? },
        Mutation::MoveTo { parent } => parent_links(store, parent, target.kind)?,
        Mutation::Detach { domain, pos } => {
            if target.kind != NodeKind::Task {
                return Err(MutationError::NotDetachable(target.kind));
            }
            Placement {
                project_id: None,
                domain_id: domain.clone().filter(|d| store.domain(d).is_some()),
                pos: Some(*pos),
            }
        }
        Mutation::Reposition { pos } => Placement { pos: Some(*pos), ..from.clone() },
    };

    if from == to {
        return Ok(None);
    }
    store.apply_placement(target, &to)?;
    tracing::debug!(target_kind = %target.kind, id = %target.id, ?mutation, "mutation applied");
    Ok(Some(UndoEntry { kind: UndoKind::from(mutation), target: target.clone(), from, to }))
}

/// Parent links (no `pos`) for placing a `child` kind under `parent`.
fn parent_links(store: &RecordStore, parent: &NodeRef, child: NodeKind) -> Result<Placement, MutationError> {
    if !store.contains(parent) {
        return Err(MutationError::missing(parent));
    }
    match (parent.kind, child) {
        (NodeKind::Project, NodeKind::Task) => Ok(Placement {
            project_id: Some(parent.id.clone()),
            domain_id: store.project(&parent.id).and_then(|p| p.domain_id.clone()),
            pos: None,
        }),
        (NodeKind::Domain, NodeKind::Task | NodeKind::Project) => {
            Ok(Placement { domain_id: Some(parent.id.clone()), ..Placement::default() })
        }
        (parent, child) => Err(MutationError::InvalidParent { parent, child }),
    }
}

/// Put `child` under `parent`.
///
/// # Errors
///
/// See [`apply`].
pub fn attach(
    store: &mut RecordStore,
    parent: impl Into<NodeRef>,
    child: impl Into<NodeRef>,
    pos: Option<Pos>,
) -> Result<Option<UndoEntry>, MutationError> {
    apply(store, &child.into(), &Mutation::Attach { parent: parent.into(), pos })
}

/// Take a task out of its project and leave it at `pos`.
///
/// # Errors
///
/// See [`apply`].
pub fn detach(
    store: &mut RecordStore,
    child: impl Into<NodeRef>,
    domain: Option<&str>,
    pos: Pos,
) -> Result<Option<UndoEntry>, MutationError> {
    apply(store, &child.into(), &Mutation::Detach { domain: domain.map(str::to_string), pos })
}

/// Re-parent `child` and let layout place it.
///
/// # Errors
///
/// See [`apply`].
pub fn move_to(
    store: &mut RecordStore,
    child: impl Into<NodeRef>,
    new_parent: impl Into<NodeRef>,
) -> Result<Option<UndoEntry>, MutationError> {
    apply(store, &child.into(), &Mutation::MoveTo { parent: new_parent.into() })
}

/// Restore the placement an entry recorded before its mutation.
///
/// # Errors
///
/// `MissingRecord` if the target has since been removed.
pub fn revert(store: &mut RecordStore, entry: &UndoEntry) -> Result<(), MutationError> {
    store.apply_placement(&entry.target, &entry.from)
}

// =============================================================================
// DROP PLANNING
// =============================================================================

/// Decide what dropping `target` with its center at `drop` means.
///
/// `scene` must still hold the pre-drag layout positions for parents.
#[must_use]
pub fn plan_drop(store: &RecordStore, scene: &SceneGraph, target: &NodeRef, drop: Point, mode: LayoutMode) -> DropPlan {
    if !store.contains(target) || !drop.is_finite() {
        return DropPlan::Missing;
    }
    let pos = Pos::new(drop.x, drop.y);
    match target.kind {
        NodeKind::Domain => DropPlan::Commit(Mutation::Reposition { pos }),
        NodeKind::Project => plan_project_drop(store, scene, &target.id, drop, pos),
        NodeKind::Task => plan_task_drop(store, scene, &target.id, drop, mode),
    }
}

fn plan_project_drop(store: &RecordStore, scene: &SceneGraph, project_id: &str, drop: Point, pos: Pos) -> DropPlan {
    let current = store.project(project_id).and_then(|p| p.domain_id.as_deref());
    match scene.containing(drop, NodeKind::Domain, 0.0) {
        Some(domain) if Some(domain.id.as_str()) != current => {
            DropPlan::Commit(Mutation::MoveTo { parent: NodeRef::domain(domain.id.clone()) })
        }
        _ => DropPlan::Commit(Mutation::Reposition { pos }),
    }
}

fn plan_task_drop(store: &RecordStore, scene: &SceneGraph, task_id: &str, drop: Point, mode: LayoutMode) -> DropPlan {
    let Some(task) = store.task(task_id) else {
        return DropPlan::Missing;
    };
    let pos = Pos::new(drop.x, drop.y);
    let own_project = task.project_id.as_deref().and_then(|pid| scene.get_node(NodeKind::Project, pid));
    let from_parent = match (&task.project_id, &task.domain_id) {
        (Some(pid), _) if store.project(pid).is_some() => Some(NodeRef::project(pid.clone())),
        (_, Some(did)) if store.domain(did).is_some() => Some(NodeRef::domain(did.clone())),
        _ => None,
    };

    if let Some(project) = scene.containing(drop, NodeKind::Project, 0.0) {
        if own_project.is_some_and(|own| own.id == project.id) {
            return match mode {
                LayoutMode::Manual => DropPlan::Commit(Mutation::Reposition { pos }),
                LayoutMode::Auto => DropPlan::Unchanged,
            };
        }
        let siblings: Vec<&SceneNode> = store
            .tasks_in_project(&project.id)
            .filter_map(|t| scene.get_node(NodeKind::Task, &t.id))
            .collect();
        let slot = next_ring_slot(project, &siblings, task.radius());
        return DropPlan::Pending(PendingTransaction {
            kind: PendingKind::Attach,
            task_id: task.id.clone(),
            from_parent,
            to_parent: Some(NodeRef::project(project.id.clone())),
            candidate_pos: Pos::new(slot.x, slot.y),
        });
    }

    match own_project {
        Some(project) if drop.distance(project.center()) > project.r + DETACH_MARGIN => {
            let domain = scene.containing(drop, NodeKind::Domain, 0.0);
            DropPlan::Pending(PendingTransaction {
                kind: PendingKind::Detach,
                task_id: task.id.clone(),
                from_parent,
                to_parent: domain.map(|d| NodeRef::domain(d.id.clone())),
                candidate_pos: pos,
            })
        }
        Some(_) => DropPlan::Unchanged,
        None => {
            let domain = scene.containing(drop, NodeKind::Domain, BELT_OFFSET + BELT_WIDTH);
            DropPlan::Commit(Mutation::Detach { domain: domain.map(|d| d.id.clone()), pos })
        }
    }
}
