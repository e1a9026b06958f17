//! Plan types and construction.
//!
//! A plan is an ordered list of changes with explicit dependency indices.
//! Ordering invariants: if resource A references resource B, B's
//! create/update precedes A's; a replacement is an adjacent delete-then-create
//! pair; deletions of removed resources run in a cleanup phase after every
//! mutation, dependents before their dependencies.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::graph::ResourceGraph;
use crate::module::{AttrMap, ResourceKey};
use crate::state::StateDocument;

use super::diff::{DiffDetail, DiffResult, DiffType};

/// A complete plan for one module.
#[derive(Debug)]
pub struct Plan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Module name.
    pub module: String,
    /// Environment name.
    pub environment: String,
    /// Planned changes in execution order.
    pub changes: Vec<PlannedChange>,
}

/// A single planned change.
#[derive(Debug, Clone)]
pub struct PlannedChange {
    /// Action type.
    pub action: ActionType,
    /// Execution phase.
    pub phase: ExecutionPhase,
    /// Resource key.
    pub key: ResourceKey,
    /// Desired attributes, with reference placeholders intact. Present for
    /// creates and updates.
    pub attributes: Option<AttrMap>,
    /// Provider id recorded for the resource, for updates and deletes.
    pub prior_id: Option<String>,
    /// Reason for this change.
    pub reason: String,
    /// Indices of changes that must complete first.
    pub depends_on: Vec<usize>,
    /// Per-attribute diff details, carried for display.
    pub details: Vec<DiffDetail>,
}

/// Types of changes in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    /// Create a new resource.
    Create,
    /// Update an existing resource in place.
    Update,
    /// Delete a resource.
    Delete,
}

/// Execution phases. All mutations complete before cleanup starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    /// Creates, updates, and replacement pairs.
    Mutate,
    /// Deletions of resources removed from the module.
    Cleanup,
}

impl Plan {
    /// Builds a plan from a diff result.
    ///
    /// The diff's desired resources are already in topological order, so a
    /// single pass can wire `depends_on` by looking up the mutation index of
    /// each referenced resource.
    #[must_use]
    pub fn from_diff(diff: &DiffResult, graph: &ResourceGraph, state: &StateDocument) -> Self {
        let mut changes: Vec<PlannedChange> = Vec::new();
        // Key -> index of the change that produces the key's new state.
        let mut mutation_index: HashMap<ResourceKey, usize> = HashMap::new();

        for resource_diff in &diff.diffs {
            let key = &resource_diff.key;
            let deps: Vec<usize> = graph
                .dependencies_of(key)
                .iter()
                .filter_map(|dep| mutation_index.get(dep).copied())
                .collect();
            let attributes = graph.resource(key).map(|r| r.attributes.clone());

            match resource_diff.diff_type {
                DiffType::Create => {
                    debug!("Planning create for {key}");
                    mutation_index.insert(key.clone(), changes.len());
                    changes.push(PlannedChange {
                        action: ActionType::Create,
                        phase: ExecutionPhase::Mutate,
                        key: key.clone(),
                        attributes,
                        prior_id: None,
                        reason: String::from("Resource defined in module"),
                        depends_on: deps,
                        details: resource_diff.details.clone(),
                    });
                }
                DiffType::Update => {
                    debug!("Planning update for {key}");
                    mutation_index.insert(key.clone(), changes.len());
                    changes.push(PlannedChange {
                        action: ActionType::Update,
                        phase: ExecutionPhase::Mutate,
                        key: key.clone(),
                        attributes,
                        prior_id: resource_diff.prior_id.clone(),
                        reason: String::from("Attributes changed"),
                        depends_on: deps,
                        details: resource_diff.details.clone(),
                    });
                }
                DiffType::Replace => {
                    debug!("Planning replace for {key}");
                    let delete_idx = changes.len();
                    changes.push(PlannedChange {
                        action: ActionType::Delete,
                        phase: ExecutionPhase::Mutate,
                        key: key.clone(),
                        attributes: None,
                        prior_id: resource_diff.prior_id.clone(),
                        reason: String::from("Immutable attribute changed, replacing"),
                        depends_on: vec![],
                        details: vec![],
                    });

                    let mut create_deps = deps;
                    create_deps.push(delete_idx);
                    mutation_index.insert(key.clone(), changes.len());
                    changes.push(PlannedChange {
                        action: ActionType::Create,
                        phase: ExecutionPhase::Mutate,
                        key: key.clone(),
                        attributes,
                        prior_id: None,
                        reason: String::from("Immutable attribute changed, replacing"),
                        depends_on: create_deps,
                        details: resource_diff.details.clone(),
                    });
                }
                DiffType::Delete | DiffType::NoChange => {}
            }
        }

        // Cleanup phase: resources removed from the module, dependents first.
        let removed: Vec<&ResourceKey> = diff
            .diffs
            .iter()
            .filter(|d| d.diff_type == DiffType::Delete)
            .map(|d| &d.key)
            .collect();
        append_cleanup_deletes(&mut changes, &removed, state);

        Self {
            created_at: Utc::now(),
            module: state.module.clone(),
            environment: state.environment.clone(),
            changes,
        }
    }

    /// Builds a plan that deletes everything in state, dependents first.
    #[must_use]
    pub fn destroy_all(state: &StateDocument) -> Self {
        let keys = state.keys();
        let mut changes = Vec::new();
        append_cleanup_deletes(&mut changes, &keys.iter().collect::<Vec<_>>(), state);

        Self {
            created_at: Utc::now(),
            module: state.module.clone(),
            environment: state.environment.clone(),
            changes,
        }
    }

    /// Returns true if the plan has no changes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Returns the number of changes.
    #[must_use]
    pub const fn change_count(&self) -> usize {
        self.changes.len()
    }

    /// Returns the number of create changes.
    #[must_use]
    pub fn create_count(&self) -> usize {
        self.count_action(ActionType::Create)
    }

    /// Returns the number of update changes.
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.count_action(ActionType::Update)
    }

    /// Returns the number of delete changes.
    #[must_use]
    pub fn delete_count(&self) -> usize {
        self.count_action(ActionType::Delete)
    }

    /// Returns the indices of changes in a given phase.
    #[must_use]
    pub fn phase_indices(&self, phase: ExecutionPhase) -> Vec<usize> {
        self.changes
            .iter()
            .enumerate()
            .filter(|(_, c)| c.phase == phase)
            .map(|(i, _)| i)
            .collect()
    }

    fn count_action(&self, action: ActionType) -> usize {
        self.changes.iter().filter(|c| c.action == action).count()
    }
}

/// Appends delete changes for the given keys, ordered so that every recorded
/// dependent is deleted before the resource it depends on.
fn append_cleanup_deletes(
    changes: &mut Vec<PlannedChange>,
    keys: &[&ResourceKey],
    state: &StateDocument,
) {
    // dependents[i] holds positions (within `keys`) that depend on keys[i].
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); keys.len()];
    let mut pending: Vec<usize> = Vec::new();

    for (i, key) in keys.iter().enumerate() {
        let Some(record) = state.record(key) else {
            continue;
        };
        for dep in &record.dependencies {
            if let Some(j) = keys.iter().position(|k| **k == *dep) {
                dependents[j].push(i);
            }
        }
        pending.push(i);
    }

    // Kahn over the "deleted before" relation: a key is ready once all its
    // dependents are already planned.
    let mut planned: HashMap<usize, usize> = HashMap::new();
    while planned.len() < pending.len() {
        let mut progressed = false;

        for &i in &pending {
            if planned.contains_key(&i) {
                continue;
            }
            if dependents[i].iter().all(|d| planned.contains_key(d)) {
                let key = keys[i];
                let record = state.record(key);
                let depends_on = dependents[i].iter().map(|d| planned[d]).collect();

                debug!("Planning delete for {key}");
                planned.insert(i, changes.len());
                changes.push(PlannedChange {
                    action: ActionType::Delete,
                    phase: ExecutionPhase::Cleanup,
                    key: key.clone(),
                    attributes: None,
                    prior_id: record.map(|r| r.id.clone()),
                    reason: String::from("Resource removed from module"),
                    depends_on,
                    details: vec![],
                });
                progressed = true;
            }
        }

        // Recorded dependencies can only cycle if state was hand-edited;
        // fall back to arbitrary order rather than spin.
        if !progressed {
            for &i in &pending {
                if !planned.contains_key(&i) {
                    let key = keys[i];
                    planned.insert(i, changes.len());
                    changes.push(PlannedChange {
                        action: ActionType::Delete,
                        phase: ExecutionPhase::Cleanup,
                        key: key.clone(),
                        attributes: None,
                        prior_id: state.record(key).map(|r| r.id.clone()),
                        reason: String::from("Resource removed from module"),
                        depends_on: vec![],
                        details: vec![],
                    });
                }
            }
            break;
        }
    }
}

impl PlannedChange {
    /// Returns a human-readable description of the change.
    #[must_use]
    pub fn description(&self) -> String {
        match self.action {
            ActionType::Create => format!("Create {}", self.key),
            ActionType::Update => format!("Update {}", self.key),
            ActionType::Delete => format!("Delete {}", self.key),
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for PlannedChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.action, self.key)?;
        if !self.reason.is_empty() {
            write!(f, " ({})", self.reason)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.changes.is_empty() {
            return write!(f, "No changes required");
        }

        writeln!(f, "Plan ({} change(s)):", self.changes.len())?;
        for (i, change) in self.changes.iter().enumerate() {
            writeln!(f, "  {i}. {change}")?;
        }
        Ok(())
    }
}
