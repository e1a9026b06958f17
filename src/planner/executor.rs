//! Plan executor.
//!
//! Applies a plan through the `Provider` trait with a bounded worker pool.
//! Independent branches run concurrently; dependency edges are never
//! violated. Each success is persisted to the state store before dependents
//! are dispatched, so a crash leaves at most the in-flight resources
//! unrecorded. A failure marks all transitive dependents as blocked while
//! unrelated branches keep going.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::module::{AttrHasher, AttrMap, ResourceKey};
use crate::provider::Provider;
use crate::state::{StateDocument, StateRecord, StateStore};

use super::plan::{ActionType, ExecutionPhase, Plan, PlannedChange};

/// Default number of concurrent provider calls.
pub const DEFAULT_PARALLELISM: usize = 4;

/// Executor for plans.
pub struct PlanExecutor {
    /// Provider backend.
    provider: Arc<dyn Provider>,
    /// State store for persistence after each success.
    store: Arc<dyn StateStore>,
    /// Maximum number of concurrent provider calls.
    parallelism: usize,
    /// Cancellation flag. Once set, no new work is dispatched; in-flight
    /// calls finish and their results are persisted.
    cancel: Arc<AtomicBool>,
}

/// Terminal status of a single planned change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeStatus {
    /// Resource was created.
    Created {
        /// Provider-assigned identifier.
        id: String,
    },
    /// Resource was updated in place.
    Updated {
        /// Provider-assigned identifier.
        id: String,
    },
    /// Resource was deleted.
    Deleted,
    /// The provider call failed.
    Failed {
        /// Rendered error.
        error: String,
    },
    /// Never attempted because a dependency failed.
    Blocked {
        /// The failed or blocked dependency.
        blocked_on: ResourceKey,
    },
    /// Never attempted because the run was cancelled.
    Aborted,
}

/// Outcome of a single change.
#[derive(Debug, Clone)]
pub struct ChangeOutcome {
    /// Index of the change within the plan.
    pub index: usize,
    /// Resource key.
    pub key: ResourceKey,
    /// Action that was planned.
    pub action: ActionType,
    /// Terminal status.
    pub status: ChangeStatus,
}

/// Result of executing an entire plan.
#[derive(Debug)]
pub struct ApplyReport {
    /// Individual outcomes, in completion order.
    pub outcomes: Vec<ChangeOutcome>,
    /// Number of created resources.
    pub created: usize,
    /// Number of updated resources.
    pub updated: usize,
    /// Number of deleted resources.
    pub deleted: usize,
    /// Number of resources left untouched by the plan.
    pub unchanged: usize,
    /// Number of failed resources.
    pub failed: usize,
    /// Number of blocked resources.
    pub blocked: usize,
    /// Number of changes never dispatched due to cancellation.
    pub aborted: usize,
    /// True only if every change reached terminal success.
    pub success: bool,
}

impl PlanExecutor {
    /// Creates a new plan executor.
    #[must_use]
    pub fn new(provider: Arc<dyn Provider>, store: Arc<dyn StateStore>) -> Self {
        Self {
            provider,
            store,
            parallelism: DEFAULT_PARALLELISM,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sets the maximum number of concurrent provider calls.
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Returns the cancellation flag, for wiring to a signal handler.
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Executes a plan against the given state document.
    ///
    /// Mutations run first, then deletions of removed resources. State is
    /// saved through the store after every successful change.
    ///
    /// # Errors
    ///
    /// Returns an error only for state-store failures outside individual
    /// changes; per-resource failures are reported in the `ApplyReport`.
    pub async fn execute(&self, plan: &Plan, state: StateDocument) -> Result<ApplyReport> {
        info!(
            "Applying plan with {} change(s) (parallelism {})",
            plan.change_count(),
            self.parallelism
        );

        let state = Arc::new(Mutex::new(state));
        let mut statuses: HashMap<usize, ChangeStatus> = HashMap::new();
        let mut order: Vec<usize> = Vec::new();

        for phase in [ExecutionPhase::Mutate, ExecutionPhase::Cleanup] {
            let indices = plan.phase_indices(phase);
            self.run_phase(plan, &indices, &state, &mut statuses, &mut order)
                .await;
        }

        let outcomes: Vec<ChangeOutcome> = order
            .iter()
            .map(|&i| ChangeOutcome {
                index: i,
                key: plan.changes[i].key.clone(),
                action: plan.changes[i].action,
                status: statuses[&i].clone(),
            })
            .collect();

        Ok(ApplyReport::from_outcomes(outcomes))
    }

    /// Runs one execution phase to completion.
    async fn run_phase(
        &self,
        plan: &Plan,
        indices: &[usize],
        state: &Arc<Mutex<StateDocument>>,
        statuses: &mut HashMap<usize, ChangeStatus>,
        order: &mut Vec<usize>,
    ) {
        let mut pending: Vec<usize> = indices.to_vec();
        let mut completed: HashSet<usize> = HashSet::new();
        let mut tasks: JoinSet<(usize, ChangeStatus)> = JoinSet::new();

        loop {
            // Mark everything waiting on a failed or blocked dependency.
            // Repeated until a full pass marks nothing, so blocking reaches
            // every transitive dependent regardless of scan order.
            loop {
                let mut marked = false;
                let mut i = 0;
                while i < pending.len() {
                    let idx = pending[i];
                    let bad_dep = plan.changes[idx].depends_on.iter().copied().find(|dep| {
                        matches!(
                            statuses.get(dep),
                            Some(ChangeStatus::Failed { .. } | ChangeStatus::Blocked { .. })
                        )
                    });

                    if let Some(dep) = bad_dep {
                        let blocked_on = plan.changes[dep].key.clone();
                        warn!(
                            "Change {} ({}) blocked by {blocked_on}",
                            idx, plan.changes[idx].key
                        );
                        statuses.insert(idx, ChangeStatus::Blocked { blocked_on });
                        order.push(idx);
                        pending.swap_remove(i);
                        marked = true;
                    } else {
                        i += 1;
                    }
                }
                if !marked {
                    break;
                }
            }

            // Dispatch ready work up to the parallelism limit.
            if !self.cancel.load(Ordering::SeqCst) {
                let mut i = 0;
                while i < pending.len() && tasks.len() < self.parallelism {
                    let idx = pending[i];
                    let ready = plan.changes[idx]
                        .depends_on
                        .iter()
                        .all(|dep| completed.contains(dep) || !indices.contains(dep));

                    if ready {
                        pending.swap_remove(i);
                        self.spawn_change(&mut tasks, idx, plan.changes[idx].clone(), state);
                    } else {
                        i += 1;
                    }
                }
            }

            if tasks.is_empty() {
                break;
            }

            if let Some(joined) = tasks.join_next().await {
                let (idx, status) = joined.unwrap_or_else(|e| {
                    (
                        usize::MAX,
                        ChangeStatus::Failed {
                            error: format!("Task panicked: {e}"),
                        },
                    )
                });
                if idx == usize::MAX {
                    continue;
                }

                if matches!(
                    status,
                    ChangeStatus::Created { .. } | ChangeStatus::Updated { .. } | ChangeStatus::Deleted
                ) {
                    completed.insert(idx);
                }
                statuses.insert(idx, status);
                order.push(idx);
            }
        }

        // Whatever is left was never dispatched.
        for idx in pending {
            debug!("Change {} ({}) aborted", idx, plan.changes[idx].key);
            statuses.insert(idx, ChangeStatus::Aborted);
            order.push(idx);
        }
    }

    /// Spawns the provider call for one change.
    fn spawn_change(
        &self,
        tasks: &mut JoinSet<(usize, ChangeStatus)>,
        idx: usize,
        change: PlannedChange,
        state: &Arc<Mutex<StateDocument>>,
    ) {
        let provider = Arc::clone(&self.provider);
        let store = Arc::clone(&self.store);
        let state = Arc::clone(state);

        tasks.spawn(async move {
            info!("Applying change {idx}: {}", change.description());
            let status = apply_change(&*provider, &*store, &state, &change).await;
            (idx, status)
        });
    }
}

/// Applies a single change and persists the result.
async fn apply_change(
    provider: &dyn Provider,
    store: &dyn StateStore,
    state: &Arc<Mutex<StateDocument>>,
    change: &PlannedChange,
) -> ChangeStatus {
    match change.action {
        ActionType::Create => apply_create(provider, store, state, change).await,
        ActionType::Update => apply_update(provider, store, state, change).await,
        ActionType::Delete => apply_delete(provider, store, state, change).await,
    }
}

/// Creates a resource, resolving references immediately before the call.
async fn apply_create(
    provider: &dyn Provider,
    store: &dyn StateStore,
    state: &Arc<Mutex<StateDocument>>,
    change: &PlannedChange,
) -> ChangeStatus {
    let Some(attributes) = &change.attributes else {
        return ChangeStatus::Failed {
            error: String::from("Missing attributes for create"),
        };
    };

    let Some(resolved) = resolve_against_state(attributes, state).await else {
        return ChangeStatus::Failed {
            error: String::from("Unresolved reference at apply time"),
        };
    };

    match provider
        .create(&change.key.kind, &change.key.name, &resolved)
        .await
    {
        Ok(applied) => {
            let hash = AttrHasher::new().hash_attributes(&resolved);
            let record = StateRecord::new(
                change.key.clone(),
                &applied.id,
                resolved,
                applied.outputs,
                &hash,
                referenced_keys(attributes),
            );
            let id = applied.id;

            let mut doc = state.lock().await;
            doc.set_record(record);
            if let Err(e) = store.save(&doc).await {
                error!("Failed to persist state after creating {}: {e}", change.key);
                return ChangeStatus::Failed {
                    error: format!("Created (id {id}) but state save failed: {e}"),
                };
            }

            info!("Created {}: {id}", change.key);
            ChangeStatus::Created { id }
        }
        Err(e) => {
            error!("Failed to create {}: {e}", change.key);
            ChangeStatus::Failed {
                error: e.to_string(),
            }
        }
    }
}

/// Updates a resource in place.
async fn apply_update(
    provider: &dyn Provider,
    store: &dyn StateStore,
    state: &Arc<Mutex<StateDocument>>,
    change: &PlannedChange,
) -> ChangeStatus {
    let Some(attributes) = &change.attributes else {
        return ChangeStatus::Failed {
            error: String::from("Missing attributes for update"),
        };
    };

    let id = {
        let doc = state.lock().await;
        change
            .prior_id
            .clone()
            .or_else(|| doc.record(&change.key).map(|r| r.id.clone()))
    };
    let Some(id) = id else {
        return ChangeStatus::Failed {
            error: String::from("No recorded id for update"),
        };
    };

    let Some(resolved) = resolve_against_state(attributes, state).await else {
        return ChangeStatus::Failed {
            error: String::from("Unresolved reference at apply time"),
        };
    };

    match provider.update(&change.key.kind, &id, &resolved).await {
        Ok(applied) => {
            let hash = AttrHasher::new().hash_attributes(&resolved);
            let dependencies = referenced_keys(attributes);

            let mut doc = state.lock().await;
            if let Some(record) = doc.records.get_mut(&change.key.to_string()) {
                record.apply_update(resolved, applied.outputs, &hash, dependencies);
            } else {
                doc.set_record(StateRecord::new(
                    change.key.clone(),
                    &applied.id,
                    resolved,
                    applied.outputs,
                    &hash,
                    dependencies,
                ));
            }
            if let Err(e) = store.save(&doc).await {
                error!("Failed to persist state after updating {}: {e}", change.key);
                return ChangeStatus::Failed {
                    error: format!("Updated but state save failed: {e}"),
                };
            }

            info!("Updated {}: {id}", change.key);
            ChangeStatus::Updated { id }
        }
        Err(e) => {
            error!("Failed to update {}: {e}", change.key);
            ChangeStatus::Failed {
                error: e.to_string(),
            }
        }
    }
}

/// Deletes a resource. Nothing to delete counts as success.
async fn apply_delete(
    provider: &dyn Provider,
    store: &dyn StateStore,
    state: &Arc<Mutex<StateDocument>>,
    change: &PlannedChange,
) -> ChangeStatus {
    let id = {
        let doc = state.lock().await;
        change
            .prior_id
            .clone()
            .or_else(|| doc.record(&change.key).map(|r| r.id.clone()))
    };

    let Some(id) = id else {
        debug!("No recorded id for {}, delete is a no-op", change.key);
        let mut doc = state.lock().await;
        doc.remove_record(&change.key);
        return ChangeStatus::Deleted;
    };

    match provider.delete(&change.key.kind, &id).await {
        Ok(()) => {
            let mut doc = state.lock().await;
            doc.remove_record(&change.key);
            if let Err(e) = store.save(&doc).await {
                error!("Failed to persist state after deleting {}: {e}", change.key);
                return ChangeStatus::Failed {
                    error: format!("Deleted but state save failed: {e}"),
                };
            }

            info!("Deleted {}: {id}", change.key);
            ChangeStatus::Deleted
        }
        Err(e) => {
            error!("Failed to delete {}: {e}", change.key);
            ChangeStatus::Failed {
                error: e.to_string(),
            }
        }
    }
}

/// Resolves references against the current state document, or `None` if a
/// target is missing.
async fn resolve_against_state(
    attributes: &AttrMap,
    state: &Arc<Mutex<StateDocument>>,
) -> Option<AttrMap> {
    let doc = state.lock().await;
    let resolve = |r: &crate::module::RefValue| {
        doc.record(&r.target).and_then(|rec| rec.output(&r.output))
    };

    attributes
        .iter()
        .map(|(k, v)| v.resolve_refs(&resolve).map(|v| (k.clone(), v)))
        .collect()
}

/// Collects the referenced keys of an attribute map, for dependency
/// recording.
fn referenced_keys(attributes: &AttrMap) -> Vec<ResourceKey> {
    let mut refs = Vec::new();
    for value in attributes.values() {
        value.collect_refs(&mut refs);
    }
    let mut keys: Vec<ResourceKey> = refs.into_iter().map(|r| r.target.clone()).collect();
    keys.sort();
    keys.dedup();
    keys
}

impl ApplyReport {
    /// Builds a report from individual outcomes.
    #[must_use]
    pub fn from_outcomes(outcomes: Vec<ChangeOutcome>) -> Self {
        let count = |f: fn(&ChangeStatus) -> bool| {
            outcomes.iter().filter(|o| f(&o.status)).count()
        };

        let created = count(|s| matches!(s, ChangeStatus::Created { .. }));
        let updated = count(|s| matches!(s, ChangeStatus::Updated { .. }));
        let deleted = count(|s| matches!(s, ChangeStatus::Deleted));
        let failed = count(|s| matches!(s, ChangeStatus::Failed { .. }));
        let blocked = count(|s| matches!(s, ChangeStatus::Blocked { .. }));
        let aborted = count(|s| matches!(s, ChangeStatus::Aborted));

        Self {
            outcomes,
            created,
            updated,
            deleted,
            unchanged: 0,
            failed,
            blocked,
            aborted,
            success: failed == 0 && blocked == 0 && aborted == 0,
        }
    }

    /// Looks up the outcome for a specific key.
    #[must_use]
    pub fn outcome_for(&self, key: &ResourceKey) -> Option<&ChangeOutcome> {
        self.outcomes.iter().find(|o| o.key == *key)
    }
}

impl std::fmt::Display for ApplyReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} deleted, {} failed, {} blocked",
            self.created, self.updated, self.deleted, self.failed, self.blocked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProviderError, StratoformError};
    use crate::graph::GraphBuilder;
    use crate::module::{AttrValue, ResourceSpec};
    use crate::planner::diff::DiffEngine;
    use crate::provider::{AppliedResource, MockProvider};
    use crate::state::LocalStateStore;
    use tempfile::TempDir;

    fn resource(kind: &str, name: &str, yaml_attrs: &str) -> ResourceSpec {
        ResourceSpec {
            kind: kind.to_string(),
            name: name.to_string(),
            attributes: serde_yaml::from_str(yaml_attrs).expect("valid attributes"),
            immutable: vec![],
        }
    }

    fn plan_for(resources: Vec<ResourceSpec>, state: &StateDocument) -> Plan {
        let mut builder = GraphBuilder::new();
        for r in resources {
            builder.add_resource(r).expect("unique");
        }
        let graph = builder.build().expect("acyclic");
        let diff = DiffEngine::new().compute_diff(&graph, state);
        Plan::from_diff(&diff, &graph, state)
    }

    fn store_in(dir: &TempDir) -> Arc<dyn StateStore> {
        Arc::new(LocalStateStore::with_base_dir(dir.path()))
    }

    fn applied(id: &str) -> AppliedResource {
        AppliedResource {
            id: id.to_string(),
            outputs: AttrMap::new(),
        }
    }

    #[tokio::test]
    async fn test_create_chain_resolves_references() {
        let state = StateDocument::new("network", "dev");
        let plan = plan_for(
            vec![
                resource("vpc", "main", r#"{ cidr_block: "10.0.0.0/16" }"#),
                resource("subnet", "public", "{ vpc_id: { ref: vpc.main } }"),
            ],
            &state,
        );

        let mut provider = MockProvider::new();
        provider
            .expect_create()
            .returning(|kind, name, attrs| {
                if kind == "subnet" {
                    // By the time the subnet runs, its reference must be a
                    // concrete id, not a placeholder.
                    assert_eq!(
                        attrs.get("vpc_id"),
                        Some(&AttrValue::String(String::from("vpc-1")))
                    );
                    Ok(applied("subnet-1"))
                } else {
                    assert_eq!(name, "main");
                    Ok(applied("vpc-1"))
                }
            });

        let temp = TempDir::new().expect("temp dir");
        let executor = PlanExecutor::new(Arc::new(provider), store_in(&temp));
        let report = executor.execute(&plan, state).await.expect("executes");

        assert!(report.success);
        assert_eq!(report.created, 2);

        // State was persisted with both records.
        let saved = LocalStateStore::with_base_dir(temp.path())
            .load()
            .await
            .expect("loads")
            .expect("state exists");
        assert_eq!(saved.len(), 2);
        let subnet = saved
            .record(&ResourceKey::new("subnet", "public"))
            .expect("subnet recorded");
        assert_eq!(subnet.dependencies, vec![ResourceKey::new("vpc", "main")]);
    }

    #[tokio::test]
    async fn test_failure_blocks_dependents_but_not_siblings() {
        let state = StateDocument::new("network", "dev");
        let plan = plan_for(
            vec![
                resource("vpc", "main", r#"{ cidr_block: "10.0.0.0/16" }"#),
                resource("subnet", "public", "{ vpc_id: { ref: vpc.main } }"),
                resource("bucket", "logs", r#"{ name: "logs" }"#),
            ],
            &state,
        );

        let mut provider = MockProvider::new();
        provider.expect_create().returning(|kind, _, _| match kind {
            "vpc" => Err(StratoformError::Provider(ProviderError::api_error(
                500,
                "boom",
            ))),
            _ => Ok(applied("bucket-1")),
        });

        let temp = TempDir::new().expect("temp dir");
        let executor = PlanExecutor::new(Arc::new(provider), store_in(&temp));
        let report = executor.execute(&plan, state).await.expect("executes");

        assert!(!report.success);
        assert_eq!(report.failed, 1);
        assert_eq!(report.blocked, 1);
        assert_eq!(report.created, 1);

        let subnet = report
            .outcome_for(&ResourceKey::new("subnet", "public"))
            .expect("subnet outcome");
        assert_eq!(
            subnet.status,
            ChangeStatus::Blocked {
                blocked_on: ResourceKey::new("vpc", "main"),
            }
        );
    }

    #[tokio::test]
    async fn test_failure_blocks_transitive_dependents() {
        let state = StateDocument::new("network", "dev");
        let plan = plan_for(
            vec![
                resource("vpc", "main", r#"{ cidr_block: "10.0.0.0/16" }"#),
                resource("subnet", "public", "{ vpc_id: { ref: vpc.main } }"),
                resource("nat", "gw", "{ subnet_id: { ref: subnet.public } }"),
            ],
            &state,
        );

        let mut provider = MockProvider::new();
        provider.expect_create().returning(|_, _, _| {
            Err(StratoformError::Provider(ProviderError::api_error(
                500, "boom",
            )))
        });

        let temp = TempDir::new().expect("temp dir");
        let executor = PlanExecutor::new(Arc::new(provider), store_in(&temp));
        let report = executor.execute(&plan, state).await.expect("executes");

        assert!(!report.success);
        assert_eq!(report.failed, 1);
        // Both hops down the chain are blocked, not aborted.
        assert_eq!(report.blocked, 2);
        assert_eq!(report.aborted, 0);

        let nat = report
            .outcome_for(&ResourceKey::new("nat", "gw"))
            .expect("nat outcome");
        assert_eq!(
            nat.status,
            ChangeStatus::Blocked {
                blocked_on: ResourceKey::new("subnet", "public"),
            }
        );
    }

    #[tokio::test]
    async fn test_second_plan_after_apply_is_noop() {
        let state = StateDocument::new("network", "dev");
        let mut builder = GraphBuilder::new();
        builder
            .add_resource(resource("vpc", "main", r#"{ cidr_block: "10.0.0.0/16" }"#))
            .expect("unique");
        builder
            .add_resource(resource("subnet", "public", "{ vpc_id: { ref: vpc.main } }"))
            .expect("unique");
        let graph = builder.build().expect("acyclic");

        let diff = DiffEngine::new().compute_diff(&graph, &state);
        let plan = Plan::from_diff(&diff, &graph, &state);

        let mut provider = MockProvider::new();
        provider.expect_create().returning(|kind, _, _| {
            Ok(applied(if kind == "vpc" { "vpc-1" } else { "subnet-1" }))
        });

        let temp = TempDir::new().expect("temp dir");
        let executor = PlanExecutor::new(Arc::new(provider), store_in(&temp));
        let report = executor.execute(&plan, state).await.expect("executes");
        assert!(report.success);

        // Re-planning against the persisted state converges to no-ops.
        let saved = LocalStateStore::with_base_dir(temp.path())
            .load()
            .await
            .expect("loads")
            .expect("state exists");
        let second = DiffEngine::new().compute_diff(&graph, &saved);

        assert!(!second.has_changes());
        assert_eq!(second.unchanged, 2);
    }

    #[tokio::test]
    async fn test_removed_resources_deleted_after_mutations() {
        let mut state = StateDocument::new("network", "dev");
        state.set_record(StateRecord::new(
            ResourceKey::new("bucket", "old"),
            "bucket-old",
            AttrMap::new(),
            AttrMap::new(),
            "hash",
            vec![],
        ));

        let plan = plan_for(
            vec![resource("vpc", "main", r#"{ cidr_block: "10.0.0.0/16" }"#)],
            &state,
        );

        let mut provider = MockProvider::new();
        provider
            .expect_create()
            .returning(|_, _, _| Ok(applied("vpc-1")));
        provider
            .expect_delete()
            .withf(|kind, id| kind == "bucket" && id == "bucket-old")
            .returning(|_, _| Ok(()));

        let temp = TempDir::new().expect("temp dir");
        let executor = PlanExecutor::new(Arc::new(provider), store_in(&temp));
        let report = executor.execute(&plan, state).await.expect("executes");

        assert!(report.success);
        assert_eq!(report.created, 1);
        assert_eq!(report.deleted, 1);

        let saved = LocalStateStore::with_base_dir(temp.path())
            .load()
            .await
            .expect("loads")
            .expect("state exists");
        assert!(!saved.contains(&ResourceKey::new("bucket", "old")));
    }

    #[tokio::test]
    async fn test_cancellation_stops_dispatch() {
        let state = StateDocument::new("network", "dev");
        let plan = plan_for(
            vec![resource("vpc", "main", r#"{ cidr_block: "10.0.0.0/16" }"#)],
            &state,
        );

        let provider = MockProvider::new();
        let temp = TempDir::new().expect("temp dir");
        let executor = PlanExecutor::new(Arc::new(provider), store_in(&temp));
        executor.cancel_flag().store(true, Ordering::SeqCst);

        let report = executor.execute(&plan, state).await.expect("executes");

        assert!(!report.success);
        assert_eq!(report.aborted, 1);
        assert_eq!(report.created, 0);
    }

    #[tokio::test]
    async fn test_empty_plan_succeeds() {
        let state = StateDocument::new("network", "dev");
        let plan = plan_for(vec![], &state);

        let provider = MockProvider::new();
        let temp = TempDir::new().expect("temp dir");
        let executor = PlanExecutor::new(Arc::new(provider), store_in(&temp));
        let report = executor.execute(&plan, state).await.expect("executes");

        assert!(report.success);
        assert_eq!(report.outcomes.len(), 0);
    }
}
