//! Diff engine for comparing the desired graph against recorded state.
//!
//! This module computes, per resource, whether the provider needs to create,
//! update, replace, or delete anything, and which attributes drive that
//! decision.

use std::collections::BTreeSet;
use tracing::debug;

use crate::graph::ResourceGraph;
use crate::module::{AttrHasher, AttrMap, AttrValue, ResourceKey, ResourceSpec};
use crate::state::{StateDocument, StateRecord};

/// Placeholder shown for references whose target has not been applied yet.
pub const KNOWN_AFTER_APPLY: &str = "(known after apply)";

/// Engine for computing diffs between the desired graph and recorded state.
#[derive(Debug, Default)]
pub struct DiffEngine {
    /// Attribute hasher.
    hasher: AttrHasher,
}

/// Difference for a single resource.
#[derive(Debug, Clone)]
pub struct ResourceDiff {
    /// Resource key.
    pub key: ResourceKey,
    /// Type of difference.
    pub diff_type: DiffType,
    /// Per-attribute details about the difference.
    pub details: Vec<DiffDetail>,
    /// Provider id recorded for this resource, if any.
    pub prior_id: Option<String>,
    /// Previous attribute hash (if recorded).
    pub old_hash: Option<String>,
    /// New attribute hash, absent when a reference is unresolved.
    pub new_hash: Option<String>,
}

/// Type of difference detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffType {
    /// Resource needs to be created.
    Create,
    /// Resource needs an in-place update.
    Update,
    /// An immutable attribute changed: delete then create.
    Replace,
    /// Resource was removed from the module and needs deletion.
    Delete,
    /// Resource is unchanged.
    NoChange,
}

/// Detail about a single differing attribute.
#[derive(Debug, Clone)]
pub struct DiffDetail {
    /// Attribute that differs.
    pub field: String,
    /// Recorded value, rendered for display.
    pub old_value: Option<String>,
    /// Desired value, rendered for display.
    pub new_value: Option<String>,
}

/// Complete diff result.
#[derive(Debug)]
pub struct DiffResult {
    /// All resource diffs, desired resources first in topological order,
    /// removed resources after.
    pub diffs: Vec<ResourceDiff>,
    /// Number of resources to create.
    pub creates: usize,
    /// Number of resources to update in place.
    pub updates: usize,
    /// Number of resources to replace.
    pub replaces: usize,
    /// Number of resources to delete.
    pub deletes: usize,
    /// Number of unchanged resources.
    pub unchanged: usize,
}

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            hasher: AttrHasher::new(),
        }
    }

    /// Computes the diff between the desired graph and the recorded state.
    #[must_use]
    pub fn compute_diff(&self, graph: &ResourceGraph, state: &StateDocument) -> DiffResult {
        let mut diffs = Vec::new();

        for resource in graph.topo_order() {
            let diff = self.compute_resource_diff(resource, state);
            diffs.push(diff);
        }

        // Resources recorded in state but no longer in the module
        for key in state.keys() {
            if !graph.contains(&key) {
                debug!("Resource {key} removed from module");
                let record = state.record(&key);
                diffs.push(ResourceDiff {
                    key,
                    diff_type: DiffType::Delete,
                    details: vec![DiffDetail {
                        field: String::from("id"),
                        old_value: record.map(|r| r.id.clone()),
                        new_value: None,
                    }],
                    prior_id: record.map(|r| r.id.clone()),
                    old_hash: record.map(|r| r.attributes_hash.clone()),
                    new_hash: None,
                });
            }
        }

        let creates = count(&diffs, DiffType::Create);
        let updates = count(&diffs, DiffType::Update);
        let replaces = count(&diffs, DiffType::Replace);
        let deletes = count(&diffs, DiffType::Delete);
        let unchanged = count(&diffs, DiffType::NoChange);

        DiffResult {
            diffs,
            creates,
            updates,
            replaces,
            deletes,
            unchanged,
        }
    }

    /// Computes the diff for a single desired resource.
    fn compute_resource_diff(&self, resource: &ResourceSpec, state: &StateDocument) -> ResourceDiff {
        let key = resource.key();
        let display = display_attributes(&resource.attributes, state);
        let resolved = resolved_attributes(&resource.attributes, state);
        let new_hash = resolved.as_ref().map(|attrs| self.hasher.hash_attributes(attrs));

        let Some(record) = state.record(&key) else {
            debug!("Resource {key} needs to be created");
            return ResourceDiff {
                key,
                diff_type: DiffType::Create,
                details: creation_details(&display),
                prior_id: None,
                old_hash: None,
                new_hash,
            };
        };

        // Hash-first equality: a matching hash means nothing to do.
        let up_to_date = new_hash
            .as_deref()
            .is_some_and(|h| AttrHasher::hashes_match(h, &record.attributes_hash));
        if up_to_date {
            debug!("Resource {key} is up to date");
            return ResourceDiff {
                key,
                diff_type: DiffType::NoChange,
                details: vec![],
                prior_id: Some(record.id.clone()),
                old_hash: Some(record.attributes_hash.clone()),
                new_hash,
            };
        }

        let details = attribute_details(&display, record);
        let changed: Vec<&str> = details.iter().map(|d| d.field.as_str()).collect();
        let forces_replace = resource
            .immutable
            .iter()
            .any(|attr| changed.contains(&attr.as_str()));

        let diff_type = if forces_replace {
            DiffType::Replace
        } else {
            DiffType::Update
        };
        debug!("Resource {key} needs {diff_type}");

        ResourceDiff {
            key,
            diff_type,
            details,
            prior_id: Some(record.id.clone()),
            old_hash: Some(record.attributes_hash.clone()),
            new_hash,
        }
    }
}

/// Resolves references against recorded state, or `None` if any target has
/// no record yet.
fn resolved_attributes(attributes: &AttrMap, state: &StateDocument) -> Option<AttrMap> {
    let resolve = |r: &crate::module::RefValue| {
        state.record(&r.target).and_then(|rec| rec.output(&r.output))
    };

    attributes
        .iter()
        .map(|(k, v)| v.resolve_refs(&resolve).map(|v| (k.clone(), v)))
        .collect()
}

/// Resolves references for display, substituting a placeholder where the
/// target has not been applied yet.
fn display_attributes(attributes: &AttrMap, state: &StateDocument) -> AttrMap {
    let resolve = |r: &crate::module::RefValue| {
        Some(
            state
                .record(&r.target)
                .and_then(|rec| rec.output(&r.output))
                .unwrap_or_else(|| AttrValue::String(String::from(KNOWN_AFTER_APPLY))),
        )
    };

    attributes
        .iter()
        .map(|(k, v)| {
            let resolved = v
                .resolve_refs(&resolve)
                .unwrap_or_else(|| AttrValue::String(String::from(KNOWN_AFTER_APPLY)));
            (k.clone(), resolved)
        })
        .collect()
}

/// Details for a brand new resource: every attribute is new.
fn creation_details(display: &AttrMap) -> Vec<DiffDetail> {
    display
        .iter()
        .map(|(field, value)| DiffDetail {
            field: field.clone(),
            old_value: None,
            new_value: Some(value.to_string()),
        })
        .collect()
}

/// Per-attribute comparison of desired display values against a record.
fn attribute_details(display: &AttrMap, record: &StateRecord) -> Vec<DiffDetail> {
    let fields: BTreeSet<&String> = display.keys().chain(record.attributes.keys()).collect();
    let mut details = Vec::new();

    for field in fields {
        let desired = display.get(field);
        let recorded = record.attributes.get(field);

        if desired != recorded {
            details.push(DiffDetail {
                field: field.clone(),
                old_value: recorded.map(ToString::to_string),
                new_value: desired.map(ToString::to_string),
            });
        }
    }

    details
}

fn count(diffs: &[ResourceDiff], diff_type: DiffType) -> usize {
    diffs.iter().filter(|d| d.diff_type == diff_type).count()
}

impl DiffResult {
    /// Returns true if there are any changes.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.creates > 0 || self.updates > 0 || self.replaces > 0 || self.deletes > 0
    }

    /// Returns the total number of changes.
    #[must_use]
    pub const fn total_changes(&self) -> usize {
        self.creates + self.updates + self.replaces + self.deletes
    }

    /// Filters to only diffs that require action.
    #[must_use]
    pub fn actionable_diffs(&self) -> Vec<&ResourceDiff> {
        self.diffs
            .iter()
            .filter(|d| d.diff_type != DiffType::NoChange)
            .collect()
    }

    /// Looks up the diff for a specific key.
    #[must_use]
    pub fn diff_for(&self, key: &ResourceKey) -> Option<&ResourceDiff> {
        self.diffs.iter().find(|d| d.key == *key)
    }
}

impl std::fmt::Display for DiffType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Delete => "delete",
            Self::NoChange => "no change",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for ResourceDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.key, self.diff_type)?;
        if !self.details.is_empty() {
            write!(f, " (")?;
            for (i, detail) in self.details.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", detail.field)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::state::StateRecord;

    fn resource(kind: &str, name: &str, yaml_attrs: &str, immutable: &[&str]) -> ResourceSpec {
        ResourceSpec {
            kind: kind.to_string(),
            name: name.to_string(),
            attributes: serde_yaml::from_str(yaml_attrs).expect("valid attributes"),
            immutable: immutable.iter().map(ToString::to_string).collect(),
        }
    }

    fn graph_of(resources: Vec<ResourceSpec>) -> ResourceGraph {
        let mut builder = GraphBuilder::new();
        for r in resources {
            builder.add_resource(r).expect("unique");
        }
        builder.build().expect("acyclic")
    }

    fn record_for(resource: &ResourceSpec, id: &str, state: &StateDocument) -> StateRecord {
        let hasher = AttrHasher::new();
        let attrs = resolved_attributes(&resource.attributes, state).expect("resolvable");
        let hash = hasher.hash_attributes(&attrs);
        StateRecord::new(
            resource.key(),
            id,
            attrs,
            AttrMap::new(),
            &hash,
            resource.referenced_keys(),
        )
    }

    #[test]
    fn test_fresh_module_is_all_creates() {
        let graph = graph_of(vec![
            resource("vpc", "main", r#"{ cidr_block: "10.0.0.0/16" }"#, &[]),
            resource("subnet", "public", "{ vpc_id: { ref: vpc.main } }", &[]),
        ]);
        let state = StateDocument::new("network", "dev");

        let diff = DiffEngine::new().compute_diff(&graph, &state);

        assert_eq!(diff.creates, 2);
        assert_eq!(diff.total_changes(), 2);
        assert!(diff.has_changes());
    }

    #[test]
    fn test_unresolved_ref_rendered_as_known_after_apply() {
        let graph = graph_of(vec![
            resource("vpc", "main", r#"{ cidr_block: "10.0.0.0/16" }"#, &[]),
            resource("subnet", "public", "{ vpc_id: { ref: vpc.main } }", &[]),
        ]);
        let state = StateDocument::new("network", "dev");

        let diff = DiffEngine::new().compute_diff(&graph, &state);
        let subnet = diff
            .diff_for(&ResourceKey::new("subnet", "public"))
            .expect("subnet diff");

        let vpc_id = subnet
            .details
            .iter()
            .find(|d| d.field == "vpc_id")
            .expect("vpc_id detail");
        assert_eq!(vpc_id.new_value.as_deref(), Some(KNOWN_AFTER_APPLY));
        assert!(subnet.new_hash.is_none());
    }

    #[test]
    fn test_unchanged_resource_is_noop() {
        let vpc = resource("vpc", "main", r#"{ cidr_block: "10.0.0.0/16" }"#, &[]);
        let graph = graph_of(vec![vpc.clone()]);

        let mut state = StateDocument::new("network", "dev");
        let record = record_for(&vpc, "vpc-1", &state);
        state.set_record(record);

        let diff = DiffEngine::new().compute_diff(&graph, &state);

        assert!(!diff.has_changes());
        assert_eq!(diff.unchanged, 1);
    }

    #[test]
    fn test_mutable_change_is_update() {
        let old = resource("vpc", "main", r#"{ cidr_block: "10.0.0.0/16", enable_dns: false }"#, &[]);
        let new = resource(
            "vpc",
            "main",
            r#"{ cidr_block: "10.0.0.0/16", enable_dns: true }"#,
            &["cidr_block"],
        );
        let graph = graph_of(vec![new]);

        let mut state = StateDocument::new("network", "dev");
        let record = record_for(&old, "vpc-1", &state);
        state.set_record(record);

        let diff = DiffEngine::new().compute_diff(&graph, &state);
        let vpc = diff
            .diff_for(&ResourceKey::new("vpc", "main"))
            .expect("vpc diff");

        assert_eq!(vpc.diff_type, DiffType::Update);
        assert_eq!(vpc.details.len(), 1);
        assert_eq!(vpc.details[0].field, "enable_dns");
        assert_eq!(vpc.prior_id.as_deref(), Some("vpc-1"));
    }

    #[test]
    fn test_immutable_change_is_replace() {
        let old = resource("vpc", "main", r#"{ cidr_block: "10.0.0.0/16" }"#, &[]);
        let new = resource("vpc", "main", r#"{ cidr_block: "10.1.0.0/16" }"#, &["cidr_block"]);
        let graph = graph_of(vec![new]);

        let mut state = StateDocument::new("network", "dev");
        let record = record_for(&old, "vpc-1", &state);
        state.set_record(record);

        let diff = DiffEngine::new().compute_diff(&graph, &state);
        let vpc = diff
            .diff_for(&ResourceKey::new("vpc", "main"))
            .expect("vpc diff");

        assert_eq!(vpc.diff_type, DiffType::Replace);
        assert_eq!(diff.replaces, 1);
    }

    #[test]
    fn test_removed_resource_is_delete() {
        let vpc = resource("vpc", "main", r#"{ cidr_block: "10.0.0.0/16" }"#, &[]);
        let graph = graph_of(vec![]);

        let mut state = StateDocument::new("network", "dev");
        let record = record_for(&vpc, "vpc-1", &state);
        state.set_record(record);

        let diff = DiffEngine::new().compute_diff(&graph, &state);

        assert_eq!(diff.deletes, 1);
        let del = diff
            .diff_for(&ResourceKey::new("vpc", "main"))
            .expect("delete diff");
        assert_eq!(del.prior_id.as_deref(), Some("vpc-1"));
    }
}
