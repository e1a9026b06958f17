//! State types for tracking applied resources.
//!
//! These types record what the last successful apply created, keyed by
//! resource, and are the baseline every subsequent plan diffs against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::module::{AttrMap, ResourceKey};

/// Current version of the state format.
pub const STATE_VERSION: &str = "1.0";

/// The complete persisted state of a module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDocument {
    /// State format version.
    pub version: String,
    /// Module name.
    pub module: String,
    /// Environment name.
    pub environment: String,
    /// Monotonic serial, bumped on every save.
    pub serial: u64,
    /// One record per applied resource, keyed by `type.name`.
    pub records: BTreeMap<String, StateRecord>,
    /// When the state was last updated.
    pub last_updated: DateTime<Utc>,
}

/// The recorded state of a single applied resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateRecord {
    /// The resource key this record belongs to.
    pub key: ResourceKey,
    /// Provider-assigned identifier.
    pub id: String,
    /// Attributes as they were applied, with references resolved.
    pub attributes: AttrMap,
    /// Outputs reported by the provider.
    pub outputs: AttrMap,
    /// Hash of the applied attributes, for cheap change detection.
    pub attributes_hash: String,
    /// Keys this resource depended on when applied. Drives delete ordering
    /// even after the resource leaves the module definition.
    #[serde(default)]
    pub dependencies: Vec<ResourceKey>,
    /// When the resource was first created.
    pub created_at: DateTime<Utc>,
    /// When the record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl StateDocument {
    /// Creates a new empty state document.
    #[must_use]
    pub fn new(module: &str, environment: &str) -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            module: module.to_string(),
            environment: environment.to_string(),
            serial: 0,
            records: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }

    /// Gets a record by resource key.
    #[must_use]
    pub fn record(&self, key: &ResourceKey) -> Option<&StateRecord> {
        self.records.get(&key.to_string())
    }

    /// Returns true if a record exists for the key.
    #[must_use]
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.records.contains_key(&key.to_string())
    }

    /// Adds or replaces a record.
    pub fn set_record(&mut self, record: StateRecord) {
        self.records.insert(record.key.to_string(), record);
        self.touch();
    }

    /// Removes a record by key.
    pub fn remove_record(&mut self, key: &ResourceKey) -> Option<StateRecord> {
        let removed = self.records.remove(&key.to_string());
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// Returns all recorded keys.
    #[must_use]
    pub fn keys(&self) -> Vec<ResourceKey> {
        self.records.values().map(|r| r.key.clone()).collect()
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no resources are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bumps the serial and refreshes the update timestamp.
    fn touch(&mut self) {
        self.serial += 1;
        self.last_updated = Utc::now();
    }
}

impl StateRecord {
    /// Creates a new record for a freshly created resource.
    #[must_use]
    pub fn new(
        key: ResourceKey,
        id: &str,
        attributes: AttrMap,
        outputs: AttrMap,
        attributes_hash: &str,
        dependencies: Vec<ResourceKey>,
    ) -> Self {
        let now = Utc::now();
        Self {
            key,
            id: id.to_string(),
            attributes,
            outputs,
            attributes_hash: attributes_hash.to_string(),
            dependencies,
            created_at: now,
            updated_at: now,
        }
    }

    /// Records an in-place update, keeping the creation timestamp.
    pub fn apply_update(
        &mut self,
        attributes: AttrMap,
        outputs: AttrMap,
        attributes_hash: &str,
        dependencies: Vec<ResourceKey>,
    ) {
        self.attributes = attributes;
        self.outputs = outputs;
        self.attributes_hash = attributes_hash.to_string();
        self.dependencies = dependencies;
        self.updated_at = Utc::now();
    }

    /// Looks up an output value, falling back to the provider id for the
    /// conventional `id` output.
    #[must_use]
    pub fn output(&self, name: &str) -> Option<crate::module::AttrValue> {
        if let Some(value) = self.outputs.get(name) {
            return Some(value.clone());
        }
        if name == "id" {
            return Some(crate::module::AttrValue::String(self.id.clone()));
        }
        None
    }
}
