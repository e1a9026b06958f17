//! Dependency graph construction.
//!
//! Derives a directed acyclic graph from the `Ref` placeholders embedded in
//! resource attributes. The graph rejects duplicates, unknown targets, self
//! references, and cycles, and produces a stable topological order using
//! declaration order as the tie-break so plans are reproducible.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::error::{GraphError, Result, StratoformError};
use crate::module::{AttrValue, BoundModule, ResourceKey, ResourceSpec};

/// Builder collecting resources before graph construction.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    /// Resources in declaration order.
    resources: Vec<ResourceSpec>,
    /// Key to index lookup.
    index: HashMap<ResourceKey, usize>,
    /// Tags applied uniformly to every resource at add time.
    default_tags: std::collections::BTreeMap<String, String>,
}

/// A validated dependency graph over resources.
#[derive(Debug)]
pub struct ResourceGraph {
    /// Resources in declaration order.
    resources: Vec<ResourceSpec>,
    /// Key to index lookup.
    index: HashMap<ResourceKey, usize>,
    /// `deps[i]` holds the indices resource `i` references.
    deps: Vec<Vec<usize>>,
    /// `dependents[i]` holds the indices that reference resource `i`.
    dependents: Vec<Vec<usize>>,
    /// Topological order (dependencies first), stable in declaration order.
    order: Vec<usize>,
}

impl GraphBuilder {
    /// Creates a new graph builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets tags applied uniformly to every resource's `tags` attribute.
    ///
    /// Resource-level tags win over defaults. This is the explicit
    /// configuration object replacing provider-global tag state.
    #[must_use]
    pub fn with_default_tags(
        mut self,
        tags: std::collections::BTreeMap<String, String>,
    ) -> Self {
        self.default_tags = tags;
        self
    }

    /// Adds a resource definition to the graph under construction.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::DuplicateResource` if the (type, name) pair is
    /// already defined.
    pub fn add_resource(&mut self, mut resource: ResourceSpec) -> Result<()> {
        let key = resource.key();
        if self.index.contains_key(&key) {
            return Err(StratoformError::Graph(GraphError::DuplicateResource {
                key,
            }));
        }

        self.merge_default_tags(&mut resource);
        self.index.insert(key, self.resources.len());
        self.resources.push(resource);
        Ok(())
    }

    /// Merges default tags into the resource's `tags` attribute.
    fn merge_default_tags(&self, resource: &mut ResourceSpec) {
        if self.default_tags.is_empty() {
            return;
        }

        let tags = resource
            .attributes
            .entry(String::from("tags"))
            .or_insert_with(|| AttrValue::Map(std::collections::BTreeMap::new()));

        if let AttrValue::Map(map) = tags {
            for (k, v) in &self.default_tags {
                map.entry(k.clone())
                    .or_insert_with(|| AttrValue::String(v.clone()));
            }
        }
    }

    /// Builds the dependency graph from the collected resources.
    ///
    /// # Errors
    ///
    /// Returns a `GraphError` for unknown references, self references, or
    /// cycles. Nothing is mutated remotely when these fire.
    pub fn build(self) -> Result<ResourceGraph> {
        let n = self.resources.len();
        let mut deps: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (i, resource) in self.resources.iter().enumerate() {
            let key = resource.key();
            for target in resource.referenced_keys() {
                if target == key {
                    return Err(StratoformError::Graph(GraphError::SelfReference { key }));
                }
                let Some(&j) = self.index.get(&target) else {
                    return Err(StratoformError::Graph(GraphError::UnknownReference {
                        from: key,
                        to: target,
                    }));
                };
                deps[i].push(j);
                dependents[j].push(i);
            }
        }

        detect_cycle(&self.resources, &deps)?;
        let order = topo_order(&deps, &dependents);

        Ok(ResourceGraph {
            resources: self.resources,
            index: self.index,
            deps,
            dependents,
            order,
        })
    }
}

impl ResourceGraph {
    /// Builds a graph directly from a bound module, applying its provider
    /// default tags.
    ///
    /// # Errors
    ///
    /// Returns a `GraphError` if the module's resources are structurally
    /// invalid.
    pub fn from_bound(bound: &BoundModule) -> Result<Self> {
        let mut builder =
            GraphBuilder::new().with_default_tags(bound.module.provider.default_tags.clone());
        for resource in &bound.resources {
            builder.add_resource(resource.clone())?;
        }
        builder.build()
    }

    /// Returns the number of resources in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if the graph has no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Looks up a resource by key.
    #[must_use]
    pub fn resource(&self, key: &ResourceKey) -> Option<&ResourceSpec> {
        self.index.get(key).map(|&i| &self.resources[i])
    }

    /// Returns true if the graph contains the given key.
    #[must_use]
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.index.contains_key(key)
    }

    /// Iterates resources in topological order (dependencies first).
    pub fn topo_order(&self) -> impl Iterator<Item = &ResourceSpec> {
        self.order.iter().map(|&i| &self.resources[i])
    }

    /// Returns the keys a resource references, in declaration order.
    #[must_use]
    pub fn dependencies_of(&self, key: &ResourceKey) -> Vec<ResourceKey> {
        self.index.get(key).map_or_else(Vec::new, |&i| {
            self.deps[i]
                .iter()
                .map(|&j| self.resources[j].key())
                .collect()
        })
    }

    /// Returns the keys that reference a resource.
    #[must_use]
    pub fn dependents_of(&self, key: &ResourceKey) -> Vec<ResourceKey> {
        self.index.get(key).map_or_else(Vec::new, |&i| {
            self.dependents[i]
                .iter()
                .map(|&j| self.resources[j].key())
                .collect()
        })
    }
}

/// Detects reference cycles via depth-first traversal with an in-progress
/// marker set, reporting the offending cycle path.
fn detect_cycle(resources: &[ResourceSpec], deps: &[Vec<usize>]) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    fn visit(
        node: usize,
        resources: &[ResourceSpec],
        deps: &[Vec<usize>],
        marks: &mut [Mark],
        path: &mut Vec<usize>,
    ) -> Result<()> {
        marks[node] = Mark::InProgress;
        path.push(node);

        for &next in &deps[node] {
            match marks[next] {
                Mark::InProgress => {
                    let start = path.iter().position(|&p| p == next).unwrap_or(0);
                    let mut cycle: Vec<String> = path[start..]
                        .iter()
                        .map(|&i| resources[i].key().to_string())
                        .collect();
                    cycle.push(resources[next].key().to_string());
                    return Err(StratoformError::Graph(GraphError::CyclicDependency {
                        cycle: cycle.join(" -> "),
                    }));
                }
                Mark::Unvisited => visit(next, resources, deps, marks, path)?,
                Mark::Done => {}
            }
        }

        path.pop();
        marks[node] = Mark::Done;
        Ok(())
    }

    let mut marks = vec![Mark::Unvisited; resources.len()];
    let mut path = Vec::new();

    for node in 0..resources.len() {
        if marks[node] == Mark::Unvisited {
            visit(node, resources, deps, &mut marks, &mut path)?;
        }
    }

    Ok(())
}

/// Computes a stable topological order (Kahn's algorithm) with declaration
/// order as the tie-break among resources with no relative constraint.
fn topo_order(deps: &[Vec<usize>], dependents: &[Vec<usize>]) -> Vec<usize> {
    let n = deps.len();
    let mut indegree: Vec<usize> = deps.iter().map(Vec::len).collect();
    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&i| indegree[i] == 0)
        .map(Reverse)
        .collect();

    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &dependent in &dependents[node] {
            indegree[dependent] -= 1;
            if indegree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::AttrMap;

    fn resource(kind: &str, name: &str, refs: &[(&str, &str)]) -> ResourceSpec {
        let mut attributes = AttrMap::new();
        for (i, (k, n)) in refs.iter().enumerate() {
            attributes.insert(
                format!("ref_{i}"),
                serde_yaml::from_str(&format!("{{ ref: {k}.{n} }}")).expect("valid ref"),
            );
        }
        ResourceSpec {
            kind: kind.to_string(),
            name: name.to_string(),
            attributes,
            immutable: vec![],
        }
    }

    fn build(resources: Vec<ResourceSpec>) -> Result<ResourceGraph> {
        let mut builder = GraphBuilder::new();
        for r in resources {
            builder.add_resource(r)?;
        }
        builder.build()
    }

    fn keys(graph: &ResourceGraph) -> Vec<String> {
        graph.topo_order().map(|r| r.key().to_string()).collect()
    }

    #[test]
    fn test_topo_order_respects_references() {
        let graph = build(vec![
            resource("subnet", "public", &[("vpc", "main")]),
            resource("vpc", "main", &[]),
            resource("nat", "main", &[("subnet", "public")]),
        ])
        .expect("acyclic");

        let order = keys(&graph);
        let vpc = order.iter().position(|k| k == "vpc.main").expect("vpc");
        let subnet = order.iter().position(|k| k == "subnet.public").expect("subnet");
        let nat = order.iter().position(|k| k == "nat.main").expect("nat");

        assert!(vpc < subnet);
        assert!(subnet < nat);
    }

    #[test]
    fn test_independent_resources_keep_declaration_order() {
        let graph = build(vec![
            resource("vpc", "beta", &[]),
            resource("vpc", "alpha", &[]),
            resource("vpc", "gamma", &[]),
        ])
        .expect("acyclic");

        assert_eq!(keys(&graph), vec!["vpc.beta", "vpc.alpha", "vpc.gamma"]);
    }

    #[test]
    fn test_duplicate_resource_rejected() {
        let mut builder = GraphBuilder::new();
        builder
            .add_resource(resource("vpc", "main", &[]))
            .expect("first add");

        let err = builder.add_resource(resource("vpc", "main", &[])).unwrap_err();
        assert!(matches!(
            err,
            StratoformError::Graph(GraphError::DuplicateResource { .. })
        ));
    }

    #[test]
    fn test_cycle_detected_with_path() {
        let err = build(vec![
            resource("a", "a", &[("b", "b")]),
            resource("b", "b", &[("c", "c")]),
            resource("c", "c", &[("a", "a")]),
        ])
        .unwrap_err();

        let StratoformError::Graph(GraphError::CyclicDependency { cycle }) = err else {
            panic!("expected cycle error");
        };
        assert!(cycle.contains("a.a"));
        assert!(cycle.contains("->"));
    }

    #[test]
    fn test_unknown_reference_rejected() {
        let err = build(vec![resource("subnet", "public", &[("vpc", "missing")])]).unwrap_err();
        assert!(matches!(
            err,
            StratoformError::Graph(GraphError::UnknownReference { .. })
        ));
    }

    #[test]
    fn test_self_reference_rejected() {
        let err = build(vec![resource("vpc", "main", &[("vpc", "main")])]).unwrap_err();
        assert!(matches!(
            err,
            StratoformError::Graph(GraphError::SelfReference { .. })
        ));
    }

    #[test]
    fn test_default_tags_merged() {
        let mut tags = std::collections::BTreeMap::new();
        tags.insert(String::from("team"), String::from("infra"));

        let mut builder = GraphBuilder::new().with_default_tags(tags);
        builder
            .add_resource(resource("vpc", "main", &[]))
            .expect("add");
        let graph = builder.build().expect("build");

        let vpc = graph
            .resource(&ResourceKey::new("vpc", "main"))
            .expect("vpc present");
        let Some(AttrValue::Map(tags)) = vpc.attributes.get("tags") else {
            panic!("tags should be a map");
        };
        assert_eq!(
            tags.get("team"),
            Some(&AttrValue::String(String::from("infra")))
        );
    }

    #[test]
    fn test_dependents_of() {
        let graph = build(vec![
            resource("vpc", "main", &[]),
            resource("subnet", "a", &[("vpc", "main")]),
            resource("subnet", "b", &[("vpc", "main")]),
        ])
        .expect("acyclic");

        let dependents = graph.dependents_of(&ResourceKey::new("vpc", "main"));
        assert_eq!(dependents.len(), 2);
    }
}
