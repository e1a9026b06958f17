//! Module specification types for the planning engine.
//!
//! This module defines all the structs that map to the `stratoform.module.yaml`
//! file. These types are designed to be declarative and fully describe the
//! desired resource topology.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Identity of a resource: provider type plus logical name.
///
/// Serialized as `"type.name"` (e.g. `vpc.main`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceKey {
    /// Provider resource type (e.g. `vpc`, `subnet`).
    pub kind: String,
    /// Logical name, unique per type within a module.
    pub name: String,
}

impl ResourceKey {
    /// Creates a new resource key.
    #[must_use]
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.name)
    }
}

impl FromStr for ResourceKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((kind, name)) = s.split_once('.') else {
            return Err(format!("Invalid resource key: {s}. Expected format: TYPE.NAME"));
        };
        if kind.is_empty() || name.is_empty() {
            return Err(format!("Invalid resource key: {s}. Type and name must be non-empty"));
        }
        Ok(Self::new(kind, name))
    }
}

impl TryFrom<String> for ResourceKey {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ResourceKey> for String {
    fn from(key: ResourceKey) -> Self {
        key.to_string()
    }
}

/// A reference placeholder: resource attribute → another resource's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefValue {
    /// Target resource key (`type.name`).
    #[serde(rename = "ref")]
    pub target: ResourceKey,
    /// Name of the output attribute on the target.
    #[serde(default = "default_output_name")]
    pub output: String,
}

/// An input placeholder, replaced during input binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputRef {
    /// Name of the module input.
    pub input: String,
}

/// An attribute value: a literal, a list, a map, or a placeholder.
///
/// References are never resolved by string interpolation; they stay explicit
/// `Ref` values until the dependency graph resolves them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Integer(i64),
    /// String literal.
    String(String),
    /// List of attribute values.
    List(Vec<AttrValue>),
    /// Reference to another resource's output attribute.
    Ref(RefValue),
    /// Reference to a module input.
    Input(InputRef),
    /// Nested map of attribute values.
    Map(BTreeMap<String, AttrValue>),
}

/// Attribute map of a resource.
pub type AttrMap = BTreeMap<String, AttrValue>;

impl AttrValue {
    /// Collects all `Ref` placeholders in this value, depth first.
    pub fn collect_refs<'a>(&'a self, out: &mut Vec<&'a RefValue>) {
        match self {
            Self::Ref(r) => out.push(r),
            Self::List(items) => {
                for item in items {
                    item.collect_refs(out);
                }
            }
            Self::Map(map) => {
                for value in map.values() {
                    value.collect_refs(out);
                }
            }
            Self::Bool(_) | Self::Integer(_) | Self::String(_) | Self::Input(_) => {}
        }
    }

    /// Collects all `Input` placeholder names in this value, depth first.
    pub fn collect_inputs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Input(i) => out.push(&i.input),
            Self::List(items) => {
                for item in items {
                    item.collect_inputs(out);
                }
            }
            Self::Map(map) => {
                for value in map.values() {
                    value.collect_inputs(out);
                }
            }
            Self::Bool(_) | Self::Integer(_) | Self::String(_) | Self::Ref(_) => {}
        }
    }

    /// Replaces every `Input` placeholder with its bound value.
    ///
    /// # Errors
    ///
    /// Returns the name of the first unbound input encountered.
    pub fn substitute_inputs(&self, values: &AttrMap) -> Result<Self, String> {
        match self {
            Self::Input(i) => values
                .get(&i.input)
                .cloned()
                .ok_or_else(|| i.input.clone()),
            Self::List(items) => items
                .iter()
                .map(|item| item.substitute_inputs(values))
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
            Self::Map(map) => map
                .iter()
                .map(|(k, v)| v.substitute_inputs(values).map(|v| (k.clone(), v)))
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Self::Map),
            Self::Bool(_) | Self::Integer(_) | Self::String(_) | Self::Ref(_) => Ok(self.clone()),
        }
    }

    /// Replaces every `Ref` placeholder via the given resolver.
    ///
    /// Returns `None` if any reference cannot be resolved yet.
    pub fn resolve_refs<F>(&self, resolve: &F) -> Option<Self>
    where
        F: Fn(&RefValue) -> Option<Self>,
    {
        match self {
            Self::Ref(r) => resolve(r),
            Self::List(items) => items
                .iter()
                .map(|item| item.resolve_refs(resolve))
                .collect::<Option<Vec<_>>>()
                .map(Self::List),
            Self::Map(map) => map
                .iter()
                .map(|(k, v)| v.resolve_refs(resolve).map(|v| (k.clone(), v)))
                .collect::<Option<BTreeMap<_, _>>>()
                .map(Self::Map),
            Self::Bool(_) | Self::Integer(_) | Self::String(_) | Self::Input(_) => {
                Some(self.clone())
            }
        }
    }

    /// Returns the type name of this value for error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Ref(_) => "ref",
            Self::Input(_) => "input",
            Self::Map(_) => "map",
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Ref(r) => write!(f, "${{{}.{}}}", r.target, r.output),
            Self::Input(i) => write!(f, "${{input.{}}}", i.input),
            Self::List(_) | Self::Map(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                write!(f, "{json}")
            }
        }
    }
}

/// Declaration of a single resource within a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Provider resource type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Logical name, unique per type within the module.
    pub name: String,
    /// Declared attributes; may contain `Ref` and `Input` placeholders.
    #[serde(default)]
    pub attributes: AttrMap,
    /// Attributes whose change forces a replacement (delete then create).
    #[serde(default)]
    pub immutable: Vec<String>,
}

impl ResourceSpec {
    /// Returns the key identifying this resource.
    #[must_use]
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.kind, &self.name)
    }

    /// Collects the keys of every resource this one references.
    #[must_use]
    pub fn referenced_keys(&self) -> Vec<ResourceKey> {
        let mut refs = Vec::new();
        for value in self.attributes.values() {
            value.collect_refs(&mut refs);
        }
        let mut keys: Vec<ResourceKey> = refs.into_iter().map(|r| r.target.clone()).collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

/// Input value types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    /// String input.
    #[default]
    String,
    /// Integer input.
    Integer,
    /// Boolean input.
    Bool,
    /// List input.
    List,
}

impl InputType {
    /// Checks whether a concrete value matches this type.
    #[must_use]
    pub const fn matches(self, value: &AttrValue) -> bool {
        matches!(
            (self, value),
            (Self::String, AttrValue::String(_))
                | (Self::Integer, AttrValue::Integer(_))
                | (Self::Bool, AttrValue::Bool(_))
                | (Self::List, AttrValue::List(_))
        )
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Bool => "bool",
            Self::List => "list",
        };
        write!(f, "{s}")
    }
}

/// Declaration of a module input parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    /// Input name.
    pub name: String,
    /// Expected type.
    #[serde(rename = "type", default)]
    pub input_type: InputType,
    /// Default value used when no value is supplied.
    #[serde(default)]
    pub default: Option<AttrValue>,
    /// Optional documentation string.
    #[serde(default)]
    pub description: Option<String>,
}

/// Declaration of a module output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    /// Output name.
    pub name: String,
    /// Value of the output, usually a `Ref`.
    pub value: AttrValue,
    /// Optional documentation string.
    #[serde(default)]
    pub description: Option<String>,
}

/// Module-level metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleMeta {
    /// Unique name for the module.
    pub name: String,
    /// Environment (e.g., "dev", "staging", "prod").
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// Provider connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Base URL of the provisioner agent API.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Tags applied uniformly to every resource at graph-build time.
    #[serde(default)]
    pub default_tags: BTreeMap<String, String>,
    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// State backend configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateConfig {
    /// Backend type (local or s3).
    #[serde(default)]
    pub backend: StateBackend,
    /// S3 bucket name (required for s3 backend).
    #[serde(default)]
    pub bucket: Option<String>,
    /// S3 key prefix (optional).
    #[serde(default)]
    pub prefix: Option<String>,
    /// S3 region (optional, uses AWS default if not specified).
    #[serde(default)]
    pub region: Option<String>,
    /// Local state directory (for local backend).
    #[serde(default)]
    pub path: Option<String>,
}

/// State backend types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    /// Local file-based state storage.
    #[default]
    Local,
    /// AWS S3-based state storage.
    S3,
}

/// The root module structure for a Stratoform topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSpec {
    /// Module-level metadata.
    pub module: ModuleMeta,
    /// Provider connection configuration.
    #[serde(default)]
    pub provider: ProviderConfig,
    /// State backend configuration.
    #[serde(default)]
    pub state: StateConfig,
    /// Declared input parameters.
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
    /// Declared resources.
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
    /// Declared outputs.
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,
}

impl ModuleSpec {
    /// Returns the fully qualified module name including environment.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}-{}", self.module.name, self.module.environment)
    }

    /// Returns the keys of all declared resources, in declaration order.
    #[must_use]
    pub fn resource_keys(&self) -> Vec<ResourceKey> {
        self.resources.iter().map(ResourceSpec::key).collect()
    }

    /// Looks up an input declaration by name.
    #[must_use]
    pub fn input(&self, name: &str) -> Option<&InputSpec> {
        self.inputs.iter().find(|i| i.name == name)
    }
}

fn default_environment() -> String {
    String::from("dev")
}

fn default_output_name() -> String {
    String::from("id")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_key_parse() {
        let key: ResourceKey = "vpc.main".parse().expect("valid key");
        assert_eq!(key.kind, "vpc");
        assert_eq!(key.name, "main");
        assert_eq!(key.to_string(), "vpc.main");
    }

    #[test]
    fn test_resource_key_invalid() {
        assert!("vpc".parse::<ResourceKey>().is_err());
        assert!(".main".parse::<ResourceKey>().is_err());
        assert!("vpc.".parse::<ResourceKey>().is_err());
    }

    #[test]
    fn test_attr_value_yaml_roundtrip() {
        let yaml = r#"
cidr_block: 10.0.0.0/16
enable_dns: true
az_count: 3
vpc_id: { ref: vpc.main, output: id }
name: { input: subnet_name }
tags:
  team: infra
"#;
        let attrs: AttrMap = serde_yaml::from_str(yaml).expect("valid attributes");

        assert_eq!(
            attrs.get("cidr_block"),
            Some(&AttrValue::String(String::from("10.0.0.0/16")))
        );
        assert_eq!(attrs.get("enable_dns"), Some(&AttrValue::Bool(true)));
        assert_eq!(attrs.get("az_count"), Some(&AttrValue::Integer(3)));

        let AttrValue::Ref(r) = attrs.get("vpc_id").expect("vpc_id present") else {
            panic!("vpc_id should be a ref");
        };
        assert_eq!(r.target, ResourceKey::new("vpc", "main"));
        assert_eq!(r.output, "id");

        assert!(matches!(attrs.get("name"), Some(AttrValue::Input(_))));
        assert!(matches!(attrs.get("tags"), Some(AttrValue::Map(_))));
    }

    #[test]
    fn test_ref_default_output() {
        let value: AttrValue = serde_yaml::from_str("{ ref: vpc.main }").expect("valid ref");
        let AttrValue::Ref(r) = value else {
            panic!("expected ref");
        };
        assert_eq!(r.output, "id");
    }

    #[test]
    fn test_collect_refs_nested() {
        let yaml = r"
route_table_ids:
  - { ref: route_table.public }
  - { ref: route_table.private }
nested:
  gateway: { ref: nat_gateway.main, output: id }
";
        let attrs: AttrMap = serde_yaml::from_str(yaml).expect("valid attributes");
        let spec = ResourceSpec {
            kind: String::from("route_association"),
            name: String::from("all"),
            attributes: attrs,
            immutable: vec![],
        };

        let keys = spec.referenced_keys();
        assert_eq!(keys.len(), 3);
        assert!(keys.contains(&ResourceKey::new("nat_gateway", "main")));
    }

    #[test]
    fn test_substitute_inputs() {
        let value: AttrValue = serde_yaml::from_str("{ input: cidr }").expect("valid input ref");
        let mut bound = AttrMap::new();
        bound.insert(
            String::from("cidr"),
            AttrValue::String(String::from("10.0.0.0/16")),
        );

        let resolved = value.substitute_inputs(&bound).expect("bound input");
        assert_eq!(resolved, AttrValue::String(String::from("10.0.0.0/16")));

        let missing: AttrValue = serde_yaml::from_str("{ input: nope }").expect("valid input ref");
        assert_eq!(missing.substitute_inputs(&bound), Err(String::from("nope")));
    }

    #[test]
    fn test_input_type_matches() {
        assert!(InputType::String.matches(&AttrValue::String(String::new())));
        assert!(InputType::Integer.matches(&AttrValue::Integer(1)));
        assert!(!InputType::Integer.matches(&AttrValue::String(String::from("1"))));
        assert!(InputType::List.matches(&AttrValue::List(vec![])));
    }
}
