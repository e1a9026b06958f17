//! Input binding.
//!
//! Binds supplied input values against the module's declared parameters,
//! applying defaults and type checks, then substitutes the bound values into
//! every resource attribute. Every violated constraint is reported, not just
//! the first.

use tracing::debug;

use crate::error::{ModuleError, Result, StratoformError};

use super::spec::{AttrMap, ModuleSpec, OutputSpec, ResourceSpec};

/// A module with inputs bound and substituted.
///
/// Resources in a bound module contain no `Input` placeholders; `Ref`
/// placeholders remain for the graph builder.
#[derive(Debug, Clone)]
pub struct BoundModule {
    /// The originating module definition.
    pub module: ModuleSpec,
    /// Fully resolved input values.
    pub inputs: AttrMap,
    /// Resources with input placeholders substituted.
    pub resources: Vec<ResourceSpec>,
}

impl BoundModule {
    /// Binds supplied values against the module's declared inputs.
    ///
    /// # Errors
    ///
    /// Returns `ModuleError::InvalidInput` listing every violated constraint:
    /// unknown supplied values, missing values without defaults, and type
    /// mismatches.
    pub fn bind(module: &ModuleSpec, supplied: &AttrMap) -> Result<Self> {
        let mut violations = Vec::new();
        let mut bound = AttrMap::new();

        for name in supplied.keys() {
            if module.input(name).is_none() {
                violations.push(format!("Unknown input: '{name}' is not declared by the module"));
            }
        }

        for input in &module.inputs {
            let value = supplied.get(&input.name).or(input.default.as_ref());

            match value {
                Some(v) if input.input_type.matches(v) => {
                    bound.insert(input.name.clone(), v.clone());
                }
                Some(v) => {
                    violations.push(format!(
                        "Input '{}': expected {}, got {}",
                        input.name,
                        input.input_type,
                        v.type_name()
                    ));
                }
                None => {
                    violations.push(format!(
                        "Input '{}': no value supplied and no default declared",
                        input.name
                    ));
                }
            }
        }

        if !violations.is_empty() {
            return Err(StratoformError::Module(ModuleError::InvalidInput {
                violations,
            }));
        }

        debug!("Bound {} input value(s)", bound.len());

        let mut resources = Vec::with_capacity(module.resources.len());
        for resource in &module.resources {
            let mut substituted = resource.clone();
            substituted.attributes = resource
                .attributes
                .iter()
                .map(|(k, v)| {
                    v.substitute_inputs(&bound).map(|v| (k.clone(), v)).map_err(|name| {
                        StratoformError::Module(ModuleError::InvalidInput {
                            violations: vec![format!(
                                "Resource {} references unbound input '{name}'",
                                resource.key()
                            )],
                        })
                    })
                })
                .collect::<Result<AttrMap>>()?;
            resources.push(substituted);
        }

        Ok(Self {
            module: module.clone(),
            inputs: bound,
            resources,
        })
    }

    /// Returns the declared outputs of the module.
    #[must_use]
    pub fn outputs(&self) -> &[OutputSpec] {
        &self.module.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::parser::ModuleParser;
    use crate::module::spec::AttrValue;

    fn sample_module() -> ModuleSpec {
        ModuleParser::new()
            .parse_yaml(
                r"
module:
  name: network
inputs:
  - name: vpc_cidr
    type: string
    default: 10.0.0.0/16
  - name: az_count
    type: integer
resources:
  - type: vpc
    name: main
    attributes:
      cidr_block: { input: vpc_cidr }
      az_count: { input: az_count }
",
                None,
            )
            .expect("valid module")
    }

    #[test]
    fn test_bind_with_defaults() {
        let module = sample_module();
        let mut supplied = AttrMap::new();
        supplied.insert(String::from("az_count"), AttrValue::Integer(3));

        let bound = BoundModule::bind(&module, &supplied).expect("binds");

        assert_eq!(
            bound.resources[0].attributes.get("cidr_block"),
            Some(&AttrValue::String(String::from("10.0.0.0/16")))
        );
        assert_eq!(
            bound.resources[0].attributes.get("az_count"),
            Some(&AttrValue::Integer(3))
        );
    }

    #[test]
    fn test_bind_reports_every_violation() {
        let module = sample_module();
        let mut supplied = AttrMap::new();
        // Wrong type for az_count, plus an unknown input.
        supplied.insert(
            String::from("az_count"),
            AttrValue::String(String::from("three")),
        );
        supplied.insert(String::from("bogus"), AttrValue::Bool(true));

        let err = BoundModule::bind(&module, &supplied).unwrap_err();
        let StratoformError::Module(ModuleError::InvalidInput { violations }) = err else {
            panic!("expected InvalidInput");
        };

        assert_eq!(violations.len(), 2);
        assert!(violations.iter().any(|v| v.contains("az_count")));
        assert!(violations.iter().any(|v| v.contains("bogus")));
    }

    #[test]
    fn test_bind_missing_required() {
        let module = sample_module();
        let supplied = AttrMap::new();

        let err = BoundModule::bind(&module, &supplied).unwrap_err();
        let StratoformError::Module(ModuleError::InvalidInput { violations }) = err else {
            panic!("expected InvalidInput");
        };

        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("az_count"));
    }
}
