//! Module validation.
//!
//! This module provides comprehensive structural validation of module
//! definitions, ensuring all declarations are valid and consistent before
//! graph construction. All errors are collected, not just the first.

use crate::error::{ModuleError, Result, StratoformError};
use std::collections::HashSet;
use tracing::debug;

use super::spec::{ModuleSpec, ResourceKey, ResourceSpec, StateBackend};

/// Validator for module definitions.
#[derive(Debug, Default)]
pub struct ModuleValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ModuleValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a module definition.
    ///
    /// # Errors
    ///
    /// Returns an error carrying every violation if validation fails.
    pub fn validate(&self, module: &ModuleSpec) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_meta(module, &mut result);
        Self::validate_state(module, &mut result);
        Self::validate_inputs(module, &mut result);
        Self::validate_resources(module, &mut result);
        Self::validate_outputs(module, &mut result);
        Self::warn_unused_inputs(module, &mut result);

        if result.errors.is_empty() {
            debug!("Module validation passed");
            Ok(result)
        } else {
            Err(StratoformError::Module(ModuleError::InvalidInput {
                violations: result.errors.iter().map(ToString::to_string).collect(),
            }))
        }
    }

    /// Validates module metadata.
    fn validate_meta(module: &ModuleSpec, result: &mut ValidationResult) {
        if module.module.name.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("module.name"),
                message: String::from("Module name cannot be empty"),
            });
        } else if !is_valid_name(&module.module.name) {
            result.errors.push(ValidationError {
                field: String::from("module.name"),
                message: format!(
                    "Module name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    module.module.name
                ),
            });
        }

        if module.module.environment.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("module.environment"),
                message: String::from("Environment cannot be empty"),
            });
        }
    }

    /// Validates state backend configuration.
    fn validate_state(module: &ModuleSpec, result: &mut ValidationResult) {
        match module.state.backend {
            StateBackend::S3 => {
                if module
                    .state
                    .bucket
                    .as_ref()
                    .is_none_or(String::is_empty)
                {
                    result.errors.push(ValidationError {
                        field: String::from("state.bucket"),
                        message: String::from("S3 bucket name is required when using S3 backend"),
                    });
                }
            }
            StateBackend::Local => {}
        }
    }

    /// Validates input declarations.
    fn validate_inputs(module: &ModuleSpec, result: &mut ValidationResult) {
        let mut seen = HashSet::new();

        for (i, input) in module.inputs.iter().enumerate() {
            let prefix = format!("inputs[{i}]");

            if !seen.insert(&input.name) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.name"),
                    message: format!("Duplicate input name: {}", input.name),
                });
            }

            if input.name.is_empty() {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.name"),
                    message: String::from("Input name cannot be empty"),
                });
            }

            if let Some(default) = &input.default
                && !input.input_type.matches(default) {
                    result.errors.push(ValidationError {
                        field: format!("{prefix}.default"),
                        message: format!(
                            "Default for input '{}' is {} but declared type is {}",
                            input.name,
                            default.type_name(),
                            input.input_type
                        ),
                    });
                }
        }
    }

    /// Validates resource declarations.
    fn validate_resources(module: &ModuleSpec, result: &mut ValidationResult) {
        if module.resources.is_empty() {
            result
                .warnings
                .push(String::from("No resources defined in module"));
        }

        let declared: HashSet<ResourceKey> = module.resource_keys().into_iter().collect();
        let input_names: HashSet<&str> =
            module.inputs.iter().map(|i| i.name.as_str()).collect();
        let mut seen_keys = HashSet::new();

        for (i, resource) in module.resources.iter().enumerate() {
            let prefix = format!("resources[{i}]");
            let key = resource.key();

            if !seen_keys.insert(key.clone()) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.name"),
                    message: format!("Duplicate resource: {key}"),
                });
            }

            if !is_valid_name(&resource.name) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.name"),
                    message: format!(
                        "Resource name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                        resource.name
                    ),
                });
            }

            Self::validate_references(resource, &key, &declared, &prefix, result);
            Self::validate_input_refs(resource, &input_names, &prefix, result);
            Self::validate_immutable(resource, &prefix, result);
        }
    }

    /// Validates the reference placeholders of a single resource.
    fn validate_references(
        resource: &ResourceSpec,
        key: &ResourceKey,
        declared: &HashSet<ResourceKey>,
        prefix: &str,
        result: &mut ValidationResult,
    ) {
        for target in resource.referenced_keys() {
            if target == *key {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.attributes"),
                    message: format!("Resource {key} references itself"),
                });
            } else if !declared.contains(&target) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.attributes"),
                    message: format!("Resource {key} references unknown resource {target}"),
                });
            }
        }
    }

    /// Validates the input placeholders of a single resource.
    fn validate_input_refs(
        resource: &ResourceSpec,
        input_names: &HashSet<&str>,
        prefix: &str,
        result: &mut ValidationResult,
    ) {
        let mut used = Vec::new();
        for value in resource.attributes.values() {
            value.collect_inputs(&mut used);
        }

        for name in used {
            if !input_names.contains(name) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.attributes"),
                    message: format!(
                        "Resource {} references undeclared input '{name}'",
                        resource.key()
                    ),
                });
            }
        }
    }

    /// Validates the immutable attribute list of a single resource.
    fn validate_immutable(
        resource: &ResourceSpec,
        prefix: &str,
        result: &mut ValidationResult,
    ) {
        for (i, attr) in resource.immutable.iter().enumerate() {
            if !resource.attributes.contains_key(attr) {
                result.warnings.push(format!(
                    "{prefix}.immutable[{i}]: '{attr}' is not a declared attribute"
                ));
            }
        }
    }

    /// Warns about declared inputs no resource references.
    fn warn_unused_inputs(module: &ModuleSpec, result: &mut ValidationResult) {
        let mut used = Vec::new();
        for resource in &module.resources {
            for value in resource.attributes.values() {
                value.collect_inputs(&mut used);
            }
        }
        let used: HashSet<&str> = used.into_iter().collect();

        for input in &module.inputs {
            if !used.contains(input.name.as_str()) {
                result
                    .warnings
                    .push(format!("Input '{}' is declared but never used", input.name));
            }
        }
    }

    /// Validates output declarations.
    fn validate_outputs(module: &ModuleSpec, result: &mut ValidationResult) {
        let declared: HashSet<ResourceKey> = module.resource_keys().into_iter().collect();
        let mut seen = HashSet::new();

        for (i, output) in module.outputs.iter().enumerate() {
            let prefix = format!("outputs[{i}]");

            if !seen.insert(&output.name) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.name"),
                    message: format!("Duplicate output name: {}", output.name),
                });
            }

            let mut refs = Vec::new();
            output.value.collect_refs(&mut refs);
            for r in refs {
                if !declared.contains(&r.target) {
                    result.errors.push(ValidationError {
                        field: format!("{prefix}.value"),
                        message: format!(
                            "Output '{}' references unknown resource {}",
                            output.name, r.target
                        ),
                    });
                }
            }
        }
    }
}

/// Validates that a name follows the naming convention.
/// Names must be lowercase alphanumeric with hyphens, starting with a letter.
fn is_valid_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }

    let mut chars = name.chars();

    if let Some(first) = chars.next()
        && !first.is_ascii_lowercase() {
            return false;
        }

    for c in chars {
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
            return false;
        }
    }

    if name.ends_with('-') || name.contains("--") {
        return false;
    }

    true
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::parser::ModuleParser;

    fn parse(yaml: &str) -> ModuleSpec {
        ModuleParser::new().parse_yaml(yaml, None).expect("valid yaml")
    }

    #[test]
    fn test_valid_name() {
        assert!(is_valid_name("vpc-main"));
        assert!(is_valid_name("subnet-a1"));
        assert!(is_valid_name("a"));
    }

    #[test]
    fn test_invalid_name() {
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("Vpc-Main"));
        assert!(!is_valid_name("1-vpc"));
        assert!(!is_valid_name("vpc_main"));
        assert!(!is_valid_name("vpc-"));
        assert!(!is_valid_name("vpc--main"));
    }

    #[test]
    fn test_valid_module_passes() {
        let module = parse(
            r#"
module:
  name: network
resources:
  - type: vpc
    name: main
    attributes:
      cidr_block: "10.0.0.0/16"
  - type: subnet
    name: public
    attributes:
      vpc_id: { ref: vpc.main }
"#,
        );

        let result = ModuleValidator::new().validate(&module).expect("valid");
        assert!(result.is_valid());
    }

    #[test]
    fn test_collects_all_violations() {
        let module = parse(
            r"
module:
  name: network
resources:
  - type: subnet
    name: public
    attributes:
      vpc_id: { ref: vpc.missing }
  - type: subnet
    name: public
    attributes:
      vpc_id: { ref: vpc.missing }
      label: { input: undeclared }
",
        );

        let err = ModuleValidator::new().validate(&module).unwrap_err();
        let crate::error::StratoformError::Module(ModuleError::InvalidInput { violations }) = err
        else {
            panic!("expected InvalidInput");
        };

        // Duplicate key, two unknown refs, one undeclared input.
        assert!(violations.len() >= 4);
    }

    #[test]
    fn test_self_reference_rejected() {
        let module = parse(
            r"
module:
  name: network
resources:
  - type: vpc
    name: main
    attributes:
      peer: { ref: vpc.main }
",
        );

        assert!(ModuleValidator::new().validate(&module).is_err());
    }

    #[test]
    fn test_default_type_mismatch() {
        let module = parse(
            r"
module:
  name: network
inputs:
  - name: az_count
    type: integer
    default: three
",
        );

        assert!(ModuleValidator::new().validate(&module).is_err());
    }

    #[test]
    fn test_unused_input_warns() {
        let module = parse(
            r#"
module:
  name: network
inputs:
  - name: az_count
    type: integer
    default: 3
resources:
  - type: vpc
    name: main
    attributes:
      cidr_block: "10.0.0.0/16"
"#,
        );

        let result = ModuleValidator::new().validate(&module).expect("valid");
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("az_count")));
    }

    #[test]
    fn test_s3_backend_requires_bucket() {
        let module = parse(
            r"
module:
  name: network
state:
  backend: s3
",
        );

        assert!(ModuleValidator::new().validate(&module).is_err());
    }
}
