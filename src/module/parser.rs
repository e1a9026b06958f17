//! Module file loading.
//!
//! This module handles loading the module definition from YAML files and
//! environment variables, with proper precedence and error handling.

use crate::error::{ModuleError, Result, StratoformError};
use std::path::Path;
use tracing::{debug, info};

use super::spec::{AttrMap, AttrValue, ModuleSpec};

/// Parser for loading module definitions.
#[derive(Debug, Default)]
pub struct ModuleParser {
    /// Base path for resolving relative paths.
    base_path: Option<std::path::PathBuf>,
}

impl ModuleParser {
    /// Creates a new module parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a module definition from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ModuleSpec> {
        let path = path.as_ref();
        info!("Loading module from: {}", path.display());

        if !path.exists() {
            return Err(StratoformError::Module(ModuleError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            StratoformError::Module(ModuleError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses a module definition from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<ModuleSpec> {
        debug!("Parsing YAML module definition");

        let module: ModuleSpec = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            StratoformError::Module(ModuleError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Successfully parsed module: {}", module.module.name);
        Ok(module)
    }

    /// Loads a module with environment variable overrides applied.
    ///
    /// Environment variables use the format `STRATOFORM_<SECTION>_<KEY>`
    /// (e.g., `STRATOFORM_PROVIDER_ENDPOINT`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<ModuleSpec> {
        let mut module = self.load_file(path)?;
        Self::apply_env_overrides(&mut module);
        Ok(module)
    }

    /// Applies environment variable overrides to the module definition.
    fn apply_env_overrides(module: &mut ModuleSpec) {
        if let Ok(endpoint) = std::env::var("STRATOFORM_PROVIDER_ENDPOINT") {
            debug!("Overriding provider.endpoint from environment");
            module.provider.endpoint = Some(endpoint);
        }

        if let Ok(env) = std::env::var("STRATOFORM_MODULE_ENVIRONMENT") {
            debug!("Overriding module.environment from environment");
            module.module.environment = env;
        }

        if let Ok(bucket) = std::env::var("STRATOFORM_STATE_BUCKET") {
            debug!("Overriding state.bucket from environment");
            module.state.bucket = Some(bucket);
        }

        if let Ok(prefix) = std::env::var("STRATOFORM_STATE_PREFIX") {
            debug!("Overriding state.prefix from environment");
            module.state.prefix = Some(prefix);
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| std::path::PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                StratoformError::Module(ModuleError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Gets the provider API token from environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not set.
    pub fn get_provider_token() -> Result<String> {
        std::env::var("STRATOFORM_PROVIDER_TOKEN").map_err(|_| {
            StratoformError::Module(ModuleError::MissingEnvVar {
                name: String::from("STRATOFORM_PROVIDER_TOKEN"),
            })
        })
    }
}

/// Parses a single `--var name=value` argument.
///
/// The value is parsed as YAML so that `true`, `3`, and `[a, b]` keep their
/// types; anything unparseable stays a string.
///
/// # Errors
///
/// Returns an error if the argument is not of the form `name=value`.
pub fn parse_var(arg: &str) -> Result<(String, AttrValue)> {
    let Some((name, raw)) = arg.split_once('=') else {
        return Err(StratoformError::Module(ModuleError::ParseError {
            message: format!("Invalid --var argument: {arg}. Expected format: NAME=VALUE"),
            location: None,
        }));
    };

    let value = serde_yaml::from_str::<AttrValue>(raw)
        .unwrap_or_else(|_| AttrValue::String(raw.to_string()));

    Ok((name.to_string(), value))
}

/// Loads a YAML var file into an input value map.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed as a mapping.
pub fn load_var_file(path: impl AsRef<Path>) -> Result<AttrMap> {
    let path = path.as_ref();
    info!("Loading input values from: {}", path.display());

    let content = std::fs::read_to_string(path).map_err(|e| {
        StratoformError::Module(ModuleError::ParseError {
            message: format!("Failed to read var file: {e}"),
            location: Some(path.display().to_string()),
        })
    })?;

    serde_yaml::from_str(&content).map_err(|e| {
        StratoformError::Module(ModuleError::ParseError {
            message: format!("YAML parse error: {e}"),
            location: Some(path.display().to_string()),
        })
    })
}

/// Default module file names to search for.
pub const DEFAULT_MODULE_FILES: &[&str] = &[
    "stratoform.module.yaml",
    "stratoform.module.yml",
    "module.yaml",
    "module.yml",
];

/// Finds the module file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no module file is found.
pub fn find_module_file(start_dir: impl AsRef<Path>) -> Result<std::path::PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_MODULE_FILES {
            let module_path = current.join(filename);
            if module_path.exists() {
                info!("Found module file: {}", module_path.display());
                return Ok(module_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(StratoformError::Module(ModuleError::FileNotFound {
        path: start.join(DEFAULT_MODULE_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_module() {
        let yaml = r"
module:
  name: network-stack
";
        let parser = ModuleParser::new();
        let module = parser.parse_yaml(yaml, None).expect("valid module");

        assert_eq!(module.module.name, "network-stack");
        assert_eq!(module.module.environment, "dev");
        assert!(module.resources.is_empty());
    }

    #[test]
    fn test_parse_full_module() {
        let yaml = r#"
module:
  name: network-stack
  environment: prod

provider:
  endpoint: https://provisioner.internal/api
  default_tags:
    team: infra

state:
  backend: s3
  bucket: stratoform-state
  prefix: network-stack/prod

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
    immutable: [cidr_block]

  - type: subnet
    name: public-a
    attributes:
      vpc_id: { ref: vpc.main, output: id }
      cidr_block: "10.0.1.0/24"

outputs:
  - name: vpc_id
    value: { ref: vpc.main, output: id }
"#;
        let parser = ModuleParser::new();
        let module = parser.parse_yaml(yaml, None).expect("valid module");

        assert_eq!(module.module.name, "network-stack");
        assert_eq!(module.inputs.len(), 2);
        assert_eq!(module.resources.len(), 2);
        assert_eq!(module.resources[0].immutable, vec!["cidr_block"]);
        assert_eq!(module.outputs.len(), 1);
        assert_eq!(
            module.provider.default_tags.get("team"),
            Some(&String::from("infra"))
        );
    }

    #[test]
    fn test_parse_var_typed() {
        let (name, value) = parse_var("az_count=3").expect("valid var");
        assert_eq!(name, "az_count");
        assert_eq!(value, AttrValue::Integer(3));

        let (_, value) = parse_var("enabled=true").expect("valid var");
        assert_eq!(value, AttrValue::Bool(true));

        let (_, value) = parse_var("cidr=10.0.0.0/16").expect("valid var");
        assert_eq!(value, AttrValue::String(String::from("10.0.0.0/16")));
    }

    #[test]
    fn test_parse_var_invalid() {
        assert!(parse_var("no-equals-sign").is_err());
    }
}
