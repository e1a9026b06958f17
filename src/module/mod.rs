//! Module definition: parsing, validation, input binding, and hashing.

mod hash;
mod inputs;
mod parser;
mod spec;
mod validator;

pub use hash::AttrHasher;
pub use inputs::BoundModule;
pub use parser::{
    find_module_file, load_var_file, parse_var, ModuleParser, DEFAULT_MODULE_FILES,
};
pub use spec::{
    AttrMap, AttrValue, InputRef, InputSpec, InputType, ModuleMeta, ModuleSpec, OutputSpec,
    ProviderConfig, RefValue, ResourceKey, ResourceSpec, StateBackend, StateConfig,
};
pub use validator::{ModuleValidator, ValidationError, ValidationResult};
