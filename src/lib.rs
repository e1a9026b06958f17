// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Stratoform
//!
//! A declarative, idempotent resource graph planner for provisioning APIs.
//!
//! ## Overview
//!
//! Stratoform turns a typed resource topology into an ordered change plan and
//! applies it concurrently, allowing you to:
//!
//! - Declare resources and their cross-references in a YAML module file
//! - Diff the desired topology against persisted state
//! - Apply creates, updates, replacements, and deletions in dependency order
//! - Contain failures to the affected dependency subtree
//!
//! ## Architecture
//!
//! The system is built around **plan/apply over a dependency graph**:
//!
//! 1. **Desired state**: Declared in `stratoform.module.yaml`
//! 2. **Recorded state**: A versioned state document (local file or S3)
//! 3. **Planner**: Diffs the two and emits a topologically ordered change-set
//! 4. **Executor**: Applies changes concurrently through a provider
//!
//! ## Modules
//!
//! - [`module`]: Module parsing, validation, input binding, and hashing
//! - [`graph`]: Dependency graph construction and ordering
//! - [`state`]: State storage backends (local, S3) with advisory locking
//! - [`provider`]: Provider trait and the HTTP provisioner client
//! - [`planner`]: Diff computation, planning, and plan execution
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! module:
//!   name: network-stack
//!   environment: prod
//!
//! resources:
//!   - type: vpc
//!     name: main
//!     attributes:
//!       cidr_block: 10.0.0.0/16
//!     immutable: [cidr_block]
//!
//!   - type: subnet
//!     name: public-a
//!     attributes:
//!       vpc_id: { ref: vpc.main, output: id }
//!       cidr_block: 10.0.1.0/24
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod error;
pub mod graph;
pub mod module;
pub mod planner;
pub mod provider;
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use error::{Result, StratoformError};
pub use graph::{GraphBuilder, ResourceGraph};
pub use module::{AttrHasher, BoundModule, ModuleParser, ModuleSpec, ModuleValidator};
pub use planner::{ApplyReport, DiffEngine, Plan, PlanExecutor};
pub use provider::{HttpProvider, Provider};
pub use state::{LocalStateStore, S3StateStore, StateDocument, StateStore};
