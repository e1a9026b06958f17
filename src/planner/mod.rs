//! Planning and execution.
//!
//! Turns the desired resource graph plus recorded state into an ordered
//! change-set and applies it through the provider.

mod diff;
mod executor;
mod plan;

use std::collections::BTreeMap;

use crate::error::{ModuleError, Result, StratoformError};
use crate::module::{AttrValue, OutputSpec};
use crate::state::StateDocument;

pub use diff::{DiffDetail, DiffEngine, DiffResult, DiffType, ResourceDiff, KNOWN_AFTER_APPLY};
pub use executor::{
    ApplyReport, ChangeOutcome, ChangeStatus, PlanExecutor, DEFAULT_PARALLELISM,
};
pub use plan::{ActionType, ExecutionPhase, Plan, PlannedChange};

/// Resolves the module's declared outputs against applied state.
///
/// # Errors
///
/// Returns `ModuleError::UnresolvedOutput` if an output references a resource
/// with no state record.
pub fn resolve_outputs(
    outputs: &[OutputSpec],
    state: &StateDocument,
) -> Result<BTreeMap<String, AttrValue>> {
    let mut resolved = BTreeMap::new();

    for output in outputs {
        let resolve = |r: &crate::module::RefValue| {
            state.record(&r.target).and_then(|rec| rec.output(&r.output))
        };

        let Some(value) = output.value.resolve_refs(&resolve) else {
            let mut refs = Vec::new();
            output.value.collect_refs(&mut refs);
            let target = refs
                .iter()
                .find(|r| state.record(&r.target).is_none())
                .map_or_else(
                    || crate::module::ResourceKey::new("unknown", "unknown"),
                    |r| r.target.clone(),
                );
            return Err(StratoformError::Module(ModuleError::UnresolvedOutput {
                output: output.name.clone(),
                target,
            }));
        };

        resolved.insert(output.name.clone(), value);
    }

    Ok(resolved)
}
