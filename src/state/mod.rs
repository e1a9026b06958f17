//! State management for the Stratoform planning engine.
//!
//! Persistent storage of applied resources: what exists remotely, its
//! provider-assigned identifiers, outputs, and the dependencies recorded at
//! apply time.

mod lock;
mod local;
mod s3;
mod store;
mod types;

use std::sync::Arc;

use crate::error::Result;
use crate::module::{ModuleSpec, StateBackend};

pub use lock::{generate_holder_id, LockInfo, LOCK_EXPIRY_SECS};
pub use local::LocalStateStore;
pub use s3::S3StateStore;
pub use store::StateStore;
pub use types::{StateDocument, StateRecord, STATE_VERSION};

/// Builds the state store backend named by the module's state section.
///
/// # Errors
///
/// Returns an error if the backend cannot be initialized.
pub async fn open_store(module: &ModuleSpec) -> Result<Arc<dyn StateStore>> {
    match module.state.backend {
        StateBackend::Local => {
            let store = module.state.path.as_ref().map_or_else(
                LocalStateStore::new,
                |path| Ok(LocalStateStore::with_state_path(path)),
            )?;
            Ok(Arc::new(store))
        }
        StateBackend::S3 => {
            let bucket = module.state.bucket.as_deref().unwrap_or_default();
            let store = S3StateStore::new(
                bucket,
                module.state.prefix.as_deref(),
                module.state.region.as_deref(),
            )
            .await?;
            Ok(Arc::new(store))
        }
    }
}
