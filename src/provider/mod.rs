//! Provider interface for remote resource lifecycles.
//!
//! The executor drives every mutation through the [`Provider`] trait so
//! tests can swap the HTTP backend for a mock.

mod http;
mod types;

use async_trait::async_trait;

use crate::error::Result;
use crate::module::AttrMap;

pub use http::HttpProvider;
pub use types::{
    ApiErrorBody, AppliedResource, CreateResourceRequest, ResourceResponse,
    UpdateResourceRequest,
};

/// Trait for resource provisioning backends.
///
/// Implementations own their retry policy for transient failures; callers
/// treat a returned error as final for the resource in question.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Creates a resource and returns its identifier and outputs.
    async fn create(
        &self,
        kind: &str,
        name: &str,
        attributes: &AttrMap,
    ) -> Result<AppliedResource>;

    /// Updates a resource in place and returns its refreshed outputs.
    async fn update(&self, kind: &str, id: &str, attributes: &AttrMap)
        -> Result<AppliedResource>;

    /// Deletes a resource. Deleting an already-absent resource succeeds.
    async fn delete(&self, kind: &str, id: &str) -> Result<()>;

    /// Gets the provider type name.
    fn provider_type(&self) -> &'static str;
}
