//! Provider wire types.
//!
//! Request and response shapes for the provisioning API, plus the
//! provider-agnostic result every backend returns.

use serde::{Deserialize, Serialize};

use crate::module::AttrMap;

/// The result of a successful create or update call.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedResource {
    /// Provider-assigned identifier.
    pub id: String,
    /// Outputs reported by the provider (endpoint URLs, ARNs, and so on).
    pub outputs: AttrMap,
}

/// Request body for creating a resource.
#[derive(Debug, Serialize)]
pub struct CreateResourceRequest<'a> {
    /// Resource type.
    #[serde(rename = "type")]
    pub kind: &'a str,
    /// Resource name.
    pub name: &'a str,
    /// Fully resolved attributes.
    pub attributes: &'a AttrMap,
}

/// Request body for updating a resource in place.
#[derive(Debug, Serialize)]
pub struct UpdateResourceRequest<'a> {
    /// Fully resolved attributes.
    pub attributes: &'a AttrMap,
}

/// Response body for create and update calls.
#[derive(Debug, Deserialize)]
pub struct ResourceResponse {
    /// Provider-assigned identifier.
    pub id: String,
    /// Outputs reported by the provider.
    #[serde(default)]
    pub outputs: AttrMap,
}

/// Error body returned by the provisioning API.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    /// Human-readable error message.
    #[serde(default)]
    pub message: String,
}

impl ResourceResponse {
    /// Converts the wire response into the provider-agnostic result.
    #[must_use]
    pub fn into_applied(self) -> AppliedResource {
        AppliedResource {
            id: self.id,
            outputs: self.outputs,
        }
    }
}
