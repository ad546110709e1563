//! Persisted account types.

use serde::{Deserialize, Serialize};

/// An account that owns cases. Provisioned at the store level; account
/// issuance has no HTTP surface here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: String,
}
