//! Travel policy model.
//!
//! Policies are named bundles of free-form rule documents; the portals edit
//! them as nested JSON rather than normalized columns.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named travel policy.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub id: String,
    pub name: String,
    pub booking_rules: Value,
    pub safety_rules: Value,
    pub expense_rules: Value,
    pub updated_at: String,
}

/// Request body for creating or replacing a policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub booking_rules: Option<Value>,
    #[serde(default)]
    pub safety_rules: Option<Value>,
    #[serde(default)]
    pub expense_rules: Option<Value>,
}
