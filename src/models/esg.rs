//! ESG tracking records.

use serde::{Deserialize, Serialize};

/// A yearly sustainability record, optionally scoped to one user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EsgRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub score: f64,
    pub compliance_rate: f64,
    pub co2_reduction: f64,
    pub sustainability_index: f64,
    pub year: i64,
    pub created_at: String,
}

/// Request body for adding an ESG record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEsgRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub compliance_rate: Option<f64>,
    #[serde(default)]
    pub co2_reduction: Option<f64>,
    #[serde(default)]
    pub sustainability_index: Option<f64>,
    #[serde(default)]
    pub year: Option<i64>,
}
