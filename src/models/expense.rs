//! Expense model with receipt attachment metadata.

use serde::{Deserialize, Serialize};

/// Review state of a submitted expense.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseStatus {
    Pending,
    Approved,
    Rejected,
}

impl ExpenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseStatus::Pending => "pending",
            ExpenseStatus::Approved => "approved",
            ExpenseStatus::Rejected => "rejected",
        }
    }

    /// Parse a status tag, accepting any casing the clients send.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Some(ExpenseStatus::Pending),
            "approved" => Some(ExpenseStatus::Approved),
            "rejected" => Some(ExpenseStatus::Rejected),
            _ => None,
        }
    }

    /// Whether a transition to `next` is legal. Nothing returns to pending;
    /// a review decision may be revised.
    pub fn can_transition(self, next: ExpenseStatus) -> bool {
        next != ExpenseStatus::Pending
    }
}

/// An expense claim with an uploaded receipt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub amount: f64,
    pub category: String,
    pub expense_date: String,
    /// Path under the static upload mount, e.g. `/uploads/1712-receipt.pdf`.
    pub receipt_path: String,
    pub status: ExpenseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields of a new expense, collected from the multipart form.
///
/// The handler assembles this from text parts; the receipt file travels
/// separately in the same form.
#[derive(Debug, Clone, Default)]
pub struct NewExpense {
    pub title: Option<String>,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub expense_date: Option<String>,
    pub notes: Option<String>,
}

/// Request body for updating an expense's status.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExpenseStatusRequest {
    #[serde(default)]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ExpenseStatus::Pending,
            ExpenseStatus::Approved,
            ExpenseStatus::Rejected,
        ] {
            assert_eq!(ExpenseStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_pending_is_never_a_target() {
        assert!(!ExpenseStatus::Approved.can_transition(ExpenseStatus::Pending));
        assert!(!ExpenseStatus::Pending.can_transition(ExpenseStatus::Pending));
    }

    #[test]
    fn test_decision_can_be_revised() {
        assert!(ExpenseStatus::Approved.can_transition(ExpenseStatus::Rejected));
        assert!(ExpenseStatus::Rejected.can_transition(ExpenseStatus::Approved));
    }
}
