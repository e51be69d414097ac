//! Expense API endpoints, including the multipart receipt upload.

use axum::{
    extract::{Multipart, Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::{require_text, success, ApiResult};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::events;
use crate::models::{Expense, ExpenseStatus, NewExpense, Role, UpdateExpenseStatusRequest};
use crate::AppState;

/// Query parameters for listing expenses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseListQuery {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// GET /api/expenses - List expenses.
///
/// Employees see their own claims; admin/manager see everything and may
/// filter by owner.
pub async fn list_expenses(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<ExpenseListQuery>,
) -> ApiResult<Vec<Expense>> {
    let status = match &query.status {
        Some(s) => Some(
            ExpenseStatus::from_str(s)
                .ok_or_else(|| AppError::Validation(format!("Invalid status: {}", s)))?,
        ),
        None => None,
    };

    let user_filter = if auth_user.role.is_approver() {
        query.user_id.as_deref()
    } else {
        Some(auth_user.id.as_str())
    };

    let expenses = state.repo.list_expenses(user_filter, status).await?;
    success(expenses)
}

/// GET /api/expenses/:id - Fetch a single expense.
pub async fn get_expense(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Expense> {
    let expense = state
        .repo
        .get_expense(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Expense not found".to_string()))?;

    if expense.user_id != auth_user.id && !auth_user.role.is_approver() {
        return Err(AppError::Forbidden(
            "You are not authorized to view this expense".to_string(),
        ));
    }

    success(expense)
}

/// POST /api/expenses - Submit an expense with its receipt.
///
/// Multipart form: text fields `title`, `amount`, `category`, `date`,
/// optional `notes`, and a single `receipt` file part. The receipt is
/// written under the upload directory with a timestamp-prefixed name and
/// served back verbatim from `/uploads`.
pub async fn create_expense(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> ApiResult<Expense> {
    let mut fields = NewExpense::default();
    let mut receipt: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "receipt" {
            let file_name = field.file_name().unwrap_or("receipt").to_string();
            let bytes = field.bytes().await?;
            receipt = Some((file_name, bytes.to_vec()));
            continue;
        }

        let text = field.text().await?;
        match name.as_str() {
            "title" => fields.title = Some(text),
            "amount" => {
                let amount = text
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| AppError::Validation("Amount must be a number".to_string()))?;
                fields.amount = Some(amount);
            }
            "category" => fields.category = Some(text),
            "date" | "dateOfExpense" => fields.expense_date = Some(text),
            "notes" => fields.notes = Some(text),
            _ => {}
        }
    }

    let title = fields
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Title is required".to_string()))?;
    let amount = fields
        .amount
        .ok_or_else(|| AppError::Validation("Amount is required".to_string()))?;
    let category = fields
        .category
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Category is required".to_string()))?;
    let expense_date = fields
        .expense_date
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Date is required".to_string()))?;
    let (file_name, bytes) =
        receipt.ok_or_else(|| AppError::Validation("Receipt file is required".to_string()))?;

    let stored_name = format!(
        "{}-{}",
        Utc::now().timestamp_millis(),
        sanitize_file_name(&file_name)
    );
    tokio::fs::create_dir_all(&state.config.upload_dir).await?;
    tokio::fs::write(state.config.upload_dir.join(&stored_name), &bytes).await?;

    let receipt_path = format!("/uploads/{}", stored_name);
    let expense = state
        .repo
        .create_expense(
            &auth_user.id,
            &title,
            amount,
            &category,
            &expense_date,
            fields.notes.as_deref(),
            &receipt_path,
        )
        .await?;

    state.events.broadcast_global(events::DASHBOARD_UPDATED);

    success(expense)
}

/// PUT /api/expenses/:id/status - Approve or reject a claim (admin only).
pub async fn update_expense_status(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(request): Json<UpdateExpenseStatusRequest>,
) -> ApiResult<Expense> {
    auth_user.require_role(&[Role::Admin])?;

    let status = require_text(&request.status, "Status")?;
    let status = ExpenseStatus::from_str(&status)
        .ok_or_else(|| AppError::Validation(format!("Invalid status: {}", status)))?;

    let expense = state
        .repo
        .get_expense(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Expense not found".to_string()))?;

    if !expense.status.can_transition(status) {
        return Err(AppError::Validation(format!(
            "Cannot change status from {} to {}",
            expense.status.as_str(),
            status.as_str()
        )));
    }

    let updated = state.repo.set_expense_status(&id, status).await?;

    state.events.broadcast_to_user(
        &updated.user_id,
        events::EXPENSES_UPDATED,
        Some(json!({ "expenseId": updated.id, "status": updated.status })),
    );
    state.events.broadcast_global(events::DASHBOARD_UPDATED);

    success(updated)
}

/// Strip path separators and shell-unfriendly characters from an uploaded
/// file name.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();

    if cleaned.trim_matches('-').is_empty() {
        "receipt".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_simple_names() {
        assert_eq!(sanitize_file_name("receipt-01.pdf"), "receipt-01.pdf");
    }

    #[test]
    fn test_sanitize_strips_path_separators() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "..-..-etc-passwd");
        assert_eq!(sanitize_file_name("a b/c.png"), "a-b-c.png");
    }

    #[test]
    fn test_sanitize_never_returns_empty() {
        assert_eq!(sanitize_file_name("///"), "receipt");
        assert_eq!(sanitize_file_name(""), "receipt");
    }
}
