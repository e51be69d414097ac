//! Database repository for CRUD operations.
//!
//! Uses prepared statements throughout; one method per query.

use chrono::{Datelike, Utc};
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    Alert, CreateScheduleItemRequest, CreateTravelCardRequest, EsgRecord, Expense, ExpenseStatus,
    NewTrip, Policy, PolicyRequest, RiskLevel, RiskRating, Role, ScheduleItem, TravelCard, Trip,
    TripStatus, User, WeatherSnapshot,
};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== USER OPERATIONS ====================

    /// Create a new user account.
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, created_at) VALUES (?, ?, ?, ?, ?, ?)"
        )
        .bind(&id)
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: now,
        })
    }

    /// Look up a user by email address.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(
            "SELECT id, name, email, password_hash, role, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(
            "SELECT id, name, email, password_hash, role, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// List all users.
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query(
            "SELECT id, name, email, password_hash, role, created_at FROM users ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    // ==================== TRIP OPERATIONS ====================

    /// Create a new travel request with status Pending.
    pub async fn create_trip(&self, new_trip: &NewTrip) -> Result<Trip, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let status = TripStatus::Pending;

        sqlx::query(
            r#"INSERT INTO trips (
                id, user_id, employee_name, destination, purpose,
                start_date, end_date, budget, urgency, accommodation,
                co2_kg, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&new_trip.user_id)
        .bind(&new_trip.employee_name)
        .bind(&new_trip.destination)
        .bind(&new_trip.purpose)
        .bind(&new_trip.start_date)
        .bind(&new_trip.end_date)
        .bind(new_trip.budget)
        .bind(&new_trip.urgency)
        .bind(&new_trip.accommodation)
        .bind(new_trip.co2_kg)
        .bind(status.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Trip {
            id,
            user_id: new_trip.user_id.clone(),
            employee_name: new_trip.employee_name.clone(),
            destination: new_trip.destination.clone(),
            purpose: new_trip.purpose.clone(),
            start_date: new_trip.start_date.clone(),
            end_date: new_trip.end_date.clone(),
            budget: new_trip.budget,
            urgency: new_trip.urgency.clone(),
            accommodation: new_trip.accommodation.clone(),
            co2_kg: new_trip.co2_kg,
            status,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Get a trip by ID.
    pub async fn get_trip(&self, id: &str) -> Result<Option<Trip>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(trip_from_row))
    }

    /// List one user's trips, newest first.
    pub async fn list_trips_for_user(&self, user_id: &str) -> Result<Vec<Trip>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE user_id = ? ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(trip_from_row).collect())
    }

    /// List all trips, newest first.
    pub async fn list_all_trips(&self) -> Result<Vec<Trip>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(trip_from_row).collect())
    }

    /// Overwrite a trip's status. Transition rules are checked by the caller.
    pub async fn set_trip_status(&self, id: &str, status: TripStatus) -> Result<Trip, AppError> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query("UPDATE trips SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Trip {} not found", id)));
        }

        self.get_trip(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Trip {} not found", id)))
    }

    /// The user's most recently touched trips.
    pub async fn recent_trips_for_user(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<Trip>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {TRIP_COLUMNS} FROM trips WHERE user_id = ? ORDER BY updated_at DESC LIMIT ?"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(trip_from_row).collect())
    }

    // ==================== EXPENSE OPERATIONS ====================

    /// Create a new expense with status pending.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_expense(
        &self,
        user_id: &str,
        title: &str,
        amount: f64,
        category: &str,
        expense_date: &str,
        notes: Option<&str>,
        receipt_path: &str,
    ) -> Result<Expense, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let status = ExpenseStatus::Pending;

        sqlx::query(
            r#"INSERT INTO expenses (
                id, user_id, title, amount, category, expense_date,
                receipt_path, status, notes, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(title)
        .bind(amount)
        .bind(category)
        .bind(expense_date)
        .bind(receipt_path)
        .bind(status.as_str())
        .bind(notes)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Expense {
            id,
            user_id: user_id.to_string(),
            title: title.to_string(),
            amount,
            category: category.to_string(),
            expense_date: expense_date.to_string(),
            receipt_path: receipt_path.to_string(),
            status,
            notes: notes.map(|n| n.to_string()),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Get an expense by ID.
    pub async fn get_expense(&self, id: &str) -> Result<Option<Expense>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(expense_from_row))
    }

    /// List expenses, newest first, optionally filtered by owner and status.
    pub async fn list_expenses(
        &self,
        user_id: Option<&str>,
        status: Option<ExpenseStatus>,
    ) -> Result<Vec<Expense>, AppError> {
        let base = format!("SELECT {EXPENSE_COLUMNS} FROM expenses");
        let order = " ORDER BY created_at DESC";

        let rows = match (user_id, status) {
            (Some(user), Some(status)) => {
                sqlx::query(&format!("{base} WHERE user_id = ? AND status = ?{order}"))
                    .bind(user)
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            (Some(user), None) => {
                sqlx::query(&format!("{base} WHERE user_id = ?{order}"))
                    .bind(user)
                    .fetch_all(&self.pool)
                    .await?
            }
            (None, Some(status)) => {
                sqlx::query(&format!("{base} WHERE status = ?{order}"))
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            (None, None) => {
                sqlx::query(&format!("{base}{order}"))
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows.iter().map(expense_from_row).collect())
    }

    /// Overwrite an expense's status. Transition rules are checked by the caller.
    pub async fn set_expense_status(
        &self,
        id: &str,
        status: ExpenseStatus,
    ) -> Result<Expense, AppError> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query("UPDATE expenses SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Expense {} not found", id)));
        }

        self.get_expense(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Expense {} not found", id)))
    }

    /// The user's most recently touched expenses.
    pub async fn recent_expenses_for_user(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<Expense>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE user_id = ? ORDER BY updated_at DESC LIMIT ?"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(expense_from_row).collect())
    }

    // ==================== RISK OPERATIONS ====================

    /// List all risk ratings, most recent date first.
    pub async fn list_risks(&self) -> Result<Vec<RiskRating>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {RISK_COLUMNS} FROM risk_ratings ORDER BY date DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(risk_from_row).collect())
    }

    /// Find a risk rating by its destination key.
    pub async fn find_risk(
        &self,
        country: &str,
        city: Option<&str>,
    ) -> Result<Option<RiskRating>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {RISK_COLUMNS} FROM risk_ratings WHERE country = ? AND city IS ?"
        ))
        .bind(country)
        .bind(city)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(risk_from_row))
    }

    /// Create or overwrite the rating for a (country, city) pair.
    ///
    /// Updates happen in place; no history is retained.
    pub async fn upsert_risk(
        &self,
        country: &str,
        city: Option<&str>,
        level: RiskLevel,
        description: &str,
        date: &str,
        weather: Option<&WeatherSnapshot>,
    ) -> Result<RiskRating, AppError> {
        let now = Utc::now().to_rfc3339();
        let weather_json = weather
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| AppError::BadRequest(format!("Invalid weather payload: {}", e)))?;

        let id = match self.find_risk(country, city).await? {
            Some(existing) => {
                sqlx::query(
                    r#"UPDATE risk_ratings
                       SET level = ?, description = ?, date = ?, weather = ?, updated_at = ?
                       WHERE id = ?"#,
                )
                .bind(level.as_str())
                .bind(description)
                .bind(date)
                .bind(&weather_json)
                .bind(&now)
                .bind(&existing.id)
                .execute(&self.pool)
                .await?;
                existing.id
            }
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                sqlx::query(
                    r#"INSERT INTO risk_ratings (id, country, city, level, description, date, weather, updated_at)
                       VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
                )
                .bind(&id)
                .bind(country)
                .bind(city)
                .bind(level.as_str())
                .bind(description)
                .bind(date)
                .bind(&weather_json)
                .bind(&now)
                .execute(&self.pool)
                .await?;
                id
            }
        };

        Ok(RiskRating {
            id,
            country: country.to_string(),
            city: city.map(|c| c.to_string()),
            level,
            description: description.to_string(),
            date: date.to_string(),
            weather: weather.cloned(),
            updated_at: now,
        })
    }

    /// Delete a risk rating.
    pub async fn delete_risk(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM risk_ratings WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Risk rating {} not found", id)));
        }

        Ok(())
    }

    // ==================== ALERT OPERATIONS ====================

    /// List all alerts, newest first.
    pub async fn list_alerts(&self) -> Result<Vec<Alert>, AppError> {
        let rows = sqlx::query(
            "SELECT id, trip_id, alert_type, message, notified, created_at FROM alerts ORDER BY created_at DESC"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(alert_from_row).collect())
    }

    /// Create a new alert.
    pub async fn create_alert(
        &self,
        trip_id: &str,
        alert_type: &str,
        message: &str,
    ) -> Result<Alert, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO alerts (id, trip_id, alert_type, message, notified, created_at) VALUES (?, ?, ?, ?, 0, ?)"
        )
        .bind(&id)
        .bind(trip_id)
        .bind(alert_type)
        .bind(message)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Alert {
            id,
            trip_id: trip_id.to_string(),
            alert_type: alert_type.to_string(),
            message: message.to_string(),
            notified: false,
            created_at: now,
        })
    }

    /// Mark one alert as read.
    pub async fn mark_alert_read(&self, id: &str) -> Result<Alert, AppError> {
        let result = sqlx::query("UPDATE alerts SET notified = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Alert {} not found", id)));
        }

        let row = sqlx::query(
            "SELECT id, trip_id, alert_type, message, notified, created_at FROM alerts WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(alert_from_row(&row))
    }

    /// Mark every alert as read.
    pub async fn mark_all_alerts_read(&self) -> Result<(), AppError> {
        sqlx::query("UPDATE alerts SET notified = 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete an alert.
    pub async fn delete_alert(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM alerts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Alert {} not found", id)));
        }

        Ok(())
    }

    // ==================== POLICY OPERATIONS ====================

    /// List all policies.
    pub async fn list_policies(&self) -> Result<Vec<Policy>, AppError> {
        let rows = sqlx::query(
            "SELECT id, name, booking_rules, safety_rules, expense_rules, updated_at FROM policies ORDER BY name"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(policy_from_row).collect())
    }

    /// Get a policy by ID.
    pub async fn get_policy(&self, id: &str) -> Result<Option<Policy>, AppError> {
        let row = sqlx::query(
            "SELECT id, name, booking_rules, safety_rules, expense_rules, updated_at FROM policies WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(policy_from_row))
    }

    /// Create a new policy.
    pub async fn create_policy(&self, name: &str, request: &PolicyRequest) -> Result<Policy, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let booking = rules_json(&request.booking_rules);
        let safety = rules_json(&request.safety_rules);
        let expense = rules_json(&request.expense_rules);

        sqlx::query(
            r#"INSERT INTO policies (id, name, booking_rules, safety_rules, expense_rules, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(name)
        .bind(&booking)
        .bind(&safety)
        .bind(&expense)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get_policy(&id)
            .await?
            .ok_or_else(|| AppError::Internal("Policy creation failed".to_string()))
    }

    /// Replace an existing policy's rule documents.
    pub async fn update_policy(&self, id: &str, request: &PolicyRequest) -> Result<Policy, AppError> {
        let existing = self
            .get_policy(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Policy {} not found", id)))?;

        let now = Utc::now().to_rfc3339();
        let name = request.name.clone().unwrap_or(existing.name);
        let booking = request
            .booking_rules
            .clone()
            .unwrap_or(existing.booking_rules);
        let safety = request.safety_rules.clone().unwrap_or(existing.safety_rules);
        let expense = request
            .expense_rules
            .clone()
            .unwrap_or(existing.expense_rules);

        sqlx::query(
            r#"UPDATE policies
               SET name = ?, booking_rules = ?, safety_rules = ?, expense_rules = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&name)
        .bind(booking.to_string())
        .bind(safety.to_string())
        .bind(expense.to_string())
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_policy(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Policy {} not found", id)))
    }

    // ==================== ESG OPERATIONS ====================

    /// List all ESG records, latest year first.
    pub async fn list_esg_records(&self) -> Result<Vec<EsgRecord>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, user_id, score, compliance_rate, co2_reduction, sustainability_index,
                      year, created_at
               FROM esg_records ORDER BY year DESC"#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(esg_from_row).collect())
    }

    /// Add an ESG record.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_esg_record(
        &self,
        user_id: Option<&str>,
        score: f64,
        compliance_rate: f64,
        co2_reduction: f64,
        sustainability_index: f64,
        year: i64,
    ) -> Result<EsgRecord, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"INSERT INTO esg_records (id, user_id, score, compliance_rate, co2_reduction,
                                        sustainability_index, year, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(score)
        .bind(compliance_rate)
        .bind(co2_reduction)
        .bind(sustainability_index)
        .bind(year)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(EsgRecord {
            id,
            user_id: user_id.map(|u| u.to_string()),
            score,
            compliance_rate,
            co2_reduction,
            sustainability_index,
            year,
            created_at: now,
        })
    }

    // ==================== ITINERARY OPERATIONS ====================

    /// List a trip's schedule, day then time ascending.
    pub async fn list_schedule_items(&self, trip_id: &str) -> Result<Vec<ScheduleItem>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, trip_id, date, time, item_type, title, details, notes, status
               FROM schedule_items WHERE trip_id = ? ORDER BY date ASC, time ASC"#,
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(schedule_item_from_row).collect())
    }

    /// Add a schedule activity to a trip.
    pub async fn create_schedule_item(
        &self,
        trip_id: &str,
        request: &CreateScheduleItemRequest,
    ) -> Result<ScheduleItem, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let date = request.date.clone().unwrap_or_default();
        let time = request.time.clone().unwrap_or_default();
        let item_type = request.item_type.clone().unwrap_or_default();
        let title = request.title.clone().unwrap_or_default();

        sqlx::query(
            r#"INSERT INTO schedule_items (id, trip_id, date, time, item_type, title, details, notes, status)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'scheduled')"#,
        )
        .bind(&id)
        .bind(trip_id)
        .bind(&date)
        .bind(&time)
        .bind(&item_type)
        .bind(&title)
        .bind(&request.details)
        .bind(&request.notes)
        .execute(&self.pool)
        .await?;

        Ok(ScheduleItem {
            id,
            trip_id: trip_id.to_string(),
            date,
            time,
            item_type,
            title,
            details: request.details.clone(),
            notes: request.notes.clone(),
            status: "scheduled".to_string(),
        })
    }

    /// List a trip's travel wallet cards in insertion order.
    pub async fn list_travel_cards(&self, trip_id: &str) -> Result<Vec<TravelCard>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, trip_id, card_type, number, expiry, days_until_expiry, status
               FROM travel_cards WHERE trip_id = ? ORDER BY rowid ASC"#,
        )
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(travel_card_from_row).collect())
    }

    /// Add a travel wallet card to a trip.
    pub async fn create_travel_card(
        &self,
        trip_id: &str,
        request: &CreateTravelCardRequest,
    ) -> Result<TravelCard, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let card_type = request.card_type.clone().unwrap_or_default();
        let status = request.status.clone().unwrap_or_else(|| "active".to_string());

        sqlx::query(
            r#"INSERT INTO travel_cards (id, trip_id, card_type, number, expiry, days_until_expiry, status)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(trip_id)
        .bind(&card_type)
        .bind(&request.number)
        .bind(&request.expiry)
        .bind(request.days_until_expiry)
        .bind(&status)
        .execute(&self.pool)
        .await?;

        Ok(TravelCard {
            id,
            trip_id: trip_id.to_string(),
            card_type,
            number: request.number.clone(),
            expiry: request.expiry.clone(),
            days_until_expiry: request.days_until_expiry,
            status,
        })
    }

    // ==================== AGGREGATE QUERIES ====================

    /// Count of a user's trips that are still pending or under way.
    pub async fn count_active_trips(&self, user_id: &str) -> Result<i64, AppError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM trips WHERE user_id = ? AND status IN ('Pending', 'Approved')",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("n"))
    }

    /// Total amount of the user's expenses still awaiting review.
    pub async fn sum_pending_expenses(&self, user_id: &str) -> Result<f64, AppError> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(amount), 0.0) AS total FROM expenses WHERE user_id = ? AND status = 'pending'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("total"))
    }

    /// Unread alerts across the user's trips.
    pub async fn count_unread_alerts(&self, user_id: &str) -> Result<i64, AppError> {
        let row = sqlx::query(
            r#"SELECT COUNT(*) AS n
               FROM alerts a JOIN trips t ON a.trip_id = t.id
               WHERE t.user_id = ? AND a.notified = 0"#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("n"))
    }

    /// Average ESG score across the user's records, 0 when there are none.
    pub async fn average_esg_score(&self, user_id: &str) -> Result<f64, AppError> {
        let row = sqlx::query(
            "SELECT COALESCE(AVG(score), 0.0) AS avg_score FROM esg_records WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("avg_score"))
    }

    /// Estimated emissions from trips the user created this calendar month.
    pub async fn co2_this_month(&self, user_id: &str) -> Result<f64, AppError> {
        let now = Utc::now();
        let start_of_month = format!("{:04}-{:02}-01T00:00:00+00:00", now.year(), now.month());

        let row = sqlx::query(
            "SELECT COALESCE(SUM(co2_kg), 0.0) AS total FROM trips WHERE user_id = ? AND created_at >= ?",
        )
        .bind(user_id)
        .bind(&start_of_month)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("total"))
    }

    /// Total amount the user has claimed so far.
    pub async fn sum_expenses(&self, user_id: &str) -> Result<f64, AppError> {
        let row =
            sqlx::query("SELECT COALESCE(SUM(amount), 0.0) AS total FROM expenses WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(row.get("total"))
    }

    /// Fleet-wide trip counters for the KPI endpoint.
    pub async fn kpi_trip_stats(&self) -> Result<KpiTripStats, AppError> {
        let row = sqlx::query(
            r#"SELECT
                COUNT(*) AS total_trips,
                COUNT(CASE WHEN status = 'Approved' THEN 1 END) AS approved_trips,
                COUNT(CASE WHEN status = 'Pending' THEN 1 END) AS pending_trips,
                COUNT(CASE WHEN status = 'Rejected' THEN 1 END) AS rejected_trips,
                COUNT(CASE WHEN status = 'Cancelled' THEN 1 END) AS cancelled_trips,
                COUNT(DISTINCT user_id) AS distinct_travelers,
                COUNT(DISTINCT destination) AS destinations_count,
                COALESCE(SUM(budget), 0.0) AS total_budget
               FROM trips"#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(KpiTripStats {
            total_trips: row.get("total_trips"),
            approved_trips: row.get("approved_trips"),
            pending_trips: row.get("pending_trips"),
            rejected_trips: row.get("rejected_trips"),
            cancelled_trips: row.get("cancelled_trips"),
            distinct_travelers: row.get("distinct_travelers"),
            destinations_count: row.get("destinations_count"),
            total_budget: row.get("total_budget"),
        })
    }

    /// Expense spend per headline category since the given timestamp.
    pub async fn kpi_expense_stats(&self, since: &str) -> Result<KpiExpenseStats, AppError> {
        let row = sqlx::query(
            r#"SELECT
                COALESCE(SUM(amount), 0.0) AS total_spend,
                COALESCE(SUM(CASE WHEN LOWER(category) LIKE '%air%' OR LOWER(category) LIKE '%flight%' THEN amount ELSE 0 END), 0.0) AS total_airfare,
                COALESCE(SUM(CASE WHEN LOWER(category) LIKE '%hotel%' OR LOWER(category) LIKE '%accommodation%' THEN amount ELSE 0 END), 0.0) AS total_hotels,
                COALESCE(SUM(CASE WHEN LOWER(category) LIKE '%meal%' OR LOWER(category) LIKE '%food%' THEN amount ELSE 0 END), 0.0) AS total_meals
               FROM expenses WHERE created_at >= ?"#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(KpiExpenseStats {
            total_spend: row.get("total_spend"),
            total_airfare: row.get("total_airfare"),
            total_hotels: row.get("total_hotels"),
            total_meals: row.get("total_meals"),
        })
    }

    /// Trips within the optional date window, newest first, capped.
    pub async fn analytics_trips(
        &self,
        start_date: Option<&str>,
        end_date: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Trip>, AppError> {
        let rows = sqlx::query(&format!(
            r#"SELECT {TRIP_COLUMNS} FROM trips
               WHERE (? IS NULL OR start_date >= ?)
                 AND (? IS NULL OR start_date <= ?)
               ORDER BY created_at DESC LIMIT ?"#
        ))
        .bind(start_date)
        .bind(start_date)
        .bind(end_date)
        .bind(end_date)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(trip_from_row).collect())
    }

    /// Trip count and spend per calendar month, latest months first.
    pub async fn monthly_trend(
        &self,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<Vec<MonthlyTrend>, AppError> {
        let rows = sqlx::query(
            r#"SELECT substr(created_at, 1, 7) AS month,
                      COUNT(*) AS trips,
                      COALESCE(SUM(budget), 0.0) AS spend
               FROM trips
               WHERE (? IS NULL OR start_date >= ?)
                 AND (? IS NULL OR start_date <= ?)
               GROUP BY substr(created_at, 1, 7)
               ORDER BY month DESC LIMIT 12"#,
        )
        .bind(start_date)
        .bind(start_date)
        .bind(end_date)
        .bind(end_date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| MonthlyTrend {
                month: row.get("month"),
                trips: row.get("trips"),
                spend: row.get("spend"),
            })
            .collect())
    }

    /// Most requested destinations within the optional date window.
    pub async fn destination_breakdown(
        &self,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<Vec<DestinationStat>, AppError> {
        let rows = sqlx::query(
            r#"SELECT destination,
                      COUNT(*) AS count,
                      COALESCE(SUM(budget), 0.0) AS total_budget
               FROM trips
               WHERE (? IS NULL OR start_date >= ?)
                 AND (? IS NULL OR start_date <= ?)
               GROUP BY destination
               ORDER BY count DESC LIMIT 10"#,
        )
        .bind(start_date)
        .bind(start_date)
        .bind(end_date)
        .bind(end_date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| DestinationStat {
                destination: row.get("destination"),
                count: row.get("count"),
                total_budget: row.get("total_budget"),
            })
            .collect())
    }
}

/// Fleet-wide trip counters.
#[derive(Debug, Clone)]
pub struct KpiTripStats {
    pub total_trips: i64,
    pub approved_trips: i64,
    pub pending_trips: i64,
    pub rejected_trips: i64,
    pub cancelled_trips: i64,
    pub distinct_travelers: i64,
    pub destinations_count: i64,
    pub total_budget: f64,
}

/// Expense spend split by headline category.
#[derive(Debug, Clone)]
pub struct KpiExpenseStats {
    pub total_spend: f64,
    pub total_airfare: f64,
    pub total_hotels: f64,
    pub total_meals: f64,
}

/// One month of trip volume and spend.
#[derive(Debug, Clone)]
pub struct MonthlyTrend {
    pub month: String,
    pub trips: i64,
    pub spend: f64,
}

/// Request volume for one destination.
#[derive(Debug, Clone)]
pub struct DestinationStat {
    pub destination: String,
    pub count: i64,
    pub total_budget: f64,
}

const TRIP_COLUMNS: &str = "id, user_id, employee_name, destination, purpose, start_date, \
                            end_date, budget, urgency, accommodation, co2_kg, status, \
                            created_at, updated_at";

const EXPENSE_COLUMNS: &str = "id, user_id, title, amount, category, expense_date, \
                               receipt_path, status, notes, created_at, updated_at";

const RISK_COLUMNS: &str = "id, country, city, level, description, date, weather, updated_at";

// Helper functions for row conversion

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> User {
    let role: String = row.get("role");
    User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        // An unknown role tag falls back to the least-privileged role.
        role: Role::from_str(&role).unwrap_or(Role::Employee),
        created_at: row.get("created_at"),
    }
}

fn trip_from_row(row: &sqlx::sqlite::SqliteRow) -> Trip {
    let status: String = row.get("status");
    Trip {
        id: row.get("id"),
        user_id: row.get("user_id"),
        employee_name: row.get("employee_name"),
        destination: row.get("destination"),
        purpose: row.get("purpose"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        budget: row.get("budget"),
        urgency: row.get("urgency"),
        accommodation: row.get("accommodation"),
        co2_kg: row.get("co2_kg"),
        status: TripStatus::from_str(&status).unwrap_or(TripStatus::Pending),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn expense_from_row(row: &sqlx::sqlite::SqliteRow) -> Expense {
    let status: String = row.get("status");
    Expense {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        amount: row.get("amount"),
        category: row.get("category"),
        expense_date: row.get("expense_date"),
        receipt_path: row.get("receipt_path"),
        status: ExpenseStatus::from_str(&status).unwrap_or(ExpenseStatus::Pending),
        notes: row.get("notes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn risk_from_row(row: &sqlx::sqlite::SqliteRow) -> RiskRating {
    let level: String = row.get("level");
    let weather_json: Option<String> = row.get("weather");
    RiskRating {
        id: row.get("id"),
        country: row.get("country"),
        city: row.get("city"),
        level: RiskLevel::from_str(&level).unwrap_or(RiskLevel::Low),
        description: row.get("description"),
        date: row.get("date"),
        weather: weather_json.and_then(|s| serde_json::from_str(&s).ok()),
        updated_at: row.get("updated_at"),
    }
}

fn alert_from_row(row: &sqlx::sqlite::SqliteRow) -> Alert {
    let notified: i32 = row.get("notified");
    Alert {
        id: row.get("id"),
        trip_id: row.get("trip_id"),
        alert_type: row.get("alert_type"),
        message: row.get("message"),
        notified: notified != 0,
        created_at: row.get("created_at"),
    }
}

fn policy_from_row(row: &sqlx::sqlite::SqliteRow) -> Policy {
    let booking: String = row.get("booking_rules");
    let safety: String = row.get("safety_rules");
    let expense: String = row.get("expense_rules");
    Policy {
        id: row.get("id"),
        name: row.get("name"),
        booking_rules: serde_json::from_str(&booking).unwrap_or_default(),
        safety_rules: serde_json::from_str(&safety).unwrap_or_default(),
        expense_rules: serde_json::from_str(&expense).unwrap_or_default(),
        updated_at: row.get("updated_at"),
    }
}

fn esg_from_row(row: &sqlx::sqlite::SqliteRow) -> EsgRecord {
    EsgRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        score: row.get("score"),
        compliance_rate: row.get("compliance_rate"),
        co2_reduction: row.get("co2_reduction"),
        sustainability_index: row.get("sustainability_index"),
        year: row.get("year"),
        created_at: row.get("created_at"),
    }
}

fn schedule_item_from_row(row: &sqlx::sqlite::SqliteRow) -> ScheduleItem {
    ScheduleItem {
        id: row.get("id"),
        trip_id: row.get("trip_id"),
        date: row.get("date"),
        time: row.get("time"),
        item_type: row.get("item_type"),
        title: row.get("title"),
        details: row.get("details"),
        notes: row.get("notes"),
        status: row.get("status"),
    }
}

fn travel_card_from_row(row: &sqlx::sqlite::SqliteRow) -> TravelCard {
    TravelCard {
        id: row.get("id"),
        trip_id: row.get("trip_id"),
        card_type: row.get("card_type"),
        number: row.get("number"),
        expiry: row.get("expiry"),
        days_until_expiry: row.get("days_until_expiry"),
        status: row.get("status"),
    }
}

fn rules_json(rules: &Option<serde_json::Value>) -> String {
    rules
        .clone()
        .unwrap_or_else(|| serde_json::json!({}))
        .to_string()
}
