//! This file defines the `Expense` type, its validation rules and the API
//! routes for listing, fetching, creating, updating and deleting expenses.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    body::Bytes,
    extract::{FromRef, Path, State},
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Date, OffsetDateTime};

use crate::{
    AppState, Error,
    database_id::DatabaseId,
    validation::{
        Check, FieldRules, Location, ValidationError, check_fields, check_id, date_value,
        numeric_value, parse_body, validation_failure,
    },
};

time::serde::format_description!(expense_date_format, Date, "[year]-[month]-[day]");

// ============================================================================
// MODELS
// ============================================================================

/// A single spending event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    /// The ID of the expense.
    pub id: DatabaseId,

    /// The calendar date the money was spent. Never later than the day the
    /// expense was recorded.
    #[serde(with = "expense_date_format")]
    pub expense_date: Date,

    /// The amount of money spent. Always greater than zero.
    pub amount: f64,

    /// Free text describing what the expense was for.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,

    /// When the store inserted the expense.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the store last modified the expense.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// The user-supplied fields of an expense, after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseInput {
    /// The calendar date the money was spent.
    pub expense_date: Date,
    /// The amount of money spent.
    pub amount: f64,
    /// Free text describing what the expense was for.
    pub description: Option<String>,
}

/// The state needed by the expense endpoints.
#[derive(Debug, Clone)]
pub struct ExpenseEndpointState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ExpenseEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

const EXPENSE_RULES: &[FieldRules] = &[
    FieldRules {
        param: "expenseDate",
        location: Location::Body,
        checks: &[
            (Check::Exists, "expense date is required"),
            (Check::NotEmpty, "expense date cannot be empty"),
            (Check::IsDate, "expense date is not valid"),
            (
                Check::NotAfterToday,
                "expense date cannot be later than today",
            ),
        ],
    },
    FieldRules {
        param: "amount",
        location: Location::Body,
        checks: &[
            (Check::Exists, "expense amount is required"),
            (Check::NotEmpty, "amount should not be empty"),
            (Check::IsNumeric, "amount should be a number"),
            (Check::GreaterThanZero, "amount should be greater than zero"),
        ],
    },
];

/// Run the declarative expense rules and extract the typed fields.
///
/// `description` carries no rules; a JSON null is treated as absent.
fn validated_expense(body: &Value) -> Result<ExpenseInput, Vec<ValidationError>> {
    let errors = check_fields(body, EXPENSE_RULES);

    let expense_date = date_value(body.get("expenseDate"));
    let amount = numeric_value(body.get("amount"));

    match (expense_date, amount) {
        (Some(expense_date), Some(amount)) if errors.is_empty() => Ok(ExpenseInput {
            expense_date,
            amount,
            description: body
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
        }),
        _ => Err(errors),
    }
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// A route handler for listing every expense.
pub async fn get_all_expenses_endpoint(State(state): State<ExpenseEndpointState>) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match get_all_expenses(&connection) {
        Ok(expenses) => Json(expenses).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for fetching one expense by id.
pub async fn get_single_expense_endpoint(
    Path(id): Path<String>,
    State(state): State<ExpenseEndpointState>,
) -> Response {
    let id = match check_id(&id) {
        Ok(id) => id,
        Err(error) => return validation_failure(vec![error]),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match get_expense(id, &connection) {
        Ok(expense) => Json(expense).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for creating a new expense.
///
/// Responds 200 with the created document. The insert is never attempted
/// once validation has failed.
pub async fn create_expense_endpoint(
    State(state): State<ExpenseEndpointState>,
    body: Bytes,
) -> Response {
    let body = parse_body(&body);

    let input = match validated_expense(&body) {
        Ok(input) => input,
        Err(errors) => return validation_failure(errors),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match create_expense(&input, &connection) {
        Ok(expense) => Json(expense).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for updating an expense by id.
///
/// Responds with the post-update document.
pub async fn update_expense_endpoint(
    Path(id): Path<String>,
    State(state): State<ExpenseEndpointState>,
    body: Bytes,
) -> Response {
    let body = parse_body(&body);

    match (validated_expense(&body), check_id(&id)) {
        (Ok(input), Ok(id)) => {
            let connection = match state.db_connection.lock() {
                Ok(connection) => connection,
                Err(error) => {
                    tracing::error!("could not acquire database lock: {error}");
                    return Error::DatabaseLockError.into_response();
                }
            };

            match update_expense(id, &input, &connection) {
                Ok(expense) => Json(expense).into_response(),
                Err(error) => error.into_response(),
            }
        }
        (input, id) => {
            let mut errors = input.err().unwrap_or_default();
            errors.extend(id.err());
            validation_failure(errors)
        }
    }
}

/// A route handler for deleting an expense by id.
///
/// Responds with the deleted document.
pub async fn delete_expense_endpoint(
    Path(id): Path<String>,
    State(state): State<ExpenseEndpointState>,
) -> Response {
    let id = match check_id(&id) {
        Ok(id) => id,
        Err(error) => return validation_failure(vec![error]),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match delete_expense(id, &connection) {
        Ok(expense) => Json(expense).into_response(),
        Err(error) => error.into_response(),
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create an expense in the database.
///
/// The store assigns the id and both timestamps.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn create_expense(input: &ExpenseInput, connection: &Connection) -> Result<Expense, Error> {
    let now = OffsetDateTime::now_utc();

    let expense = connection
        .prepare(
            "INSERT INTO expense (expense_date, amount, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id, expense_date, amount, description, created_at, updated_at",
        )?
        .query_row(
            (
                input.expense_date,
                input.amount,
                input.description.as_deref(),
                now,
                now,
            ),
            map_expense_row,
        )?;

    Ok(expense)
}

/// Retrieve the expense with `id` from the database.
///
/// # Errors
/// This function will return [Error::NotFound] if `id` does not refer to an
/// expense, or [Error::SqlError] if there is some other SQL error.
pub fn get_expense(id: DatabaseId, connection: &Connection) -> Result<Expense, Error> {
    connection
        .prepare(
            "SELECT id, expense_date, amount, description, created_at, updated_at
             FROM expense WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], map_expense_row)
        .map_err(|error| error.into())
}

/// Retrieve every expense in the database in insertion order.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_all_expenses(connection: &Connection) -> Result<Vec<Expense>, Error> {
    connection
        .prepare(
            "SELECT id, expense_date, amount, description, created_at, updated_at
             FROM expense ORDER BY id ASC",
        )?
        .query_map([], map_expense_row)?
        .map(|maybe_expense| maybe_expense.map_err(Error::from))
        .collect()
}

/// Replace the user-supplied fields of the expense with `id` and refresh its
/// `updated_at` timestamp, returning the post-update row.
///
/// # Errors
/// This function will return [Error::NotFound] if `id` does not refer to an
/// expense, or [Error::SqlError] if there is some other SQL error.
pub fn update_expense(
    id: DatabaseId,
    input: &ExpenseInput,
    connection: &Connection,
) -> Result<Expense, Error> {
    let now = OffsetDateTime::now_utc();

    connection
        .prepare(
            "UPDATE expense SET expense_date = ?1, amount = ?2, description = ?3, updated_at = ?4
             WHERE id = ?5
             RETURNING id, expense_date, amount, description, created_at, updated_at",
        )?
        .query_row(
            (
                input.expense_date,
                input.amount,
                input.description.as_deref(),
                now,
                id,
            ),
            map_expense_row,
        )
        .map_err(|error| error.into())
}

/// Delete the expense with `id` from the database, returning the deleted row.
///
/// # Errors
/// This function will return [Error::NotFound] if `id` does not refer to an
/// expense, or [Error::SqlError] if there is some other SQL error.
pub fn delete_expense(id: DatabaseId, connection: &Connection) -> Result<Expense, Error> {
    connection
        .prepare(
            "DELETE FROM expense WHERE id = :id
             RETURNING id, expense_date, amount, description, created_at, updated_at",
        )?
        .query_row(&[(":id", &id)], map_expense_row)
        .map_err(|error| error.into())
}

/// Create the expense table in the database.
pub fn create_expense_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS expense (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            expense_date TEXT NOT NULL,
            amount REAL NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );",
    )?;

    Ok(())
}

fn map_expense_row(row: &Row) -> Result<Expense, rusqlite::Error> {
    Ok(Expense {
        id: row.get(0)?,
        expense_date: row.get(1)?,
        amount: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
