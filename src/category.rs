//! This file defines the `Category` type, its validation rules and the API
//! routes for listing, fetching, creating, updating and deleting categories.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    body::Bytes,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    database_id::DatabaseId,
    validation::{
        Check, FieldRules, Location, ValidationError, check_fields, check_id, parse_body,
        text_value, validation_failure,
    },
};

// ============================================================================
// MODELS
// ============================================================================

/// A named grouping for expenses, e.g. 'Groceries', 'Bills', 'Eating Out'.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// The ID of the category.
    pub id: DatabaseId,

    /// The name of the category, unique at creation time.
    pub name: String,

    /// When the store inserted the category.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the store last modified the category.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// The state needed by the category endpoints.
#[derive(Debug, Clone)]
pub struct CategoryEndpointState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CategoryEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

const CATEGORY_RULES: &[FieldRules] = &[FieldRules {
    param: "name",
    location: Location::Body,
    checks: &[(Check::NotEmpty, "Name cannot be empty")],
}];

/// Run the declarative name rules and extract the trimmed name.
///
/// The uniqueness pre-check is a separate store lookup run by the create
/// endpoint only.
fn validated_name(body: &Value) -> Result<String, Vec<ValidationError>> {
    let errors = check_fields(body, CATEGORY_RULES);

    match text_value(body.get("name")) {
        Some(name) if errors.is_empty() => Ok(name),
        _ => Err(errors),
    }
}

fn name_taken_error(name: &str) -> ValidationError {
    ValidationError {
        msg: "category name already taken".to_string(),
        param: "name",
        location: Location::Body,
        value: Some(Value::String(name.to_string())),
    }
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// A route handler for listing every category.
pub async fn get_all_categories_endpoint(State(state): State<CategoryEndpointState>) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match get_all_categories(&connection) {
        Ok(categories) => Json(categories).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for fetching one category by id.
pub async fn get_single_category_endpoint(
    Path(id): Path<String>,
    State(state): State<CategoryEndpointState>,
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

    match get_category(id, &connection) {
        Ok(category) => Json(category).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for creating a new category.
///
/// The name must pass the declarative rules and must not match any stored
/// category name exactly. Nothing is written once validation has failed.
pub async fn create_category_endpoint(
    State(state): State<CategoryEndpointState>,
    body: Bytes,
) -> Response {
    let body = parse_body(&body);

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let name = match validated_name(&body) {
        Ok(name) => name,
        Err(errors) => return validation_failure(errors),
    };

    match category_name_taken(&name, &connection) {
        Ok(true) => return validation_failure(vec![name_taken_error(&name)]),
        Ok(false) => {}
        Err(error) => return error.into_response(),
    }

    match create_category(&name, &connection) {
        Ok(category) => (StatusCode::CREATED, Json(category)).into_response(),
        Err(error) => error.into_response(),
    }
}

/// A route handler for updating a category by id.
///
/// Responds with the post-update document. The name rules are re-applied
/// but uniqueness is not re-checked on update.
pub async fn update_category_endpoint(
    Path(id): Path<String>,
    State(state): State<CategoryEndpointState>,
    body: Bytes,
) -> Response {
    let body = parse_body(&body);

    match (validated_name(&body), check_id(&id)) {
        (Ok(name), Ok(id)) => {
            let connection = match state.db_connection.lock() {
                Ok(connection) => connection,
                Err(error) => {
                    tracing::error!("could not acquire database lock: {error}");
                    return Error::DatabaseLockError.into_response();
                }
            };

            match update_category(id, &name, &connection) {
                Ok(category) => Json(category).into_response(),
                Err(error) => error.into_response(),
            }
        }
        (name, id) => {
            let mut errors = name.err().unwrap_or_default();
            errors.extend(id.err());
            validation_failure(errors)
        }
    }
}

/// A route handler for deleting a category by id.
///
/// Responds with the deleted document.
pub async fn delete_category_endpoint(
    Path(id): Path<String>,
    State(state): State<CategoryEndpointState>,
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

    match delete_category(id, &connection) {
        Ok(category) => Json(category).into_response(),
        Err(error) => error.into_response(),
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create a category in the database.
///
/// The store assigns the id and both timestamps.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn create_category(name: &str, connection: &Connection) -> Result<Category, Error> {
    let now = OffsetDateTime::now_utc();

    let category = connection
        .prepare(
            "INSERT INTO category (name, created_at, updated_at) VALUES (?1, ?2, ?3)
             RETURNING id, name, created_at, updated_at",
        )?
        .query_row((name, now, now), map_category_row)?;

    Ok(category)
}

/// Retrieve the category with `id` from the database.
///
/// # Errors
/// This function will return [Error::NotFound] if `id` does not refer to a
/// category, or [Error::SqlError] if there is some other SQL error.
pub fn get_category(id: DatabaseId, connection: &Connection) -> Result<Category, Error> {
    connection
        .prepare("SELECT id, name, created_at, updated_at FROM category WHERE id = :id")?
        .query_row(&[(":id", &id)], map_category_row)
        .map_err(|error| error.into())
}

/// Retrieve every category in the database in insertion order.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_all_categories(connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare("SELECT id, name, created_at, updated_at FROM category ORDER BY id ASC")?
        .query_map([], map_category_row)?
        .map(|maybe_category| maybe_category.map_err(Error::from))
        .collect()
}

/// Replace the name of the category with `id` and refresh its `updated_at`
/// timestamp, returning the post-update row.
///
/// # Errors
/// This function will return [Error::NotFound] if `id` does not refer to a
/// category, or [Error::SqlError] if there is some other SQL error.
pub fn update_category(
    id: DatabaseId,
    name: &str,
    connection: &Connection,
) -> Result<Category, Error> {
    let now = OffsetDateTime::now_utc();

    connection
        .prepare(
            "UPDATE category SET name = ?1, updated_at = ?2 WHERE id = ?3
             RETURNING id, name, created_at, updated_at",
        )?
        .query_row((name, now, id), map_category_row)
        .map_err(|error| error.into())
}

/// Delete the category with `id` from the database, returning the deleted row.
///
/// # Errors
/// This function will return [Error::NotFound] if `id` does not refer to a
/// category, or [Error::SqlError] if there is some other SQL error.
pub fn delete_category(id: DatabaseId, connection: &Connection) -> Result<Category, Error> {
    connection
        .prepare(
            "DELETE FROM category WHERE id = :id
             RETURNING id, name, created_at, updated_at",
        )?
        .query_row(&[(":id", &id)], map_category_row)
        .map_err(|error| error.into())
}

/// Report whether a category with exactly `name` is already stored.
///
/// The comparison is case-sensitive. This pre-check and the insert are not
/// atomic; concurrent creates of the same name can both pass it.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn category_name_taken(name: &str, connection: &Connection) -> Result<bool, Error> {
    let count: i64 = connection
        .prepare("SELECT COUNT(id) FROM category WHERE name = :name")?
        .query_row(&[(":name", &name)], |row| row.get(0))?;

    Ok(count > 0)
}

/// Create the category table in the database.
///
/// The name column carries no UNIQUE constraint: uniqueness is a
/// validation-time pre-check only.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_category_name ON category(name);",
    )?;

    Ok(())
}

fn map_category_row(row: &Row) -> Result<Category, rusqlite::Error> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod category_query_tests {
    use rusqlite::Connection;

    use crate::{Error, db::initialize};

    use super::{
        category_name_taken, create_category, delete_category, get_all_categories, get_category,
        update_category,
    };

    fn get_test_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not create tables");
        connection
    }

    #[test]
    fn create_category_succeeds() {
        let connection = get_test_db_connection();

        let category =
            create_category("Groceries", &connection).expect("Could not create category");

        assert!(category.id > 0);
        assert_eq!(category.name, "Groceries");
        assert_eq!(category.created_at, category.updated_at);
    }

    #[test]
    fn get_category_round_trips() {
        let connection = get_test_db_connection();
        let inserted = create_category("Foo", &connection).expect("Could not create category");

        let selected = get_category(inserted.id, &connection);

        assert_eq!(Ok(inserted), selected);
    }

    #[test]
    fn get_category_with_unknown_id_returns_not_found() {
        let connection = get_test_db_connection();
        let inserted = create_category("Foo", &connection).expect("Could not create category");

        let selected = get_category(inserted.id + 123, &connection);

        assert_eq!(selected, Err(Error::NotFound));
    }

    #[test]
    fn get_all_categories_returns_insertion_order() {
        let connection = get_test_db_connection();
        let first = create_category("Zebra", &connection).expect("Could not create category");
        let second = create_category("Apple", &connection).expect("Could not create category");

        let categories = get_all_categories(&connection).expect("Could not list categories");

        assert_eq!(categories, vec![first, second]);
    }

    #[test]
    fn update_category_returns_post_update_row() {
        let connection = get_test_db_connection();
        let category = create_category("Original", &connection).expect("Could not create category");

        let updated =
            update_category(category.id, "Updated", &connection).expect("Could not update");

        assert_eq!(updated.id, category.id);
        assert_eq!(updated.name, "Updated");
        assert_eq!(updated.created_at, category.created_at);
        assert!(updated.updated_at >= category.updated_at);
    }

    #[test]
    fn update_category_with_unknown_id_returns_not_found() {
        let connection = get_test_db_connection();

        let result = update_category(999999, "Updated", &connection);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn delete_category_returns_the_deleted_row() {
        let connection = get_test_db_connection();
        let category = create_category("ToDelete", &connection).expect("Could not create category");

        let deleted = delete_category(category.id, &connection).expect("Could not delete");

        assert_eq!(deleted, category);
        assert_eq!(get_category(category.id, &connection), Err(Error::NotFound));
    }

    #[test]
    fn delete_category_with_unknown_id_returns_not_found() {
        let connection = get_test_db_connection();

        let result = delete_category(999999, &connection);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn category_name_taken_is_case_sensitive() {
        let connection = get_test_db_connection();
        create_category("Bills", &connection).expect("Could not create category");

        assert_eq!(category_name_taken("Bills", &connection), Ok(true));
        assert_eq!(category_name_taken("bills", &connection), Ok(false));
        assert_eq!(category_name_taken("Rent", &connection), Ok(false));
    }
}
