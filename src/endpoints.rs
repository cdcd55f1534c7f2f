//! The API endpoints URIs.
//!
//! For endpoints that take an id parameter, e.g. '/single-category/{id}',
//! use [format_endpoint].

use crate::database_id::DatabaseId;

/// The route listing every category.
pub const ALL_CATEGORIES: &str = "/all-categories";
/// The route fetching one category by id.
pub const SINGLE_CATEGORY: &str = "/single-category/{id}";
/// The route creating a category.
pub const CREATE_CATEGORY: &str = "/create-category";
/// The route updating a category by id.
pub const UPDATE_CATEGORY: &str = "/update-category/{id}";
/// The route deleting a category by id.
pub const DELETE_CATEGORY: &str = "/delete-category/{id}";

/// The route listing every expense.
pub const ALL_EXPENSES: &str = "/all-expenses";
/// The route fetching one expense by id.
pub const SINGLE_EXPENSE: &str = "/single-expense/{id}";
/// The route creating an expense.
pub const CREATE_EXPENSE: &str = "/create-expense";
/// The route updating an expense by id.
pub const UPDATE_EXPENSE: &str = "/update-expense/{id}";
/// The route deleting an expense by id.
pub const DELETE_EXPENSE: &str = "/delete-expense/{id}";

/// Replace the `{id}` parameter in `endpoint_path` with `id`.
///
/// If `endpoint_path` contains no parameter, it is returned unchanged.
pub fn format_endpoint(endpoint_path: &str, id: DatabaseId) -> String {
    match (endpoint_path.find('{'), endpoint_path.find('}')) {
        (Some(start), Some(end)) if start < end => {
            format!("{}{}{}", &endpoint_path[..start], id, &endpoint_path[end + 1..])
        }
        _ => endpoint_path.to_string(),
    }
}
