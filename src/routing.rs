//! Application router configuration.

use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::{
    AppState,
    category::{
        create_category_endpoint, delete_category_endpoint, get_all_categories_endpoint,
        get_single_category_endpoint, update_category_endpoint,
    },
    endpoints,
    expense::{
        create_expense_endpoint, delete_expense_endpoint, get_all_expenses_endpoint,
        get_single_expense_endpoint, update_expense_endpoint,
    },
    logging::logging_middleware,
};

/// Return a router with all the app's routes.
///
/// Every route accepts requests from any origin.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::ALL_CATEGORIES, get(get_all_categories_endpoint))
        .route(
            endpoints::SINGLE_CATEGORY,
            get(get_single_category_endpoint),
        )
        .route(endpoints::CREATE_CATEGORY, post(create_category_endpoint))
        .route(endpoints::UPDATE_CATEGORY, put(update_category_endpoint))
        .route(
            endpoints::DELETE_CATEGORY,
            delete(delete_category_endpoint),
        )
        .route(endpoints::ALL_EXPENSES, get(get_all_expenses_endpoint))
        .route(endpoints::SINGLE_EXPENSE, get(get_single_expense_endpoint))
        .route(endpoints::CREATE_EXPENSE, post(create_expense_endpoint))
        .route(endpoints::UPDATE_EXPENSE, put(update_expense_endpoint))
        .route(endpoints::DELETE_EXPENSE, delete(delete_expense_endpoint))
        .fallback(get_404_not_found)
        .layer(middleware::from_fn(logging_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Respond with an empty JSON object for unknown routes.
async fn get_404_not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({}))).into_response()
}

#[cfg(test)]
mod router_tests {
    use axum::http::{HeaderValue, StatusCode, header};
    use axum_test::TestServer;
    use serde_json::{Value, json};

    use crate::{AppState, build_router, endpoints};

    fn get_test_server() -> TestServer {
        let connection = rusqlite::Connection::open_in_memory()
            .expect("Could not open in-memory SQLite database");
        let state = AppState::new(connection).expect("Could not initialize the database");

        TestServer::try_new(build_router(state)).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn unknown_route_responds_with_empty_404() {
        let server = get_test_server();

        let response = server.get("/no-such-route").await;

        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>(), json!({}));
    }

    #[tokio::test]
    async fn responses_allow_any_origin() {
        let server = get_test_server();

        let response = server
            .get(endpoints::ALL_CATEGORIES)
            .add_header(header::ORIGIN, HeaderValue::from_static("https://example.com"))
            .await;

        response.assert_status(StatusCode::OK);
        assert_eq!(
            response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            "*"
        );
    }
}
