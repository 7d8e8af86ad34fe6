/**
 * API Routes
 *
 * Everything under `/api/v1`.
 *
 * # Routes
 *
 * ## Authentication (public)
 * - `POST /auth/login`
 * - `POST /auth/validate-token`
 * - `POST /auth/reset-password`
 *
 * ## Authentication (token version checked, idle timeout not)
 * - `POST /auth/heartbeat`
 *
 * ## Inventory (full session check)
 * - `GET|POST /products`
 * - `GET|PUT /products/{id}`
 * - `GET /products/{id}/transactions`
 * - `GET|POST /transactions`
 * - `GET /transactions/{id}`
 * - `GET /finance/stats?range=7d|1m|3m|6m|12m`
 * - `GET /dashboard/stats`
 * - `GET /dashboard/stock-movement?days=N`
 *
 * ## Shifts (full session check)
 * - `GET|POST /shifts`
 * - `GET|PUT|DELETE /shifts/{id}`
 * - `GET /shifts/user/{user_id}`
 *
 * ## Users (full session check)
 * - `GET|POST /users`
 * - `GET|PUT|DELETE /users/{id}`
 * - `PUT /users/{id}/privileges`
 *
 * Privileges are checked inside each handler.
 */

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};

use crate::backend::auth::{heartbeat, login, reset_password, validate_token};
use crate::backend::inventory::handlers as inventory;
use crate::backend::middleware::{require_auth, require_session_version};
use crate::backend::server::state::AppState;
use crate::backend::shifts::handlers as shifts;
use crate::backend::users::handlers as users;

/// Build the `/api/v1` router
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(auth_routes(state))
        .merge(protected_routes(state))
}

fn auth_routes(state: &AppState) -> Router<AppState> {
    let heartbeat_route = Router::new()
        .route("/auth/heartbeat", post(heartbeat))
        .route_layer(from_fn_with_state(state.clone(), require_session_version));

    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/validate-token", post(validate_token))
        .route("/auth/reset-password", post(reset_password))
        .merge(heartbeat_route)
}

fn protected_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/products",
            get(inventory::list_products).post(inventory::create_product),
        )
        .route(
            "/products/{id}",
            get(inventory::get_product).put(inventory::update_product),
        )
        .route("/products/{id}/transactions", get(inventory::product_history))
        .route(
            "/transactions",
            get(inventory::list_transactions).post(inventory::create_transaction),
        )
        .route("/transactions/{id}", get(inventory::get_transaction))
        .route("/finance/stats", get(inventory::financial_stats))
        .route("/dashboard/stats", get(inventory::dashboard_stats))
        .route("/dashboard/stock-movement", get(inventory::stock_movement))
        .route("/shifts", get(shifts::list_shifts).post(shifts::create_shift))
        .route(
            "/shifts/{id}",
            get(shifts::get_shift)
                .put(shifts::update_shift)
                .delete(shifts::delete_shift),
        )
        .route("/shifts/user/{user_id}", get(shifts::shifts_by_user))
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/users/{id}/privileges", put(users::update_privileges))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
}
