/**
 * Application State Management
 *
 * `AppState` is the router's state container. It holds one instance of each
 * service; every service is cheap to clone (an `Arc` or a channel handle
 * inside), so cloning the state per request costs nothing.
 *
 * # State Extraction
 *
 * `FromRef` implementations let handlers extract just the service they use,
 * e.g. `State<StockLedger>`, following Axum's recommended pattern.
 *
 * # Example
 *
 * ```rust,ignore
 * use axum::extract::State;
 * use inventory_ws::backend::inventory::StockLedger;
 *
 * async fn handler(State(ledger): State<StockLedger>) {
 *     let products = ledger.list_products().await;
 * }
 * ```
 */

use std::sync::Arc;

use axum::extract::FromRef;

use crate::backend::auth::sessions::SessionService;
use crate::backend::inventory::StockLedger;
use crate::backend::realtime::HubHandle;
use crate::backend::shifts::ShiftScheduler;
use crate::backend::users::UserService;
use crate::shared::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub hub: HubHandle,
    pub sessions: SessionService,
    pub ledger: StockLedger,
    pub scheduler: ShiftScheduler,
    pub users: UserService,
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for HubHandle {
    fn from_ref(state: &AppState) -> Self {
        state.hub.clone()
    }
}

impl FromRef<AppState> for SessionService {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl FromRef<AppState> for StockLedger {
    fn from_ref(state: &AppState) -> Self {
        state.ledger.clone()
    }
}

impl FromRef<AppState> for ShiftScheduler {
    fn from_ref(state: &AppState) -> Self {
        state.scheduler.clone()
    }
}

impl FromRef<AppState> for UserService {
    fn from_ref(state: &AppState) -> Self {
        state.users.clone()
    }
}
