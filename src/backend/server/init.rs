/**
 * Server Initialization
 *
 * Builds the service graph and the router.
 *
 * # Initialization Process
 *
 * 1. Load the database (Postgres when configured, in-memory otherwise)
 * 2. Spawn the connection hub
 * 3. Build the session, ledger and scheduler services over the stores
 * 4. Seed a default administrator into an empty user table
 * 5. Create the router
 *
 * Tests skip step 1 through [`create_app_with_stores`], passing whichever
 * store implementations they need.
 */

use std::sync::Arc;

use axum::Router;
use chrono::Utc;

use crate::backend::auth::sessions::{hash_password, SessionService};
use crate::backend::error::BackendError;
use crate::backend::inventory::StockLedger;
use crate::backend::realtime::HubHandle;
use crate::backend::routes::router::create_router;
use crate::backend::server::config::load_database;
use crate::backend::server::state::AppState;
use crate::backend::shifts::ShiftScheduler;
use crate::backend::store::{MemoryStore, PgStore, ProductStore, ShiftStore, UserStore};
use crate::backend::users::UserService;
use crate::shared::models::{privileges, NewUser};
use crate::shared::AppConfig;

pub const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
const DEFAULT_ADMIN_ROLE: &str = "MASTER_ADMIN";

/// The configured router plus the state behind it
pub struct App {
    pub router: Router<()>,
    pub state: AppState,
}

/// Create the application from configuration
///
/// # Errors
///
/// Fails when a configured database cannot be reached or migrated, or when
/// seeding the default administrator fails.
pub async fn create_app(config: AppConfig) -> Result<App, BackendError> {
    tracing::info!("Initializing inventory backend server");

    match load_database(&config).await? {
        Some(pool) => {
            let store = Arc::new(PgStore::new(pool));
            create_app_with_stores(config, store.clone(), store.clone(), store).await
        }
        None => {
            let store = Arc::new(MemoryStore::new());
            create_app_with_stores(config, store.clone(), store.clone(), store).await
        }
    }
}

/// Create the application over explicit stores
pub async fn create_app_with_stores(
    config: AppConfig,
    products: Arc<dyn ProductStore>,
    shifts: Arc<dyn ShiftStore>,
    users: Arc<dyn UserStore>,
) -> Result<App, BackendError> {
    if config.uses_dev_secret() {
        tracing::warn!("[Auth] JWT_SECRET not set. Using the development secret; do not run this in production.");
    }

    let hub = HubHandle::spawn(config.hub_queue_capacity, config.connection_buffer);
    tracing::info!("[Hub] Connection hub started");

    seed_admin(users.as_ref()).await?;

    let sessions = SessionService::from_config(users.clone(), &config, hub.clone());
    let ledger = StockLedger::new(products, hub.clone(), config.utc_offset_minutes);
    let scheduler = ShiftScheduler::new(shifts, users.clone(), hub.clone(), config.utc_offset_minutes);
    let users = UserService::new(users);

    let state = AppState {
        config: Arc::new(config),
        hub,
        sessions,
        ledger,
        scheduler,
        users,
    };
    let router = create_router(state.clone());
    tracing::info!("Router configured");

    Ok(App { router, state })
}

/// Insert the default administrator when no user exists yet
///
/// The password comes from `ADMIN_PASSWORD` when set.
async fn seed_admin(users: &dyn UserStore) -> Result<(), BackendError> {
    if users.count_users().await? > 0 {
        return Ok(());
    }

    let password = std::env::var("ADMIN_PASSWORD")
        .ok()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string());

    let admin = NewUser {
        email: DEFAULT_ADMIN_EMAIL.to_string(),
        password_hash: hash_password(&password)?,
        full_name: "Administrator".to_string(),
        role_code: Some(DEFAULT_ADMIN_ROLE.to_string()),
        is_active: true,
        privileges: privileges::ALL.iter().map(|p| p.to_string()).collect(),
    };
    users.insert_user(admin, Utc::now()).await?;

    tracing::warn!(
        "[Auth] Seeded default administrator {}. Change its password after first login.",
        DEFAULT_ADMIN_EMAIL
    );
    Ok(())
}
