/**
 * Inventory Handlers
 *
 * HTTP surface of the stock ledger. Every route sits behind `require_auth`;
 * write and ledger-read routes additionally check a privilege.
 *
 * - GET  /products
 * - POST /products                    (product:create)
 * - GET  /products/{id}
 * - PUT  /products/{id}               (product:update)
 * - GET  /products/{id}/transactions  (transaction:view)
 * - GET  /transactions                (transaction:view)
 * - POST /transactions                (transaction:create)
 * - GET  /transactions/{id}           (transaction:view)
 * - GET  /finance/stats?range=7d|1m|3m|6m|12m (transaction:view)
 * - GET  /dashboard/stats
 * - GET  /dashboard/stock-movement?days=N
 */

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

use super::ledger::StockLedger;
use crate::backend::error::BackendError;
use crate::backend::middleware::AuthUser;
use crate::backend::response::{parse_id, DataResponse};
use crate::shared::models::{
    privileges, FinancialStats, InventoryOverview, LedgerEntry, NewProduct, Product, ProductChanges, StatsRange,
    StockMovement, TransactionRequest,
};

pub async fn list_products(
    State(ledger): State<StockLedger>,
    AuthUser(_user): AuthUser,
) -> Result<Json<Vec<Product>>, BackendError> {
    Ok(Json(ledger.list_products().await?))
}

pub async fn get_product(
    State(ledger): State<StockLedger>,
    AuthUser(_user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Product>, BackendError> {
    let id = parse_id(&id, "product_id")?;
    Ok(Json(ledger.get_product(id).await?))
}

pub async fn create_product(
    State(ledger): State<StockLedger>,
    AuthUser(user): AuthUser,
    Json(input): Json<NewProduct>,
) -> Result<(StatusCode, Json<DataResponse<Product>>), BackendError> {
    user.require_privilege(privileges::PRODUCT_CREATE)?;
    let product = ledger.create_product(input, &user.actor()).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new("Product created", product))))
}

pub async fn update_product(
    State(ledger): State<StockLedger>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(changes): Json<ProductChanges>,
) -> Result<Json<DataResponse<Product>>, BackendError> {
    user.require_privilege(privileges::PRODUCT_UPDATE)?;
    let id = parse_id(&id, "product_id")?;
    let product = ledger.update_product(id, changes, &user.actor()).await?;
    Ok(Json(DataResponse::new("Product updated", product)))
}

pub async fn product_history(
    State(ledger): State<StockLedger>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<LedgerEntry>>, BackendError> {
    user.require_privilege(privileges::TRANSACTION_VIEW)?;
    let id = parse_id(&id, "product_id")?;
    Ok(Json(ledger.product_history(id).await?))
}

pub async fn list_transactions(
    State(ledger): State<StockLedger>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<LedgerEntry>>, BackendError> {
    user.require_privilege(privileges::TRANSACTION_VIEW)?;
    Ok(Json(ledger.list_transactions().await?))
}

pub async fn create_transaction(
    State(ledger): State<StockLedger>,
    AuthUser(user): AuthUser,
    Json(request): Json<TransactionRequest>,
) -> Result<(StatusCode, Json<DataResponse<LedgerEntry>>), BackendError> {
    user.require_privilege(privileges::TRANSACTION_CREATE)?;
    let entry = ledger.record_transaction(request, &user.actor()).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new("Transaction recorded", entry))))
}

pub async fn get_transaction(
    State(ledger): State<StockLedger>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<LedgerEntry>, BackendError> {
    user.require_privilege(privileges::TRANSACTION_VIEW)?;
    let id = parse_id(&id, "transaction_id")?;
    Ok(Json(ledger.get_transaction(id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    #[serde(default)]
    pub range: String,
}

pub async fn financial_stats(
    State(ledger): State<StockLedger>,
    AuthUser(user): AuthUser,
    Query(query): Query<StatsQuery>,
) -> Result<Json<FinancialStats>, BackendError> {
    user.require_privilege(privileges::TRANSACTION_VIEW)?;
    let range: StatsRange = query.range.trim().parse()?;
    Ok(Json(ledger.financial_stats(range).await?))
}

pub async fn dashboard_stats(
    State(ledger): State<StockLedger>,
    AuthUser(_user): AuthUser,
) -> Result<Json<InventoryOverview>, BackendError> {
    Ok(Json(ledger.inventory_overview().await?))
}

const DEFAULT_MOVEMENT_DAYS: u32 = 7;

#[derive(Debug, Default, Deserialize)]
pub struct MovementQuery {
    #[serde(default)]
    pub days: String,
}

impl MovementQuery {
    /// Missing, unparsable and non-positive values fall back to a week
    fn days(&self) -> u32 {
        self.days
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|days| *days > 0)
            .unwrap_or(DEFAULT_MOVEMENT_DAYS)
    }
}

pub async fn stock_movement(
    State(ledger): State<StockLedger>,
    AuthUser(_user): AuthUser,
    Query(query): Query<MovementQuery>,
) -> Result<Json<StockMovement>, BackendError> {
    Ok(Json(ledger.stock_movement(query.days()).await?))
}
