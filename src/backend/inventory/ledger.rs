/**
 * Stock Ledger
 *
 * The only path that changes a product's stock. Every stock write happens
 * inside a [`UnitOfWork`] holding the product's exclusive lock, so two
 * writers on the same product run one after the other while different
 * products proceed in parallel. A transaction writes the new stock and its
 * ledger entry in the same unit: both become visible on commit or neither
 * does.
 *
 * Notifications go to the hub only after the commit succeeded. Their
 * delivery never affects the outcome of the operation.
 */

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use crate::backend::error::BackendError;
use crate::backend::realtime::HubHandle;
use crate::backend::store::{ProductStore, StoreError};
use crate::shared::event::{ActorInfo, ProductSnapshot, StockAction, StockUpdate, TransactionSnapshot};
use crate::shared::models::{
    DailyMovement, FinancialStats, InventoryOverview, LedgerEntry, NewProduct, PaymentMethod, Product, ProductChanges,
    StatsRange, StockMovement, TransactionRequest, TransactionType,
};
use crate::shared::schedule::{local_date, local_offset, DATE_FORMAT};
use crate::shared::RealtimeEvent;

pub const LOW_STOCK_THRESHOLD: i32 = 10;

#[derive(Clone)]
pub struct StockLedger {
    products: Arc<dyn ProductStore>,
    hub: HubHandle,
    utc_offset_minutes: i32,
}

impl StockLedger {
    pub fn new(products: Arc<dyn ProductStore>, hub: HubHandle, utc_offset_minutes: i32) -> Self {
        Self {
            products,
            hub,
            utc_offset_minutes,
        }
    }

    /// Create a product. Its initial stock is the opening balance the ledger
    /// is replayed from.
    pub async fn create_product(&self, input: NewProduct, actor: &ActorInfo) -> Result<Product, BackendError> {
        input.validate()?;
        let sku = input.sku.trim().to_string();

        if self.products.find_product_by_sku(&sku).await?.is_some() {
            tracing::warn!("[Ledger] Rejected duplicate SKU {}", sku);
            return Err(BackendError::DuplicateSku { sku });
        }

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            sku,
            name: input.name.trim().to_string(),
            unit: input.unit.trim().to_string(),
            stock: input.stock,
            price: input.price,
            created_by: Some(actor.id),
            updated_by: Some(actor.id),
            created_at: now,
            updated_at: now,
        };

        match self.products.insert_product(&product).await {
            Ok(()) => {}
            // lost a race against a concurrent create with the same SKU
            Err(StoreError::UniqueViolation(_)) => {
                return Err(BackendError::DuplicateSku { sku: product.sku });
            }
            Err(err) => return Err(err.into()),
        }

        tracing::info!("[Ledger] Product {} ({}) created by {}", product.id, product.sku, actor.id);
        self.notify(StockUpdate {
            action: StockAction::ProductCreated,
            product: Some(ProductSnapshot::created(&product)),
            transaction: None,
            user: actor.clone(),
            message: format!("{} created product '{}'", actor.name, product.name),
        });
        Ok(product)
    }

    /// Record an IN or OUT movement and adjust stock atomically
    pub async fn record_transaction(
        &self,
        request: TransactionRequest,
        actor: &ActorInfo,
    ) -> Result<LedgerEntry, BackendError> {
        let kind: TransactionType = request.kind.trim().parse()?;
        if request.quantity <= 0 {
            return Err(BackendError::validation("quantity", "must be greater than zero"));
        }
        let payment_method: PaymentMethod = request.payment_method.trim().parse()?;

        let mut unit = self.products.begin().await?;
        let mut product = unit
            .lock_product(request.product_id)
            .await?
            .ok_or_else(|| BackendError::not_found("product"))?;

        let total_amount = product
            .price
            .checked_mul(i64::from(request.quantity))
            .ok_or_else(|| BackendError::validation("quantity", "total amount is too large"))?;

        let new_stock = match kind {
            TransactionType::In => product
                .stock
                .checked_add(request.quantity)
                .ok_or_else(|| BackendError::validation("quantity", "stock would overflow"))?,
            TransactionType::Out if request.quantity > product.stock => {
                tracing::warn!(
                    "[Ledger] Insufficient stock for {}: requested {}, available {}",
                    product.id,
                    request.quantity,
                    product.stock
                );
                return Err(BackendError::InsufficientStock {
                    requested: request.quantity,
                    available: product.stock,
                });
            }
            TransactionType::Out => product.stock - request.quantity,
        };

        let now = Utc::now();
        product.stock = new_stock;
        product.updated_by = Some(actor.id);
        product.updated_at = now;

        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            product_id: product.id,
            kind,
            quantity: request.quantity,
            total_amount,
            payment_method,
            note: request.note.trim().to_string(),
            created_by: actor.id,
            created_at: now,
        };

        unit.write_product(&product).await?;
        unit.append_entry(&entry).await?;
        unit.commit().await?;

        tracing::info!(
            "[Ledger] {} {} x{} on {} by {} (stock now {})",
            entry.id,
            kind,
            entry.quantity,
            product.id,
            actor.id,
            product.stock
        );

        self.notify(StockUpdate {
            action: StockAction::TransactionCreated,
            product: None,
            transaction: Some(TransactionSnapshot::new(&entry, &product)),
            user: actor.clone(),
            message: format!(
                "{} {} {} units of '{}' ({})",
                actor.name,
                kind.verb(),
                entry.quantity,
                product.name,
                kind
            ),
        });
        self.hub.broadcast(&RealtimeEvent::financial_changed());
        Ok(entry)
    }

    /// Edit product fields under the same lock as `record_transaction`.
    ///
    /// A stock edit here is an administrative correction: it is not recorded
    /// in the ledger.
    pub async fn update_product(
        &self,
        id: Uuid,
        changes: ProductChanges,
        actor: &ActorInfo,
    ) -> Result<Product, BackendError> {
        changes.validate()?;

        let mut unit = self.products.begin().await?;
        let mut product = unit
            .lock_product(id)
            .await?
            .ok_or_else(|| BackendError::not_found("product"))?;

        if let Some(sku) = changes.sku.as_deref().map(str::trim) {
            if sku != product.sku {
                if let Some(other) = self.products.find_product_by_sku(sku).await? {
                    if other.id != product.id {
                        tracing::warn!("[Ledger] Rejected SKU change of {} to taken {}", id, sku);
                        return Err(BackendError::DuplicateSku { sku: sku.to_string() });
                    }
                }
            }
        }

        let old_stock = product.stock;
        changes.apply(&mut product, actor.id, Utc::now());
        product.sku = product.sku.trim().to_string();

        unit.write_product(&product).await?;
        match unit.commit().await {
            Ok(()) => {}
            Err(StoreError::UniqueViolation(_)) => {
                return Err(BackendError::DuplicateSku { sku: product.sku });
            }
            Err(err) => return Err(err.into()),
        }

        tracing::info!("[Ledger] Product {} updated by {}", product.id, actor.id);
        self.notify(StockUpdate {
            action: StockAction::ProductUpdated,
            product: Some(ProductSnapshot::updated(&product, old_stock)),
            transaction: None,
            user: actor.clone(),
            message: format!("{} updated product '{}'", actor.name, product.name),
        });
        Ok(product)
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, BackendError> {
        Ok(self.products.list_products().await?)
    }

    pub async fn get_product(&self, id: Uuid) -> Result<Product, BackendError> {
        self.products
            .find_product(id)
            .await?
            .ok_or_else(|| BackendError::not_found("product"))
    }

    /// All ledger entries, newest first
    pub async fn list_transactions(&self) -> Result<Vec<LedgerEntry>, BackendError> {
        Ok(self.products.list_entries().await?)
    }

    pub async fn get_transaction(&self, id: Uuid) -> Result<LedgerEntry, BackendError> {
        self.products
            .find_entry(id)
            .await?
            .ok_or_else(|| BackendError::not_found("transaction"))
    }

    /// Ledger entries of one product, oldest first
    pub async fn product_history(&self, product_id: Uuid) -> Result<Vec<LedgerEntry>, BackendError> {
        self.get_product(product_id).await?;
        Ok(self.products.entries_for_product(product_id).await?)
    }

    /// Income, expense and valuation for the window ending now. The window
    /// starts at local midnight of its first day.
    pub async fn financial_stats(&self, range: StatsRange) -> Result<FinancialStats, BackendError> {
        let now = Utc::now();
        let today = local_date(now, self.utc_offset_minutes);
        let first_day = range.start_from(today);
        let from = local_offset(self.utc_offset_minutes)
            .from_local_datetime(&first_day.and_time(NaiveTime::MIN))
            .single()
            .map(|start| start.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let summary = self.products.financial_summary(from, now).await?;
        Ok(FinancialStats {
            total_income: summary.income,
            total_expense: summary.expense,
            total_valuation: summary.valuation,
            period_start: first_day.format(DATE_FORMAT).to_string(),
            period_end: today.format(DATE_FORMAT).to_string(),
        })
    }

    /// Units in and out per local day over the last `days` days. Days
    /// without movement are left out.
    pub async fn stock_movement(&self, days: u32) -> Result<StockMovement, BackendError> {
        let to = Utc::now();
        let from = to
            .checked_sub_signed(Duration::days(i64::from(days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut per_day: BTreeMap<_, (i64, i64)> = BTreeMap::new();
        for entry in self.products.entries_between(from, to).await? {
            let day = per_day
                .entry(local_date(entry.created_at, self.utc_offset_minutes))
                .or_default();
            match entry.kind {
                TransactionType::In => day.0 += i64::from(entry.quantity),
                TransactionType::Out => day.1 += i64::from(entry.quantity),
            }
        }

        let data = per_day
            .into_iter()
            .map(|(date, (inbound, outbound))| DailyMovement {
                date: date.format(DATE_FORMAT).to_string(),
                inbound,
                outbound,
            })
            .collect();
        Ok(StockMovement { period: days, data })
    }

    /// Product count, products under [`LOW_STOCK_THRESHOLD`] and stock value
    pub async fn inventory_overview(&self) -> Result<InventoryOverview, BackendError> {
        let products = self.products.list_products().await?;
        Ok(InventoryOverview {
            total_products: products.len() as i64,
            low_stock_count: products.iter().filter(|p| p.stock < LOW_STOCK_THRESHOLD).count() as i64,
            total_valuation: products.iter().map(|p| i64::from(p.stock) * p.price).sum(),
        })
    }

    fn notify(&self, update: StockUpdate) {
        self.hub.broadcast(&RealtimeEvent::StockUpdate(update));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::error::ErrorKind;
    use crate::backend::store::MemoryStore;
    use assert_matches::assert_matches;

    fn actor() -> ActorInfo {
        ActorInfo {
            id: Uuid::new_v4(),
            name: "Admin".to_string(),
            email: "admin@example.com".to_string(),
        }
    }

    fn ledger() -> (StockLedger, MemoryStore, HubHandle) {
        let store = MemoryStore::new();
        let hub = HubHandle::spawn(64, 64);
        let ledger = StockLedger::new(Arc::new(store.clone()), hub.clone(), 420);
        (ledger, store, hub)
    }

    fn new_product(sku: &str, stock: i32, price: i64) -> NewProduct {
        NewProduct {
            sku: sku.to_string(),
            name: format!("Item {}", sku),
            unit: "pcs".to_string(),
            stock,
            price,
        }
    }

    fn movement(product_id: Uuid, kind: &str, quantity: i32) -> TransactionRequest {
        TransactionRequest {
            product_id,
            kind: kind.to_string(),
            quantity,
            payment_method: "CASH".to_string(),
            note: String::new(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let (ledger, _, _) = ledger();
        let actor = actor();
        ledger.create_product(new_product("SKU-1", 0, 10), &actor).await.unwrap();

        let err = ledger.create_product(new_product("SKU-1", 0, 10), &actor).await.unwrap_err();
        assert_matches!(err, BackendError::DuplicateSku { .. });
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_missing_name_rejected() {
        let (ledger, _, _) = ledger();
        let mut input = new_product("SKU-1", 0, 10);
        input.name = " ".to_string();
        let err = ledger.create_product(input, &actor()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }

    #[tokio::test]
    async fn test_in_then_out_updates_stock_and_amount() {
        let (ledger, _, _) = ledger();
        let actor = actor();
        let product = ledger.create_product(new_product("SKU-1", 5, 250), &actor).await.unwrap();

        let entry = ledger.record_transaction(movement(product.id, "IN", 10), &actor).await.unwrap();
        assert_eq!(entry.total_amount, 2500);
        assert_eq!(entry.created_by, actor.id);

        ledger.record_transaction(movement(product.id, "OUT", 15), &actor).await.unwrap();
        assert_eq!(ledger.get_product(product.id).await.unwrap().stock, 0);
        assert_eq!(ledger.product_history(product.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_state_unchanged() {
        let (ledger, _, _) = ledger();
        let actor = actor();
        let product = ledger.create_product(new_product("SKU-1", 3, 100), &actor).await.unwrap();

        let err = ledger.record_transaction(movement(product.id, "OUT", 4), &actor).await.unwrap_err();
        assert_matches!(err, BackendError::InsufficientStock { requested: 4, available: 3 });
        assert_eq!(ledger.get_product(product.id).await.unwrap().stock, 3);
        assert!(ledger.list_transactions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_input_rejected() {
        let (ledger, _, _) = ledger();
        let actor = actor();
        let product = ledger.create_product(new_product("SKU-1", 3, 100), &actor).await.unwrap();

        for (kind, quantity) in [("IN", 0), ("IN", -2), ("MOVE", 1), ("in", 1)] {
            let err = ledger
                .record_transaction(movement(product.id, kind, quantity), &actor)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValidationFailed, "{} {}", kind, quantity);
        }

        let mut request = movement(product.id, "IN", 1);
        request.payment_method = "CARD".to_string();
        let err = ledger.record_transaction(request, &actor).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }

    #[tokio::test]
    async fn test_placeholder_payment_method_accepted() {
        let (ledger, _, _) = ledger();
        let actor = actor();
        let product = ledger.create_product(new_product("SKU-1", 0, 100), &actor).await.unwrap();
        let mut request = movement(product.id, "IN", 1);
        request.payment_method = "0".to_string();

        let entry = ledger.record_transaction(request, &actor).await.unwrap();
        assert_eq!(entry.payment_method, PaymentMethod::Placeholder);
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let (ledger, _, _) = ledger();
        let err = ledger
            .record_transaction(movement(Uuid::new_v4(), "IN", 1), &actor())
            .await
            .unwrap_err();
        assert_matches!(err, BackendError::NotFound { entity: "product" });
    }

    #[tokio::test]
    async fn test_failed_commit_writes_nothing() {
        let (ledger, store, _) = ledger();
        let actor = actor();
        let product = ledger.create_product(new_product("SKU-1", 5, 100), &actor).await.unwrap();

        store.set_fail_commits(true);
        let err = ledger.record_transaction(movement(product.id, "IN", 5), &actor).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);

        store.set_fail_commits(false);
        assert_eq!(ledger.get_product(product.id).await.unwrap().stock, 5);
        assert!(ledger.list_transactions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_reports_old_and_new_stock() {
        let (ledger, _, hub) = ledger();
        let actor = actor();
        let product = ledger.create_product(new_product("SKU-1", 5, 100), &actor).await.unwrap();
        let mut client = hub.register(None).await.unwrap();

        let changes = ProductChanges {
            stock: Some(9),
            ..Default::default()
        };
        let updated = ledger.update_product(product.id, changes, &actor).await.unwrap();
        assert_eq!(updated.stock, 9);

        let frame = client.outbound.recv().await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(json["type"], "stock_update");
        assert_eq!(json["action"], "product_updated");
        assert_eq!(json["product"]["old_stock"], 5);
        assert_eq!(json["product"]["new_stock"], 9);
    }

    #[tokio::test]
    async fn test_update_to_taken_sku_rejected() {
        let (ledger, _, _) = ledger();
        let actor = actor();
        ledger.create_product(new_product("SKU-1", 0, 100), &actor).await.unwrap();
        let second = ledger.create_product(new_product("SKU-2", 0, 100), &actor).await.unwrap();

        let changes = ProductChanges {
            sku: Some("SKU-1".to_string()),
            ..Default::default()
        };
        let err = ledger.update_product(second.id, changes, &actor).await.unwrap_err();
        assert_matches!(err, BackendError::DuplicateSku { .. });
    }

    #[tokio::test]
    async fn test_transaction_broadcasts_stock_then_financial() {
        let (ledger, _, hub) = ledger();
        let actor = actor();
        let product = ledger.create_product(new_product("SKU-1", 5, 100), &actor).await.unwrap();
        let mut client = hub.register(None).await.unwrap();

        ledger.record_transaction(movement(product.id, "OUT", 2), &actor).await.unwrap();

        let first: serde_json::Value = serde_json::from_str(&client.outbound.recv().await.unwrap()).unwrap();
        assert_eq!(first["action"], "transaction_created");
        assert_eq!(first["transaction"]["new_stock"], 3);
        assert_eq!(first["message"], "Admin removed 2 units of 'Item SKU-1' (OUT)");

        let second: serde_json::Value = serde_json::from_str(&client.outbound.recv().await.unwrap()).unwrap();
        assert_eq!(second["type"], "financial_update");
    }

    #[tokio::test]
    async fn test_financial_stats() {
        let (ledger, _, _) = ledger();
        let actor = actor();
        let product = ledger.create_product(new_product("SKU-1", 0, 100), &actor).await.unwrap();
        ledger.record_transaction(movement(product.id, "IN", 10), &actor).await.unwrap();
        ledger.record_transaction(movement(product.id, "OUT", 3), &actor).await.unwrap();

        let stats = ledger.financial_stats(StatsRange::SevenDays).await.unwrap();
        assert_eq!(stats.total_income, 1000);
        assert_eq!(stats.total_expense, 300);
        assert_eq!(stats.total_valuation, 700);
        assert!(stats.period_start < stats.period_end);
    }

    #[tokio::test]
    async fn test_stock_movement_groups_by_day() {
        let (ledger, _, _) = ledger();
        let actor = actor();
        let product = ledger.create_product(new_product("SKU-1", 0, 100), &actor).await.unwrap();
        ledger.record_transaction(movement(product.id, "IN", 10), &actor).await.unwrap();
        ledger.record_transaction(movement(product.id, "IN", 5), &actor).await.unwrap();
        ledger.record_transaction(movement(product.id, "OUT", 4), &actor).await.unwrap();

        let report = ledger.stock_movement(7).await.unwrap();
        assert_eq!(report.period, 7);
        assert_eq!(report.data.len(), 1);
        assert_eq!(report.data[0].inbound, 15);
        assert_eq!(report.data[0].outbound, 4);
        assert_eq!(
            report.data[0].date,
            local_date(Utc::now(), 420).format(DATE_FORMAT).to_string()
        );

        let empty = ledger.stock_movement(0).await.unwrap();
        assert!(empty.data.is_empty());
    }

    #[tokio::test]
    async fn test_inventory_overview() {
        let (ledger, _, _) = ledger();
        let actor = actor();
        ledger.create_product(new_product("SKU-1", 9, 100), &actor).await.unwrap();
        ledger.create_product(new_product("SKU-2", 10, 50), &actor).await.unwrap();
        ledger.create_product(new_product("SKU-3", 0, 70), &actor).await.unwrap();

        let overview = ledger.inventory_overview().await.unwrap();
        assert_eq!(overview.total_products, 3);
        assert_eq!(overview.low_stock_count, 2);
        assert_eq!(overview.total_valuation, 9 * 100 + 10 * 50);
    }
}
