//! In-memory store
//!
//! Used when no `DATABASE_URL` is configured and by the test suites. Row
//! locks are emulated with one `tokio::sync::Mutex` per product: a unit of
//! work holds the owned guard until it is committed or dropped. A lock entry
//! lives only while some unit holds or waits for it. Writes are staged
//! inside the unit and applied under a single write lock on commit, so
//! readers see either none or all of them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as SyncMutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use super::{ProductStore, ShiftStore, StoreError, UnitOfWork, UserStore};
use crate::shared::models::{
    FinancialSummary, LedgerEntry, NewUser, Product, Shift, ShiftFilter, TransactionType, User,
};
use crate::shared::schedule::DateSpan;

#[derive(Default)]
struct LedgerTables {
    products: HashMap<Uuid, Product>,
    entries: Vec<LedgerEntry>,
}

impl LedgerTables {
    fn sku_taken(&self, sku: &str, except: Uuid) -> bool {
        self.products.values().any(|p| p.sku == sku && p.id != except)
    }
}

struct StoredShift {
    shift: Shift,
    deleted: Option<(Uuid, DateTime<Utc>)>,
}

struct StoredUser {
    user: User,
    deleted: Option<(Uuid, DateTime<Utc>)>,
}

#[derive(Default)]
struct UserTable {
    rows: HashMap<Uuid, StoredUser>,
}

impl UserTable {
    fn live(&self) -> impl Iterator<Item = &User> {
        self.rows.values().filter(|s| s.deleted.is_none()).map(|s| &s.user)
    }

    fn live_mut(&mut self, id: Uuid) -> Option<&mut User> {
        self.rows
            .get_mut(&id)
            .filter(|s| s.deleted.is_none())
            .map(|s| &mut s.user)
    }

    fn email_taken(&self, email: &str, except: Uuid) -> bool {
        self.live().any(|u| u.email == email && u.id != except)
    }
}

type RowLocks = SyncMutex<HashMap<Uuid, Arc<Mutex<()>>>>;

#[derive(Default)]
struct Inner {
    ledger: RwLock<LedgerTables>,
    // never held across an await
    row_locks: Arc<RowLocks>,
    shifts: RwLock<HashMap<Uuid, StoredShift>>,
    users: RwLock<UserTable>,
    fail_commits: AtomicBool,
}

/// Held row lock. Dropping it unlocks the row and forgets the lock entry
/// once no other unit references it.
struct RowGuard {
    id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<RowLocks>,
}

impl Drop for RowGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(&self.id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.id);
        }
    }
}

/// Process-local implementation of every store trait
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following commit fail, for exercising rollback paths
    pub fn set_fail_commits(&self, fail: bool) {
        self.inner.fail_commits.store(fail, Ordering::SeqCst);
    }

    async fn lock_row(&self, id: Uuid) -> RowGuard {
        let lock = {
            let mut locks = self.inner.row_locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(id).or_default().clone()
        };
        // A wait cancelled here leaves the entry until the row is next released
        let guard = lock.lock_owned().await;
        RowGuard {
            id,
            guard: Some(guard),
            locks: self.inner.row_locks.clone(),
        }
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.inner.ledger.read().await.products.get(&id).cloned())
    }

    async fn find_product_by_sku(&self, sku: &str) -> Result<Option<Product>, StoreError> {
        let tables = self.inner.ledger.read().await;
        Ok(tables.products.values().find(|p| p.sku == sku).cloned())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut tables = self.inner.ledger.write().await;
        if tables.sku_taken(&product.sku, product.id) {
            return Err(StoreError::UniqueViolation("products_sku_key".to_string()));
        }
        tables.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let tables = self.inner.ledger.read().await;
        let mut products: Vec<Product> = tables.products.values().cloned().collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.sku.cmp(&b.sku)));
        Ok(products)
    }

    async fn list_entries(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        let tables = self.inner.ledger.read().await;
        Ok(tables.entries.iter().rev().cloned().collect())
    }

    async fn entries_for_product(&self, product_id: Uuid) -> Result<Vec<LedgerEntry>, StoreError> {
        let tables = self.inner.ledger.read().await;
        Ok(tables
            .entries
            .iter()
            .filter(|e| e.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn entries_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let tables = self.inner.ledger.read().await;
        Ok(tables
            .entries
            .iter()
            .filter(|e| e.created_at >= from && e.created_at <= to)
            .cloned()
            .collect())
    }

    async fn find_entry(&self, id: Uuid) -> Result<Option<LedgerEntry>, StoreError> {
        let tables = self.inner.ledger.read().await;
        Ok(tables.entries.iter().find(|e| e.id == id).cloned())
    }

    async fn financial_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<FinancialSummary, StoreError> {
        let tables = self.inner.ledger.read().await;
        let mut summary = FinancialSummary::default();
        for entry in tables
            .entries
            .iter()
            .filter(|e| e.created_at >= from && e.created_at <= to)
        {
            match entry.kind {
                TransactionType::In => summary.income = summary.income.saturating_add(entry.total_amount),
                TransactionType::Out => summary.expense = summary.expense.saturating_add(entry.total_amount),
            }
        }
        summary.valuation = tables.products.values().fold(0i64, |acc, p| {
            acc.saturating_add(i64::from(p.stock).saturating_mul(p.price))
        });
        Ok(summary)
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        Ok(Box::new(MemoryUnit {
            store: self.clone(),
            guards: HashMap::new(),
            products: HashMap::new(),
            entries: Vec::new(),
        }))
    }
}

/// Unit of work over [`MemoryStore`]. Dropping it releases the row locks and
/// discards staged writes.
struct MemoryUnit {
    store: MemoryStore,
    guards: HashMap<Uuid, RowGuard>,
    products: HashMap<Uuid, Product>,
    entries: Vec<LedgerEntry>,
}

#[async_trait]
impl UnitOfWork for MemoryUnit {
    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>, StoreError> {
        if !self.guards.contains_key(&id) {
            let guard = self.store.lock_row(id).await;
            self.guards.insert(id, guard);
        }
        if let Some(staged) = self.products.get(&id) {
            return Ok(Some(staged.clone()));
        }
        let current = self.store.inner.ledger.read().await.products.get(&id).cloned();
        if current.is_none() {
            self.guards.remove(&id);
        }
        Ok(current)
    }

    async fn write_product(&mut self, product: &Product) -> Result<(), StoreError> {
        if !self.guards.contains_key(&product.id) {
            return Err(StoreError::NotLocked(product.id));
        }
        self.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn append_entry(&mut self, entry: &LedgerEntry) -> Result<(), StoreError> {
        if !self.guards.contains_key(&entry.product_id) {
            return Err(StoreError::NotLocked(entry.product_id));
        }
        self.entries.push(entry.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let unit = *self;
        if unit.store.inner.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Database("commit failed (injected)".to_string()));
        }

        let mut tables = unit.store.inner.ledger.write().await;
        for product in unit.products.values() {
            if tables.sku_taken(&product.sku, product.id) {
                return Err(StoreError::UniqueViolation("products_sku_key".to_string()));
            }
        }
        for (id, product) in unit.products {
            tables.products.insert(id, product);
        }
        tables.entries.extend(unit.entries);
        drop(tables);
        drop(unit.guards);
        Ok(())
    }
}

#[async_trait]
impl ShiftStore for MemoryStore {
    async fn insert_shift(&self, shift: &Shift) -> Result<(), StoreError> {
        self.inner.shifts.write().await.insert(
            shift.id,
            StoredShift {
                shift: shift.clone(),
                deleted: None,
            },
        );
        Ok(())
    }

    async fn update_shift(&self, shift: &Shift) -> Result<(), StoreError> {
        let mut shifts = self.inner.shifts.write().await;
        match shifts.get_mut(&shift.id) {
            Some(stored) if stored.deleted.is_none() => {
                stored.shift = shift.clone();
                Ok(())
            }
            _ => Err(StoreError::NotFound("shift")),
        }
    }

    async fn soft_delete_shift(
        &self,
        id: Uuid,
        deleted_by: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut shifts = self.inner.shifts.write().await;
        match shifts.get_mut(&id) {
            Some(stored) if stored.deleted.is_none() => {
                stored.deleted = Some((deleted_by, at));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_shift(&self, id: Uuid) -> Result<Option<Shift>, StoreError> {
        let shifts = self.inner.shifts.read().await;
        Ok(shifts
            .get(&id)
            .filter(|s| s.deleted.is_none())
            .map(|s| s.shift.clone()))
    }

    async fn shifts_for_user_in_dates(
        &self,
        user_id: Uuid,
        dates: &DateSpan,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Shift>, StoreError> {
        let shifts = self.inner.shifts.read().await;
        Ok(shifts
            .values()
            .filter(|s| s.deleted.is_none())
            .map(|s| &s.shift)
            .filter(|s| s.user_id == user_id && Some(s.id) != exclude && s.dates.intersects(dates))
            .cloned()
            .collect())
    }

    async fn list_shifts(&self, filter: ShiftFilter) -> Result<Vec<Shift>, StoreError> {
        let shifts = self.inner.shifts.read().await;
        let mut found: Vec<Shift> = shifts
            .values()
            .filter(|s| s.deleted.is_none())
            .map(|s| &s.shift)
            .filter(|s| filter.user_id.map_or(true, |user| s.user_id == user))
            .filter(|s| filter.dates.map_or(true, |span| s.dates.intersects(&span)))
            .cloned()
            .collect();
        found.sort_by_key(|s| (s.dates.start(), s.times.start()));
        Ok(found)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.inner.users.read().await;
        let found = users.live().find(|u| u.id == id).cloned();
        Ok(found)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.inner.users.read().await;
        let found = users.live().find(|u| u.email == email).cloned();
        Ok(found)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let users = self.inner.users.read().await;
        let mut found: Vec<User> = users.live().cloned().collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.email.cmp(&b.email)));
        Ok(found)
    }

    async fn insert_user(&self, user: NewUser, now: DateTime<Utc>) -> Result<User, StoreError> {
        let mut users = self.inner.users.write().await;
        if users.email_taken(&user.email, Uuid::nil()) {
            return Err(StoreError::UniqueViolation("users_email_key".to_string()));
        }
        let record = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            full_name: user.full_name,
            role_code: user.role_code,
            is_active: user.is_active,
            privileges: user.privileges,
            token_version: String::new(),
            last_seen_at: None,
            created_at: now,
        };
        users.rows.insert(
            record.id,
            StoredUser {
                user: record.clone(),
                deleted: None,
            },
        );
        Ok(record)
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.inner.users.write().await;
        if users.email_taken(&user.email, user.id) {
            return Err(StoreError::UniqueViolation("users_email_key".to_string()));
        }
        let stored = users.live_mut(user.id).ok_or(StoreError::NotFound("user"))?;
        stored.email = user.email.clone();
        stored.password_hash = user.password_hash.clone();
        stored.full_name = user.full_name.clone();
        stored.role_code = user.role_code.clone();
        stored.is_active = user.is_active;
        stored.privileges = user.privileges.clone();
        Ok(())
    }

    async fn soft_delete_user(
        &self,
        id: Uuid,
        deleted_by: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut users = self.inner.users.write().await;
        match users.rows.get_mut(&id) {
            Some(stored) if stored.deleted.is_none() => {
                stored.user.token_version.clear();
                stored.deleted = Some((deleted_by, at));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count_users(&self) -> Result<i64, StoreError> {
        let count = self.inner.users.read().await.live().count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn start_session(&self, id: Uuid, token_version: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut users = self.inner.users.write().await;
        let user = users.live_mut(id).ok_or(StoreError::NotFound("user"))?;
        user.token_version = token_version.to_string();
        user.last_seen_at = Some(now);
        Ok(())
    }

    async fn touch_last_seen(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut users = self.inner.users.write().await;
        let user = users.live_mut(id).ok_or(StoreError::NotFound("user"))?;
        user.last_seen_at = Some(now);
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let mut users = self.inner.users.write().await;
        let user = users.live_mut(id).ok_or(StoreError::NotFound("user"))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::time::Duration;

    fn product(sku: &str, stock: i32) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            sku: sku.to_string(),
            name: format!("Product {}", sku),
            unit: "pcs".to_string(),
            stock,
            price: 100,
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let store = MemoryStore::new();
        store.insert_product(&product("A", 0)).await.unwrap();
        let result = store.insert_product(&product("A", 0)).await;
        assert_matches!(result, Err(StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn test_uncommitted_unit_is_discarded() {
        let store = MemoryStore::new();
        let p = product("A", 5);
        store.insert_product(&p).await.unwrap();

        let mut unit = store.begin().await.unwrap();
        let mut locked = unit.lock_product(p.id).await.unwrap().unwrap();
        locked.stock = 50;
        unit.write_product(&locked).await.unwrap();
        drop(unit);

        assert_eq!(store.find_product(p.id).await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_write_requires_lock() {
        let store = MemoryStore::new();
        let p = product("A", 5);
        store.insert_product(&p).await.unwrap();

        let mut unit = store.begin().await.unwrap();
        assert_matches!(unit.write_product(&p).await, Err(StoreError::NotLocked(id)) if id == p.id);
    }

    #[tokio::test]
    async fn test_lock_blocks_second_unit_until_commit() {
        let store = MemoryStore::new();
        let p = product("A", 5);
        store.insert_product(&p).await.unwrap();

        let mut first = store.begin().await.unwrap();
        first.lock_product(p.id).await.unwrap();

        let contender = store.clone();
        let id = p.id;
        let waiter = tokio::spawn(async move {
            let mut second = contender.begin().await.unwrap();
            second.lock_product(id).await.unwrap().unwrap().stock
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        let mut updated = p.clone();
        updated.stock = 9;
        first.write_product(&updated).await.unwrap();
        first.commit().await.unwrap();

        assert_eq!(waiter.await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_injected_commit_failure_keeps_state() {
        let store = MemoryStore::new();
        let p = product("A", 5);
        store.insert_product(&p).await.unwrap();
        store.set_fail_commits(true);

        let mut unit = store.begin().await.unwrap();
        let mut locked = unit.lock_product(p.id).await.unwrap().unwrap();
        locked.stock = 1;
        unit.write_product(&locked).await.unwrap();
        assert!(unit.commit().await.is_err());

        assert_eq!(store.find_product(p.id).await.unwrap().unwrap().stock, 5);
        assert!(store.list_entries().await.unwrap().is_empty());
    }

    fn lock_entries(store: &MemoryStore) -> usize {
        store.inner.row_locks.lock().unwrap().len()
    }

    #[tokio::test]
    async fn test_missing_product_releases_lock() {
        let store = MemoryStore::new();
        let mut unit = store.begin().await.unwrap();
        assert!(unit.lock_product(Uuid::new_v4()).await.unwrap().is_none());
        assert_eq!(lock_entries(&store), 0);
    }

    #[tokio::test]
    async fn test_lock_entries_do_not_accumulate() {
        let store = MemoryStore::new();
        for _ in 0..10_000 {
            let mut unit = store.begin().await.unwrap();
            unit.lock_product(Uuid::new_v4()).await.unwrap();
        }
        assert_eq!(lock_entries(&store), 0);

        let p = product("A", 5);
        store.insert_product(&p).await.unwrap();
        let mut unit = store.begin().await.unwrap();
        unit.lock_product(p.id).await.unwrap();
        assert_eq!(lock_entries(&store), 1);
        unit.commit().await.unwrap();
        assert_eq!(lock_entries(&store), 0);
    }

    #[tokio::test]
    async fn test_contended_lock_entry_survives_first_release() {
        let store = MemoryStore::new();
        let p = product("A", 5);
        store.insert_product(&p).await.unwrap();

        let mut first = store.begin().await.unwrap();
        first.lock_product(p.id).await.unwrap();
        let contender = store.clone();
        let id = p.id;
        let waiter = tokio::spawn(async move {
            let mut second = contender.begin().await.unwrap();
            second.lock_product(id).await.unwrap();
            second
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        let second = waiter.await.unwrap();
        assert_eq!(lock_entries(&store), 1);
        drop(second);
        assert_eq!(lock_entries(&store), 0);
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            full_name: "Someone".to_string(),
            role_code: None,
            is_active: true,
            privileges: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_deleted_user_is_hidden_and_email_reusable() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("a@example.com"), Utc::now()).await.unwrap();
        store.start_session(user.id, "v1", Utc::now()).await.unwrap();

        assert!(store.soft_delete_user(user.id, Uuid::new_v4(), Utc::now()).await.unwrap());
        assert!(!store.soft_delete_user(user.id, Uuid::new_v4(), Utc::now()).await.unwrap());
        assert!(store.find_user(user.id).await.unwrap().is_none());
        assert!(store.find_user_by_email("a@example.com").await.unwrap().is_none());
        assert_eq!(store.count_users().await.unwrap(), 0);
        assert_matches!(
            store.touch_last_seen(user.id, Utc::now()).await,
            Err(StoreError::NotFound("user"))
        );

        store.insert_user(new_user("a@example.com"), Utc::now()).await.unwrap();
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_user_keeps_email_unique() {
        let store = MemoryStore::new();
        store.insert_user(new_user("a@example.com"), Utc::now()).await.unwrap();
        let mut b = store.insert_user(new_user("b@example.com"), Utc::now()).await.unwrap();

        b.email = "a@example.com".to_string();
        assert_matches!(store.update_user(&b).await, Err(StoreError::UniqueViolation(_)));

        b.email = "c@example.com".to_string();
        b.is_active = false;
        store.update_user(&b).await.unwrap();
        let stored = store.find_user(b.id).await.unwrap().unwrap();
        assert_eq!(stored.email, "c@example.com");
        assert!(!stored.is_active);
    }
}
