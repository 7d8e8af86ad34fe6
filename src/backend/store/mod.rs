//! Persistence
//!
//! Storage is reached only through the traits in this module so that services
//! can run against Postgres in production and against [`MemoryStore`] in tests
//! or when no database is configured.
//!
//! Stock is the one field with a stricter contract: [`ProductStore`] has no
//! update method. A product can only be rewritten inside a [`UnitOfWork`]
//! after [`UnitOfWork::lock_product`] took its exclusive row lock, and the
//! write becomes visible together with any ledger entries appended in the
//! same unit on [`UnitOfWork::commit`]. Dropping a unit without committing
//! rolls everything back and releases its locks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::shared::models::{FinancialSummary, LedgerEntry, NewUser, Product, Shift, ShiftFilter, User};
use crate::shared::schedule::DateSpan;

/// In-memory store
pub mod memory;

/// Postgres store (sqlx)
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persistence failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A row that cannot be mapped back into a domain type
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Write to a product that was not locked in this unit of work
    #[error("product {0} is not locked by this unit of work")]
    NotLocked(Uuid),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::UniqueViolation(db.constraint().unwrap_or("unknown").to_string())
            }
            _ => Self::Database(err.to_string()),
        }
    }
}

/// Products, the ledger and the financial aggregates derived from it
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;

    async fn find_product_by_sku(&self, sku: &str) -> Result<Option<Product>, StoreError>;

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;

    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;

    /// All ledger entries, newest first
    async fn list_entries(&self) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Ledger entries for one product, oldest first
    async fn entries_for_product(&self, product_id: Uuid) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Ledger entries created in `[from, to]`, oldest first
    async fn entries_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>, StoreError>;

    async fn find_entry(&self, id: Uuid) -> Result<Option<LedgerEntry>, StoreError>;

    /// IN/OUT totals for entries created in `[from, to]`, plus the current
    /// stock valuation
    async fn financial_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<FinancialSummary, StoreError>;

    /// Open an all-or-nothing unit of work
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;
}

/// One atomic scope over products and the ledger
#[async_trait]
pub trait UnitOfWork: Send {
    /// Take the exclusive lock on a product row and read it. Blocks while
    /// another unit holds the lock. `None` if the product does not exist.
    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>, StoreError>;

    /// Stage a new version of a product locked by this unit
    async fn write_product(&mut self, product: &Product) -> Result<(), StoreError>;

    /// Stage a new ledger entry
    async fn append_entry(&mut self, entry: &LedgerEntry) -> Result<(), StoreError>;

    /// Make every staged write visible at once and release the locks
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Shift assignments. Deleted shifts are kept but never returned.
#[async_trait]
pub trait ShiftStore: Send + Sync {
    async fn insert_shift(&self, shift: &Shift) -> Result<(), StoreError>;

    async fn update_shift(&self, shift: &Shift) -> Result<(), StoreError>;

    /// Mark as deleted; `false` if no live shift had that id
    async fn soft_delete_shift(
        &self,
        id: Uuid,
        deleted_by: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn find_shift(&self, id: Uuid) -> Result<Option<Shift>, StoreError>;

    /// Live shifts of `user_id` whose dates intersect `dates`, minus `exclude`
    async fn shifts_for_user_in_dates(
        &self,
        user_id: Uuid,
        dates: &DateSpan,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Shift>, StoreError>;

    /// Live shifts matching `filter`, ordered by start date then start time
    async fn list_shifts(&self, filter: ShiftFilter) -> Result<Vec<Shift>, StoreError>;
}

/// Users and their session fields. Deleted users are kept but never
/// returned, and their email may be taken again.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Live users, oldest first
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    async fn insert_user(&self, user: NewUser, now: DateTime<Utc>) -> Result<User, StoreError>;

    /// Rewrite profile, credential, activation and privileges of a live user.
    /// Session fields are left alone.
    async fn update_user(&self, user: &User) -> Result<(), StoreError>;

    /// Mark as deleted and drop the session; `false` if no live user had that id
    async fn soft_delete_user(
        &self,
        id: Uuid,
        deleted_by: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn count_users(&self) -> Result<i64, StoreError>;

    /// Set a fresh token version and last-seen time in one write
    async fn start_session(&self, id: Uuid, token_version: &str, now: DateTime<Utc>) -> Result<(), StoreError>;

    async fn touch_last_seen(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError>;
}
