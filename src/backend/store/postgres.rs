/**
 * Postgres Store
 *
 * sqlx implementation of the store traits. Schema lives in `migrations/`
 * and is applied at startup by `server::config::load_database`.
 *
 * A unit of work is a `Transaction<'static, Postgres>`. `lock_product`
 * issues `SELECT ... FOR UPDATE`, so a second unit locking the same product
 * waits inside Postgres until the first one commits or rolls back. Dropping
 * the transaction without committing rolls it back.
 */

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use super::{ProductStore, ShiftStore, StoreError, UnitOfWork, UserStore};
use crate::shared::models::{
    FinancialSummary, LedgerEntry, NewUser, PaymentMethod, Product, Shift, ShiftFilter,
    TransactionType, User,
};
use crate::shared::schedule::{ClockTime, DateSpan, TimeRange};

const PRODUCT_COLUMNS: &str =
    "id, sku, name, unit, stock, price, created_by, updated_by, created_at, updated_at";

const ENTRY_COLUMNS: &str =
    "id, product_id, type, quantity, total_amount, payment_method, note, created_by, created_at";

const SHIFT_COLUMNS: &str = "id, user_id, start_time, end_time, start_date, end_date, note, \
     created_by, updated_by, created_at, updated_at";

const USER_COLUMNS: &str = "id, email, password_hash, full_name, role_code, is_active, privileges, \
     token_version, last_seen_at, created_at";

/// Store backed by a Postgres pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn corrupt(err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(err.to_string())
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    Ok(Product {
        id: row.try_get("id")?,
        sku: row.try_get("sku")?,
        name: row.try_get("name")?,
        unit: row.try_get("unit")?,
        stock: row.try_get("stock")?,
        price: row.try_get("price")?,
        created_by: row.try_get("created_by")?,
        updated_by: row.try_get("updated_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn entry_from_row(row: &PgRow) -> Result<LedgerEntry, StoreError> {
    let kind: String = row.try_get("type")?;
    let payment_method: String = row.try_get("payment_method")?;
    Ok(LedgerEntry {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        kind: kind.parse::<TransactionType>().map_err(corrupt)?,
        quantity: row.try_get("quantity")?,
        total_amount: row.try_get("total_amount")?,
        payment_method: payment_method.parse::<PaymentMethod>().map_err(corrupt)?,
        note: row.try_get("note")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
    })
}

fn shift_from_row(row: &PgRow) -> Result<Shift, StoreError> {
    let start: String = row.try_get("start_time")?;
    let end: String = row.try_get("end_time")?;
    let start_date: NaiveDate = row.try_get("start_date")?;
    let end_date: NaiveDate = row.try_get("end_date")?;
    let times = TimeRange::new(
        start.parse::<ClockTime>().map_err(corrupt)?,
        end.parse::<ClockTime>().map_err(corrupt)?,
    )
    .map_err(corrupt)?;
    Ok(Shift {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        times,
        dates: DateSpan::new(start_date, end_date).map_err(corrupt)?,
        note: row.try_get("note")?,
        created_by: row.try_get("created_by")?,
        updated_by: row.try_get("updated_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        full_name: row.try_get("full_name")?,
        role_code: row.try_get("role_code")?,
        is_active: row.try_get("is_active")?,
        privileges: row.try_get("privileges")?,
        token_version: row.try_get("token_version")?,
        last_seen_at: row.try_get("last_seen_at")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl ProductStore for PgStore {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn find_product_by_sku(&self, sku: &str) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = $1"))
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, unit, stock, price, created_by, updated_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.unit)
        .bind(product.stock)
        .bind(product.price)
        .bind(product.created_by)
        .bind(product.updated_by)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC, sku"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(product_from_row).collect()
    }

    async fn list_entries(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries ORDER BY created_at DESC, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(entry_from_row).collect()
    }

    async fn entries_for_product(&self, product_id: Uuid) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE product_id = $1 ORDER BY created_at, id"
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(entry_from_row).collect()
    }

    async fn entries_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries \
             WHERE created_at BETWEEN $1 AND $2 ORDER BY created_at, id"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(entry_from_row).collect()
    }

    async fn find_entry(&self, id: Uuid) -> Result<Option<LedgerEntry>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(entry_from_row).transpose()
    }

    async fn financial_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<FinancialSummary, StoreError> {
        let totals = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN type = 'IN' THEN total_amount ELSE 0 END), 0)::BIGINT AS income,
                COALESCE(SUM(CASE WHEN type = 'OUT' THEN total_amount ELSE 0 END), 0)::BIGINT AS expense
            FROM ledger_entries
            WHERE created_at BETWEEN $1 AND $2
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        let valuation = sqlx::query(
            "SELECT COALESCE(SUM(stock::BIGINT * price), 0)::BIGINT AS valuation FROM products",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(FinancialSummary {
            income: totals.try_get("income")?,
            expense: totals.try_get("expense")?,
            valuation: valuation.try_get("valuation")?,
        })
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnit {
            tx,
            locked: HashSet::new(),
        }))
    }
}

/// Unit of work over one Postgres transaction
struct PgUnit {
    tx: Transaction<'static, Postgres>,
    locked: HashSet<Uuid>,
}

#[async_trait]
impl UnitOfWork for PgUnit {
    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        let product = row.as_ref().map(product_from_row).transpose()?;
        if product.is_some() {
            self.locked.insert(id);
        }
        Ok(product)
    }

    async fn write_product(&mut self, product: &Product) -> Result<(), StoreError> {
        if !self.locked.contains(&product.id) {
            return Err(StoreError::NotLocked(product.id));
        }
        sqlx::query(
            r#"
            UPDATE products
            SET sku = $2, name = $3, unit = $4, stock = $5, price = $6, updated_by = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.unit)
        .bind(product.stock)
        .bind(product.price)
        .bind(product.updated_by)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn append_entry(&mut self, entry: &LedgerEntry) -> Result<(), StoreError> {
        if !self.locked.contains(&entry.product_id) {
            return Err(StoreError::NotLocked(entry.product_id));
        }
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (id, product_id, type, quantity, total_amount, payment_method, note, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id)
        .bind(entry.product_id)
        .bind(entry.kind.as_str())
        .bind(entry.quantity)
        .bind(entry.total_amount)
        .bind(entry.payment_method.as_str())
        .bind(&entry.note)
        .bind(entry.created_by)
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ShiftStore for PgStore {
    async fn insert_shift(&self, shift: &Shift) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO shifts (id, user_id, start_time, end_time, start_date, end_date, is_overnight,
                                total_days, note, created_by, updated_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(shift.id)
        .bind(shift.user_id)
        .bind(shift.times.start().to_string())
        .bind(shift.times.end().to_string())
        .bind(shift.dates.start())
        .bind(shift.dates.end())
        .bind(shift.is_overnight())
        .bind(shift.total_days())
        .bind(&shift.note)
        .bind(shift.created_by)
        .bind(shift.updated_by)
        .bind(shift.created_at)
        .bind(shift.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_shift(&self, shift: &Shift) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE shifts
            SET user_id = $2, start_time = $3, end_time = $4, start_date = $5, end_date = $6,
                is_overnight = $7, total_days = $8, note = $9, updated_by = $10, updated_at = $11
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(shift.id)
        .bind(shift.user_id)
        .bind(shift.times.start().to_string())
        .bind(shift.times.end().to_string())
        .bind(shift.dates.start())
        .bind(shift.dates.end())
        .bind(shift.is_overnight())
        .bind(shift.total_days())
        .bind(&shift.note)
        .bind(shift.updated_by)
        .bind(shift.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("shift"));
        }
        Ok(())
    }

    async fn soft_delete_shift(
        &self,
        id: Uuid,
        deleted_by: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE shifts SET deleted_at = $2, deleted_by = $3 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .bind(deleted_by)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_shift(&self, id: Uuid) -> Result<Option<Shift>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(shift_from_row).transpose()
    }

    async fn shifts_for_user_in_dates(
        &self,
        user_id: Uuid,
        dates: &DateSpan,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Shift>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SHIFT_COLUMNS} FROM shifts
            WHERE user_id = $1
              AND deleted_at IS NULL
              AND start_date <= $3 AND $2 <= end_date
              AND ($4::uuid IS NULL OR id <> $4)
            "#
        ))
        .bind(user_id)
        .bind(dates.start())
        .bind(dates.end())
        .bind(exclude)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(shift_from_row).collect()
    }

    async fn list_shifts(&self, filter: ShiftFilter) -> Result<Vec<Shift>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SHIFT_COLUMNS} FROM shifts
            WHERE deleted_at IS NULL
              AND ($1::uuid IS NULL OR user_id = $1)
              AND ($2::date IS NULL OR (start_date <= $3 AND $2 <= end_date))
            ORDER BY start_date, start_time
            "#
        ))
        .bind(filter.user_id)
        .bind(filter.dates.map(|d| d.start()))
        .bind(filter.dates.map(|d| d.end()))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(shift_from_row).collect()
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL"
        ))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn insert_user(&self, user: NewUser, now: DateTime<Utc>) -> Result<User, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (id, email, password_hash, full_name, role_code, is_active, privileges, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&user.role_code)
        .bind(user.is_active)
        .bind(&user.privileges)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        user_from_row(&row)
    }

    async fn count_users(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM users WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("count")?)
    }

    async fn start_session(&self, id: Uuid, token_version: &str, now: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET token_version = $2, last_seen_at = $3 WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .bind(token_version)
            .bind(now)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user"));
        }
        Ok(())
    }

    async fn touch_last_seen(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET last_seen_at = $2 WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user"));
        }
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user"));
        }
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL ORDER BY created_at, email"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = $2, password_hash = $3, full_name = $4, role_code = $5,
                is_active = $6, privileges = $7, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&user.role_code)
        .bind(user.is_active)
        .bind(&user.privileges)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user"));
        }
        Ok(())
    }

    async fn soft_delete_user(
        &self,
        id: Uuid,
        deleted_by: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = $3, deleted_by = $2, token_version = '' \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(deleted_by)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
