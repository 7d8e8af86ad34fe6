//! Domain Models
//!
//! Records persisted by the store layer and the request/response shapes the
//! HTTP layer exchanges with clients. Validation that needs no I/O lives on
//! the types themselves (`TransactionType::from_str`, `PaymentMethod::from_str`);
//! everything that needs the store lives in the services.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::SharedError;
use crate::shared::schedule::{ClockTime, DateSpan, TimeRange, DATE_FORMAT};

/// Privilege codes checked by the request layer
pub mod privileges {
    pub const PRODUCT_CREATE: &str = "product:create";
    pub const PRODUCT_UPDATE: &str = "product:update";
    pub const TRANSACTION_CREATE: &str = "transaction:create";
    pub const TRANSACTION_VIEW: &str = "transaction:view";
    pub const SHIFT_CREATE: &str = "shift:create";
    pub const SHIFT_UPDATE: &str = "shift:update";
    pub const SHIFT_DELETE: &str = "shift:delete";
    pub const USER_CREATE: &str = "user:create";
    pub const USER_UPDATE: &str = "user:update";
    pub const USER_DELETE: &str = "user:delete";
    pub const USER_UPDATE_PRIVILEGE: &str = "user:update_privilege";

    /// Every privilege, granted to the seeded administrator
    pub const ALL: [&str; 11] = [
        PRODUCT_CREATE,
        PRODUCT_UPDATE,
        TRANSACTION_CREATE,
        TRANSACTION_VIEW,
        SHIFT_CREATE,
        SHIFT_UPDATE,
        SHIFT_DELETE,
        USER_CREATE,
        USER_UPDATE,
        USER_DELETE,
        USER_UPDATE_PRIVILEGE,
    ];

    pub fn is_known(code: &str) -> bool {
        ALL.contains(&code)
    }
}

// ---------------------------------------------------------------------------
// Products and the ledger
// ---------------------------------------------------------------------------

/// A stocked product. `stock` is only ever changed under the product lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub unit: String,
    pub stock: i32,
    pub price: i64,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a product
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewProduct {
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub price: i64,
}

impl NewProduct {
    /// Required fields and non-negative numbers
    pub fn validate(&self) -> Result<(), SharedError> {
        if self.sku.trim().is_empty() {
            return Err(SharedError::validation("sku", "is required"));
        }
        if self.name.trim().is_empty() {
            return Err(SharedError::validation("name", "is required"));
        }
        if self.stock < 0 {
            return Err(SharedError::validation("stock", "cannot be negative"));
        }
        if self.price < 0 {
            return Err(SharedError::validation("price", "cannot be negative"));
        }
        Ok(())
    }
}

/// Partial update for a product; absent fields keep their value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductChanges {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub unit: Option<String>,
    pub stock: Option<i32>,
    pub price: Option<i64>,
}

impl ProductChanges {
    pub fn validate(&self) -> Result<(), SharedError> {
        if matches!(&self.sku, Some(sku) if sku.trim().is_empty()) {
            return Err(SharedError::validation("sku", "cannot be empty"));
        }
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(SharedError::validation("name", "cannot be empty"));
        }
        if matches!(self.stock, Some(stock) if stock < 0) {
            return Err(SharedError::validation("stock", "cannot be negative"));
        }
        if matches!(self.price, Some(price) if price < 0) {
            return Err(SharedError::validation("price", "cannot be negative"));
        }
        Ok(())
    }

    /// Apply onto `product`, stamping the audit fields
    pub fn apply(&self, product: &mut Product, actor: Uuid, now: DateTime<Utc>) {
        if let Some(sku) = &self.sku {
            product.sku = sku.clone();
        }
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(unit) = &self.unit {
            product.unit = unit.clone();
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        product.updated_by = Some(actor);
        product.updated_at = now;
    }
}

/// Direction of a stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::In => "IN",
            Self::Out => "OUT",
        }
    }

    /// Verb used in human-readable notifications
    pub fn verb(self) -> &'static str {
        match self {
            Self::In => "added",
            Self::Out => "removed",
        }
    }
}

impl FromStr for TransactionType {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" => Ok(Self::In),
            "OUT" => Ok(Self::Out),
            _ => Err(SharedError::validation("type", "must be IN or OUT")),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a transaction was settled.
///
/// `"0"` is a placeholder accepted until a payment gateway exists; an empty
/// string means the method was not given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PaymentMethod {
    Cash,
    Transfer,
    Placeholder,
    #[default]
    Unspecified,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "CASH",
            Self::Transfer => "TRANSFER",
            Self::Placeholder => "0",
            Self::Unspecified => "",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CASH" => Ok(Self::Cash),
            "TRANSFER" => Ok(Self::Transfer),
            "0" => Ok(Self::Placeholder),
            "" => Ok(Self::Unspecified),
            _ => Err(SharedError::validation(
                "payment_method",
                "invalid payment method: must be CASH, TRANSFER, or 0",
            )),
        }
    }
}

impl Serialize for PaymentMethod {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PaymentMethod {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// An immutable ledger entry. Never updated, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub product_id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub quantity: i32,
    /// Unit price times quantity at the moment of recording
    pub total_amount: i64,
    pub payment_method: PaymentMethod,
    pub note: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Signed effect on stock
    pub fn delta(&self) -> i64 {
        match self.kind {
            TransactionType::In => i64::from(self.quantity),
            TransactionType::Out => -i64::from(self.quantity),
        }
    }
}

/// Payload for recording a stock movement. `kind` and `payment_method` stay
/// raw so that the ledger reports them as validation failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionRequest {
    pub product_id: Uuid,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub quantity: i32,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub note: String,
}

/// Income and expense over a window plus the current stock valuation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FinancialSummary {
    pub income: i64,
    pub expense: i64,
    pub valuation: i64,
}

/// Financial figures as returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialStats {
    pub total_income: i64,
    pub total_expense: i64,
    pub total_valuation: i64,
    pub period_start: String,
    pub period_end: String,
}

/// Units moved in and out on one local day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyMovement {
    pub date: String,
    pub inbound: i64,
    pub outbound: i64,
}

/// `GET /dashboard/stock-movement` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub period: u32,
    pub data: Vec<DailyMovement>,
}

/// `GET /dashboard/stats` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryOverview {
    pub total_products: i64,
    pub low_stock_count: i64,
    pub total_valuation: i64,
}

/// Look-back window for financial stats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatsRange {
    #[default]
    SevenDays,
    OneMonth,
    ThreeMonths,
    SixMonths,
    TwelveMonths,
}

impl StatsRange {
    /// First day of the window ending on `today`
    pub fn start_from(self, today: NaiveDate) -> NaiveDate {
        let months = match self {
            Self::SevenDays => return today - chrono::Duration::days(7),
            Self::OneMonth => 1,
            Self::ThreeMonths => 3,
            Self::SixMonths => 6,
            Self::TwelveMonths => 12,
        };
        today
            .checked_sub_months(chrono::Months::new(months))
            .unwrap_or(NaiveDate::MIN)
    }
}

impl FromStr for StatsRange {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "7d" | "" => Ok(Self::SevenDays),
            "1m" => Ok(Self::OneMonth),
            "3m" => Ok(Self::ThreeMonths),
            "6m" => Ok(Self::SixMonths),
            "12m" | "1y" => Ok(Self::TwelveMonths),
            _ => Err(SharedError::validation("range", "must be one of 7d, 1m, 3m, 6m, 12m")),
        }
    }
}

// ---------------------------------------------------------------------------
// Users and sessions
// ---------------------------------------------------------------------------

/// A user record, including the session fields consulted on every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub role_code: Option<String>,
    pub is_active: bool,
    pub privileges: Vec<String>,
    /// Rotated on every login; only credentials carrying it validate
    pub token_version: String,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn has_privilege(&self, code: &str) -> bool {
        self.privileges.iter().any(|p| p == code)
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            role_code: self.role_code.clone(),
            is_active: self.is_active,
            last_seen_at: self.last_seen_at,
            privileges: self.privileges.clone(),
        }
    }
}

/// Fields for inserting a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub role_code: Option<String>,
    pub is_active: bool,
    pub privileges: Vec<String>,
}

/// Public view of a user (no credential material)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub role_code: Option<String>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_seen_at: Option<DateTime<Utc>>,
    pub privileges: Vec<String>,
}

fn validate_email(email: &str) -> Result<(), SharedError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(SharedError::validation("email", "must be a valid email address")),
    }
}

fn validate_password(field: &str, password: &str, min_len: usize) -> Result<(), SharedError> {
    if password.chars().count() < min_len {
        return Err(SharedError::validation(
            field,
            format!("must be at least {} characters", min_len),
        ));
    }
    Ok(())
}

fn validate_privileges(codes: &[String]) -> Result<(), SharedError> {
    match codes.iter().find(|code| !privileges::is_known(code)) {
        Some(unknown) => Err(SharedError::validation(
            "privileges",
            format!("unknown privilege '{}'", unknown),
        )),
        None => Ok(()),
    }
}

/// Payload for `POST /users`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub role_code: Option<String>,
    #[serde(default)]
    pub privileges: Vec<String>,
}

impl CreateUserRequest {
    pub fn validate(&self, min_password_len: usize) -> Result<(), SharedError> {
        validate_email(self.email.trim())?;
        validate_password("password", &self.password, min_password_len)?;
        if self.full_name.trim().is_empty() {
            return Err(SharedError::validation("full_name", "is required"));
        }
        validate_privileges(&self.privileges)
    }
}

/// Payload for `PUT /users/{id}`; absent fields keep their value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub role_code: Option<String>,
    pub is_active: Option<bool>,
}

impl UpdateUserRequest {
    pub fn validate(&self, min_password_len: usize) -> Result<(), SharedError> {
        if let Some(email) = &self.email {
            validate_email(email.trim())?;
        }
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            validate_password("password", password, min_password_len)?;
        }
        if self.full_name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(SharedError::validation("full_name", "cannot be empty"));
        }
        Ok(())
    }
}

/// Payload for `PUT /users/{id}/privileges`; replaces the whole set
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrivilegesRequest {
    #[serde(default)]
    pub privileges: Vec<String>,
}

/// Known codes only, deduplicated in first-seen order
pub fn normalize_privileges(requested: &[String]) -> Result<Vec<String>, SharedError> {
    validate_privileges(requested)?;
    let mut codes: Vec<String> = Vec::with_capacity(requested.len());
    for code in requested {
        if !codes.contains(code) {
            codes.push(code.clone());
        }
    }
    Ok(codes)
}

// ---------------------------------------------------------------------------
// Shifts
// ---------------------------------------------------------------------------

/// A shift assignment. Overnight and day-count are derived from the ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shift {
    pub id: Uuid,
    pub user_id: Uuid,
    pub times: TimeRange,
    pub dates: DateSpan,
    pub note: String,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shift {
    pub fn is_overnight(&self) -> bool {
        self.times.is_overnight()
    }

    pub fn total_days(&self) -> i32 {
        self.dates.total_days()
    }

    /// Same user, intersecting dates and overlapping wall-clock time
    pub fn collides_with(&self, times: &TimeRange, dates: &DateSpan) -> bool {
        self.dates.intersects(dates) && self.times.overlaps(times)
    }

    pub fn slot(&self) -> ShiftSlot {
        ShiftSlot {
            start_time: self.times.start(),
            end_time: self.times.end(),
            start_date: self.dates.start(),
            end_date: self.dates.end(),
        }
    }

    pub fn view(&self, user: Option<UserProfile>) -> ShiftView {
        ShiftView {
            id: self.id,
            user_id: self.user_id,
            user,
            start_time: self.times.start().to_string(),
            end_time: self.times.end().to_string(),
            start_date: self.dates.start().format(DATE_FORMAT).to_string(),
            end_date: self.dates.end().format(DATE_FORMAT).to_string(),
            is_overnight: self.is_overnight(),
            note: self.note.clone(),
            total_days: self.total_days(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            created_by: self.created_by,
            updated_by: self.updated_by,
        }
    }
}

/// Time and date ranges of a shift, used in conflict reports and messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftSlot {
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl fmt::Display for ShiftSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} - {}, {} to {}]",
            self.start_time,
            self.end_time,
            self.start_date.format(DATE_FORMAT),
            self.end_date.format(DATE_FORMAT)
        )
    }
}

/// Shift as returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftView {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user: Option<UserProfile>,
    pub start_time: String,
    pub end_time: String,
    pub start_date: String,
    pub end_date: String,
    pub is_overnight: bool,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub note: String,
    pub total_days: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

/// Payload for creating a shift; every field is validated by the scheduler
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateShiftRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub note: String,
}

/// Partial shift update; `user_id` reassigns the shift
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateShiftRequest {
    pub user_id: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub note: Option<String>,
}

/// Store-level filter for listing shifts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShiftFilter {
    pub user_id: Option<Uuid>,
    /// Only shifts whose date span intersects this one
    pub dates: Option<DateSpan>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_transaction_type_parse() {
        assert_eq!("IN".parse::<TransactionType>().unwrap(), TransactionType::In);
        assert_eq!("OUT".parse::<TransactionType>().unwrap(), TransactionType::Out);
        assert!("in".parse::<TransactionType>().is_err());
        assert!("".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_payment_method_sentinels() {
        for raw in ["CASH", "TRANSFER", "0", ""] {
            let method: PaymentMethod = raw.parse().unwrap();
            assert_eq!(method.as_str(), raw);
        }
        let err = "CARD".parse::<PaymentMethod>().unwrap_err();
        assert_eq!(err.field(), Some("payment_method"));
    }

    #[test]
    fn test_new_product_validation() {
        let mut product = NewProduct {
            sku: "SKU-1".into(),
            name: "Widget".into(),
            ..Default::default()
        };
        assert!(product.validate().is_ok());
        product.sku = "  ".into();
        assert_eq!(product.validate().unwrap_err().field(), Some("sku"));
    }

    #[test]
    fn test_product_changes_apply() {
        let now = Utc::now();
        let actor = Uuid::new_v4();
        let mut product = Product {
            id: Uuid::new_v4(),
            sku: "A".into(),
            name: "Old".into(),
            unit: "pcs".into(),
            stock: 3,
            price: 100,
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        };
        let changes = ProductChanges {
            name: Some("New".into()),
            stock: Some(9),
            ..Default::default()
        };
        changes.apply(&mut product, actor, now);
        assert_eq!(product.name, "New");
        assert_eq!(product.stock, 9);
        assert_eq!(product.sku, "A");
        assert_eq!(product.updated_by, Some(actor));
    }

    #[test]
    fn test_ledger_entry_serializes_type_field() {
        let entry = LedgerEntry {
            id: Uuid::nil(),
            product_id: Uuid::nil(),
            kind: TransactionType::Out,
            quantity: 2,
            total_amount: 500,
            payment_method: PaymentMethod::Placeholder,
            note: String::new(),
            created_by: Uuid::nil(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "OUT");
        assert_eq!(json["payment_method"], "0");
        assert_eq!(entry.delta(), -2);
    }

    #[test]
    fn test_stats_range_windows() {
        let today = NaiveDate::from_ymd_opt(2030, 3, 31).unwrap();
        assert_eq!(StatsRange::SevenDays.start_from(today), NaiveDate::from_ymd_opt(2030, 3, 24).unwrap());
        assert_eq!(StatsRange::OneMonth.start_from(today), NaiveDate::from_ymd_opt(2030, 2, 28).unwrap());
        assert!("2w".parse::<StatsRange>().is_err());
    }

    #[test]
    fn test_shift_slot_display() {
        let slot = ShiftSlot {
            start_time: "22:00".parse().unwrap(),
            end_time: "06:00".parse().unwrap(),
            start_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2030, 1, 3).unwrap(),
        };
        assert_eq!(slot.to_string(), "[22:00 - 06:00, 2030-01-01 to 2030-01-03]");
    }

    #[test]
    fn test_create_user_validation() {
        let valid = CreateUserRequest {
            email: "sam@example.com".to_string(),
            password: "secret1".to_string(),
            full_name: "Sam".to_string(),
            role_code: None,
            privileges: vec![privileges::TRANSACTION_VIEW.to_string()],
        };
        assert!(valid.validate(6).is_ok());

        let mut bad = valid.clone();
        bad.email = "sam".to_string();
        assert_matches!(bad.validate(6), Err(SharedError::ValidationError { field, .. }) if field == "email");

        let mut bad = valid.clone();
        bad.password = "short".to_string();
        assert_matches!(bad.validate(6), Err(SharedError::ValidationError { field, .. }) if field == "password");

        let mut bad = valid;
        bad.privileges.push("root:everything".to_string());
        assert_matches!(bad.validate(6), Err(SharedError::ValidationError { field, .. }) if field == "privileges");
    }

    #[test]
    fn test_normalize_privileges_dedupes_in_order() {
        let codes = vec![
            privileges::SHIFT_CREATE.to_string(),
            privileges::USER_CREATE.to_string(),
            privileges::SHIFT_CREATE.to_string(),
        ];
        assert_eq!(
            normalize_privileges(&codes).unwrap(),
            vec![privileges::SHIFT_CREATE.to_string(), privileges::USER_CREATE.to_string()]
        );
        assert!(normalize_privileges(&["nope".to_string()]).is_err());
    }
}
