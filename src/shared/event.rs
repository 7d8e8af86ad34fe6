/**
 * Real-time Event System
 *
 * Wire payloads pushed to WebSocket clients. Every frame is one JSON object
 * whose `type` field selects the variant:
 *
 * - `stock_update` - a product was created or updated, or stock moved
 * - `financial_update` - aggregate figures changed, clients should re-fetch
 * - `shift_notification` - targeted at the users a shift change affects
 * - `user_status_update` - presence, broadcast on heartbeat
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::SharedError;
use crate::shared::models::{LedgerEntry, Product, ShiftView, UserProfile};

/// A real-time event as sent over the socket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    StockUpdate(StockUpdate),
    FinancialUpdate {
        message: String,
    },
    ShiftNotification(ShiftNotification),
    UserStatusUpdate {
        user_id: Uuid,
        status: String,
        last_seen_at: DateTime<Utc>,
    },
}

impl RealtimeEvent {
    /// Signal that financial stats changed after a ledger write
    pub fn financial_changed() -> Self {
        Self::FinancialUpdate {
            message: "Financial stats updated due to new transaction".to_string(),
        }
    }

    /// Presence update sent on heartbeat
    pub fn user_online(user_id: Uuid, last_seen_at: DateTime<Utc>) -> Self {
        Self::UserStatusUpdate {
            user_id,
            status: "online".to_string(),
            last_seen_at,
        }
    }

    /// Serialize to the text frame sent to clients
    pub fn to_json(&self) -> Result<String, SharedError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The `type` tag, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StockUpdate(_) => "stock_update",
            Self::FinancialUpdate { .. } => "financial_update",
            Self::ShiftNotification(_) => "shift_notification",
            Self::UserStatusUpdate { .. } => "user_status_update",
        }
    }
}

/// Who performed a mutation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActorInfo {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StockAction {
    ProductCreated,
    ProductUpdated,
    TransactionCreated,
}

/// Product fields carried by `stock_update`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub price: i64,
    /// Present on create
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub stock: Option<i32>,
    /// Present on update, for client-side diffing
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub old_stock: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub new_stock: Option<i32>,
}

impl ProductSnapshot {
    pub fn created(product: &Product) -> Self {
        Self {
            id: product.id,
            sku: product.sku.clone(),
            name: product.name.clone(),
            price: product.price,
            stock: Some(product.stock),
            old_stock: None,
            new_stock: None,
        }
    }

    pub fn updated(product: &Product, old_stock: i32) -> Self {
        Self {
            id: product.id,
            sku: product.sku.clone(),
            name: product.name.clone(),
            price: product.price,
            stock: None,
            old_stock: Some(old_stock),
            new_stock: Some(product.stock),
        }
    }
}

/// Product reference nested in a transaction snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductRef {
    pub name: String,
    pub sku: String,
}

/// Ledger fields carried by `stock_update`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionSnapshot {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub quantity: i32,
    pub total_amount: i64,
    pub payment_method: String,
    pub product_id: Uuid,
    pub product: ProductRef,
    pub new_stock: i32,
}

impl TransactionSnapshot {
    pub fn new(entry: &LedgerEntry, product: &Product) -> Self {
        Self {
            id: entry.id,
            kind: entry.kind.as_str().to_string(),
            quantity: entry.quantity,
            total_amount: entry.total_amount,
            payment_method: entry.payment_method.as_str().to_string(),
            product_id: product.id,
            product: ProductRef {
                name: product.name.clone(),
                sku: product.sku.clone(),
            },
            new_stock: product.stock,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockUpdate {
    pub action: StockAction,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub product: Option<ProductSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transaction: Option<TransactionSnapshot>,
    pub user: ActorInfo,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShiftAction {
    ShiftCreated,
    ShiftUpdated,
    ShiftCancelled,
    ShiftReassignedFrom,
    ShiftReassignedTo,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShiftNotification {
    pub action: ShiftAction,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub shift: Option<ShiftView>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub new_assignee: Option<UserProfile>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub previous_assignee: Option<UserProfile>,
}
