//! Inventory Module
//!
//! Products, stock movements and the financial figures derived from them.
//!
//! - **`ledger`** - [`StockLedger`], the locked stock mutation path
//! - **`handlers`** - HTTP handlers for products, transactions and stats

pub mod ledger;

pub mod handlers;

pub use ledger::StockLedger;
