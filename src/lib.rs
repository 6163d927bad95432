//! # Reconciliation Core
//!
//! A double-entry reconciliation engine providing multi-currency journal
//! validation, payment ledger projection, and outstanding-amount allocation.
//!
//! ## Features
//!
//! - **Exchange rate resolution**: A fixed cascade from references, realized
//!   bank balances, and spot quotes, never producing a zero rate
//! - **Entry balancing**: Per-line base-currency conversion with bankers'
//!   rounding, totals validation, and automatic balancing rows
//! - **Reference validation**: Invoices, orders, and journal-to-journal
//!   links checked for direction, status, and overdraw before posting
//! - **Payment ledger**: An append-only "who owes whom" projection derived
//!   from general-ledger postings, with auditable reversal
//! - **Allocation**: Greedy settlement of open debit vouchers against open
//!   credit vouchers across currencies
//! - **Storage abstraction**: Database-agnostic design with trait-based
//!   collaborators
//!
//! ## Quick Start
//!
//! ```rust
//! use reconciliation_core::{JournalEntryBuilder, JournalManager, MemoryStorage};
//! use bigdecimal::BigDecimal;
//! use chrono::NaiveDate;
//!
//! // This example shows basic usage - you need to implement the MasterData,
//! // RateSource and PaymentLedgerStorage traits for your backend.
//! // let storage = MemoryStorage::new();
//! // let mut manager = JournalManager::new(storage.clone(), storage.clone(), storage);
//! ```

pub mod allocation;
pub mod journal;
pub mod payment_ledger;
pub mod rates;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use allocation::*;
pub use journal::*;
pub use rates::*;
pub use traits::*;
pub use types::*;
pub use utils::memory_storage::MemoryStorage;
pub use utils::rounding::round_to;
