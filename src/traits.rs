//! Traits for collaborator abstraction
//!
//! The engine performs no persistence, permission checking or master-data
//! management of its own. Everything it needs from the surrounding
//! application is consumed through these traits, so any backend
//! (PostgreSQL, MySQL, in-memory, etc.) can host it.

use async_trait::async_trait;
use bigdecimal::BigDecimal;

use crate::journal::JournalEntry;
use crate::types::*;

/// Master-data and document lookup for the reconciliation engine
#[async_trait]
pub trait MasterData: Send + Sync {
    /// Get account master data by ID
    async fn account(&self, account_id: &str) -> ReconcileResult<Option<Account>>;

    /// Get company master data by ID
    async fn company(&self, company_id: &str) -> ReconcileResult<Option<Company>>;

    /// Get the summary of a referenced voucher
    async fn voucher(&self, reference: &VoucherRef) -> ReconcileResult<Option<VoucherSummary>>;

    /// Current balance of an account, in the account currency or the
    /// company base currency
    async fn account_balance(
        &self,
        account_id: &str,
        in_account_currency: bool,
    ) -> ReconcileResult<BigDecimal>;

    /// Current balance of a party across its receivable/payable accounts
    async fn party_balance(&self, party: &Party) -> ReconcileResult<BigDecimal>;

    /// The receivable/payable account a party posts to for a company
    async fn party_account(&self, party: &Party, company_id: &str)
        -> ReconcileResult<Option<String>>;

    /// A posted journal document, for journal-to-journal reference checks
    async fn posted_journal(&self, journal_id: &str) -> ReconcileResult<Option<JournalEntry>>;

    /// Amount other posted documents have already matched against the given
    /// journal's lines on the given account, in the account currency
    async fn matched_amount_against_journal(
        &self,
        journal_id: &str,
        account_id: &str,
    ) -> ReconcileResult<BigDecimal>;

    /// Open vouchers with outstanding balance for a party account
    async fn outstanding_vouchers(
        &self,
        party: &Party,
        account_id: &str,
    ) -> ReconcileResult<Vec<OutstandingVoucher>>;

    /// Refresh the advance-paid aggregate on a referenced order after a
    /// posting or cancellation. A failure here must abort the whole
    /// operation; the caller never swallows it.
    async fn update_advance_paid(&mut self, voucher: &VoucherRef) -> ReconcileResult<()>;
}

/// Spot exchange rate lookup by currency pair
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Spot rate from one currency to another, if a quote exists
    async fn spot_rate(
        &self,
        from_currency: &str,
        to_currency: &str,
    ) -> ReconcileResult<Option<BigDecimal>>;
}

/// Storage for the append-only payment ledger projection
#[async_trait]
pub trait PaymentLedgerStorage: Send + Sync {
    /// Append a projection row
    async fn insert(&mut self, entry: &PaymentLedgerEntry) -> ReconcileResult<()>;

    /// Mark the live rows carrying the given 4-tuple key as cancelled.
    /// Already-cancelled rows are left untouched.
    async fn mark_cancelled(
        &mut self,
        voucher: &VoucherRef,
        against_voucher: &VoucherRef,
    ) -> ReconcileResult<()>;

    /// Sum of non-cancelled amounts settling the given voucher
    async fn amount_against(&self, voucher: &VoucherRef) -> ReconcileResult<BigDecimal>;

    /// Sum of non-cancelled amounts the voucher has forwarded onward as the
    /// primary side of other settlements
    async fn amount_forwarded(&self, voucher: &VoucherRef) -> ReconcileResult<BigDecimal>;

    /// All live (non-cancelled) entries settling the given voucher
    async fn entries_against(
        &self,
        voucher: &VoucherRef,
    ) -> ReconcileResult<Vec<PaymentLedgerEntry>>;
}
