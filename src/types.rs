//! Core types and data structures for the reconciliation engine

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Root classification of an account, governing debit/credit sign conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RootType {
    /// Assets - what the business owns (Cash, Bank, Receivables, etc.)
    Asset,
    /// Liabilities - what the business owes (Payables, Loans, etc.)
    Liability,
    /// Equity - owner's interest in the business
    Equity,
    /// Income/Revenue - money earned by the business
    Income,
    /// Expenses - costs incurred by the business
    Expense,
}

impl RootType {
    /// Signed net movement of a posting on this account.
    ///
    /// Asset and Income accounts move with debits; Liability, Expense and
    /// Equity accounts move with credits. The sign decides which side of a
    /// settlement the posting represents when deriving payment ledger rows.
    pub fn net_movement(&self, debit: &BigDecimal, credit: &BigDecimal) -> BigDecimal {
        match self {
            RootType::Asset | RootType::Income => debit - credit,
            RootType::Liability | RootType::Expense | RootType::Equity => credit - debit,
        }
    }
}

/// Functional classification of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountKind {
    Bank,
    Cash,
    /// Receivable accounts require a Customer party on journal lines
    Receivable,
    /// Payable accounts require a Supplier party on journal lines
    Payable,
    Other,
}

/// Account master data consumed from the master-data collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier for the account
    pub id: String,
    /// Human-readable account name
    pub name: String,
    /// Owning company
    pub company: String,
    /// Currency the account is denominated in
    pub currency: String,
    /// Functional classification (Bank, Receivable, etc.)
    pub kind: AccountKind,
    /// Root classification (Asset, Liability, etc.)
    pub root_type: RootType,
}

impl Account {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        company: impl Into<String>,
        currency: impl Into<String>,
        kind: AccountKind,
        root_type: RootType,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            company: company.into(),
            currency: currency.into(),
            kind,
            root_type,
        }
    }
}

/// Company master data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: String,
    /// Home-reporting currency; all summed totals convert to it
    pub base_currency: String,
    /// Decimal places used when rounding monetary amounts
    pub precision: i64,
}

impl Company {
    /// Create a company with the default 2-decimal currency precision
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        base_currency: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            base_currency: base_currency.into(),
            precision: 2,
        }
    }
}

/// Kind of party a receivable/payable line settles with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartyType {
    Customer,
    Supplier,
}

impl fmt::Display for PartyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartyType::Customer => write!(f, "Customer"),
            PartyType::Supplier => write!(f, "Supplier"),
        }
    }
}

/// A customer or supplier referenced by a journal line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Party {
    pub party_type: PartyType,
    pub name: String,
}

impl Party {
    pub fn customer(name: impl Into<String>) -> Self {
        Self {
            party_type: PartyType::Customer,
            name: name.into(),
        }
    }

    pub fn supplier(name: impl Into<String>) -> Self {
        Self {
            party_type: PartyType::Supplier,
            name: name.into(),
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.party_type, self.name)
    }
}

/// Recognized kinds of business documents a ledger line may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoucherType {
    SalesInvoice,
    PurchaseInvoice,
    SalesOrder,
    PurchaseOrder,
    JournalEntry,
}

impl VoucherType {
    pub fn is_invoice(&self) -> bool {
        matches!(self, VoucherType::SalesInvoice | VoucherType::PurchaseInvoice)
    }

    pub fn is_order(&self) -> bool {
        matches!(self, VoucherType::SalesOrder | VoucherType::PurchaseOrder)
    }

    /// Sales documents are settled by credits, purchase documents by debits
    pub fn is_sales(&self) -> bool {
        matches!(self, VoucherType::SalesInvoice | VoucherType::SalesOrder)
    }
}

impl fmt::Display for VoucherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VoucherType::SalesInvoice => "Sales Invoice",
            VoucherType::PurchaseInvoice => "Purchase Invoice",
            VoucherType::SalesOrder => "Sales Order",
            VoucherType::PurchaseOrder => "Purchase Order",
            VoucherType::JournalEntry => "Journal Entry",
        };
        write!(f, "{}", name)
    }
}

/// Reference to an external voucher (type + number)
///
/// A line either carries a full reference or none; a half-filled reference
/// is unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoucherRef {
    pub voucher_type: VoucherType,
    pub voucher_no: String,
}

impl VoucherRef {
    pub fn new(voucher_type: VoucherType, voucher_no: impl Into<String>) -> Self {
        Self {
            voucher_type,
            voucher_no: voucher_no.into(),
        }
    }
}

impl fmt::Display for VoucherRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.voucher_type, self.voucher_no)
    }
}

/// Posting status of a referenced voucher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoucherStatus {
    Draft,
    Submitted,
    Cancelled,
}

/// Collaborator-provided view of a referenced voucher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherSummary {
    pub status: VoucherStatus,
    /// Currency the voucher is denominated in
    pub currency: String,
    /// Exchange rate from the voucher currency to the company base currency
    pub conversion_rate: BigDecimal,
    /// Unsettled balance remaining, in the voucher currency
    pub outstanding_amount: BigDecimal,
    /// Grand total in the voucher currency
    pub grand_total: BigDecimal,
    /// Grand total in the company base currency
    pub base_grand_total: BigDecimal,
    /// Advance already recorded against the voucher (orders)
    pub advance_paid: BigDecimal,
    /// Percentage of the voucher already billed (orders)
    pub per_billed: BigDecimal,
    /// Whether the order has been stopped
    pub stopped: bool,
    /// Party the voucher belongs to
    pub party: Option<Party>,
    /// Receivable/payable account the voucher posts to (invoices)
    pub party_account: Option<String>,
}

/// Lifecycle state of a journal document
///
/// Draft documents mutate freely on validation; posted documents are
/// immutable and may only be reversed through cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocStatus {
    Draft,
    Posted,
    Cancelled,
}

/// A balanced general-ledger posting row handed to persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlPosting {
    pub account: String,
    pub party: Option<Party>,
    /// Label of the accounts/parties on the opposite side of the movement
    pub against_account: Option<String>,
    /// Debit in the company base currency
    pub debit: BigDecimal,
    /// Credit in the company base currency
    pub credit: BigDecimal,
    pub account_currency: String,
    pub debit_in_account_currency: BigDecimal,
    pub credit_in_account_currency: BigDecimal,
    /// The document this posting belongs to
    pub voucher: VoucherRef,
    /// The external voucher this posting settles, if any
    pub against_voucher: Option<VoucherRef>,
    pub cost_center: Option<String>,
    pub posting_date: NaiveDate,
}

/// Append-only payment ledger projection row
///
/// Rows are never mutated in place: cancellation marks the original as
/// cancelled and inserts a new row with the amount sign inverted, so the
/// full settlement history stays auditable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentLedgerEntry {
    pub id: String,
    pub posting_date: NaiveDate,
    /// The receiver-of-funds side of the settlement
    pub voucher: VoucherRef,
    /// The payer side of the settlement
    pub against_voucher: VoucherRef,
    /// Settled amount, negative on reversal rows
    pub amount: BigDecimal,
    pub is_cancelled: bool,
}

impl PaymentLedgerEntry {
    pub fn new(
        posting_date: NaiveDate,
        voucher: VoucherRef,
        against_voucher: VoucherRef,
        amount: BigDecimal,
        is_cancelled: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            posting_date,
            voucher,
            against_voucher,
            amount,
            is_cancelled,
        }
    }

    /// Whether this row carries the given 4-tuple settlement key
    pub fn matches_key(&self, voucher: &VoucherRef, against_voucher: &VoucherRef) -> bool {
        &self.voucher == voucher && &self.against_voucher == against_voucher
    }
}

/// An open voucher with outstanding balance, as listed by the collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutstandingVoucher {
    pub voucher: VoucherRef,
    pub posting_date: NaiveDate,
    /// Outstanding amount in the company base currency
    pub outstanding_amount: BigDecimal,
    /// Exchange rate from the voucher currency to the base currency
    pub conversion_rate: BigDecimal,
    pub currency: String,
    pub cost_center: Option<String>,
}

/// Errors that can occur in the reconciliation engine
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Mandatory field missing: {0}")]
    MandatoryFieldMissing(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Row {line}: {message}")]
    InvalidLine { line: usize, message: String },
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Company not found: {0}")]
    CompanyNotFound(String),
    #[error("{0} not found")]
    VoucherNotFound(VoucherRef),
}

impl ReconcileError {
    /// Business-rule violation on a specific line, with a 1-based row number
    pub fn invalid_line(line: usize, message: impl Into<String>) -> Self {
        ReconcileError::InvalidLine {
            line,
            message: message.into(),
        }
    }
}

/// Result type for reconciliation operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_movement_follows_root_type() {
        let debit = BigDecimal::from(100);
        let credit = BigDecimal::from(30);

        assert_eq!(
            RootType::Asset.net_movement(&debit, &credit),
            BigDecimal::from(70)
        );
        assert_eq!(
            RootType::Income.net_movement(&debit, &credit),
            BigDecimal::from(70)
        );
        assert_eq!(
            RootType::Liability.net_movement(&debit, &credit),
            BigDecimal::from(-70)
        );
        assert_eq!(
            RootType::Expense.net_movement(&debit, &credit),
            BigDecimal::from(-70)
        );
    }

    #[test]
    fn voucher_type_classification() {
        assert!(VoucherType::SalesInvoice.is_invoice());
        assert!(VoucherType::PurchaseOrder.is_order());
        assert!(VoucherType::SalesOrder.is_sales());
        assert!(!VoucherType::JournalEntry.is_invoice());
        assert!(!VoucherType::JournalEntry.is_order());
    }

    #[test]
    fn voucher_ref_display_identifies_document() {
        let r = VoucherRef::new(VoucherType::SalesInvoice, "INV-001");
        assert_eq!(r.to_string(), "Sales Invoice INV-001");
    }

    #[test]
    fn ledger_entry_key_match() {
        let v = VoucherRef::new(VoucherType::SalesInvoice, "INV-001");
        let a = VoucherRef::new(VoucherType::JournalEntry, "JV-001");
        let entry = PaymentLedgerEntry::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            v.clone(),
            a.clone(),
            BigDecimal::from(500),
            false,
        );
        assert!(entry.matches_key(&v, &a));
        assert!(!entry.matches_key(&a, &v));
    }
}
