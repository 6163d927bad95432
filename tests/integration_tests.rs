//! Integration tests for reconciliation-core

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use reconciliation_core::{
    payment_ledger, Account, AccountKind, AdjustmentEntry, AdjustmentType, Company, DocStatus,
    JournalEntryBuilder, JournalLine, JournalManager, MemoryStorage, OutstandingVoucher, Party,
    RootType, VoucherRef, VoucherStatus, VoucherSummary, VoucherType,
};
use std::str::FromStr;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
}

fn storage() -> MemoryStorage {
    let storage = MemoryStorage::new();
    storage.add_company(Company::new("co", "Test Co", "INR"));
    storage.add_account(Account::new(
        "cash",
        "Cash",
        "co",
        "INR",
        AccountKind::Cash,
        RootType::Asset,
    ));
    storage.add_account(Account::new(
        "sales",
        "Sales",
        "co",
        "INR",
        AccountKind::Other,
        RootType::Income,
    ));
    storage.add_account(Account::new(
        "debtors",
        "Debtors",
        "co",
        "INR",
        AccountKind::Receivable,
        RootType::Asset,
    ));
    storage.add_account(Account::new(
        "bank-usd",
        "Bank USD",
        "co",
        "USD",
        AccountKind::Bank,
        RootType::Asset,
    ));
    storage
}

fn manager(storage: &MemoryStorage) -> JournalManager<MemoryStorage, MemoryStorage, MemoryStorage> {
    JournalManager::new(storage.clone(), storage.clone(), storage.clone())
}

fn voucher_summary(outstanding: i64) -> VoucherSummary {
    VoucherSummary {
        status: VoucherStatus::Submitted,
        currency: "INR".to_string(),
        conversion_rate: BigDecimal::from(1),
        outstanding_amount: BigDecimal::from(outstanding),
        grand_total: BigDecimal::from(outstanding),
        base_grand_total: BigDecimal::from(outstanding),
        advance_paid: BigDecimal::from(0),
        per_billed: BigDecimal::from(0),
        stopped: false,
        party: Some(Party::customer("Acme")),
        party_account: Some("debtors".to_string()),
    }
}

#[tokio::test]
async fn test_complete_posting_and_cancellation_workflow() {
    let storage = storage();
    let invoice = VoucherRef::new(VoucherType::SalesInvoice, "INV-1");
    storage.add_voucher(invoice.clone(), voucher_summary(1000));
    let mut manager = manager(&storage);

    // A customer pays 600 of a 1000 invoice.
    let mut entry = JournalEntryBuilder::new("JV-1", "co", date())
        .debit("cash", BigDecimal::from(600))
        .line(
            JournalLine::credit("debtors", BigDecimal::from(600))
                .with_party(Party::customer("Acme"))
                .with_reference(invoice.clone()),
        )
        .build();

    let postings = manager.post(&mut entry).await.unwrap();
    assert_eq!(entry.status, DocStatus::Posted);
    assert_eq!(postings.len(), 2);
    assert_eq!(postings[1].against_voucher, Some(invoice.clone()));

    // The receivable was credited, so the payment ledger orients the
    // settlement from the journal toward the invoice.
    let settled = payment_ledger::amount_against_voucher(manager.payment_ledger(), &invoice)
        .await
        .unwrap();
    assert_eq!(settled, BigDecimal::from_str("600.00").unwrap());

    // Cancellation reverses the projection without rewriting history.
    manager.cancel(&mut entry).await.unwrap();
    assert_eq!(entry.status, DocStatus::Cancelled);

    let rows = storage.ledger_entries();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.is_cancelled));

    let net: BigDecimal = rows.iter().map(|row| &row.amount).sum();
    assert_eq!(net, BigDecimal::from(0));

    let settled = payment_ledger::amount_against_voucher(manager.payment_ledger(), &invoice)
        .await
        .unwrap();
    assert_eq!(settled, BigDecimal::from(0));
}

#[tokio::test]
async fn test_imbalanced_entry_is_rejected_with_difference() {
    let storage = storage();
    let mut manager = manager(&storage);

    let mut entry = JournalEntryBuilder::new("JV-2", "co", date())
        .debit("cash", BigDecimal::from(1000))
        .credit("sales", BigDecimal::from(700))
        .build();

    let err = manager.post(&mut entry).await.unwrap_err();
    assert!(err.to_string().contains("difference"), "got: {err}");
    assert_eq!(entry.status, DocStatus::Draft);
    assert_eq!(entry.difference, BigDecimal::from_str("300.00").unwrap());

    // Nothing was projected for the rejected entry.
    assert!(storage.ledger_entries().is_empty());
}

#[tokio::test]
async fn test_base_currency_lines_always_get_rate_one() {
    let storage = storage();
    let mut manager = manager(&storage);

    let mut entry = JournalEntryBuilder::new("JV-3", "co", date())
        .line(
            JournalLine::debit("cash", BigDecimal::from(500))
                .with_exchange_rate(BigDecimal::from_str("82.5").unwrap()),
        )
        .credit("sales", BigDecimal::from(500))
        .build();

    manager.post(&mut entry).await.unwrap();
    assert_eq!(entry.lines[0].exchange_rate, BigDecimal::from(1));
    assert_eq!(entry.lines[1].exchange_rate, BigDecimal::from(1));
    assert_eq!(entry.total_debit, BigDecimal::from_str("500.00").unwrap());
}

#[tokio::test]
async fn test_multi_currency_posting_converts_with_spot_rate() {
    let storage = storage();
    storage.set_spot_rate("USD", "INR", BigDecimal::from(80));
    let mut manager = manager(&storage);

    let mut entry = JournalEntryBuilder::new("JV-4", "co", date())
        .multi_currency()
        .debit("bank-usd", BigDecimal::from(100))
        .credit("sales", BigDecimal::from(8000))
        .build();

    let postings = manager.post(&mut entry).await.unwrap();
    assert_eq!(entry.lines[0].exchange_rate, BigDecimal::from(80));
    assert_eq!(entry.total_debit, BigDecimal::from_str("8000.00").unwrap());
    assert_eq!(entry.total_credit, BigDecimal::from_str("8000.00").unwrap());

    // The base-currency amounts carry into the postings; the account
    // currency amounts stay in USD.
    assert_eq!(postings[0].debit, BigDecimal::from_str("8000.00").unwrap());
    assert_eq!(
        postings[0].debit_in_account_currency,
        BigDecimal::from(100)
    );
}

#[tokio::test]
async fn test_advance_against_order_updates_advance_paid() {
    let storage = storage();
    let order = VoucherRef::new(VoucherType::SalesOrder, "SO-1");
    storage.add_voucher(order.clone(), voucher_summary(5000));
    let mut manager = manager(&storage);

    let mut entry = JournalEntryBuilder::new("JV-5", "co", date())
        .debit("cash", BigDecimal::from(1500))
        .line(
            JournalLine::credit("debtors", BigDecimal::from(1500))
                .with_party(Party::customer("Acme"))
                .with_reference(order.clone())
                .as_advance(),
        )
        .build();

    manager.post(&mut entry).await.unwrap();
    assert_eq!(storage.advance_updates(), vec![order]);
}

#[tokio::test]
async fn test_fully_billed_order_cannot_take_advances() {
    let storage = storage();
    let order = VoucherRef::new(VoucherType::SalesOrder, "SO-2");
    let mut summary = voucher_summary(5000);
    summary.per_billed = BigDecimal::from(100);
    storage.add_voucher(order.clone(), summary);
    let mut manager = manager(&storage);

    let mut entry = JournalEntryBuilder::new("JV-6", "co", date())
        .debit("cash", BigDecimal::from(1500))
        .line(
            JournalLine::credit("debtors", BigDecimal::from(1500))
                .with_party(Party::customer("Acme"))
                .with_reference(order)
                .as_advance(),
        )
        .build();

    let err = manager.post(&mut entry).await.unwrap_err();
    assert!(err.to_string().contains("fully billed"), "got: {err}");
    assert_eq!(entry.status, DocStatus::Draft);
}

#[tokio::test]
async fn test_overdrawn_invoice_reference_is_rejected() {
    let storage = storage();
    let invoice = VoucherRef::new(VoucherType::SalesInvoice, "INV-2");
    storage.add_voucher(invoice.clone(), voucher_summary(300));
    let mut manager = manager(&storage);

    let mut entry = JournalEntryBuilder::new("JV-7", "co", date())
        .debit("cash", BigDecimal::from(500))
        .line(
            JournalLine::credit("debtors", BigDecimal::from(500))
                .with_party(Party::customer("Acme"))
                .with_reference(invoice),
        )
        .build();

    let err = manager.post(&mut entry).await.unwrap_err();
    assert!(err.to_string().contains("outstanding amount"), "got: {err}");
}

fn outstanding(voucher_type: VoucherType, no: &str, amount: i64) -> OutstandingVoucher {
    OutstandingVoucher {
        voucher: VoucherRef::new(voucher_type, no),
        posting_date: date(),
        outstanding_amount: BigDecimal::from(amount),
        conversion_rate: BigDecimal::from(1),
        currency: "INR".to_string(),
        cost_center: None,
    }
}

fn allocation_storage() -> MemoryStorage {
    let storage = MemoryStorage::new();
    storage.add_company(Company::new("co", "Test Co", "INR"));
    storage.set_party_account(Party::customer("Acme"), "co", "debtors");
    storage.set_party_account(Party::supplier("Mega Corp"), "co", "creditors");
    storage.add_outstanding_voucher(
        Party::customer("Acme"),
        "debtors",
        outstanding(VoucherType::SalesInvoice, "INV-10", 700),
    );
    storage.add_outstanding_voucher(
        Party::customer("Acme"),
        "debtors",
        outstanding(VoucherType::SalesInvoice, "INV-11", 300),
    );
    storage.add_outstanding_voucher(
        Party::supplier("Mega Corp"),
        "creditors",
        outstanding(VoucherType::PurchaseInvoice, "PINV-10", 500),
    );
    storage
}

#[tokio::test]
async fn test_allocation_settles_across_both_sides() {
    let storage = allocation_storage();
    let mut adjustment = AdjustmentEntry::new("co", AdjustmentType::SalesAndPurchase, "INR")
        .with_customer("Acme")
        .with_supplier("Mega Corp");

    adjustment
        .fetch_unreconciled(&storage, &storage)
        .await
        .unwrap();
    assert_eq!(adjustment.debit_entries.len(), 2);
    assert_eq!(adjustment.credit_entries.len(), 1);

    adjustment.allocate_amount_to_references();

    // The 500 credit pool exhausts against the first open invoice.
    assert_eq!(
        adjustment.debit_entries[0].allocated_amount,
        BigDecimal::from(500)
    );
    assert_eq!(
        adjustment.debit_entries[1].allocated_amount,
        BigDecimal::from(0)
    );
    assert_eq!(
        adjustment.credit_entries[0].allocated_amount,
        BigDecimal::from(500)
    );
    assert_eq!(adjustment.debit_entries[0].balance, BigDecimal::from(200));
    assert_eq!(adjustment.debit_entries[1].balance, BigDecimal::from(300));
    assert_eq!(adjustment.credit_entries[0].balance, BigDecimal::from(0));
}

#[tokio::test]
async fn test_allocation_flag_off_leaves_everything_unallocated() {
    let storage = allocation_storage();
    let mut adjustment = AdjustmentEntry::new("co", AdjustmentType::SalesAndPurchase, "INR")
        .with_customer("Acme")
        .with_supplier("Mega Corp");
    adjustment.allocate_payment_amount = false;

    adjustment
        .fetch_unreconciled(&storage, &storage)
        .await
        .unwrap();
    adjustment.allocate_amount_to_references();

    for entry in adjustment
        .debit_entries
        .iter()
        .chain(adjustment.credit_entries.iter())
    {
        assert_eq!(entry.allocated_amount, BigDecimal::from(0));
        assert_eq!(entry.balance, entry.voucher_payment_amount);
    }
}

#[tokio::test]
async fn test_allocation_requires_parties_for_type() {
    let storage = allocation_storage();
    let mut adjustment =
        AdjustmentEntry::new("co", AdjustmentType::SalesAndPurchase, "INR").with_customer("Acme");

    let err = adjustment
        .fetch_unreconciled(&storage, &storage)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("supplier"), "got: {err}");
}

#[tokio::test]
async fn test_foreign_currency_allocation_converts_to_payment_currency() {
    let storage = MemoryStorage::new();
    storage.add_company(Company::new("co", "Test Co", "INR"));
    storage.set_party_account(Party::customer("Acme"), "co", "debtors");
    storage.set_party_account(Party::supplier("Mega Corp"), "co", "creditors");
    storage.set_spot_rate("USD", "INR", BigDecimal::from(80));

    // 8000 INR outstanding booked at 80 INR/USD: 100 USD.
    let mut usd_invoice = outstanding(VoucherType::SalesInvoice, "INV-20", 8000);
    usd_invoice.currency = "USD".to_string();
    usd_invoice.conversion_rate = BigDecimal::from(80);
    storage.add_outstanding_voucher(Party::customer("Acme"), "debtors", usd_invoice);
    storage.add_outstanding_voucher(
        Party::supplier("Mega Corp"),
        "creditors",
        outstanding(VoucherType::PurchaseInvoice, "PINV-20", 4000),
    );

    let mut adjustment = AdjustmentEntry::new("co", AdjustmentType::SalesAndPurchase, "INR")
        .with_customer("Acme")
        .with_supplier("Mega Corp");
    adjustment
        .fetch_unreconciled(&storage, &storage)
        .await
        .unwrap();

    let usd = &adjustment.debit_entries[0];
    assert_eq!(usd.voucher_amount, BigDecimal::from(100));
    assert_eq!(usd.payment_exchange_rate, BigDecimal::from(80));
    assert_eq!(usd.voucher_payment_amount, BigDecimal::from(8000));

    adjustment.allocate_amount_to_references();
    assert_eq!(
        adjustment.debit_entries[0].allocated_amount,
        BigDecimal::from(4000)
    );
    assert_eq!(adjustment.debit_entries[0].balance, BigDecimal::from(4000));
}
