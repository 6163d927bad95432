//! Payment ledger projection
//!
//! Derives simplified "who owes whom, on what reference" rows from raw
//! general-ledger postings. The projection is append-only: reversal marks
//! the live rows cancelled and inserts mirrored rows with inverted amounts,
//! so the settlement history stays fully auditable.

use bigdecimal::BigDecimal;

use crate::traits::{MasterData, PaymentLedgerStorage};
use crate::types::*;

/// Derive payment ledger rows from a batch of general-ledger postings.
///
/// Only postings referencing an external voucher different from their own
/// document are settlements; self-referencing and unreferenced postings are
/// excluded. Entries are oriented from the receiver of funds toward the
/// payer: if the account's net movement is positive, the referenced voucher
/// becomes the primary side, otherwise the roles invert.
pub async fn derive_entries<M: MasterData>(
    master: &M,
    postings: &[GlPosting],
    cancel: bool,
) -> ReconcileResult<Vec<PaymentLedgerEntry>> {
    let mut entries = Vec::new();

    for posting in postings {
        let against_voucher = match &posting.against_voucher {
            Some(against) if *against != posting.voucher => against,
            _ => continue,
        };

        let account = master
            .account(&posting.account)
            .await?
            .ok_or_else(|| ReconcileError::AccountNotFound(posting.account.clone()))?;

        let mut amount = (&posting.debit - &posting.credit).abs();
        if cancel {
            amount = -amount;
        }

        let net_movement = account
            .root_type
            .net_movement(&posting.debit, &posting.credit);

        let (voucher, against) = if net_movement > BigDecimal::from(0) {
            (against_voucher.clone(), posting.voucher.clone())
        } else {
            (posting.voucher.clone(), against_voucher.clone())
        };

        entries.push(PaymentLedgerEntry::new(
            posting.posting_date,
            voucher,
            against,
            amount,
            cancel,
        ));
    }

    Ok(entries)
}

/// Persist derived rows.
///
/// On cancellation the live rows carrying each entry's 4-tuple key are
/// marked cancelled before the inverted row is appended; nothing is ever
/// deleted or edited in place.
pub async fn save_entries<P: PaymentLedgerStorage>(
    store: &mut P,
    entries: &[PaymentLedgerEntry],
    cancel: bool,
) -> ReconcileResult<()> {
    for entry in entries {
        if cancel {
            store
                .mark_cancelled(&entry.voucher, &entry.against_voucher)
                .await?;
        }
        store.insert(entry).await?;
    }
    Ok(())
}

/// Total non-cancelled amount settled against a voucher.
///
/// For invoice vouchers the amount the voucher itself has forwarded onward
/// as a primary is subtracted, so a voucher that is both payer and receiver
/// in a chain is not double counted.
pub async fn amount_against_voucher<P: PaymentLedgerStorage>(
    store: &P,
    voucher: &VoucherRef,
) -> ReconcileResult<BigDecimal> {
    let mut amount = store.amount_against(voucher).await?;
    if voucher.voucher_type.is_invoice() {
        amount -= store.amount_forwarded(voucher).await?;
    }
    Ok(amount)
}

/// All live payments settling a voucher
pub async fn active_payments<P: PaymentLedgerStorage>(
    store: &P,
    voucher: &VoucherRef,
) -> ReconcileResult<Vec<PaymentLedgerEntry>> {
    store.entries_against(voucher).await
}
