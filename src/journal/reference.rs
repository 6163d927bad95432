//! Cross-checks of journal lines against the vouchers they settle
//!
//! Each check is a distinct failure mode surfacing as a user-facing error
//! naming the offending line or voucher. Nothing here retries: the operator
//! corrects the document and resubmits.

use bigdecimal::BigDecimal;
use std::collections::HashMap;

use crate::journal::entry::{JournalEntry, JournalLine};
use crate::traits::MasterData;
use crate::types::*;

/// Cumulative amount referenced against one voucher across all lines
#[derive(Debug, Clone)]
struct ReferenceTotal {
    total: BigDecimal,
    account: String,
}

/// Validates a journal entry's party assignments, advance flags and
/// external voucher references against master data
pub struct ReferenceValidator<'a, M: MasterData> {
    master: &'a M,
}

impl<'a, M: MasterData> ReferenceValidator<'a, M> {
    pub fn new(master: &'a M) -> Self {
        Self { master }
    }

    /// Run every reference-related check in order
    pub async fn validate(&self, entry: &JournalEntry, company: &Company) -> ReconcileResult<()> {
        self.validate_parties(entry).await?;
        self.validate_advance_flags(entry)?;
        self.validate_against_journal(entry).await?;

        let totals = self.collect_reference_totals(entry).await?;
        self.validate_orders(&totals, company).await?;
        self.validate_invoices(&totals).await?;
        Ok(())
    }

    /// Receivable/Payable accounts require a party; a party anywhere else
    /// is an error.
    async fn validate_parties(&self, entry: &JournalEntry) -> ReconcileResult<()> {
        for (idx, line) in entry.lines.iter().enumerate() {
            let account = self.require_account(&line.account).await?;
            match account.kind {
                AccountKind::Receivable | AccountKind::Payable => {
                    if line.party.is_none() {
                        return Err(ReconcileError::invalid_line(
                            idx + 1,
                            format!(
                                "party is required for receivable/payable account {}",
                                line.account
                            ),
                        ));
                    }
                }
                _ => {
                    if line.party.is_some() {
                        return Err(ReconcileError::invalid_line(
                            idx + 1,
                            "party is only applicable against receivable/payable accounts",
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// A payment against an order must be flagged as an advance, and an
    /// advance must move in the direction matching the party.
    fn validate_advance_flags(&self, entry: &JournalEntry) -> ReconcileResult<()> {
        let zero = BigDecimal::from(0);
        for (idx, line) in entry.lines.iter().enumerate() {
            if let Some(reference) = &line.reference {
                if reference.voucher_type.is_order() && !line.is_advance {
                    return Err(ReconcileError::invalid_line(
                        idx + 1,
                        "payment against an order must be marked as advance",
                    ));
                }
            }

            if line.is_advance {
                match line.party.as_ref().map(|p| p.party_type) {
                    Some(PartyType::Customer) if line.debit_in_account_currency > zero => {
                        return Err(ReconcileError::invalid_line(
                            idx + 1,
                            "advance against a customer must be a credit",
                        ));
                    }
                    Some(PartyType::Supplier) if line.credit_in_account_currency > zero => {
                        return Err(ReconcileError::invalid_line(
                            idx + 1,
                            "advance against a supplier must be a debit",
                        ));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Per-line invoice/order checks, accumulating the cumulative amount
    /// referenced against each voucher.
    async fn collect_reference_totals(
        &self,
        entry: &JournalEntry,
    ) -> ReconcileResult<HashMap<VoucherRef, ReferenceTotal>> {
        let zero = BigDecimal::from(0);
        let mut totals: HashMap<VoucherRef, ReferenceTotal> = HashMap::new();

        for (idx, line) in entry.lines.iter().enumerate() {
            let reference = match &line.reference {
                Some(r) if r.voucher_type.is_invoice() || r.voucher_type.is_order() => r,
                _ => continue,
            };

            // Sales documents are settled by credits, purchase documents by
            // debits; the opposite direction cannot be linked.
            if reference.voucher_type == VoucherType::SalesOrder
                && line.debit_in_account_currency > zero
            {
                return Err(ReconcileError::invalid_line(
                    idx + 1,
                    format!("debit entry cannot be linked with a {}", reference.voucher_type),
                ));
            }
            if reference.voucher_type == VoucherType::PurchaseOrder
                && line.credit_in_account_currency > zero
            {
                return Err(ReconcileError::invalid_line(
                    idx + 1,
                    format!("credit entry cannot be linked with a {}", reference.voucher_type),
                ));
            }

            let voucher = self
                .master
                .voucher(reference)
                .await?
                .ok_or_else(|| ReconcileError::VoucherNotFound(reference.clone()))?;

            // Party and account on the line must match the voucher.
            if reference.voucher_type.is_invoice() {
                if voucher.party != line.party
                    || voucher.party_account.as_deref() != Some(line.account.as_str())
                {
                    return Err(ReconcileError::invalid_line(
                        idx + 1,
                        format!("party / account does not match with {}", reference),
                    ));
                }
            } else if voucher.party != line.party {
                return Err(ReconcileError::invalid_line(
                    idx + 1,
                    format!("party does not match with {}", reference),
                ));
            }

            let amount = if reference.voucher_type.is_sales() {
                &line.credit_in_account_currency
            } else {
                &line.debit_in_account_currency
            };

            let slot = totals
                .entry(reference.clone())
                .or_insert_with(|| ReferenceTotal {
                    total: zero.clone(),
                    account: line.account.clone(),
                });
            slot.total += amount;
        }

        Ok(totals)
    }

    /// Order references: must be submitted, not fully billed, not stopped,
    /// and the referenced amount plus recorded advances must fit within the
    /// grand total.
    async fn validate_orders(
        &self,
        totals: &HashMap<VoucherRef, ReferenceTotal>,
        company: &Company,
    ) -> ReconcileResult<()> {
        for (reference, slot) in totals {
            if !reference.voucher_type.is_order() {
                continue;
            }

            let order = self
                .master
                .voucher(reference)
                .await?
                .ok_or_else(|| ReconcileError::VoucherNotFound(reference.clone()))?;

            if order.status != VoucherStatus::Submitted {
                return Err(ReconcileError::Validation(format!(
                    "{} is not submitted",
                    reference
                )));
            }
            if order.per_billed >= BigDecimal::from(100) {
                return Err(ReconcileError::Validation(format!(
                    "{} is fully billed",
                    reference
                )));
            }
            if order.stopped {
                return Err(ReconcileError::Validation(format!("{} is stopped", reference)));
            }

            let account = self.require_account(&slot.account).await?;
            let voucher_total = if account.currency == company.base_currency {
                &order.base_grand_total
            } else {
                &order.grand_total
            };

            if *voucher_total < &order.advance_paid + &slot.total {
                return Err(ReconcileError::Validation(format!(
                    "advance paid against {} cannot exceed its grand total {}",
                    reference, voucher_total
                )));
            }
        }
        Ok(())
    }

    /// Invoice references: must be submitted, and the cumulative referenced
    /// amount must not exceed the current outstanding amount.
    async fn validate_invoices(
        &self,
        totals: &HashMap<VoucherRef, ReferenceTotal>,
    ) -> ReconcileResult<()> {
        let zero = BigDecimal::from(0);
        for (reference, slot) in totals {
            if !reference.voucher_type.is_invoice() {
                continue;
            }

            let invoice = self
                .master
                .voucher(reference)
                .await?
                .ok_or_else(|| ReconcileError::VoucherNotFound(reference.clone()))?;

            if invoice.status != VoucherStatus::Submitted {
                return Err(ReconcileError::Validation(format!(
                    "{} is not submitted",
                    reference
                )));
            }
            if slot.total > zero && invoice.outstanding_amount < slot.total {
                return Err(ReconcileError::Validation(format!(
                    "payment against {} cannot exceed its outstanding amount {}",
                    reference, invoice.outstanding_amount
                )));
            }
        }
        Ok(())
    }

    /// Journal-to-journal links: the referenced journal must hold an
    /// opposite-direction amount on the same account with enough balance
    /// left unmatched.
    ///
    /// The available balance is read from committed matches at validation
    /// time; no lock is taken, so two concurrent posts referencing the same
    /// line can both pass this check.
    async fn validate_against_journal(&self, entry: &JournalEntry) -> ReconcileResult<()> {
        let zero = BigDecimal::from(0);
        for (idx, line) in entry.lines.iter().enumerate() {
            let reference = match &line.reference {
                Some(r) if r.voucher_type == VoucherType::JournalEntry => r,
                _ => continue,
            };

            let account = self.require_account(&line.account).await?;
            if account.root_type == RootType::Asset && line.debit_in_account_currency > zero {
                return Err(ReconcileError::invalid_line(
                    idx + 1,
                    format!(
                        "for {}, only credit lines can be linked against another journal entry",
                        line.account
                    ),
                ));
            }
            if account.root_type == RootType::Liability && line.credit_in_account_currency > zero {
                return Err(ReconcileError::invalid_line(
                    idx + 1,
                    format!(
                        "for {}, only debit lines can be linked against another journal entry",
                        line.account
                    ),
                ));
            }

            if reference.voucher_no == entry.id {
                return Err(ReconcileError::invalid_line(
                    idx + 1,
                    "cannot link a line against its own document",
                ));
            }

            let against = self
                .master
                .posted_journal(&reference.voucher_no)
                .await?
                .ok_or_else(|| ReconcileError::VoucherNotFound(reference.clone()))?;

            // Candidate lines: same account, no reference or an order
            // reference (invoice-settling lines are already spoken for).
            let candidates: Vec<&JournalLine> = against
                .lines
                .iter()
                .filter(|l| {
                    l.account == line.account
                        && l.reference
                            .as_ref()
                            .map(|r| r.voucher_type.is_order())
                            .unwrap_or(true)
                })
                .collect();

            if candidates.is_empty() {
                return Err(ReconcileError::Validation(format!(
                    "{} does not have account {} or is already matched against another voucher",
                    reference, line.account
                )));
            }

            let needs_debit = line.credit_in_account_currency > zero;
            let opposite_total: BigDecimal = candidates
                .iter()
                .map(|l| {
                    if needs_debit {
                        &l.debit_in_account_currency
                    } else {
                        &l.credit_in_account_currency
                    }
                })
                .sum();

            let matched = self
                .master
                .matched_amount_against_journal(&reference.voucher_no, &line.account)
                .await?;
            let available = &opposite_total - &matched;

            let own_amount = if needs_debit {
                &line.credit_in_account_currency
            } else {
                &line.debit_in_account_currency
            };

            if available <= zero || *own_amount > available {
                return Err(ReconcileError::Validation(format!(
                    "{} does not have sufficient unmatched {} amount against account {}",
                    reference,
                    if needs_debit { "debit" } else { "credit" },
                    line.account
                )));
            }
        }
        Ok(())
    }

    async fn require_account(&self, account_id: &str) -> ReconcileResult<Account> {
        self.master
            .account(account_id)
            .await?
            .ok_or_else(|| ReconcileError::AccountNotFound(account_id.to_string()))
    }
}
