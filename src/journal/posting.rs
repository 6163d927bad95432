//! Journal posting pipeline
//!
//! Orchestrates the fixed, ordered validation pass on a draft entry, turns
//! it into balanced general-ledger postings, projects payment ledger rows,
//! and writes back advance aggregates. Validation, posting and cancellation
//! all run synchronously inside the caller's commit boundary.

use bigdecimal::BigDecimal;

use crate::journal::entry::JournalEntry;
use crate::journal::reference::ReferenceValidator;
use crate::payment_ledger;
use crate::rates::RateResolver;
use crate::traits::{MasterData, PaymentLedgerStorage, RateSource};
use crate::types::*;

/// Coordinates validation, posting and cancellation of journal entries
pub struct JournalManager<M, R, P>
where
    M: MasterData,
    R: RateSource,
    P: PaymentLedgerStorage,
{
    master: M,
    rates: R,
    ledger: P,
}

impl<M, R, P> JournalManager<M, R, P>
where
    M: MasterData,
    R: RateSource,
    P: PaymentLedgerStorage,
{
    pub fn new(master: M, rates: R, ledger: P) -> Self {
        Self {
            master,
            rates,
            ledger,
        }
    }

    /// Run the full validation pass on a draft entry.
    ///
    /// Mutates the entry the way a save does: stamps account currencies and
    /// exchange rates, converts amounts to the base currency, recomputes
    /// totals, labels against-accounts and informational balances. The
    /// ordered checks reject the entry on the first violation.
    pub async fn validate(&self, entry: &mut JournalEntry) -> ReconcileResult<()> {
        if entry.status != DocStatus::Draft {
            return Err(ReconcileError::Validation(format!(
                "posted entry {} is immutable",
                entry.id
            )));
        }
        if entry.lines.is_empty() {
            return Err(ReconcileError::MandatoryFieldMissing(
                "lines cannot be empty".to_string(),
            ));
        }

        let company = self
            .master
            .company(&entry.company)
            .await?
            .ok_or_else(|| ReconcileError::CompanyNotFound(entry.company.clone()))?;

        self.resolve_currencies_and_rates(entry, &company).await?;
        entry.set_amounts_in_base_currency(company.precision);
        entry.validate_totals(company.precision)?;

        ReferenceValidator::new(&self.master)
            .validate(entry, &company)
            .await?;

        entry.set_against_accounts();
        self.stamp_balances(entry).await?;
        Ok(())
    }

    /// Validate and post a draft entry, returning the general-ledger
    /// postings and persisting the derived payment ledger rows.
    ///
    /// Advance-paid write-backs run after the core validation succeeds; a
    /// write-back failure aborts the posting rather than leaving a
    /// structurally invalid document posted.
    pub async fn post(&mut self, entry: &mut JournalEntry) -> ReconcileResult<Vec<GlPosting>> {
        self.validate(entry).await?;

        let postings = build_gl_postings(entry);
        let derived = payment_ledger::derive_entries(&self.master, &postings, false).await?;
        payment_ledger::save_entries(&mut self.ledger, &derived, false).await?;

        self.write_back_advances(entry).await?;
        entry.transition_to_posted()?;
        Ok(postings)
    }

    /// Cancel a posted entry by reversing its payment ledger projection.
    ///
    /// History is never rewritten: the live projection rows are marked
    /// cancelled and mirrored with inverted amounts.
    pub async fn cancel(&mut self, entry: &mut JournalEntry) -> ReconcileResult<()> {
        if entry.status != DocStatus::Posted {
            return Err(ReconcileError::Validation(format!(
                "only posted entries can be cancelled, {} is {:?}",
                entry.id, entry.status
            )));
        }

        let postings = build_gl_postings(entry);
        let derived = payment_ledger::derive_entries(&self.master, &postings, true).await?;
        payment_ledger::save_entries(&mut self.ledger, &derived, true).await?;

        self.write_back_advances(entry).await?;
        entry.transition_to_cancelled()?;
        Ok(())
    }

    pub fn master(&self) -> &M {
        &self.master
    }

    pub fn payment_ledger(&self) -> &P {
        &self.ledger
    }

    /// Stamp each line with its account currency and resolved exchange
    /// rate, enforcing the multi-currency flag.
    async fn resolve_currencies_and_rates(
        &self,
        entry: &mut JournalEntry,
        company: &Company,
    ) -> ReconcileResult<()> {
        let zero = BigDecimal::from(0);
        let one = BigDecimal::from(1);
        let resolver = RateResolver::new(&self.master, &self.rates);
        let mut foreign_currency = false;

        for (idx, line) in entry.lines.iter_mut().enumerate() {
            let account = self
                .master
                .account(&line.account)
                .await?
                .ok_or_else(|| ReconcileError::AccountNotFound(line.account.clone()))?;
            line.account_currency = account.currency.clone();

            if line.account_currency != company.base_currency {
                foreign_currency = true;
            }

            let has_invoice_reference = line
                .reference
                .as_ref()
                .map(|r| r.voucher_type.is_invoice())
                .unwrap_or(false);

            if line.account_currency == company.base_currency {
                line.exchange_rate = one.clone();
            } else if line.exchange_rate == zero
                || line.exchange_rate == one
                || has_invoice_reference
            {
                line.exchange_rate = resolver
                    .resolve(
                        &account,
                        company,
                        line.reference.as_ref(),
                        &line.debit_in_account_currency,
                        &line.credit_in_account_currency,
                        Some(&line.exchange_rate),
                    )
                    .await?;
            }

            if line.exchange_rate == zero {
                return Err(ReconcileError::invalid_line(idx + 1, "exchange rate is mandatory"));
            }
        }

        if foreign_currency && !entry.multi_currency {
            return Err(ReconcileError::Validation(
                "enable the multi-currency option to allow accounts in other currencies"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Informational account/party balances shown on each line
    async fn stamp_balances(&self, entry: &mut JournalEntry) -> ReconcileResult<()> {
        for line in &mut entry.lines {
            line.account_balance = Some(self.master.account_balance(&line.account, true).await?);
            line.party_balance = match &line.party {
                Some(party) => Some(self.master.party_balance(party).await?),
                None => None,
            };
        }
        Ok(())
    }

    /// Refresh advance-paid aggregates on referenced orders. Duplicated
    /// references are written back once.
    async fn write_back_advances(&mut self, entry: &JournalEntry) -> ReconcileResult<()> {
        let mut seen: Vec<&VoucherRef> = Vec::new();
        for line in &entry.lines {
            if let Some(reference) = &line.reference {
                if line.is_advance
                    && reference.voucher_type.is_order()
                    && !seen.contains(&reference)
                {
                    self.master.update_advance_paid(reference).await?;
                    seen.push(reference);
                }
            }
        }
        Ok(())
    }
}

/// Turn a validated entry's lines into general-ledger posting rows.
/// Blank lines produce nothing.
fn build_gl_postings(entry: &JournalEntry) -> Vec<GlPosting> {
    let zero = BigDecimal::from(0);
    let voucher = VoucherRef::new(VoucherType::JournalEntry, entry.id.clone());

    entry
        .lines
        .iter()
        .filter(|line| line.debit != zero || line.credit != zero)
        .map(|line| GlPosting {
            account: line.account.clone(),
            party: line.party.clone(),
            against_account: line.against_account.clone(),
            debit: line.debit.clone(),
            credit: line.credit.clone(),
            account_currency: line.account_currency.clone(),
            debit_in_account_currency: line.debit_in_account_currency.clone(),
            credit_in_account_currency: line.credit_in_account_currency.clone(),
            voucher: voucher.clone(),
            against_voucher: line.reference.clone(),
            cost_center: line.cost_center.clone(),
            posting_date: entry.posting_date,
        })
        .collect()
}
