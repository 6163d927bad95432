//! Journal entry document model and balancing
//!
//! A journal entry is an ordered sequence of lines, each moving value in
//! exactly one direction (debit or credit) on one account. The document
//! walks an explicit lifecycle: draft entries mutate freely on validation,
//! posting freezes them, and cancellation reverses a posted entry without
//! rewriting history.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::*;
use crate::utils::rounding::round_to;

/// One row of a journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalLine {
    /// Account being moved
    pub account: String,
    /// Customer/supplier, required on receivable/payable accounts
    pub party: Option<Party>,
    /// Debit amount in the account currency
    pub debit_in_account_currency: BigDecimal,
    /// Credit amount in the account currency
    pub credit_in_account_currency: BigDecimal,
    /// Exchange rate from the account currency to the company base
    /// currency; 0 means unresolved
    pub exchange_rate: BigDecimal,
    /// Debit converted to the base currency
    pub debit: BigDecimal,
    /// Credit converted to the base currency
    pub credit: BigDecimal,
    /// Currency of the account, stamped during validation
    pub account_currency: String,
    /// External voucher this line settles
    pub reference: Option<VoucherRef>,
    /// Whether the line is an advance against an order
    pub is_advance: bool,
    pub cost_center: Option<String>,
    /// Accounts/parties on the opposite side, stamped during validation
    pub against_account: Option<String>,
    /// Informational account balance as of the posting date, not authoritative
    pub account_balance: Option<BigDecimal>,
    /// Informational party balance, not authoritative
    pub party_balance: Option<BigDecimal>,
}

impl JournalLine {
    fn amount(account: impl Into<String>, debit: BigDecimal, credit: BigDecimal) -> Self {
        Self {
            account: account.into(),
            party: None,
            debit_in_account_currency: debit,
            credit_in_account_currency: credit,
            exchange_rate: BigDecimal::from(0),
            debit: BigDecimal::from(0),
            credit: BigDecimal::from(0),
            account_currency: String::new(),
            reference: None,
            is_advance: false,
            cost_center: None,
            against_account: None,
            account_balance: None,
            party_balance: None,
        }
    }

    /// Create a debit line in the account currency
    pub fn debit(account: impl Into<String>, amount: BigDecimal) -> Self {
        Self::amount(account, amount, BigDecimal::from(0))
    }

    /// Create a credit line in the account currency
    pub fn credit(account: impl Into<String>, amount: BigDecimal) -> Self {
        Self::amount(account, BigDecimal::from(0), amount)
    }

    /// Attach a party
    pub fn with_party(mut self, party: Party) -> Self {
        self.party = Some(party);
        self
    }

    /// Link an external voucher
    pub fn with_reference(mut self, reference: VoucherRef) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Pin an exchange rate instead of letting the resolver derive one
    pub fn with_exchange_rate(mut self, rate: BigDecimal) -> Self {
        self.exchange_rate = rate;
        self
    }

    pub fn with_cost_center(mut self, cost_center: impl Into<String>) -> Self {
        self.cost_center = Some(cost_center.into());
        self
    }

    /// Mark the line as an advance payment
    pub fn as_advance(mut self) -> Self {
        self.is_advance = true;
        self
    }

    /// Whether the line has neither a debit nor a credit amount
    pub fn is_blank(&self) -> bool {
        let zero = BigDecimal::from(0);
        self.debit_in_account_currency == zero && self.credit_in_account_currency == zero
    }
}

/// A multi-line accounting transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique document identifier
    pub id: String,
    pub company: String,
    pub posting_date: NaiveDate,
    pub lines: Vec<JournalLine>,
    /// Must be set to allow lines in currencies other than the base currency
    pub multi_currency: bool,
    /// Total debit in the base currency, recomputed on validation
    pub total_debit: BigDecimal,
    /// Total credit in the base currency, recomputed on validation
    pub total_credit: BigDecimal,
    /// total_debit - total_credit, must be exactly 0 to post
    pub difference: BigDecimal,
    pub status: DocStatus,
}

impl JournalEntry {
    pub fn new(id: impl Into<String>, company: impl Into<String>, posting_date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            company: company.into(),
            posting_date,
            lines: Vec::new(),
            multi_currency: false,
            total_debit: BigDecimal::from(0),
            total_credit: BigDecimal::from(0),
            difference: BigDecimal::from(0),
            status: DocStatus::Draft,
        }
    }

    pub fn add_line(&mut self, line: JournalLine) {
        self.lines.push(line);
    }

    /// Convert every line's account-currency amounts into the base currency
    /// using its resolved exchange rate, rounding each line to the given
    /// precision.
    pub fn set_amounts_in_base_currency(&mut self, precision: i64) {
        for line in &mut self.lines {
            line.debit = round_to(
                &(&line.debit_in_account_currency * &line.exchange_rate),
                precision,
            );
            line.credit = round_to(
                &(&line.credit_in_account_currency * &line.exchange_rate),
                precision,
            );
        }
    }

    /// Recompute total debit, total credit and their difference in the base
    /// currency.
    ///
    /// Fails if any line carries both a debit and a credit amount: a line
    /// represents exactly one direction of movement.
    pub fn set_totals(&mut self, precision: i64) -> ReconcileResult<()> {
        let zero = BigDecimal::from(0);
        let mut total_debit = zero.clone();
        let mut total_credit = zero.clone();

        for (idx, line) in self.lines.iter().enumerate() {
            if line.debit_in_account_currency > zero && line.credit_in_account_currency > zero {
                return Err(ReconcileError::invalid_line(
                    idx + 1,
                    "cannot debit and credit the same line at the same time",
                ));
            }
            total_debit += round_to(&line.debit, precision);
            total_credit += round_to(&line.credit, precision);
        }

        self.total_debit = round_to(&total_debit, precision);
        self.total_credit = round_to(&total_credit, precision);
        self.difference = &self.total_debit - &self.total_credit;
        Ok(())
    }

    /// Reject the entry unless total debit equals total credit exactly after
    /// rounding.
    pub fn validate_totals(&mut self, precision: i64) -> ReconcileResult<()> {
        self.set_totals(precision)?;
        if self.difference != BigDecimal::from(0) {
            return Err(ReconcileError::Validation(format!(
                "Total debit must equal total credit. The difference is {}",
                self.difference
            )));
        }
        Ok(())
    }

    /// Annotate each line with the accounts/parties on the opposite side of
    /// the movement.
    pub fn set_against_accounts(&mut self) {
        let zero = BigDecimal::from(0);
        let label = |line: &JournalLine| {
            line.party
                .as_ref()
                .map(|p| p.name.clone())
                .unwrap_or_else(|| line.account.clone())
        };

        let debited: BTreeSet<String> = self
            .lines
            .iter()
            .filter(|l| l.debit > zero)
            .map(label)
            .collect();
        let credited: BTreeSet<String> = self
            .lines
            .iter()
            .filter(|l| l.credit > zero)
            .map(label)
            .collect();

        let debited = debited.into_iter().collect::<Vec<_>>().join(", ");
        let credited = credited.into_iter().collect::<Vec<_>>().join(", ");

        for line in &mut self.lines {
            if line.debit > zero {
                line.against_account = Some(credited.clone());
            } else if line.credit > zero {
                line.against_account = Some(debited.clone());
            }
        }
    }

    /// Absorb the current difference into a balancing line.
    ///
    /// Runs only on operator request, never implicitly during validation.
    /// An existing blank line is reused; otherwise a new line with an empty
    /// account is appended for the operator to complete.
    pub fn insert_balancing_line(&mut self, precision: i64) -> ReconcileResult<()> {
        if self.lines.is_empty() {
            return Err(ReconcileError::MandatoryFieldMissing(
                "lines cannot be empty".to_string(),
            ));
        }

        self.set_totals(precision)?;
        let zero = BigDecimal::from(0);
        let diff = round_to(&self.difference, precision);

        if diff != zero {
            let blank_idx = self.lines.iter().rposition(|l| l.is_blank());
            let idx = match blank_idx {
                Some(idx) => idx,
                None => {
                    self.lines.push(JournalLine::amount("", zero.clone(), zero.clone()));
                    self.lines.len() - 1
                }
            };

            let line = &mut self.lines[idx];
            line.exchange_rate = BigDecimal::from(1);
            if diff > zero {
                line.credit_in_account_currency = diff.clone();
                line.credit = diff;
            } else {
                line.debit_in_account_currency = diff.abs();
                line.debit = diff.abs();
            }
        }

        self.validate_totals(precision)
    }

    /// Transition draft -> posted. Callers run the full validation pipeline
    /// first; this only guards the state machine.
    pub(crate) fn transition_to_posted(&mut self) -> ReconcileResult<()> {
        if self.status != DocStatus::Draft {
            return Err(ReconcileError::Validation(format!(
                "only draft entries can be posted, {} is {:?}",
                self.id, self.status
            )));
        }
        self.status = DocStatus::Posted;
        Ok(())
    }

    /// Transition posted -> cancelled
    pub(crate) fn transition_to_cancelled(&mut self) -> ReconcileResult<()> {
        if self.status != DocStatus::Posted {
            return Err(ReconcileError::Validation(format!(
                "only posted entries can be cancelled, {} is {:?}",
                self.id, self.status
            )));
        }
        self.status = DocStatus::Cancelled;
        Ok(())
    }
}

/// Builder for assembling journal entries
#[derive(Debug)]
pub struct JournalEntryBuilder {
    entry: JournalEntry,
}

impl JournalEntryBuilder {
    pub fn new(
        id: impl Into<String>,
        company: impl Into<String>,
        posting_date: NaiveDate,
    ) -> Self {
        Self {
            entry: JournalEntry::new(id, company, posting_date),
        }
    }

    /// Allow lines in currencies other than the company base currency
    pub fn multi_currency(mut self) -> Self {
        self.entry.multi_currency = true;
        self
    }

    pub fn line(mut self, line: JournalLine) -> Self {
        self.entry.add_line(line);
        self
    }

    /// Shorthand for a plain debit line
    pub fn debit(self, account: impl Into<String>, amount: BigDecimal) -> Self {
        self.line(JournalLine::debit(account, amount))
    }

    /// Shorthand for a plain credit line
    pub fn credit(self, account: impl Into<String>, amount: BigDecimal) -> Self {
        self.line(JournalLine::credit(account, amount))
    }

    pub fn build(self) -> JournalEntry {
        self.entry
    }
}
