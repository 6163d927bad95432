//! Outstanding-amount allocation
//!
//! An adjustment entry settles open debit-side vouchers (customer invoices)
//! against open credit-side vouchers (supplier invoices) or payments in a
//! chosen payment currency. Allocation is a greedy single pass in the order
//! entries were fetched; no sorting by amount or date.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::traits::{MasterData, RateSource};
use crate::types::*;

/// Which sides of the adjustment carry open vouchers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdjustmentType {
    /// Customer invoices only (debit side)
    Sales,
    /// Supplier invoices only (credit side)
    Purchase,
    /// Customer invoices against supplier invoices
    SalesAndPurchase,
}

/// Exchange rates for one currency appearing in the adjustment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyRates {
    pub currency: String,
    pub to_payment_currency: BigDecimal,
    pub to_base_currency: BigDecimal,
}

/// One open voucher being settled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementEntry {
    pub voucher: VoucherRef,
    pub voucher_date: NaiveDate,
    pub currency: String,
    /// Outstanding amount in the company base currency
    pub voucher_base_amount: BigDecimal,
    /// Exchange rate from the voucher currency to the base currency
    pub exchange_rate: BigDecimal,
    /// Outstanding amount in the voucher currency
    pub voucher_amount: BigDecimal,
    /// Exchange rate from the voucher currency to the payment currency
    pub payment_exchange_rate: BigDecimal,
    /// Outstanding amount in the payment currency
    pub voucher_payment_amount: BigDecimal,
    /// Amount awarded by the last allocation pass
    pub allocated_amount: BigDecimal,
    /// Unallocated remainder in the payment currency
    pub balance: BigDecimal,
    pub cost_center: Option<String>,
}

impl SettlementEntry {
    fn from_outstanding(voucher: &OutstandingVoucher) -> Self {
        Self {
            voucher: voucher.voucher.clone(),
            voucher_date: voucher.posting_date,
            currency: voucher.currency.clone(),
            voucher_base_amount: voucher.outstanding_amount.clone(),
            exchange_rate: voucher.conversion_rate.clone(),
            voucher_amount: BigDecimal::from(0),
            payment_exchange_rate: BigDecimal::from(1),
            voucher_payment_amount: BigDecimal::from(0),
            allocated_amount: BigDecimal::from(0),
            balance: BigDecimal::from(0),
            cost_center: voucher.cost_center.clone(),
        }
    }

    /// Recompute the currency-derived fields from the base outstanding and
    /// the rate table. Runs for every entry on each pass, allocated or not,
    /// so display amounts stay live.
    pub fn recalculate_amounts(&mut self, rates: &HashMap<String, CurrencyRates>) {
        let zero = BigDecimal::from(0);
        if self.exchange_rate != zero {
            self.voucher_amount = &self.voucher_base_amount / &self.exchange_rate;
        }
        if let Some(currency_rates) = rates.get(&self.currency) {
            self.payment_exchange_rate = currency_rates.to_payment_currency.clone();
        }
        self.voucher_payment_amount = &self.voucher_amount * &self.payment_exchange_rate;
        self.balance = &self.voucher_payment_amount - &self.allocated_amount;
    }
}

/// A settlement document allocating payment amounts across open vouchers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentEntry {
    pub company: String,
    pub adjustment_type: AdjustmentType,
    pub customer: Option<String>,
    pub supplier: Option<String>,
    /// Currency the settlement is negotiated in
    pub payment_currency: String,
    /// When false, no entry receives an allocation but amounts still
    /// recompute
    pub allocate_payment_amount: bool,
    pub debit_entries: Vec<SettlementEntry>,
    pub credit_entries: Vec<SettlementEntry>,
    pub exchange_rates: Vec<CurrencyRates>,
}

impl AdjustmentEntry {
    pub fn new(
        company: impl Into<String>,
        adjustment_type: AdjustmentType,
        payment_currency: impl Into<String>,
    ) -> Self {
        Self {
            company: company.into(),
            adjustment_type,
            customer: None,
            supplier: None,
            payment_currency: payment_currency.into(),
            allocate_payment_amount: true,
            debit_entries: Vec::new(),
            credit_entries: Vec::new(),
            exchange_rates: Vec::new(),
        }
    }

    pub fn with_customer(mut self, customer: impl Into<String>) -> Self {
        self.customer = Some(customer.into());
        self
    }

    pub fn with_supplier(mut self, supplier: impl Into<String>) -> Self {
        self.supplier = Some(supplier.into());
        self
    }

    /// The identifying fields required before anything can be fetched
    pub fn check_mandatory(&self) -> ReconcileResult<()> {
        if self.company.trim().is_empty() {
            return Err(ReconcileError::MandatoryFieldMissing("company".to_string()));
        }
        if self.adjustment_type != AdjustmentType::Purchase && self.customer.is_none() {
            return Err(ReconcileError::MandatoryFieldMissing("customer".to_string()));
        }
        if self.adjustment_type != AdjustmentType::Sales && self.supplier.is_none() {
            return Err(ReconcileError::MandatoryFieldMissing("supplier".to_string()));
        }
        Ok(())
    }

    /// Fetch open vouchers into the debit/credit tables and build the
    /// exchange-rate table for every currency involved.
    pub async fn fetch_unreconciled<M, R>(&mut self, master: &M, rates: &R) -> ReconcileResult<()>
    where
        M: MasterData,
        R: RateSource,
    {
        self.check_mandatory()?;

        let company = master
            .company(&self.company)
            .await?
            .ok_or_else(|| ReconcileError::CompanyNotFound(self.company.clone()))?;

        let debit_vouchers = if self.adjustment_type != AdjustmentType::Purchase {
            self.party_outstanding(master, PartyType::Customer).await?
        } else {
            Vec::new()
        };
        let credit_vouchers = if self.adjustment_type != AdjustmentType::Sales {
            self.party_outstanding(master, PartyType::Supplier).await?
        } else {
            Vec::new()
        };

        self.debit_entries = debit_vouchers
            .iter()
            .map(SettlementEntry::from_outstanding)
            .collect();
        self.credit_entries = credit_vouchers
            .iter()
            .map(SettlementEntry::from_outstanding)
            .collect();

        self.refresh_exchange_rates(rates, &company.base_currency)
            .await?;
        let table = self.rates_map();
        for entry in self.debit_entries.iter_mut().chain(self.credit_entries.iter_mut()) {
            entry.recalculate_amounts(&table);
        }
        Ok(())
    }

    /// Refresh the rate table and recompute every entry's derived amounts
    pub async fn recalculate_tables<R: RateSource>(
        &mut self,
        rates: &R,
        base_currency: &str,
    ) -> ReconcileResult<()> {
        self.refresh_exchange_rates(rates, base_currency).await?;
        let table = self.rates_map();
        for entry in self.debit_entries.iter_mut().chain(self.credit_entries.iter_mut()) {
            entry.recalculate_amounts(&table);
        }
        Ok(())
    }

    /// Greedy single-pass allocation across both sides.
    ///
    /// Each side draws from its own pool of min(total debit outstanding,
    /// total credit outstanding); the side with the larger total is
    /// processed second, debit entries first on a tie. Entries are visited
    /// in their existing order, each awarded the lesser of its own
    /// outstanding and the remaining pool. Every entry recomputes its
    /// derived amounts whether or not it received an allocation.
    pub fn allocate_amount_to_references(&mut self) {
        let zero = BigDecimal::from(0);
        let total_debit: BigDecimal = self
            .debit_entries
            .iter()
            .map(|e| &e.voucher_payment_amount)
            .sum();
        let total_credit: BigDecimal = self
            .credit_entries
            .iter()
            .map(|e| &e.voucher_payment_amount)
            .sum();
        let pool = total_debit.clone().min(total_credit.clone());
        let allocate = self.allocate_payment_amount;
        let table = self.rates_map();

        let (first, second) = if total_debit > total_credit {
            (&mut self.credit_entries, &mut self.debit_entries)
        } else {
            (&mut self.debit_entries, &mut self.credit_entries)
        };

        for side in [first, second] {
            let mut remaining = pool.clone();
            for entry in side.iter_mut() {
                entry.allocated_amount = zero.clone();
                if allocate && remaining > zero {
                    entry.allocated_amount =
                        entry.voucher_payment_amount.clone().min(remaining.clone());
                    remaining -= &entry.allocated_amount;
                }
                entry.recalculate_amounts(&table);
            }
        }
    }

    /// Exchange-rate table keyed by currency
    pub fn rates_map(&self) -> HashMap<String, CurrencyRates> {
        self.exchange_rates
            .iter()
            .map(|r| (r.currency.clone(), r.clone()))
            .collect()
    }

    async fn party_outstanding<M: MasterData>(
        &self,
        master: &M,
        party_type: PartyType,
    ) -> ReconcileResult<Vec<OutstandingVoucher>> {
        let name = match party_type {
            PartyType::Customer => self.customer.as_ref(),
            PartyType::Supplier => self.supplier.as_ref(),
        }
        .ok_or_else(|| {
            ReconcileError::MandatoryFieldMissing(party_type.to_string().to_lowercase())
        })?;

        let party = Party {
            party_type,
            name: name.clone(),
        };
        let account = master
            .party_account(&party, &self.company)
            .await?
            .ok_or_else(|| {
                ReconcileError::AccountNotFound(format!("party account for {}", party))
            })?;
        master.outstanding_vouchers(&party, &account).await
    }

    /// Build the rate table: one row per currency appearing in the entries,
    /// plus the payment currency itself. Unquoted pairs default to 1.
    async fn refresh_exchange_rates<R: RateSource>(
        &mut self,
        rates: &R,
        base_currency: &str,
    ) -> ReconcileResult<()> {
        let mut currencies: Vec<String> = Vec::new();
        for entry in self.debit_entries.iter().chain(self.credit_entries.iter()) {
            if !currencies.contains(&entry.currency) {
                currencies.push(entry.currency.clone());
            }
        }
        if !currencies.contains(&self.payment_currency) {
            currencies.push(self.payment_currency.clone());
        }

        self.exchange_rates.clear();
        for currency in currencies {
            let to_payment_currency = if currency == self.payment_currency {
                BigDecimal::from(1)
            } else {
                rates
                    .spot_rate(&currency, &self.payment_currency)
                    .await?
                    .unwrap_or_else(|| BigDecimal::from(1))
            };
            let to_base_currency = if currency == base_currency {
                BigDecimal::from(1)
            } else {
                rates
                    .spot_rate(&currency, base_currency)
                    .await?
                    .unwrap_or_else(|| BigDecimal::from(1))
            };
            self.exchange_rates.push(CurrencyRates {
                currency,
                to_payment_currency,
                to_base_currency,
            });
        }
        Ok(())
    }
}
