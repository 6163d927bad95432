//! In-memory storage implementation for testing

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::journal::JournalEntry;
use crate::traits::*;
use crate::types::*;

/// In-memory backend implementing every collaborator trait, for testing
/// and development. Clones share the same underlying data.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    accounts: Arc<RwLock<HashMap<String, Account>>>,
    companies: Arc<RwLock<HashMap<String, Company>>>,
    vouchers: Arc<RwLock<HashMap<VoucherRef, VoucherSummary>>>,
    /// Account balances as (account currency, base currency) pairs
    balances: Arc<RwLock<HashMap<String, (BigDecimal, BigDecimal)>>>,
    party_balances: Arc<RwLock<HashMap<Party, BigDecimal>>>,
    party_accounts: Arc<RwLock<HashMap<(Party, String), String>>>,
    journals: Arc<RwLock<HashMap<String, JournalEntry>>>,
    matched_amounts: Arc<RwLock<HashMap<(String, String), BigDecimal>>>,
    outstanding: Arc<RwLock<HashMap<(Party, String), Vec<OutstandingVoucher>>>>,
    spot_rates: Arc<RwLock<HashMap<(String, String), BigDecimal>>>,
    ledger: Arc<RwLock<Vec<PaymentLedgerEntry>>>,
    advance_updates: Arc<RwLock<Vec<VoucherRef>>>,
    fail_advance: Arc<RwLock<bool>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            companies: Arc::new(RwLock::new(HashMap::new())),
            vouchers: Arc::new(RwLock::new(HashMap::new())),
            balances: Arc::new(RwLock::new(HashMap::new())),
            party_balances: Arc::new(RwLock::new(HashMap::new())),
            party_accounts: Arc::new(RwLock::new(HashMap::new())),
            journals: Arc::new(RwLock::new(HashMap::new())),
            matched_amounts: Arc::new(RwLock::new(HashMap::new())),
            outstanding: Arc::new(RwLock::new(HashMap::new())),
            spot_rates: Arc::new(RwLock::new(HashMap::new())),
            ledger: Arc::new(RwLock::new(Vec::new())),
            advance_updates: Arc::new(RwLock::new(Vec::new())),
            fail_advance: Arc::new(RwLock::new(false)),
        }
    }

    pub fn add_account(&self, account: Account) {
        self.accounts
            .write()
            .unwrap()
            .insert(account.id.clone(), account);
    }

    pub fn add_company(&self, company: Company) {
        self.companies
            .write()
            .unwrap()
            .insert(company.id.clone(), company);
    }

    pub fn add_voucher(&self, reference: VoucherRef, summary: VoucherSummary) {
        self.vouchers.write().unwrap().insert(reference, summary);
    }

    /// Seed an account balance in both the account currency and the
    /// company base currency
    pub fn set_account_balance(
        &self,
        account_id: &str,
        in_account_currency: BigDecimal,
        in_base_currency: BigDecimal,
    ) {
        self.balances.write().unwrap().insert(
            account_id.to_string(),
            (in_account_currency, in_base_currency),
        );
    }

    pub fn set_party_balance(&self, party: Party, balance: BigDecimal) {
        self.party_balances.write().unwrap().insert(party, balance);
    }

    pub fn set_party_account(&self, party: Party, company_id: &str, account_id: &str) {
        self.party_accounts.write().unwrap().insert(
            (party, company_id.to_string()),
            account_id.to_string(),
        );
    }

    pub fn add_posted_journal(&self, entry: JournalEntry) {
        self.journals
            .write()
            .unwrap()
            .insert(entry.id.clone(), entry);
    }

    pub fn set_matched_amount(&self, journal_id: &str, account_id: &str, amount: BigDecimal) {
        self.matched_amounts
            .write()
            .unwrap()
            .insert((journal_id.to_string(), account_id.to_string()), amount);
    }

    pub fn add_outstanding_voucher(
        &self,
        party: Party,
        account_id: &str,
        voucher: OutstandingVoucher,
    ) {
        self.outstanding
            .write()
            .unwrap()
            .entry((party, account_id.to_string()))
            .or_default()
            .push(voucher);
    }

    pub fn set_spot_rate(&self, from_currency: &str, to_currency: &str, rate: BigDecimal) {
        self.spot_rates.write().unwrap().insert(
            (from_currency.to_string(), to_currency.to_string()),
            rate,
        );
    }

    /// Make every subsequent advance write-back fail
    pub fn fail_advance_updates(&self, fail: bool) {
        *self.fail_advance.write().unwrap() = fail;
    }

    /// Every payment ledger row ever inserted, cancelled rows included
    pub fn ledger_entries(&self) -> Vec<PaymentLedgerEntry> {
        self.ledger.read().unwrap().clone()
    }

    /// Order references whose advance-paid aggregate has been refreshed
    pub fn advance_updates(&self) -> Vec<VoucherRef> {
        self.advance_updates.read().unwrap().clone()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MasterData for MemoryStorage {
    async fn account(&self, account_id: &str) -> ReconcileResult<Option<Account>> {
        Ok(self.accounts.read().unwrap().get(account_id).cloned())
    }

    async fn company(&self, company_id: &str) -> ReconcileResult<Option<Company>> {
        Ok(self.companies.read().unwrap().get(company_id).cloned())
    }

    async fn voucher(&self, reference: &VoucherRef) -> ReconcileResult<Option<VoucherSummary>> {
        Ok(self.vouchers.read().unwrap().get(reference).cloned())
    }

    async fn account_balance(
        &self,
        account_id: &str,
        in_account_currency: bool,
    ) -> ReconcileResult<BigDecimal> {
        let balances = self.balances.read().unwrap();
        Ok(match balances.get(account_id) {
            Some((account, base)) => {
                if in_account_currency {
                    account.clone()
                } else {
                    base.clone()
                }
            }
            None => BigDecimal::from(0),
        })
    }

    async fn party_balance(&self, party: &Party) -> ReconcileResult<BigDecimal> {
        Ok(self
            .party_balances
            .read()
            .unwrap()
            .get(party)
            .cloned()
            .unwrap_or_else(|| BigDecimal::from(0)))
    }

    async fn party_account(
        &self,
        party: &Party,
        company_id: &str,
    ) -> ReconcileResult<Option<String>> {
        Ok(self
            .party_accounts
            .read()
            .unwrap()
            .get(&(party.clone(), company_id.to_string()))
            .cloned())
    }

    async fn posted_journal(&self, journal_id: &str) -> ReconcileResult<Option<JournalEntry>> {
        Ok(self
            .journals
            .read()
            .unwrap()
            .get(journal_id)
            .filter(|entry| entry.status == DocStatus::Posted)
            .cloned())
    }

    async fn matched_amount_against_journal(
        &self,
        journal_id: &str,
        account_id: &str,
    ) -> ReconcileResult<BigDecimal> {
        Ok(self
            .matched_amounts
            .read()
            .unwrap()
            .get(&(journal_id.to_string(), account_id.to_string()))
            .cloned()
            .unwrap_or_else(|| BigDecimal::from(0)))
    }

    async fn outstanding_vouchers(
        &self,
        party: &Party,
        account_id: &str,
    ) -> ReconcileResult<Vec<OutstandingVoucher>> {
        Ok(self
            .outstanding
            .read()
            .unwrap()
            .get(&(party.clone(), account_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn update_advance_paid(&mut self, voucher: &VoucherRef) -> ReconcileResult<()> {
        if *self.fail_advance.read().unwrap() {
            return Err(ReconcileError::Storage(format!(
                "failed to update advance paid on {voucher}"
            )));
        }
        self.advance_updates.write().unwrap().push(voucher.clone());
        Ok(())
    }
}

#[async_trait]
impl RateSource for MemoryStorage {
    async fn spot_rate(
        &self,
        from_currency: &str,
        to_currency: &str,
    ) -> ReconcileResult<Option<BigDecimal>> {
        Ok(self
            .spot_rates
            .read()
            .unwrap()
            .get(&(from_currency.to_string(), to_currency.to_string()))
            .cloned())
    }
}

#[async_trait]
impl PaymentLedgerStorage for MemoryStorage {
    async fn insert(&mut self, entry: &PaymentLedgerEntry) -> ReconcileResult<()> {
        self.ledger.write().unwrap().push(entry.clone());
        Ok(())
    }

    async fn mark_cancelled(
        &mut self,
        voucher: &VoucherRef,
        against_voucher: &VoucherRef,
    ) -> ReconcileResult<()> {
        let mut ledger = self.ledger.write().unwrap();
        for entry in ledger.iter_mut() {
            if !entry.is_cancelled && entry.matches_key(voucher, against_voucher) {
                entry.is_cancelled = true;
            }
        }
        Ok(())
    }

    async fn amount_against(&self, voucher: &VoucherRef) -> ReconcileResult<BigDecimal> {
        Ok(self
            .ledger
            .read()
            .unwrap()
            .iter()
            .filter(|entry| !entry.is_cancelled && &entry.against_voucher == voucher)
            .map(|entry| &entry.amount)
            .sum())
    }

    async fn amount_forwarded(&self, voucher: &VoucherRef) -> ReconcileResult<BigDecimal> {
        Ok(self
            .ledger
            .read()
            .unwrap()
            .iter()
            .filter(|entry| !entry.is_cancelled && &entry.voucher == voucher)
            .map(|entry| &entry.amount)
            .sum())
    }

    async fn entries_against(
        &self,
        voucher: &VoucherRef,
    ) -> ReconcileResult<Vec<PaymentLedgerEntry>> {
        Ok(self
            .ledger
            .read()
            .unwrap()
            .iter()
            .filter(|entry| !entry.is_cancelled && &entry.against_voucher == voucher)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn clones_share_data() {
        let storage = MemoryStorage::new();
        let mut clone = storage.clone();

        clone
            .insert(&PaymentLedgerEntry::new(
                NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                VoucherRef::new(VoucherType::SalesInvoice, "INV-1"),
                VoucherRef::new(VoucherType::JournalEntry, "JV-1"),
                BigDecimal::from(100),
                false,
            ))
            .await
            .unwrap();

        assert_eq!(storage.ledger_entries().len(), 1);
    }

    #[tokio::test]
    async fn mark_cancelled_skips_already_cancelled_rows() {
        let mut storage = MemoryStorage::new();
        let invoice = VoucherRef::new(VoucherType::SalesInvoice, "INV-2");
        let journal = VoucherRef::new(VoucherType::JournalEntry, "JV-2");
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();

        let cancelled = PaymentLedgerEntry::new(
            date,
            invoice.clone(),
            journal.clone(),
            BigDecimal::from(-100),
            true,
        );
        let live =
            PaymentLedgerEntry::new(date, invoice.clone(), journal.clone(), BigDecimal::from(100), false);
        storage.insert(&cancelled).await.unwrap();
        storage.insert(&live).await.unwrap();

        storage.mark_cancelled(&invoice, &journal).await.unwrap();
        let rows = storage.ledger_entries();
        assert!(rows.iter().all(|r| r.is_cancelled));
        assert_eq!(storage.amount_against(&journal).await.unwrap(), BigDecimal::from(0));
    }
}
