//! Currency conversion resolution
//!
//! Resolves the exchange rate applied to a journal line, preferring the
//! rate recorded on a referenced invoice, then the average realized rate of
//! a bank account, then a spot quote. The resolver never hands back 0 or a
//! missing rate: its result is multiplied into a monetary amount downstream,
//! and a zero rate would silently erase value.

use bigdecimal::BigDecimal;

use crate::traits::{MasterData, RateSource};
use crate::types::*;

/// Resolves exchange rates against master data and a spot rate source
pub struct RateResolver<'a, M: MasterData, R: RateSource> {
    master: &'a M,
    rates: &'a R,
}

impl<'a, M: MasterData, R: RateSource> RateResolver<'a, M, R> {
    pub fn new(master: &'a M, rates: &'a R) -> Self {
        Self { master, rates }
    }

    /// Resolve the exchange rate from the account currency to the company
    /// base currency.
    ///
    /// Resolution order:
    /// 1. Account currency equals the base currency: exactly 1, no lookup.
    /// 2. An invoice reference supplies its stored conversion rate.
    /// 3. A bank account with a qualifying flow (asset credited, or
    ///    liability debited) uses its average realized rate.
    /// 4. A pre-existing nonzero rate on the line survives.
    /// 5. Spot rate from the rate source.
    /// 6. Fallback: 1.
    pub async fn resolve(
        &self,
        account: &Account,
        company: &Company,
        reference: Option<&VoucherRef>,
        debit: &BigDecimal,
        credit: &BigDecimal,
        current_rate: Option<&BigDecimal>,
    ) -> ReconcileResult<BigDecimal> {
        if account.currency == company.base_currency {
            return Ok(BigDecimal::from(1));
        }

        let zero = BigDecimal::from(0);
        let mut rate = current_rate.cloned().unwrap_or_else(|| zero.clone());

        if let Some(reference) = reference.filter(|r| r.voucher_type.is_invoice()) {
            let voucher = self
                .master
                .voucher(reference)
                .await?
                .ok_or_else(|| ReconcileError::VoucherNotFound(reference.clone()))?;
            rate = voucher.conversion_rate;
        } else if account.kind == AccountKind::Bank
            && ((account.root_type == RootType::Asset && *credit > zero)
                || (account.root_type == RootType::Liability && *debit > zero))
        {
            rate = self.average_rate(account).await?;
        }

        if rate == zero {
            rate = self
                .rates
                .spot_rate(&account.currency, &company.base_currency)
                .await?
                .unwrap_or_else(|| zero.clone());
        }

        if rate == zero {
            rate = BigDecimal::from(1);
        }
        Ok(rate)
    }

    /// Average realized rate of an account: balance in base currency over
    /// balance in account currency.
    ///
    /// Returns the 0 sentinel when the account-currency balance is zero;
    /// the caller must fall back to a spot rate.
    pub async fn average_rate(&self, account: &Account) -> ReconcileResult<BigDecimal> {
        let balance_in_account_currency = self.master.account_balance(&account.id, true).await?;
        if balance_in_account_currency == BigDecimal::from(0) {
            return Ok(BigDecimal::from(0));
        }
        let balance_in_base_currency = self.master.account_balance(&account.id, false).await?;
        Ok(&balance_in_base_currency / &balance_in_account_currency)
    }
}
