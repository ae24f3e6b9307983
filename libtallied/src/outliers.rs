//! Outliers
//! --------
//!
//! Every key (payee or account) gets a contribution score: how much the
//! average of all values moves when that key is left out,
//!
//! ```text
//! avg            = sum / n
//! avg_without(k) = (sum - value[k]) / (n - 1)
//! score(k)       = | avg * (n - 1) / (avg_without(k) * n) |
//! ```
//!
//! Keys are ranked by descending score; ties keep first-seen order. A lone
//! key scores 1, since there is nothing to compare it against. When the
//! values sum to zero, as every payee does on a balanced ledger, all keys
//! score 0. A key whose removal leaves a zero average while the overall
//! average is not zero fails with `DivisionByZero`.

use crate::{amount::accumulate, ledger::Ledger, LedgerError, Result};

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Average {
    pub count: usize,
    pub sum: Decimal,
}

impl Average {
    pub fn value(&self) -> Option<Decimal> {
        self.sum.checked_div(Decimal::from(self.count))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub key: String,
    /// The key's own value (count or summed amount), not its score.
    pub total: Decimal,
}

pub fn average(values: &IndexMap<String, Decimal>) -> Result<Average> {
    let mut avg = Average::default();
    for value in values.values() {
        accumulate(&mut avg.sum, *value, "averaging")?;
        avg.count += 1;
    }
    Ok(avg)
}

/// Score every key.
pub fn contributions(values: &IndexMap<String, Decimal>) -> Result<IndexMap<String, Decimal>> {
    let avg = average(values)?;
    if avg.count == 1 {
        return Ok(values.keys().map(|k| (k.clone(), Decimal::ONE)).collect());
    }

    let overflow = || LedgerError::Overflow("scoring contributions".to_string());
    let n = Decimal::from(avg.count);
    let others = Decimal::from(avg.count.saturating_sub(1));
    let numerator = avg
        .value()
        .unwrap_or_default()
        .checked_mul(others)
        .ok_or_else(overflow)?;

    values
        .iter()
        .map(|(key, value)| {
            if numerator.is_zero() {
                return Ok((key.clone(), Decimal::ZERO));
            }

            let without_me = avg
                .sum
                .checked_sub(*value)
                .and_then(|rest| rest.checked_div(others))
                .ok_or_else(overflow)?;
            let denominator = without_me.checked_mul(n).ok_or_else(overflow)?;
            if denominator.is_zero() {
                return Err(LedgerError::DivisionByZero(key.clone()));
            }

            let score = numerator.checked_div(denominator).ok_or_else(overflow)?;
            Ok((key.clone(), score.abs()))
        })
        .collect()
}

pub fn top_contributors(
    values: &IndexMap<String, Decimal>,
    limit: usize,
) -> Result<Vec<RankedEntry>> {
    let scores = contributions(values)?;

    let mut ranked = scores.into_iter().collect::<Vec<_>>();
    ranked.sort_by(|(_, a), (_, b)| b.cmp(a));

    Ok(ranked
        .into_iter()
        .take(limit)
        .map(|(key, _)| RankedEntry {
            total: values[&key],
            key,
        })
        .collect())
}

/// Some payees are more common than others.
pub fn payees_by_count(ledger: &Ledger, limit: usize) -> Result<Vec<RankedEntry>> {
    let mut counts: IndexMap<String, Decimal> = IndexMap::new();
    for payee in ledger.transactions().iter().filter_map(|t| t.payee.as_ref()) {
        *counts.entry(payee.clone()).or_default() += Decimal::ONE;
    }
    top_contributors(&counts, limit)
}

pub fn accounts_by_count(ledger: &Ledger, limit: usize) -> Result<Vec<RankedEntry>> {
    let mut counts: IndexMap<String, Decimal> = IndexMap::new();
    for posting in ledger.transactions().iter().flat_map(|t| &t.postings) {
        *counts.entry(posting.account.name.clone()).or_default() += Decimal::ONE;
    }
    top_contributors(&counts, limit)
}

/// Some payees weigh more than others on the balance of one commodity.
/// Postings in other commodities are left out, so a payee only ever paid in
/// another commodity is not ranked at all.
pub fn payees_by_amount(
    ledger: &Ledger,
    commodity: &str,
    limit: usize,
) -> Result<Vec<RankedEntry>> {
    let mut sums: IndexMap<String, Decimal> = IndexMap::new();
    for transaction in ledger.transactions() {
        let Some(payee) = &transaction.payee else {
            continue;
        };
        for amount in transaction.postings.iter().filter_map(|p| p.amount_in(commodity)) {
            let sum = sums.entry(payee.clone()).or_default();
            accumulate(sum, amount.quantity, "summing payee amounts")?;
        }
    }
    top_contributors(&sums, limit)
}

pub fn accounts_by_amount(
    ledger: &Ledger,
    commodity: &str,
    limit: usize,
) -> Result<Vec<RankedEntry>> {
    let mut sums: IndexMap<String, Decimal> = IndexMap::new();
    for posting in ledger.transactions().iter().flat_map(|t| &t.postings) {
        if let Some(amount) = posting.amount_in(commodity) {
            let sum = sums.entry(posting.account.name.clone()).or_default();
            accumulate(sum, amount.quantity, "summing account amounts")?;
        }
    }
    top_contributors(&sums, limit)
}
