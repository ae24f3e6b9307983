use crate::{
    amount::accumulate,
    transaction::{LedgerDate, Transaction},
    Result,
};

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use std::str::FromStr;

/// Width of one bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Day,
    Week,
    Month,
    Year,
}

impl Interval {
    /// One step forward. Month and year steps keep the day as is, so
    /// `2013/01/31` steps to `2013/02/31`; ordering is all buckets need.
    pub fn next(&self, date: LedgerDate) -> LedgerDate {
        match self {
            Interval::Month if date.month >= 12 => {
                LedgerDate::new(date.year.saturating_add(1), 1, date.day)
            }
            Interval::Month => LedgerDate::new(date.year, date.month + 1, date.day),
            Interval::Year => LedgerDate::new(date.year.saturating_add(1), date.month, date.day),
            Interval::Day => Self::shift(date, Duration::days(1)),
            Interval::Week => Self::shift(date, Duration::weeks(1)),
        }
    }

    pub fn plus(&self, date: LedgerDate, count: usize) -> LedgerDate {
        (0..count).fold(date, |date, _| self.next(date))
    }

    fn shift(date: LedgerDate, by: Duration) -> LedgerDate {
        date.to_naive()
            .and_then(|naive| naive.checked_add_signed(by))
            .map(LedgerDate::from)
            .unwrap_or(date)
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "day" => Ok(Interval::Day),
            "week" => Ok(Interval::Week),
            "month" => Ok(Interval::Month),
            "year" => Ok(Interval::Year),
            _ => Err(format!("unknown interval '{}'", s)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatedValue {
    pub date: LedgerDate,
    pub value: Decimal,
}

impl DatedValue {
    pub fn new(date: LedgerDate, value: Decimal) -> Self {
        Self { date, value }
    }
}

/// Sum values into `count` consecutive buckets of `interval`, the first one
/// ending at `interval.next(start)`. Values are expected to be within
/// `[start, interval.plus(start, count))`; empty buckets are zero.
pub fn sample(
    mut values: Vec<DatedValue>,
    start: LedgerDate,
    count: usize,
    interval: Interval,
) -> Result<Vec<Decimal>> {
    values.sort_by_key(|v| v.date);

    let mut pending = values.into_iter().peekable();
    let mut boundary = interval.next(start);
    let mut samples = Vec::with_capacity(count);

    for _ in 0..count {
        let mut bucket = Decimal::ZERO;
        while let Some(value) = pending.next_if(|v| v.date < boundary) {
            accumulate(&mut bucket, value.value, "sampling")?;
        }
        samples.push(bucket);
        boundary = interval.next(boundary);
    }

    Ok(samples)
}

fn in_range(date: LedgerDate, start: LedgerDate, end: LedgerDate) -> bool {
    start <= date && date < end
}

/// Every posting amount of `payee`'s transactions in range.
pub fn select_by_payee(
    transactions: &[Transaction],
    payee: &str,
    commodity: Option<&str>,
    start: LedgerDate,
    end: LedgerDate,
) -> Vec<DatedValue> {
    transactions
        .iter()
        .filter(|t| in_range(t.date, start, end) && t.has_payee(payee))
        .flat_map(|t| {
            t.postings
                .iter()
                .filter(|p| p.matches_commodity(commodity))
                .filter_map(|p| p.amount.as_ref())
                .map(|amount| DatedValue::new(t.date, amount.quantity))
        })
        .collect()
}

/// Dates of `payee`'s transactions in range with at least one matching
/// posting.
pub fn exists_by_payee(
    transactions: &[Transaction],
    payee: &str,
    commodity: Option<&str>,
    start: LedgerDate,
    end: LedgerDate,
) -> Vec<LedgerDate> {
    transactions
        .iter()
        .filter(|t| in_range(t.date, start, end) && t.has_payee(payee))
        .filter(|t| t.postings.iter().any(|p| p.matches_commodity(commodity)))
        .map(|t| t.date)
        .collect()
}

pub fn select_by_account(
    transactions: &[Transaction],
    account: &str,
    commodity: Option<&str>,
    start: LedgerDate,
    end: LedgerDate,
) -> Vec<DatedValue> {
    transactions
        .iter()
        .filter(|t| in_range(t.date, start, end))
        .flat_map(|t| {
            t.postings
                .iter()
                .filter(|p| p.account.name == account && p.matches_commodity(commodity))
                .filter_map(|p| p.amount.as_ref())
                .map(|amount| DatedValue::new(t.date, amount.quantity))
        })
        .collect()
}

pub fn exists_by_account(
    transactions: &[Transaction],
    account: &str,
    commodity: Option<&str>,
    start: LedgerDate,
    end: LedgerDate,
) -> Vec<LedgerDate> {
    transactions
        .iter()
        .filter(|t| in_range(t.date, start, end))
        .filter(|t| {
            t.postings
                .iter()
                .any(|p| p.account.name == account && p.matches_commodity(commodity))
        })
        .map(|t| t.date)
        .collect()
}

fn ones(dates: Vec<LedgerDate>) -> Vec<DatedValue> {
    dates
        .into_iter()
        .map(|date| DatedValue::new(date, Decimal::ONE))
        .collect()
}

pub fn sample_payee(
    transactions: &[Transaction],
    payee: &str,
    commodity: Option<&str>,
    start: LedgerDate,
    count: usize,
    interval: Interval,
) -> Result<Vec<Decimal>> {
    let end = interval.plus(start, count);
    let values = select_by_payee(transactions, payee, commodity, start, end);
    sample(values, start, count, interval)
}

/// Transactions per bucket, however many postings each one has.
pub fn sample_payee_by_count(
    transactions: &[Transaction],
    payee: &str,
    commodity: Option<&str>,
    start: LedgerDate,
    count: usize,
    interval: Interval,
) -> Result<Vec<Decimal>> {
    let end = interval.plus(start, count);
    let dates = exists_by_payee(transactions, payee, commodity, start, end);
    sample(ones(dates), start, count, interval)
}

pub fn sample_account(
    transactions: &[Transaction],
    account: &str,
    commodity: Option<&str>,
    start: LedgerDate,
    count: usize,
    interval: Interval,
) -> Result<Vec<Decimal>> {
    let end = interval.plus(start, count);
    let values = select_by_account(transactions, account, commodity, start, end);
    sample(values, start, count, interval)
}

pub fn sample_account_by_count(
    transactions: &[Transaction],
    account: &str,
    commodity: Option<&str>,
    start: LedgerDate,
    count: usize,
    interval: Interval,
) -> Result<Vec<Decimal>> {
    let end = interval.plus(start, count);
    let dates = exists_by_account(transactions, account, commodity, start, end);
    sample(ones(dates), start, count, interval)
}
