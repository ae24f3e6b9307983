use crate::{account::Account, amount::Amount};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use std::fmt;

/// Calendar date as written by ledger. Fields are plain integers so interval
/// arithmetic can step through month ends without clamping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LedgerDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl LedgerDate {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }

    /// Closest real calendar date, clamping the day to the month's length.
    pub fn to_naive(&self) -> Option<NaiveDate> {
        let first = NaiveDate::from_ymd_opt(self.year, self.month, 1)?;
        let next_month = if self.month == 12 {
            NaiveDate::from_ymd_opt(self.year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(self.year, self.month + 1, 1)?
        };
        let last_day = next_month.pred_opt()?.day();
        first.with_day(self.day.clamp(1, last_day))
    }
}

impl From<NaiveDate> for LedgerDate {
    fn from(date: NaiveDate) -> Self {
        LedgerDate::new(date.year(), date.month(), date.day())
    }
}

impl fmt::Display for LedgerDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub account: Account,
    pub amount: Option<Amount>,
}

impl Posting {
    pub fn amount_in(&self, commodity: &str) -> Option<&Amount> {
        self.amount.as_ref().filter(|amount| amount.is_in(commodity))
    }

    /// `None` matches every posting, with or without an amount.
    pub fn matches_commodity(&self, commodity: Option<&str>) -> bool {
        match commodity {
            None => true,
            Some(commodity) => self.amount_in(commodity).is_some(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Reconciliation state, `cleared` or `pending`; `None` when unmarked.
    pub state: Option<String>,
    pub date: LedgerDate,
    pub payee: Option<String>,
    pub postings: Vec<Posting>,
}

impl Transaction {
    pub fn is_cleared(&self) -> bool {
        self.state.as_deref() == Some("cleared")
    }

    pub fn has_payee(&self, payee: &str) -> bool {
        self.payee.as_deref() == Some(payee)
    }
}
