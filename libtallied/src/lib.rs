//! Tallied - analytics over the XML reports of the `ledger` accounting tool
//! ---
//!
//! Tallied runs `ledger xml`, folds the report into an in-memory [`Ledger`],
//! memoizes those folds per ledger file, and derives commodity balances,
//! payee/account outlier rankings and calendar bucketed time series from it.
//!

extern crate pest;
#[macro_use]
extern crate pest_derive;

mod account;
mod amount;

/// Commodity totals.
pub mod balance;

/// Memoized queries, dropped per ledger file when that file changes.
pub mod cache;

/// Ledger representation, and the fold that builds it from XML events.
pub mod ledger;

/// Payees and accounts ranked by how far they pull the average.
pub mod outliers;

/// Markup events, version banners and ledger dates.
pub mod parser;

/// Talking to the `ledger` executable.
pub mod runner;

/// Calendar bucketed series.
pub mod series;

mod transaction;

/// Period and account filters turned into query arguments.
pub mod view;

pub use account::Account;
pub use amount::Amount;
pub use cache::QueryCache;
pub use ledger::Ledger;
pub use parser::Version;
pub use runner::{query, version, LedgerCli, Runner};
pub use transaction::{LedgerDate, Posting, Transaction};

use thiserror::Error;

/// Everything that can abort a query or an analysis. Nothing is retried and
/// no partial result survives an error.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("cmd {program} {args:?} failed with return code {code:?}: [\n{stderr}]")]
    Process {
        program: String,
        args: Vec<String>,
        code: Option<i32>,
        stderr: String,
    },
    #[error("cannot spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse version '{0}'")]
    VersionParse(String),
    #[error("untested version \"{0}\"")]
    UnsupportedVersion(String),
    #[error("malformed xml: {0}")]
    XmlSyntax(String),
    #[error("cannot parse date '{0}'")]
    DateParse(String),
    #[error("cannot parse quantity '{0}'")]
    QuantityParse(String),
    #[error("<{element}> without <{child}>")]
    MissingElement {
        element: &'static str,
        child: &'static str,
    },
    #[error("division by zero while scoring '{0}'")]
    DivisionByZero(String),
    #[error("decimal overflow while {0}")]
    Overflow(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
