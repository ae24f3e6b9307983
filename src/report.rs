use libtallied::{
    balance::BalanceRow,
    outliers::RankedEntry,
    series::Interval,
    LedgerDate, Version,
};

use anyhow::Result;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde_json::json;

use std::io::Write;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

impl Format {
    pub fn new(json: bool) -> Self {
        if json {
            Format::Json
        } else {
            Format::Text
        }
    }
}

pub fn version<W: Write>(version: &Version, format: Format, writer: &mut W) -> Result<()> {
    match format {
        Format::Text => writeln!(writer, "{}", version)?,
        Format::Json => writeln!(writer, "{}", json!({ "version": version.to_string() }))?,
    }
    Ok(())
}

pub fn balances<W: Write>(
    rows: &IndexMap<String, BalanceRow>,
    format: Format,
    writer: &mut W,
) -> Result<()> {
    match format {
        Format::Text => {
            let width = rows.values().map(|r| r.total.to_string().len()).max().unwrap_or(0);
            for row in rows.values() {
                writeln!(
                    writer,
                    "{:>width$} {}  ({} postings)",
                    row.total,
                    row.unit,
                    row.count,
                    width = width
                )?;
            }
        }
        Format::Json => {
            let rows = rows.values().collect::<Vec<_>>();
            writeln!(writer, "{}", serde_json::to_string_pretty(&rows)?)?;
        }
    }
    Ok(())
}

pub fn ranking<W: Write>(entries: &[RankedEntry], format: Format, writer: &mut W) -> Result<()> {
    match format {
        Format::Text => {
            let width = entries.iter().map(|e| e.key.chars().count()).max().unwrap_or(0);
            for entry in entries {
                writeln!(writer, "{:<width$}  {}", entry.key, entry.total, width = width)?;
            }
        }
        Format::Json => writeln!(writer, "{}", serde_json::to_string_pretty(entries)?)?,
    }
    Ok(())
}

/// One line (or JSON object) per bucket, labelled with the bucket's first day.
pub fn series<W: Write>(
    samples: &[Decimal],
    start: LedgerDate,
    interval: Interval,
    format: Format,
    writer: &mut W,
) -> Result<()> {
    let buckets = samples
        .iter()
        .enumerate()
        .map(|(i, value)| (interval.plus(start, i), value));

    match format {
        Format::Text => {
            for (from, value) in buckets {
                writeln!(writer, "{}  {}", from, value)?;
            }
        }
        Format::Json => {
            let buckets = buckets
                .map(|(from, value)| json!({ "from": from.to_string(), "value": value }))
                .collect::<Vec<_>>();
            writeln!(writer, "{}", serde_json::to_string_pretty(&buckets)?)?;
        }
    }
    Ok(())
}
