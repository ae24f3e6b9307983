use crate::{amount::accumulate, ledger::Ledger, Result};

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BalanceRow {
    pub unit: String,
    pub total: Decimal,
    /// Number of postings that contributed to `total`.
    pub count: usize,
}

/// Sum every posting amount per commodity, in the order commodities are
/// first seen. Postings without an amount are skipped. A total beyond the
/// decimal range is an `Overflow` error.
pub fn balances(ledger: &Ledger) -> Result<IndexMap<String, BalanceRow>> {
    let amounts = ledger
        .transactions()
        .iter()
        .flat_map(|transaction| &transaction.postings)
        .filter_map(|posting| posting.amount.as_ref());

    let mut rows: IndexMap<String, BalanceRow> = IndexMap::new();
    for amount in amounts {
        let row = rows
            .entry(amount.commodity.clone())
            .or_insert_with(|| BalanceRow {
                unit: amount.commodity.clone(),
                total: Decimal::ZERO,
                count: 0,
            });
        accumulate(
            &mut row.total,
            amount.quantity,
            &format!("summing {}", amount.commodity),
        )?;
        row.count += 1;
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use crate::balance::balances;
    use crate::ledger::{tests::TWO_TRANSACTIONS, Ledger};
    use crate::{Account, Amount, LedgerDate, LedgerError, Posting, Transaction};

    use anyhow::Result;
    use rust_decimal_macros::dec;

    fn transaction(postings: &[(&str, Option<(rust_decimal::Decimal, &str)>)]) -> Transaction {
        Transaction {
            state: None,
            date: LedgerDate::new(2013, 1, 1),
            payee: None,
            postings: postings
                .iter()
                .map(|(account, amount)| Posting {
                    account: Account::new(*account),
                    amount: amount.map(|(q, c)| Amount::new(q, c)),
                })
                .collect(),
        }
    }

    #[test]
    fn sum_per_commodity() -> Result<()> {
        let ledger = Ledger::from_xml(TWO_TRANSACTIONS)?;
        let rows = balances(&ledger)?;

        assert_eq!(rows.len(), 1);
        assert_eq!(rows["€"].total, dec!(700));
        assert_eq!(rows["€"].count, 3);
        Ok(())
    }

    #[test]
    fn keep_commodities_apart() -> Result<()> {
        let ledger = Ledger::new(vec![
            transaction(&[("A", Some((dec!(12), "€"))), ("B", Some((dec!(1200), "¥")))]),
            transaction(&[("C", Some((dec!(-28), "€"))), ("D", None)]),
            transaction(&[("C", Some((dec!(-60.21), "€")))]),
        ]);
        let rows = balances(&ledger)?;

        assert_eq!(rows.keys().collect::<Vec<_>>(), vec!["€", "¥"]);
        assert_eq!(rows["€"].total, dec!(-76.21));
        assert_eq!(rows["€"].count, 3);
        assert_eq!(rows["¥"].total, dec!(1200));
        assert_eq!(rows["¥"].unit, "¥");
        Ok(())
    }

    #[test]
    fn independent_of_transaction_order() -> Result<()> {
        let forward = vec![
            transaction(&[("A", Some((dec!(0.1), "$")))]),
            transaction(&[("B", Some((dec!(0.2), "$")))]),
            transaction(&[("C", Some((dec!(-0.3), "$"))), ("D", Some((dec!(5), "€")))]),
        ];
        let mut backward = forward.clone();
        backward.reverse();

        let forward = balances(&Ledger::new(forward))?;
        let backward = balances(&Ledger::new(backward))?;

        assert_eq!(forward["$"].total, dec!(0));
        assert_eq!(forward["$"], backward["$"]);
        assert_eq!(forward["€"], backward["€"]);
        Ok(())
    }

    #[test]
    fn empty_ledger_has_no_rows() -> Result<()> {
        assert!(balances(&Ledger::default())?.is_empty());
        Ok(())
    }

    #[test]
    fn overflowing_total_is_an_error() -> Result<()> {
        let xml = r#"<ledger version="196608"><transactions><transaction>
            <date>2013/01/01</date><postings>
            <posting><account><name>A</name></account><post-amount><amount>
              <commodity><symbol>X</symbol></commodity>
              <quantity>79228162514264337593543950335</quantity>
            </amount></post-amount></posting>
            <posting><account><name>B</name></account><post-amount><amount>
              <commodity><symbol>X</symbol></commodity>
              <quantity>1</quantity>
            </amount></post-amount></posting>
            </postings></transaction></transactions></ledger>"#;
        let ledger = Ledger::from_xml(xml)?;

        assert!(matches!(
            balances(&ledger),
            Err(LedgerError::Overflow(what)) if what == "summing X"
        ));
        Ok(())
    }
}
