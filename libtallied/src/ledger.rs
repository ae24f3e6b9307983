use crate::{
    account::Account,
    amount::Amount,
    parser::{parse_date, xml_events, XmlEvent},
    transaction::{LedgerDate, Posting, Transaction},
    LedgerError, Result,
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ledger packs its major version in the upper 16 bits of the `version`
/// attribute: 196608 is ledger 3.
const SUPPORTED_FORMAT_MAJOR: u32 = 3;

/// Transactions in document order. Immutable once folded.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    transactions: Vec<Transaction>,
}

impl Ledger {
    pub fn new(transactions: Vec<Transaction>) -> Ledger {
        Ledger { transactions }
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn from_xml(input: &str) -> Result<Ledger> {
        Self::from_events(xml_events(input))
    }

    /// Fold a stream of markup events into a ledger. The first error aborts
    /// the fold and everything gathered so far is dropped.
    pub fn from_events<'x, I>(events: I) -> Result<Ledger>
    where
        I: IntoIterator<Item = Result<XmlEvent<'x>>>,
    {
        let mut fold = TreeFold::default();
        for event in events {
            fold.feed(event?)?;
        }
        fold.finish()
    }
}

/// Elements whose character data is kept.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Leaf {
    Date,
    Payee,
    Name,
    Symbol,
    Quantity,
}

/// The value an open element is building.
#[derive(Debug)]
enum Partial {
    Ledger {
        version: Option<String>,
    },
    Transaction {
        state: Option<String>,
        date: Option<LedgerDate>,
        payee: Option<String>,
        postings: Vec<Posting>,
    },
    Postings(Vec<Posting>),
    Posting {
        account: Option<Account>,
        amount: Option<Amount>,
    },
    Account(Option<String>),
    PostAmount(Option<Amount>),
    Amount {
        quantity: Option<Decimal>,
        commodity: Option<String>,
    },
    Commodity(Option<String>),
    Leaf(Leaf, String),
    Ignored,
}

#[derive(Debug)]
struct Frame<'x> {
    name: &'x str,
    partial: Partial,
}

impl<'x> Frame<'x> {
    fn open(event: &XmlEvent<'x>, name: &'x str) -> Frame<'x> {
        let owned_attr = |key| event.attribute(key).map(str::to_string);

        let partial = match name {
            "ledger" => Partial::Ledger {
                version: owned_attr("version"),
            },
            "transaction" => Partial::Transaction {
                state: owned_attr("state"),
                date: None,
                payee: None,
                postings: Vec::new(),
            },
            "postings" => Partial::Postings(Vec::new()),
            "posting" => Partial::Posting {
                account: None,
                amount: None,
            },
            "account" => Partial::Account(None),
            "post-amount" => Partial::PostAmount(None),
            "amount" => Partial::Amount {
                quantity: None,
                commodity: None,
            },
            "commodity" => Partial::Commodity(None),
            "date" => Partial::Leaf(Leaf::Date, String::new()),
            "payee" => Partial::Leaf(Leaf::Payee, String::new()),
            "name" => Partial::Leaf(Leaf::Name, String::new()),
            "symbol" => Partial::Leaf(Leaf::Symbol, String::new()),
            "quantity" => Partial::Leaf(Leaf::Quantity, String::new()),
            _ => Partial::Ignored,
        };

        Frame { name, partial }
    }
}

#[derive(Default)]
struct TreeFold<'x> {
    stack: Vec<Frame<'x>>,
    transactions: Vec<Transaction>,
}

impl<'x> TreeFold<'x> {
    fn feed(&mut self, event: XmlEvent<'x>) -> Result<()> {
        match event {
            XmlEvent::Start { name, .. } => {
                let frame = Frame::open(&event, name);
                self.stack.push(frame);
            }
            XmlEvent::Text(fragment) => {
                if let Some(Frame {
                    partial: Partial::Leaf(_, text),
                    ..
                }) = self.stack.last_mut()
                {
                    text.push_str(&fragment);
                }
            }
            XmlEvent::End { name } => self.close(name)?,
        }
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<()> {
        let frame = match self.stack.pop() {
            Some(frame) if frame.name == name => frame,
            Some(frame) => {
                return Err(LedgerError::XmlSyntax(format!(
                    "</{}> closes <{}>",
                    name, frame.name
                )))
            }
            None => {
                return Err(LedgerError::XmlSyntax(format!(
                    "</{}> without an open element",
                    name
                )))
            }
        };

        match (frame.partial, self.stack.last_mut()) {
            (Partial::Ledger { version }, None) => check_version(version)?,
            (_, None) => {
                return Err(LedgerError::XmlSyntax(format!(
                    "root element <{}> is not <ledger>",
                    frame.name
                )))
            }
            (
                Partial::Transaction {
                    state,
                    date,
                    payee,
                    postings,
                },
                Some(_),
            ) => {
                let date = date.ok_or(LedgerError::MissingElement {
                    element: "transaction",
                    child: "date",
                })?;
                self.transactions.push(Transaction {
                    state,
                    date,
                    payee,
                    postings,
                });
            }
            (child, Some(parent)) => fold_into(&mut parent.partial, child)?,
        }

        Ok(())
    }

    fn finish(self) -> Result<Ledger> {
        if let Some(open) = self.stack.last() {
            return Err(LedgerError::XmlSyntax(format!(
                "stream ended inside <{}>",
                open.name
            )));
        }

        debug!(transactions = self.transactions.len(), "ledger xml folded");
        Ok(Ledger::new(self.transactions))
    }
}

/// Hand a closed element's value to its parent.
fn fold_into(parent: &mut Partial, child: Partial) -> Result<()> {
    match (child, parent) {
        (Partial::Leaf(Leaf::Date, text), Partial::Transaction { date, .. }) => {
            *date = Some(parse_date(&text)?);
        }
        (Partial::Leaf(Leaf::Payee, text), Partial::Transaction { payee, .. }) => {
            *payee = Some(text);
        }
        (Partial::Postings(list), Partial::Transaction { postings, .. }) => {
            *postings = list;
        }
        (Partial::Leaf(Leaf::Name, text), Partial::Account(name)) => {
            *name = Some(text);
        }
        (Partial::Account(name), Partial::Posting { account, .. }) => {
            let name = name.ok_or(LedgerError::MissingElement {
                element: "account",
                child: "name",
            })?;
            *account = Some(Account::new(name));
        }
        (Partial::PostAmount(value), Partial::Posting { amount, .. }) => {
            *amount = value;
        }
        (Partial::Posting { account, amount }, Partial::Postings(list)) => {
            let account = account.ok_or(LedgerError::MissingElement {
                element: "posting",
                child: "account",
            })?;
            list.push(Posting { account, amount });
        }
        (Partial::Amount { quantity, commodity }, Partial::PostAmount(value)) => {
            let quantity = quantity.ok_or(LedgerError::MissingElement {
                element: "amount",
                child: "quantity",
            })?;
            *value = Some(Amount {
                quantity,
                commodity: commodity.unwrap_or_default(),
            });
        }
        (Partial::Leaf(Leaf::Symbol, text), Partial::Commodity(symbol)) => {
            *symbol = Some(text);
        }
        (Partial::Commodity(symbol), Partial::Amount { commodity, .. }) => {
            *commodity = symbol;
        }
        (Partial::Leaf(Leaf::Quantity, text), Partial::Amount { quantity, .. }) => {
            *quantity = Some(parse_quantity(&text)?);
        }
        _ => {}
    }

    Ok(())
}

fn check_version(version: Option<String>) -> Result<()> {
    let raw = version.unwrap_or_default();
    match raw.trim().parse::<u32>() {
        Ok(format) if format >> 16 == SUPPORTED_FORMAT_MAJOR => Ok(()),
        _ => Err(LedgerError::UnsupportedVersion(raw)),
    }
}

/// Digits beyond the 28 a `Decimal` holds are rounded off; only values past
/// its range are rejected.
fn parse_quantity(text: &str) -> Result<Decimal> {
    text.trim()
        .parse::<Decimal>()
        .map_err(|_| LedgerError::QuantityParse(text.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::ledger::Ledger;
    use crate::parser::XmlEvent;
    use crate::transaction::LedgerDate;
    use crate::LedgerError;

    use anyhow::Result;
    use rust_decimal_macros::dec;

    pub(crate) const TWO_TRANSACTIONS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<ledger version="196608">
  <commodities>
    <commodity flags="S">
      <symbol>€</symbol>
    </commodity>
  </commodities>
  <accounts>
    <account id="0x1">
      <name>Assets</name>
      <account id="0x2"><name>Checking</name></account>
    </account>
  </accounts>
  <transactions>
    <transaction state="cleared">
      <date>2013/01/01</date>
      <payee>Fish &amp; Chips</payee>
      <postings>
        <posting>
          <account ref="0x3"><name>Expenses:Food</name></account>
          <post-amount>
            <amount>
              <commodity flags="S"><symbol>€</symbol></commodity>
              <quantity>12.50</quantity>
            </amount>
          </post-amount>
          <total>
            <amount>
              <commodity flags="S"><symbol>€</symbol></commodity>
              <quantity>999</quantity>
            </amount>
          </total>
        </posting>
        <posting>
          <account ref="0x2"><name>Assets:Checking</name></account>
          <post-amount>
            <amount>
              <commodity flags="S"><symbol>€</symbol></commodity>
              <quantity>-12.50</quantity>
            </amount>
          </post-amount>
        </posting>
      </postings>
    </transaction>
    <transaction>
      <date>2013/02/03</date>
      <payee>Landlord</payee>
      <postings>
        <posting>
          <account ref="0x4"><name>Expenses:Rent</name></account>
          <post-amount>
            <amount>
              <commodity flags="S"><symbol>€</symbol></commodity>
              <quantity>700</quantity>
            </amount>
          </post-amount>
        </posting>
        <posting>
          <account ref="0x2"><name>Assets:Checking</name></account>
        </posting>
      </postings>
    </transaction>
  </transactions>
</ledger>
"#;

    fn wrap(transactions: &str) -> String {
        format!(
            r#"<ledger version="196608"><transactions>{}</transactions></ledger>"#,
            transactions
        )
    }

    #[test]
    fn fold_two_transactions() -> Result<()> {
        let ledger = Ledger::from_xml(TWO_TRANSACTIONS)?;

        assert_eq!(ledger.len(), 2);
        assert_eq!(
            ledger.transactions().iter().filter(|t| t.is_cleared()).count(),
            1
        );
        assert_eq!(ledger.transactions()[1].state, None);
        assert_eq!(ledger.transactions()[0].date, LedgerDate::new(2013, 1, 1));
        assert_eq!(ledger.transactions()[1].date, LedgerDate::new(2013, 2, 3));
        Ok(())
    }

    #[test]
    fn fold_postings() -> Result<()> {
        let ledger = Ledger::from_xml(TWO_TRANSACTIONS)?;
        let first = &ledger.transactions()[0];

        assert_eq!(first.postings.len(), 2);
        assert_eq!(first.postings[0].account.name, "Expenses:Food");
        let amount = first.postings[0]
            .amount
            .as_ref()
            .ok_or(anyhow::anyhow!("amount expected"))?;
        assert_eq!(amount.quantity, dec!(12.50));
        assert_eq!(amount.commodity, "€");
        assert_eq!(
            first.postings[1].amount.as_ref().map(|a| a.quantity),
            Some(dec!(-12.50))
        );

        let rent = &ledger.transactions()[1];
        assert_eq!(rent.postings[1].account.name, "Assets:Checking");
        assert_eq!(rent.postings[1].amount, None);
        Ok(())
    }

    #[test]
    fn concatenate_text_fragments() -> Result<()> {
        let ledger = Ledger::from_xml(TWO_TRANSACTIONS)?;
        assert_eq!(
            ledger.transactions()[0].payee.as_deref(),
            Some("Fish & Chips")
        );

        let events = vec![
            XmlEvent::Start {
                name: "ledger",
                attributes: vec![("version", "196608".into())],
            },
            XmlEvent::Start {
                name: "transaction",
                attributes: vec![],
            },
            XmlEvent::Start {
                name: "payee",
                attributes: vec![],
            },
            XmlEvent::Text("Gubuk ".into()),
            XmlEvent::Text("mang ".into()),
            XmlEvent::Text("Engking".into()),
            XmlEvent::End { name: "payee" },
            XmlEvent::Start {
                name: "date",
                attributes: vec![],
            },
            XmlEvent::Text("2021/".into()),
            XmlEvent::Text("04/01".into()),
            XmlEvent::End { name: "date" },
            XmlEvent::End {
                name: "transaction",
            },
            XmlEvent::End { name: "ledger" },
        ];
        let ledger = Ledger::from_events(events.into_iter().map(Ok))?;

        assert_eq!(
            ledger.transactions()[0].payee.as_deref(),
            Some("Gubuk mang Engking")
        );
        assert_eq!(ledger.transactions()[0].date, LedgerDate::new(2021, 4, 1));
        assert!(ledger.transactions()[0].postings.is_empty());
        Ok(())
    }

    #[test]
    fn reject_unsupported_version() {
        let xml = TWO_TRANSACTIONS.replace("196608", "131072");
        match Ledger::from_xml(&xml) {
            Err(LedgerError::UnsupportedVersion(version)) => assert_eq!(version, "131072"),
            other => panic!("expected unsupported version, got {:?}", other),
        }

        let xml = TWO_TRANSACTIONS.replace(r#" version="196608""#, "");
        assert!(matches!(
            Ledger::from_xml(&xml),
            Err(LedgerError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn accept_later_format_revisions() -> Result<()> {
        let xml = TWO_TRANSACTIONS.replace("196608", "196609");
        assert_eq!(Ledger::from_xml(&xml)?.len(), 2);
        Ok(())
    }

    #[test]
    fn reject_bad_dates() {
        let xml = wrap("<transaction><date>yesterday</date></transaction>");
        assert!(matches!(
            Ledger::from_xml(&xml),
            Err(LedgerError::DateParse(_))
        ));

        let xml = wrap("<transaction><payee>nobody</payee></transaction>");
        assert!(matches!(
            Ledger::from_xml(&xml),
            Err(LedgerError::MissingElement {
                element: "transaction",
                child: "date"
            })
        ));
    }

    #[test]
    fn reject_bad_quantities() {
        let xml = wrap(
            "<transaction><date>2013/01/01</date><postings><posting>\
             <account><name>A</name></account>\
             <post-amount><amount><quantity>12,5</quantity></amount></post-amount>\
             </posting></postings></transaction>",
        );
        assert!(matches!(
            Ledger::from_xml(&xml),
            Err(LedgerError::QuantityParse(_))
        ));
    }

    #[test]
    fn round_long_quantities() -> Result<()> {
        let xml = wrap(
            "<transaction><date>2013/01/01</date><postings><posting>\
             <account><name>A</name></account>\
             <post-amount><amount><quantity>0.12345678901234567890123456789</quantity></amount></post-amount>\
             </posting></postings></transaction>",
        );
        let ledger = Ledger::from_xml(&xml)?;
        let quantity = ledger.transactions()[0].postings[0]
            .amount
            .as_ref()
            .map(|a| a.quantity)
            .ok_or(anyhow::anyhow!("amount expected"))?;

        assert!((quantity - dec!(0.1234567890123456789012345678)).abs() <= dec!(0.0000000000000000000000000001));
        Ok(())
    }

    #[test]
    fn reject_out_of_range_quantities() {
        let xml = wrap(
            "<transaction><date>2013/01/01</date><postings><posting>\
             <account><name>A</name></account>\
             <post-amount><amount><quantity>792281625142643375935439503350</quantity></amount></post-amount>\
             </posting></postings></transaction>",
        );
        assert!(matches!(
            Ledger::from_xml(&xml),
            Err(LedgerError::QuantityParse(_))
        ));
    }

    #[test]
    fn reject_foreign_root_element() {
        let xml = "<transactions><transaction><date>2013/01/01</date></transaction></transactions>";
        assert!(matches!(
            Ledger::from_xml(xml),
            Err(LedgerError::XmlSyntax(msg)) if msg.contains("<transactions>")
        ));
    }

    #[test]
    fn amount_without_commodity() -> Result<()> {
        let xml = wrap(
            "<transaction><date>2013/01/01</date><postings><posting>\
             <account><name>A</name></account>\
             <post-amount><amount><quantity>3</quantity></amount></post-amount>\
             </posting></postings></transaction>",
        );
        let ledger = Ledger::from_xml(&xml)?;
        let amount = ledger.transactions()[0].postings[0].amount.clone();
        assert_eq!(amount.map(|a| (a.quantity, a.commodity)), Some((dec!(3), String::new())));
        Ok(())
    }

    #[test]
    fn abort_on_malformed_xml() {
        let xml = TWO_TRANSACTIONS.replace("</payee>", "</payer>");
        assert!(matches!(
            Ledger::from_xml(&xml),
            Err(LedgerError::XmlSyntax(_))
        ));
    }

    #[test]
    fn abort_on_source_error() {
        let events = vec![
            Ok(XmlEvent::Start {
                name: "ledger",
                attributes: vec![("version", "196608".into())],
            }),
            Err(LedgerError::XmlSyntax("truncated".to_string())),
        ];
        assert!(matches!(
            Ledger::from_events(events),
            Err(LedgerError::XmlSyntax(msg)) if msg == "truncated"
        ));
    }

    #[test]
    fn reject_unbalanced_streams() {
        let events = vec![Ok(XmlEvent::Start {
            name: "ledger",
            attributes: vec![],
        })];
        assert!(matches!(
            Ledger::from_events(events),
            Err(LedgerError::XmlSyntax(_))
        ));

        let events = vec![Ok(XmlEvent::End { name: "ledger" })];
        assert!(matches!(
            Ledger::from_events(events),
            Err(LedgerError::XmlSyntax(_))
        ));
    }
}
