use crate::{LedgerError, Result};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use std::fmt;

/// A quantity of one commodity. Quantities stay decimal all the way through;
/// only presentation code may turn them into floats.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    pub quantity: Decimal,
    pub commodity: String,
}

impl Amount {
    pub fn new(quantity: Decimal, commodity: impl Into<String>) -> Self {
        Self {
            quantity,
            commodity: commodity.into(),
        }
    }

    pub fn is_in(&self, commodity: &str) -> bool {
        self.commodity == commodity
    }
}

/// `*total += value`, failing instead of panicking past the decimal range.
pub(crate) fn accumulate(total: &mut Decimal, value: Decimal, what: &str) -> Result<()> {
    *total = total
        .checked_add(value)
        .ok_or_else(|| LedgerError::Overflow(what.to_string()))?;
    Ok(())
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.commodity.is_empty() {
            write!(f, "{}", self.quantity)
        } else {
            write!(f, "{} {}", self.quantity, self.commodity)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::amount::{accumulate, Amount};
    use crate::LedgerError;

    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[test]
    fn match_commodity() {
        let lunch = Amount::new(dec!(12.10), "€");

        assert!(lunch.is_in("€"));
        assert!(!lunch.is_in("¥"));
    }

    #[test]
    fn display_amounts() {
        assert_eq!(format!("{}", Amount::new(dec!(-28), "€")), "-28 €");
        assert_eq!(format!("{}", Amount::new(dec!(3), "")), "3");
    }

    #[test]
    fn accumulate_within_range() -> anyhow::Result<()> {
        let mut total = dec!(0.1);
        accumulate(&mut total, dec!(0.2), "summing")?;
        assert_eq!(total, dec!(0.3));
        Ok(())
    }

    #[test]
    fn accumulate_reports_overflow() {
        let mut total = Decimal::MAX;
        let result = accumulate(&mut total, Decimal::ONE, "summing X");

        assert!(matches!(result, Err(LedgerError::Overflow(what)) if what == "summing X"));
        assert_eq!(total, Decimal::MAX);
    }
}
