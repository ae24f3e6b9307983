use serde::{Deserialize, Serialize};

/// A slice of the ledger: an optional period expression (anything ledger
/// accepts after `--period`) and an optional account pattern.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerView {
    pub period: Option<String>,
    pub account_filter: Option<String>,
}

impl LedgerView {
    pub fn new(period: Option<String>, account_filter: Option<String>) -> Self {
        Self {
            period,
            account_filter,
        }
    }

    pub fn expenses(period: Option<String>) -> Self {
        Self::new(period, Some("^Expenses".to_string()))
    }

    pub fn income(period: Option<String>) -> Self {
        Self::new(period, Some("^Income".to_string()))
    }

    /// Query arguments selecting this view, period first.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(period) = &self.period {
            args.push("--period".to_string());
            args.push(period.clone());
        }
        args.extend(self.account_filter.iter().cloned());
        args
    }
}

#[cfg(test)]
mod tests {
    use crate::view::LedgerView;

    #[test]
    fn everything_by_default() {
        assert!(LedgerView::default().args().is_empty());
    }

    #[test]
    fn expenses_of_a_period() {
        let view = LedgerView::expenses(Some("last month".to_string()));
        assert_eq!(view.args(), vec!["--period", "last month", "^Expenses"]);
    }

    #[test]
    fn income_of_all_time() {
        assert_eq!(LedgerView::income(None).args(), vec!["^Income"]);
    }

    #[test]
    fn views_differ_only_by_filter() {
        let period = Some("2013".to_string());
        let expenses = LedgerView::expenses(period.clone());
        let income = LedgerView::income(period);

        assert_eq!(expenses.period, income.period);
        assert_ne!(expenses.account_filter, income.account_filter);
    }
}
