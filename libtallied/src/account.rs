use serde::{Deserialize, Serialize};

use std::fmt;

/// A colon separated account path, e.g. `Assets:Checking:ING`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
}

impl Account {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for Account {
    fn from(name: &str) -> Self {
        Account::new(name)
    }
}

#[cfg(test)]
mod tests {
    use crate::account::Account;

    #[test]
    fn display_full_path() {
        let account: Account = "Assets:Bank:Jawir".into();
        assert_eq!(format!("{}", account), "Assets:Bank:Jawir");
        assert_eq!(account, Account::new("Assets:Bank:Jawir"));
    }
}
