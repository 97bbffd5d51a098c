use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The label used for anything that is not a dining merchant when breaking spending down by
/// canteen.
pub const OTHER_PLACE: &str = "Other";

/// The spending category of a transaction, derived from its merchant name.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Category {
    Dining,
    Market,
    Other,
}

serde_plain::derive_display_from_serialize!(Category);
serde_plain::derive_fromstr_from_deserialize!(Category);

/// Classifies merchants using two ordered name lists. Dining is checked before market, so a name
/// present in both lists is dining. Matching is exact apart from letter case.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    /// Folded name to the spelling it was configured with. The first spelling wins.
    dining: HashMap<String, String>,
    market: HashSet<String>,
}

impl Classifier {
    pub fn new<S1, S2>(
        dining: impl IntoIterator<Item = S1>,
        market: impl IntoIterator<Item = S2>,
    ) -> Self
    where
        S1: AsRef<str>,
        S2: AsRef<str>,
    {
        let mut dining_names = HashMap::new();
        for name in dining {
            let name = name.as_ref();
            dining_names
                .entry(fold(name))
                .or_insert_with(|| name.to_string());
        }
        Self {
            dining: dining_names,
            market: market.into_iter().map(|s| fold(s.as_ref())).collect(),
        }
    }

    pub fn category(&self, merchant: &str) -> Category {
        let key = fold(merchant);
        if self.dining.contains_key(&key) {
            Category::Dining
        } else if self.market.contains(&key) {
            Category::Market
        } else {
            Category::Other
        }
    }

    /// The canteen-level label: the configured spelling for dining merchants, `Other` for
    /// everything else. Names that differ only in case share one label.
    pub fn dining_place(&self, merchant: &str) -> &str {
        match self.dining.get(&fold(merchant)) {
            Some(name) => name.as_str(),
            None => OTHER_PLACE,
        }
    }
}

fn fold(s: &str) -> String {
    s.to_lowercase()
}
