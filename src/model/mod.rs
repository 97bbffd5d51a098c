//! Types that represent the core data model, such as `Transaction`, `MonthKey` and `Category`.
mod amount;
mod category;
mod month;
mod transaction;

pub use amount::{Amount, AmountError};
pub use category::{Category, Classifier, OTHER_PLACE};
pub use month::{DateRange, MonthKey, MonthSpan};
pub use transaction::{Transaction, TIMESTAMP_FORMAT};
