pub mod export;
pub mod import;

pub use export::*;
pub use import::*;

/// Column headers of the expense sheet. The home amount column is named
/// after the home currency, e.g. `Amount_LKR`.
pub const COL_DATE: &str = "Date";
pub const COL_DESCRIPTION: &str = "Description";
pub const COL_CATEGORY: &str = "Category";
pub const COL_PAID_BY: &str = "Paid_By";
pub const COL_ORIGINAL_AMOUNT: &str = "Original_Amount";
pub const COL_ORIGINAL_CURRENCY: &str = "Original_Currency";
pub const COL_HOME_AMOUNT_PREFIX: &str = "Amount_";
pub const COL_SPLIT_BETWEEN: &str = "Split_Between";
pub const COL_NAME: &str = "Name";
