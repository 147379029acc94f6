mod money;

mod helpers;
mod secret;

pub use helpers::parse_boolean_flag;
pub use money::{Money, MoneyConversionError, DEFAULT_CURRENCY_CODE, MONEY_EPSILON};
pub use secret::Secret;
