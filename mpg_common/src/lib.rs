mod amount;

pub mod helpers;
mod secret;

pub use amount::{Amount, AmountConversionError, DEFAULT_CURRENCY};
pub use secret::Secret;
