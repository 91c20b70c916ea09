mod cents;
mod secret;

pub mod helpers;
pub mod op;

pub use cents::{Cents, CentsConversionError, DEFAULT_CURRENCY_CODE};
pub use secret::Secret;
