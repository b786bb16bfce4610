pub mod command_stream;
pub mod error;
pub mod interrupt;

pub use error::{FerryError, Result};
pub use interrupt::Interrupt;
