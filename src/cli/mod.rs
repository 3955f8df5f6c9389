/// Model argument declarations and parsing
pub mod arguments;

pub use arguments::{Argument, ArgumentError, ArgumentGroup, ModelArgs};
