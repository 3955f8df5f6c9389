/// Model inputs and the named requirements models declare for them
pub mod batch;

/// Batcher
pub mod batcher;

pub use batch::{Batch, Requirement};
pub use batcher::{Batcher, Item, Train};
