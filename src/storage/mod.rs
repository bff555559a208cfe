//! Storage backends implementing the upload transports.

mod memory;

pub use memory::*;
