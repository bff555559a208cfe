//! Chunked, concurrent upload streams.

mod buffer;
mod dispatch;
mod fault;
mod stream;
mod worker;

pub use buffer::*;
pub use dispatch::*;
pub use fault::*;
pub use stream::*;
pub use worker::*;
