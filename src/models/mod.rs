//! Data models for block and page blob uploads.

mod blob;
mod block;
mod page;

pub use blob::*;
pub use block::*;
pub use page::*;
