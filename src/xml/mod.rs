//! XML serialization and parsing of block list manifests.

pub mod deserialize;
pub mod serialize;

pub use deserialize::*;
pub use serialize::*;
