mod checksum;
pub mod leb128;
pub mod mutf8;

pub use checksum::*;
