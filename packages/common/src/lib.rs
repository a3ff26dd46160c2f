pub mod base62;
pub mod hash;
pub mod key;
pub mod status;
pub mod storage;

pub use hash::ContentHash;
pub use key::{KeyGenerator, make_key};
pub use status::ImageStatus;
