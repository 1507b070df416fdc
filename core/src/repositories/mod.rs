pub mod token;

pub use token::{MemoryTokenStore, TokenStore};
