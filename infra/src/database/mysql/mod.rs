//! MySQL implementations of core storage contracts

mod token_store;

pub use token_store::MySqlTokenStore;
