pub mod memory;
pub mod store;
pub mod sweeper;
pub mod valkey;

pub use memory::MemoryTokenStore;
pub use store::{CachedToken, DEFAULT_ROLE, TokenStore, TokenStoreError, TokenStoreResult};
pub use sweeper::TokenSweeper;
pub use valkey::ValkeyTokenStore;
