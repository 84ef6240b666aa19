pub mod error;
pub mod token_repo;
