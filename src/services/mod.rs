/*
 * Responsibility
 * - ドメインサービス層 (auth, identity provider, token store, cache client)
 */
pub mod auth;
pub mod cache;
pub mod identity;
pub mod token_store;
