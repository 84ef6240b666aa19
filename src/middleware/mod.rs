/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth: bearer 認証 / role gate、http: request-id / trace / limit / timeout、cors
 */
pub mod auth;
pub mod cors;
pub mod http;
