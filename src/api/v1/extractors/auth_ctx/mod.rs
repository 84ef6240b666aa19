/*!
 * Authentication context extractors
 *
 * Responsibility:
 * - access middleware が extensions に格納した AuthenticatedIdentity を handler に渡す
 * - logout 用に、提示された bearer token そのものも取り出せるようにする
 *
 * Public API:
 * - AuthIdentity
 * - BearerToken
 */

mod core;

pub use core::{AuthIdentity, BearerToken};
