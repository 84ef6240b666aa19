/*
 * Responsibility
 * - repo が上位に伝える意味の定義
 */
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("db error")]
    Db(#[from] sqlx::Error),
    /// A live row with the same key already exists.
    /// Raised by the repo itself from an empty `ON CONFLICT ... RETURNING`.
    #[error("conflict")]
    Conflict,
}
