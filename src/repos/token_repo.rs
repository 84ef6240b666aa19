/*
 * Responsibility
 * - auth_tokens テーブル向け SQLx 操作 (TokenStore の Postgres 実装)
 * - token は PRIMARY KEY (一意性は DB が保証する)
 * - 期限切れ行は lookup で除外し、purge_expired で物理削除する
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::repos::error::RepoError;
use crate::services::token_store::{CachedToken, TokenStore, TokenStoreError, TokenStoreResult};

#[derive(Clone, Debug)]
pub struct PgTokenRepo {
    pool: PgPool,
}

impl PgTokenRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply embedded migrations (creates `auth_tokens`).
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub async fn find_active(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CachedToken>, RepoError> {
        let row = sqlx::query_as::<_, CachedToken>(
            r#"
            SELECT token, uid, uname, role, "expiresAt", "createdAt"
            FROM auth_tokens
            WHERE token = $1
                AND "expiresAt" > $2
            "#,
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Insert a verified token.
    ///
    /// An existing row with the same token is only overwritten when it has
    /// already expired (not yet swept); a live row yields `RepoError::Conflict`.
    pub async fn insert(&self, record: &CachedToken, now: DateTime<Utc>) -> Result<(), RepoError> {
        let inserted = sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO auth_tokens (token, uid, uname, role, "expiresAt", "createdAt")
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (token) DO UPDATE
            SET
                uid = EXCLUDED.uid,
                uname = EXCLUDED.uname,
                role = EXCLUDED.role,
                "expiresAt" = EXCLUDED."expiresAt",
                "createdAt" = EXCLUDED."createdAt"
            WHERE auth_tokens."expiresAt" <= $7
            RETURNING token
            "#,
        )
        .bind(&record.token)
        .bind(&record.subject_id)
        .bind(&record.subject_name)
        .bind(&record.role)
        .bind(record.expires_at)
        .bind(record.created_at)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(_) => Ok(()),
            None => Err(RepoError::Conflict),
        }
    }

    pub async fn delete_by_token(&self, token: &str) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            DELETE FROM auth_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_by_uid(&self, uid: &str) -> Result<u64, RepoError> {
        let result = sqlx::query(
            r#"
            DELETE FROM auth_tokens
            WHERE uid = $1
            "#,
        )
        .bind(uid)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, RepoError> {
        let result = sqlx::query(
            r#"
            DELETE FROM auth_tokens
            WHERE "expiresAt" <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

impl From<RepoError> for TokenStoreError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Conflict => TokenStoreError::Conflict,
            RepoError::Db(e) => TokenStoreError::Backend(e.to_string()),
        }
    }
}

#[async_trait]
impl TokenStore for PgTokenRepo {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn lookup(&self, token: &str) -> TokenStoreResult<Option<CachedToken>> {
        Ok(self.find_active(token, Utc::now()).await?)
    }

    async fn insert(&self, record: CachedToken) -> TokenStoreResult<()> {
        Ok(PgTokenRepo::insert(self, &record, Utc::now()).await?)
    }

    async fn delete_by_token(&self, token: &str) -> TokenStoreResult<bool> {
        Ok(PgTokenRepo::delete_by_token(self, token).await?)
    }

    async fn delete_all_by_subject(&self, subject_id: &str) -> TokenStoreResult<u64> {
        Ok(self.delete_by_uid(subject_id).await?)
    }

    async fn purge_expired(&self) -> TokenStoreResult<u64> {
        Ok(self.delete_expired(Utc::now()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_errors_map_to_store_errors() {
        assert!(matches!(
            TokenStoreError::from(RepoError::Conflict),
            TokenStoreError::Conflict
        ));

        // Database faults are never reported as a conflict.
        let err = TokenStoreError::from(RepoError::from(sqlx::Error::PoolTimedOut));
        assert!(matches!(err, TokenStoreError::Backend(_)));
    }
}
