use crate::core::verification::{ServerStore, VerificationError};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};

/// SQLite-backed server records: one row per guild the bot is in.
pub struct SqliteServerStore {
    pool: Pool<Sqlite>,
}

impl SqliteServerStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS servers (
                guild_id INTEGER PRIMARY KEY,
                verification_role_id INTEGER
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn storage_err(e: sqlx::Error) -> VerificationError {
    VerificationError::StorageError(e.to_string())
}

#[async_trait]
impl ServerStore for SqliteServerStore {
    async fn add_server(&self, guild_id: u64) -> Result<(), VerificationError> {
        sqlx::query(
            r#"
            INSERT INTO servers (guild_id, verification_role_id)
            VALUES (?, NULL)
            ON CONFLICT(guild_id) DO NOTHING
            "#,
        )
        .bind(guild_id as i64)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn remove_server(&self, guild_id: u64) -> Result<(), VerificationError> {
        sqlx::query("DELETE FROM servers WHERE guild_id = ?")
            .bind(guild_id as i64)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn verification_role(&self, guild_id: u64) -> Result<Option<u64>, VerificationError> {
        let row = sqlx::query("SELECT verification_role_id FROM servers WHERE guild_id = ?")
            .bind(guild_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(row.and_then(|row| {
            row.get::<Option<i64>, _>("verification_role_id")
                .map(|id| id as u64)
        }))
    }

    async fn set_verification_role(
        &self,
        guild_id: u64,
        role_id: u64,
    ) -> Result<(), VerificationError> {
        sqlx::query(
            r#"
            INSERT INTO servers (guild_id, verification_role_id)
            VALUES (?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET
                verification_role_id = excluded.verification_role_id
            "#,
        )
        .bind(guild_id as i64)
        .bind(role_id as i64)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn clear_verification_role(&self, guild_id: u64) -> Result<(), VerificationError> {
        sqlx::query("UPDATE servers SET verification_role_id = NULL WHERE guild_id = ?")
            .bind(guild_id as i64)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteServerStore {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteServerStore::new(pool);
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn role_round_trip() {
        let store = store().await;

        assert_eq!(store.verification_role(10).await.unwrap(), None);

        store.set_verification_role(10, 99).await.unwrap();
        assert_eq!(store.verification_role(10).await.unwrap(), Some(99));

        store.clear_verification_role(10).await.unwrap();
        assert_eq!(store.verification_role(10).await.unwrap(), None);
    }

    #[tokio::test]
    async fn add_server_is_idempotent_and_keeps_role() {
        let store = store().await;

        store.add_server(10).await.unwrap();
        store.set_verification_role(10, 99).await.unwrap();
        // Re-adding (e.g. a replayed join event) must not wipe the role
        store.add_server(10).await.unwrap();
        assert_eq!(store.verification_role(10).await.unwrap(), Some(99));

        store.remove_server(10).await.unwrap();
        assert_eq!(store.verification_role(10).await.unwrap(), None);
    }
}
