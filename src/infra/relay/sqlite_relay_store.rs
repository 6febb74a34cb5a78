use crate::core::relay::{RelayError, RelayPost, RelayStore};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Sqlite};

/// SQLite-backed relay ledger and ban list.
pub struct SqliteRelayStore {
    pool: Pool<Sqlite>,
}

impl SqliteRelayStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS relay_posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                message_id INTEGER NOT NULL,
                posted_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS relay_bans (
                user_id INTEGER PRIMARY KEY
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn storage_err(e: sqlx::Error) -> RelayError {
    RelayError::StorageError(e.to_string())
}

#[async_trait]
impl RelayStore for SqliteRelayStore {
    async fn record_post(&self, post: RelayPost) -> Result<(), RelayError> {
        sqlx::query(
            r#"
            INSERT INTO relay_posts (user_id, message_id, posted_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(post.user_id as i64)
        .bind(post.message_id as i64)
        .bind(post.posted_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn ban(&self, user_id: u64) -> Result<(), RelayError> {
        sqlx::query("INSERT INTO relay_bans (user_id) VALUES (?) ON CONFLICT(user_id) DO NOTHING")
            .bind(user_id as i64)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn unban(&self, user_id: u64) -> Result<(), RelayError> {
        sqlx::query("DELETE FROM relay_bans WHERE user_id = ?")
            .bind(user_id as i64)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn is_banned(&self, user_id: u64) -> Result<bool, RelayError> {
        let row = sqlx::query("SELECT user_id FROM relay_bans WHERE user_id = ?")
            .bind(user_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::Row;

    async fn store() -> SqliteRelayStore {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteRelayStore::new(pool);
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn ban_round_trip() {
        let store = store().await;

        assert!(!store.is_banned(1).await.unwrap());
        store.ban(1).await.unwrap();
        // Double-ban is a no-op
        store.ban(1).await.unwrap();
        assert!(store.is_banned(1).await.unwrap());

        store.unban(1).await.unwrap();
        assert!(!store.is_banned(1).await.unwrap());
    }

    #[tokio::test]
    async fn posts_append() {
        let store = store().await;

        store
            .record_post(RelayPost {
                user_id: 1,
                message_id: 555,
                posted_at: 1_000,
            })
            .await
            .unwrap();
        store
            .record_post(RelayPost {
                user_id: 1,
                message_id: 556,
                posted_at: 1_001,
            })
            .await
            .unwrap();

        let row = sqlx::query("SELECT COUNT(*) AS n FROM relay_posts")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(row.get::<i64, _>("n"), 2);
    }
}
