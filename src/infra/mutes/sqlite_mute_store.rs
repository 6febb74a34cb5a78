use crate::core::mutes::{MuteError, MuteRecord, MuteStore};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};

/// SQLite-backed mute records. The primary key makes re-mutes overwrite.
pub struct SqliteMuteStore {
    pool: Pool<Sqlite>,
}

impl SqliteMuteStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mutes (
                user_id INTEGER NOT NULL,
                guild_id INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, guild_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn storage_err(e: sqlx::Error) -> MuteError {
    MuteError::StorageError(e.to_string())
}

#[async_trait]
impl MuteStore for SqliteMuteStore {
    async fn upsert_mute(&self, record: MuteRecord) -> Result<(), MuteError> {
        sqlx::query(
            r#"
            INSERT INTO mutes (user_id, guild_id, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id, guild_id) DO UPDATE SET
                expires_at = excluded.expires_at
            "#,
        )
        .bind(record.user_id as i64)
        .bind(record.guild_id as i64)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn remove_mute(&self, user_id: u64, guild_id: u64) -> Result<(), MuteError> {
        sqlx::query("DELETE FROM mutes WHERE user_id = ? AND guild_id = ?")
            .bind(user_id as i64)
            .bind(guild_id as i64)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn all_mutes(&self) -> Result<Vec<MuteRecord>, MuteError> {
        let rows = sqlx::query("SELECT user_id, guild_id, expires_at FROM mutes")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(rows
            .into_iter()
            .map(|row| MuteRecord {
                user_id: row.get::<i64, _>("user_id") as u64,
                guild_id: row.get::<i64, _>("guild_id") as u64,
                expires_at: row.get("expires_at"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteMuteStore {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteMuteStore::new(pool);
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn upsert_overwrites_expiry() {
        let store = store().await;

        store
            .upsert_mute(MuteRecord {
                user_id: 1,
                guild_id: 10,
                expires_at: 100,
            })
            .await
            .unwrap();
        store
            .upsert_mute(MuteRecord {
                user_id: 1,
                guild_id: 10,
                expires_at: 200,
            })
            .await
            .unwrap();

        let mutes = store.all_mutes().await.unwrap();
        assert_eq!(mutes.len(), 1);
        assert_eq!(mutes[0].expires_at, 200);
    }

    #[tokio::test]
    async fn same_user_in_two_guilds_is_two_records() {
        let store = store().await;

        for guild_id in [10, 11] {
            store
                .upsert_mute(MuteRecord {
                    user_id: 1,
                    guild_id,
                    expires_at: 100,
                })
                .await
                .unwrap();
        }
        assert_eq!(store.all_mutes().await.unwrap().len(), 2);

        store.remove_mute(1, 10).await.unwrap();
        let remaining = store.all_mutes().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].guild_id, 11);
    }

    // Mutes must outlive a restart, so check a file-backed database too.
    #[tokio::test]
    async fn records_survive_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/bot.db?mode=rwc", dir.path().display());

        {
            let pool = SqlitePoolOptions::new().connect(&url).await.unwrap();
            let store = SqliteMuteStore::new(pool);
            store.migrate().await.unwrap();
            store
                .upsert_mute(MuteRecord {
                    user_id: 1,
                    guild_id: 10,
                    expires_at: 100,
                })
                .await
                .unwrap();
        }

        let pool = SqlitePoolOptions::new().connect(&url).await.unwrap();
        let store = SqliteMuteStore::new(pool);
        let mutes = store.all_mutes().await.unwrap();
        assert_eq!(mutes.len(), 1);
        assert_eq!(mutes[0].expires_at, 100);
    }
}
