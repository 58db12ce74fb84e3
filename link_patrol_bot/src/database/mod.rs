use std::str::FromStr;

use chrono::{DateTime, Utc};
pub use sqlx::Error;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Executor, Row,
};
use teloxide::types::{ChatId, UserId};

use crate::warnings::WarningRecord;

type Pool = sqlx::Pool<sqlx::Sqlite>;

/// Optional on-disk snapshot of the monitored chats and warning counters, so
/// they survive a restart. Moderation works the same without it.
#[derive(Clone, Debug)]
pub struct Database {
    pool: Pool,
}

impl Database {
    /// Open the snapshot at `path`, creating the file if needed.
    pub async fn open(path: &str) -> Result<Database, Error> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{path}"))?
            .create_if_missing(true)
            .busy_timeout(std::time::Duration::from_secs(60));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    #[cfg(test)]
    pub async fn in_memory() -> Result<Database, Error> {
        // One connection, or every connection gets its own empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: Pool) -> Result<Database, Error> {
        // MONITORED_CHATS:
        // chat_id (unique primary key, integer)
        pool.execute(sqlx::query(
            "
                CREATE TABLE IF NOT EXISTS monitored_chats (
                    chat_id INTEGER PRIMARY KEY NOT NULL
                ) STRICT;",
        ))
        .await?;

        // WARNINGS:
        // user_id (unique primary key, integer)
        // count (warnings so far, integer)
        // last_updated (date+time in UTC)
        pool.execute(sqlx::query(
            "
                CREATE TABLE IF NOT EXISTS warnings (
                    user_id INTEGER PRIMARY KEY NOT NULL,
                    count INTEGER NOT NULL,
                    last_updated TEXT NOT NULL
                ) STRICT;",
        ))
        .await?;

        Ok(Database { pool })
    }

    pub async fn load_monitored_chats(&self) -> Result<Vec<ChatId>, Error> {
        sqlx::query("SELECT chat_id FROM monitored_chats;")
            .map(|row: SqliteRow| ChatId(row.get::<i64, _>("chat_id")))
            .fetch_all(&self.pool)
            .await
    }

    pub async fn load_warnings(&self) -> Result<Vec<(UserId, WarningRecord)>, Error> {
        sqlx::query("SELECT user_id, count, last_updated FROM warnings;")
            .map(|row: SqliteRow| {
                (
                    // User IDs are stored as their bit pattern; they fit in 52 bits anyway.
                    UserId(row.get::<i64, _>("user_id") as u64),
                    WarningRecord {
                        count: row.get::<i64, _>("count").clamp(0, u32::MAX.into()) as u32,
                        last_updated: row.get::<DateTime<Utc>, _>("last_updated"),
                    },
                )
            })
            .fetch_all(&self.pool)
            .await
    }

    /// Replace the stored snapshot with this one, all at once.
    pub async fn save(
        &self,
        monitored: &[ChatId],
        warnings: &[(UserId, WarningRecord)],
    ) -> Result<(), Error> {
        let mut transaction = self.pool.begin().await?;

        sqlx::query("DELETE FROM monitored_chats;")
            .execute(&mut *transaction)
            .await?;
        sqlx::query("DELETE FROM warnings;")
            .execute(&mut *transaction)
            .await?;

        for chat in monitored {
            sqlx::query("INSERT INTO monitored_chats(chat_id) VALUES (?);")
                .bind(chat.0)
                .execute(&mut *transaction)
                .await?;
        }

        for (user, record) in warnings {
            sqlx::query("INSERT INTO warnings(user_id, count, last_updated) VALUES (?, ?, ?);")
                .bind(user.0 as i64)
                .bind(i64::from(record.count))
                .bind(record.last_updated)
                .execute(&mut *transaction)
                .await?;
        }

        transaction.commit().await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn empty_snapshot() {
        let database = Database::in_memory().await.unwrap();
        assert!(database.load_monitored_chats().await.unwrap().is_empty());
        assert!(database.load_warnings().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_replaces_everything() {
        let database = Database::in_memory().await.unwrap();
        let now = Utc::now();

        database
            .save(
                &[ChatId(-100), ChatId(-200)],
                &[(UserId(7), WarningRecord { count: 2, last_updated: now })],
            )
            .await
            .unwrap();
        database
            .save(
                &[ChatId(-200)],
                &[(UserId(8), WarningRecord { count: 1, last_updated: now })],
            )
            .await
            .unwrap();

        assert_eq!(
            database.load_monitored_chats().await.unwrap(),
            vec![ChatId(-200)]
        );

        let warnings = database.load_warnings().await.unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].0, UserId(8));
        assert_eq!(warnings[0].1.count, 1);
        assert_eq!(warnings[0].1.last_updated.timestamp(), now.timestamp());
    }
}
