//! SQLite storage backend for pod-store.

use super::{AccountStore, UrlMove};
use crate::config::StorageConfig;
use crate::error::StorageError;
use async_trait::async_trait;
use pod_types::{
    Device, DeviceId, FeedUrl, Podcast, PodcastId, PodcastStats, Subscription, SubscriptionId,
    SyncEdge, User, UserId,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// SQLite-based relation store.
///
/// Uses WAL mode for concurrent reads/writes and enforces foreign keys.
/// Podcasts are never deleted by cascade: anything still pointing at a
/// podcast blocks its deletion.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("connections", &self.pool.size())
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (creating if missing) the database described by `config`.
    pub async fn open(config: &StorageConfig) -> Result<Self, StorageError> {
        let path = config.database.to_str().ok_or_else(|| {
            StorageError::Migration(format!(
                "database path is not valid UTF-8: {}",
                config.database.display()
            ))
        })?;

        let options = SqliteConnectOptions::from_str(path)
            .map_err(StorageError::Database)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let store = Self { pool };
        store.run_migrations().await?;
        tracing::debug!("Opened store at {}", config.database.display());
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(":memory:")
            .map_err(StorageError::Database)?
            .foreign_keys(true);

        // One connection that never recycles: every new connection would
        // see a fresh, empty in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        const SCHEMA: [&str; 9] = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id BLOB PRIMARY KEY,
                username TEXT NOT NULL UNIQUE
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS devices (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id BLOB NOT NULL UNIQUE,
                user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                uid TEXT NOT NULL,
                UNIQUE(user_id, uid)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS sync_edges (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                device_a BLOB NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
                device_b BLOB NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
                UNIQUE(device_a, device_b),
                CHECK(device_a < device_b)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS podcasts (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id BLOB NOT NULL UNIQUE,
                title TEXT,
                subscribers INTEGER NOT NULL DEFAULT 0,
                listeners INTEGER NOT NULL DEFAULT 0
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS podcast_urls (
                url TEXT PRIMARY KEY,
                podcast_id BLOB NOT NULL REFERENCES podcasts(id),
                position INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                id BLOB PRIMARY KEY,
                user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                device_id BLOB NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
                podcast_id BLOB NOT NULL REFERENCES podcasts(id),
                created_at INTEGER NOT NULL,
                UNIQUE(user_id, podcast_id)
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_devices_user ON devices(user_id)",
            "CREATE INDEX IF NOT EXISTS idx_urls_podcast ON podcast_urls(podcast_id, position)",
            "CREATE INDEX IF NOT EXISTS idx_subscriptions_podcast ON subscriptions(podcast_id)",
        ];

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Migration(e.to_string()))?;
        }

        Ok(())
    }

    fn current_timestamp() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    async fn podcast_urls(&self, id: &PodcastId) -> Result<Vec<FeedUrl>, StorageError> {
        let urls: Vec<String> = sqlx::query_scalar(
            "SELECT url FROM podcast_urls WHERE podcast_id = ?1 ORDER BY position ASC",
        )
        .bind(id.as_bytes())
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        urls.iter()
            .map(|u| {
                FeedUrl::parse(u).map_err(|e| StorageError::InvalidRow {
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}

/// Map a uniqueness violation to [`StorageError::Conflict`], anything else to `Database`.
fn conflict_or_database(err: sqlx::Error, entity: &'static str, detail: String) -> StorageError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StorageError::Conflict { entity, detail }
        }
        _ => StorageError::Database(err),
    }
}

/// Map a foreign key violation to [`StorageError::NotFound`], anything else to `Database`.
fn missing_or_database(err: sqlx::Error, entity: &'static str, id: String) -> StorageError {
    match &err {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            StorageError::NotFound { entity, id }
        }
        _ => StorageError::Database(err),
    }
}

fn to_db(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn from_db(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

#[async_trait]
impl AccountStore for SqliteStore {
    async fn create_user(&self, username: &str) -> Result<User, StorageError> {
        let user = User {
            id: UserId::new(),
            username: username.trim().to_string(),
        };

        sqlx::query("INSERT INTO users (id, username) VALUES (?1, ?2)")
            .bind(user.id.as_bytes())
            .bind(&user.username)
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_or_database(e, "user", user.username.clone()))?;

        Ok(user)
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, StorageError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, username FROM users WHERE id = ?1")
            .bind(id.as_bytes())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, StorageError> {
        let row =
            sqlx::query_as::<_, UserRow>("SELECT id, username FROM users WHERE username = ?1")
                .bind(username.trim())
                .fetch_optional(&self.pool)
                .await
                .map_err(StorageError::Database)?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_or_create_device(
        &self,
        user: &UserId,
        uid: &str,
    ) -> Result<Device, StorageError> {
        sqlx::query(
            r#"
            INSERT INTO devices (id, user_id, uid) VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id, uid) DO NOTHING
            "#,
        )
        .bind(DeviceId::new().as_bytes())
        .bind(user.as_bytes())
        .bind(uid)
        .execute(&self.pool)
        .await
        .map_err(|e| missing_or_database(e, "user", user.to_string()))?;

        self.find_device(user, uid)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                entity: "device",
                id: uid.to_string(),
            })
    }

    async fn get_device(&self, id: &DeviceId) -> Result<Option<Device>, StorageError> {
        let row = sqlx::query_as::<_, DeviceRow>(
            "SELECT seq, id, user_id, uid FROM devices WHERE id = ?1",
        )
        .bind(id.as_bytes())
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_device(
        &self,
        user: &UserId,
        uid: &str,
    ) -> Result<Option<Device>, StorageError> {
        let row = sqlx::query_as::<_, DeviceRow>(
            "SELECT seq, id, user_id, uid FROM devices WHERE user_id = ?1 AND uid = ?2",
        )
        .bind(user.as_bytes())
        .bind(uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        row.map(TryInto::try_into).transpose()
    }

    async fn devices_for_user(&self, user: &UserId) -> Result<Vec<Device>, StorageError> {
        let rows = sqlx::query_as::<_, DeviceRow>(
            "SELECT seq, id, user_id, uid FROM devices WHERE user_id = ?1 ORDER BY seq ASC",
        )
        .bind(user.as_bytes())
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn delete_device(&self, id: &DeviceId) -> Result<bool, StorageError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::Database)?;

        // Subscriptions belong to the user; hand them to the oldest remaining device.
        let heir: Option<Vec<u8>> = sqlx::query_scalar(
            r#"
            SELECT d.id FROM devices d
            WHERE d.user_id = (SELECT user_id FROM devices WHERE id = ?1) AND d.id != ?1
            ORDER BY d.seq ASC
            LIMIT 1
            "#,
        )
        .bind(id.as_bytes())
        .fetch_optional(&mut *tx)
        .await
        .map_err(StorageError::Database)?;

        if let Some(heir) = heir {
            let moved = sqlx::query("UPDATE subscriptions SET device_id = ?1 WHERE device_id = ?2")
                .bind(heir)
                .bind(id.as_bytes())
                .execute(&mut *tx)
                .await
                .map_err(StorageError::Database)?;
            if moved.rows_affected() > 0 {
                tracing::debug!("Re-homed {} subscriptions of device {}", moved.rows_affected(), id);
            }
        }

        let result = sqlx::query("DELETE FROM devices WHERE id = ?1")
            .bind(id.as_bytes())
            .execute(&mut *tx)
            .await
            .map_err(StorageError::Database)?;

        tx.commit().await.map_err(StorageError::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn edges_for_user(&self, user: &UserId) -> Result<Vec<SyncEdge>, StorageError> {
        let rows = sqlx::query_as::<_, EdgeRow>(
            r#"
            SELECT e.seq, e.device_a, e.device_b
            FROM sync_edges e
            JOIN devices a ON a.id = e.device_a
            JOIN devices b ON b.id = e.device_b
            WHERE a.user_id = ?1 AND b.user_id = ?1
            ORDER BY e.seq ASC
            "#,
        )
        .bind(user.as_bytes())
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn insert_edge(
        &self,
        a: &DeviceId,
        b: &DeviceId,
    ) -> Result<Option<SyncEdge>, StorageError> {
        let pair = SyncEdge::new(*a, *b, 0);

        let seq: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO sync_edges (device_a, device_b) VALUES (?1, ?2)
            ON CONFLICT(device_a, device_b) DO NOTHING
            RETURNING seq
            "#,
        )
        .bind(pair.a.as_bytes())
        .bind(pair.b.as_bytes())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| missing_or_database(e, "device", format!("{} / {}", a, b)))?;

        Ok(seq.map(|seq| SyncEdge::new(pair.a, pair.b, seq as u64)))
    }

    async fn get_or_create_podcast_for_url(
        &self,
        url: &FeedUrl,
    ) -> Result<Podcast, StorageError> {
        if let Some(existing) = self.podcast_for_url(url).await? {
            return Ok(existing);
        }

        let id = PodcastId::new();
        let mut tx = self.pool.begin().await.map_err(StorageError::Database)?;

        sqlx::query("INSERT INTO podcasts (id) VALUES (?1)")
            .bind(id.as_bytes())
            .execute(&mut *tx)
            .await
            .map_err(StorageError::Database)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO podcast_urls (url, podcast_id, position) VALUES (?1, ?2, 0)
            ON CONFLICT(url) DO NOTHING
            "#,
        )
        .bind(url.as_str())
        .bind(id.as_bytes())
        .execute(&mut *tx)
        .await
        .map_err(StorageError::Database)?;

        if inserted.rows_affected() == 0 {
            // Lost a race against another writer; theirs wins.
            tx.rollback().await.map_err(StorageError::Database)?;
        } else {
            tx.commit().await.map_err(StorageError::Database)?;
            tracing::debug!("Created podcast {} for {}", id, url);
        }

        self.podcast_for_url(url)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                entity: "podcast url",
                id: url.to_string(),
            })
    }

    async fn get_podcast(&self, id: &PodcastId) -> Result<Option<Podcast>, StorageError> {
        let row = sqlx::query_as::<_, PodcastRow>(
            "SELECT id, title, subscribers, listeners FROM podcasts WHERE id = ?1",
        )
        .bind(id.as_bytes())
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let urls = self.podcast_urls(id).await?;
        Ok(Some(row.into_podcast(urls)?))
    }

    async fn podcast_for_url(&self, url: &FeedUrl) -> Result<Option<Podcast>, StorageError> {
        let owner: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT podcast_id FROM podcast_urls WHERE url = ?1")
                .bind(url.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(StorageError::Database)?;

        match owner {
            Some(bytes) => self.get_podcast(&podcast_id(&bytes)?).await,
            None => Ok(None),
        }
    }

    async fn add_podcast_url(
        &self,
        podcast: &PodcastId,
        url: &FeedUrl,
    ) -> Result<(), StorageError> {
        if let Some(owner) = self.podcast_for_url(url).await? {
            if owner.id == *podcast {
                return Ok(());
            }
        }

        sqlx::query(
            r#"
            INSERT INTO podcast_urls (url, podcast_id, position)
            VALUES (?1, ?2, (SELECT COALESCE(MAX(position) + 1, 0) FROM podcast_urls WHERE podcast_id = ?2))
            "#,
        )
        .bind(url.as_str())
        .bind(podcast.as_bytes())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                StorageError::NotFound {
                    entity: "podcast",
                    id: podcast.to_string(),
                }
            }
            other => conflict_or_database(other, "podcast url", url.to_string()),
        })?;

        Ok(())
    }

    async fn set_podcast_stats(
        &self,
        podcast: &PodcastId,
        stats: PodcastStats,
    ) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE podcasts SET subscribers = ?1, listeners = ?2 WHERE id = ?3")
            .bind(to_db(stats.subscribers))
            .bind(to_db(stats.listeners))
            .bind(podcast.as_bytes())
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity: "podcast",
                id: podcast.to_string(),
            });
        }
        Ok(())
    }

    async fn move_url(
        &self,
        url: &FeedUrl,
        from: &PodcastId,
        to: &PodcastId,
    ) -> Result<UrlMove, StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE podcast_urls
            SET podcast_id = ?3,
                position = (SELECT COALESCE(MAX(position) + 1, 0) FROM podcast_urls WHERE podcast_id = ?3)
            WHERE url = ?1 AND podcast_id = ?2
            "#,
        )
        .bind(url.as_str())
        .bind(from.as_bytes())
        .bind(to.as_bytes())
        .execute(&self.pool)
        .await
        .map_err(|e| missing_or_database(e, "podcast", to.to_string()))?;

        if result.rows_affected() > 0 {
            return Ok(UrlMove::Moved);
        }

        let owner: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT podcast_id FROM podcast_urls WHERE url = ?1")
                .bind(url.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(StorageError::Database)?;

        Ok(match owner {
            Some(bytes) if bytes.as_slice() == to.as_bytes() => UrlMove::AlreadyOnTarget,
            _ => UrlMove::NotOwned,
        })
    }

    async fn roll_stats(
        &self,
        from: &PodcastId,
        to: &PodcastId,
    ) -> Result<PodcastStats, StorageError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::Database)?;

        let stats_of = |row: Option<(i64, i64)>, id: &PodcastId| {
            row.map(|(subscribers, listeners)| PodcastStats {
                subscribers: from_db(subscribers),
                listeners: from_db(listeners),
            })
            .ok_or_else(|| StorageError::NotFound {
                entity: "podcast",
                id: id.to_string(),
            })
        };

        let source: Option<(i64, i64)> =
            sqlx::query_as("SELECT subscribers, listeners FROM podcasts WHERE id = ?1")
                .bind(from.as_bytes())
                .fetch_optional(&mut *tx)
                .await
                .map_err(StorageError::Database)?;
        let source = stats_of(source, from)?;

        let target: Option<(i64, i64)> =
            sqlx::query_as("SELECT subscribers, listeners FROM podcasts WHERE id = ?1")
                .bind(to.as_bytes())
                .fetch_optional(&mut *tx)
                .await
                .map_err(StorageError::Database)?;
        let mut target = stats_of(target, to)?;

        if source.is_zero() {
            return Ok(source);
        }
        target.absorb(source);

        sqlx::query("UPDATE podcasts SET subscribers = ?1, listeners = ?2 WHERE id = ?3")
            .bind(to_db(target.subscribers))
            .bind(to_db(target.listeners))
            .bind(to.as_bytes())
            .execute(&mut *tx)
            .await
            .map_err(StorageError::Database)?;

        sqlx::query("UPDATE podcasts SET subscribers = 0, listeners = 0 WHERE id = ?1")
            .bind(from.as_bytes())
            .execute(&mut *tx)
            .await
            .map_err(StorageError::Database)?;

        tx.commit().await.map_err(StorageError::Database)?;
        Ok(source)
    }

    async fn delete_podcast(&self, id: &PodcastId) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM podcasts WHERE id = ?1")
            .bind(id.as_bytes())
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn subscriptions_for_podcast(
        &self,
        podcast: &PodcastId,
    ) -> Result<Vec<Subscription>, StorageError> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT id, user_id, device_id, podcast_id, created_at
            FROM subscriptions
            WHERE podcast_id = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(podcast.as_bytes())
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn subscriptions_for_user(
        &self,
        user: &UserId,
    ) -> Result<Vec<Subscription>, StorageError> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT id, user_id, device_id, podcast_id, created_at
            FROM subscriptions
            WHERE user_id = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(user.as_bytes())
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_subscription(
        &self,
        user: &UserId,
        podcast: &PodcastId,
    ) -> Result<Option<Subscription>, StorageError> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT id, user_id, device_id, podcast_id, created_at
            FROM subscriptions
            WHERE user_id = ?1 AND podcast_id = ?2
            "#,
        )
        .bind(user.as_bytes())
        .bind(podcast.as_bytes())
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        row.map(TryInto::try_into).transpose()
    }

    async fn insert_subscription(
        &self,
        user: &UserId,
        device: &DeviceId,
        podcast: &PodcastId,
    ) -> Result<Subscription, StorageError> {
        let subscription = Subscription {
            id: SubscriptionId::new(),
            user: *user,
            device: *device,
            podcast: *podcast,
            created_at: Self::current_timestamp(),
        };

        sqlx::query(
            r#"
            INSERT INTO subscriptions (id, user_id, device_id, podcast_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(subscription.id.as_bytes())
        .bind(user.as_bytes())
        .bind(device.as_bytes())
        .bind(podcast.as_bytes())
        .bind(subscription.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            conflict_or_database(
                e,
                "subscription",
                format!("user {} already subscribed to podcast {}", user, podcast),
            )
        })?;

        Ok(subscription)
    }

    async fn move_subscription(
        &self,
        id: &SubscriptionId,
        to: &PodcastId,
    ) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE subscriptions SET podcast_id = ?1 WHERE id = ?2")
            .bind(to.as_bytes())
            .bind(id.as_bytes())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                conflict_or_database(
                    e,
                    "subscription",
                    format!("subscription {} collides on podcast {}", id, to),
                )
            })?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity: "subscription",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_subscription(&self, id: &SubscriptionId) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = ?1")
            .bind(id.as_bytes())
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_user_subscription(
        &self,
        user: &UserId,
        podcast: &PodcastId,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = ?1 AND podcast_id = ?2")
            .bind(user.as_bytes())
            .bind(podcast.as_bytes())
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(result.rows_affected() > 0)
    }
}

fn invalid(column: &str) -> StorageError {
    StorageError::InvalidRow {
        reason: format!("invalid {}", column),
    }
}

fn podcast_id(bytes: &[u8]) -> Result<PodcastId, StorageError> {
    PodcastId::from_bytes(bytes).ok_or_else(|| invalid("podcast_id"))
}

/// Internal row types for SQLite queries.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: Vec<u8>,
    username: String,
}

impl TryFrom<UserRow> for User {
    type Error = StorageError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId::from_bytes(&row.id).ok_or_else(|| invalid("user id"))?,
            username: row.username,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DeviceRow {
    seq: i64,
    id: Vec<u8>,
    user_id: Vec<u8>,
    uid: String,
}

impl TryFrom<DeviceRow> for Device {
    type Error = StorageError;

    fn try_from(row: DeviceRow) -> Result<Self, Self::Error> {
        Ok(Device {
            id: DeviceId::from_bytes(&row.id).ok_or_else(|| invalid("device id"))?,
            user: UserId::from_bytes(&row.user_id).ok_or_else(|| invalid("device user_id"))?,
            uid: row.uid,
            created_at: row.seq,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EdgeRow {
    seq: i64,
    device_a: Vec<u8>,
    device_b: Vec<u8>,
}

impl TryFrom<EdgeRow> for SyncEdge {
    type Error = StorageError;

    fn try_from(row: EdgeRow) -> Result<Self, Self::Error> {
        Ok(SyncEdge::new(
            DeviceId::from_bytes(&row.device_a).ok_or_else(|| invalid("device_a"))?,
            DeviceId::from_bytes(&row.device_b).ok_or_else(|| invalid("device_b"))?,
            row.seq as u64,
        ))
    }
}

#[derive(sqlx::FromRow)]
struct PodcastRow {
    id: Vec<u8>,
    title: Option<String>,
    subscribers: i64,
    listeners: i64,
}

impl PodcastRow {
    fn into_podcast(self, urls: Vec<FeedUrl>) -> Result<Podcast, StorageError> {
        Ok(Podcast {
            id: podcast_id(&self.id)?,
            urls,
            stats: PodcastStats {
                subscribers: from_db(self.subscribers),
                listeners: from_db(self.listeners),
            },
            title: self.title,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: Vec<u8>,
    user_id: Vec<u8>,
    device_id: Vec<u8>,
    podcast_id: Vec<u8>,
    created_at: i64,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = StorageError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Subscription {
            id: SubscriptionId::from_bytes(&row.id).ok_or_else(|| invalid("subscription id"))?,
            user: UserId::from_bytes(&row.user_id).ok_or_else(|| invalid("subscription user_id"))?,
            device: DeviceId::from_bytes(&row.device_id)
                .ok_or_else(|| invalid("subscription device_id"))?,
            podcast: podcast_id(&row.podcast_id)?,
            created_at: row.created_at,
        })
    }
}
