use std::{str::FromStr, sync::Arc};

pub use sqlx::Error;
use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Executor, Row, Sqlite,
};

use crate::lookup::proxy::{ProxyAuth, ProxyConfig};
use crate::types::LookupResult;

type Pool = sqlx::Pool<Sqlite>;
const DB_PATH: &str = "sqlite:phone_lookups.sqlite";

/// Every user gets this many checks per day.
const DEFAULT_DAILY_LIMIT: i64 = 1000;

/// A user's standing against their daily quota.
#[derive(Debug, Clone, Copy)]
pub struct QuotaInfo {
    pub limit: i64,
    pub used: i64,
    pub remaining: i64,
    pub can_check: bool,
}

impl QuotaInfo {
    /// What to assume when the quota check itself fails: let it through.
    pub fn default_allow() -> Self {
        Self {
            limit: DEFAULT_DAILY_LIMIT,
            used: 0,
            remaining: DEFAULT_DAILY_LIMIT,
            can_check: true,
        }
    }
}

pub struct Database {
    pool: Pool,
}

impl Database {
    pub async fn new() -> Result<Arc<Database>, Error> {
        if !Sqlite::database_exists(DB_PATH).await.unwrap_or(false) {
            Sqlite::create_database(DB_PATH).await?;
        }
        let pool = SqlitePoolOptions::new()
            .max_connections(32)
            .connect_with(
                SqliteConnectOptions::from_str(DB_PATH)
                    .unwrap()
                    .pragma("cache_size", "-32768")
                    .busy_timeout(std::time::Duration::from_secs(600)),
            )
            .await?;

        Self::init_schema(&pool).await?;

        Ok(Arc::new(Database { pool }))
    }

    #[cfg(test)]
    pub(crate) async fn new_in_memory() -> Result<Arc<Database>, Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:").unwrap())
            .await?;
        Self::init_schema(&pool).await?;
        Ok(Arc::new(Database { pool }))
    }

    async fn init_schema(pool: &Pool) -> Result<(), Error> {
        // USERS:
        // telegram_id (unique primary key, string)
        // is_blocked (0 for no, 1 for yes)
        // check_limit / daily_checks / last_check_date track the daily quota
        pool.execute(sqlx::query(
            "
                CREATE TABLE IF NOT EXISTS users (
                    telegram_id TEXT PRIMARY KEY NOT NULL,
                    username TEXT NULL,
                    first_name TEXT NULL,
                    last_name TEXT NULL,
                    is_blocked INTEGER NOT NULL DEFAULT 0,
                    check_limit INTEGER NOT NULL DEFAULT 1000,
                    daily_checks INTEGER NOT NULL DEFAULT 0,
                    last_check_date TEXT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                ) STRICT;",
        ))
        .await?;

        // One row per lookup attempt, on every branch including cache hits.
        pool.execute(sqlx::query(
            "
                CREATE TABLE IF NOT EXISTS lookup_history (
                    user_id TEXT NULL,
                    phone_number TEXT NOT NULL,
                    country TEXT NULL,
                    region TEXT NULL,
                    carrier TEXT NULL,
                    carrier_type TEXT NULL,
                    is_valid INTEGER NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                ) STRICT;",
        ))
        .await?;

        pool.execute(sqlx::query(
            "
                CREATE TABLE IF NOT EXISTS api_keys (
                    value TEXT PRIMARY KEY NOT NULL,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    usage_count INTEGER NOT NULL DEFAULT 0,
                    last_used TEXT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                ) STRICT;",
        ))
        .await?;

        // status: 'unknown', 'working' or 'failed', set by proxy probes.
        pool.execute(sqlx::query(
            "
                CREATE TABLE IF NOT EXISTS proxies (
                    host TEXT NOT NULL,
                    port INTEGER NOT NULL,
                    username TEXT NULL,
                    password TEXT NULL,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    status TEXT NOT NULL DEFAULT 'unknown',
                    last_checked TEXT NULL,
                    PRIMARY KEY (host, port)
                ) STRICT;",
        ))
        .await?;

        pool.execute(sqlx::query(
            "
                CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                ) STRICT;",
        ))
        .await?;

        Ok(())
    }

    /// Create or refresh a user record from their Telegram profile.
    /// Fields Telegram no longer reports keep their stored values.
    pub async fn upsert_user(&self, user: &teloxide::types::User) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO users(telegram_id, username, first_name, last_name)
            VALUES (?, ?, ?, ?)
        ON CONFLICT(telegram_id) DO
            UPDATE SET username=COALESCE(?, username),
                       first_name=COALESCE(?, first_name),
                       last_name=COALESCE(?, last_name);",
        )
        .bind(user.id.to_string())
        .bind(user.username.as_deref())
        .bind(user.first_name.as_str())
        .bind(user.last_name.as_deref())
        .bind(user.username.as_deref())
        .bind(user.first_name.as_str())
        .bind(user.last_name.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn is_user_blocked(&self, telegram_id: &str) -> Result<bool, Error> {
        Ok(sqlx::query("SELECT is_blocked FROM users WHERE telegram_id=?;")
            .bind(telegram_id)
            .map(|row: SqliteRow| row.get::<i64, _>("is_blocked"))
            .fetch_optional(&self.pool)
            .await?
            .is_some_and(|blocked| blocked == 1))
    }

    /// Anything other than "active" pauses the bot for regular users.
    pub async fn bot_status(&self) -> Result<String, Error> {
        Ok(self
            .get_setting("bot_status")
            .await?
            .unwrap_or_else(|| "active".to_string()))
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>, Error> {
        sqlx::query("SELECT value FROM settings WHERE key=?;")
            .bind(key)
            .map(|row: SqliteRow| row.get::<String, _>("value"))
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO settings(key, value, updated_at)
            VALUES (?, ?, datetime('now'))
        ON CONFLICT(key) DO
            UPDATE SET value=?, updated_at=datetime('now');",
        )
        .bind(key)
        .bind(value)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Pick the next validation API key, round-robin over the active
    /// pool. Falls back to the key in settings, then to the
    /// `VERIPHONE_API_KEY` environment variable. Never fails outright;
    /// `None` means there is genuinely no key anywhere.
    pub async fn next_api_key(&self) -> Option<String> {
        match self.pick_api_key().await {
            Ok(Some(key)) => Some(key),
            Ok(None) => std::env::var("VERIPHONE_API_KEY").ok(),
            Err(e) => {
                log::error!("Error picking an API key: {e}");
                std::env::var("VERIPHONE_API_KEY").ok()
            }
        }
    }

    async fn pick_api_key(&self) -> Result<Option<String>, Error> {
        let keys: Vec<String> =
            sqlx::query("SELECT value FROM api_keys WHERE is_active=1 ORDER BY rowid;")
                .map(|row: SqliteRow| row.get::<String, _>("value"))
                .fetch_all(&self.pool)
                .await?;

        if keys.is_empty() {
            log::warn!("No API keys found, using default from settings");
            return self.get_setting("veriphone_api_key").await;
        }

        let stored_index: usize = self
            .get_setting("current_api_key_index")
            .await?
            .and_then(|value| value.parse().ok())
            .unwrap_or(0);
        let index = (stored_index + 1) % keys.len();

        self.set_setting("current_api_key_index", &index.to_string())
            .await?;
        sqlx::query(
            "UPDATE api_keys SET usage_count=usage_count+1, last_used=datetime('now')
            WHERE value=?;",
        )
        .bind(&keys[index])
        .execute(&self.pool)
        .await?;

        log::debug!("Using API key {}/{}", index + 1, keys.len());
        Ok(Some(keys[index].clone()))
    }

    /// Check the user's daily quota and consume `count` checks from it.
    /// The day rolls over when the stored date differs from today.
    /// `count` of 0 reports standing without consuming anything.
    pub async fn check_and_consume_quota(
        &self,
        telegram_id: &str,
        count: i64,
    ) -> Result<QuotaInfo, Error> {
        // Everyone is on the standard limit; repair stragglers.
        sqlx::query("UPDATE users SET check_limit=? WHERE telegram_id=? AND check_limit<>?;")
            .bind(DEFAULT_DAILY_LIMIT)
            .bind(telegram_id)
            .bind(DEFAULT_DAILY_LIMIT)
            .execute(&self.pool)
            .await?;

        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();

        let row = sqlx::query(
            "SELECT check_limit, daily_checks, last_check_date FROM users WHERE telegram_id=?;",
        )
        .bind(telegram_id)
        .fetch_optional(&self.pool)
        .await?;

        let (limit, daily, last_date): (i64, i64, Option<String>) = match row {
            Some(row) => (
                row.get("check_limit"),
                row.get("daily_checks"),
                row.get("last_check_date"),
            ),
            None => (DEFAULT_DAILY_LIMIT, 0, None),
        };

        if last_date.as_deref() != Some(today.as_str()) {
            // New day. Start the counter at whatever this batch consumes.
            let consumed = if count <= limit { count } else { 0 };
            sqlx::query(
                "INSERT INTO users(telegram_id, daily_checks, last_check_date)
                VALUES (?, ?, ?)
            ON CONFLICT(telegram_id) DO
                UPDATE SET daily_checks=?, last_check_date=?;",
            )
            .bind(telegram_id)
            .bind(consumed)
            .bind(&today)
            .bind(consumed)
            .bind(&today)
            .execute(&self.pool)
            .await?;

            return Ok(QuotaInfo {
                limit,
                used: consumed,
                remaining: limit - consumed,
                can_check: count <= limit,
            });
        }

        if daily + count > limit {
            log::debug!("User {telegram_id} would exceed their daily limit of {limit} checks");
            return Ok(QuotaInfo {
                limit,
                used: daily,
                remaining: limit - daily,
                can_check: false,
            });
        }

        sqlx::query(
            "UPDATE users SET daily_checks=daily_checks+?, last_check_date=? WHERE telegram_id=?;",
        )
        .bind(count)
        .bind(&today)
        .bind(telegram_id)
        .execute(&self.pool)
        .await?;

        Ok(QuotaInfo {
            limit,
            used: daily + count,
            remaining: limit - (daily + count),
            can_check: true,
        })
    }

    /// Put every user back on the standard limit with a fresh counter.
    pub async fn reset_all_limits(&self) -> Result<(), Error> {
        sqlx::query("UPDATE users SET check_limit=?, daily_checks=0;")
            .bind(DEFAULT_DAILY_LIMIT)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn record_lookup(&self, user_id: &str, result: &LookupResult) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO lookup_history(user_id, phone_number, country, region, carrier, carrier_type, is_valid)
            VALUES (?, ?, ?, ?, ?, ?, ?);",
        )
        .bind(user_id)
        .bind(&result.input)
        .bind(result.country.as_deref())
        .bind(result.region.as_deref())
        .bind(result.carrier.as_ref().map(|c| c.name.as_str()))
        .bind(result.carrier.as_ref().map(|c| c.group.as_str()))
        .bind(i64::from(result.valid))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn history_count(&self) -> Result<i64, Error> {
        sqlx::query("SELECT COUNT(*) AS n FROM lookup_history;")
            .map(|row: SqliteRow| row.get::<i64, _>("n"))
            .fetch_one(&self.pool)
            .await
    }

    /// Proxies enabled in the admin store and last seen working.
    pub async fn active_proxies(&self) -> Result<Vec<ProxyConfig>, Error> {
        sqlx::query(
            "SELECT host, port, username, password FROM proxies
            WHERE is_active=1 AND status='working';",
        )
        .map(|row: SqliteRow| proxy_from_row(&row))
        .fetch_all(&self.pool)
        .await
    }

    /// All enabled proxies, whatever their last probe said.
    pub async fn enrolled_proxies(&self) -> Result<Vec<ProxyConfig>, Error> {
        sqlx::query("SELECT host, port, username, password FROM proxies WHERE is_active=1;")
            .map(|row: SqliteRow| proxy_from_row(&row))
            .fetch_all(&self.pool)
            .await
    }

    pub async fn set_proxy_status(&self, proxy: &ProxyConfig, status: &str) -> Result<(), Error> {
        sqlx::query(
            "UPDATE proxies SET status=?, last_checked=datetime('now') WHERE host=? AND port=?;",
        )
        .bind(status)
        .bind(&proxy.host)
        .bind(proxy.port)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn proxy_from_row(row: &SqliteRow) -> ProxyConfig {
    let username: Option<String> = row.get("username");
    let password: Option<String> = row.get("password");
    let auth = match (username, password) {
        (Some(username), Some(password)) => Some(ProxyAuth { username, password }),
        _ => None,
    };

    ProxyConfig {
        host: row.get("host"),
        port: row.get::<u16, _>("port"),
        auth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn quota_consumes_until_the_limit() {
        let db = Database::new_in_memory().await.unwrap();

        let first = db.check_and_consume_quota("100", 990).await.unwrap();
        assert!(first.can_check);
        assert_eq!(first.used, 990);
        assert_eq!(first.remaining, 10);

        let over = db.check_and_consume_quota("100", 20).await.unwrap();
        assert!(!over.can_check);
        assert_eq!(over.used, 990);

        let exact = db.check_and_consume_quota("100", 10).await.unwrap();
        assert!(exact.can_check);
        assert_eq!(exact.used, 1000);
        assert_eq!(exact.remaining, 0);

        // A zero-count check reports standing without consuming.
        let status = db.check_and_consume_quota("100", 0).await.unwrap();
        assert_eq!(status.used, 1000);
        assert!(status.can_check);
    }

    #[tokio::test]
    async fn quota_resets_on_a_new_day() {
        let db = Database::new_in_memory().await.unwrap();

        sqlx::query(
            "INSERT INTO users(telegram_id, daily_checks, last_check_date)
            VALUES ('7', 500, '2000-01-01');",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let info = db.check_and_consume_quota("7", 5).await.unwrap();
        assert!(info.can_check);
        assert_eq!(info.used, 5);
    }

    #[tokio::test]
    async fn api_keys_rotate_round_robin() {
        let db = Database::new_in_memory().await.unwrap();
        for key in ["key-a", "key-b"] {
            sqlx::query("INSERT INTO api_keys(value) VALUES (?);")
                .bind(key)
                .execute(&db.pool)
                .await
                .unwrap();
        }

        let first = db.next_api_key().await.unwrap();
        let second = db.next_api_key().await.unwrap();
        let third = db.next_api_key().await.unwrap();
        assert_ne!(first, second);
        assert_eq!(first, third);
    }

    #[tokio::test]
    async fn blocked_flag_defaults_to_false() {
        let db = Database::new_in_memory().await.unwrap();
        assert!(!db.is_user_blocked("404").await.unwrap());

        sqlx::query("INSERT INTO users(telegram_id, is_blocked) VALUES ('13', 1);")
            .execute(&db.pool)
            .await
            .unwrap();
        assert!(db.is_user_blocked("13").await.unwrap());
    }
}
