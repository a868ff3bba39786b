use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub db: DbConfig,
    pub redis: RedisConfig,
    pub leaderboard: LeaderboardConfig,
}

#[derive(Clone, Debug)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub pool_min: u32,
    pub pool_max: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: u8,
    pub key_prefix: String,
}

/// Query limits and score bounds enforced by the engine.
#[derive(Clone, Debug)]
pub struct LeaderboardConfig {
    pub default_top: i64,
    pub max_top: usize,
    pub default_window: i64,
    pub max_window: usize,
    pub score_min: f64,
    pub score_max: f64,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            default_top: 10,
            max_top: 100,
            default_window: 5,
            max_window: 20,
            score_min: -1_000_000_000.0,
            score_max: 1_000_000_000.0,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Reads `.env` (if any) before the process environment.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_env()
    }

    pub fn from_env() -> Self {
        let defaults = LeaderboardConfig::default();
        Self {
            db: DbConfig {
                host: env_or("DB_HOST", "localhost"),
                port: env_or_parse("DB_PORT", 5432),
                database: env_or("DB_NAME", "leaderboards"),
                user: env_or("DB_USER", "leaderboard_admin"),
                password: env_or("DB_PASSWORD", ""),
                pool_min: env_or_parse("DB_POOL_MIN", 2),
                pool_max: env_or_parse("DB_POOL_MAX", 20),
                acquire_timeout_secs: env_or_parse("DB_ACQUIRE_TIMEOUT_SEC", 10),
            },
            redis: RedisConfig {
                host: env_or("REDIS_HOST", "localhost"),
                port: env_or_parse("REDIS_PORT", 6379),
                password: env::var("REDIS_PASSWORD").ok().filter(|s| !s.is_empty()),
                db: env_or_parse("REDIS_DB", 0),
                key_prefix: env_or("REDIS_KEY_PREFIX", "lb:"),
            },
            leaderboard: LeaderboardConfig {
                default_top: env_or_parse("LEADERBOARD_DEFAULT_TOP", defaults.default_top),
                max_top: env_or_parse("LEADERBOARD_MAX_TOP", defaults.max_top),
                default_window: env_or_parse(
                    "LEADERBOARD_DEFAULT_WINDOW",
                    defaults.default_window,
                ),
                max_window: env_or_parse("LEADERBOARD_MAX_WINDOW", defaults.max_window),
                score_min: env_or_parse("SCORE_MIN", defaults.score_min),
                score_max: env_or_parse("SCORE_MAX", defaults.score_max),
            },
        }
    }

    pub fn database_url(&self) -> String {
        if let Ok(url) = env::var("DATABASE_URL") {
            return url;
        }
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db.user, self.db.password, self.db.host, self.db.port, self.db.database
        )
    }

    pub fn redis_url(&self) -> String {
        if let Ok(url) = env::var("REDIS_URL") {
            return url;
        }
        match &self.redis.password {
            Some(pw) if !pw.is_empty() => format!(
                "redis://:{}@{}:{}/{}",
                pw, self.redis.host, self.redis.port, self.redis.db
            ),
            _ => format!(
                "redis://{}:{}/{}",
                self.redis.host, self.redis.port, self.redis.db
            ),
        }
    }
}
