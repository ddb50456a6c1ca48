use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use zeroize::Zeroizing;

/// Where users, records and sessions live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    /// PostgreSQL for users and records, Redis for sessions.
    Postgres,
    /// Everything in process memory. Lost on restart.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => anyhow::bail!("Unknown STORAGE_BACKEND '{}' (expected postgres or memory)", other),
        }
    }
}

/// Argon2id cost parameters.
#[derive(Clone, Copy, Debug)]
pub struct PasswordHashParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordHashParams {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 3,
            parallelism: 6,
        }
    }
}

/// Settings for the external chat-completion API.
#[derive(Clone)]
pub struct AssistantConfig {
    /// `None` disables the assistant; questions get an informational answer.
    pub api_key: Option<Zeroizing<String>>,
    pub api_url: String,
    pub model: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }
}

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    pub storage_backend: StorageBackend,
    /// The URL of the PostgreSQL database.
    pub database_url: Option<String>,
    /// The URL of the Redis server.
    pub redis_url: String,
    pub bind_addr: SocketAddr,
    /// Absolute session lifetime in days.
    pub session_duration_days: i64,
    /// Sessions unused for this long are dropped.
    pub session_idle_minutes: i64,
    pub upload_dir: PathBuf,
    pub manuals_dir: PathBuf,
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub cors_origins: Vec<String>,
    pub login_max_failures: u64,
    pub register_max_per_ip: u64,
    /// Window for the login and registration counters.
    pub throttle_window_secs: u64,
    pub password_hash: PasswordHashParams,
    pub assistant: AssistantConfig,
    /// Marks cookies `Secure`.
    pub production: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::Postgres,
            database_url: None,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            session_duration_days: 7,
            session_idle_minutes: 30,
            upload_dir: PathBuf::from("uploads/jobcards"),
            manuals_dir: PathBuf::from("manuals"),
            static_dir: PathBuf::from("static"),
            max_upload_bytes: 25 * 1024 * 1024,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            login_max_failures: 5,
            register_max_per_ip: 5,
            throttle_window_secs: 43200,
            password_hash: PasswordHashParams::default(),
            assistant: AssistantConfig::default(),
            production: false,
        }
    }
}

fn parsed<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", key, e)),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Memory backend, throwaway directories and cheap hashing. For tests only.
    pub fn for_tests() -> Self {
        let scratch = env::temp_dir().join(format!("biomedlink-{}", uuid::Uuid::new_v4()));
        Self {
            storage_backend: StorageBackend::Memory,
            upload_dir: scratch.join("uploads"),
            manuals_dir: scratch.join("manuals"),
            static_dir: scratch.join("static"),
            password_hash: PasswordHashParams {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            ..Self::default()
        }
    }

    /// Creates a new `Config` from environment variables, falling back to
    /// [`Config::default`] for anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse::<StorageBackend>()
            .context("Invalid STORAGE_BACKEND")?;

        let database_url = env::var("DATABASE_URL").ok();
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when STORAGE_BACKEND=postgres");
        }

        let bind_addr: SocketAddr = parsed("BIND_ADDR", defaults.bind_addr)?;

        let session_duration_days: i64 = parsed("SESSION_DURATION_DAYS", defaults.session_duration_days)?;
        let session_idle_minutes: i64 = parsed("SESSION_IDLE_MINUTES", defaults.session_idle_minutes)?;

        let cors_origins = match env::var("CORS_ORIGINS") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => defaults.cors_origins,
        };

        let api_key = env::var("AI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(Zeroizing::new);

        let config = Self {
            storage_backend,
            database_url,
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            bind_addr,
            session_duration_days,
            session_idle_minutes,
            upload_dir: env::var("UPLOAD_DIR").map(PathBuf::from).unwrap_or(defaults.upload_dir),
            manuals_dir: env::var("MANUALS_DIR").map(PathBuf::from).unwrap_or(defaults.manuals_dir),
            static_dir: env::var("STATIC_DIR").map(PathBuf::from).unwrap_or(defaults.static_dir),
            max_upload_bytes: parsed("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            cors_origins,
            login_max_failures: parsed("LOGIN_MAX_FAILURES", defaults.login_max_failures)?,
            register_max_per_ip: parsed("REGISTER_MAX_PER_IP", defaults.register_max_per_ip)?,
            throttle_window_secs: defaults.throttle_window_secs,
            password_hash: PasswordHashParams {
                memory_kib: parsed("ARGON2_MEMORY_KIB", defaults.password_hash.memory_kib)?,
                iterations: parsed("ARGON2_ITERATIONS", defaults.password_hash.iterations)?,
                parallelism: parsed("ARGON2_PARALLELISM", defaults.password_hash.parallelism)?,
            },
            assistant: AssistantConfig {
                api_key,
                api_url: env::var("AI_API_URL").unwrap_or(defaults.assistant.api_url),
                model: env::var("AI_MODEL").unwrap_or(defaults.assistant.model),
            },
            production: env::var("APP_ENV")
                .map(|value| value == "production")
                .unwrap_or(false),
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects limits that would make the service unusable.
    pub fn validate(&self) -> Result<()> {
        if self.session_duration_days <= 0 || self.session_idle_minutes <= 0 {
            anyhow::bail!("SESSION_DURATION_DAYS and SESSION_IDLE_MINUTES must be positive");
        }
        if self.login_max_failures == 0 {
            anyhow::bail!("LOGIN_MAX_FAILURES must be at least 1");
        }
        if self.register_max_per_ip == 0 {
            anyhow::bail!("REGISTER_MAX_PER_IP must be at least 1");
        }
        Ok(())
    }
}
