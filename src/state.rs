use std::sync::Arc;

use redis::aio::ConnectionManager;

use crate::{
    config::{Config, StorageBackend},
    error::{AppError, Result},
    repositories::{
        PgStore,
        memory::{MemoryCache, MemoryDatabase},
        records::RecordStore,
        session::{AttemptCounter, RedisStore, SessionStore},
        user::CredentialStore,
    },
    services::{
        assistant::Assistant, attachments::AttachmentStore, auth::Authenticator,
        manuals::ManualLibrary, session::SessionManager,
    },
};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<Config>,
    pub credentials: Arc<dyn CredentialStore>,
    pub records: Arc<dyn RecordStore>,
    pub authenticator: Authenticator,
    pub sessions: SessionManager,
    /// Login and registration throttling counters.
    pub attempts: Arc<dyn AttemptCounter>,
    pub attachments: AttachmentStore,
    pub manuals: ManualLibrary,
    pub assistant: Assistant,
}

impl AppState {
    /// Creates a new `AppState` on the configured backend.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        match config.storage_backend {
            StorageBackend::Memory => {
                tracing::warn!("⚠️ STORAGE_BACKEND=memory, all data is lost on restart");
                Self::in_memory(config).await
            }
            StorageBackend::Postgres => {
                let database_url = config.database_url.as_deref().ok_or_else(|| {
                    AppError::Internal("DATABASE_URL is required for the postgres backend".to_string())
                })?;

                let pool = crate::db::create_pool(database_url)?;
                crate::db::run_migrations(&pool).await?;
                tracing::info!("✅ PostgreSQL Pool initialized with deadpool-postgres");

                let redis_client = redis::Client::open(config.redis_url.as_str())?;
                let redis = ConnectionManager::new(redis_client).await?;
                tracing::info!("✅ Redis Connection Manager initialized");

                let database = Arc::new(PgStore::new(pool));
                let cache = Arc::new(RedisStore::new(redis, session_lifetime(config)?));

                Self::assemble(config, database.clone(), database, cache.clone(), cache).await
            }
        }
    }

    /// An `AppState` whose stores all live in process memory.
    pub async fn in_memory(config: &Config) -> Result<Self> {
        let database = Arc::new(MemoryDatabase::new());
        let cache = Arc::new(MemoryCache::new());
        Self::assemble(config, database.clone(), database, cache.clone(), cache).await
    }

    async fn assemble(
        config: &Config,
        credentials: Arc<dyn CredentialStore>,
        records: Arc<dyn RecordStore>,
        sessions: Arc<dyn SessionStore>,
        attempts: Arc<dyn AttemptCounter>,
    ) -> Result<Self> {
        let authenticator = Authenticator::new(credentials.clone(), config.password_hash).await?;

        let sessions = SessionManager::new(
            sessions,
            chrono::Duration::minutes(config.session_idle_minutes),
            chrono::Duration::days(config.session_duration_days),
        );

        let assistant = Assistant::from_config(&config.assistant)
            .map_err(|e| AppError::Internal(format!("Assistant setup failed: {:#}", e)))?;

        Ok(AppState {
            config: Arc::new(config.clone()),
            credentials,
            records,
            authenticator,
            sessions,
            attempts,
            attachments: AttachmentStore::new(config.upload_dir.clone(), config.max_upload_bytes),
            manuals: ManualLibrary::new(config.manuals_dir.clone()),
            assistant,
        })
    }
}

fn session_lifetime(config: &Config) -> Result<std::time::Duration> {
    chrono::Duration::days(config.session_duration_days)
        .to_std()
        .map_err(|e| AppError::Internal(format!("Invalid session lifetime: {}", e)))
}
