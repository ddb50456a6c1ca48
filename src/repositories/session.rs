use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, ExistenceCheck, SetExpiry, SetOptions, aio::ConnectionManager};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::session::Session,
};

/// Server-held session and CSRF state. Never written to durable storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores (or refreshes) a session under `token`; it disappears after `ttl`.
    async fn save(&self, token: &str, session: &Session, ttl: Duration) -> Result<()>;

    /// Rewrites a session only if `token` is still stored. Returns `false`
    /// when it was removed in the meantime; nothing is written then.
    async fn refresh(&self, token: &str, session: &Session, ttl: Duration) -> Result<bool>;

    async fn load(&self, token: &str) -> Result<Option<Session>>;

    async fn remove(&self, token: &str) -> Result<()>;

    /// Drops every session belonging to `user_id`.
    async fn remove_user_sessions(&self, user_id: Uuid) -> Result<()>;

    /// Binds a CSRF token to the session token it was issued for.
    async fn save_csrf(&self, csrf_token: &str, session_token: &str, ttl: Duration) -> Result<()>;

    /// The session token a CSRF token was issued for, if it is still live.
    async fn load_csrf(&self, csrf_token: &str) -> Result<Option<String>>;

    async fn remove_csrf(&self, csrf_token: &str) -> Result<()>;

    /// Reclaims expired entries. Returns how many were dropped.
    async fn purge_expired(&self) -> Result<usize>;
}

/// Windowed counters used for login and registration throttling.
#[async_trait]
pub trait AttemptCounter: Send + Sync {
    /// Increments `key`, starting a new window of `window` if it was absent.
    async fn hit(&self, key: &str, window: Duration) -> Result<u64>;

    async fn count(&self, key: &str) -> Result<u64>;

    /// Seconds until the current window closes.
    async fn retry_after(&self, key: &str) -> Result<u64>;

    async fn reset(&self, key: &str) -> Result<()>;
}

fn session_key(token: &str) -> String {
    format!("session:{}", token)
}

fn user_sessions_key(user_id: Uuid) -> String {
    format!("user_sessions:{}", user_id)
}

fn csrf_key(token: &str) -> String {
    format!("csrf:{}", token)
}

/// Redis implementation of [`SessionStore`] and [`AttemptCounter`].
#[derive(Clone)]
pub struct RedisStore {
    redis: ConnectionManager,
    /// How long the per-user token index outlives its last write.
    index_ttl: Duration,
}

impl RedisStore {
    pub fn new(redis: ConnectionManager, index_ttl: Duration) -> Self {
        Self { redis, index_ttl }
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn save(&self, token: &str, session: &Session, ttl: Duration) -> Result<()> {
        let mut redis = self.redis.clone();
        let session_json = sonic_rs::to_string(session)
            .map_err(|e| AppError::Internal(format!("Session serialization failed: {}", e)))?;

        let _: () = redis
            .set_ex(session_key(token), &session_json, ttl.as_secs().max(1))
            .await?;

        let index = user_sessions_key(session.identity.user_id);
        let _: () = redis.sadd(&index, token).await?;
        let _: () = redis.expire(&index, self.index_ttl.as_secs() as i64).await?;
        Ok(())
    }

    async fn refresh(&self, token: &str, session: &Session, ttl: Duration) -> Result<bool> {
        let mut redis = self.redis.clone();
        let session_json = sonic_rs::to_string(session)
            .map_err(|e| AppError::Internal(format!("Session serialization failed: {}", e)))?;

        let options = SetOptions::default()
            .conditional_set(ExistenceCheck::XX)
            .with_expiration(SetExpiry::EX(ttl.as_secs().max(1)));
        let updated: Option<String> = redis
            .set_options(session_key(token), &session_json, options)
            .await?;
        Ok(updated.is_some())
    }

    async fn load(&self, token: &str) -> Result<Option<Session>> {
        let mut redis = self.redis.clone();
        let session_json: Option<String> = redis.get(session_key(token)).await?;

        match session_json {
            Some(json) => {
                let session = sonic_rs::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Invalid session JSON: {}", e))
                })?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn remove(&self, token: &str) -> Result<()> {
        let mut redis = self.redis.clone();
        if let Some(session) = self.load(token).await? {
            let _: () = redis
                .srem(user_sessions_key(session.identity.user_id), token)
                .await?;
        }
        let _: () = redis.del(session_key(token)).await?;
        Ok(())
    }

    async fn remove_user_sessions(&self, user_id: Uuid) -> Result<()> {
        let mut redis = self.redis.clone();
        let index = user_sessions_key(user_id);
        let tokens: Vec<String> = redis.smembers(&index).await?;

        for token in &tokens {
            let _: () = redis.del(session_key(token)).await?;
        }
        let _: () = redis.del(&index).await?;

        tracing::info!("🧹 Revoked {} session(s) for user {}", tokens.len(), user_id);
        Ok(())
    }

    async fn save_csrf(&self, csrf_token: &str, session_token: &str, ttl: Duration) -> Result<()> {
        let mut redis = self.redis.clone();
        let _: () = redis
            .set_ex(csrf_key(csrf_token), session_token, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn load_csrf(&self, csrf_token: &str) -> Result<Option<String>> {
        let mut redis = self.redis.clone();
        Ok(redis.get(csrf_key(csrf_token)).await?)
    }

    async fn remove_csrf(&self, csrf_token: &str) -> Result<()> {
        let mut redis = self.redis.clone();
        let _: () = redis.del(csrf_key(csrf_token)).await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        // Redis expires keys on its own.
        Ok(0)
    }
}

#[async_trait]
impl AttemptCounter for RedisStore {
    async fn hit(&self, key: &str, window: Duration) -> Result<u64> {
        let mut redis = self.redis.clone();
        let count: u64 = redis.incr(key, 1).await?;
        if count == 1 {
            let _: () = redis.expire(key, window.as_secs() as i64).await?;
        }
        Ok(count)
    }

    async fn count(&self, key: &str) -> Result<u64> {
        let mut redis = self.redis.clone();
        let count: Option<u64> = redis.get(key).await?;
        Ok(count.unwrap_or(0))
    }

    async fn retry_after(&self, key: &str) -> Result<u64> {
        let mut redis = self.redis.clone();
        let ttl: i64 = redis.ttl(key).await?;
        Ok(ttl.max(0) as u64)
    }

    async fn reset(&self, key: &str) -> Result<()> {
        let mut redis = self.redis.clone();
        let _: () = redis.del(key).await?;
        Ok(())
    }
}
