use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    crypto::token::generate_token,
    error::{AppError, Result},
    models::{session::Session, user::Identity},
    repositories::session::SessionStore,
};

/// Tokens handed to the browser after a successful login.
pub struct IssuedSession {
    pub session_token: String,
    pub csrf_token: String,
}

/// Maps opaque browser tokens to identities.
///
/// A token is Anonymous unless it names a live session: unknown, expired
/// (absolute lifetime) and idle-timed-out tokens all resolve to `None`.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    idle_timeout: Duration,
    max_lifetime: Duration,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, idle_timeout: Duration, max_lifetime: Duration) -> Self {
        Self {
            store,
            idle_timeout,
            max_lifetime,
        }
    }

    pub fn max_lifetime(&self) -> Duration {
        self.max_lifetime
    }

    /// Time the stored entry should live: the idle window, cut short by the
    /// absolute expiry.
    fn ttl(&self, session: &Session) -> std::time::Duration {
        let remaining = session.expires_at - Utc::now();
        remaining
            .min(self.idle_timeout)
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(1))
    }

    /// Opens a session for an identity the authenticator has just verified.
    pub async fn start(&self, identity: Identity) -> Result<IssuedSession> {
        let now = Utc::now();
        let session = Session {
            identity,
            created_at: now,
            last_seen_at: now,
            expires_at: now + self.max_lifetime,
        };

        let session_token = generate_token();
        self.store
            .save(&session_token, &session, self.ttl(&session))
            .await?;

        let csrf_token = generate_token();
        let csrf_ttl = self
            .max_lifetime
            .to_std()
            .map_err(|e| AppError::Internal(format!("Invalid session lifetime: {}", e)))?;
        self.store
            .save_csrf(&csrf_token, &session_token, csrf_ttl)
            .await?;

        tracing::info!("✅ Session opened for user {}", session.identity.user_id);
        Ok(IssuedSession {
            session_token,
            csrf_token,
        })
    }

    /// Resolves a token to its identity and refreshes the idle timer.
    ///
    /// Never fails: store errors are logged and the caller is treated as
    /// anonymous.
    pub async fn current_identity(&self, token: Option<&str>) -> Option<Identity> {
        let token = token?;

        let mut session = match self.store.load(token).await {
            Ok(Some(session)) => session,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!("❌ Session lookup failed: {}", e);
                return None;
            }
        };

        let now = Utc::now();
        if now >= session.expires_at || now - session.last_seen_at >= self.idle_timeout {
            tracing::debug!("⌛ Session expired for user {}", session.identity.user_id);
            if let Err(e) = self.store.remove(token).await {
                tracing::warn!("Failed to drop expired session: {}", e);
            }
            return None;
        }

        session.last_seen_at = now;
        match self.store.refresh(token, &session, self.ttl(&session)).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("Session ended while resolving it for user {}", session.identity.user_id);
                return None;
            }
            Err(e) => tracing::warn!("Failed to refresh session: {}", e),
        }

        Some(session.identity)
    }

    /// Checks that a CSRF token was issued for this session token.
    pub async fn csrf_belongs_to(&self, csrf_token: &str, session_token: &str) -> Result<bool> {
        Ok(match self.store.load_csrf(csrf_token).await? {
            Some(owner) => crate::crypto::token::tokens_match(&owner, session_token),
            None => false,
        })
    }

    /// Logs out: the session and its CSRF token stop working immediately.
    pub async fn end(&self, session_token: &str, csrf_token: Option<&str>) -> Result<()> {
        self.store.remove(session_token).await?;
        if let Some(csrf_token) = csrf_token {
            self.store.remove_csrf(csrf_token).await?;
        }
        Ok(())
    }

    pub async fn end_all_for_user(&self, user_id: Uuid) -> Result<()> {
        self.store.remove_user_sessions(user_id).await
    }

    pub async fn purge_expired(&self) -> Result<usize> {
        self.store.purge_expired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::user::Role, repositories::memory::MemoryCache};

    fn identity() -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            email: "staff@example.com".to_string(),
            role: Role::Staff,
        }
    }

    fn manager(idle: Duration, lifetime: Duration) -> SessionManager {
        SessionManager::new(Arc::new(MemoryCache::new()), idle, lifetime)
    }

    #[tokio::test]
    async fn started_session_resolves_to_identity() {
        let sessions = manager(Duration::minutes(30), Duration::days(7));
        let identity = identity();
        let issued = sessions.start(identity.clone()).await.unwrap();

        assert_eq!(
            sessions.current_identity(Some(&issued.session_token)).await,
            Some(identity)
        );
        assert!(
            sessions
                .csrf_belongs_to(&issued.csrf_token, &issued.session_token)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn missing_or_unknown_token_is_anonymous() {
        let sessions = manager(Duration::minutes(30), Duration::days(7));
        assert_eq!(sessions.current_identity(None).await, None);
        assert_eq!(sessions.current_identity(Some("bogus")).await, None);
    }

    #[tokio::test]
    async fn ending_a_session_makes_it_anonymous() {
        let sessions = manager(Duration::minutes(30), Duration::days(7));
        let issued = sessions.start(identity()).await.unwrap();

        sessions
            .end(&issued.session_token, Some(&issued.csrf_token))
            .await
            .unwrap();
        assert_eq!(sessions.current_identity(Some(&issued.session_token)).await, None);
        assert!(
            !sessions
                .csrf_belongs_to(&issued.csrf_token, &issued.session_token)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn idle_sessions_expire() {
        let sessions = manager(Duration::milliseconds(40), Duration::days(7));
        let issued = sessions.start(identity()).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        assert_eq!(sessions.current_identity(Some(&issued.session_token)).await, None);
    }

    #[tokio::test]
    async fn absolute_lifetime_wins_over_activity() {
        let sessions = manager(Duration::minutes(30), Duration::milliseconds(40));
        let issued = sessions.start(identity()).await.unwrap();
        assert!(sessions.current_identity(Some(&issued.session_token)).await.is_some());

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        assert_eq!(sessions.current_identity(Some(&issued.session_token)).await, None);
    }

    #[tokio::test]
    async fn revoking_a_user_ends_all_their_sessions() {
        let sessions = manager(Duration::minutes(30), Duration::days(7));
        let identity = identity();
        let first = sessions.start(identity.clone()).await.unwrap();
        let second = sessions.start(identity.clone()).await.unwrap();
        let other = sessions.start(self::identity()).await.unwrap();

        sessions.end_all_for_user(identity.user_id).await.unwrap();
        assert_eq!(sessions.current_identity(Some(&first.session_token)).await, None);
        assert_eq!(sessions.current_identity(Some(&second.session_token)).await, None);
        assert!(sessions.current_identity(Some(&other.session_token)).await.is_some());
    }

    /// Ends the session right after handing it out, as a concurrent logout
    /// or user revocation would.
    struct EndsAfterLoad {
        inner: MemoryCache,
        revoke_user: bool,
    }

    #[async_trait::async_trait]
    impl SessionStore for EndsAfterLoad {
        async fn save(&self, token: &str, session: &Session, ttl: std::time::Duration) -> Result<()> {
            self.inner.save(token, session, ttl).await
        }

        async fn refresh(&self, token: &str, session: &Session, ttl: std::time::Duration) -> Result<bool> {
            self.inner.refresh(token, session, ttl).await
        }

        async fn load(&self, token: &str) -> Result<Option<Session>> {
            let session = self.inner.load(token).await?;
            if let Some(session) = &session {
                if self.revoke_user {
                    self.inner.remove_user_sessions(session.identity.user_id).await?;
                } else {
                    self.inner.remove(token).await?;
                }
            }
            Ok(session)
        }

        async fn remove(&self, token: &str) -> Result<()> {
            self.inner.remove(token).await
        }

        async fn remove_user_sessions(&self, user_id: Uuid) -> Result<()> {
            self.inner.remove_user_sessions(user_id).await
        }

        async fn save_csrf(&self, csrf_token: &str, session_token: &str, ttl: std::time::Duration) -> Result<()> {
            self.inner.save_csrf(csrf_token, session_token, ttl).await
        }

        async fn load_csrf(&self, csrf_token: &str) -> Result<Option<String>> {
            self.inner.load_csrf(csrf_token).await
        }

        async fn remove_csrf(&self, csrf_token: &str) -> Result<()> {
            self.inner.remove_csrf(csrf_token).await
        }

        async fn purge_expired(&self) -> Result<usize> {
            self.inner.purge_expired().await
        }
    }

    #[tokio::test]
    async fn session_ended_mid_request_stays_ended() {
        for revoke_user in [false, true] {
            let store = Arc::new(EndsAfterLoad {
                inner: MemoryCache::new(),
                revoke_user,
            });
            let sessions = SessionManager::new(store.clone(), Duration::minutes(30), Duration::days(7));
            let issued = sessions.start(identity()).await.unwrap();

            assert_eq!(sessions.current_identity(Some(&issued.session_token)).await, None);
            assert!(
                store.inner.load(&issued.session_token).await.unwrap().is_none(),
                "session came back (revoke_user = {})",
                revoke_user
            );
        }
    }

    #[tokio::test]
    async fn refresh_does_not_recreate_a_removed_session() {
        let cache = MemoryCache::new();
        let now = Utc::now();
        let session = Session {
            identity: identity(),
            created_at: now,
            last_seen_at: now,
            expires_at: now + Duration::days(7),
        };
        let ttl = std::time::Duration::from_secs(60);

        assert!(!cache.refresh("gone", &session, ttl).await.unwrap());
        assert!(cache.load("gone").await.unwrap().is_none());

        cache.save("live", &session, ttl).await.unwrap();
        assert!(cache.refresh("live", &session, ttl).await.unwrap());
    }
}
