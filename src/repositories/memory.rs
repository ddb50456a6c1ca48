//! In-process stores for `STORAGE_BACKEND=memory` and for tests.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::{
        job_card::{JobCard, NewJobCard},
        service_order::{NewServiceOrder, ServiceOrder},
        session::Session,
        user::{Role, User},
    },
    repositories::{
        records::RecordStore,
        session::{AttemptCounter, SessionStore},
        user::CredentialStore,
    },
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    /// Insertion order doubles as creation order.
    job_cards: Vec<JobCard>,
    service_orders: Vec<ServiceOrder>,
}

/// Users and records behind a single lock, so a user delete and its cascade
/// happen together.
#[derive(Default)]
pub struct MemoryDatabase {
    tables: RwLock<Tables>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryDatabase {
    async fn create_user(&self, email: &str, password_hash: &str, role: Role) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|user| user.email == email) {
            return Err(AppError::DuplicateEmail);
        }

        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|user| user.email == email).cloned())
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&user_id).cloned())
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<Vec<String>> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&user_id).is_none() {
            return Err(AppError::NotFound);
        }

        let attachments = tables
            .job_cards
            .iter()
            .filter(|card| card.owner_id == user_id)
            .filter_map(|card| card.attachment.as_ref().map(|a| a.stored_name.clone()))
            .collect();
        tables.job_cards.retain(|card| card.owner_id != user_id);
        tables.service_orders.retain(|order| order.owner_id != user_id);
        Ok(attachments)
    }
}

#[async_trait]
impl RecordStore for MemoryDatabase {
    async fn insert_job_card(&self, card: NewJobCard) -> Result<JobCard> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&card.owner_id) {
            return Err(AppError::NotFound);
        }

        let card = card.into_job_card(Uuid::new_v4(), Utc::now());
        tables.job_cards.push(card.clone());
        Ok(card)
    }

    async fn job_cards_by_owner(&self, owner_id: Uuid) -> Result<Vec<JobCard>> {
        let tables = self.tables.read().await;
        Ok(tables
            .job_cards
            .iter()
            .filter(|card| card.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn find_job_card(&self, id: Uuid) -> Result<Option<JobCard>> {
        let tables = self.tables.read().await;
        Ok(tables.job_cards.iter().find(|card| card.id == id).cloned())
    }

    async fn delete_job_card(&self, id: Uuid, requester: Uuid) -> Result<JobCard> {
        let mut tables = self.tables.write().await;
        let position = tables
            .job_cards
            .iter()
            .position(|card| card.id == id)
            .ok_or(AppError::NotFound)?;

        if tables.job_cards[position].owner_id != requester {
            return Err(AppError::Forbidden);
        }
        Ok(tables.job_cards.remove(position))
    }

    async fn insert_service_order(&self, order: NewServiceOrder) -> Result<ServiceOrder> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&order.owner_id) {
            return Err(AppError::NotFound);
        }

        let order = order.into_service_order(Uuid::new_v4(), Utc::now());
        tables.service_orders.push(order.clone());
        Ok(order)
    }

    async fn service_orders_by_owner(&self, owner_id: Uuid) -> Result<Vec<ServiceOrder>> {
        let tables = self.tables.read().await;
        Ok(tables
            .service_orders
            .iter()
            .filter(|order| order.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn find_service_order(&self, id: Uuid) -> Result<Option<ServiceOrder>> {
        let tables = self.tables.read().await;
        Ok(tables.service_orders.iter().find(|order| order.id == id).cloned())
    }

    async fn delete_service_order(&self, id: Uuid, requester: Uuid) -> Result<ServiceOrder> {
        let mut tables = self.tables.write().await;
        let position = tables
            .service_orders
            .iter()
            .position(|order| order.id == id)
            .ok_or(AppError::NotFound)?;

        if tables.service_orders[position].owner_id != requester {
            return Err(AppError::Forbidden);
        }
        Ok(tables.service_orders.remove(position))
    }
}

struct Expiring<T> {
    value: T,
    expires: Instant,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires: Instant::now() + ttl,
        }
    }

    fn is_live(&self) -> bool {
        Instant::now() < self.expires
    }
}

/// In-process replacement for Redis.
#[derive(Default)]
pub struct MemoryCache {
    sessions: Mutex<HashMap<String, Expiring<Session>>>,
    csrf: Mutex<HashMap<String, Expiring<String>>>,
    counters: Mutex<HashMap<String, Expiring<u64>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryCache {
    async fn save(&self, token: &str, session: &Session, ttl: Duration) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(token.to_string(), Expiring::new(session.clone(), ttl));
        Ok(())
    }

    async fn refresh(&self, token: &str, session: &Session, ttl: Duration) -> Result<bool> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(token) {
            Some(entry) if entry.is_live() => {
                *entry = Expiring::new(session.clone(), ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn load(&self, token: &str) -> Result<Option<Session>> {
        let mut sessions = self.sessions.lock().await;
        let found = sessions
            .get(token)
            .map(|entry| (entry.is_live(), entry.value.clone()));

        match found {
            Some((true, session)) => Ok(Some(session)),
            Some((false, _)) => {
                sessions.remove(token);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn remove(&self, token: &str) -> Result<()> {
        self.sessions.lock().await.remove(token);
        Ok(())
    }

    async fn remove_user_sessions(&self, user_id: Uuid) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.value.identity.user_id != user_id);
        tracing::info!("🧹 Revoked {} session(s) for user {}", before - sessions.len(), user_id);
        Ok(())
    }

    async fn save_csrf(&self, csrf_token: &str, session_token: &str, ttl: Duration) -> Result<()> {
        let mut csrf = self.csrf.lock().await;
        csrf.insert(csrf_token.to_string(), Expiring::new(session_token.to_string(), ttl));
        Ok(())
    }

    async fn load_csrf(&self, csrf_token: &str) -> Result<Option<String>> {
        let csrf = self.csrf.lock().await;
        Ok(csrf
            .get(csrf_token)
            .filter(|entry| entry.is_live())
            .map(|entry| entry.value.clone()))
    }

    async fn remove_csrf(&self, csrf_token: &str) -> Result<()> {
        self.csrf.lock().await.remove(csrf_token);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut purged = 0;
        {
            let mut sessions = self.sessions.lock().await;
            let before = sessions.len();
            sessions.retain(|_, entry| entry.is_live());
            purged += before - sessions.len();
        }
        {
            let mut csrf = self.csrf.lock().await;
            let before = csrf.len();
            csrf.retain(|_, entry| entry.is_live());
            purged += before - csrf.len();
        }
        {
            let mut counters = self.counters.lock().await;
            let before = counters.len();
            counters.retain(|_, entry| entry.is_live());
            purged += before - counters.len();
        }
        Ok(purged)
    }
}

#[async_trait]
impl AttemptCounter for MemoryCache {
    async fn hit(&self, key: &str, window: Duration) -> Result<u64> {
        let mut counters = self.counters.lock().await;
        let entry = counters
            .entry(key.to_string())
            .or_insert_with(|| Expiring::new(0, window));
        if !entry.is_live() {
            *entry = Expiring::new(0, window);
        }
        entry.value += 1;
        Ok(entry.value)
    }

    async fn count(&self, key: &str) -> Result<u64> {
        let counters = self.counters.lock().await;
        Ok(counters
            .get(key)
            .filter(|entry| entry.is_live())
            .map(|entry| entry.value)
            .unwrap_or(0))
    }

    async fn retry_after(&self, key: &str) -> Result<u64> {
        let counters = self.counters.lock().await;
        Ok(counters
            .get(key)
            .map(|entry| entry.expires.saturating_duration_since(Instant::now()).as_secs())
            .unwrap_or(0))
    }

    async fn reset(&self, key: &str) -> Result<()> {
        self.counters.lock().await.remove(key);
        Ok(())
    }
}
