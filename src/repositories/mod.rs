//! Storage seams. Each trait has a durable implementation (Postgres or
//! Redis) and an in-process one in [`memory`].

use deadpool_postgres::Pool;

pub mod memory;
pub mod records;
pub mod session;
pub mod user;

/// Postgres-backed [`user::CredentialStore`] and [`records::RecordStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}
