use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::user::Identity;

/// Represents a user session.
///
/// Held only in the session store, keyed by the opaque token in the
/// `session_id` cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Copy of the identity taken at login.
    pub identity: Identity,
    /// The timestamp when the session was created.
    pub created_at: DateTime<Utc>,
    /// Refreshed on every authenticated request.
    pub last_seen_at: DateTime<Utc>,
    /// Absolute end of the session, regardless of activity.
    pub expires_at: DateTime<Utc>,
}
