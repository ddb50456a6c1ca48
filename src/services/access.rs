//! The access-control gate applied before any protected operation.

use thiserror::Error;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::user::{Identity, Role},
};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    #[error("not authenticated")]
    Unauthenticated,
    #[error("forbidden")]
    Forbidden,
}

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Unauthenticated => AppError::Unauthenticated,
            AccessError::Forbidden => AppError::Forbidden,
        }
    }
}

/// Any live session passes.
pub fn authenticate(identity: Option<Identity>) -> Result<Identity, AccessError> {
    identity.ok_or(AccessError::Unauthenticated)
}

/// A live session with exactly `required_role` passes.
pub fn authorize(identity: Option<Identity>, required_role: Role) -> Result<Identity, AccessError> {
    let identity = authenticate(identity)?;
    if identity.role != required_role {
        return Err(AccessError::Forbidden);
    }
    Ok(identity)
}

/// Records are only visible to the user who created them.
pub fn ensure_owner(identity: &Identity, owner_id: Uuid) -> Result<(), AccessError> {
    if identity.user_id == owner_id {
        Ok(())
    } else {
        Err(AccessError::Forbidden)
    }
}
