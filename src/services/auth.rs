use std::sync::Arc;

use argon2::{
    Argon2, ParamsBuilder,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use zeroize::Zeroizing;

use crate::{
    config::PasswordHashParams,
    error::{AppError, Result},
    models::user::{Identity, Role},
    repositories::user::CredentialStore,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

fn argon2(params: PasswordHashParams) -> Result<Argon2<'static>> {
    let params = ParamsBuilder::new()
        .m_cost(params.memory_kib)
        .t_cost(params.iterations)
        .p_cost(params.parallelism)
        .build()
        .map_err(|e| AppError::Internal(format!("Argon2 params: {}", e)))?;

    Ok(Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params))
}

/// Hashes a password using Argon2id with a fresh random salt.
///
/// # Arguments
///
/// * `password` - The password to hash.
/// * `params` - The Argon2 cost parameters.
///
/// # Returns
///
/// A `Result` containing the PHC-formatted hash.
fn hash_password(password: &[u8], params: PasswordHashParams) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2(params)?
        .hash_password(password, &salt)
        .map_err(|e| AppError::Internal(format!("Argon2 hash error: {}", e)))?
        .to_string();

    tracing::debug!("Password hashed successfully with Argon2");
    Ok(password_hash)
}

/// Verifies a password against a PHC hash. The parameters come from the hash.
///
/// # Returns
///
/// A `Result` containing `true` if the password is valid, `false` otherwise.
fn verify_password(password: &[u8], hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Hash parse error: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password, &parsed_hash)
        .is_ok())
}

async fn hash_blocking(password: Zeroizing<Vec<u8>>, params: PasswordHashParams) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password, params))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
}

async fn verify_blocking(password: Zeroizing<Vec<u8>>, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("Verification task failed: {}", e)))?
}

/// Checks credentials and registers users against a [`CredentialStore`].
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    params: PasswordHashParams,
    /// Verified when the email is unknown, so both failure paths cost the same.
    dummy_hash: Arc<String>,
}

impl Authenticator {
    pub async fn new(store: Arc<dyn CredentialStore>, params: PasswordHashParams) -> Result<Self> {
        let dummy_hash = hash_blocking(Zeroizing::new(b"not-a-real-password".to_vec()), params).await?;
        Ok(Self {
            store,
            params,
            dummy_hash: Arc::new(dummy_hash),
        })
    }

    /// Creates a user with a hashed password.
    ///
    /// Fails with [`AppError::DuplicateEmail`] if the email is already registered.
    pub async fn register(&self, email: &str, password: &str, role: Role) -> Result<Identity> {
        tracing::debug!("🔐 Registering user: {}", email);

        if self.store.find_by_email(email).await?.is_some() {
            return Err(AppError::DuplicateEmail);
        }

        let password_hash =
            hash_blocking(Zeroizing::new(password.as_bytes().to_vec()), self.params).await?;

        // The store enforces uniqueness too, for registrations racing past the check above.
        let user = self.store.create_user(email, &password_hash, role).await?;

        tracing::info!("✅ User created with ID: {}", user.id);
        Ok(user.identity())
    }

    /// Verifies an email/password pair.
    ///
    /// Unknown email and wrong password fail with the same
    /// [`AppError::Authentication`] message.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Identity> {
        tracing::debug!("🔐 Authenticating user: {}", email);

        let user = self.store.find_by_email(email).await?;
        let hash = match &user {
            Some(user) => user.password_hash.clone(),
            None => self.dummy_hash.as_ref().clone(),
        };

        let valid = verify_blocking(Zeroizing::new(password.as_bytes().to_vec()), hash).await?;

        match user {
            Some(user) if valid => {
                tracing::info!("✅ User authenticated: {}", user.id);
                Ok(user.identity())
            }
            _ => Err(AppError::Authentication(INVALID_CREDENTIALS.to_string())),
        }
    }
}
