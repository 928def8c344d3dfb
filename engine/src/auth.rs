use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("unauthorized")]
    Unauthorized,
}

/// Admin login, kept only as SHA-256 digests.
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    user_digest: String,
    password_digest: String,
}

impl AdminCredentials {
    pub fn new(user: &str, password: &str) -> AdminCredentials {
        AdminCredentials {
            user_digest: sha256::digest(user),
            password_digest: sha256::digest(password),
        }
    }

    pub fn verify(&self, user: &str, password: &str) -> Result<(), AuthError> {
        let user_matches = sha256::digest(user) == self.user_digest;
        let password_matches = sha256::digest(password) == self.password_digest;

        if user_matches && password_matches {
            Ok(())
        } else {
            warn!("Rejected admin credentials for {user:?}");

            Err(AuthError::Unauthorized)
        }
    }
}
