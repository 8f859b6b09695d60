//! Registration, login, password resets and user administration.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, SecondsFormat, Utc};
use log::{info, warn};
use uuid::Uuid;

use super::ServiceError;
use crate::db::reset_repo::{self, PasswordReset};
use crate::db::user_repo::{self, NewUser, Role, User};
use crate::db::Database;
use crate::sanitize;

const DEFAULT_NAME: &str = "User";

#[derive(Clone)]
pub struct Accounts {
    db: Database,
    reset_ttl: chrono::Duration,
}

impl Accounts {
    pub fn new(db: Database, reset_ttl: chrono::Duration) -> Self {
        Self { db, reset_ttl }
    }

    /// Creates an annotator account. Without a display name the local part
    /// of the e-mail is used.
    pub fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<User, ServiceError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ServiceError::InvalidInput(
                "Email and password required".to_string(),
            ));
        }
        if user_repo::find_by_email(&self.db, email)?.is_some() {
            return Err(ServiceError::Conflict("Email already registered".to_string()));
        }

        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => default_display_name(email),
        };
        let id = Uuid::new_v4().to_string();
        user_repo::insert(
            &self.db,
            &NewUser {
                id: id.clone(),
                email: email.to_string(),
                password_hash: hash_password(password)?,
                name,
            },
        )?;
        info!("Registered user {}", sanitize::redact_email(email));

        user_repo::find_by_id(&self.db, &id)?.ok_or(ServiceError::NotFound("User"))
    }

    /// Unknown e-mail and wrong password both yield `InvalidCredentials`.
    pub fn login(&self, email: &str, password: &str) -> Result<User, ServiceError> {
        let Some(user) = user_repo::find_by_email(&self.db, email.trim())? else {
            return Err(ServiceError::InvalidCredentials);
        };
        if !verify_password(password, &user.password_hash) {
            return Err(ServiceError::InvalidCredentials);
        }
        Ok(user)
    }

    /// Issues a reset token. An unknown e-mail returns `Ok(None)` so callers
    /// can answer identically either way.
    pub fn request_password_reset(&self, email: &str) -> Result<Option<PasswordReset>, ServiceError> {
        let Some(user) = user_repo::find_by_email(&self.db, email.trim())? else {
            return Ok(None);
        };

        let reset = PasswordReset {
            token: Uuid::new_v4().to_string(),
            user_id: user.id,
            expires_at: (Utc::now() + self.reset_ttl).to_rfc3339_opts(SecondsFormat::Micros, true),
        };
        reset_repo::insert(&self.db, &reset)?;

        // Delivery is out of band; the link is only logged.
        info!("Password reset link: /reset/{}", reset.token);
        Ok(Some(reset))
    }

    /// Whether a token exists and has not expired.
    pub fn reset_token_valid(&self, token: &str) -> Result<bool, ServiceError> {
        Ok(reset_repo::find(&self.db, token)?
            .map(|reset| !is_expired(&reset.expires_at))
            .unwrap_or(false))
    }

    /// Sets a new password and consumes the token.
    pub fn reset_password(&self, token: &str, new_password: &str) -> Result<(), ServiceError> {
        let reset = match reset_repo::find(&self.db, token)? {
            Some(reset) if !is_expired(&reset.expires_at) => reset,
            _ => return Err(ServiceError::InvalidToken),
        };
        if new_password.is_empty() {
            return Err(ServiceError::InvalidInput("Password required".to_string()));
        }

        user_repo::set_password_hash(&self.db, &reset.user_id, &hash_password(new_password)?)?;
        reset_repo::delete(&self.db, token)?;
        info!("Password reset for user {}", reset.user_id);
        Ok(())
    }

    /// Returns the acting user if they are an admin.
    pub fn require_admin(&self, user_id: &str) -> Result<User, ServiceError> {
        match user_repo::find_by_id(&self.db, user_id)? {
            Some(user) if user.is_admin() => Ok(user),
            _ => Err(ServiceError::Forbidden),
        }
    }

    pub fn list_users(&self, acting_user_id: &str) -> Result<Vec<User>, ServiceError> {
        self.require_admin(acting_user_id)?;
        Ok(user_repo::list_all(&self.db)?)
    }

    pub fn promote_user(&self, acting_user_id: &str, user_id: &str) -> Result<(), ServiceError> {
        let admin = self.require_admin(acting_user_id)?;
        if !user_repo::set_role(&self.db, user_id, Role::Admin)? {
            return Err(ServiceError::NotFound("User"));
        }
        info!("User {} promoted to admin by {}", user_id, admin.id);
        Ok(())
    }
}

fn default_display_name(email: &str) -> String {
    match email.split('@').next() {
        Some(local) if !local.is_empty() => local.to_string(),
        _ => DEFAULT_NAME.to_string(),
    }
}

fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| ServiceError::PasswordHash(e.to_string()))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ServiceError::PasswordHash(e.to_string()))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

/// Unparseable expiry counts as expired.
fn is_expired(expires_at: &str) -> bool {
    match DateTime::parse_from_rfc3339(expires_at) {
        Ok(expires) => expires.with_timezone(&Utc) <= Utc::now(),
        Err(_) => true,
    }
}
