//! Password hashing and in-memory login sessions.
//!
//! Stored hashes are Argon2id PHC strings (`$argon2id$v=19$...`).

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "teacher" => Some(Self::Teacher),
            "student" => Some(Self::Student),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Teacher => "teacher",
            Self::Student => "student",
        }
    }

    /// Table holding accounts of this role.
    pub fn table(self) -> &'static str {
        match self {
            Self::Admin => "admins",
            Self::Teacher => "teachers",
            Self::Student => "students",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Teacher => "Teacher",
            Self::Student => "Student",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no session; login required")]
    MissingSession,
    #[error("session is unknown or expired")]
    InvalidSession,
    #[error("this action requires the {0} portal")]
    WrongRole(&'static str),
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

/// A stored value that is not a parseable PHC string never verifies.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub role: Role,
    pub user_id: String,
    pub user_name: String,
    pub issued_at: DateTime<Utc>,
}

pub struct SessionStore {
    ttl: Duration,
    sessions: HashMap<String, Session>,
}

impl SessionStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX).min(i64::MAX / 1000)),
            sessions: HashMap::new(),
        }
    }

    pub fn issue(&mut self, role: Role, user_id: &str, user_name: &str, now: DateTime<Utc>) -> String {
        let token = Uuid::new_v4().to_string();
        self.sessions.insert(
            token.clone(),
            Session {
                role,
                user_id: user_id.to_string(),
                user_name: user_name.to_string(),
                issued_at: now,
            },
        );
        token
    }

    /// Look up a live session; an expired one is dropped.
    pub fn resolve(&mut self, token: &str, now: DateTime<Utc>) -> Option<Session> {
        let expired = match self.sessions.get(token) {
            None => return None,
            Some(s) => now - s.issued_at >= self.ttl,
        };
        if expired {
            self.sessions.remove(token);
            return None;
        }
        self.sessions.get(token).cloned()
    }

    pub fn revoke(&mut self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Resolve `token` and check it belongs to `role`.
    pub fn authorize(
        &mut self,
        token: Option<&str>,
        role: Option<Role>,
        now: DateTime<Utc>,
    ) -> Result<Session, AuthError> {
        let token = token.ok_or(AuthError::MissingSession)?;
        let session = self.resolve(token, now).ok_or(AuthError::InvalidSession)?;
        match role {
            Some(r) if r != session.role => Err(AuthError::WrongRole(r.as_str())),
            _ => Ok(session),
        }
    }
}
