//! Operator sessions passed explicitly as bearer tokens.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;

use super::clock::Clock;
use crate::config::AdminConfig;

const TOKEN_LEN: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminSession {
    pub token: String,
    pub email: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("missing bearer token")]
    MissingToken,
    #[error("session token is not recognised")]
    UnknownToken,
    #[error("session expired")]
    Expired,
}

/// In-process session store for the admin API.
pub struct AdminSessions {
    email: String,
    password: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    sessions: Mutex<HashMap<String, AdminSession>>,
}

impl AdminSessions {
    pub fn new(config: &AdminConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            email: config.email.clone(),
            password: config.password.clone(),
            ttl: Duration::minutes(i64::from(config.session_ttl_minutes)),
            clock,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn login(&self, email: &str, password: &str) -> Result<AdminSession, SessionError> {
        if !email.trim().eq_ignore_ascii_case(&self.email) || password != self.password {
            return Err(SessionError::InvalidCredentials);
        }

        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        let issued_at = self.clock.now();
        let session = AdminSession {
            token: token.clone(),
            email: self.email.clone(),
            issued_at,
            expires_at: issued_at + self.ttl,
        };

        let mut sessions = self.lock();
        sessions.retain(|_, existing| existing.expires_at > issued_at);
        sessions.insert(token, session.clone());
        Ok(session)
    }

    pub fn verify(&self, token: &str) -> Result<AdminSession, SessionError> {
        let now = self.clock.now();
        let mut sessions = self.lock();
        let session = sessions
            .get(token)
            .cloned()
            .ok_or(SessionError::UnknownToken)?;
        if session.expires_at <= now {
            sessions.remove(token);
            return Err(SessionError::Expired);
        }
        Ok(session)
    }

    /// Number of sessions currently held, expired or not.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn logout(&self, token: &str) -> Result<(), SessionError> {
        self.lock()
            .remove(token)
            .map(|_| ())
            .ok_or(SessionError::UnknownToken)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, AdminSession>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, SessionError> {
    header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(SessionError::MissingToken)
}
