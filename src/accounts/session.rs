use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::jwt::JwtConfig;
use crate::utils::random_token;

const SESSION_ID_BYTES: usize = 16;
const CSRF_TOKEN_BYTES: usize = 32;

/// A login session. Valid until `expires_at`; never extended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub token: String,
    pub csrf_token: String,
    pub user_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_rotated: DateTime<Utc>,
}

impl Session {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<String, Session>,
}

impl SessionTable {
    pub fn from_sessions(sessions: Vec<Session>) -> Self {
        let sessions = sessions.into_iter().map(|s| (s.id.clone(), s)).collect();
        Self { sessions }
    }

    pub fn snapshot(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| a.issued_at.cmp(&b.issued_at));
        sessions
    }

    /// Issues a new session. Expired sessions are dropped first so they do not
    /// accumulate between restarts.
    pub fn issue(&mut self, keys: &JwtConfig, user_id: Uuid, now: DateTime<Utc>) -> AppResult<Session> {
        let purged = self.purge_expired(now);
        if purged > 0 {
            tracing::debug!(purged, "expired sessions dropped");
        }

        let id = random_token(SESSION_ID_BYTES);
        let expires_at = now + Duration::hours(keys.session_hours);
        let token = keys.encode(user_id, &id, now, expires_at)?;

        let session = Session {
            id: id.clone(),
            token,
            csrf_token: random_token(CSRF_TOKEN_BYTES),
            user_id,
            issued_at: now,
            expires_at,
            last_rotated: now,
        };
        self.sessions.insert(id, session.clone());
        Ok(session)
    }

    /// Resolves a bearer token to a live session.
    pub fn resolve(&self, keys: &JwtConfig, token: &str, now: DateTime<Utc>) -> AppResult<&Session> {
        let claims = keys.decode(token)?;
        let session = self
            .sessions
            .get(&claims.sid)
            .filter(|s| s.token == token && s.user_id == claims.sub)
            .ok_or_else(|| AppError::unauthorized("session not found"))?;

        if !session.is_valid_at(now) {
            return Err(AppError::unauthorized("session expired"));
        }
        Ok(session)
    }

    pub fn rotate_csrf(&mut self, session_id: &str, now: DateTime<Utc>) -> AppResult<Session> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| AppError::unauthorized("session not found"))?;
        session.csrf_token = random_token(CSRF_TOKEN_BYTES);
        session.last_rotated = now;
        Ok(session.clone())
    }

    pub fn revoke(&mut self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    pub fn revoke_user(&mut self, user_id: Uuid) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.user_id != user_id);
        before - self.sessions.len()
    }

    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.is_valid_at(now));
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
