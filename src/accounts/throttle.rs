use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::errors::{AppError, AppResult};

pub const MAX_ATTEMPTS: u32 = 5;
pub const WINDOW_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy)]
struct Attempts {
    count: u32,
    last_attempt: DateTime<Utc>,
}

/// Per-email login attempt counter.
///
/// The window is measured from the most recent counted attempt. Once it has
/// elapsed the counter starts over at one, counting the attempt being made.
/// Rejected attempts are not counted and do not extend the window. A successful
/// login clears the counter for that email, so only consecutive failures lock.
/// Entries whose window has elapsed are evicted on every attempt.
#[derive(Debug, Default)]
pub struct LoginThrottle {
    attempts: HashMap<String, Attempts>,
}

impl LoginThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&mut self, email: &str, now: DateTime<Utc>) -> AppResult<()> {
        let window = Duration::minutes(WINDOW_MINUTES);
        self.attempts.retain(|_, entry| now - entry.last_attempt < window);

        match self.attempts.get_mut(email) {
            Some(entry) if now - entry.last_attempt < window => {
                if entry.count >= MAX_ATTEMPTS {
                    let remaining = window - (now - entry.last_attempt);
                    let retry_after_minutes = (remaining.num_seconds() + 59) / 60;
                    tracing::warn!(email = %email, retry_after_minutes, "login throttled");
                    return Err(AppError::TooManyAttempts { retry_after_minutes });
                }
                entry.count += 1;
                entry.last_attempt = now;
            }
            _ => {
                self.attempts.insert(
                    email.to_string(),
                    Attempts {
                        count: 1,
                        last_attempt: now,
                    },
                );
            }
        }

        Ok(())
    }

    pub fn clear(&mut self, email: &str) {
        self.attempts.remove(email);
    }

    pub fn attempts(&self, email: &str) -> u32 {
        self.attempts.get(email).map(|a| a.count).unwrap_or(0)
    }

    /// Number of emails with a live counter.
    pub fn tracked(&self) -> usize {
        self.attempts.len()
    }
}
