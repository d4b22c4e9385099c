use std::{collections::HashMap, sync::RwLock};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::AuthSession;

#[derive(Debug, Clone)]
struct SessionEntry {
    session: AuthSession,
    expires_at: DateTime<Utc>,
}

/// Token -> session map with a fixed time-to-live. Expired entries are
/// dropped lazily when they are looked up.
#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

pub struct IssuedTokens {
    pub token: String,
    pub refresh_token: String,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Builds a store from a TTL in seconds. Values past what `Duration`
    /// can hold saturate instead of panicking.
    pub fn with_ttl_secs(secs: i64) -> Self {
        let ttl = Duration::try_seconds(secs).unwrap_or(if secs < 0 {
            Duration::MIN
        } else {
            Duration::MAX
        });
        Self::new(ttl)
    }

    pub fn issue(&self, session: AuthSession) -> IssuedTokens {
        let token = format!(
            "token-{}-{}",
            session.user_name.to_lowercase(),
            Uuid::new_v4().simple()
        );
        // Refresh tokens are handed out for frontend compatibility only; nothing exchanges them.
        let refresh_token = format!("refresh-{}", Uuid::new_v4().simple());

        let entry = SessionEntry {
            session,
            expires_at: expiry(Utc::now(), self.ttl),
        };
        self.sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(token.clone(), entry);

        IssuedTokens {
            token,
            refresh_token,
        }
    }

    /// Returns the live session for `token`. A session is dead from the
    /// instant `now` reaches its expiry, so a zero TTL never validates.
    pub fn lookup(&self, token: &str) -> Option<AuthSession> {
        let entry = self
            .sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(token)
            .cloned()?;

        if Utc::now() >= entry.expires_at {
            self.revoke(token);
            return None;
        }
        Some(entry.session)
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(token)
            .is_some()
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    now.checked_add_signed(ttl).unwrap_or(if ttl < Duration::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}
