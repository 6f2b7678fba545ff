// src/services/session.rs
use log::{debug, info, warn};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::YieldSeries;
use crate::services::cache::TtlCache;

pub const YIELD_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuthState {
    Unauthenticated,
    AuthFailed,
    Authenticated,
}

/// Sidebar controls for the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Controls {
    pub lookback_days: usize,
    pub days_ahead: i64,
    pub only_important: bool,
}

impl Controls {
    pub const LOOKBACK_RANGE: (usize, usize) = (30, 3650);
    pub const DAYS_AHEAD_RANGE: (i64, i64) = (1, 60);

    /// Applies any submitted values, clamped to the slider ranges.
    pub fn apply(&mut self, update: &ControlsUpdate) {
        if let Some(lookback) = update.lookback_days {
            self.lookback_days = lookback.clamp(Self::LOOKBACK_RANGE.0, Self::LOOKBACK_RANGE.1);
        }
        if let Some(days) = update.days_ahead {
            self.days_ahead = days.clamp(Self::DAYS_AHEAD_RANGE.0, Self::DAYS_AHEAD_RANGE.1);
        }
        if let Some(flag) = update.only_important {
            self.only_important = flag;
        }
    }
}

impl Default for Controls {
    fn default() -> Self {
        Controls {
            lookback_days: 360,
            days_ahead: 14,
            only_important: true,
        }
    }
}

/// Query-string form of [`Controls`]; absent fields leave the current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControlsUpdate {
    pub lookback_days: Option<usize>,
    pub days_ahead: Option<i64>,
    pub only_important: Option<bool>,
}

pub const SESSION_COOKIE: &str = "fbu_session";
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(12 * 60 * 60);
pub const MAX_SESSIONS: usize = 1024;

/// One browser's view of the dashboard: auth state, controls and the yield
/// tables it has already downloaded.
#[derive(Debug)]
pub struct Session {
    state: AuthState,
    pub controls: Controls,
    pub yield_cache: TtlCache<usize, Arc<YieldSeries>>,
    last_seen: Instant,
}

impl Session {
    fn new(cache_ttl: Duration, now: Instant) -> Self {
        Session {
            state: AuthState::Unauthenticated,
            controls: Controls::default(),
            yield_cache: TtlCache::new(cache_ttl),
            last_seen: now,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == AuthState::Authenticated
    }

    /// Compares `credential` with `secret`. A mismatch only moves the state
    /// to `AuthFailed`; nothing else in the session changes.
    pub fn submit(&mut self, credential: &str, secret: &str) -> AuthState {
        self.state = if credentials_match(credential, secret) {
            info!("Password accepted");
            AuthState::Authenticated
        } else {
            warn!("Password rejected");
            AuthState::AuthFailed
        };
        self.state
    }
}

/// Equal-length inputs are compared without an early exit.
fn credentials_match(given: &str, expected: &str) -> bool {
    let (a, b) = (given.as_bytes(), expected.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// 256 bits from the thread-local CSPRNG, hex encoded.
fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// The shared password and every live session, keyed by cookie token.
#[derive(Debug)]
pub struct DashboardContext {
    secret: String,
    cache_ttl: Duration,
    sessions: HashMap<String, Session>,
}

impl DashboardContext {
    pub fn new(secret: impl Into<String>) -> Self {
        Self::with_cache_ttl(secret, YIELD_CACHE_TTL)
    }

    pub fn with_cache_ttl(secret: impl Into<String>, cache_ttl: Duration) -> Self {
        DashboardContext {
            secret: secret.into(),
            cache_ttl,
            sessions: HashMap::new(),
        }
    }

    pub fn session(&self, token: &str) -> Option<&Session> {
        self.sessions.get(token)
    }

    pub fn session_mut(&mut self, token: &str) -> Option<&mut Session> {
        self.sessions.get_mut(token).map(|s| {
            s.last_seen = Instant::now();
            s
        })
    }

    /// Auth state for a request; unknown or missing tokens are unauthenticated.
    pub fn auth_state(&self, token: Option<&str>) -> AuthState {
        token
            .and_then(|t| self.session(t))
            .map_or(AuthState::Unauthenticated, Session::state)
    }

    pub fn is_authenticated(&self, token: Option<&str>) -> bool {
        self.auth_state(token) == AuthState::Authenticated
    }

    /// Submits `credential` for the session behind `token`, opening one if
    /// the token is missing or unknown. Returns the token the client must
    /// present from now on: a fresh one after a successful login.
    pub fn login(&mut self, token: Option<&str>, credential: &str) -> (String, AuthState) {
        let now = Instant::now();
        self.prune(now);

        let mut session = token
            .and_then(|t| self.sessions.remove(t))
            .unwrap_or_else(|| Session::new(self.cache_ttl, now));
        session.last_seen = now;
        let outcome = session.submit(credential, &self.secret);

        let token = match token {
            Some(t) if outcome != AuthState::Authenticated && !t.is_empty() => t.to_string(),
            _ => new_token(),
        };
        self.sessions.insert(token.clone(), session);
        (token, outcome)
    }

    /// Drops the session and everything cached under it.
    pub fn logout(&mut self, token: Option<&str>) {
        if let Some(session) = token.and_then(|t| self.sessions.remove(t)) {
            info!(
                "Logging out; dropping session with {} cached yield tables",
                session.yield_cache.len()
            );
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Forgets idle sessions, then the least recently seen ones beyond
    /// `MAX_SESSIONS - 1` so the caller can add one.
    fn prune(&mut self, now: Instant) {
        self.sessions
            .retain(|_, s| now.saturating_duration_since(s.last_seen) < SESSION_IDLE_TTL);
        while self.sessions.len() >= MAX_SESSIONS {
            let oldest = self
                .sessions
                .iter()
                .min_by_key(|(_, s)| s.last_seen)
                .map(|(t, _)| t.clone());
            match oldest {
                Some(t) => {
                    debug!("evicting least recently seen session");
                    self.sessions.remove(&t);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_authenticates() {
        let mut ctx = DashboardContext::new("hunter2");
        assert_eq!(ctx.auth_state(None), AuthState::Unauthenticated);

        let (token, outcome) = ctx.login(None, "hunter2");
        assert_eq!(outcome, AuthState::Authenticated);
        assert!(ctx.is_authenticated(Some(&token)));
        assert_eq!(token.len(), 64);
    }

    #[test]
    fn sessions_are_isolated() {
        let mut ctx = DashboardContext::new("hunter2");
        let (owner, _) = ctx.login(None, "hunter2");

        assert!(!ctx.is_authenticated(None));
        assert!(!ctx.is_authenticated(Some("not-a-session")));

        let (stranger, outcome) = ctx.login(None, "guess");
        assert_eq!(outcome, AuthState::AuthFailed);
        assert_ne!(stranger, owner);
        assert_eq!(ctx.auth_state(Some(&stranger)), AuthState::AuthFailed);
        assert!(ctx.is_authenticated(Some(&owner)));
    }

    #[test]
    fn wrong_password_fails_and_keeps_controls() {
        let mut ctx = DashboardContext::new("hunter2");
        let (token, _) = ctx.login(None, "hunter");
        {
            let session = ctx.session_mut(&token).unwrap();
            session.controls.lookback_days = 90;
            session.yield_cache.insert(90, Arc::new(YieldSeries::default()));
        }

        let (again, outcome) = ctx.login(Some(&token), "hunter3");
        assert_eq!(outcome, AuthState::AuthFailed);
        assert_eq!(again, token);
        let session = ctx.session(&token).unwrap();
        assert_eq!(session.controls.lookback_days, 90);
        assert_eq!(session.yield_cache.len(), 1);

        let (fresh, outcome) = ctx.login(Some(&token), "hunter2");
        assert_eq!(outcome, AuthState::Authenticated);
        assert_ne!(fresh, token);
        assert!(ctx.session(&token).is_none());
        assert_eq!(ctx.session(&fresh).unwrap().controls.lookback_days, 90);
    }

    #[test]
    fn logout_drops_session_and_cache() {
        let mut ctx = DashboardContext::new("pw");
        let (token, _) = ctx.login(None, "pw");
        ctx.session_mut(&token)
            .unwrap()
            .yield_cache
            .insert(360, Arc::new(YieldSeries::default()));

        ctx.logout(Some(&token));

        assert_eq!(ctx.auth_state(Some(&token)), AuthState::Unauthenticated);
        assert!(ctx.is_empty());

        let (token, _) = ctx.login(None, "pw");
        let session = ctx.session(&token).unwrap();
        assert_eq!(session.controls, Controls::default());
        assert!(session.yield_cache.is_empty());
    }

    #[test]
    fn idle_and_surplus_sessions_are_pruned() {
        let mut ctx = DashboardContext::new("pw");
        for _ in 0..MAX_SESSIONS + 10 {
            ctx.login(None, "nope");
        }
        assert_eq!(ctx.len(), MAX_SESSIONS);

        ctx.prune(Instant::now() + SESSION_IDLE_TTL);
        assert!(ctx.is_empty());
    }

    #[test]
    fn controls_are_clamped() {
        let mut controls = Controls::default();
        controls.apply(&ControlsUpdate {
            lookback_days: Some(5),
            days_ahead: Some(365),
            only_important: None,
        });
        assert_eq!(controls.lookback_days, 30);
        assert_eq!(controls.days_ahead, 60);
        assert!(controls.only_important);
    }

    #[test]
    fn empty_credential_never_matches() {
        assert!(!credentials_match("", "pw"));
        assert!(credentials_match("pw", "pw"));
    }
}
