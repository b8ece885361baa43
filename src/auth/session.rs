use std::time::Duration;

use axum::extract::FromRef;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::config::{SessionConfig, MAX_SESSION_TTL_MINUTES};
use crate::db::User;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "moodlog_session";

/// Something a login session can be bound to.
pub trait Authenticatable {
    fn identity(&self) -> i64;
    fn session_name(&self) -> &str;
}

impl Authenticatable for User {
    fn identity(&self) -> i64 {
        self.id
    }

    fn session_name(&self) -> &str {
        &self.username
    }
}

/// Payload of the session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: i64,     // user id
    pub name: String, // username at login time
    pub iat: usize,
    pub exp: usize,
}

/// Signs and checks session tokens with the configured secret.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    secure: bool,
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl SessionKeys {
    pub fn new(cfg: &SessionConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            ttl: Duration::from_secs(
                cfg.ttl_minutes.clamp(1, MAX_SESSION_TTL_MINUTES).unsigned_abs() * 60,
            ),
            secure: cfg.cookie_secure,
        }
    }

    pub fn issue<A: Authenticatable>(&self, who: &A) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = SessionClaims {
            sub: who.identity(),
            name: who.session_name().to_owned(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = claims.sub, "session issued");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<SessionClaims> {
        let data = decode::<SessionClaims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }

    /// Sets the session cookie for `who`.
    pub fn establish<A: Authenticatable>(&self, jar: CookieJar, who: &A) -> anyhow::Result<CookieJar> {
        let token = self.issue(who)?;
        let cookie = Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(TimeDuration::seconds(self.ttl.as_secs() as i64));
        Ok(jar.add(cookie))
    }

    /// Claims of a valid session cookie, if the jar carries one.
    pub fn current(&self, jar: &CookieJar) -> Option<SessionClaims> {
        let token = jar.get(SESSION_COOKIE)?;
        match self.verify(token.value()) {
            Ok(claims) => Some(claims),
            Err(e) => {
                debug!(error = %e, "rejecting session cookie");
                None
            }
        }
    }
}

/// Removes the session cookie; harmless when there is none.
pub fn clear(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}
