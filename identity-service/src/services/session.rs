//! Session credential issuance and verification.
//!
//! A session is a self-contained signed token; nothing is persisted server
//! side. Consequence: logout only clears the cookie, and a stolen token
//! stays valid until its natural expiry.

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::SessionConfig;

/// Decoded session state. A pending session proves identity but authorizes
/// nothing except completing second-factor verification; callers must
/// pattern-match rather than consult a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Session {
    Pending { user_id: Uuid },
    Full { user_id: Uuid },
}

impl Session {
    pub fn user_id(&self) -> Uuid {
        match self {
            Session::Pending { user_id } | Session::Full { user_id } => *user_id,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Session::Pending { .. })
    }
}

/// Wire claims. `two_factor_pending` is the encoded form of the
/// [`Session`] variant.
#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: Uuid,
    two_factor_pending: bool,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Token expired. Please log in again.")]
    Expired,
    #[error("Invalid token. Please log in again.")]
    Invalid,
}

#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_minutes: i64,
    cookie_name: String,
    secure_cookies: bool,
}

impl SessionIssuer {
    pub fn new(config: &SessionConfig) -> Result<Self, anyhow::Error> {
        if config.signing_key.len() < 32 {
            return Err(anyhow::anyhow!(
                "Session signing key must be at least 32 bytes"
            ));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.signing_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.signing_key.as_bytes()),
            ttl_minutes: config.ttl_minutes,
            cookie_name: config.cookie_name.clone(),
            secure_cookies: config.secure_cookies,
        })
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Mint a signed token for the given session state.
    pub fn issue(&self, session: Session) -> Result<String, anyhow::Error> {
        let (user_id, pending) = match session {
            Session::Pending { user_id } => (user_id, true),
            Session::Full { user_id } => (user_id, false),
        };

        let now = Utc::now();
        let claims = SessionClaims {
            sub: user_id,
            two_factor_pending: pending,
            iat: now.timestamp(),
            exp: (now + Duration::minutes(self.ttl_minutes)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode session token: {}", e))
    }

    /// Check signature and expiry, surfacing the two failure kinds
    /// distinctly so callers can give differentiated feedback.
    pub fn verify(&self, token: &str) -> Result<Session, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        match decode::<SessionClaims>(token, &self.decoding_key, &validation) {
            Ok(data) => {
                let user_id = data.claims.sub;
                Ok(if data.claims.two_factor_pending {
                    Session::Pending { user_id }
                } else {
                    Session::Full { user_id }
                })
            }
            Err(e) => match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(SessionError::Expired),
                _ => Err(SessionError::Invalid),
            },
        }
    }

    /// Session cookie: HTTP-only, SameSite=Lax, Secure per environment.
    pub fn build_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookies)
            .max_age(time::Duration::minutes(self.ttl_minutes))
            .build()
    }

    /// Logout cookie: empty value, already expired.
    pub fn clear_cookie(&self) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), ""))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookies)
            .expires(time::OffsetDateTime::UNIX_EPOCH)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer(ttl_minutes: i64) -> SessionIssuer {
        SessionIssuer::new(&SessionConfig {
            signing_key: "test-signing-key-of-sufficient-length".to_string(),
            ttl_minutes,
            cookie_name: "sid".to_string(),
            secure_cookies: false,
        })
        .unwrap()
    }

    #[test]
    fn rejects_short_signing_key() {
        let result = SessionIssuer::new(&SessionConfig {
            signing_key: "too-short".to_string(),
            ttl_minutes: 60,
            cookie_name: "sid".to_string(),
            secure_cookies: false,
        });
        assert!(result.is_err());
    }

    #[test]
    fn full_session_round_trips() {
        let issuer = issuer(60);
        let user_id = Uuid::new_v4();
        let token = issuer.issue(Session::Full { user_id }).unwrap();

        let session = issuer.verify(&token).unwrap();
        assert_eq!(session, Session::Full { user_id });
        assert!(!session.is_pending());
    }

    #[test]
    fn pending_session_round_trips_as_pending() {
        let issuer = issuer(60);
        let user_id = Uuid::new_v4();
        let token = issuer.issue(Session::Pending { user_id }).unwrap();

        let session = issuer.verify(&token).unwrap();
        assert_eq!(session, Session::Pending { user_id });
        assert!(session.is_pending());
    }

    #[test]
    fn expired_token_is_distinguished_from_invalid() {
        let issuer = issuer(-5);
        let token = issuer
            .issue(Session::Full {
                user_id: Uuid::new_v4(),
            })
            .unwrap();
        assert_eq!(issuer.verify(&token), Err(SessionError::Expired));

        assert_eq!(issuer.verify("not-a-token"), Err(SessionError::Invalid));
    }

    #[test]
    fn token_from_other_key_is_invalid() {
        let issuer_a = issuer(60);
        let issuer_b = SessionIssuer::new(&SessionConfig {
            signing_key: "another-signing-key-of-sufficient-len".to_string(),
            ttl_minutes: 60,
            cookie_name: "sid".to_string(),
            secure_cookies: false,
        })
        .unwrap();

        let token = issuer_a
            .issue(Session::Full {
                user_id: Uuid::new_v4(),
            })
            .unwrap();
        assert_eq!(issuer_b.verify(&token), Err(SessionError::Invalid));
    }

    #[test]
    fn cookies_are_http_only_and_clear_cookie_expires() {
        let issuer = issuer(60);
        let cookie = issuer.build_cookie("tok".into());
        assert_eq!(cookie.name(), "sid");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));

        let cleared = issuer.clear_cookie();
        assert_eq!(cleared.value(), "");
        assert!(cleared
            .expires_datetime()
            .is_some_and(|t| t <= time::OffsetDateTime::UNIX_EPOCH));
    }
}
