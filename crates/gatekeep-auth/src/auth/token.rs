//! Access token issuance.
//!
//! Tokens are signed with the per-user secret the gateway generated for the
//! current JWT credential, so the gateway can verify them on its own.

use std::time::Duration;

use chrono::{DateTime, Utc};
use gatekeep_core::GatewaySecret;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use super::AuthError;
use super::users::UserRole;

/// Access token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer. The gateway maps this to the credential key.
    pub iss: String,
    /// Subject (the identity).
    pub sub: String,
    /// User role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Audience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

/// A signed access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    /// Compact JWS.
    pub token: String,
    /// Issue time.
    pub issued_at: DateTime<Utc>,
    /// Expiration time.
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies access tokens.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    lifetime: Duration,
    audience: Option<String>,
}

impl TokenIssuer {
    /// Create an issuer. An empty audience is treated as none.
    #[must_use]
    pub fn new(lifetime: Duration, audience: Option<String>) -> Self {
        Self {
            lifetime,
            audience: audience.filter(|aud| !aud.is_empty()),
        }
    }

    /// Sign a token for the identity with the gateway secret.
    ///
    /// `exp - iat` always equals the configured lifetime.
    ///
    /// # Errors
    ///
    /// Returns error if encoding fails.
    pub fn issue(
        &self,
        identity: &str,
        role: Option<UserRole>,
        secret: &GatewaySecret,
    ) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let iat = now.timestamp();
        let lifetime = i64::try_from(self.lifetime.as_secs()).unwrap_or(i64::MAX);
        let exp = iat.saturating_add(lifetime);

        let claims = Claims {
            iss: identity.to_string(),
            sub: identity.to_string(),
            role,
            iat,
            exp,
            aud: self.audience.clone(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.expose().as_bytes()),
        )
        .map_err(|e| AuthError::Token(format!("Encoding failed: {e}")))?;

        Ok(IssuedToken {
            token,
            issued_at: now,
            expires_at: DateTime::from_timestamp(exp, 0).unwrap_or(DateTime::<Utc>::MAX_UTC),
        })
    }

    /// Validate signature, expiry and audience, returning the claims.
    ///
    /// # Errors
    ///
    /// Returns error if the token is malformed, expired, signed with another
    /// secret, or carries the wrong audience.
    pub fn verify(&self, token: &str, secret: &GatewaySecret) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        match &self.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.expose().as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| AuthError::Token(format!("Validation failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(value: &str) -> GatewaySecret {
        GatewaySecret::new(value.to_string())
    }

    #[test]
    fn test_issue_claims() {
        let issuer = TokenIssuer::new(Duration::from_secs(3600), None);
        let issued = issuer
            .issue("a@x.com", Some(UserRole::User), &secret("s1"))
            .unwrap();

        let claims = issuer.verify(&issued.token, &secret("s1")).unwrap();
        assert_eq!(claims.iss, "a@x.com");
        assert_eq!(claims.sub, "a@x.com");
        assert_eq!(claims.role, Some(UserRole::User));
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.aud, None);
        assert_eq!(issued.expires_at.timestamp(), claims.exp);
    }

    #[test]
    fn test_role_omitted() {
        let issuer = TokenIssuer::new(Duration::from_secs(60), None);
        let issued = issuer.issue("a@x.com", None, &secret("s1")).unwrap();

        let claims = issuer.verify(&issued.token, &secret("s1")).unwrap();
        assert_eq!(claims.role, None);
    }

    #[test]
    fn test_audience() {
        let issuer = TokenIssuer::new(Duration::from_secs(60), Some("partners".to_string()));
        let issued = issuer.issue("a@x.com", None, &secret("s1")).unwrap();

        let claims = issuer.verify(&issued.token, &secret("s1")).unwrap();
        assert_eq!(claims.aud.as_deref(), Some("partners"));

        let other = TokenIssuer::new(Duration::from_secs(60), Some("internal".to_string()));
        assert!(other.verify(&issued.token, &secret("s1")).is_err());
    }

    #[test]
    fn test_empty_audience_omitted() {
        let issuer = TokenIssuer::new(Duration::from_secs(60), Some(String::new()));
        let issued = issuer.issue("a@x.com", None, &secret("s1")).unwrap();
        let claims = issuer.verify(&issued.token, &secret("s1")).unwrap();
        assert!(claims.aud.is_none());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = TokenIssuer::new(Duration::from_secs(60), None);
        let issued = issuer.issue("a@x.com", None, &secret("first")).unwrap();

        let result = issuer.verify(&issued.token, &secret("second"));
        assert!(matches!(result, Err(AuthError::Token(_))));
    }

    #[test]
    fn test_invalid_token() {
        let issuer = TokenIssuer::new(Duration::from_secs(60), None);
        assert!(issuer.verify("invalid.token.here", &secret("s1")).is_err());
    }
}
