//! Bearer token issuance and verification.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation, decode, encode,
    errors::ErrorKind,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::principal::{Principal, Role};
use super::AuthError;

/// Default token lifetime: 24 hours.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 3600);

/// Bearer token claims.
///
/// Permissions are deliberately absent: they are re-derived from the role
/// when the token verifies, not trusted from a long-lived credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (principal ID).
    pub sub: String,
    /// Contact email.
    pub email: String,
    /// Role.
    pub role: Role,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

/// Result of verifying a bearer credential.
///
/// Always a value, never an error: malformed input degrades to a negative
/// outcome and the boundary decides the HTTP consequence. The three
/// negative cases are all "no identity"; only `Expired` is worth a
/// distinct response (prompt a refresh rather than a generic 401).
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    /// Credential verified; permissions derived from the role.
    Authenticated(Principal),
    /// Missing header, malformed scheme, or undecodable token.
    Unauthenticated,
    /// Correctly signed but past its expiry.
    Expired,
    /// Signature does not match the subject fields.
    Invalid,
}

impl AuthOutcome {
    /// Check whether verification produced a principal.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Consume the outcome, yielding the principal if there is one.
    #[must_use]
    pub fn into_principal(self) -> Option<Principal> {
        match self {
            Self::Authenticated(principal) => Some(principal),
            _ => None,
        }
    }
}

/// HS256 bearer token authenticator.
///
/// Holds the server secret as encoding/decoding keys. Verification is a
/// pure, idempotent function of the credential and the current time; the
/// keys are immutable after construction and safe to share across tasks.
pub struct TokenAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
    validation: Validation,
}

impl TokenAuthenticator {
    /// Create an authenticator with a secret key.
    ///
    /// The secret should be at least 32 bytes. Expiry is checked with zero
    /// leeway; see [`Self::with_leeway`].
    #[must_use]
    pub fn new(secret: &[u8], token_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            token_ttl,
            validation,
        }
    }

    /// Create an authenticator from a hex-encoded secret.
    ///
    /// # Errors
    ///
    /// Returns error if hex decoding fails.
    pub fn from_hex_secret(hex_secret: &str, token_ttl: Duration) -> Result<Self, AuthError> {
        let secret = hex::decode(hex_secret)
            .map_err(|e| AuthError::Config(format!("Invalid hex secret: {e}")))?;
        Ok(Self::new(&secret, token_ttl))
    }

    /// Allow `seconds` of clock skew when checking expiry.
    #[must_use]
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.validation.leeway = seconds;
        self
    }

    /// Generate a random 256-bit secret key.
    #[must_use]
    pub fn generate_secret() -> [u8; 32] {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes
    }

    /// Generate a random secret as hex string.
    #[must_use]
    pub fn generate_hex_secret() -> String {
        hex::encode(Self::generate_secret())
    }

    /// Issue a signed bearer token for the given subject fields.
    ///
    /// Stamps `iat = now` and `exp = now + ttl`. The token never carries
    /// permissions.
    ///
    /// # Errors
    ///
    /// Returns error if token encoding fails.
    pub fn issue_token(
        &self,
        id: &str,
        email: &str,
        role: Role,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now + chrono::Duration::from_std(self.token_ttl).unwrap_or_default();

        let claims = Claims {
            sub: id.to_string(),
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenError(format!("Encoding failed: {e}")))
    }

    /// Verify the raw `Authorization` header value.
    ///
    /// A missing header and a non-Bearer scheme yield
    /// [`AuthOutcome::Unauthenticated`], same as a token that fails
    /// structural decoding.
    #[must_use]
    pub fn authenticate(&self, authorization_header: Option<&str>) -> AuthOutcome {
        let Some(header) = authorization_header else {
            return AuthOutcome::Unauthenticated;
        };
        let Some(token) = Self::extract_from_header(header) else {
            return AuthOutcome::Unauthenticated;
        };
        self.verify(token)
    }

    /// Verify a bare token string.
    #[must_use]
    pub fn verify(&self, token: &str) -> AuthOutcome {
        let result: Result<TokenData<Claims>, _> =
            decode(token, &self.decoding_key, &self.validation);

        match result {
            Ok(data) => {
                let claims = data.claims;
                AuthOutcome::Authenticated(Principal::from_role(
                    claims.sub,
                    claims.email,
                    claims.role,
                ))
            }
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => AuthOutcome::Expired,
                ErrorKind::InvalidSignature => {
                    // Logged distinctly: a well-formed token with a bad
                    // signature points at tampering, not a stale client.
                    tracing::warn!("bearer token signature mismatch");
                    AuthOutcome::Invalid
                }
                _ => AuthOutcome::Unauthenticated,
            },
        }
    }

    /// Extract token from an `Authorization` header value.
    ///
    /// Expects format: "Bearer <token>"
    #[must_use]
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
    }
}

impl std::fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("TokenAuthenticator")
            .field("token_ttl", &self.token_ttl)
            .finish_non_exhaustive()
    }
}
