/// JWT issuing and validation
///
/// Tokens are HS256-signed and carry the user's identity key as `sub`. Roles are
/// deliberately absent from the claims: the session loader reads the current role
/// from the database on every request, so a ban takes effect immediately.
///
/// - **Access token**: 24 hours, sent as `Authorization: Bearer <token>`
/// - **Refresh token**: 30 days, exchanged for a new access token
///
/// # Example
///
/// ```
/// use ctvpay_shared::auth::jwt::{create_token, validate_access_token, Claims, TokenType};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let user_id = Uuid::new_v4();
/// let secret = "a-secret-of-at-least-thirty-two-bytes!!";
///
/// let token = create_token(&Claims::new(user_id, TokenType::Access), secret)?;
/// assert_eq!(validate_access_token(&token, secret)?.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Issuer claim written into and required from every token
pub const ISSUER: &str = "ctvpay";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Encoding failed
    #[error("Failed to create token: {0}")]
    Create(String),

    /// Signature, issuer or format check failed
    #[error("Invalid token: {0}")]
    Invalid(String),

    /// Token is past its expiry
    #[error("Token has expired")]
    Expired,

    /// An access token was required and a refresh token was given, or vice versa
    #[error("Expected {expected} token")]
    WrongType { expected: &'static str },
}

/// Token type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    /// Lifetime of a freshly issued token
    pub fn lifetime(&self) -> Duration {
        match self {
            TokenType::Access => Duration::hours(24),
            TokenType::Refresh => Duration::days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,

    /// Always [`ISSUER`]
    pub iss: String,

    /// Issued at (Unix seconds)
    pub iat: i64,

    /// Expiry (Unix seconds)
    pub exp: i64,

    /// Not before (Unix seconds)
    pub nbf: i64,

    pub token_type: TokenType,
}

impl Claims {
    /// Claims with the default lifetime for the token type
    pub fn new(user_id: Uuid, token_type: TokenType) -> Self {
        Self::with_lifetime(user_id, token_type, token_type.lifetime())
    }

    /// Claims with an explicit lifetime (negative values produce expired claims)
    pub fn with_lifetime(user_id: Uuid, token_type: TokenType, lifetime: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            nbf: now.timestamp(),
            token_type,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Seconds until expiry, as reported to clients in `expires_in`
    pub fn expires_in(&self) -> i64 {
        (self.exp - Utc::now().timestamp()).max(0)
    }
}

/// Signs claims with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::Create(e.to_string()))
}

/// Verifies signature, issuer, expiry and not-before, and returns the claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_nbf = true;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::Invalid(e.to_string()),
        })
}

/// Validates a token and requires it to be an access token
pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    expect_type(validate_token(token, secret)?, TokenType::Access)
}

/// Validates a token and requires it to be a refresh token
pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    expect_type(validate_token(token, secret)?, TokenType::Refresh)
}

fn expect_type(claims: Claims, expected: TokenType) -> Result<Claims, JwtError> {
    if claims.token_type != expected {
        return Err(JwtError::WrongType {
            expected: expected.as_str(),
        });
    }

    Ok(claims)
}

/// Access and refresh token pair returned on login
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Issues a fresh access/refresh pair for a user
pub fn issue_token_pair(user_id: Uuid, secret: &str) -> Result<TokenPair, JwtError> {
    let access = Claims::new(user_id, TokenType::Access);
    let refresh = Claims::new(user_id, TokenType::Refresh);

    Ok(TokenPair {
        access_token: create_token(&access, secret)?,
        refresh_token: create_token(&refresh, secret)?,
        token_type: "Bearer",
        expires_in: access.expires_in(),
    })
}

/// Exchanges a refresh token for a new access token
///
/// Returns the new token and the claims it was issued for.
pub fn refresh_access_token(refresh_token: &str, secret: &str) -> Result<(String, Claims), JwtError> {
    let refresh = validate_refresh_token(refresh_token, secret)?;
    let access = Claims::new(refresh.sub, TokenType::Access);
    let token = create_token(&access, secret)?;

    Ok((token, access))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_lifetimes() {
        assert_eq!(TokenType::Access.lifetime(), Duration::hours(24));
        assert_eq!(TokenType::Refresh.lifetime(), Duration::days(30));
    }

    #[test]
    fn test_create_and_validate() {
        let user_id = Uuid::new_v4();
        let token = create_token(&Claims::new(user_id, TokenType::Access), SECRET).unwrap();

        let claims = validate_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, ISSUER);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_wrong_secret() {
        let token = create_token(&Claims::new(Uuid::new_v4(), TokenType::Access), SECRET).unwrap();
        assert!(matches!(
            validate_token(&token, "another-secret-key-at-least-32-bytes"),
            Err(JwtError::Invalid(_))
        ));
    }

    #[test]
    fn test_expired() {
        let claims = Claims::with_lifetime(Uuid::new_v4(), TokenType::Access, Duration::hours(-1));
        assert!(claims.is_expired());
        assert_eq!(claims.expires_in(), 0);

        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let mut claims = Claims::new(Uuid::new_v4(), TokenType::Access);
        claims.iss = "someone-else".to_string();
        let token = create_token(&claims, SECRET).unwrap();

        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn test_type_checks() {
        let access = create_token(&Claims::new(Uuid::new_v4(), TokenType::Access), SECRET).unwrap();
        let refresh = create_token(&Claims::new(Uuid::new_v4(), TokenType::Refresh), SECRET).unwrap();

        assert!(validate_access_token(&access, SECRET).is_ok());
        assert!(matches!(
            validate_access_token(&refresh, SECRET),
            Err(JwtError::WrongType { expected: "access" })
        ));
        assert!(validate_refresh_token(&refresh, SECRET).is_ok());
        assert!(validate_refresh_token(&access, SECRET).is_err());
    }

    #[test]
    fn test_token_pair_and_refresh() {
        let user_id = Uuid::new_v4();
        let pair = issue_token_pair(user_id, SECRET).unwrap();
        assert_eq!(pair.token_type, "Bearer");
        assert!(pair.expires_in > 86_000);

        let (access, claims) = refresh_access_token(&pair.refresh_token, SECRET).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(validate_access_token(&access, SECRET).unwrap().sub, user_id);

        assert!(refresh_access_token(&pair.access_token, SECRET).is_err());
    }
}
