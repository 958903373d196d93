/// Argon2id password hashing
///
/// Hashes are stored in PHC string format, so the parameters travel with the
/// hash and verification never needs them configured.
///
/// # Example
///
/// ```
/// use ctvpay_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("matkhau123")?;
/// assert!(verify_password("matkhau123", &hash)?);
/// assert!(!verify_password("matkhau124", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Shortest accepted password, in characters
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Error type for password operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Hashing failed
    #[error("Failed to hash password: {0}")]
    Hash(String),

    /// The stored hash could not be parsed
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),

    /// Verification failed for a reason other than a wrong password
    #[error("Failed to verify password: {0}")]
    Verify(String),

    /// Password rejected by the strength rule
    #[error("Password must be at least {MIN_PASSWORD_LENGTH} characters")]
    Weak,
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    // 19 MiB, 2 passes, 1 lane
    let params = Params::new(19 * 1024, 2, 1, Some(32))
        .map_err(|e| PasswordError::Hash(format!("invalid parameters: {e}")))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hash(e.to_string()))?;

    Ok(hash.to_string())
}

/// Verifies a password against a stored PHC hash
///
/// Returns `Ok(false)` for a wrong password and an error only when the hash
/// itself is unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::Verify(e.to_string())),
    }
}

/// Applies the strength rule used when admins create or reset accounts
pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::Weak);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_format() {
        let hash = hash_password("matkhau123").expect("hash");
        assert!(hash.starts_with("$argon2id$v=19$"));
        assert!(hash.contains("m=19456,t=2,p=1"));
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("same").expect("hash");
        let b = hash_password("same").expect("hash");
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify() {
        let hash = hash_password("mật khẩu").expect("hash");
        assert!(verify_password("mật khẩu", &hash).expect("verify"));
        assert!(!verify_password("mat khau", &hash).expect("verify"));
        assert!(!verify_password("", &hash).expect("verify"));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(matches!(
            verify_password("x", "not-a-hash"),
            Err(PasswordError::InvalidHash(_))
        ));
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("123456").is_ok());
        assert!(matches!(validate_password("12345"), Err(PasswordError::Weak)));
        // counted in characters, not bytes
        assert!(matches!(validate_password("ưươ"), Err(PasswordError::Weak)));
    }
}
