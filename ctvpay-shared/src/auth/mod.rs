/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and the minimum-length rule
/// - [`jwt`]: HS256 access and refresh tokens
/// - [`middleware`]: session loader (token to user row) and the `CurrentUser` extractor
/// - [`authorization`]: admin checks
/// - [`guard`]: login/protected page navigation decisions
///
/// # Example
///
/// ```no_run
/// use ctvpay_shared::auth::password::{hash_password, verify_password};
/// use ctvpay_shared::auth::jwt::issue_token_pair;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("matkhau123")?;
/// assert!(verify_password("matkhau123", &hash)?);
///
/// let tokens = issue_token_pair(Uuid::new_v4(), "secret-key-of-at-least-thirty-two-bytes")?;
/// println!("{}", tokens.access_token);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod guard;
pub mod jwt;
pub mod middleware;
pub mod password;
