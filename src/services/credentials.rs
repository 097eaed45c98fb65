//! Credential verification
//!
//! Password hashing and verification using Argon2id, and email syntax checks.
//!
//! # Security
//!
//! - Argon2id with the argon2 crate's default parameters
//! - A fresh random salt for every hash
//! - Verification never reports *why* a password was rejected

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;
use regex::Regex;

/// Local part per RFC 5322 atext, domain labels of up to 63 characters
const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$";

static EMAIL_REGEX: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(EMAIL_PATTERN));

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// The email expression could not be compiled
    #[error("Email pattern error: {0}")]
    PatternError(String),

    #[error("Password hashing failed: {0}")]
    Hash(String),
}

/// Check an address against the email pattern.
///
/// Syntactically invalid addresses yield `Ok(false)`.
pub fn validate_email(address: &str) -> Result<bool, CredentialError> {
    match EMAIL_REGEX.as_ref() {
        Ok(re) => Ok(re.is_match(address)),
        Err(e) => Err(CredentialError::PatternError(e.to_string())),
    }
}

/// Hash a password using Argon2id with a per-call random salt.
///
/// # Returns
///
/// The password hash in PHC string format (algorithm, parameters, salt, hash)
///
/// # Example
///
/// ```ignore
/// use musicmatch::services::credentials::hash_password;
///
/// let hash = hash_password("pw1")?;
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError::Hash(e.to_string()))
}

/// Verify a password against a stored hash.
///
/// Returns `false` on a wrong password and on a malformed hash alike. The
/// digest comparison itself is constant-time.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is malformed");
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_produces_argon2id_hash() {
        let hash = hash_password("test_password_123").expect("Failed to hash password");
        assert!(hash.starts_with("$argon2id$"), "Hash should use Argon2id");
    }

    #[test]
    fn test_hash_password_produces_different_hashes() {
        let hash1 = hash_password("same_password").expect("Failed to hash password");
        let hash2 = hash_password("same_password").expect("Failed to hash password");

        assert_ne!(hash1, hash2, "Same password should produce different hashes due to random salt");
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("pw1").expect("Failed to hash password");

        assert!(verify_password("pw1", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("", &hash));
    }

    #[test]
    fn test_verify_password_malformed_hash_is_false() {
        assert!(!verify_password("password", "invalid_hash_format"));
        assert!(!verify_password("password", ""));
        // Plaintext stored by mistake must never verify by equality
        assert!(!verify_password("password", "password"));
    }

    #[test]
    fn test_hash_password_unicode() {
        let password = "密码测试🔐";
        let hash = hash_password(password).expect("Failed to hash unicode password");
        assert!(verify_password(password, &hash));
    }

    #[test]
    fn test_password_hash_not_equal_to_password() {
        let password = "my_secret_password";
        let hash = hash_password(password).expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(!hash.contains(password));
    }

    #[test]
    fn test_validate_email() {
        for valid in [
            "alice@x.com",
            "first.last+tag@sub.example.org",
            "o'hara@example.ie",
            "user@localhost",
        ] {
            assert!(validate_email(valid).unwrap(), "{} should be valid", valid);
        }

        for invalid in [
            "",
            "alice",
            "alice@",
            "@x.com",
            "alice@-x.com",
            "alice@x-.com",
            "alice@x..com",
            "al ice@x.com",
            "alice@x.com\n",
        ] {
            assert!(!validate_email(invalid).unwrap(), "{:?} should be invalid", invalid);
        }
    }
}
