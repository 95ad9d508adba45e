//! Password hashing module
//!
//! New hashes are Argon2id PHC strings with the argon2 crate defaults.
//! Hashes carried over from older deployments (werkzeug `scrypt:` /
//! `pbkdf2:` strings) are recognized but never verified; those accounts
//! need a password reset.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Family of a stored password hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashKind {
    Argon2,
    /// werkzeug-style `method:params$salt$hash`
    Legacy,
    Unknown,
}

/// Classify a stored hash without parsing it fully
pub fn hash_kind(hash: &str) -> HashKind {
    if hash.starts_with("$argon2") {
        HashKind::Argon2
    } else if hash.starts_with("scrypt:") || hash.starts_with("pbkdf2:") {
        HashKind::Legacy
    } else {
        HashKind::Unknown
    }
}

/// Hash a password using Argon2id with secure defaults.
///
/// ```ignore
/// let hash = hash_password("Secreto2024")?;
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
        .context("Password hashing failed")?;

    Ok(password_hash.to_string())
}

/// Verify a password against a stored Argon2 hash.
///
/// Returns an error if the hash is not a valid PHC string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))
        .context("Failed to parse password hash")?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification failed: {}", e))
            .context("Password verification error"),
    }
}

/// Check the password policy, returning a user-facing message on failure.
///
/// At least [`MIN_PASSWORD_LENGTH`] characters with one letter and one digit.
pub fn validar_politica(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "La contraseña debe tener al menos {} caracteres",
            MIN_PASSWORD_LENGTH
        ));
    }
    if !password.chars().any(char::is_alphabetic) {
        return Err("La contraseña debe incluir al menos una letra".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("La contraseña debe incluir al menos un número".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_produces_argon2id_hash() {
        let hash = hash_password("Secreto2024").expect("Failed to hash password");
        assert!(hash.starts_with("$argon2id$"));
        assert_eq!(hash_kind(&hash), HashKind::Argon2);
    }

    #[test]
    fn test_hash_password_uses_random_salt() {
        let hash1 = hash_password("Secreto2024").expect("Failed to hash password");
        let hash2 = hash_password("Secreto2024").expect("Failed to hash password");
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("Secreto2024").expect("Failed to hash password");
        assert!(verify_password("Secreto2024", &hash).expect("verify"));
        assert!(!verify_password("secreto2024", &hash).expect("verify"));
    }

    #[test]
    fn test_verify_rejects_legacy_format() {
        let legacy = "scrypt:32768:8:1$abcdef$0123456789abcdef";
        assert_eq!(hash_kind(legacy), HashKind::Legacy);
        assert!(verify_password("cualquiera", legacy).is_err());
    }

    #[test]
    fn test_hash_kind_unknown() {
        assert_eq!(hash_kind("texto-plano"), HashKind::Unknown);
        assert_eq!(hash_kind("pbkdf2:sha256:600000$x$y"), HashKind::Legacy);
    }

    #[test]
    fn test_validar_politica() {
        assert!(validar_politica("Secreto2024").is_ok());
        assert!(validar_politica("corta1").is_err());
        assert!(validar_politica("sinnumeros").is_err());
        assert!(validar_politica("1234567890").is_err());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(5))]

            #[test]
            fn hash_then_verify(password in "[a-zA-Z]{4,20}[0-9]{1,4}") {
                let hash = hash_password(&password).expect("hash");
                prop_assert!(verify_password(&password, &hash).expect("verify"));
                prop_assert!(validar_politica(&password).is_ok() || password.len() < MIN_PASSWORD_LENGTH);
            }
        }
    }
}
