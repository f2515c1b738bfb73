use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand_core::OsRng;
use sha2::{Digest, Sha256};

use crate::errors::{AppError, AppResult};
use crate::utils::random_string;

const MIN_PASSWORD_LENGTH: usize = 8;
const TEMP_PASSWORD_LENGTH: usize = 12;
const TEMP_PASSWORD_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnpqrstuvwxyz23456789";

/// Composition rules: at least 8 characters, letters and digits only, with at
/// least one uppercase letter, one lowercase letter and one digit.
pub fn validate_strength(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::weak_password(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if !password.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::weak_password("password may contain only letters and digits"));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(AppError::weak_password("password needs an uppercase letter"));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(AppError::weak_password("password needs a lowercase letter"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::weak_password("password needs a digit"));
    }
    Ok(())
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::internal(format!("failed to hash password: {err}")))
}

/// Verifies against an argon2 PHC string, or against a bare SHA-256 hex digest
/// carried over from older directories.
pub fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    if is_legacy_hash(password_hash) {
        let digest = hex::encode(Sha256::digest(password.as_bytes()));
        return Ok(digest.eq_ignore_ascii_case(password_hash));
    }

    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|err| AppError::internal(format!("invalid password hash: {err}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn is_legacy_hash(password_hash: &str) -> bool {
    password_hash.len() == 64 && password_hash.chars().all(|c| c.is_ascii_hexdigit())
}

/// One-time password that always satisfies `validate_strength`.
pub fn generate_temp_password() -> String {
    loop {
        let candidate = random_string(TEMP_PASSWORD_ALPHABET, TEMP_PASSWORD_LENGTH);
        if validate_strength(&candidate).is_ok() {
            return candidate;
        }
    }
}
