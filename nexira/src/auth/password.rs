//! Password hashing with argon2id.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a password for storage.
pub fn hash_string(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash. A malformed stored hash
/// verifies as false rather than erroring, so login never leaks whether
/// the account has a usable password.
pub fn verify_string(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_string("hunter2-but-longer").expect("hashing failed");
        assert!(verify_string("hunter2-but-longer", &hash));
        assert!(!verify_string("wrong password", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_string("same password").expect("hashing failed");
        let b = hash_string("same password").expect("hashing failed");
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_rejected() {
        assert!(!verify_string("anything", "not-a-phc-string"));
        assert!(!verify_string("anything", ""));
    }
}
