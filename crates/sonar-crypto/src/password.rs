use anyhow::{Result, anyhow};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{Error as HashError, SaltString, rand_core::OsRng},
};

/// A well-formed hash with the default Argon2 parameters that no password
/// matches. Checked against when a login names an unknown user.
const UNMATCHABLE_HASH: &str = concat!(
    "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$",
    "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
);

/// Hash a plaintext password with Argon2id and a fresh salt.
///
/// The result is a self-describing PHC string (`$argon2id$v=19$...`), which is
/// what gets stored in `users.password`.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

/// Check a plaintext password against a stored PHC string.
///
/// `Ok(false)` means the password is wrong; `Err` means the stored value
/// could not be parsed at all.
pub fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| anyhow!("Corrupt password hash: {}", e))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(HashError::Password) => Ok(false),
        Err(e) => Err(anyhow!("Password verification failed: {}", e)),
    }
}

/// Spend the same Argon2 work as [`verify_password`] without a stored hash.
///
/// Login calls this when the username is unknown so the response time does
/// not reveal which usernames exist. Always `Ok(false)`.
pub fn verify_password_unknown_user(password: &str) -> Result<bool> {
    verify_password(password, UNMATCHABLE_HASH).map(|_| false)
}
