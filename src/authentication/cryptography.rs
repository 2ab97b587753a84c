use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::{
    error::{Error, HtmlError},
    schema::User,
};

/// PHC string for `password`, salted per call.
pub fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            log::error!("Failed to hash password: {e}");
            HtmlError::InternalServerError.default()
        })
}

/// Whether `password` matches the hash stored for `user`.
/// An unreadable stored hash is a server error, never a mismatch.
pub fn verify_password(password: &str, user: &User) -> Result<bool, Error> {
    let stored = PasswordHash::new(&user.password).map_err(|e| {
        log::error!("Stored password hash for user {} is unreadable: {e}", user.id);
        HtmlError::InternalServerError.default()
    })?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &stored)
        .is_ok())
}
