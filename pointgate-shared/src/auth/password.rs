/// Password hashing module using Argon2id
///
/// This module provides secure password hashing using the Argon2id algorithm.
/// Besides plain hash/verify it supports opportunistic rehashing: stored
/// hashes created with weaker parameters (or a different algorithm) are
/// detected at login time and replaced with a fresh hash.
///
/// # Security
///
/// - **Algorithm**: Argon2id (hybrid of Argon2i and Argon2d)
/// - **Memory**: 64 MB (65536 KB)
/// - **Iterations**: 3 passes
/// - **Parallelism**: 4 lanes
/// - **Output**: 32-byte hash
///
/// # Example
///
/// ```
/// use pointgate_shared::auth::password::{hash_password, verify_and_update};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("super_secret_password_123")?;
///
/// let (ok, new_hash) = verify_and_update("super_secret_password_123", &hash)?;
/// assert!(ok);
/// // Hash was produced with current parameters, nothing to update.
/// assert!(new_hash.is_none());
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, ParamsBuilder, Version,
};

/// Memory cost in KiB (64 MB)
const M_COST: u32 = 65536;

/// Number of iterations
const T_COST: u32 = 3;

/// Degree of parallelism
const P_COST: u32 = 4;

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Invalid password hash format
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

fn current_params() -> Result<Params, PasswordError> {
    ParamsBuilder::new()
        .m_cost(M_COST)
        .t_cost(T_COST)
        .p_cost(P_COST)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))
}

/// Hashes a password using Argon2id with the current parameters
///
/// # Arguments
///
/// * `password` - The plaintext password to hash
///
/// # Returns
///
/// PHC string format hash (includes algorithm, parameters, salt, and hash),
/// e.g. `$argon2id$v=19$m=65536,t=3,p=4$...`
///
/// # Errors
///
/// Returns `PasswordError::HashError` if hashing fails
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, current_params()?);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verifies a password against a stored hash
///
/// Verification is constant-time; the parameters embedded in the hash are
/// used, so hashes produced with older parameters still verify.
///
/// # Arguments
///
/// * `password` - The plaintext password to verify
/// * `hash` - The password hash (PHC string format)
///
/// # Returns
///
/// `Ok(true)` if password matches, `Ok(false)` if it doesn't match
///
/// # Errors
///
/// Returns `PasswordError::InvalidHash` if the stored hash cannot be parsed
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    let argon2 = Argon2::default();

    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!(
            "Verification failed: {}",
            e
        ))),
    }
}

/// Checks whether a stored hash was produced with outdated parameters
///
/// A hash needs rehashing when it does not use Argon2id or when its
/// memory/iteration costs are below the current configuration.
///
/// # Errors
///
/// Returns `PasswordError::InvalidHash` if the hash cannot be parsed
pub fn needs_rehash(hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    if !hash.starts_with("$argon2id$") {
        return Ok(true);
    }

    let m_cost = parsed.params.get_decimal("m").unwrap_or(0);
    let t_cost = parsed.params.get_decimal("t").unwrap_or(0);

    Ok(m_cost < M_COST || t_cost < T_COST)
}

/// Verifies a password and rehashes it if the stored hash is outdated
///
/// Returns whether the password matched and, when it matched and the stored
/// hash uses outdated parameters, a replacement hash the caller should
/// persist.
///
/// # Example
///
/// ```
/// use pointgate_shared::auth::password::{hash_password, verify_and_update};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("pw")?;
/// let (ok, new_hash) = verify_and_update("pw", &hash)?;
/// assert!(ok && new_hash.is_none());
///
/// let (ok, _) = verify_and_update("wrong", &hash)?;
/// assert!(!ok);
/// # Ok(())
/// # }
/// ```
pub fn verify_and_update(
    password: &str,
    hash: &str,
) -> Result<(bool, Option<String>), PasswordError> {
    if !verify_password(password, hash)? {
        return Ok((false, None));
    }

    if needs_rehash(hash)? {
        Ok((true, Some(hash_password(password)?)))
    } else {
        Ok((true, None))
    }
}
