//! Argon2id password hashing with a server-side pepper.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use super::errors::{AuthError, AuthResult};

/// One-way password hashing; output is a PHC string.
#[derive(Clone)]
pub struct CredentialHasher {
    pepper: String,
    params: Params,
}

impl CredentialHasher {
    /// Hasher with the Argon2 default cost parameters
    pub fn new(pepper: String) -> Self {
        Self {
            pepper,
            params: Params::default(),
        }
    }

    /// Hasher with explicit cost: memory in KiB, iterations, parallelism
    pub fn with_params(
        pepper: String,
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> AuthResult<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|_| AuthError::HashingFailed)?;
        Ok(Self { pepper, params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash password with Argon2id + pepper
    pub fn hash(&self, password: &str) -> AuthResult<String> {
        let peppered = format!("{}{}", password, self.pepper);
        let salt = SaltString::generate(&mut OsRng);

        Ok(self
            .argon2()
            .hash_password(peppered.as_bytes(), &salt)
            .map_err(|_| AuthError::HashingFailed)?
            .to_string())
    }

    /// Verify password against hash
    ///
    /// Any mismatch, including an unparsable stored hash, reads as
    /// `InvalidCredentials`.
    pub fn verify(&self, password: &str, hash: &str) -> AuthResult<()> {
        let peppered = format!("{}{}", password, self.pepper);
        let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;

        // Cost parameters are read from the PHC string
        self.argon2()
            .verify_password(peppered.as_bytes(), &parsed_hash)
            .map_err(|_| AuthError::InvalidCredentials)
    }
}
