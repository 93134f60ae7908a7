//! Key derivation.
//!
//! Passwords are stretched with PBKDF2-HMAC-SHA512 into 64 bytes of key material:
//! the first half keys AES-256, the second half keys HMAC-SHA512. Raw keys skip
//! derivation and are split the same way.
//!
//! # Security Guidelines
//!
//! - Passwords and raw keys stay inside `secrecy` wrappers until derivation
//! - Derived keys are zeroized on drop and never printed
//! - Salts must be fresh per encryption (see [`crate::crypto::generate_salt`])

use std::fmt;

use hmac::Hmac;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha512;
use zeroize::Zeroizing;

use crate::crypto::{CIPHER_KEY_LEN, SALT_LEN};
use crate::types::{CloakError, KEY_LEN, Secret};

/// PBKDF2 iteration count. Part of format 1.0.0; changing it requires a new version.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// 64 bytes of key material: AES key followed by HMAC key.
pub struct KeyMaterial(Zeroizing<[u8; KEY_LEN]>);

impl KeyMaterial {
    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self, CloakError> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        if bytes.len() != KEY_LEN {
            return Err(CloakError::Validation("raw key must be exactly 64 bytes"));
        }
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    pub fn cipher_key(&self) -> &[u8] {
        &self.0[..CIPHER_KEY_LEN]
    }

    pub fn mac_key(&self) -> &[u8] {
        &self.0[CIPHER_KEY_LEN..]
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial([REDACTED])")
    }
}

/// Derive key material from a password and salt with PBKDF2-HMAC-SHA512.
pub fn derive_key(
    password: &SecretString,
    salt: &[u8; SALT_LEN],
) -> Result<KeyMaterial, CloakError> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2::<Hmac<Sha512>>(
        password.expose_secret().as_bytes(),
        salt,
        PBKDF2_ITERATIONS,
        key.as_mut_slice(),
    )
    .map_err(|_| CloakError::Crypto("key derivation failed"))?;
    Ok(KeyMaterial(key))
}

/// Turn a [`Secret`] into key material.
///
/// Password secrets need the salt stored next to the ciphertext; raw keys ignore it.
pub(crate) fn resolve_key(
    secret: &Secret,
    salt: Option<&[u8; SALT_LEN]>,
) -> Result<KeyMaterial, CloakError> {
    match (secret, salt) {
        (Secret::Password(password), Some(salt)) => derive_key(password, salt),
        (Secret::Password(_), None) => Err(CloakError::Malformed("missing salt")),
        (Secret::RawKey(key), _) => KeyMaterial::from_bytes(key.expose_secret()),
    }
}
