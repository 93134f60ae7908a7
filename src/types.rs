//! Core types, options and the error enum for cloak_file.

use std::fmt;

use getrandom::fill as getrandom;
use secrecy::{ExposeSecret, SecretSlice, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

/// Length of raw key material in bytes: AES-256 key followed by the HMAC key.
pub const KEY_LEN: usize = 64;

/// Default extension given to containers that are not disguised.
pub const DEFAULT_CONTAINER_EXTENSION: &str = "cloak";

/// Default upper bound for the file (plus disguise) size: 512 MiB.
pub const DEFAULT_MAX_TOTAL_SIZE: usize = 512 * 1024 * 1024;

/// The secret a container is sealed with.
///
/// A password is stretched with PBKDF2 and a fresh salt; a raw key is used as-is
/// and must be exactly [`KEY_LEN`] bytes.
#[derive(Debug)]
pub enum Secret {
    Password(SecretString),
    RawKey(SecretSlice<u8>),
}

/// Which kind of secret sealed a container. Decides whether a salt is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Password,
    RawKey,
}

impl Secret {
    pub fn password(password: impl Into<String>) -> Self {
        Secret::Password(SecretString::new(password.into().into_boxed_str()))
    }

    pub fn raw_key(bytes: impl Into<Vec<u8>>) -> Self {
        Secret::RawKey(SecretSlice::new(bytes.into().into_boxed_slice()))
    }

    /// Generate a fresh random raw key of [`KEY_LEN`] bytes.
    pub fn generate_raw_key() -> Result<Self, CloakError> {
        let mut key = Zeroizing::new(vec![0u8; KEY_LEN]);
        getrandom(key.as_mut_slice()).map_err(|_| CloakError::Crypto("rng unavailable"))?;
        Ok(Secret::raw_key(key.as_slice()))
    }

    pub fn kind(&self) -> KeyKind {
        match self {
            Secret::Password(_) => KeyKind::Password,
            Secret::RawKey(_) => KeyKind::RawKey,
        }
    }

    /// Check the secret against the configured bounds.
    ///
    /// Password length bounds count characters, not bytes. Raw keys must have the
    /// exact key width.
    pub(crate) fn validate(&self, limits: &Limits) -> Result<(), CloakError> {
        match self {
            Secret::Password(pw) => {
                let len = pw.expose_secret().chars().count();
                if len == 0 {
                    return Err(CloakError::Validation("password is empty"));
                }
                if len < limits.min_password_len {
                    return Err(CloakError::Validation("password is too short"));
                }
                if len > limits.max_password_len {
                    return Err(CloakError::Validation("password is too long"));
                }
            }
            Secret::RawKey(key) => {
                if key.expose_secret().len() != KEY_LEN {
                    return Err(CloakError::Validation("raw key must be exactly 64 bytes"));
                }
            }
        }
        Ok(())
    }
}

/// Size and length bounds applied to inputs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Limits {
    /// Maximum size of the file, and of file plus disguise combined.
    pub max_total_size: usize,
    /// Maximum length of the file name stem in bytes.
    pub max_name_len: usize,
    /// Maximum length of the file extension in bytes.
    pub max_extension_len: usize,
    pub min_password_len: usize,
    pub max_password_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_total_size: DEFAULT_MAX_TOTAL_SIZE,
            max_name_len: 255,
            max_extension_len: 32,
            min_password_len: 6,
            max_password_len: 127,
        }
    }
}

impl Limits {
    /// Largest container a decrypt call accepts: the payload bound plus the worst-case
    /// trailer, padding block and embedded name/extension.
    pub fn max_container_size(&self) -> usize {
        self.max_total_size
            .saturating_add(crate::format::MAX_TRAILER_LEN)
            .saturating_add(crate::crypto::BLOCK_LEN)
            .saturating_add(crate::body::BODY_HEADER_LEN)
            .saturating_add(self.max_name_len)
            .saturating_add(self.max_extension_len)
    }
}

/// Options for encryption and decryption.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CryptOptions {
    pub limits: Limits,
    /// Extension used for the suggested name of undisguised containers.
    pub container_extension: String,
    /// When `true`, allow overwriting existing output file paths.
    pub force: bool,
}

impl Default for CryptOptions {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            container_extension: DEFAULT_CONTAINER_EXTENSION.to_string(),
            force: false,
        }
    }
}

impl CryptOptions {
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_force(mut self, on: bool) -> Self {
        self.force = on;
        self
    }
}

/// Container format version (major, minor, revision).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FormatVersion {
    pub major: u8,
    pub minor: u8,
    pub revision: u8,
}

impl FormatVersion {
    pub const fn new(major: u8, minor: u8, revision: u8) -> Self {
        Self {
            major,
            minor,
            revision,
        }
    }

    pub const fn to_bytes(self) -> [u8; 3] {
        [self.major, self.minor, self.revision]
    }

    pub const fn from_bytes(bytes: [u8; 3]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2])
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)
    }
}

/// Library error type (no panics for expected failures).
#[derive(Error, Debug)]
pub enum CloakError {
    #[error("I/O error")]
    Io(#[from] std::io::Error),
    #[error("invalid input: {0}")]
    Validation(&'static str),
    #[error("file is corrupted or not a recognized container: {0}")]
    Malformed(&'static str),
    #[error("unsupported container version {0}")]
    UnsupportedVersion(FormatVersion),
    #[error("authentication failed: wrong password/key or corrupted file")]
    Authentication,
    #[error("unable to verify own output")]
    SelfCheck,
    #[error("cryptographic failure: {0}")]
    Crypto(&'static str),
}

impl CloakError {
    /// `true` when the failure stems from what the user supplied (input files,
    /// secret, container) rather than from this library or the host.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            CloakError::Validation(_)
                | CloakError::Malformed(_)
                | CloakError::UnsupportedVersion(_)
                | CloakError::Authentication
        )
    }

    /// Short message suitable for a notification shown to the user.
    pub fn user_hint(&self) -> &'static str {
        match self {
            CloakError::Validation(msg) => msg,
            CloakError::Malformed(_) => "The file is corrupted or is not an encrypted container.",
            CloakError::UnsupportedVersion(_) => {
                "The file was produced by an incompatible version of the app."
            }
            CloakError::Authentication => {
                "Check that the password or key is correct and make sure the file is not damaged."
            }
            CloakError::SelfCheck | CloakError::Crypto(_) => {
                "Something went wrong while encrypting. Please try again."
            }
            CloakError::Io(_) => "The file could not be read or written.",
        }
    }
}
