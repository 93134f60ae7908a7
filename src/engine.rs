//! Encrypt/decrypt entry points.
//!
//! [`encrypt`] validates its inputs, seals the body into a container and then opens
//! the container again with the same secret. Output is only returned when that
//! round trip reproduces the input exactly.

use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::body::{BODY_HEADER_LEN, Body, MAX_FIELD_LEN, pack_body, unpack_body};
use crate::crypto::{self, BLOCK_LEN};
use crate::format::{
    CURRENT_VERSION, Container, MAX_CIPHERTEXT_LEN, build_container, parse_container,
};
use crate::kdf::resolve_key;
use crate::naming::{add_extension, change_extension, parse_file_name};
use crate::types::{CloakError, CryptOptions, KeyKind, Limits, Secret};

/// A file to encrypt: its original name and contents.
#[derive(Debug, Clone, Copy)]
pub struct SourceFile<'a> {
    pub name: &'a str,
    pub data: &'a [u8],
}

/// An unrelated file to hide the container behind.
#[derive(Debug, Clone, Copy)]
pub struct Disguise<'a> {
    pub name: &'a str,
    pub data: &'a [u8],
}

/// Output of [`encrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encrypted {
    pub data: Vec<u8>,
    /// Suggested name for the container.
    pub file_name: String,
}

/// Output of [`decrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted {
    pub data: Vec<u8>,
    /// Original file stem, present for disguised containers.
    pub name: Option<String>,
    pub extension: Option<String>,
}

impl Decrypted {
    /// Reconstruct a file name for the decrypted data.
    ///
    /// Uses the embedded name when there is one, otherwise swaps the extension of
    /// the container's own name.
    pub fn file_name(&self, container_name: &str) -> String {
        match &self.name {
            Some(name) => add_extension(name, self.extension.as_deref()),
            None => change_extension(container_name, self.extension.as_deref()),
        }
    }
}

/// Largest payload whose padded body still fits the ciphertext length field.
const MAX_PAYLOAD_LEN: usize =
    MAX_CIPHERTEXT_LEN - BLOCK_LEN - BODY_HEADER_LEN - 2 * MAX_FIELD_LEN;

fn has_separator(name: &str) -> bool {
    name.contains(['/', '\\'])
}

fn validate_file<'a>(
    file: &SourceFile<'a>,
    limits: &Limits,
) -> Result<(&'a str, Option<&'a str>), CloakError> {
    if has_separator(file.name) {
        return Err(CloakError::Validation("file name must not contain a path"));
    }
    let (stem, extension) = parse_file_name(file.name);
    if stem.is_empty() {
        return Err(CloakError::Validation("file name is required"));
    }
    // configured limits cannot exceed what the body and trailer can encode
    if stem.len() > limits.max_name_len.min(MAX_FIELD_LEN) {
        return Err(CloakError::Validation("file name is too long"));
    }
    if extension.is_some_and(|ext| ext.len() > limits.max_extension_len.min(MAX_FIELD_LEN)) {
        return Err(CloakError::Validation("file extension is too long"));
    }
    if file.data.is_empty() {
        return Err(CloakError::Validation("folders and empty files are not allowed"));
    }
    if file.data.len() > limits.max_total_size.min(MAX_PAYLOAD_LEN) {
        return Err(CloakError::Validation("file is too large"));
    }
    Ok((stem, extension))
}

fn validate_disguise(
    disguise: &Disguise<'_>,
    file: &SourceFile<'_>,
    limits: &Limits,
) -> Result<(), CloakError> {
    if has_separator(disguise.name) {
        return Err(CloakError::Validation("disguise file name must not contain a path"));
    }
    let (stem, _) = parse_file_name(disguise.name);
    if stem.is_empty() {
        return Err(CloakError::Validation("disguise file name is required"));
    }
    if disguise.data.is_empty() {
        return Err(CloakError::Validation("folders and empty files are not allowed"));
    }
    if disguise.data.len() > limits.max_total_size {
        return Err(CloakError::Validation("disguise is too large"));
    }
    let total = file.data.len().saturating_add(disguise.data.len());
    if total > limits.max_total_size {
        return Err(CloakError::Validation("file and disguise are too large in total"));
    }
    Ok(())
}

/// Encrypt `file` with `secret`, optionally hidden behind `disguise`.
///
/// # Errors
///
/// - `CloakError::Validation` for empty or oversized inputs, bad names or a secret
///   outside its bounds (checked before any cryptography runs)
/// - `CloakError::SelfCheck` if the produced container does not decrypt back to
///   the input
/// - `CloakError::Crypto` if the OS random source fails
pub fn encrypt(
    file: &SourceFile<'_>,
    secret: &Secret,
    disguise: Option<&Disguise<'_>>,
    opts: &CryptOptions,
) -> Result<Encrypted, CloakError> {
    let limits = &opts.limits;
    let (stem, extension) = validate_file(file, limits)?;
    if let Some(disguise) = disguise {
        validate_disguise(disguise, file, limits)?;
    }
    secret.validate(limits)?;

    debug!(
        size = file.data.len(),
        kind = ?secret.kind(),
        disguised = disguise.is_some(),
        "encrypting"
    );

    let salt = match secret.kind() {
        KeyKind::Password => Some(crypto::generate_salt()?),
        KeyKind::RawKey => None,
    };
    let iv = crypto::generate_iv()?;
    let key = resolve_key(secret, salt.as_ref())?;

    let body = Body {
        name: disguise.map(|_| stem),
        extension,
        data: file.data,
    };
    let ciphertext = {
        let plain = Zeroizing::new(pack_body(&body)?);
        crypto::encrypt_block(&plain, key.cipher_key(), &iv)?
    };
    let tag = crypto::authenticate(&ciphertext, &iv, key.mac_key())?;

    let data = build_container(&Container {
        disguise: disguise.map_or(&[][..], |d| d.data),
        ciphertext: &ciphertext,
        iv,
        tag,
        salt,
        version: CURRENT_VERSION,
    })?;

    check_back(&data, secret, &body)?;

    let file_name = match disguise {
        Some(disguise) => disguise.name.to_string(),
        None => change_extension(file.name, Some(&opts.container_extension)),
    };
    debug!(size = data.len(), "encrypted");
    Ok(Encrypted { data, file_name })
}

/// Open `container` again and compare it with what went in.
fn check_back(container: &[u8], secret: &Secret, expected: &Body<'_>) -> Result<(), CloakError> {
    match open(container, secret) {
        Ok(back)
            if back.data == expected.data
                && back.name.as_deref() == expected.name
                && back.extension.as_deref() == expected.extension =>
        {
            Ok(())
        }
        Ok(_) => {
            warn!("self-check: decrypted output differs from input");
            Err(CloakError::SelfCheck)
        }
        Err(err) => {
            warn!(error = %err, "self-check: unable to decrypt own output");
            Err(CloakError::SelfCheck)
        }
    }
}

/// Decrypt a container produced by [`encrypt`].
///
/// # Errors
///
/// - `CloakError::Validation` for empty or oversized input, or a raw key of the
///   wrong width
/// - `CloakError::Malformed` if the bytes are not a container
/// - `CloakError::UnsupportedVersion` for containers from an incompatible version
/// - `CloakError::Authentication` for a wrong secret or any tampering
pub fn decrypt(
    container: &[u8],
    secret: &Secret,
    opts: &CryptOptions,
) -> Result<Decrypted, CloakError> {
    if container.is_empty() {
        return Err(CloakError::Validation("folders and empty files are not allowed"));
    }
    if container.len() > opts.limits.max_container_size() {
        return Err(CloakError::Validation("file is too large"));
    }
    debug!(size = container.len(), kind = ?secret.kind(), "decrypting");

    let result = open(container, secret);
    if let Err(err) = &result {
        warn!(error = %err, "decryption failed");
    }
    result
}

fn open(container: &[u8], secret: &Secret) -> Result<Decrypted, CloakError> {
    let parsed = parse_container(container, secret.kind())?;
    let key = resolve_key(secret, parsed.salt.as_ref())?;
    crypto::verify(parsed.ciphertext, &parsed.iv, key.mac_key(), &parsed.tag)?;

    let mut plain = Zeroizing::new(crypto::decrypt_block(
        parsed.ciphertext,
        key.cipher_key(),
        &parsed.iv,
    )?);
    let (name, extension, offset) = {
        let body = unpack_body(&plain)?;
        (
            body.name.map(str::to_owned),
            body.extension.map(str::to_owned),
            plain.len() - body.data.len(),
        )
    };
    // the payload is the tail of the body; shift it down instead of copying
    plain.drain(..offset);
    let data = std::mem::take(&mut *plain);

    Ok(Decrypted {
        data,
        name,
        extension,
    })
}
