//! Core encryption and authentication primitives.
//!
//! AES-256-CBC with PKCS#7 padding for confidentiality and HMAC-SHA512 over
//! `ciphertext || iv` for integrity. Callers must verify the tag before decrypting.

use aes::Aes256;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use getrandom::fill as getrandom;
use hmac::{Hmac, Mac};
use sha2::Sha512;

use crate::types::CloakError;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha512 = Hmac<Sha512>;

/// AES block size in bytes.
pub const BLOCK_LEN: usize = 16;
/// CBC initialization vector length.
pub const IV_LEN: usize = BLOCK_LEN;
/// Password salt length.
pub const SALT_LEN: usize = 16;
/// HMAC-SHA512 tag length.
pub const TAG_LEN: usize = 64;
/// AES-256 key length.
pub const CIPHER_KEY_LEN: usize = 32;

fn random<const L: usize>() -> Result<[u8; L], CloakError> {
    let mut out = [0u8; L];
    getrandom(&mut out).map_err(|_| CloakError::Crypto("rng unavailable"))?;
    Ok(out)
}

/// Generate a cryptographically secure random salt.
pub fn generate_salt() -> Result<[u8; SALT_LEN], CloakError> {
    random()
}

/// Generate a cryptographically secure random IV.
pub fn generate_iv() -> Result<[u8; IV_LEN], CloakError> {
    random()
}

/// Encrypt `plaintext` with AES-256-CBC and PKCS#7 padding.
///
/// The output is always a non-zero multiple of [`BLOCK_LEN`].
pub fn encrypt_block(
    plaintext: &[u8],
    key: &[u8],
    iv: &[u8; IV_LEN],
) -> Result<Vec<u8>, CloakError> {
    let cipher = Aes256CbcEnc::new_from_slices(key, iv)
        .map_err(|_| CloakError::Crypto("invalid cipher key length"))?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// Decrypt AES-256-CBC `ciphertext` and strip the PKCS#7 padding.
///
/// # Errors
///
/// `CloakError::Crypto` when the padding is invalid. No partial plaintext is returned.
pub fn decrypt_block(
    ciphertext: &[u8],
    key: &[u8],
    iv: &[u8; IV_LEN],
) -> Result<Vec<u8>, CloakError> {
    let cipher = Aes256CbcDec::new_from_slices(key, iv)
        .map_err(|_| CloakError::Crypto("invalid cipher key length"))?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CloakError::Crypto("invalid padding"))
}

fn keyed_mac(ciphertext: &[u8], iv: &[u8], key: &[u8]) -> Result<HmacSha512, CloakError> {
    let mut mac = <HmacSha512 as Mac>::new_from_slice(key)
        .map_err(|_| CloakError::Crypto("invalid mac key"))?;
    mac.update(ciphertext);
    mac.update(iv);
    Ok(mac)
}

/// Compute HMAC-SHA512 over `ciphertext || iv`.
pub fn authenticate(
    ciphertext: &[u8],
    iv: &[u8; IV_LEN],
    key: &[u8],
) -> Result<[u8; TAG_LEN], CloakError> {
    let mac = keyed_mac(ciphertext, iv, key)?;
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    Ok(tag)
}

/// Check `tag` against `ciphertext || iv` in constant time.
///
/// # Errors
///
/// `CloakError::Authentication` on mismatch.
pub fn verify(
    ciphertext: &[u8],
    iv: &[u8; IV_LEN],
    key: &[u8],
    tag: &[u8],
) -> Result<(), CloakError> {
    keyed_mac(ciphertext, iv, key)?
        .verify_slice(tag)
        .map_err(|_| CloakError::Authentication)
}
