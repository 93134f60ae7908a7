//! On-disk container format and constants.
//!
//! A container is read from its end, so arbitrary bytes may precede it:
//!
//! ```text
//! [disguise][ciphertext n][n: u32 BE][iv 16][tag 64][salt 16, password only][version 3]
//! ```
//!
//! The salt is present only for password-sealed containers; which trailer to expect
//! is decided by the kind of secret the caller supplies.

use crate::crypto::{IV_LEN, SALT_LEN, TAG_LEN};
use crate::layout::{Anchor, Field, Layout, pack, unpack};
use crate::types::{CloakError, FormatVersion, KeyKind};

pub const CURRENT_VERSION: FormatVersion = FormatVersion::new(1, 0, 0);
pub const SUPPORTED_VERSIONS: &[FormatVersion] = &[CURRENT_VERSION];

pub const VERSION_LEN: usize = 3;
/// Width of the big-endian ciphertext length.
pub const LENGTH_PREFIX_LEN: usize = 4;
/// Longest ciphertext the length prefix can describe.
pub(crate) const MAX_CIPHERTEXT_LEN: usize = u32::MAX as usize;

const SALTED: Layout<5> = Layout::new([
    Field::Prefixed(LENGTH_PREFIX_LEN),
    Field::Fixed(IV_LEN),
    Field::Fixed(TAG_LEN),
    Field::Fixed(SALT_LEN),
    Field::Fixed(VERSION_LEN),
]);

const UNSALTED: Layout<4> = Layout::new([
    Field::Prefixed(LENGTH_PREFIX_LEN),
    Field::Fixed(IV_LEN),
    Field::Fixed(TAG_LEN),
    Field::Fixed(VERSION_LEN),
]);

/// Trailer size of a password-sealed container.
pub const MAX_TRAILER_LEN: usize = SALTED.header_len();
/// Trailer size of a raw-key container.
pub const MIN_TRAILER_LEN: usize = UNSALTED.header_len();

/// A parsed or to-be-built container. Byte regions borrow from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container<'a> {
    /// Leading bytes of an unrelated file; never interpreted.
    pub disguise: &'a [u8],
    pub ciphertext: &'a [u8],
    pub iv: [u8; IV_LEN],
    pub tag: [u8; TAG_LEN],
    /// Present iff the container was sealed with a password.
    pub salt: Option<[u8; SALT_LEN]>,
    pub version: FormatVersion,
}

impl Container<'_> {
    pub fn key_kind(&self) -> KeyKind {
        match self.salt {
            Some(_) => KeyKind::Password,
            None => KeyKind::RawKey,
        }
    }
}

/// Serialize a container, disguise first.
///
/// # Errors
///
/// `CloakError::Malformed` if the ciphertext does not fit the 4-byte length field.
pub fn build_container(container: &Container<'_>) -> Result<Vec<u8>, CloakError> {
    let version = container.version.to_bytes();
    match &container.salt {
        Some(salt) => pack(
            &SALTED,
            [
                container.ciphertext,
                container.iv.as_slice(),
                container.tag.as_slice(),
                salt.as_slice(),
                version.as_slice(),
            ],
            container.disguise,
            Anchor::End,
        ),
        None => pack(
            &UNSALTED,
            [
                container.ciphertext,
                container.iv.as_slice(),
                container.tag.as_slice(),
                version.as_slice(),
            ],
            container.disguise,
            Anchor::End,
        ),
    }
}

/// Read the format version from the last bytes of `bytes` without parsing the rest.
pub fn read_version(bytes: &[u8]) -> Result<FormatVersion, CloakError> {
    let start = bytes
        .len()
        .checked_sub(VERSION_LEN)
        .ok_or(CloakError::Malformed("file is too short"))?;
    Ok(FormatVersion::from_bytes(fixed(&bytes[start..])?))
}

fn fixed<const L: usize>(bytes: &[u8]) -> Result<[u8; L], CloakError> {
    bytes
        .try_into()
        .map_err(|_| CloakError::Malformed("field has the wrong width"))
}

/// Parse a container sealed with a secret of the given kind.
///
/// The container does not record whether it carries a salt, so the trailer shape
/// comes from `kind`: [`KeyKind::Password`] expects the salted trailer and
/// [`KeyKind::RawKey`] the unsalted one. Parsing with the wrong kind misreads the
/// fields and fails later, at authentication or as `Malformed`.
///
/// # Errors
///
/// - `CloakError::Malformed` if `bytes` is shorter than the trailer or the stored
///   ciphertext length runs past the start of the buffer
/// - `CloakError::UnsupportedVersion` for versions this build cannot read
pub fn parse_container(bytes: &[u8], kind: KeyKind) -> Result<Container<'_>, CloakError> {
    let trailer_len = match kind {
        KeyKind::Password => MAX_TRAILER_LEN,
        KeyKind::RawKey => MIN_TRAILER_LEN,
    };
    if bytes.len() < trailer_len {
        return Err(CloakError::Malformed("file is too short"));
    }

    let version = read_version(bytes)?;
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(CloakError::UnsupportedVersion(version));
    }

    match kind {
        KeyKind::Password => {
            let parts = unpack(&SALTED, bytes, Anchor::End)?;
            let [ciphertext, iv, tag, salt, _] = parts.fields;
            Ok(Container {
                disguise: parts.remainder,
                ciphertext,
                iv: fixed(iv)?,
                tag: fixed(tag)?,
                salt: Some(fixed(salt)?),
                version,
            })
        }
        KeyKind::RawKey => {
            let parts = unpack(&UNSALTED, bytes, Anchor::End)?;
            let [ciphertext, iv, tag, _] = parts.fields;
            Ok(Container {
                disguise: parts.remainder,
                ciphertext,
                iv: fixed(iv)?,
                tag: fixed(tag)?,
                salt: None,
                version,
            })
        }
    }
}
