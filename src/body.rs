//! Plaintext body: optional original name and extension in front of the payload.
//!
//! ```text
//! [name_len u16 BE][ext_len u16 BE][name][ext][payload]
//! ```

use crate::layout::{Anchor, Field, Layout, pack, unpack};
use crate::types::CloakError;

const BODY: Layout<2> = Layout::new([Field::Prefixed(2), Field::Prefixed(2)]);

/// Bytes the body header adds in front of the name and extension.
pub const BODY_HEADER_LEN: usize = BODY.header_len();

/// Longest name or extension the 2-byte prefixes can describe.
pub(crate) const MAX_FIELD_LEN: usize = u16::MAX as usize;

/// The decrypted body of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Body<'a> {
    /// Original file stem; only stored for disguised containers.
    pub name: Option<&'a str>,
    pub extension: Option<&'a str>,
    pub data: &'a [u8],
}

pub fn pack_body(body: &Body<'_>) -> Result<Vec<u8>, CloakError> {
    let name = body.name.unwrap_or_default();
    let extension = body.extension.unwrap_or_default();
    pack(
        &BODY,
        [name.as_bytes(), extension.as_bytes()],
        body.data,
        Anchor::Start,
    )
}

fn text(bytes: &[u8]) -> Result<Option<&str>, CloakError> {
    let s = std::str::from_utf8(bytes).map_err(|_| CloakError::Malformed("name is not UTF-8"))?;
    Ok((!s.is_empty()).then_some(s))
}

pub fn unpack_body(bytes: &[u8]) -> Result<Body<'_>, CloakError> {
    let parts = unpack(&BODY, bytes, Anchor::Start)?;
    let [name, extension] = parts.fields;
    Ok(Body {
        name: text(name)?,
        extension: text(extension)?,
        data: parts.remainder,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_comes_before_extension() {
        let body = Body {
            name: Some("report"),
            extension: Some("pdf"),
            data: b"%PDF",
        };
        let bytes = pack_body(&body).unwrap();
        assert_eq!(bytes, b"\x00\x06\x00\x03reportpdf%PDF");
        assert_eq!(unpack_body(&bytes).unwrap(), body);
    }

    #[test]
    fn missing_fields_are_empty_prefixes() {
        let body = Body {
            name: None,
            extension: Some("txt"),
            data: b"Hello World",
        };
        let bytes = pack_body(&body).unwrap();
        assert_eq!(&bytes[..4], &[0, 0, 0, 3]);
        assert_eq!(bytes.len(), BODY_HEADER_LEN + 3 + 11);
        assert_eq!(unpack_body(&bytes).unwrap(), body);

        let bare = Body {
            name: None,
            extension: None,
            data: b"x",
        };
        assert_eq!(unpack_body(&pack_body(&bare).unwrap()).unwrap(), bare);
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let bytes = [0, 2, 0, 0, 0xC3, 0x28, b'x'];
        assert!(matches!(unpack_body(&bytes), Err(CloakError::Malformed(_))));
    }

    #[test]
    fn truncated_body_is_malformed() {
        assert!(unpack_body(&[0, 9, 0, 0, b'a']).is_err());
        assert!(unpack_body(&[0]).is_err());
    }

    #[test]
    fn oversized_name_is_rejected() {
        let long = "n".repeat(u16::MAX as usize + 1);
        let body = Body {
            name: Some(&long),
            extension: None,
            data: b"x",
        };
        assert!(pack_body(&body).is_err());
    }
}
