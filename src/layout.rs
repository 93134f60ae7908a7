//! Declarative binary field layouts.
//!
//! A [`Layout`] is an ordered list of fields. [`Field::Fixed`] fields live in the
//! header region with their exact width; [`Field::Prefixed`] fields put a big-endian
//! length into the header region and their bytes into the variable region. The
//! header can be anchored at the start of the buffer or at its end, and any bytes
//! not described by the layout are carried as an opaque remainder:
//!
//! - [`Anchor::Start`]: `[header][variable][opaque]`
//! - [`Anchor::End`]: `[opaque][variable][header]`
//!
//! Tail anchoring lets a reader find every field by walking back from the end of
//! a file, no matter what precedes it.

use byteorder::{BigEndian, ByteOrder};

use crate::types::CloakError;

/// Largest supported length prefix, in bytes.
pub const MAX_PREFIX_WIDTH: usize = 8;

/// A single field of a [`Layout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Exactly this many bytes, stored in the header region.
    Fixed(usize),
    /// A value of any length whose size is stored as a big-endian integer of this
    /// many bytes (1..=8).
    Prefixed(usize),
}

impl Field {
    /// Bytes this field takes up in the header region.
    pub const fn header_width(self) -> usize {
        match self {
            Field::Fixed(width) | Field::Prefixed(width) => width,
        }
    }
}

/// Which end of the buffer the header region is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    End,
}

/// An ordered set of `N` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout<const N: usize> {
    fields: [Field; N],
}

impl<const N: usize> Layout<N> {
    pub const fn new(fields: [Field; N]) -> Self {
        Self { fields }
    }

    pub const fn fields(&self) -> &[Field; N] {
        &self.fields
    }

    /// Size of the header region (fixed fields plus length prefixes).
    pub const fn header_len(&self) -> usize {
        let mut total = 0;
        let mut i = 0;
        while i < N {
            total += self.fields[i].header_width();
            i += 1;
        }
        total
    }
}

/// Fields recovered by [`unpack`], borrowed from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unpacked<'a, const N: usize> {
    /// One slice per layout field, in layout order.
    pub fields: [&'a [u8]; N],
    /// Bytes not described by the layout.
    pub remainder: &'a [u8],
}

fn check_prefix_width(width: usize) -> Result<(), CloakError> {
    if width == 0 || width > MAX_PREFIX_WIDTH {
        return Err(CloakError::Malformed("invalid length prefix width"));
    }
    Ok(())
}

/// Serialize `values` according to `layout`, with `opaque` on the side opposite the header.
///
/// # Errors
///
/// `CloakError::Malformed` if a fixed value has the wrong width, a value is too long
/// for its length prefix, or a prefix width is outside 1..=8.
pub fn pack<const N: usize>(
    layout: &Layout<N>,
    values: [&[u8]; N],
    opaque: &[u8],
    anchor: Anchor,
) -> Result<Vec<u8>, CloakError> {
    let mut header = Vec::with_capacity(layout.header_len());
    let mut variable_len = 0usize;

    for (field, value) in layout.fields.iter().zip(values.iter()) {
        match *field {
            Field::Fixed(width) => {
                if value.len() != width {
                    return Err(CloakError::Malformed("fixed field has the wrong width"));
                }
                header.extend_from_slice(value);
            }
            Field::Prefixed(width) => {
                check_prefix_width(width)?;
                let len = u64::try_from(value.len())
                    .map_err(|_| CloakError::Malformed("field too long"))?;
                // write_uint panics on values that do not fit, so check first
                if width < MAX_PREFIX_WIDTH && len >> (8 * width) != 0 {
                    return Err(CloakError::Malformed("field too long for its length prefix"));
                }
                let mut prefix = [0u8; MAX_PREFIX_WIDTH];
                BigEndian::write_uint(&mut prefix[..width], len, width);
                header.extend_from_slice(&prefix[..width]);
                variable_len = variable_len
                    .checked_add(value.len())
                    .ok_or(CloakError::Malformed("fields too long"))?;
            }
        }
    }

    let total = header
        .len()
        .checked_add(variable_len)
        .and_then(|n| n.checked_add(opaque.len()))
        .ok_or(CloakError::Malformed("fields too long"))?;
    let mut out = Vec::with_capacity(total);

    if anchor == Anchor::Start {
        out.extend_from_slice(&header);
    } else {
        out.extend_from_slice(opaque);
    }
    for (field, value) in layout.fields.iter().zip(values.iter()) {
        if let Field::Prefixed(_) = field {
            out.extend_from_slice(value);
        }
    }
    if anchor == Anchor::Start {
        out.extend_from_slice(opaque);
    } else {
        out.extend_from_slice(&header);
    }
    Ok(out)
}

/// Split `bytes` into the fields described by `layout`.
///
/// # Errors
///
/// `CloakError::Malformed` if the buffer is shorter than the header region, a prefix
/// width is outside 1..=8, or the stored lengths run past the end of the buffer.
pub fn unpack<'a, const N: usize>(
    layout: &Layout<N>,
    bytes: &'a [u8],
    anchor: Anchor,
) -> Result<Unpacked<'a, N>, CloakError> {
    for field in &layout.fields {
        if let Field::Prefixed(width) = *field {
            check_prefix_width(width)?;
        }
    }

    let header_len = layout.header_len();
    if bytes.len() < header_len {
        return Err(CloakError::Malformed("buffer shorter than its field header"));
    }
    let (header, rest) = match anchor {
        Anchor::Start => bytes.split_at(header_len),
        Anchor::End => {
            let (rest, header) = bytes.split_at(bytes.len() - header_len);
            (header, rest)
        }
    };

    let empty: &'a [u8] = &[];
    let mut fields = [empty; N];
    let mut lengths = [0usize; N];
    let mut variable_len = 0usize;
    let mut cursor = 0;

    for (i, field) in layout.fields.iter().enumerate() {
        let width = field.header_width();
        let raw = &header[cursor..cursor + width];
        cursor += width;
        match *field {
            Field::Fixed(_) => fields[i] = raw,
            Field::Prefixed(_) => {
                let len = usize::try_from(BigEndian::read_uint(raw, width))
                    .map_err(|_| CloakError::Malformed("field length overruns buffer"))?;
                lengths[i] = len;
                variable_len = variable_len
                    .checked_add(len)
                    .ok_or(CloakError::Malformed("field length overruns buffer"))?;
            }
        }
    }

    if variable_len > rest.len() {
        return Err(CloakError::Malformed("field length overruns buffer"));
    }
    let (variable, remainder) = match anchor {
        Anchor::Start => rest.split_at(variable_len),
        Anchor::End => {
            let (opaque, variable) = rest.split_at(rest.len() - variable_len);
            (variable, opaque)
        }
    };

    let mut offset = 0;
    for (i, field) in layout.fields.iter().enumerate() {
        if let Field::Prefixed(_) = field {
            fields[i] = &variable[offset..offset + lengths[i]];
            offset += lengths[i];
        }
    }

    Ok(Unpacked { fields, remainder })
}
