//! Variant-shape records: token security attributes and user/device claims.
//!
//! Both share one header (`u16 Version`, `u16 Reserved`, `u32 AttributeCount`,
//! `ptr Attributes`) and differ in how names and string values are stored.

use super::reader::{PTR, RecordReader, UNICODE_STRING_SIZE, align_up};
use crate::{AttributeEntry, AttributeFlags, DecodeError, Entry, Sid, Value, ValueKind};

/// The only attribute information version.
const VERSION_V1: u16 = 1;
const HEADER_SIZE: usize = align_up(8, PTR) + PTR;
/// `{ ptr Value, u32 ValueLength }` stride.
const OCTET_STRING_SIZE: usize = align_up(PTR + 4, PTR);

/// How one attribute record is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AttributeLayout {
    /// `TOKEN_SECURITY_ATTRIBUTE_V1`: counted names and strings.
    Token,
    /// `CLAIM_SECURITY_ATTRIBUTE_V1`: NUL-terminated names and strings.
    Claim,
}

impl AttributeLayout {
    /// Size of the name field.
    const fn name_size(self) -> usize {
        match self {
            Self::Token => UNICODE_STRING_SIZE,
            Self::Claim => PTR,
        }
    }

    /// Offset of the values pointer.
    const fn values_offset(self) -> usize {
        align_up(self.name_size() + 12, PTR)
    }

    /// Size of one attribute record.
    const fn record_size(self) -> usize {
        self.values_offset() + PTR
    }

    /// Stride of one string value.
    const fn string_size(self) -> usize {
        match self {
            Self::Token => UNICODE_STRING_SIZE,
            Self::Claim => PTR,
        }
    }

    /// Stride of one `{ u64 Version, name }` value.
    const fn fqbn_size(self) -> usize {
        align_up(8 + self.string_size(), 8)
    }

    fn string(self, reader: &RecordReader<'_>, offset: usize) -> Result<String, DecodeError> {
        match self {
            Self::Token => reader.unicode_string(offset),
            Self::Claim => reader.terminated_string(reader.pointer(offset)?),
        }
    }
}

pub(super) fn attributes(
    reader: &RecordReader<'_>,
    layout: AttributeLayout,
) -> Result<Vec<Entry>, DecodeError> {
    reader.header(HEADER_SIZE)?;
    let version = reader.u16(0)?;
    if version != VERSION_V1 {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    let count = reader.count(4)?;
    if count == 0 {
        return Ok(Vec::new());
    }
    let first = reader.target(
        reader.pointer(align_up(8, PTR))?,
        count.saturating_mul(layout.record_size()),
    )?;
    (0..count)
        .map(|i| attribute(reader, layout, first + i * layout.record_size()))
        .collect()
}

fn attribute(
    reader: &RecordReader<'_>,
    layout: AttributeLayout,
    offset: usize,
) -> Result<Entry, DecodeError> {
    let name = layout.string(reader, offset)?;
    let fields = offset + layout.name_size();
    let raw_kind = reader.u16(fields)?;
    let flags = AttributeFlags::from_bits_retain(reader.u32(fields + 4)?);
    let value_count = reader.count(fields + 8)?;
    let kind =
        ValueKind::try_from(raw_kind).map_err(|_| DecodeError::UnknownValueKind(raw_kind))?;
    let values = if value_count == 0 {
        Vec::new()
    } else {
        let pointer = reader.pointer(offset + layout.values_offset())?;
        values(reader, layout, kind, pointer, value_count)?
    };
    Ok(Entry::Attribute(AttributeEntry {
        name,
        kind,
        flags,
        values,
    }))
}

fn values(
    reader: &RecordReader<'_>,
    layout: AttributeLayout,
    kind: ValueKind,
    pointer: usize,
    count: usize,
) -> Result<Vec<Value>, DecodeError> {
    let stride = match kind {
        ValueKind::Invalid => return Err(DecodeError::UnknownValueKind(kind.into())),
        ValueKind::Int64 | ValueKind::UInt64 | ValueKind::Boolean => size_of::<u64>(),
        ValueKind::String => layout.string_size(),
        ValueKind::Fqbn => layout.fqbn_size(),
        ValueKind::Sid | ValueKind::OctetString => OCTET_STRING_SIZE,
    };
    let first = reader.target(pointer, count.saturating_mul(stride))?;
    (0..count)
        .map(|i| {
            let offset = first + i * stride;
            Ok(match kind {
                ValueKind::Int64 => Value::Int64(reader.i64(offset)?),
                ValueKind::UInt64 => Value::UInt64(reader.u64(offset)?),
                ValueKind::Boolean => Value::Boolean(reader.u64(offset)? != 0),
                ValueKind::String => Value::Text(layout.string(reader, offset)?),
                ValueKind::Fqbn => Value::VersionedName {
                    version: reader.u64(offset)?,
                    name: layout.string(reader, offset + 8)?,
                },
                ValueKind::Sid => {
                    let (value, len) = octet_string(reader, offset)?;
                    let bytes = reader.octets(value, len)?;
                    // The octet string may be longer than the SID it carries.
                    Sid::read_prefix(bytes).map_or_else(
                        |_| Value::MalformedPrincipal(bytes.to_vec()),
                        |(sid, _)| Value::Principal(sid),
                    )
                }
                ValueKind::OctetString => {
                    let (value, len) = octet_string(reader, offset)?;
                    Value::OpaqueBytes(reader.octets(value, len)?.to_vec())
                }
                ValueKind::Invalid => return Err(DecodeError::UnknownValueKind(kind.into())),
            })
        })
        .collect()
}

fn octet_string(reader: &RecordReader<'_>, offset: usize) -> Result<(usize, usize), DecodeError> {
    Ok((reader.pointer(offset)?, reader.count(offset + PTR)?))
}
