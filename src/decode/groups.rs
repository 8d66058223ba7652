//! Fixed-stride records: `TOKEN_USER`, `TOKEN_GROUPS` and `TOKEN_PRIVILEGES`.

use super::reader::{PTR, RecordReader, align_up};
use crate::{
    DecodeError, Entry, GroupAttributes, GroupEntry, Luid, PrivilegeAttributes, PrivilegeEntry,
};

/// `SID_AND_ATTRIBUTES` stride.
const SID_AND_ATTRIBUTES_SIZE: usize = align_up(PTR + 4, PTR);
/// Offset of the first group after the count.
const GROUPS_OFFSET: usize = align_up(4, PTR);
/// `LUID_AND_ATTRIBUTES` stride (4-byte packing).
const LUID_AND_ATTRIBUTES_SIZE: usize = 12;
/// Offset of the first privilege after the count.
const PRIVILEGES_OFFSET: usize = 4;

fn sid_and_attributes(
    reader: &RecordReader<'_>,
    offset: usize,
    restricted: bool,
) -> Result<Entry, DecodeError> {
    let sid = reader.sid(reader.pointer(offset)?)?;
    let attributes = GroupAttributes::from_bits_retain(reader.u32(offset + PTR)?);
    Ok(Entry::Group(GroupEntry {
        sid,
        attributes,
        restricted,
    }))
}

pub(super) fn user(reader: &RecordReader<'_>) -> Result<Vec<Entry>, DecodeError> {
    reader.header(SID_AND_ATTRIBUTES_SIZE)?;
    Ok(vec![sid_and_attributes(reader, 0, false)?])
}

pub(super) fn groups(
    reader: &RecordReader<'_>,
    restricted: bool,
) -> Result<Vec<Entry>, DecodeError> {
    reader.header(GROUPS_OFFSET)?;
    let count = reader.count(0)?;
    reader.records(GROUPS_OFFSET, count, SID_AND_ATTRIBUTES_SIZE)?;
    (0..count)
        .map(|i| {
            sid_and_attributes(
                reader,
                GROUPS_OFFSET + i * SID_AND_ATTRIBUTES_SIZE,
                restricted,
            )
        })
        .collect()
}

pub(super) fn privileges(reader: &RecordReader<'_>) -> Result<Vec<Entry>, DecodeError> {
    reader.header(PRIVILEGES_OFFSET)?;
    let count = reader.count(0)?;
    reader.records(PRIVILEGES_OFFSET, count, LUID_AND_ATTRIBUTES_SIZE)?;
    (0..count)
        .map(|i| {
            let offset = PRIVILEGES_OFFSET + i * LUID_AND_ATTRIBUTES_SIZE;
            Ok(Entry::Privilege(PrivilegeEntry {
                luid: Luid {
                    low_part: reader.u32(offset)?,
                    high_part: reader.i32(offset + 4)?,
                },
                attributes: PrivilegeAttributes::from_bits_retain(reader.u32(offset + 8)?),
            }))
        })
        .collect()
}
