//! Interpretation of raw token records into the owned [`Entry`] model.
//!
//! The records are the in-memory structures the kernel writes: fixed-stride
//! arrays for users, groups and privileges, and tagged attribute records for
//! security attributes and claims. Every read is bounds checked and every
//! embedded pointer must land inside the buffer; nothing decoded borrows from
//! it.

mod attributes;
mod groups;
pub(crate) mod reader;

use tracing::trace;

use self::attributes::AttributeLayout;
use self::reader::RecordReader;
use crate::{DecodeError, Entry, QueryClass, RawRecordBuffer, RecordShape};

/// Decodes the record of `class` held in `buffer`.
///
/// Restricted SIDs come back as [`Entry::Group`] with `restricted` set.
///
/// # Errors
/// - [`DecodeError::Truncated`] when a declared count does not fit the buffer.
/// - [`DecodeError::OutOfBounds`] when a pointer or length leaves the buffer.
/// - [`DecodeError::UnknownValueKind`] for an attribute tag outside the known kinds.
/// - [`DecodeError::UnsupportedVersion`] for an attribute header other than version 1.
/// - [`DecodeError::MalformedSid`] when a user or group SID is not well formed.
///
/// An attribute SID value that does not start with a valid SID decodes as
/// [`Value::MalformedPrincipal`](crate::Value::MalformedPrincipal).
#[expect(
    clippy::needless_pass_by_value,
    reason = "the buffer is consumed by decoding"
)]
#[inline]
pub fn decode(class: QueryClass, buffer: RawRecordBuffer) -> Result<Vec<Entry>, DecodeError> {
    let reader = RecordReader::new(&buffer);
    let entries = match class.shape() {
        RecordShape::User => groups::user(&reader)?,
        RecordShape::Groups => groups::groups(&reader, class == QueryClass::RestrictedSids)?,
        RecordShape::Privileges => groups::privileges(&reader)?,
        RecordShape::SecurityAttributes => {
            attributes::attributes(&reader, AttributeLayout::Token)?
        }
        RecordShape::ClaimAttributes => attributes::attributes(&reader, AttributeLayout::Claim)?,
    };
    trace!(?class, bytes = buffer.len(), entries = entries.len(), "decoded record");
    Ok(entries)
}
