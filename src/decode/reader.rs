use widestring::U16Str;

use crate::sid::SID_HEAD_SIZE;
use crate::{DecodeError, RawRecordBuffer, Sid};

/// Pointer width of the records the kernel writes for this process.
pub(crate) const PTR: usize = size_of::<usize>();

/// Size of a `UNICODE_STRING`.
pub(crate) const UNICODE_STRING_SIZE: usize = align_up(4, PTR) + PTR;

/// Rounds `value` up to a multiple of `align` (a power of two).
pub(crate) const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

fn utf16_units(bytes: &[u8]) -> impl Iterator<Item = u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
}

/// Bounds-checked reads over a record buffer.
///
/// Pointers found in the records are absolute; they are turned into offsets
/// relative to the buffer base before any access.
#[derive(Clone, Copy)]
pub(crate) struct RecordReader<'a> {
    bytes: &'a [u8],
    base: usize,
}

impl<'a> RecordReader<'a> {
    pub(crate) fn new(buffer: &'a RawRecordBuffer) -> Self {
        Self {
            bytes: buffer.as_bytes(),
            base: buffer.base_address(),
        }
    }

    /// Checks that a header of `len` bytes is present.
    pub(crate) const fn header(&self, len: usize) -> Result<(), DecodeError> {
        if self.bytes.len() < len {
            return Err(DecodeError::Truncated {
                declared: len,
                available: self.bytes.len(),
            });
        }
        Ok(())
    }

    /// Checks that `count` records of `stride` bytes fit after `offset`.
    pub(crate) fn records(
        &self,
        offset: usize,
        count: usize,
        stride: usize,
    ) -> Result<(), DecodeError> {
        let declared = count.saturating_mul(stride);
        let available = self.bytes.len().saturating_sub(offset);
        if declared > available {
            return Err(DecodeError::Truncated {
                declared,
                available,
            });
        }
        Ok(())
    }

    pub(crate) fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], DecodeError> {
        offset
            .checked_add(len)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or(DecodeError::OutOfBounds { offset, len })
    }

    fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N], DecodeError> {
        let mut out = [0; N];
        out.copy_from_slice(self.slice(offset, N)?);
        Ok(out)
    }

    pub(crate) fn u16(&self, offset: usize) -> Result<u16, DecodeError> {
        self.array(offset).map(u16::from_le_bytes)
    }

    pub(crate) fn u32(&self, offset: usize) -> Result<u32, DecodeError> {
        self.array(offset).map(u32::from_le_bytes)
    }

    pub(crate) fn i32(&self, offset: usize) -> Result<i32, DecodeError> {
        self.array(offset).map(i32::from_le_bytes)
    }

    pub(crate) fn u64(&self, offset: usize) -> Result<u64, DecodeError> {
        self.array(offset).map(u64::from_le_bytes)
    }

    pub(crate) fn i64(&self, offset: usize) -> Result<i64, DecodeError> {
        self.array(offset).map(i64::from_le_bytes)
    }

    pub(crate) fn pointer(&self, offset: usize) -> Result<usize, DecodeError> {
        self.array(offset).map(usize::from_le_bytes)
    }

    /// A `u32` count widened for arithmetic.
    pub(crate) fn count(&self, offset: usize) -> Result<usize, DecodeError> {
        self.u32(offset)
            .map(|count| usize::try_from(count).unwrap_or(usize::MAX))
    }

    /// Offset of `len` bytes referenced by `pointer`.
    pub(crate) fn target(&self, pointer: usize, len: usize) -> Result<usize, DecodeError> {
        let offset = pointer.wrapping_sub(self.base);
        if pointer < self.base || pointer == 0 {
            return Err(DecodeError::OutOfBounds {
                offset: pointer.saturating_sub(self.base),
                len,
            });
        }
        self.slice(offset, len)?;
        Ok(offset)
    }

    /// Bytes referenced by `pointer`.
    pub(crate) fn referenced(&self, pointer: usize, len: usize) -> Result<&'a [u8], DecodeError> {
        let offset = self.target(pointer, len)?;
        self.slice(offset, len)
    }

    /// Counted UTF-16 string (`byte_len` bytes). An empty string may be null.
    pub(crate) fn counted_string(
        &self,
        pointer: usize,
        byte_len: usize,
    ) -> Result<String, DecodeError> {
        if byte_len == 0 {
            return Ok(String::new());
        }
        let bytes = self.referenced(pointer, byte_len)?;
        let units: Vec<u16> = utf16_units(bytes).collect();
        Ok(U16Str::from_slice(&units).to_string_lossy())
    }

    /// `UNICODE_STRING` stored at `offset`.
    pub(crate) fn unicode_string(&self, offset: usize) -> Result<String, DecodeError> {
        let byte_len = usize::from(self.u16(offset)?);
        let pointer = self.pointer(offset + align_up(4, PTR))?;
        self.counted_string(pointer, byte_len)
    }

    /// NUL-terminated UTF-16 string referenced by `pointer`.
    pub(crate) fn terminated_string(&self, pointer: usize) -> Result<String, DecodeError> {
        let start = self.target(pointer, 2)?;
        let tail = self.bytes.get(start..).unwrap_or_default();
        let units: Vec<u16> = utf16_units(tail).take_while(|&unit| unit != 0).collect();
        if (units.len() + 1) * 2 > tail.len() {
            return Err(DecodeError::OutOfBounds {
                offset: start,
                len: (units.len() + 1) * 2,
            });
        }
        Ok(U16Str::from_slice(&units).to_string_lossy())
    }

    /// Self-describing SID referenced by `pointer`.
    pub(crate) fn sid(&self, pointer: usize) -> Result<Sid, DecodeError> {
        let offset = self.target(pointer, SID_HEAD_SIZE)?;
        let [revision, count] = self.array(offset)?;
        if revision != Sid::REVISION || count == 0 || count > parsing::MAX_SUBAUTHORITY_COUNT {
            return Err(DecodeError::MalformedSid { offset });
        }
        let bytes = self.slice(offset, Sid::size_for_count(count))?;
        Sid::from_bytes(bytes).map_err(|_| DecodeError::MalformedSid { offset })
    }

    /// Octet string of `len` bytes referenced by `pointer`. An empty one may be null.
    pub(crate) fn octets(&self, pointer: usize, len: usize) -> Result<&'a [u8], DecodeError> {
        if len == 0 {
            return Ok(&[]);
        }
        self.referenced(pointer, len)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Unwrap is not an issue in test")]
mod tests {
    use super::*;

    fn buffer_with(bytes: &[u8]) -> RawRecordBuffer {
        RawRecordBuffer::from_bytes(bytes)
    }

    #[test]
    fn alignment() {
        assert_eq!(align_up(4, 8), 8);
        assert_eq!(align_up(12, 4), 12);
        assert_eq!(align_up(0, 8), 0);
        assert_eq!(UNICODE_STRING_SIZE, 2 * PTR);
    }

    #[test]
    fn reads_are_bounds_checked() {
        let buffer = buffer_with(&[1, 0, 0, 0, 2, 0]);
        let reader = RecordReader::new(&buffer);
        assert_eq!(reader.u32(0), Ok(1));
        assert_eq!(reader.u16(4), Ok(2));
        assert_eq!(
            reader.u32(4),
            Err(DecodeError::OutOfBounds { offset: 4, len: 4 })
        );
        assert_eq!(
            reader.slice(usize::MAX, 2),
            Err(DecodeError::OutOfBounds {
                offset: usize::MAX,
                len: 2
            })
        );
    }

    #[test]
    fn record_counts_are_checked_against_length() {
        let buffer = buffer_with(&[0; 16]);
        let reader = RecordReader::new(&buffer);
        assert!(reader.records(4, 1, 12).is_ok());
        assert_eq!(
            reader.records(4, 2, 12),
            Err(DecodeError::Truncated {
                declared: 24,
                available: 12
            })
        );
        assert_eq!(
            reader.records(4, usize::MAX, 12),
            Err(DecodeError::Truncated {
                declared: usize::MAX,
                available: 12
            })
        );
    }

    #[test]
    fn pointers_are_translated_and_checked() {
        let buffer = buffer_with(&[b'a', 0, b'b', 0, 0, 0]);
        let reader = RecordReader::new(&buffer);
        let base = buffer.base_address();
        assert_eq!(reader.counted_string(base, 4).unwrap(), "ab");
        assert_eq!(reader.terminated_string(base).unwrap(), "ab");
        assert_eq!(reader.counted_string(0, 0).unwrap(), "");
        assert_eq!(
            reader.counted_string(0, 2),
            Err(DecodeError::OutOfBounds { offset: 0, len: 2 })
        );
        assert!(reader.counted_string(base + 4, 4).is_err());
    }

    #[test]
    fn unterminated_string_is_out_of_bounds() {
        let buffer = buffer_with(&[b'a', 0, b'b', 0]);
        let reader = RecordReader::new(&buffer);
        assert_eq!(
            reader.terminated_string(buffer.base_address()),
            Err(DecodeError::OutOfBounds { offset: 0, len: 6 })
        );
    }

    #[test]
    fn sids_are_validated() {
        let sid: Sid = "S-1-5-32-544".parse().unwrap();
        let mut bytes = sid.to_bytes();
        let buffer = buffer_with(&bytes);
        let reader = RecordReader::new(&buffer);
        let base = buffer.base_address();
        assert_eq!(reader.sid(base).unwrap(), sid);
        assert_eq!(reader.octets(base, bytes.len()).unwrap(), bytes.as_slice());
        assert_eq!(reader.octets(0, 0).unwrap(), &[] as &[u8]);
        assert_eq!(
            reader.octets(base, bytes.len() + 1),
            Err(DecodeError::OutOfBounds {
                offset: 0,
                len: bytes.len() + 1
            })
        );

        bytes[0] = 2;
        let buffer = buffer_with(&bytes);
        let reader = RecordReader::new(&buffer);
        assert_eq!(
            reader.sid(buffer.base_address()),
            Err(DecodeError::MalformedSid { offset: 0 })
        );
    }

    #[test]
    fn sid_body_past_the_end_is_out_of_bounds() {
        let buffer = buffer_with(&[1, 3, 0, 0, 0, 0, 0, 5, 32, 0, 0, 0]);
        let reader = RecordReader::new(&buffer);
        assert_eq!(
            reader.sid(buffer.base_address()),
            Err(DecodeError::OutOfBounds { offset: 0, len: 20 })
        );
    }
}
