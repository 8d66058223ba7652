/// Owned record buffer filled by one raw query.
///
/// The storage is 8-byte aligned and never reallocated after creation, so the
/// absolute pointers the kernel writes into it stay meaningful for as long as
/// the buffer lives, including after it is moved.
#[derive(Clone, PartialEq, Eq)]
pub struct RawRecordBuffer {
    words: Vec<u64>,
    len: usize,
}

impl core::fmt::Debug for RawRecordBuffer {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RawRecordBuffer")
            .field("len", &self.len)
            .field("base_address", &format_args!("{:#x}", self.base_address()))
            .finish()
    }
}

impl RawRecordBuffer {
    /// Zero-filled buffer of `len` bytes.
    #[inline]
    #[must_use]
    pub fn zeroed(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(size_of::<u64>())],
            len,
        }
    }

    /// Buffer holding a copy of `bytes`.
    ///
    /// Only useful for layouts without embedded pointers, since the copy lives
    /// at a different address.
    #[inline]
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buffer = Self::zeroed(bytes.len());
        buffer.as_mut_bytes().copy_from_slice(bytes);
        buffer
    }

    /// Length in bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// `true` for a zero-length buffer.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The buffer contents.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        let bytes: &[u8] = bytemuck::cast_slice(&self.words);
        bytes.get(..self.len).unwrap_or_default()
    }

    /// Mutable contents, for the raw query to write into.
    #[inline]
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut self.words);
        bytes.get_mut(..self.len).unwrap_or_default()
    }

    /// Address of the first byte, as the kernel sees it.
    #[inline]
    #[must_use]
    pub fn base_address(&self) -> usize {
        self.words.as_ptr().addr()
    }

    /// Shortens the visible length; never grows it.
    #[inline]
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_and_length() {
        let buffer = RawRecordBuffer::zeroed(13);
        assert_eq!(buffer.len(), 13);
        assert_eq!(buffer.as_bytes().len(), 13);
        assert_eq!(buffer.base_address() % 8, 0, "buffer must be 8-byte aligned");
    }

    #[test]
    fn truncate_only_shrinks() {
        let mut buffer = RawRecordBuffer::from_bytes(&[1, 2, 3, 4]);
        buffer.truncate(10);
        assert_eq!(buffer.as_bytes(), [1, 2, 3, 4]);
        buffer.truncate(2);
        assert_eq!(buffer.as_bytes(), [1, 2]);
    }

    #[test]
    fn address_survives_moves() {
        let buffer = RawRecordBuffer::zeroed(64);
        let address = buffer.base_address();
        let moved = Box::new(buffer);
        assert_eq!(moved.base_address(), address);
    }
}
