use thiserror::Error;

// Win32 codes the classification cares about. Kept local so the mapping is
// usable (and testable) off Windows.
pub(crate) const ERROR_INVALID_FUNCTION: u32 = 1;
pub(crate) const ERROR_FILE_NOT_FOUND: u32 = 2;
pub(crate) const ERROR_ACCESS_DENIED: u32 = 5;
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) const ERROR_BAD_LENGTH: u32 = 24;
pub(crate) const ERROR_NOT_SUPPORTED: u32 = 50;
pub(crate) const ERROR_INVALID_PARAMETER: u32 = 87;
pub(crate) const ERROR_INSUFFICIENT_BUFFER: u32 = 122;
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) const ERROR_MORE_DATA: u32 = 234;
pub(crate) const ERROR_NO_TOKEN: u32 = 1008;
pub(crate) const ERROR_NOT_FOUND: u32 = 1168;

/// Failure of the growable query protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum QueryError {
    /// The subject or the requested information does not exist.
    #[error("information not found")]
    NotFound,
    /// The caller may not query this subject.
    #[error("access denied")]
    AccessDenied,
    /// The information class is not supported by this subject or OS version.
    #[error("information class not supported")]
    Unsupported,
    /// The buffer kept growing until the attempt budget or the size cap ran out.
    #[error("gave up after {attempts} attempts (last buffer size {last_size} bytes)")]
    ExhaustedRetries {
        /// Raw calls issued.
        attempts: u32,
        /// Size of the last buffer offered (or the refused required size).
        last_size: usize,
    },
    /// Any other OS error code.
    #[error("query failed (error {0})")]
    Other(u32),
}

impl From<u32> for QueryError {
    #[inline]
    fn from(code: u32) -> Self {
        match code {
            ERROR_FILE_NOT_FOUND | ERROR_NOT_FOUND | ERROR_NO_TOKEN => Self::NotFound,
            ERROR_ACCESS_DENIED => Self::AccessDenied,
            ERROR_INVALID_FUNCTION | ERROR_NOT_SUPPORTED | ERROR_INVALID_PARAMETER => {
                Self::Unsupported
            }
            other => Self::Other(other),
        }
    }
}

impl From<QueryError> for u32 {
    #[inline]
    fn from(error: QueryError) -> Self {
        match error {
            QueryError::NotFound => ERROR_NOT_FOUND,
            QueryError::AccessDenied => ERROR_ACCESS_DENIED,
            QueryError::Unsupported => ERROR_NOT_SUPPORTED,
            QueryError::ExhaustedRetries { .. } => ERROR_INSUFFICIENT_BUFFER,
            QueryError::Other(code) => code,
        }
    }
}

/// Failure to interpret a returned record buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum DecodeError {
    /// The declared record count does not fit in the buffer.
    #[error("declared {declared} bytes of records but only {available} are available")]
    Truncated {
        /// Bytes the header claims.
        declared: usize,
        /// Bytes actually present.
        available: usize,
    },
    /// A reference points outside the buffer.
    #[error("reference to {len} bytes at offset {offset:#x} is out of bounds")]
    OutOfBounds {
        /// Offset of the reference relative to the buffer start (saturated).
        offset: usize,
        /// Length that was to be read.
        len: usize,
    },
    /// The value-kind tag is not one this decoder knows.
    #[error("unknown value kind {0:#x}")]
    UnknownValueKind(u16),
    /// The attribute information header has an unsupported version.
    #[error("unsupported attribute information version {0}")]
    UnsupportedVersion(u16),
    /// A user or group SID is not a valid SID.
    #[error("malformed SID at offset {offset:#x}")]
    MalformedSid {
        /// Offset of the SID relative to the buffer start.
        offset: usize,
    },
}

/// Failure to open a process or thread token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum OpenError {
    /// No process/thread with that id, or the thread has no token.
    #[error("subject not found")]
    NotFound,
    /// The caller may not open the subject.
    #[error("access denied")]
    AccessDenied,
    /// Any other OS error code.
    #[error("open failed (error {0})")]
    Other(u32),
}

impl From<u32> for OpenError {
    #[inline]
    fn from(code: u32) -> Self {
        match code {
            ERROR_INVALID_PARAMETER | ERROR_FILE_NOT_FOUND | ERROR_NO_TOKEN => Self::NotFound,
            ERROR_ACCESS_DENIED => Self::AccessDenied,
            other => Self::Other(other),
        }
    }
}

impl From<OpenError> for u32 {
    #[inline]
    fn from(error: OpenError) -> Self {
        match error {
            OpenError::NotFound => ERROR_INVALID_PARAMETER,
            OpenError::AccessDenied => ERROR_ACCESS_DENIED,
            OpenError::Other(code) => code,
        }
    }
}

#[cfg(all(windows, feature = "windows_result"))]
mod windows_result_impls {
    use super::{OpenError, QueryError};

    macro_rules! into_windows_result {
        ($($error:ty),*) => {$(
            impl From<$error> for windows_result::HRESULT {
                #[inline]
                fn from(value: $error) -> Self {
                    Self::from_win32(value.into())
                }
            }

            impl From<$error> for windows_result::Error {
                #[inline]
                fn from(value: $error) -> Self {
                    let hresult: windows_result::HRESULT = value.into();
                    Self::from_hresult(hresult)
                }
            }
        )*};
    }

    into_windows_result!(QueryError, OpenError);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_codes_are_classified() {
        assert_eq!(QueryError::from(ERROR_NO_TOKEN), QueryError::NotFound);
        assert_eq!(QueryError::from(ERROR_FILE_NOT_FOUND), QueryError::NotFound);
        assert_eq!(QueryError::from(ERROR_ACCESS_DENIED), QueryError::AccessDenied);
        assert_eq!(QueryError::from(ERROR_INVALID_PARAMETER), QueryError::Unsupported);
        assert_eq!(QueryError::from(31), QueryError::Other(31));
        assert_eq!(u32::from(QueryError::Other(31)), 31);
    }

    #[test]
    fn open_codes_are_classified() {
        assert_eq!(OpenError::from(ERROR_INVALID_PARAMETER), OpenError::NotFound);
        assert_eq!(OpenError::from(ERROR_ACCESS_DENIED), OpenError::AccessDenied);
        assert_eq!(u32::from(OpenError::from(6)), 6);
    }

    #[test]
    fn messages_carry_details() {
        let error = QueryError::ExhaustedRetries {
            attempts: 10,
            last_size: 4096,
        };
        assert_eq!(
            error.to_string(),
            "gave up after 10 attempts (last buffer size 4096 bytes)"
        );
        assert_eq!(
            DecodeError::UnknownValueKind(0x11).to_string(),
            "unknown value kind 0x11"
        );
    }
}
