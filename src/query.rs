//! Size-unknown queries against token information classes.
//!
//! The kernel only reveals how large a record is by refusing a buffer that is
//! too small, and the record can grow between two calls. [`query`] runs the
//! probe, grow and retry loop on top of a [`RawQuery`] and hands out a
//! [`RawRecordBuffer`] only once a call has fully succeeded.

mod buffer;
mod class;

pub use buffer::RawRecordBuffer;
pub use class::{QueryClass, RecordShape};
use tracing::{debug, trace};

use crate::{QueryConfig, QueryError};

/// Smallest buffer tried when growing without a size hint.
const MIN_GROWTH_SIZE: usize = 0x80;

/// Outcome of one raw query call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawQueryResult {
    /// The record was written; `written` bytes are meaningful.
    Success {
        /// Bytes written by the call.
        written: usize,
    },
    /// The buffer was too small (or its length did not match the record).
    BufferTooSmall {
        /// Size the call asked for, when it reported one.
        required: Option<usize>,
    },
    /// Any other failure, as an OS error code.
    Error(u32),
}

/// One call of the OS query primitive against an open subject.
pub trait RawQuery {
    /// Fills `buffer` (its whole length is offered) with the record of `class`.
    fn raw_query(&self, class: QueryClass, buffer: &mut RawRecordBuffer) -> RawQueryResult;
}

impl<T: RawQuery + ?Sized> RawQuery for &T {
    #[inline]
    fn raw_query(&self, class: QueryClass, buffer: &mut RawRecordBuffer) -> RawQueryResult {
        (**self).raw_query(class, buffer)
    }
}

/// Queries `class` from `subject` with [`QueryConfig::DEFAULT`].
///
/// # Errors
/// See [`query_with`].
#[inline]
pub fn query<S: RawQuery + ?Sized>(
    class: QueryClass,
    subject: &S,
) -> Result<RawRecordBuffer, QueryError> {
    query_with(&QueryConfig::DEFAULT, class, subject)
}

/// Queries `class` from `subject`, growing the buffer as the subject asks.
///
/// The first call offers `config.initial_size` bytes. A "too small" answer is
/// retried with the reported size, or twice the previous size when none was
/// reported. The returned buffer is truncated to the written length.
///
/// # Errors
/// - [`QueryError::ExhaustedRetries`] when `config.max_attempts` calls all
///   came back too small, or the subject asks for more than `config.max_size`.
/// - The classified OS error of the first non-size-related failure.
#[inline]
pub fn query_with<S: RawQuery + ?Sized>(
    config: &QueryConfig,
    class: QueryClass,
    subject: &S,
) -> Result<RawRecordBuffer, QueryError> {
    let mut size = config.initial_size.min(config.max_size);
    let mut attempts = 0;
    loop {
        if attempts >= config.max_attempts {
            debug!(?class, attempts, size, "query attempts exhausted");
            return Err(QueryError::ExhaustedRetries {
                attempts,
                last_size: size,
            });
        }
        attempts += 1;
        let mut buffer = RawRecordBuffer::zeroed(size);
        match subject.raw_query(class, &mut buffer) {
            RawQueryResult::Success { written } => {
                buffer.truncate(written);
                trace!(?class, attempts, written, "query succeeded");
                return Ok(buffer);
            }
            RawQueryResult::BufferTooSmall { required } => {
                let next = match required {
                    Some(required) if required > size => required,
                    _ => size
                        .saturating_mul(2)
                        .max(config.initial_size)
                        .max(MIN_GROWTH_SIZE),
                };
                if next > config.max_size {
                    if required.is_some_and(|required| required > config.max_size)
                        || size >= config.max_size
                    {
                        debug!(
                            ?class,
                            attempts,
                            requested = next,
                            max = config.max_size,
                            "query exceeds size cap"
                        );
                        return Err(QueryError::ExhaustedRetries {
                            attempts,
                            last_size: next,
                        });
                    }
                    size = config.max_size;
                } else {
                    size = next;
                }
                debug!(?class, attempts, ?required, next = size, "buffer too small, growing");
            }
            RawQueryResult::Error(code) => {
                debug!(?class, attempts, code, "query failed");
                return Err(QueryError::from(code));
            }
        }
    }
}
