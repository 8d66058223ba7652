//! Process and thread tokens as query subjects.

use core::mem::MaybeUninit;
use std::os::windows::io::{AsRawHandle, FromRawHandle, OwnedHandle, RawHandle};

use tracing::{debug, trace};
use windows_sys::Win32::Foundation::GetLastError;
use windows_sys::Win32::Security::{GetTokenInformation, TOKEN_QUERY};
use windows_sys::Win32::System::Threading::{
    GetCurrentProcess, OpenProcess, OpenProcessToken, OpenThread, OpenThreadToken,
    PROCESS_QUERY_LIMITED_INFORMATION, THREAD_QUERY_LIMITED_INFORMATION,
};

use crate::error::{
    ERROR_BAD_LENGTH, ERROR_INSUFFICIENT_BUFFER, ERROR_INVALID_PARAMETER, ERROR_MORE_DATA,
};
use crate::{OpenError, QueryClass, RawQuery, RawQueryResult, RawRecordBuffer};

/// What to open a token for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectKind {
    /// Primary token of a process id.
    Process(u32),
    /// Impersonation token of a thread id.
    Thread(u32),
}

fn last_error() -> OpenError {
    // SAFETY: `GetLastError` is always safe to call.
    OpenError::from(unsafe { GetLastError() })
}

/// Takes ownership of a handle returned by an `Open*` call, null on failure.
fn own(handle: RawHandle) -> Result<OwnedHandle, OpenError> {
    if handle.is_null() {
        return Err(last_error());
    }
    // SAFETY: a non-null handle returned by `OpenProcess`/`OpenThread` is owned by the caller.
    Ok(unsafe { OwnedHandle::from_raw_handle(handle) })
}

/// An open access token, closed on drop.
#[derive(Debug)]
pub struct TokenSubject {
    token: OwnedHandle,
}

impl TokenSubject {
    /// Opens the token of `kind` for querying.
    ///
    /// # Errors
    /// [`OpenError::NotFound`] when the process or thread does not exist or the
    /// thread is not impersonating, [`OpenError::AccessDenied`] when the caller
    /// may not open it.
    #[inline]
    pub fn open(kind: SubjectKind) -> Result<Self, OpenError> {
        let mut raw_token: MaybeUninit<RawHandle> = MaybeUninit::uninit();
        let opened = match kind {
            SubjectKind::Process(pid) => {
                // SAFETY: plain FFI call; the result is checked by `own`.
                let raw = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid) };
                let process = own(raw)?;
                // SAFETY: `process` is a valid handle and `raw_token` a valid out-pointer.
                unsafe {
                    OpenProcessToken(process.as_raw_handle(), TOKEN_QUERY, raw_token.as_mut_ptr())
                }
            }
            SubjectKind::Thread(tid) => {
                // SAFETY: plain FFI call; the result is checked by `own`.
                let raw = unsafe { OpenThread(THREAD_QUERY_LIMITED_INFORMATION, 0, tid) };
                let thread = own(raw)?;
                // SAFETY: `thread` is a valid handle and `raw_token` a valid out-pointer.
                unsafe {
                    OpenThreadToken(thread.as_raw_handle(), TOKEN_QUERY, 1, raw_token.as_mut_ptr())
                }
            }
        };
        if opened == 0 {
            let error = last_error();
            debug!(?kind, %error, "token open failed");
            return Err(error);
        }
        // SAFETY: the open call reported success; the handle is initialized and owned.
        let token = unsafe { OwnedHandle::from_raw_handle(raw_token.assume_init()) };
        Ok(Self { token })
    }

    /// Opens the token of the calling process.
    ///
    /// # Errors
    /// See [`TokenSubject::open`].
    #[inline]
    pub fn current_process() -> Result<Self, OpenError> {
        let mut raw_token: MaybeUninit<RawHandle> = MaybeUninit::uninit();
        // SAFETY: GetCurrentProcess is side-effect free and can be called unconditionally.
        let process = unsafe { GetCurrentProcess() };
        // SAFETY: FFI call; pointers are valid. We check the return value immediately.
        if unsafe { OpenProcessToken(process, TOKEN_QUERY, raw_token.as_mut_ptr()) } == 0 {
            return Err(last_error());
        }
        // SAFETY: OpenProcessToken reported success; the handle is initialized.
        let token = unsafe { OwnedHandle::from_raw_handle(raw_token.assume_init()) };
        Ok(Self { token })
    }
}

impl RawQuery for TokenSubject {
    fn raw_query(&self, class: QueryClass, buffer: &mut RawRecordBuffer) -> RawQueryResult {
        let (Ok(raw_class), Ok(len)) = (i32::try_from(class.raw()), u32::try_from(buffer.len()))
        else {
            return RawQueryResult::Error(ERROR_INVALID_PARAMETER);
        };
        let mut return_len = 0u32;
        // SAFETY: the buffer pointer is valid for `len` bytes and 8-byte aligned.
        let ok = unsafe {
            GetTokenInformation(
                self.token.as_raw_handle(),
                raw_class,
                buffer.as_mut_bytes().as_mut_ptr().cast(),
                len,
                &raw mut return_len,
            )
        };
        if ok != 0 {
            return RawQueryResult::Success {
                written: return_len as usize,
            };
        }
        // SAFETY: `GetLastError` is always safe to call.
        match unsafe { GetLastError() } {
            ERROR_INSUFFICIENT_BUFFER | ERROR_BAD_LENGTH | ERROR_MORE_DATA => {
                trace!(?class, offered = len, return_len, "token buffer too small");
                RawQueryResult::BufferTooSmall {
                    required: (return_len > 0).then_some(return_len as usize),
                }
            }
            code => RawQueryResult::Error(code),
        }
    }
}
