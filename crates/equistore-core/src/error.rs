//! Error type shared by every part of equistore
//!
//! All fallible operations return [`Result<T>`]. At the C API boundary each
//! [`Error`] is turned into an [`eqs_status_t`] code, and its message is
//! stored in a thread-local slot readable with `eqs_last_error`.
//!
//! # Examples
//!
//! ```
//! use equistore_core::{Error, Labels};
//!
//! let error = Labels::new(&["a", "a"], vec![]).unwrap_err();
//! assert!(matches!(error, Error::InvalidParameter(_)));
//! assert_eq!(error.status(), equistore_core::EQS_INVALID_PARAMETER_ERROR);
//! ```

use std::cell::RefCell;
use std::ffi::CString;

use thiserror::Error;

/// Status type returned by all functions in the C API.
///
/// The value 0 (`EQS_SUCCESS`) is used to indicate successful operations,
/// positive values are used by this library to indicate errors, while
/// negative values are reserved for users of this library to indicate their
/// own errors in callbacks.
#[allow(non_camel_case_types)]
pub type eqs_status_t = i32;

/// Status code used when a function succeeded
pub const EQS_SUCCESS: eqs_status_t = 0;
/// Status code used when a function got an invalid parameter
pub const EQS_INVALID_PARAMETER_ERROR: eqs_status_t = 1;
/// Status code used when a memory buffer is too small to fit the requested data
pub const EQS_BUFFER_SIZE_ERROR: eqs_status_t = 254;
/// Status code used when there was an internal error, i.e. there is a bug
/// inside equistore itself
pub const EQS_INTERNAL_ERROR: eqs_status_t = 255;

/// Top-level error type for equistore operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A function got an invalid parameter: bad shape, mismatched names,
    /// duplicated entries, incompatible blocks, out of range index...
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A caller-provided buffer is too small for the requested data
    #[error("buffer is not big enough: {0}")]
    BufferSize(String),

    /// An invariant of this library was broken. This is a bug.
    #[error("internal error: {0}")]
    Internal(String),

    /// An array callback returned a caller-defined (negative) status
    #[error("external error (status {status}): {message}")]
    External {
        /// status code returned by the callback
        status: eqs_status_t,
        /// message left by the callback in the last error slot, if any
        message: String,
    },
}

/// Result type for equistore operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Get the C API status code corresponding to this error
    pub fn status(&self) -> eqs_status_t {
        match self {
            Error::InvalidParameter(_) => EQS_INVALID_PARAMETER_ERROR,
            Error::BufferSize(_) => EQS_BUFFER_SIZE_ERROR,
            Error::Internal(_) => EQS_INTERNAL_ERROR,
            Error::External { status, .. } => *status,
        }
    }

    /// Re-create an error from the `status` returned by an array callback.
    ///
    /// The callback is expected to leave a description of the failure in the
    /// thread-local error slot; it is used as the error message, prefixed by
    /// `context`.
    pub(crate) fn from_callback(status: eqs_status_t, context: &str) -> Error {
        let detail = last_error_message();
        let message = if detail.is_empty() {
            context.to_string()
        } else {
            format!("{}: {}", context, detail)
        };

        match status {
            EQS_INVALID_PARAMETER_ERROR => Error::InvalidParameter(message),
            EQS_BUFFER_SIZE_ERROR => Error::BufferSize(message),
            EQS_INTERNAL_ERROR => Error::Internal(message),
            status => Error::External { status, message },
        }
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(error: std::str::Utf8Error) -> Self {
        Error::InvalidParameter(format!("invalid UTF-8 string: {}", error))
    }
}

impl From<std::ffi::NulError> for Error {
    fn from(error: std::ffi::NulError) -> Self {
        Error::InvalidParameter(format!("string contains a NUL byte: {}", error))
    }
}

impl From<std::num::TryFromIntError> for Error {
    fn from(error: std::num::TryFromIntError) -> Self {
        Error::InvalidParameter(format!("integer value out of range: {}", error))
    }
}

thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::default());
}

/// Store `message` in the thread-local last error slot
pub(crate) fn set_last_error(message: &str) {
    let message = CString::new(message)
        .unwrap_or_else(|_| CString::from(c"<error message contained a NUL byte>"));
    LAST_ERROR.with(|slot| *slot.borrow_mut() = message);
}

/// Get a copy of the current thread-local last error message
pub(crate) fn last_error_message() -> String {
    LAST_ERROR.with(|slot| slot.borrow().to_string_lossy().into_owned())
}

/// Get a pointer to the current thread-local last error message. The pointer
/// stays valid until the next call to [`set_last_error`] on this thread.
pub(crate) fn last_error_ptr() -> *const std::ffi::c_char {
    LAST_ERROR.with(|slot| slot.borrow().as_ptr())
}
