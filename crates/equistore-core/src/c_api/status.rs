use std::any::Any;
use std::ffi::{c_char, CStr};
use std::panic::AssertUnwindSafe;

use crate::error::{last_error_ptr, set_last_error};
use crate::{eqs_status_t, Result, EQS_INTERNAL_ERROR, EQS_SUCCESS};

/// Check that the given pointers are not NULL, returning an invalid parameter
/// error from the current function otherwise
macro_rules! check_pointers {
    ($($pointer: ident),* $(,)?) => {$(
        if $pointer.is_null() {
            return Err($crate::Error::InvalidParameter(format!(
                "got invalid NULL pointer for {}", stringify!($pointer)
            )));
        }
    )*};
}
pub(crate) use check_pointers;

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<unknown panic payload>"
    }
}

/// Run `function`, converting both errors and panics into a status code.
/// The corresponding error message is stored in the thread-local last error
/// slot, to be retrieved with `eqs_last_error`.
pub(crate) fn catch_unwind<F>(function: F) -> eqs_status_t
where
    F: FnOnce() -> Result<()>,
{
    match std::panic::catch_unwind(AssertUnwindSafe(function)) {
        Ok(Ok(())) => EQS_SUCCESS,
        Ok(Err(error)) => {
            set_last_error(&error.to_string());
            error.status()
        }
        Err(payload) => {
            let message = format!("internal error: a panic occurred: {}", panic_message(&*payload));
            tracing::error!("{}", message);
            set_last_error(&message);
            EQS_INTERNAL_ERROR
        }
    }
}

/// Get the last error message that was created on the current thread.
///
/// The returned string is owned by the library, and stays valid until the
/// next call to an `eqs_` function on this thread.
#[no_mangle]
pub unsafe extern "C" fn eqs_last_error() -> *const c_char {
    last_error_ptr()
}

/// Set the last error message for the current thread.
///
/// Array implementations written in other languages should call this
/// function before returning a non-zero status from one of the
/// `eqs_array_t` callbacks: the message is then included in the error
/// reported by the equistore function that called the callback.
///
/// @param message NULL-terminated UTF-8 string describing the error
///
/// @returns The status code of this operation. If the status is not
///          `EQS_SUCCESS`, you can use `eqs_last_error()` to get the full
///          error message.
#[no_mangle]
pub unsafe extern "C" fn eqs_set_last_error(message: *const c_char) -> eqs_status_t {
    let mut rust_message = String::new();
    let status = catch_unwind(|| {
        check_pointers!(message);
        rust_message = CStr::from_ptr(message).to_str()?.to_owned();
        Ok(())
    });

    if status == EQS_SUCCESS {
        set_last_error(&rust_message);
    }

    status
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use super::*;
    use crate::{Error, EQS_INVALID_PARAMETER_ERROR};

    fn last_error() -> String {
        unsafe { CStr::from_ptr(eqs_last_error()) }
            .to_str()
            .unwrap()
            .to_owned()
    }

    #[test]
    fn test_errors() {
        let status = catch_unwind(|| Err(Error::InvalidParameter("bad".into())));
        assert_eq!(status, EQS_INVALID_PARAMETER_ERROR);
        assert_eq!(last_error(), "invalid parameter: bad");

        assert_eq!(catch_unwind(|| Ok(())), EQS_SUCCESS);
    }

    #[test]
    fn test_panics() {
        let status = catch_unwind(|| panic!("oops {}", 42));
        assert_eq!(status, EQS_INTERNAL_ERROR);
        assert_eq!(last_error(), "internal error: a panic occurred: oops 42");
    }

    #[test]
    fn test_set_last_error() {
        let status = unsafe { eqs_set_last_error(c"the device is gone".as_ptr()) };
        assert_eq!(status, EQS_SUCCESS);
        assert_eq!(last_error(), "the device is gone");

        let status = unsafe { eqs_set_last_error(std::ptr::null()) };
        assert_eq!(status, EQS_INVALID_PARAMETER_ERROR);
        assert_eq!(
            last_error(),
            "invalid parameter: got invalid NULL pointer for message"
        );
    }

    #[test]
    fn test_null_pointers() {
        fn function(pointer: *const u8) -> Result<()> {
            check_pointers!(pointer);
            Ok(())
        }

        let error = function(std::ptr::null()).unwrap_err();
        assert_eq!(
            error.to_string(),
            "invalid parameter: got invalid NULL pointer for pointer"
        );
        assert!(function(&0).is_ok());
    }
}
