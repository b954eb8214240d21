use std::ffi::{c_char, CStr};

use crate::data::{eqs_data_origin_t, get_data_origin, register_data_origin};
use crate::{eqs_status_t, Error};

use super::status::{catch_unwind, check_pointers};

/// Register a new data origin with the given `name`. Calling this function
/// multiple times with the same name will give the same
/// `eqs_data_origin_t`.
///
/// @param name name of the data origin as an UTF-8 encoded NULL-terminated
///        string
/// @param origin pointer to an `eqs_data_origin_t` where the origin will be
///        stored
///
/// @returns The status code of this operation. If the status is not
///          `EQS_SUCCESS`, you can use `eqs_last_error()` to get the full
///          error message.
#[no_mangle]
pub unsafe extern "C" fn eqs_register_data_origin(
    name: *const c_char,
    origin: *mut eqs_data_origin_t,
) -> eqs_status_t {
    catch_unwind(|| {
        check_pointers!(name, origin);

        let name = CStr::from_ptr(name).to_str()?;
        *origin = register_data_origin(name)?;

        Ok(())
    })
}

/// Get the name used to register a given data `origin` in the given
/// `buffer`
///
/// @param origin pre-registered data origin
/// @param buffer buffer to be filled with the data origin name. The origin
///        name will be written as an UTF-8 encoded, NULL-terminated string
/// @param buffer_size size of the buffer
///
/// @returns The status code of this operation. If the status is not
///          `EQS_SUCCESS`, you can use `eqs_last_error()` to get the full
///          error message.
#[no_mangle]
pub unsafe extern "C" fn eqs_get_data_origin(
    origin: eqs_data_origin_t,
    buffer: *mut c_char,
    buffer_size: u64,
) -> eqs_status_t {
    catch_unwind(|| {
        check_pointers!(buffer);

        let name = get_data_origin(origin)?;
        let buffer_size = usize::try_from(buffer_size)?;
        copy_str_to_buffer(&name, buffer, buffer_size)
    })
}

/// Copy `string` to the C `buffer` of size `buffer_size`, including the
/// final NULL byte
unsafe fn copy_str_to_buffer(
    string: &str,
    buffer: *mut c_char,
    buffer_size: usize,
) -> crate::Result<()> {
    let bytes = string.as_bytes();
    if bytes.len() + 1 > buffer_size {
        return Err(Error::BufferSize(format!(
            "string buffer is not big enough: got space for {} bytes, need {}",
            buffer_size,
            bytes.len() + 1
        )));
    }

    std::ptr::copy_nonoverlapping(bytes.as_ptr().cast::<c_char>(), buffer, bytes.len());
    *buffer.add(bytes.len()) = 0;

    Ok(())
}
