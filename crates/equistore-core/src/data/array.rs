use std::ffi::c_void;
use std::ops::Range;

use crate::error::set_last_error;
use crate::{eqs_status_t, Error, Result, EQS_SUCCESS};

use super::eqs_data_origin_t;

/// Representation of a single sample moved from an array to another one
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub struct eqs_sample_mapping_t {
    /// index of the moved sample in the input array
    pub input: usize,
    /// index of the moved sample in the output array
    pub output: usize,
}

/// `eqs_array_t` manages n-dimensional arrays used as data in a block or
/// tensor map. The array itself if opaque to this library and can come from
/// multiple sources: Rust program, a C/C++ program, a Fortran program, Python
/// with numpy or torch. The data does not have to live on CPU, or even on the
/// same machine where this code is executed.
///
/// This struct contains a C-compatible manual implementation of a virtual
/// table (vtable, i.e. trait in Rust, pure virtual class in C++); allowing
/// manipulation of the array in an opaque way.
///
/// Dropping an `eqs_array_t` calls its `destroy` function.
#[repr(C)]
#[allow(non_camel_case_types)]
pub struct eqs_array_t {
    /// User-provided data should be stored here, it will be passed as the
    /// first parameter to all function pointers below.
    pub ptr: *mut c_void,

    /// This function needs to store the "data origin" for this array in
    /// `origin`. Users of `eqs_array_t` should register a single data
    /// origin with `register_data_origin`, and use it for all compatible
    /// arrays.
    pub origin: Option<
        unsafe extern "C" fn(array: *const c_void, origin: *mut eqs_data_origin_t) -> eqs_status_t,
    >,

    /// Get the shape of the array managed by this `eqs_array_t` in the
    /// `*shape` pointer, and the number of dimension (size of the `*shape`
    /// array) in `*shape_count`.
    pub shape: Option<
        unsafe extern "C" fn(
            array: *const c_void,
            shape: *mut *const usize,
            shape_count: *mut usize,
        ) -> eqs_status_t,
    >,

    /// Change the shape of the array managed by this `eqs_array_t` to the
    /// given `shape`. `shape_count` must contain the number of elements in
    /// the `shape` array
    pub reshape: Option<
        unsafe extern "C" fn(array: *mut c_void, shape: *const usize, shape_count: usize) -> eqs_status_t,
    >,

    /// Swap the axes `axis_1` and `axis_2` in this `array`.
    pub swap_axes:
        Option<unsafe extern "C" fn(array: *mut c_void, axis_1: usize, axis_2: usize) -> eqs_status_t>,

    /// Create a new array with the same options as the current one (data
    /// type, data location, etc.) and the requested `shape`; and store it in
    /// `new_array`. The number of elements in the `shape` array should be
    /// given in `shape_count`.
    ///
    /// The new array should be filled with zeros.
    pub create: Option<
        unsafe extern "C" fn(
            array: *const c_void,
            shape: *const usize,
            shape_count: usize,
            new_array: *mut eqs_array_t,
        ) -> eqs_status_t,
    >,

    /// Make a copy of this `array` and return the new array in `new_array`
    pub copy:
        Option<unsafe extern "C" fn(array: *const c_void, new_array: *mut eqs_array_t) -> eqs_status_t>,

    /// Remove this array and free the associated memory. This function can
    /// be set to `NULL` is there is no memory management to do.
    pub destroy: Option<unsafe extern "C" fn(array: *mut c_void)>,

    /// Set entries in the `output` array (the current array) taking data
    /// from the `input` array. The `output` array is guaranteed to be created
    /// by calling `eqs_array_t::create` with one of the arrays in the same
    /// block or tensor map as the `input`.
    ///
    /// The `samples` array of size `samples_count` indicate where the data
    /// should be moved from `input` to `output`.
    ///
    /// This function should copy data from `input[samples[i].input, ..., :]`
    /// to `array[samples[i].output, ..., property_start:property_end]` for
    /// `i` up to `samples_count`. All indexes are 0-based.
    pub move_samples_from: Option<
        unsafe extern "C" fn(
            output: *mut c_void,
            input: *const c_void,
            samples: *const eqs_sample_mapping_t,
            samples_count: usize,
            property_start: usize,
            property_end: usize,
        ) -> eqs_status_t,
    >,
}

// SAFETY: arrays are only ever accessed through `&`/`&mut` borrows of the
// structures owning them, and callers are responsible for providing
// implementations that can be used from the thread owning the tensor map.
unsafe impl Send for eqs_array_t {}
unsafe impl Sync for eqs_array_t {}

impl std::fmt::Debug for eqs_array_t {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("eqs_array_t");
        debug.field("ptr", &self.ptr);
        match self.origin().and_then(super::get_data_origin) {
            Ok(origin) => debug.field("origin", &origin),
            Err(_) => debug.field("origin", &"<unknown>"),
        };
        debug.finish()
    }
}

impl Drop for eqs_array_t {
    fn drop(&mut self) {
        if let Some(function) = self.destroy {
            unsafe { function(self.ptr) }
        }
    }
}

/// Get the function pointer `function` or a nice error message if it is
/// NULL.
fn function<T>(function: Option<T>, name: &str) -> Result<T> {
    function.ok_or_else(|| {
        Error::InvalidParameter(format!("eqs_array_t.{} function is NULL", name))
    })
}

/// Turn the status returned by the `name` callback into a `Result`
fn check_status(status: eqs_status_t, name: &str) -> Result<()> {
    if status == EQS_SUCCESS {
        Ok(())
    } else {
        Err(Error::from_callback(
            status,
            &format!("calling eqs_array_t.{} failed", name),
        ))
    }
}

impl eqs_array_t {
    /// Create an `eqs_array_t` with all fields set to null pointers.
    ///
    /// Dropping the resulting array does nothing.
    pub fn null() -> eqs_array_t {
        eqs_array_t {
            ptr: std::ptr::null_mut(),
            origin: None,
            shape: None,
            reshape: None,
            swap_axes: None,
            create: None,
            copy: None,
            destroy: None,
            move_samples_from: None,
        }
    }

    /// Is this array missing its data pointer?
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    /// Get the data origin of this array
    pub fn origin(&self) -> Result<eqs_data_origin_t> {
        let function = function(self.origin, "origin")?;

        let mut origin = 0;
        set_last_error("");
        let status = unsafe { function(self.ptr, &mut origin) };
        check_status(status, "origin")?;

        Ok(origin)
    }

    /// Get the shape of this array
    pub fn shape(&self) -> Result<&[usize]> {
        let function = function(self.shape, "shape")?;

        let mut shape = std::ptr::null();
        let mut shape_count: usize = 0;
        set_last_error("");
        let status = unsafe { function(self.ptr, &mut shape, &mut shape_count) };
        check_status(status, "shape")?;

        if shape_count == 0 {
            return Ok(&[]);
        }

        if shape.is_null() {
            return Err(Error::InvalidParameter(
                "eqs_array_t.shape returned a NULL pointer for a non-empty shape".into(),
            ));
        }

        // SAFETY: the array implementation guarantees that the shape pointer
        // stays valid until the next mutation of the array, which requires
        // `&mut self`
        Ok(unsafe { std::slice::from_raw_parts(shape, shape_count) })
    }

    /// Change the shape of this array to `shape`
    pub fn reshape(&mut self, shape: &[usize]) -> Result<()> {
        let function = function(self.reshape, "reshape")?;

        set_last_error("");
        let status = unsafe { function(self.ptr, shape.as_ptr(), shape.len()) };
        check_status(status, "reshape")
    }

    /// Swap the axes `axis_1` and `axis_2` in this array
    pub fn swap_axes(&mut self, axis_1: usize, axis_2: usize) -> Result<()> {
        let function = function(self.swap_axes, "swap_axes")?;

        set_last_error("");
        let status = unsafe { function(self.ptr, axis_1, axis_2) };
        check_status(status, "swap_axes")
    }

    /// Create a new zero-filled array with the same data type/location as
    /// this one, and the given `shape`
    pub fn create(&self, shape: &[usize]) -> Result<eqs_array_t> {
        let function = function(self.create, "create")?;

        let mut new_array = eqs_array_t::null();
        set_last_error("");
        let status = unsafe { function(self.ptr, shape.as_ptr(), shape.len(), &mut new_array) };
        check_status(status, "create")?;

        Ok(new_array)
    }

    /// Make a deep copy of this array
    pub fn try_clone(&self) -> Result<eqs_array_t> {
        let function = function(self.copy, "copy")?;

        let mut new_array = eqs_array_t::null();
        set_last_error("");
        let status = unsafe { function(self.ptr, &mut new_array) };
        check_status(status, "copy")?;

        Ok(new_array)
    }

    /// Copy data from `input` to this array, following the given `samples`
    /// mapping, and putting the data in the `properties` range of the last
    /// axis.
    pub fn move_samples_from(
        &mut self,
        input: &eqs_array_t,
        samples: &[eqs_sample_mapping_t],
        properties: Range<usize>,
    ) -> Result<()> {
        let function = function(self.move_samples_from, "move_samples_from")?;

        set_last_error("");
        let status = unsafe {
            function(
                self.ptr,
                input.ptr,
                samples.as_ptr(),
                samples.len(),
                properties.start,
                properties.end,
            )
        };
        check_status(status, "move_samples_from")
    }

    /// Check that this array has the given `shape`, returning an error
    /// mentioning `context` otherwise.
    pub(crate) fn check_shape(&self, expected: &[usize], context: &str) -> Result<()> {
        let shape = self.shape()?;
        if shape != expected {
            return Err(Error::InvalidParameter(format!(
                "{}: the array shape {:?} does not match the labels, expected {:?}",
                context, shape, expected
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_array() {
        let array = eqs_array_t::null();
        assert!(array.is_null());

        let error = array.shape().unwrap_err();
        assert_eq!(
            error.to_string(),
            "invalid parameter: eqs_array_t.shape function is NULL"
        );

        let error = array.origin().unwrap_err();
        assert!(matches!(error, Error::InvalidParameter(_)));

        // dropping a null array is fine
        drop(array);
    }

    #[test]
    fn test_callback_errors() {
        unsafe extern "C" fn failing_copy(
            _: *const c_void,
            _: *mut eqs_array_t,
        ) -> eqs_status_t {
            set_last_error("no copy for you");
            -12
        }

        let mut array = eqs_array_t::null();
        array.copy = Some(failing_copy);

        let error = array.try_clone().unwrap_err();
        assert_eq!(error.status(), -12);
        assert_eq!(
            error.to_string(),
            "external error (status -12): calling eqs_array_t.copy failed: no copy for you"
        );
    }
}
