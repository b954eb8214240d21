use std::any::Any;
use std::ffi::c_void;
use std::ops::Range;

use crate::c_api::catch_unwind;
use crate::{eqs_status_t, Result};

use super::{eqs_array_t, eqs_data_origin_t, eqs_sample_mapping_t};

/// The Array trait is used by equistore to manage data storage. It can be
/// implemented by users to use their own array types as data in blocks and
/// tensor maps, and turned into an [`eqs_array_t`] with
/// [`eqs_array_t::new`].
pub trait Array: Any + Send + Sync {
    /// Get the array as a `Any` reference
    fn as_any(&self) -> &dyn Any;

    /// Get the array as a mutable `Any` reference
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Get the data origin for this array
    fn origin(&self) -> Result<eqs_data_origin_t>;

    /// Get the shape of this array
    fn shape(&self) -> &[usize];

    /// Change the shape of this array to `shape`
    fn reshape(&mut self, shape: &[usize]) -> Result<()>;

    /// Swap the axes `axis_1` and `axis_2` in this array
    fn swap_axes(&mut self, axis_1: usize, axis_2: usize) -> Result<()>;

    /// Create a new array with the same options as the current one (data
    /// type, data location, etc.) and the requested `shape`, filled with
    /// zeros.
    fn create(&self, shape: &[usize]) -> Result<Box<dyn Array>>;

    /// Make a copy of this array
    fn copy(&self) -> Result<Box<dyn Array>>;

    /// Set entries in `self` taking data from the `input` array, following
    /// [`eqs_array_t::move_samples_from`] semantics.
    fn move_samples_from(
        &mut self,
        input: &dyn Array,
        samples: &[eqs_sample_mapping_t],
        properties: Range<usize>,
    ) -> Result<()>;
}

impl eqs_array_t {
    /// Create a new `eqs_array_t` from a Rust implementation of the
    /// [`Array`] trait.
    pub fn new(array: Box<dyn Array>) -> eqs_array_t {
        // Box<dyn Array> is a fat pointer, box it again to get a thin pointer
        // that fits in `ptr`
        let array = Box::new(array);

        eqs_array_t {
            ptr: Box::into_raw(array).cast(),
            origin: Some(rust_array_origin),
            shape: Some(rust_array_shape),
            reshape: Some(rust_array_reshape),
            swap_axes: Some(rust_array_swap_axes),
            create: Some(rust_array_create),
            copy: Some(rust_array_copy),
            destroy: Some(rust_array_destroy),
            move_samples_from: Some(rust_array_move_samples_from),
        }
    }

    /// Get a reference to the underlying Rust array, if this `eqs_array_t`
    /// was created with [`eqs_array_t::new`].
    pub fn as_rust_array(&self) -> Option<&dyn Array> {
        if !self.is_rust_array() {
            return None;
        }

        // SAFETY: `ptr` was created in `eqs_array_t::new`
        let array = unsafe { &*self.ptr.cast::<Box<dyn Array>>() };
        Some(&**array)
    }

    /// Get a mutable reference to the underlying Rust array, if this
    /// `eqs_array_t` was created with [`eqs_array_t::new`].
    pub fn as_rust_array_mut(&mut self) -> Option<&mut dyn Array> {
        if !self.is_rust_array() {
            return None;
        }

        // SAFETY: `ptr` was created in `eqs_array_t::new`
        let array = unsafe { &mut *self.ptr.cast::<Box<dyn Array>>() };
        Some(&mut **array)
    }

    /// Get a reference to the concrete Rust array of type `T` stored in this
    /// `eqs_array_t`, if any.
    ///
    /// # Examples
    ///
    /// ```
    /// # #[cfg(feature = "ndarray")] {
    /// use equistore_core::eqs_array_t;
    /// use ndarray::ArrayD;
    ///
    /// let array = eqs_array_t::new(Box::new(ArrayD::<f64>::zeros(vec![2, 3])));
    /// let ndarray = array.downcast_ref::<ArrayD<f64>>().unwrap();
    /// assert_eq!(ndarray.shape(), [2, 3]);
    /// # }
    /// ```
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_rust_array()?.as_any().downcast_ref::<T>()
    }

    /// Get a mutable reference to the concrete Rust array of type `T` stored
    /// in this `eqs_array_t`, if any.
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.as_rust_array_mut()?.as_any_mut().downcast_mut::<T>()
    }

    fn is_rust_array(&self) -> bool {
        // compare addresses, since function pointers comparison is not
        // guaranteed to be meaningful
        !self.ptr.is_null()
            && self.destroy.map(|f| f as usize) == Some(rust_array_destroy as usize)
    }
}

/// Get a reference to the Rust array behind `ptr`
unsafe fn rust_array<'a>(ptr: *const c_void) -> &'a dyn Array {
    &**ptr.cast::<Box<dyn Array>>()
}

/// Get a mutable reference to the Rust array behind `ptr`
unsafe fn rust_array_mut<'a>(ptr: *mut c_void) -> &'a mut dyn Array {
    &mut **ptr.cast::<Box<dyn Array>>()
}

unsafe extern "C" fn rust_array_origin(
    array: *const c_void,
    origin: *mut eqs_data_origin_t,
) -> eqs_status_t {
    catch_unwind(|| {
        let array = rust_array(array);
        *origin = array.origin()?;
        Ok(())
    })
}

unsafe extern "C" fn rust_array_shape(
    array: *const c_void,
    shape: *mut *const usize,
    shape_count: *mut usize,
) -> eqs_status_t {
    catch_unwind(|| {
        let array = rust_array(array);
        let rust_shape = array.shape();
        *shape = rust_shape.as_ptr();
        *shape_count = rust_shape.len();
        Ok(())
    })
}

unsafe extern "C" fn rust_array_reshape(
    array: *mut c_void,
    shape: *const usize,
    shape_count: usize,
) -> eqs_status_t {
    catch_unwind(|| {
        let array = rust_array_mut(array);
        let shape: &[usize] = if shape_count == 0 {
            &[]
        } else {
            std::slice::from_raw_parts(shape, shape_count)
        };
        array.reshape(shape)
    })
}

unsafe extern "C" fn rust_array_swap_axes(
    array: *mut c_void,
    axis_1: usize,
    axis_2: usize,
) -> eqs_status_t {
    catch_unwind(|| {
        let array = rust_array_mut(array);
        array.swap_axes(axis_1, axis_2)
    })
}

unsafe extern "C" fn rust_array_create(
    array: *const c_void,
    shape: *const usize,
    shape_count: usize,
    new_array: *mut eqs_array_t,
) -> eqs_status_t {
    catch_unwind(|| {
        let array = rust_array(array);
        let shape: &[usize] = if shape_count == 0 {
            &[]
        } else {
            std::slice::from_raw_parts(shape, shape_count)
        };
        let created = array.create(shape)?;
        // `new_array` might be uninitialized memory, don't drop it
        new_array.write(eqs_array_t::new(created));
        Ok(())
    })
}

unsafe extern "C" fn rust_array_copy(
    array: *const c_void,
    new_array: *mut eqs_array_t,
) -> eqs_status_t {
    catch_unwind(|| {
        let array = rust_array(array);
        let copy = array.copy()?;
        new_array.write(eqs_array_t::new(copy));
        Ok(())
    })
}

unsafe extern "C" fn rust_array_destroy(array: *mut c_void) {
    if array.is_null() {
        return;
    }

    let status = catch_unwind(|| {
        drop(Box::from_raw(array.cast::<Box<dyn Array>>()));
        Ok(())
    });

    if status != crate::EQS_SUCCESS {
        tracing::warn!(status, "panic while destroying a Rust array");
    }
}

unsafe extern "C" fn rust_array_move_samples_from(
    output: *mut c_void,
    input: *const c_void,
    samples: *const eqs_sample_mapping_t,
    samples_count: usize,
    property_start: usize,
    property_end: usize,
) -> eqs_status_t {
    catch_unwind(|| {
        let output = rust_array_mut(output);
        let input = rust_array(input);
        let samples: &[eqs_sample_mapping_t] = if samples_count == 0 {
            &[]
        } else {
            std::slice::from_raw_parts(samples, samples_count)
        };

        output.move_samples_from(input, samples, property_start..property_end)
    })
}
