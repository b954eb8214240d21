use std::ffi::{c_char, CStr, CString};

/// An owned list of NUL-terminated strings, together with an array of
/// pointers to these strings that can be handed out through the C API as a
/// `const char* const*`.
pub(crate) struct ConstCStrArray {
    strings: Vec<CString>,
    pointers: Vec<*const c_char>,
}

// SAFETY: the pointers point inside `strings`, which is owned by the same
// struct and never mutated after construction.
unsafe impl Send for ConstCStrArray {}
unsafe impl Sync for ConstCStrArray {}

impl ConstCStrArray {
    pub fn new(strings: Vec<CString>) -> ConstCStrArray {
        let pointers = strings.iter().map(|s| s.as_ptr()).collect();
        ConstCStrArray { strings, pointers }
    }

    /// Add a new string at the end of this array
    pub fn push(&mut self, string: CString) {
        // the heap allocation of each CString does not move when the Vec
        // grows, so existing pointers stay valid
        self.pointers.push(string.as_ptr());
        self.strings.push(string);
    }

    pub fn as_ptr(&self) -> *const *const c_char {
        if self.pointers.is_empty() {
            std::ptr::null()
        } else {
            self.pointers.as_ptr()
        }
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Iterate over the strings, all of them are known to be valid UTF-8
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.strings.iter().map(|s| cstr_to_str(s))
    }
}

impl Clone for ConstCStrArray {
    fn clone(&self) -> Self {
        ConstCStrArray::new(self.strings.clone())
    }
}

impl std::fmt::Debug for ConstCStrArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Strings stored in a `ConstCStrArray` are created from `&str`, so they are
/// always valid UTF-8.
fn cstr_to_str(string: &CStr) -> &str {
    match string.to_str() {
        Ok(string) => string,
        Err(_) => unreachable!("ConstCStrArray only contains UTF-8 strings"),
    }
}
