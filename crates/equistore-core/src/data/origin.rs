//! Process-wide registry of data origins.
//!
//! Each kind of array (numpy, torch, rust ndarray, ...) registers a name once
//! and gets back a stable 64-bit tag. Registrations are never removed, so a
//! tag stays valid for the whole lifetime of the process.

use lazy_static::lazy_static;
use parking_lot::RwLock;

use crate::{Error, Result};

/// A single 64-bit integer representing a data origin (numpy ndarray, rust
/// ndarray, torch tensor, fortran array, ...).
#[allow(non_camel_case_types)]
pub type eqs_data_origin_t = u64;

lazy_static! {
    static ref REGISTERED_DATA_ORIGIN: RwLock<Vec<String>> = RwLock::new(Vec::new());
}

/// Register a new data origin with the given `name`, or get the
/// `eqs_data_origin_t` corresponding to this name if it was already
/// registered.
///
/// # Examples
///
/// ```
/// use equistore_core::data::{get_data_origin, register_data_origin};
///
/// let origin = register_data_origin("doctest.origin").unwrap();
/// assert_eq!(register_data_origin("doctest.origin").unwrap(), origin);
/// assert_eq!(get_data_origin(origin).unwrap(), "doctest.origin");
/// ```
pub fn register_data_origin(name: &str) -> Result<eqs_data_origin_t> {
    if name.is_empty() {
        return Err(Error::InvalidParameter(
            "data origin name can not be empty".into(),
        ));
    }

    if let Some(origin) = find_origin(&REGISTERED_DATA_ORIGIN.read(), name) {
        return Ok(origin);
    }

    let mut registered = REGISTERED_DATA_ORIGIN.write();
    // another thread might have registered the same name between the two
    // locks
    if let Some(origin) = find_origin(&registered, name) {
        return Ok(origin);
    }

    registered.push(name.to_string());
    let origin = (registered.len() - 1) as eqs_data_origin_t;
    tracing::debug!(name, origin, "registered new data origin");
    Ok(origin)
}

/// Get the name used to register a given data `origin`
pub fn get_data_origin(origin: eqs_data_origin_t) -> Result<String> {
    let registered = REGISTERED_DATA_ORIGIN.read();
    usize::try_from(origin)
        .ok()
        .and_then(|index| registered.get(index))
        .cloned()
        .ok_or_else(|| {
            Error::InvalidParameter(format!("unregistered data origin: {}", origin))
        })
}

fn find_origin(registered: &[String], name: &str) -> Option<eqs_data_origin_t> {
    registered
        .iter()
        .position(|n| n == name)
        .map(|index| index as eqs_data_origin_t)
}
