//! Named, integer-valued index tables attached to tensor axes.
//!
//! A set of [`Labels`] is similar to a list of `count` named tuples, stored
//! as a 2D array of shape `(count, size)` with a name associated with each
//! column (called a *variable*). Every row is unique, which makes it possible
//! to look up the position of a row in constant time.
//!
//! # Examples
//!
//! ```
//! use equistore_core::Labels;
//!
//! let labels = Labels::new(&["structure", "center"], vec![0, 0, 0, 1, 1, 0]).unwrap();
//! assert_eq!(labels.names(), ["structure", "center"]);
//! assert_eq!(labels.count(), 3);
//! assert_eq!(labels.position(&[0, 1]).unwrap(), Some(1));
//! assert_eq!(labels.position(&[3, 3]).unwrap(), None);
//! assert!(labels.position(&[0]).is_err());
//! ```

use std::collections::HashMap;
use std::ffi::{c_char, CString};

use smallvec::SmallVec;

use crate::utils::ConstCStrArray;
use crate::{Error, Result};

/// A single row of a set of labels, stored inline for the common case of a
/// handful of variables.
pub(crate) type LabelsRow = SmallVec<[i32; 4]>;

/// Check whether `name` can be used as a label variable name: it must be
/// non-empty, start with an ASCII letter or `_` and contain only ASCII
/// alphanumeric characters or `_`.
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_names(names: &[&str]) -> Result<()> {
    for (i, name) in names.iter().enumerate() {
        if !is_valid_label_name(name) {
            return Err(Error::InvalidParameter(format!(
                "'{}' is not a valid label name",
                name
            )));
        }

        if names[..i].contains(name) {
            return Err(Error::InvalidParameter(format!(
                "labels names must be unique, got '{}' multiple times",
                name
            )));
        }
    }
    Ok(())
}

/// Incremental construction of [`Labels`], checking uniqueness of every new
/// row.
///
/// # Examples
///
/// ```
/// use equistore_core::LabelsBuilder;
///
/// let mut builder = LabelsBuilder::new(vec!["a", "b"]).unwrap();
/// builder.add(&[0, 1]).unwrap();
/// builder.add(&[2, 1]).unwrap();
/// assert!(builder.add(&[0, 1]).is_err());
///
/// let labels = builder.finish();
/// assert_eq!(labels.count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct LabelsBuilder {
    names: Vec<String>,
    values: Vec<i32>,
    positions: HashMap<LabelsRow, usize>,
}

impl LabelsBuilder {
    /// Start building labels with the given variable `names`
    pub fn new(names: Vec<&str>) -> Result<LabelsBuilder> {
        check_names(&names)?;
        Ok(LabelsBuilder {
            names: names.into_iter().map(String::from).collect(),
            values: Vec::new(),
            positions: HashMap::new(),
        })
    }

    /// Number of variables in the labels being built
    pub fn size(&self) -> usize {
        self.names.len()
    }

    /// Number of rows added so far
    pub fn count(&self) -> usize {
        self.positions.len()
    }

    /// Position of `row` in the rows added so far, if any
    pub fn position(&self, row: &[i32]) -> Option<usize> {
        self.positions.get(row).copied()
    }

    /// Add a new `row` at the end of the labels. This fails if the row does
    /// not have one value per variable, or if it was already added.
    pub fn add(&mut self, row: &[i32]) -> Result<()> {
        if row.len() != self.size() {
            return Err(Error::InvalidParameter(format!(
                "expected an entry with {} values for labels {:?}, got {} values",
                self.size(),
                self.names,
                row.len()
            )));
        }

        if self.size() == 0 {
            return Err(Error::InvalidParameter(
                "can not add entries to labels without variables".into(),
            ));
        }

        if self.positions.contains_key(row) {
            return Err(Error::InvalidParameter(format!(
                "can not have the same label value multiple times: {:?} is already present",
                row
            )));
        }

        let position = self.positions.len();
        self.positions.insert(LabelsRow::from_slice(row), position);

        self.values.extend_from_slice(row);
        Ok(())
    }

    /// Finish building the labels
    pub fn finish(self) -> Labels {
        let names = self
            .names
            .into_iter()
            .map(|name| {
                // names were checked to be ASCII identifiers in `new`
                CString::new(name).unwrap_or_default()
            })
            .collect();

        Labels {
            names: ConstCStrArray::new(names),
            values: self.values,
            positions: self.positions,
        }
    }
}

/// A set of unique rows of `i32`, with one name for each column.
///
/// `Labels` are immutable once created; borrowed `&Labels` handed out by
/// blocks and tensor maps stay valid for as long as their owner is not
/// modified.
#[derive(Clone)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "LabelsData", into = "LabelsData")
)]
pub struct Labels {
    names: ConstCStrArray,
    values: Vec<i32>,
    positions: HashMap<LabelsRow, usize>,
}

impl Labels {
    /// Create a new set of labels with the given variable `names`, and
    /// `values` containing the rows of the labels, flattened in row-major
    /// order.
    pub fn new(names: &[&str], values: Vec<i32>) -> Result<Labels> {
        let mut builder = LabelsBuilder::new(names.to_vec())?;

        if names.is_empty() {
            if !values.is_empty() {
                return Err(Error::InvalidParameter(
                    "labels without variables can not contain values".into(),
                ));
            }
            return Ok(builder.finish());
        }

        if values.len() % names.len() != 0 {
            return Err(Error::InvalidParameter(format!(
                "the number of values ({}) is not a multiple of the number of variables ({})",
                values.len(),
                names.len()
            )));
        }

        for row in values.chunks_exact(names.len()) {
            builder.add(row)?;
        }

        Ok(builder.finish())
    }

    /// Create labels with the given variable `names` and no entries
    pub fn empty(names: &[&str]) -> Result<Labels> {
        Labels::new(names, Vec::new())
    }

    /// Labels with a single variable named `_` and a single entry `0`. These
    /// are used as keys of tensor maps without any key variable left.
    pub fn single() -> Labels {
        let mut positions = HashMap::new();
        positions.insert(LabelsRow::from_slice(&[0]), 0);
        Labels {
            names: ConstCStrArray::new(vec![CString::from(c"_")]),
            values: vec![0],
            positions,
        }
    }

    /// Names of the variables of these labels
    pub fn names(&self) -> Vec<&str> {
        self.names.iter().collect()
    }

    /// Number of variables, i.e. size of a single entry
    pub fn size(&self) -> usize {
        self.names.len()
    }

    /// Number of entries
    pub fn count(&self) -> usize {
        self.positions.len()
    }

    /// Are these labels without any entry?
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Get the position (i.e. row index) of the given `value` in these
    /// labels, or `None` if the value is not present.
    ///
    /// This fails if `value` does not have one entry for each variable.
    pub fn position(&self, value: &[i32]) -> Result<Option<usize>> {
        if value.len() != self.size() {
            return Err(Error::InvalidParameter(format!(
                "expected a label entry with {} values, got {}",
                self.size(),
                value.len()
            )));
        }
        Ok(self.positions.get(value).copied())
    }

    /// Does these labels contain the given `value`? Entries with the wrong
    /// number of values are never contained.
    pub fn contains(&self, value: &[i32]) -> bool {
        matches!(self.position(value), Ok(Some(_)))
    }

    /// Iterate over the entries of these labels
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[i32]> + '_ {
        // `max(1)` keeps chunks_exact happy for labels without variables,
        // which never contain values
        self.values.chunks_exact(self.size().max(1))
    }

    /// All the values, as a flattened row-major array of shape
    /// `(count, size)`
    pub fn values(&self) -> &[i32] {
        &self.values
    }

    /// Position of the variable with the given `name`, if any
    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Do these labels have the same variable names as `names`, in the same
    /// order?
    pub fn has_names(&self, names: &[&str]) -> bool {
        self.size() == names.len() && self.names.iter().zip(names).all(|(a, b)| a == *b)
    }

    pub(crate) fn c_names(&self) -> *const *const c_char {
        self.names.as_ptr()
    }
}

impl std::ops::Index<usize> for Labels {
    type Output = [i32];

    fn index(&self, i: usize) -> &[i32] {
        let size = self.size();
        &self.values[i * size..(i + 1) * size]
    }
}

impl PartialEq for Labels {
    fn eq(&self, other: &Labels) -> bool {
        self.names.iter().eq(other.names.iter()) && self.values == other.values
    }
}

impl Eq for Labels {}

impl std::fmt::Debug for Labels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Labels{{")?;
        writeln!(f, "\n    {}", self.names().join(", "))?;
        for row in self.iter() {
            let row = row.iter().map(|v| v.to_string()).collect::<Vec<_>>();
            writeln!(f, "    {}", row.join(", "))?;
        }
        write!(f, "}}")
    }
}

/// Plain representation of [`Labels`] used for (de)serialization, the
/// uniqueness of rows is checked again when converting back.
#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct LabelsData {
    names: Vec<String>,
    values: Vec<Vec<i32>>,
}

#[cfg(feature = "serde")]
impl From<Labels> for LabelsData {
    fn from(labels: Labels) -> LabelsData {
        LabelsData {
            names: labels.names().into_iter().map(String::from).collect(),
            values: labels.iter().map(|row| row.to_vec()).collect(),
        }
    }
}

#[cfg(feature = "serde")]
impl TryFrom<LabelsData> for Labels {
    type Error = Error;

    fn try_from(data: LabelsData) -> Result<Labels> {
        let names = data.names.iter().map(|n| &**n).collect::<Vec<_>>();
        let mut builder = LabelsBuilder::new(names)?;
        for row in &data.values {
            builder.add(row)?;
        }
        Ok(builder.finish())
    }
}
