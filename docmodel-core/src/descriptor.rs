//! Compiler for method-style filter and order descriptors.
//!
//! A filter descriptor reads like a finder method name: a two character verb followed by field
//! names joined by `And`. Values are bound to the fields by position.
//!
//! ```ignore
//! use docmodel::descriptor::{compile_filter, compile_sort};
//! use bson::{Bson, doc};
//!
//! let filter = compile_filter("byNameAndAge", &[Bson::from("Ann"), Bson::from(30)])?;
//! assert_eq!(filter.into_document(), doc! { "name": "Ann", "age": 30 });
//!
//! let sort = compile_sort("-age, name")?;
//! assert_eq!(sort.to_document(), doc! { "age": -1, "name": 1 });
//! ```
//!
//! Both compilers are pure functions and never touch a store.

use bson::Bson;

use crate::{
    error::{ModelError, ModelResult},
    query::{FilterSpec, SortDirection, SortSpec},
};

/// Length, in characters, of the verb that starts every filter descriptor (`by`, `of`, ...).
pub const VERB_LEN: usize = 2;

/// Literal joining field segments in a filter descriptor.
pub const CONNECTIVE: &str = "And";

/// Marker that makes a sort token descending.
pub const DESCENDING_MARKER: char = '-';

/// Compiles a filter descriptor and positional values into a [`FilterSpec`].
///
/// The verb is stripped without being checked. Supplying more values than fields is allowed;
/// the extra values are ignored.
///
/// # Errors
///
/// Returns [`ModelError::ArgumentCount`] when there are fewer values than fields, and
/// [`ModelError::InvalidDescriptor`] when the descriptor has no field after the verb or an
/// empty segment.
pub fn compile_filter(descriptor: &str, values: &[Bson]) -> ModelResult<FilterSpec> {
    let fields = filter_fields(descriptor)?;

    if fields.len() > values.len() {
        return Err(ModelError::ArgumentCount {
            descriptor: descriptor.to_string(),
            expected: fields.len(),
            supplied: values.len(),
        });
    }

    let mut filter = FilterSpec::new();
    for (field, value) in fields.into_iter().zip(values) {
        filter.insert(field, value.clone());
    }

    Ok(filter)
}

/// Compiles a comma separated order descriptor into a [`SortSpec`].
///
/// # Errors
///
/// Returns [`ModelError::InvalidDescriptor`] for an empty token or a bare `-`.
pub fn compile_sort(descriptor: &str) -> ModelResult<SortSpec> {
    let mut sort = SortSpec::new();

    for token in descriptor.split(',').map(str::trim) {
        let (field, direction) = match token.strip_prefix(DESCENDING_MARKER) {
            Some(rest) => (rest.trim_start(), SortDirection::Desc),
            None => (token, SortDirection::Asc),
        };

        if field.is_empty() {
            return Err(invalid(descriptor, "empty sort field"));
        }

        sort.push(lower_first(field), direction);
    }

    Ok(sort)
}

/// Parses the field names of a filter descriptor, in order.
pub fn filter_fields(descriptor: &str) -> ModelResult<Vec<String>> {
    let body = match descriptor.char_indices().nth(VERB_LEN) {
        Some((start, _)) => &descriptor[start..],
        None => return Err(invalid(descriptor, "no field after the verb")),
    };

    body.split(CONNECTIVE)
        .map(|segment| {
            if segment.is_empty() {
                Err(invalid(descriptor, "empty field segment"))
            } else {
                Ok(lower_first(segment))
            }
        })
        .collect()
}

fn lower_first(segment: &str) -> String {
    let mut chars = segment.chars();

    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn invalid(descriptor: &str, reason: &str) -> ModelError {
    ModelError::InvalidDescriptor(descriptor.to_string(), reason.to_string())
}
