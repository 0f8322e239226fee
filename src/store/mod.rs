//! Attribute store capability.
//!
//! The bridge resolves `(object name, dotted attribute path)` pairs
//! against a pluggable [`AttributeStore`]. The store hands back
//! [`AttributeValue`] trees; [`resolve`] walks dotted paths through
//! composite values and [`format_value`] renders the result for the
//! wire. Stores must tolerate concurrent reads from multiple connection
//! handlers.

pub mod memory;

pub use memory::MemoryStore;

use std::collections::HashMap;

use thiserror::Error;

/// A value exposed by a store: a scalar, or a composite of named fields
/// that dotted attribute paths descend into.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Composite(HashMap<String, AttributeValue>),
}

impl AttributeValue {
    /// Build a composite value from `(field, value)` pairs.
    pub fn composite<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, AttributeValue)>,
        K: Into<String>,
    {
        AttributeValue::Composite(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Int(v.into())
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<u32> for AttributeValue {
    fn from(v: u32) -> Self {
        AttributeValue::Int(v.into())
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Str(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::Str(v)
    }
}

/// Store-level failures. All of these collapse to the not-supported
/// sentinel at the connection-handler boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no object named '{0}'")]
    ObjectNotFound(String),

    #[error("object '{object}' has no attribute '{attribute}'")]
    AttributeNotFound { object: String, attribute: String },

    #[error("object '{object}' has no operation '{operation}'")]
    OperationNotFound { object: String, operation: String },

    #[error("operation '{operation}' has no overload taking {supplied} argument(s)")]
    SignatureMismatch { operation: String, supplied: usize },

    #[error("unsupported argument type '{0}'")]
    UnsupportedArgumentType(String),

    #[error("cannot read '{token}' as {kind:?}")]
    InvalidArgument { token: String, kind: ArgKind },

    #[error("resolution failed: {0}")]
    Resolution(String),
}

/// The closed set of parameter kinds an operation may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Long,
    Int,
    Str,
    Bool,
    Float,
    Double,
}

/// One coerced operation argument.
#[derive(Debug, Clone, PartialEq)]
pub enum OpArg {
    Long(i64),
    Int(i32),
    Str(String),
    Bool(bool),
    Float(f32),
    Double(f64),
}

impl ArgKind {
    /// Coerce one raw token to this kind.
    pub fn coerce(self, token: &str) -> Result<OpArg, StoreError> {
        let token = token.trim();
        let invalid = || StoreError::InvalidArgument {
            token: token.to_string(),
            kind: self,
        };
        Ok(match self {
            ArgKind::Long => OpArg::Long(token.parse().map_err(|_| invalid())?),
            ArgKind::Int => OpArg::Int(token.parse().map_err(|_| invalid())?),
            ArgKind::Str => OpArg::Str(token.to_string()),
            ArgKind::Bool => OpArg::Bool(token.parse().map_err(|_| invalid())?),
            ArgKind::Float => OpArg::Float(token.parse().map_err(|_| invalid())?),
            ArgKind::Double => OpArg::Double(token.parse().map_err(|_| invalid())?),
        })
    }
}

/// Resolves object attributes and operations for the bridge. Safe for
/// concurrent read access from multiple handler tasks.
pub trait AttributeStore: Send + Sync {
    /// Look up a single attribute on an object. The name here is the
    /// first path segment only; nested descent happens in [`resolve`].
    fn attribute(&self, object: &str, attribute: &str) -> Result<AttributeValue, StoreError>;

    /// Declared parameter lists of an operation, one entry per overload.
    fn operation_signatures(
        &self,
        object: &str,
        operation: &str,
    ) -> Result<Vec<Vec<ArgKind>>, StoreError>;

    /// Invoke an operation with already-coerced arguments.
    fn invoke(
        &self,
        object: &str,
        operation: &str,
        args: &[OpArg],
    ) -> Result<AttributeValue, StoreError>;
}

/// Resolve a dotted attribute path to its formatted string value.
///
/// The first segment selects an attribute on the object; remaining
/// segments descend composite fields one by one. Descent through
/// anything that is not a composite fails rather than producing an
/// empty value.
pub fn resolve(store: &dyn AttributeStore, object: &str, path: &str) -> Result<String, StoreError> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    let mut value = store.attribute(object, head)?;
    if let Some(rest) = rest {
        for segment in rest.split('.') {
            value = match value {
                AttributeValue::Composite(mut fields) => {
                    fields.remove(segment).ok_or_else(|| StoreError::AttributeNotFound {
                        object: object.to_string(),
                        attribute: path.to_string(),
                    })?
                }
                other => {
                    return Err(StoreError::Resolution(format!(
                        "'{}' of '{}' is not a composite value ({:?})",
                        segment, path, other
                    )))
                }
            };
        }
    }
    Ok(format_value(&value))
}

/// Render a resolved value for the wire. Null becomes the empty string.
pub fn format_value(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Null => String::new(),
        AttributeValue::Bool(b) => b.to_string(),
        AttributeValue::Int(i) => i.to_string(),
        AttributeValue::Float(f) => format_float(*f),
        AttributeValue::Str(s) => s.clone(),
        AttributeValue::Composite(fields) => {
            let mut entries: Vec<(&String, &AttributeValue)> = fields.iter().collect();
            entries.sort_by_key(|(k, _)| *k);
            let body: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}={}", k, format_value(v)))
                .collect();
            format!("{{{}}}", body.join(", "))
        }
    }
}

// The source data uses the largest finite double and the smallest
// positive double as "never set" markers for min/max statistics; they
// collapse to zero instead of leaking 309-digit values to the server.
fn format_float(value: f64) -> String {
    let value = if value == f64::MAX || value == f64::from_bits(1) {
        0.0
    } else {
        value
    };
    // Fixed decimal style, up to nine fractional digits, no trailing
    // zeros.
    let mut formatted = format!("{:.9}", value);
    while formatted.ends_with('0') {
        formatted.pop();
    }
    if formatted.ends_with('.') {
        formatted.pop();
    }
    formatted
}
