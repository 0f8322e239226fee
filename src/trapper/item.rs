//! Items queued for delivery to the collector.

use crate::store::{self, AttributeStore, StoreError};
use crate::{Result, ZbridgeError};

/// A unit of data to report.
///
/// Literal items carry their value. Derived items name an object
/// attribute that is read at send time, not at construction time, so
/// consecutive resolutions may yield different values. Each item is
/// consumed exactly once by the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Literal {
        key: String,
        value: String,
    },
    Derived {
        key: String,
        object: String,
        attribute: String,
    },
}

impl Item {
    pub fn literal(key: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        Ok(Item::Literal {
            key: checked_key(key.into())?,
            value: value.into(),
        })
    }

    pub fn derived(
        key: impl Into<String>,
        object: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Result<Self> {
        Ok(Item::Derived {
            key: checked_key(key.into())?,
            object: object.into(),
            attribute: attribute.into(),
        })
    }

    pub fn key(&self) -> &str {
        match self {
            Item::Literal { key, .. } | Item::Derived { key, .. } => key,
        }
    }

    /// The value at this moment: literal items return their payload,
    /// derived items query the store.
    pub fn resolve(&self, store: &dyn AttributeStore) -> std::result::Result<String, StoreError> {
        match self {
            Item::Literal { value, .. } => Ok(value.clone()),
            Item::Derived {
                object, attribute, ..
            } => store::resolve(store, object, attribute),
        }
    }
}

fn checked_key(key: String) -> Result<String> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(ZbridgeError::InvalidItem("empty key".to_string()));
    }
    Ok(trimmed.to_string())
}
