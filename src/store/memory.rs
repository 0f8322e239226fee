//! In-memory reference store.
//!
//! Embedding applications usually expose a fixed set of introspection
//! targets; this store keeps them in a concurrent map so connection
//! handlers can read while the application updates values. Attributes
//! are either plain values or computed closures read at resolution time.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use super::{ArgKind, AttributeStore, AttributeValue, OpArg, StoreError};

type ComputedFn = dyn Fn() -> AttributeValue + Send + Sync;
type OperationFn = dyn Fn(&[OpArg]) -> AttributeValue + Send + Sync;

enum AttributeSlot {
    Value(AttributeValue),
    Computed(Arc<ComputedFn>),
}

struct Operation {
    params: Vec<ArgKind>,
    handler: Arc<OperationFn>,
}

#[derive(Default)]
struct ObjectEntry {
    attributes: HashMap<String, AttributeSlot>,
    operations: HashMap<String, Vec<Operation>>,
}

/// A concurrent object registry implementing [`AttributeStore`].
#[derive(Default)]
pub struct MemoryStore {
    objects: DashMap<String, ObjectEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a plain attribute, creating the object if needed.
    pub fn set_attribute(
        &self,
        object: &str,
        attribute: &str,
        value: impl Into<AttributeValue>,
    ) {
        self.objects
            .entry(object.to_string())
            .or_default()
            .attributes
            .insert(attribute.to_string(), AttributeSlot::Value(value.into()));
    }

    /// Set an attribute whose value is read fresh on every resolution.
    pub fn set_computed_attribute<F>(&self, object: &str, attribute: &str, read: F)
    where
        F: Fn() -> AttributeValue + Send + Sync + 'static,
    {
        self.objects
            .entry(object.to_string())
            .or_default()
            .attributes
            .insert(attribute.to_string(), AttributeSlot::Computed(Arc::new(read)));
    }

    /// Register an operation overload with its declared parameter kinds.
    pub fn register_operation<F>(
        &self,
        object: &str,
        operation: &str,
        params: Vec<ArgKind>,
        handler: F,
    ) where
        F: Fn(&[OpArg]) -> AttributeValue + Send + Sync + 'static,
    {
        self.objects
            .entry(object.to_string())
            .or_default()
            .operations
            .entry(operation.to_string())
            .or_default()
            .push(Operation {
                params,
                handler: Arc::new(handler),
            });
    }

    pub fn remove_object(&self, object: &str) -> bool {
        self.objects.remove(object).is_some()
    }
}

impl AttributeStore for MemoryStore {
    fn attribute(&self, object: &str, attribute: &str) -> Result<AttributeValue, StoreError> {
        let entry = self
            .objects
            .get(object)
            .ok_or_else(|| StoreError::ObjectNotFound(object.to_string()))?;
        match entry.attributes.get(attribute) {
            Some(AttributeSlot::Value(value)) => Ok(value.clone()),
            Some(AttributeSlot::Computed(read)) => Ok(read()),
            None => Err(StoreError::AttributeNotFound {
                object: object.to_string(),
                attribute: attribute.to_string(),
            }),
        }
    }

    fn operation_signatures(
        &self,
        object: &str,
        operation: &str,
    ) -> Result<Vec<Vec<ArgKind>>, StoreError> {
        let entry = self
            .objects
            .get(object)
            .ok_or_else(|| StoreError::ObjectNotFound(object.to_string()))?;
        let overloads = entry
            .operations
            .get(operation)
            .ok_or_else(|| StoreError::OperationNotFound {
                object: object.to_string(),
                operation: operation.to_string(),
            })?;
        Ok(overloads.iter().map(|o| o.params.clone()).collect())
    }

    fn invoke(
        &self,
        object: &str,
        operation: &str,
        args: &[OpArg],
    ) -> Result<AttributeValue, StoreError> {
        let entry = self
            .objects
            .get(object)
            .ok_or_else(|| StoreError::ObjectNotFound(object.to_string()))?;
        let overloads = entry
            .operations
            .get(operation)
            .ok_or_else(|| StoreError::OperationNotFound {
                object: object.to_string(),
                operation: operation.to_string(),
            })?;
        let matching = overloads
            .iter()
            .find(|o| o.params.len() == args.len())
            .ok_or_else(|| StoreError::SignatureMismatch {
                operation: operation.to_string(),
                supplied: args.len(),
            })?;
        Ok((matching.handler)(args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_object_and_attribute() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.attribute("missing", "attr"),
            Err(StoreError::ObjectNotFound(_))
        ));

        store.set_attribute("obj", "Known", 1i64);
        assert!(matches!(
            store.attribute("obj", "Unknown"),
            Err(StoreError::AttributeNotFound { .. })
        ));
    }

    #[test]
    fn computed_attributes_are_read_fresh() {
        use std::sync::atomic::{AtomicI64, Ordering};

        let counter = Arc::new(AtomicI64::new(0));
        let store = MemoryStore::new();
        let reads = Arc::clone(&counter);
        store.set_computed_attribute("obj", "Counter", move || {
            AttributeValue::Int(reads.fetch_add(1, Ordering::SeqCst))
        });

        assert_eq!(store.attribute("obj", "Counter").unwrap(), AttributeValue::Int(0));
        assert_eq!(store.attribute("obj", "Counter").unwrap(), AttributeValue::Int(1));
    }

    #[test]
    fn invokes_matching_overload_by_argument_count() {
        let store = MemoryStore::new();
        store.register_operation("obj", "sum", vec![ArgKind::Long], |args| match args {
            [OpArg::Long(a)] => AttributeValue::Int(*a),
            _ => AttributeValue::Null,
        });
        store.register_operation(
            "obj",
            "sum",
            vec![ArgKind::Long, ArgKind::Long],
            |args| match args {
                [OpArg::Long(a), OpArg::Long(b)] => AttributeValue::Int(a + b),
                _ => AttributeValue::Null,
            },
        );

        let two = store
            .invoke("obj", "sum", &[OpArg::Long(20), OpArg::Long(22)])
            .unwrap();
        assert_eq!(two, AttributeValue::Int(42));

        assert!(matches!(
            store.invoke("obj", "sum", &[]),
            Err(StoreError::SignatureMismatch { supplied: 0, .. })
        ));
    }

    #[test]
    fn missing_operation_is_reported() {
        let store = MemoryStore::new();
        store.set_attribute("obj", "attr", 1i64);
        assert!(matches!(
            store.operation_signatures("obj", "nothing"),
            Err(StoreError::OperationNotFound { .. })
        ));
    }
}
