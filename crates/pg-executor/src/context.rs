use std::any::{Any, TypeId};
use std::sync::Arc;

/// Context is an immutable, request-scoped carrier of values keyed by type.
///
/// Values are layered: `with_value` returns a new Context which shares every
/// value of its parent and adds one more on top. The parent is never modified,
/// so a Context handed to a sibling call tree is unaffected by injections made
/// further down another one. Lookups walk from the newest value to the oldest,
/// which means a later injection under the same key shadows an earlier one.
///
/// Keys are marker types. A module that owns a private key type owns the slot:
/// no other code can read or overwrite it by accident.
#[derive(Clone, Debug, Default)]
pub struct Context {
    head: Option<Arc<Node>>,
}

#[derive(Debug)]
struct Node {
    key: TypeId,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Node>>,
}

impl Context {
    /// An empty root Context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a Context which carries `value` under key type `K`.
    pub fn with_value<K, V>(&self, value: V) -> Context
    where
        K: 'static,
        V: Any + Send + Sync,
    {
        Context {
            head: Some(Arc::new(Node {
                key: TypeId::of::<K>(),
                value: Arc::new(value),
                parent: self.head.clone(),
            })),
        }
    }

    /// Look up the value stored under key type `K`.
    ///
    /// Returns None if `K` was never set, or if the nearest value under `K`
    /// is not a `V`.
    pub fn value<K, V>(&self) -> Option<&V>
    where
        K: 'static,
        V: Any + Send + Sync,
    {
        let key = TypeId::of::<K>();
        let mut node = self.head.as_deref();

        while let Some(current) = node {
            if current.key == key {
                return current.value.downcast_ref::<V>();
            }
            node = current.parent.as_deref();
        }
        None
    }
}
