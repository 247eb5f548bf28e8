// src/data/value.rs

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque, dynamically typed payload passed between nodes.
///
/// Values are cheap to clone (shared behind an `Arc`); node computations
/// downcast to the concrete types they expect. The engine never inspects
/// the payload itself, with one exception: the distinguished null sentinel
/// ([`Value::null`]), which datasets refuse to save and which fails a run
/// when a node produces it for a declared output.
#[derive(Clone)]
pub struct Value(Arc<dyn Any + Send + Sync>);

/// Private sentinel type behind [`Value::null`].
struct Null;

impl Value {
    /// Wrap an arbitrary payload.
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// The null sentinel: "this node produced nothing".
    pub fn null() -> Self {
        Self(Arc::new(Null))
    }

    /// Whether this value is the null sentinel.
    pub fn is_null(&self) -> bool {
        self.0.is::<Null>()
    }

    /// Borrow the payload as a concrete type, if it is one.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("Value(null)")
        } else {
            f.write_str("Value(..)")
        }
    }
}
