//! Trigger argument forwarding.
//!
//! Triggers accept a variadic, dynamically typed argument list; the same list
//! is handed to both hooks and the state-changed notification for the
//! transition it rode in on. Values are stored type-erased behind `Arc`, so
//! cloning an `Args` shares the payloads rather than copying them.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

/// The forwarded arguments of one trigger call.
///
/// Most triggers carry zero or one value, so the backing store keeps two
/// slots inline before spilling to the heap.
///
/// ```
/// use hopscotch::Args;
///
/// let args = Args::new()
///     .with("wss://example".to_string())
///     .with(44100u32);
///
/// assert_eq!(args.get::<String>(0).map(String::as_str), Some("wss://example"));
/// assert_eq!(args.get::<u32>(1), Some(&44100));
/// assert_eq!(args.get::<u32>(0), None); // wrong type
/// ```
#[derive(Clone, Default)]
pub struct Args {
    values: SmallVec<[Arc<dyn Any + Send + Sync>; 2]>,
}

impl Args {
    /// Create an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, returning the list for chaining.
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.values.push(Arc::new(value));
        self
    }

    /// Borrow the value at `index` if it exists and has type `T`.
    pub fn get<T: Any>(&self, index: usize) -> Option<&T> {
        self.values.get(index)?.downcast_ref::<T>()
    }

    /// Number of forwarded values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("len", &self.values.len())
            .finish_non_exhaustive()
    }
}
