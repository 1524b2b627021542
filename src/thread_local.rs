use crate::identity::{Builder, Identity, LocalError, LocalValue};
use crate::storage::{self, LOCALS};
use core::any::Any;
use core::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// A variable with one independent value per thread.
///
/// Each thread sees its own value; the first `get` on a thread without a
/// value runs the initializer. Dropping every handle of a `ThreadLocal`
/// makes its per-thread values unreachable; they are reclaimed by later
/// activity on each thread that stored one, or when that thread exits.
///
/// ```
/// use weak_tls::ThreadLocal;
///
/// let counter = ThreadLocal::with_initial(|| 0u32);
/// counter.set(*counter.get() + 1);
/// assert_eq!(*counter.get(), 1);
///
/// let seen = std::thread::scope(|s| s.spawn(|| *counter.get()).join().unwrap());
/// assert_eq!(seen, 0);
/// ```
pub struct ThreadLocal<T: 'static> {
    key: Arc<Identity<T>>,
}

impl<T: Default + 'static> ThreadLocal<T> {
    pub fn new() -> Self {
        Self::with_initial(T::default)
    }
}

impl<T: Default + 'static> Default for ThreadLocal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> ThreadLocal<T> {
    pub fn with_initial<F>(f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::from_identity(Identity::from_parts(Box::new(f), None))
    }

    pub fn builder() -> Builder<T> {
        Builder::new()
    }

    pub(crate) fn from_identity(identity: Identity<T>) -> Self {
        Self {
            key: Arc::new(identity),
        }
    }

    /// This thread's value, initializing it first if the thread has none.
    pub fn get(&self) -> Rc<T> {
        if let Some(value) = self.try_get() {
            return value;
        }
        // The initializer runs with no table borrowed and may reenter.
        let value = Rc::new(self.key.initial_value());
        let erased: LocalValue = value.clone();
        storage::store(&LOCALS, &self.key, erased);
        value
    }

    /// This thread's value, if one was stored and not removed.
    pub fn try_get(&self) -> Option<Rc<T>> {
        storage::lookup(&LOCALS, &self.key).map(downcast::<T>)
    }

    pub fn set(&self, value: T) {
        let erased: LocalValue = Rc::new(value);
        storage::store(&LOCALS, &self.key, erased);
    }

    /// Forget this thread's value; the next `get` initializes again.
    pub fn remove(&self) {
        storage::remove(&LOCALS, &self.key);
    }

    /// Plain thread-locals are never inherited by spawned threads.
    pub fn child_value(&self, _parent: &T) -> Result<T, LocalError> {
        Err(LocalError::Unsupported)
    }
}

fn downcast<T: 'static>(value: Rc<dyn Any>) -> Rc<T> {
    match value.downcast::<T>() {
        Ok(value) => value,
        Err(_) => unreachable!("thread-local value type is fixed by its identity"),
    }
}

impl<T: 'static> Clone for ThreadLocal<T> {
    /// The clone names the same variable.
    fn clone(&self) -> Self {
        Self {
            key: Arc::clone(&self.key),
        }
    }
}

impl<T: 'static> PartialEq for ThreadLocal<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.key, &other.key)
    }
}

impl<T: 'static> Eq for ThreadLocal<T> {}

impl<T: 'static> fmt::Debug for ThreadLocal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ThreadLocal").field(&self.key).finish()
    }
}
