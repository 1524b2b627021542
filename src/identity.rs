//! Identity: the immutable key behind every thread-local handle.

use crate::hash_code::next_hash_code;
use crate::inheritable::InheritableThreadLocal;
use crate::local_table::Key;
use crate::thread_local::ThreadLocal;
use core::any::Any;
use core::fmt;
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;

pub(crate) type Init<T> = Box<dyn Fn() -> T + Send + Sync>;
pub(crate) type Derive<T> = Box<dyn Fn(&T) -> T + Send + Sync>;

/// Value representation in the plain per-thread table.
pub(crate) type LocalValue = Rc<dyn Any>;
/// Value representation in the inheritable per-thread table; must be able
/// to move into a child thread.
pub(crate) type SharedValue = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocalError {
    /// A thread-local was configured without an initializer.
    #[error("thread-local requires an initializer")]
    MissingInitializer,
    /// Child derivation on a thread-local that does not support inheritance.
    #[error("thread-local does not support inheritance")]
    Unsupported,
}

/// One thread-local slot family. Owned through `Arc` by the public handles;
/// per-thread tables only hold a `Weak` to it.
pub(crate) struct Identity<T> {
    hash: u32,
    init: Init<T>,
    derive: Option<Derive<T>>,
}

impl<T> Identity<T> {
    pub(crate) fn new(
        init: Option<Init<T>>,
        derive: Option<Derive<T>>,
    ) -> Result<Self, LocalError> {
        let init = init.ok_or(LocalError::MissingInitializer)?;
        Ok(Self::from_parts(init, derive))
    }

    pub(crate) fn from_parts(init: Init<T>, derive: Option<Derive<T>>) -> Self {
        Self {
            hash: next_hash_code(),
            init,
            derive,
        }
    }

    pub(crate) fn initial_value(&self) -> T {
        (self.init)()
    }
}

impl<T> fmt::Debug for Identity<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("hash", &format_args!("{:#010x}", self.hash))
            .field("inheritable_derive", &self.derive.is_some())
            .finish()
    }
}

impl<T: 'static> Key<LocalValue> for Identity<T> {
    fn hash_code(&self) -> u32 {
        self.hash
    }

    fn child_value(&self, _parent: &LocalValue) -> Result<LocalValue, LocalError> {
        Err(LocalError::Unsupported)
    }
}

impl<T: Send + Sync + 'static> Key<SharedValue> for Identity<T> {
    fn hash_code(&self) -> u32 {
        self.hash
    }

    fn child_value(&self, parent: &SharedValue) -> Result<SharedValue, LocalError> {
        let Some(derive) = &self.derive else {
            return Ok(Arc::clone(parent));
        };
        match parent.downcast_ref::<T>() {
            Some(value) => Ok(Arc::new(derive(value))),
            None => unreachable!("thread-local value type is fixed by its identity"),
        }
    }
}

/// Configuration for a thread-local handle.
///
/// ```
/// use weak_tls::{LocalError, ThreadLocal};
///
/// let depth = ThreadLocal::builder().initial(|| 0u32).build().unwrap();
/// assert_eq!(*depth.get(), 0);
///
/// let missing = ThreadLocal::<u32>::builder().build();
/// assert_eq!(missing.unwrap_err(), LocalError::MissingInitializer);
/// ```
pub struct Builder<T> {
    init: Option<Init<T>>,
    derive: Option<Derive<T>>,
}

impl<T: 'static> Builder<T> {
    pub fn new() -> Self {
        Self {
            init: None,
            derive: None,
        }
    }

    /// Produces the value `get` returns on threads that hold no entry.
    pub fn initial<F>(mut self, f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.init = Some(Box::new(f));
        self
    }

    /// Maps a parent thread's value to the value a spawned child starts with.
    /// Only inheritable thread-locals accept a derivation.
    pub fn child_value<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> T + Send + Sync + 'static,
    {
        self.derive = Some(Box::new(f));
        self
    }

    pub fn build(self) -> Result<ThreadLocal<T>, LocalError> {
        if self.derive.is_some() {
            return Err(LocalError::Unsupported);
        }
        let identity = Identity::new(self.init, None)?;
        Ok(ThreadLocal::from_identity(identity))
    }

    pub fn build_inheritable(self) -> Result<InheritableThreadLocal<T>, LocalError>
    where
        T: Send + Sync,
    {
        let identity = Identity::new(self.init, self.derive)?;
        Ok(InheritableThreadLocal::from_identity(identity))
    }
}

impl<T: 'static> Default for Builder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Builder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("initial", &self.init.is_some())
            .field("child_value", &self.derive.is_some())
            .finish()
    }
}
