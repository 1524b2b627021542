//! Inheritable thread-locals and the thread-creation hook that forks them.
//!
//! A thread spawned through [`spawn`] or [`spawn_with`] (or one that calls
//! [`Inheritance::install`] with a capture taken by its creator) starts with
//! a copy of its creator's inheritable values, each passed through the
//! thread-local's child derivation.

use crate::identity::{Builder, Identity, SharedValue};
use crate::local_table::{Key, LocalTable};
use crate::storage::{self, INHERITABLE};
use core::any::Any;
use core::fmt;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A thread-local whose values are copied into threads spawned through
/// this crate.
///
/// ```
/// use weak_tls::InheritableThreadLocal;
///
/// let request_id = InheritableThreadLocal::with_initial(|| 0u64);
/// request_id.set(7);
///
/// let child = request_id.clone();
/// let seen = weak_tls::spawn(move || *child.get()).join().unwrap();
/// assert_eq!(seen, 7);
/// ```
pub struct InheritableThreadLocal<T: Send + Sync + 'static> {
    key: Arc<Identity<T>>,
}

impl<T: Default + Send + Sync + 'static> InheritableThreadLocal<T> {
    pub fn new() -> Self {
        Self::with_initial(T::default)
    }
}

impl<T: Default + Send + Sync + 'static> Default for InheritableThreadLocal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> InheritableThreadLocal<T> {
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

    pub fn get(&self) -> Arc<T> {
        if let Some(value) = self.try_get() {
            return value;
        }
        let value = Arc::new(self.key.initial_value());
        let erased: SharedValue = value.clone();
        storage::store(&INHERITABLE, &self.key, erased);
        value
    }

    pub fn try_get(&self) -> Option<Arc<T>> {
        storage::lookup(&INHERITABLE, &self.key).map(downcast::<T>)
    }

    pub fn set(&self, value: T) {
        let erased: SharedValue = Arc::new(value);
        storage::store(&INHERITABLE, &self.key, erased);
    }

    pub fn remove(&self) {
        storage::remove(&INHERITABLE, &self.key);
    }

    /// The value a child thread starts with when this thread holds `parent`.
    /// Without a configured derivation the child shares `parent`.
    pub fn child_value(&self, parent: &Arc<T>) -> Arc<T> {
        let erased: SharedValue = parent.clone();
        match Key::<SharedValue>::child_value(&*self.key, &erased) {
            Ok(child) => downcast(child),
            Err(_) => unreachable!("inheritable identities always derive"),
        }
    }
}

fn downcast<T: Send + Sync + 'static>(value: Arc<dyn Any + Send + Sync>) -> Arc<T> {
    match value.downcast::<T>() {
        Ok(value) => value,
        Err(_) => unreachable!("thread-local value type is fixed by its identity"),
    }
}

impl<T: Send + Sync + 'static> Clone for InheritableThreadLocal<T> {
    fn clone(&self) -> Self {
        Self {
            key: Arc::clone(&self.key),
        }
    }
}

impl<T: Send + Sync + 'static> PartialEq for InheritableThreadLocal<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.key, &other.key)
    }
}

impl<T: Send + Sync + 'static> Eq for InheritableThreadLocal<T> {}

impl<T: Send + Sync + 'static> fmt::Debug for InheritableThreadLocal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InheritableThreadLocal").field(&self.key).finish()
    }
}

/// The inheritable values of one thread, forked for another.
///
/// Capture on the creating thread, move into the new thread, and install
/// there before running anything else.
pub struct Inheritance {
    table: Option<LocalTable<SharedValue>>,
}

impl Inheritance {
    /// Fork the calling thread's inheritable table.
    pub fn capture() -> Self {
        // Derivations run against a snapshot so they may use thread-locals.
        let parent = INHERITABLE
            .try_with(|cell| cell.borrow().clone())
            .ok()
            .flatten();
        Self {
            table: parent.as_ref().map(LocalTable::from_parent),
        }
    }

    /// Whether the capture holds anything to install.
    pub fn is_empty(&self) -> bool {
        self.table.is_none()
    }

    /// Make the captured values the calling thread's inheritable values,
    /// replacing any it already had.
    pub fn install(self) {
        let Some(table) = self.table else {
            return;
        };
        let previous = INHERITABLE
            .try_with(|cell| cell.borrow_mut().replace(table))
            .ok()
            .flatten();
        drop(previous);
    }
}

impl fmt::Debug for Inheritance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inheritance").field("table", &self.table).finish()
    }
}

/// `std::thread::spawn`, with the new thread inheriting the caller's
/// inheritable values.
pub fn spawn<F, R>(f: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let inherited = Inheritance::capture();
    thread::spawn(move || {
        inherited.install();
        f()
    })
}

/// `std::thread::Builder::spawn`, with the new thread inheriting the
/// caller's inheritable values.
pub fn spawn_with<F, R>(builder: thread::Builder, f: F) -> io::Result<JoinHandle<R>>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let inherited = Inheritance::capture();
    builder.spawn(move || {
        inherited.install();
        f()
    })
}
