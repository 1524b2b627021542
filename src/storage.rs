//! Per-thread table slots.
//!
//! Every thread owns at most two tables: one for plain thread-locals and
//! one for inheritable thread-locals. Both are created by the first store
//! on that thread and dropped with the thread.
//!
//! Nothing here runs user code while a table is borrowed. Values the table
//! releases are collected from `take_reclaimed` and dropped after the
//! borrow ends, so destructors may freely touch other thread-locals.

use crate::identity::{LocalValue, SharedValue};
use crate::local_table::{Key, LocalTable};
use core::cell::RefCell;
use std::sync::Arc;
use std::thread::LocalKey;

pub(crate) type Slot<V> = LocalKey<RefCell<Option<LocalTable<V>>>>;

thread_local! {
    pub(crate) static LOCALS: RefCell<Option<LocalTable<LocalValue>>> = const { RefCell::new(None) };
    pub(crate) static INHERITABLE: RefCell<Option<LocalTable<SharedValue>>> = const { RefCell::new(None) };
}

/// Current value for `key` on this thread, without initializing it.
pub(crate) fn lookup<V, K>(slot: &'static Slot<V>, key: &Arc<K>) -> Option<V>
where
    V: Clone + 'static,
    K: Key<V> + 'static,
{
    let (found, reclaimed) = slot
        .try_with(|cell| {
            let mut table = cell.borrow_mut();
            match table.as_mut() {
                Some(t) => {
                    let found = t.get(key).cloned();
                    (found, t.take_reclaimed())
                }
                None => (None, Vec::new()),
            }
        })
        .unwrap_or_default();
    drop(reclaimed);
    found
}

/// Store `value` for `key` on this thread, creating the table on first use.
pub(crate) fn store<V, K>(slot: &'static Slot<V>, key: &Arc<K>, value: V)
where
    V: 'static,
    K: Key<V> + 'static,
{
    let reclaimed = slot.try_with(|cell| {
        let mut table = cell.borrow_mut();
        match table.as_mut() {
            Some(t) => {
                t.set(key, value);
                t.take_reclaimed()
            }
            None => {
                tracing::trace!(
                    thread = ?std::thread::current().id(),
                    "allocating thread-local table"
                );
                *table = Some(LocalTable::new(key, value));
                Vec::new()
            }
        }
    });
    match reclaimed {
        Ok(reclaimed) => drop(reclaimed),
        Err(_) => tracing::debug!("thread-local storage destroyed; value dropped"),
    }
}

/// Remove this thread's entry for `key`, if any.
pub(crate) fn remove<V, K>(slot: &'static Slot<V>, key: &Arc<K>)
where
    V: 'static,
    K: Key<V> + 'static,
{
    let reclaimed = slot
        .try_with(|cell| {
            let mut table = cell.borrow_mut();
            match table.as_mut() {
                Some(t) => {
                    t.remove(key);
                    t.take_reclaimed()
                }
                None => Vec::new(),
            }
        })
        .unwrap_or_default();
    drop(reclaimed);
}

/// Snapshot of one per-thread table's geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    /// Slot count; always a power of two.
    pub capacity: usize,
    /// Occupied slots, including entries whose thread-local was dropped but
    /// which have not been reclaimed yet.
    pub len: usize,
    /// Occupancy at which the next insert sweeps and possibly grows.
    pub threshold: usize,
}

fn stats_of<V>(slot: &'static Slot<V>) -> Option<TableStats> {
    slot.try_with(|cell| {
        cell.borrow().as_ref().map(|t| TableStats {
            capacity: t.capacity(),
            len: t.len(),
            threshold: t.threshold(),
        })
    })
    .ok()
    .flatten()
}

/// Geometry of the calling thread's plain table, if it has one.
pub fn local_table_stats() -> Option<TableStats> {
    stats_of(&LOCALS)
}

/// Geometry of the calling thread's inheritable table, if it has one.
pub fn inheritable_table_stats() -> Option<TableStats> {
    stats_of(&INHERITABLE)
}
