//! weak-tls: per-thread variables whose values are reclaimed when either
//! the thread or the variable goes away.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: many independent `ThreadLocal` handles, each with one private
//!   value per thread, without leaking values of handles that were dropped
//!   while threads that used them keep running.
//! - Layers:
//!   - `LocalTable<V>`: open-addressed, linear-probing table owned by one
//!     thread. Keys are `Weak` references to identities; a key that no
//!     longer upgrades marks its slot stale, and stale slots are reclaimed
//!     lazily while probing, by a short scan after inserts, and by a full
//!     sweep before the table grows.
//!   - `storage`: two per-thread table slots (plain and inheritable),
//!     created by the first store on a thread and dropped with it.
//!   - `ThreadLocal<T>` / `InheritableThreadLocal<T>`: public handles that
//!     own the identity (`Arc`) and type the erased values.
//!
//! Constraints
//! - A table is only ever touched by its owning thread: no locks, no
//!   atomics beyond the key's reference counts.
//! - The only shared state is the hash-code counter, advanced with one
//!   relaxed `fetch_add` per identity.
//! - Table operations are total. A missing entry is a normal outcome and
//!   growth is unconditional.
//!
//! Hashing
//! - Identities receive hash codes spaced by `0x61c8_8647`, so consecutive
//!   identities land on distinct home slots for any power-of-two capacity.
//! - Each slot stores its key's hash code; relocation and resize never
//!   upgrade the key.
//! - Identity match is by address of the key allocation. The `Weak` in a
//!   slot keeps that allocation from being reused while the slot exists.
//!
//! Reentrancy policy and drop ordering
//! - Initializers, child derivations and value destructors are user code
//!   and may themselves use thread-locals. None of them runs while the
//!   calling thread's table is borrowed:
//!   - initializers run before the store;
//!   - child derivations run against a snapshot of the parent table;
//!   - values released by the table are parked and dropped after the
//!     borrow ends (unlink before drop).
//! - Accesses made while the thread's storage is being torn down degrade:
//!   `get` returns a fresh initial value without storing it, `set` drops
//!   its value, `remove` does nothing.
//!
//! Notes and non-goals
//! - No cross-thread visibility: a thread never observes another thread's
//!   values, except the one-time copy made when an inheriting thread is
//!   spawned.
//! - Capacity never shrinks.
//! - No ordering among entries.

mod hash_code;
mod identity;
mod inheritable;
mod local_table;
mod local_table_proptest;
mod storage;
mod thread_local;

// Public surface
pub use identity::{Builder, LocalError};
pub use inheritable::{spawn, spawn_with, Inheritance, InheritableThreadLocal};
pub use storage::{inheritable_table_stats, local_table_stats, TableStats};
pub use thread_local::ThreadLocal;
