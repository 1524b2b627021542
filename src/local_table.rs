//! LocalTable: per-thread open-addressed table keyed by weak identities.
//!
//! Keys are `Weak<dyn Key<V>>`. A slot whose key can no longer be upgraded
//! is stale; stale slots are reclaimed lazily by the probing operations, by
//! a logarithmic scan after each insert, and by a full sweep before the
//! table grows. Values released by the table are parked in `reclaimed`
//! rather than dropped in place, so the owner can drop them after it stops
//! borrowing the table.

use crate::identity::LocalError;
use core::fmt;
use core::mem;
use core::ptr;
use std::sync::{Arc, Weak};

pub(crate) const INITIAL_CAPACITY: usize = 16;

/// The identity behind a table key.
pub(crate) trait Key<V>: Send + Sync {
    fn hash_code(&self) -> u32;

    /// Value a forked child table starts with. `Err` leaves the key out of
    /// the child table.
    fn child_value(&self, parent: &V) -> Result<V, LocalError>;
}

struct Entry<V> {
    key: Weak<dyn Key<V>>,
    hash: u32, // copied from the key so relocation never upgrades it
    value: V,
}

impl<V: 'static> Entry<V> {
    fn new<K: Key<V> + 'static>(key: &Arc<K>, value: V) -> Self {
        let weak: Weak<K> = Arc::downgrade(key);
        let weak: Weak<dyn Key<V>> = weak;
        Self {
            key: weak,
            hash: key.hash_code(),
            value,
        }
    }
}

impl<V> Entry<V> {
    #[inline]
    fn is_stale(&self) -> bool {
        self.key.strong_count() == 0
    }

    #[inline]
    fn refers_to(&self, addr: *const ()) -> bool {
        ptr::addr_eq(self.key.as_ptr(), addr) && !self.is_stale()
    }
}

/// What a probe found at one slot.
enum Probe {
    Empty,
    Match,
    Stale,
    Occupied,
}

pub(crate) struct LocalTable<V> {
    slots: Box<[Option<Entry<V>>]>,
    size: usize, // live + stale entries
    threshold: usize,
    reclaimed: Vec<V>,
}

#[inline]
fn home(hash: u32, len: usize) -> usize {
    hash as usize & (len - 1)
}

#[inline]
fn next_index(i: usize, len: usize) -> usize {
    (i + 1) & (len - 1)
}

#[inline]
fn prev_index(i: usize, len: usize) -> usize {
    i.wrapping_sub(1) & (len - 1)
}

#[inline]
fn threshold_for(len: usize) -> usize {
    len * 2 / 3
}

#[inline]
fn addr_of<K>(key: &Arc<K>) -> *const () {
    Arc::as_ptr(key).cast()
}

fn empty_slots<V>(len: usize) -> Box<[Option<Entry<V>>]> {
    debug_assert!(len.is_power_of_two());
    core::iter::repeat_with(|| None).take(len).collect()
}

impl<V: 'static> LocalTable<V> {
    /// Create a table holding one entry. Tables are only ever created by
    /// their first store.
    pub(crate) fn new<K: Key<V> + 'static>(key: &Arc<K>, value: V) -> Self {
        let mut slots = empty_slots(INITIAL_CAPACITY);
        slots[home(key.hash_code(), INITIAL_CAPACITY)] = Some(Entry::new(key, value));
        Self {
            slots,
            size: 1,
            threshold: threshold_for(INITIAL_CAPACITY),
            reclaimed: Vec::new(),
        }
    }

    /// Build a child thread's table from its parent's: same capacity, one
    /// entry per live key whose `child_value` succeeds.
    pub(crate) fn from_parent(parent: &Self) -> Self {
        let len = parent.slots.len();
        let mut slots = empty_slots(len);
        let mut size = 0;
        for entry in parent.slots.iter().flatten() {
            let Some(key) = entry.key.upgrade() else {
                continue;
            };
            let Ok(value) = key.child_value(&entry.value) else {
                continue;
            };
            let mut h = home(entry.hash, len);
            while slots[h].is_some() {
                h = next_index(h, len);
            }
            slots[h] = Some(Entry {
                key: entry.key.clone(),
                hash: entry.hash,
                value,
            });
            size += 1;
        }
        tracing::debug!(capacity = len, inherited = size, "forked thread-local table");
        Self {
            slots,
            size,
            threshold: threshold_for(len),
            reclaimed: Vec::new(),
        }
    }

    pub(crate) fn get<K: Key<V> + 'static>(&mut self, key: &Arc<K>) -> Option<&V> {
        let index = self.find(key)?;
        self.slots[index].as_ref().map(|e| &e.value)
    }

    pub(crate) fn set<K: Key<V> + 'static>(&mut self, key: &Arc<K>, value: V) {
        let addr = addr_of(key);
        let len = self.slots.len();
        let mut i = home(key.hash_code(), len);
        loop {
            match self.probe(i, addr) {
                Probe::Empty => break,
                Probe::Match => {
                    self.overwrite(i, value);
                    return;
                }
                Probe::Stale => {
                    self.replace_stale_entry(key, value, i);
                    return;
                }
                Probe::Occupied => i = next_index(i, len),
            }
        }

        self.slots[i] = Some(Entry::new(key, value));
        self.size += 1;
        let size = self.size;
        if !self.clean_some_slots(i, size) && size >= self.threshold {
            self.rehash();
        }
    }

    pub(crate) fn remove<K: Key<V> + 'static>(&mut self, key: &Arc<K>) {
        let addr = addr_of(key);
        let len = self.slots.len();
        let mut i = home(key.hash_code(), len);
        loop {
            match self.probe(i, addr) {
                Probe::Empty => return,
                Probe::Match => {
                    self.expunge_stale_entry(i);
                    return;
                }
                Probe::Stale | Probe::Occupied => i = next_index(i, len),
            }
        }
    }
}

impl<V> LocalTable<V> {
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Occupied slots, stale ones included.
    pub(crate) fn len(&self) -> usize {
        self.size
    }

    pub(crate) fn threshold(&self) -> usize {
        self.threshold
    }

    /// Values released since the last call; the caller drops them.
    pub(crate) fn take_reclaimed(&mut self) -> Vec<V> {
        mem::take(&mut self.reclaimed)
    }

    #[inline]
    fn probe(&self, i: usize, addr: *const ()) -> Probe {
        match &self.slots[i] {
            None => Probe::Empty,
            Some(e) if e.refers_to(addr) => Probe::Match,
            Some(e) if e.is_stale() => Probe::Stale,
            Some(_) => Probe::Occupied,
        }
    }

    #[inline]
    fn is_stale_at(&self, i: usize) -> bool {
        matches!(&self.slots[i], Some(e) if e.is_stale())
    }

    fn overwrite(&mut self, i: usize, value: V) {
        if let Some(e) = &mut self.slots[i] {
            let old = mem::replace(&mut e.value, value);
            self.reclaimed.push(old);
        }
    }

    fn find<K>(&mut self, key: &Arc<K>) -> Option<usize>
    where
        K: Key<V>,
    {
        let addr = addr_of(key);
        let i = home(key.hash_code(), self.slots.len());
        match self.probe(i, addr) {
            Probe::Match => Some(i),
            _ => self.find_after_miss(addr, i),
        }
    }

    fn find_after_miss(&mut self, addr: *const (), mut i: usize) -> Option<usize> {
        let len = self.slots.len();
        loop {
            match self.probe(i, addr) {
                Probe::Empty => return None,
                Probe::Match => return Some(i),
                // Expunging may pull a displaced entry into `i`; look again.
                Probe::Stale => {
                    self.expunge_stale_entry(i);
                }
                Probe::Occupied => i = next_index(i, len),
            }
        }
    }

    /// Install `value` for `key` at or near `stale_slot`, the first stale
    /// slot met while probing for `key`, and expunge the stale entries of
    /// the surrounding run.
    fn replace_stale_entry<K>(&mut self, key: &Arc<K>, value: V, stale_slot: usize)
    where
        K: Key<V> + 'static,
        V: 'static,
    {
        let addr = addr_of(key);
        let len = self.slots.len();

        // Earliest stale slot in the run before `stale_slot`.
        let mut slot_to_expunge = stale_slot;
        let mut i = prev_index(stale_slot, len);
        while self.slots[i].is_some() {
            if self.is_stale_at(i) {
                slot_to_expunge = i;
            }
            i = prev_index(i, len);
        }

        let mut i = next_index(stale_slot, len);
        loop {
            match self.probe(i, addr) {
                Probe::Empty => break,
                Probe::Match => {
                    // Move the match forward into the stale slot so the
                    // next lookup stops earlier.
                    self.overwrite(i, value);
                    self.slots.swap(i, stale_slot);
                    if slot_to_expunge == stale_slot {
                        slot_to_expunge = i;
                    }
                    let resume = self.expunge_stale_entry(slot_to_expunge);
                    self.clean_some_slots(resume, len);
                    return;
                }
                Probe::Stale => {
                    if slot_to_expunge == stale_slot {
                        slot_to_expunge = i;
                    }
                }
                Probe::Occupied => {}
            }
            i = next_index(i, len);
        }

        if let Some(old) = self.slots[stale_slot].replace(Entry::new(key, value)) {
            self.reclaimed.push(old.value);
        }
        if slot_to_expunge != stale_slot {
            let resume = self.expunge_stale_entry(slot_to_expunge);
            self.clean_some_slots(resume, len);
        }
    }

    /// Empty `stale_slot`, then walk its run: drop stale entries and move
    /// displaced live entries back toward their home slot. Returns the
    /// index of the empty slot that ends the run.
    fn expunge_stale_entry(&mut self, stale_slot: usize) -> usize {
        let len = self.slots.len();
        if let Some(e) = self.slots[stale_slot].take() {
            self.reclaimed.push(e.value);
            self.size -= 1;
        }

        let mut i = next_index(stale_slot, len);
        while let Some(entry) = self.slots[i].take() {
            if entry.is_stale() {
                self.reclaimed.push(entry.value);
                self.size -= 1;
            } else {
                // Slot `i` is empty now, so this stops at or before `i`.
                let mut h = home(entry.hash, len);
                while self.slots[h].is_some() {
                    h = next_index(h, len);
                }
                self.slots[h] = Some(entry);
            }
            i = next_index(i, len);
        }
        i
    }

    /// Scan about log2(n) slots after `i` for stale entries. Each hit
    /// resets the budget to the full table length. Returns whether
    /// anything was expunged.
    fn clean_some_slots(&mut self, mut i: usize, mut n: usize) -> bool {
        let len = self.slots.len();
        let mut removed = false;
        loop {
            i = next_index(i, len);
            if self.is_stale_at(i) {
                n = len;
                removed = true;
                i = self.expunge_stale_entry(i);
            }
            n >>= 1;
            if n == 0 {
                return removed;
            }
        }
    }

    fn rehash(&mut self) {
        self.expunge_stale_entries();
        if self.size >= self.threshold - self.threshold / 4 {
            self.resize();
        } else {
            tracing::trace!(
                capacity = self.slots.len(),
                live = self.size,
                "rehash reclaimed enough room without growing"
            );
        }
    }

    fn expunge_stale_entries(&mut self) {
        for j in 0..self.slots.len() {
            if self.is_stale_at(j) {
                self.expunge_stale_entry(j);
            }
        }
    }

    /// Double the capacity and reinsert live entries in slot order.
    fn resize(&mut self) {
        let old_len = self.slots.len();
        let new_len = old_len * 2;
        let mut slots = empty_slots(new_len);
        let mut count = 0;
        for entry in Vec::from(mem::take(&mut self.slots)).into_iter().flatten() {
            if entry.is_stale() {
                self.reclaimed.push(entry.value);
                continue;
            }
            let mut h = home(entry.hash, new_len);
            while slots[h].is_some() {
                h = next_index(h, new_len);
            }
            slots[h] = Some(entry);
            count += 1;
        }
        tracing::trace!(old_len, new_len, live = count, "resized thread-local table");
        self.slots = slots;
        self.size = count;
        self.threshold = threshold_for(new_len);
    }
}

impl<V: Clone> Clone for LocalTable<V> {
    /// Slot-for-slot copy; reclaimed values stay with `self`.
    fn clone(&self) -> Self {
        let slots = self
            .slots
            .iter()
            .map(|slot| {
                slot.as_ref().map(|e| Entry {
                    key: e.key.clone(),
                    hash: e.hash,
                    value: e.value.clone(),
                })
            })
            .collect();
        Self {
            slots,
            size: self.size,
            threshold: self.threshold,
            reclaimed: Vec::new(),
        }
    }
}

impl<V> fmt::Debug for LocalTable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTable")
            .field("capacity", &self.slots.len())
            .field("len", &self.size)
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
impl<V> LocalTable<V> {
    pub(crate) fn index_of<K: Key<V>>(&self, key: &Arc<K>) -> Option<usize> {
        let addr = addr_of(key);
        self.slots
            .iter()
            .position(|slot| matches!(slot, Some(e) if e.refers_to(addr)))
    }

    pub(crate) fn stale_count(&self) -> usize {
        (0..self.slots.len()).filter(|&i| self.is_stale_at(i)).count()
    }

    pub(crate) fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub(crate) fn sweep(&mut self) {
        self.expunge_stale_entries();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::rc::Rc;

    /// Key with a caller-chosen hash code.
    pub(crate) struct TestKey {
        pub(crate) hash: u32,
        pub(crate) inherits: bool,
    }

    impl Key<Rc<u32>> for TestKey {
        fn hash_code(&self) -> u32 {
            self.hash
        }

        fn child_value(&self, parent: &Rc<u32>) -> Result<Rc<u32>, LocalError> {
            if self.inherits {
                Ok(Rc::new(**parent + 1))
            } else {
                Err(LocalError::Unsupported)
            }
        }
    }

    pub(crate) fn key(hash: u32) -> Arc<TestKey> {
        Arc::new(TestKey {
            hash,
            inherits: false,
        })
    }

    fn value_of(t: &mut LocalTable<Rc<u32>>, k: &Arc<TestKey>) -> Option<u32> {
        t.get(k).map(|v| **v)
    }

    /// Invariant: a new table has 16 slots, threshold 10, and its first entry
    /// sits at the key's home slot.
    #[test]
    fn first_entry_lands_on_home_slot() {
        let k = key(0x25);
        let t = LocalTable::new(&k, Rc::new(1));
        assert_eq!(t.capacity(), 16);
        assert_eq!(t.threshold(), 10);
        assert_eq!(t.len(), 1);
        assert_eq!(t.index_of(&k), Some(5));
    }

    /// Invariant: keys sharing a home slot stay independently retrievable in
    /// either insertion order, and overwrites do not add entries.
    #[test]
    fn colliding_keys_resolve_by_linear_probing() {
        let (a, b, c) = (key(3), key(3 + 16), key(3 + 32));
        let mut t = LocalTable::new(&b, Rc::new(20));
        t.set(&a, Rc::new(10));
        t.set(&c, Rc::new(30));
        assert_eq!(t.index_of(&b), Some(3));
        assert_eq!(t.index_of(&a), Some(4));
        assert_eq!(t.index_of(&c), Some(5));

        t.set(&a, Rc::new(11));
        assert_eq!(t.len(), 3);
        assert_eq!(value_of(&mut t, &a), Some(11));
        assert_eq!(value_of(&mut t, &b), Some(20));
        assert_eq!(value_of(&mut t, &c), Some(30));
        assert_eq!(t.take_reclaimed().len(), 1, "overwritten value is parked");
    }

    /// Invariant: the probe wraps around the end of the slot array.
    #[test]
    fn probing_wraps_at_capacity() {
        let (a, b) = (key(15), key(31));
        let mut t = LocalTable::new(&a, Rc::new(1));
        t.set(&b, Rc::new(2));
        assert_eq!(t.index_of(&b), Some(0));
        assert_eq!(value_of(&mut t, &b), Some(2));
    }

    /// Invariant: remove empties the slot, shifts the rest of the run back,
    /// and a later lookup misses.
    #[test]
    fn remove_compacts_the_run() {
        let (a, b, c) = (key(7), key(7 + 16), key(7 + 32));
        let mut t = LocalTable::new(&a, Rc::new(1));
        t.set(&b, Rc::new(2));
        t.set(&c, Rc::new(3));

        t.remove(&a);
        assert_eq!(t.len(), 2);
        assert_eq!(value_of(&mut t, &a), None);
        assert_eq!(t.index_of(&b), Some(7));
        assert_eq!(t.index_of(&c), Some(8));
        assert_eq!(t.take_reclaimed().iter().map(|v| **v).collect::<Vec<_>>(), vec![1]);

        // Removing an absent key is a no-op.
        t.remove(&a);
        assert_eq!(t.len(), 2);
    }

    /// Invariant: a lookup that walks over a stale slot expunges it and still
    /// finds a key further down the run.
    #[test]
    fn lookup_expunges_stale_slots_on_the_way() {
        let (a, b) = (key(2), key(2 + 16));
        let mut t = LocalTable::new(&a, Rc::new(1));
        t.set(&b, Rc::new(2));
        drop(a);
        assert_eq!(t.stale_count(), 1);

        assert_eq!(value_of(&mut t, &b), Some(2));
        assert_eq!(t.stale_count(), 0);
        assert_eq!(t.len(), 1);
        assert_eq!(t.index_of(&b), Some(2), "relocated to its home slot");
    }

    /// Invariant: set on a run with a stale slot before the existing entry
    /// overwrites the entry and swaps it into the stale position.
    #[test]
    fn replace_stale_entry_swaps_existing_match_forward() {
        let (a, b, c) = (key(4), key(4 + 16), key(4 + 32));
        let mut t = LocalTable::new(&a, Rc::new(1));
        t.set(&b, Rc::new(2));
        t.set(&c, Rc::new(3));
        drop(b);

        t.set(&c, Rc::new(33));
        assert_eq!(t.stale_count(), 0);
        assert_eq!(t.len(), 2);
        assert_eq!(t.index_of(&a), Some(4));
        assert_eq!(t.index_of(&c), Some(5));
        assert_eq!(value_of(&mut t, &c), Some(33));
    }

    /// Invariant: set of a new key that meets a stale slot takes the slot
    /// over and expunges the earlier stale entries of the run.
    #[test]
    fn replace_stale_entry_installs_new_key() {
        let (a, b, c) = (key(9), key(9 + 16), key(9 + 32));
        let mut t = LocalTable::new(&a, Rc::new(1));
        t.set(&b, Rc::new(2));
        drop(a);
        drop(b);
        assert_eq!(t.stale_count(), 2);

        t.set(&c, Rc::new(3));
        assert_eq!(t.index_of(&c), Some(9));
        assert_eq!(t.stale_count(), 0);
        assert_eq!(t.len(), 1);
        assert_eq!(t.take_reclaimed().len(), 2);
    }

    /// Invariant: the post-insert scan reclaims stale slots just past the
    /// insertion point without any lookup touching them.
    #[test]
    fn insert_scan_reclaims_nearby_garbage() {
        let (a, b) = (key(1), key(2));
        let mut t = LocalTable::new(&a, Rc::new(1));
        t.set(&b, Rc::new(2));
        drop(b);

        let c = key(0);
        t.set(&c, Rc::new(3));
        assert_eq!(t.stale_count(), 0);
        assert_eq!(t.len(), 2);
    }

    /// Invariant: a stale hit resets the scan budget to the table length, so
    /// garbage beyond the initial log2(n) window is still reached.
    #[test]
    fn clean_some_slots_extends_budget_on_hit() {
        let (live, near, far) = (key(0), key(1), key(6));
        let mut t = LocalTable::new(&live, Rc::new(0));
        t.set(&near, Rc::new(1));
        t.set(&far, Rc::new(6));
        drop(near);
        drop(far);
        assert_eq!(t.stale_count(), 2);

        assert!(t.clean_some_slots(0, 3));
        assert_eq!(t.stale_count(), 0);
        assert_eq!(t.len(), 1);
        assert_eq!(t.take_reclaimed().len(), 2);
    }

    /// Invariant: when set meets a stale slot, an earlier stale slot of the
    /// same run found by the backward scan anchors the cleanup, and the run
    /// ends up with no stale entries.
    #[test]
    fn replace_stale_entry_expunges_from_earlier_stale_slot() {
        let (a, b, c) = (key(3), key(4), key(5));
        let mut t = LocalTable::new(&a, Rc::new(3));
        t.set(&b, Rc::new(4));
        t.set(&c, Rc::new(5));
        drop(a);
        drop(b);
        assert_eq!(t.stale_count(), 2);

        let d = key(4 + 16);
        t.set(&d, Rc::new(20));
        assert_eq!(t.stale_count(), 0);
        assert_eq!(t.len(), 2);
        assert_eq!(t.len(), t.occupied());
        assert_eq!(t.index_of(&d), Some(4));
        assert_eq!(value_of(&mut t, &c), Some(5));
        assert_eq!(value_of(&mut t, &d), Some(20));
    }

    /// Invariant: reaching the threshold with only live entries doubles the
    /// capacity, and every entry stays retrievable.
    #[test]
    fn threshold_triggers_resize() {
        let keys: Vec<_> = (0..11u32).map(|i| key(i.wrapping_mul(0x61c8_8647))).collect();
        let mut t = LocalTable::new(&keys[0], Rc::new(0));
        for (i, k) in keys.iter().enumerate().skip(1).take(8) {
            t.set(k, Rc::new(i as u32));
        }
        assert_eq!(t.capacity(), 16);
        assert_eq!(t.len(), 9);

        for (i, k) in keys.iter().enumerate().skip(9) {
            t.set(k, Rc::new(i as u32));
        }
        assert_eq!(t.capacity(), 32);
        assert_eq!(t.threshold(), 21);
        assert_eq!(t.len(), 11);
        for (i, k) in keys.iter().enumerate() {
            assert_eq!(value_of(&mut t, k), Some(i as u32));
            assert!(t.len() <= t.threshold());
        }
    }

    /// Invariant: when enough entries are stale, reaching the threshold
    /// sweeps them instead of growing.
    #[test]
    fn stale_entries_prevent_growth() {
        let keys: Vec<_> = (0..11u32).map(|i| key(i.wrapping_mul(0x61c8_8647))).collect();
        let mut t = LocalTable::new(&keys[0], Rc::new(0));
        let mut keys = keys.into_iter();
        let first = keys.next().unwrap();
        let mut kept = vec![first];
        for (i, k) in keys.enumerate() {
            t.set(&k, Rc::new(i as u32 + 1));
            if i % 2 == 0 {
                drop(k);
            } else {
                kept.push(k);
            }
            assert!(t.len() <= t.threshold());
        }
        assert_eq!(t.capacity(), 16);
        t.sweep();
        assert_eq!(t.len(), kept.len());
        for k in &kept {
            assert!(value_of(&mut t, k).is_some());
        }
    }

    /// Invariant: capacity stays a power of two and never shrinks under
    /// heavy churn.
    #[test]
    fn capacity_never_shrinks() {
        let keys: Vec<_> = (0..100u32).map(|i| key(i.wrapping_mul(0x61c8_8647))).collect();
        let mut t = LocalTable::new(&keys[0], Rc::new(0));
        for (i, k) in keys.iter().enumerate() {
            t.set(k, Rc::new(i as u32));
        }
        let grown = t.capacity();
        assert!(grown >= 128 && grown.is_power_of_two());
        for k in &keys[1..] {
            t.remove(k);
        }
        assert_eq!(t.len(), 1);
        assert_eq!(t.capacity(), grown);
    }

    /// Invariant: once the key is gone and the slot is expunged, the table
    /// holds no strong path to the value.
    #[test]
    fn expunged_value_becomes_unreachable() {
        let payload = Rc::new(5u32);
        let watch = Rc::downgrade(&payload);
        let doomed = key(6);
        let keep = key(6 + 16);
        let mut t = LocalTable::new(&doomed, payload);
        t.set(&keep, Rc::new(0));
        drop(doomed);
        assert!(watch.upgrade().is_some(), "stale slot still owns the value");

        t.get(&keep);
        assert!(watch.upgrade().is_some(), "parked until the owner drops it");
        drop(t.take_reclaimed());
        assert!(watch.upgrade().is_none());
    }

    /// Invariant: a forked table keeps the capacity, drops stale keys and
    /// keys that refuse inheritance, and derives values through the key.
    #[test]
    fn fork_inherits_live_supported_keys() {
        let inheriting = Arc::new(TestKey {
            hash: 3,
            inherits: true,
        });
        let plain = key(3 + 16);
        let doomed = Arc::new(TestKey {
            hash: 4,
            inherits: true,
        });
        let mut parent = LocalTable::new(&plain, Rc::new(1));
        parent.set(&inheriting, Rc::new(10));
        parent.set(&doomed, Rc::new(20));
        drop(doomed);

        let mut child = LocalTable::from_parent(&parent);
        assert_eq!(child.capacity(), parent.capacity());
        assert_eq!(child.len(), 1);
        assert_eq!(child.stale_count(), 0);
        assert_eq!(child.index_of(&inheriting), Some(3), "placed at home slot");
        assert_eq!(child.get(&inheriting).map(|v| **v), Some(11));
        assert!(child.get(&plain).is_none());
        assert_eq!(parent.get(&inheriting).map(|v| **v), Some(10));
    }

    /// Invariant: a clone shares keys and values but owns its slots.
    #[test]
    fn clone_is_independent() {
        let (a, b) = (key(1), key(2));
        let mut t = LocalTable::new(&a, Rc::new(1));
        let mut copy = t.clone();
        t.set(&b, Rc::new(2));
        copy.remove(&a);
        assert_eq!(value_of(&mut t, &a), Some(1));
        assert_eq!(value_of(&mut copy, &b), None);
        assert_eq!(copy.occupied(), 0);
    }
}
