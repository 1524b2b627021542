#![cfg(test)]

// Property tests for LocalTable kept inside the crate so they can reach the
// table directly and force hash collisions.

use crate::local_table::tests::TestKey;
use crate::local_table::LocalTable;
use proptest::prelude::*;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

#[derive(Clone, Debug)]
enum Op {
    Set(usize, u32),
    Get(usize),
    Remove(usize),
    // Drop the only strong reference to the key; its slot turns stale.
    Forget(usize),
    // Replace a forgotten key with a fresh identity under the same name.
    Revive(usize),
}

fn arb_scenario() -> impl Strategy<Value = (Vec<u32>, Vec<Op>)> {
    // Few distinct home slots so runs, wrap-around and relocation happen.
    proptest::collection::vec(0u32..8, 1..=24).prop_flat_map(|hashes| {
        let n = hashes.len();
        let op = prop_oneof![
            4 => (0..n, any::<u32>()).prop_map(|(i, v)| Op::Set(i, v)),
            3 => (0..n).prop_map(Op::Get),
            2 => (0..n).prop_map(Op::Remove),
            2 => (0..n).prop_map(Op::Forget),
            1 => (0..n).prop_map(Op::Revive),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (hashes.clone(), ops))
    })
}

fn spread(h: u32, i: usize) -> u32 {
    // Same low bits for equal `h`, different high bits per key.
    h | ((i as u32) << 20)
}

// Property: state-machine equivalence against a HashMap of live keys.
// Invariants exercised across random operation sequences:
// - Every live key maps to its last stored value; removed keys miss.
// - Forgotten keys never resurface, even after a fresh key reuses the name.
// - Capacity is a power of two, never shrinks, and len <= threshold.
// - len counts exactly the occupied slots.
// - After a full sweep, no value of a forgotten key is still owned by the table.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((hashes, ops) in arb_scenario()) {
        let mut keys: Vec<Option<Arc<TestKey>>> = hashes
            .iter()
            .enumerate()
            .map(|(i, &h)| Some(Arc::new(TestKey { hash: spread(h, i), inherits: false })))
            .collect();
        let mut model: HashMap<usize, u32> = HashMap::new();
        let mut forgotten: Vec<std::rc::Weak<u32>> = Vec::new();
        let mut stored: HashMap<usize, Rc<u32>> = HashMap::new();
        let mut table: Option<LocalTable<Rc<u32>>> = None;
        let mut capacity = 0usize;

        for op in ops {
            match op {
                Op::Set(i, v) => {
                    if let Some(k) = &keys[i] {
                        let value = Rc::new(v);
                        stored.insert(i, value.clone());
                        match table.as_mut() {
                            Some(t) => t.set(k, value),
                            None => table = Some(LocalTable::new(k, value)),
                        }
                        model.insert(i, v);
                    }
                }
                Op::Get(i) => {
                    if let (Some(k), Some(t)) = (&keys[i], table.as_mut()) {
                        prop_assert_eq!(t.get(k).map(|v| **v), model.get(&i).copied());
                    }
                }
                Op::Remove(i) => {
                    if let (Some(k), Some(t)) = (&keys[i], table.as_mut()) {
                        t.remove(k);
                    }
                    model.remove(&i);
                    stored.remove(&i);
                }
                Op::Forget(i) => {
                    if keys[i].take().is_some() {
                        model.remove(&i);
                        if let Some(v) = stored.remove(&i) {
                            forgotten.push(Rc::downgrade(&v));
                        }
                    }
                }
                Op::Revive(i) => {
                    if keys[i].is_none() {
                        let k = Arc::new(TestKey { hash: spread(hashes[i], i), inherits: false });
                        if let Some(t) = table.as_mut() {
                            prop_assert!(t.get(&k).is_none(), "fresh identity sees no old value");
                        }
                        keys[i] = Some(k);
                    }
                }
            }

            if let Some(t) = table.as_mut() {
                drop(t.take_reclaimed());
                prop_assert!(t.capacity().is_power_of_two());
                prop_assert!(t.capacity() >= capacity, "capacity shrank");
                capacity = t.capacity();
                prop_assert!(t.len() <= t.threshold());
                prop_assert_eq!(t.len(), t.occupied());
            }
        }

        if let Some(t) = table.as_mut() {
            for (i, k) in keys.iter().enumerate() {
                if let Some(k) = k {
                    prop_assert_eq!(t.get(k).map(|v| **v), model.get(&i).copied());
                }
            }
            t.sweep();
            prop_assert_eq!(t.stale_count(), 0);
            prop_assert_eq!(t.len(), model.len());
            drop(t.take_reclaimed());
        }
        // Stored values for forgotten keys are released once swept.
        for w in &forgotten {
            prop_assert!(w.upgrade().is_none());
        }
    }
}
