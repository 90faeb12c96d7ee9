#![cfg(test)]

// Property tests for ChainTable kept inside the crate so they can reach the
// unsynchronized core directly.

use crate::capability::Capabilities;
use crate::chain_table::{ChainTable, PutOutcome, INITIAL_CAPACITY};
use proptest::prelude::*;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

// Pool-indexed operations so shrinking converges on earlier keys.
#[derive(Clone, Debug)]
enum OpI {
    Put(usize, i32),
    Get(usize),
    Remove(usize),
    Contains(usize),
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=40).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            3 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Put(i, v)),
            1 => idx.clone().prop_map(OpI::Get),
            1 => idx.clone().prop_map(OpI::Remove),
            1 => idx.clone().prop_map(OpI::Contains),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

/// Hashes with a caller-chosen function and counts every destroyed key and
/// value by identity.
struct Tally {
    hash: fn(&String) -> u64,
    keys: RefCell<BTreeMap<String, usize>>,
    values: RefCell<BTreeMap<i32, usize>>,
}

impl Tally {
    fn new(hash: fn(&String) -> u64) -> Self {
        Self {
            hash,
            keys: RefCell::new(BTreeMap::new()),
            values: RefCell::new(BTreeMap::new()),
        }
    }
}

impl Capabilities<String, i32> for Tally {
    fn hash(&self, key: &String) -> u64 {
        (self.hash)(key)
    }
    fn equals(&self, a: &String, b: &String) -> bool {
        a == b
    }
    fn destroy_key(&self, key: String) {
        *self.keys.borrow_mut().entry(key).or_default() += 1;
    }
    fn destroy_value(&self, value: i32) {
        *self.values.borrow_mut().entry(value).or_default() += 1;
    }
}

fn fnv(key: &String) -> u64 {
    key.bytes().fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
        (h ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

fn colliding(_key: &String) -> u64 {
    7
}

fn bump<T: Ord + Clone>(m: &mut BTreeMap<T, usize>, t: &T) {
    *m.entry(t.clone()).or_default() += 1;
}

// Property: state-machine equivalence against std::collections::HashMap.
// - put/get/remove/contains agree with the model after every step.
// - Replace destroys the old value and the duplicate key exactly once.
// - Remove destroys the stored key and value exactly once; absent remove
//   destroys nothing.
// - Capacity starts at 16, only doubles, and len stays within 3/4 of it.
// - Clearing destroys every remaining live entry exactly once.
fn run_state_machine(
    hash: fn(&String) -> u64,
    pool: Vec<String>,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let caps = Tally::new(hash);
    let mut sut: ChainTable<String, i32> = ChainTable::new();
    let mut model: HashMap<String, i32> = HashMap::new();
    let mut want_keys: BTreeMap<String, usize> = BTreeMap::new();
    let mut want_values: BTreeMap<i32, usize> = BTreeMap::new();
    let mut last_capacity = sut.capacity();
    prop_assert_eq!(last_capacity, INITIAL_CAPACITY);

    for op in ops {
        match op {
            OpI::Put(i, v) => {
                let k = pool[i].clone();
                let outcome = sut.put(&caps, k.clone(), v).expect("bucket allocation");
                match model.insert(k.clone(), v) {
                    Some(old) => {
                        prop_assert_eq!(outcome, PutOutcome::Replaced);
                        bump(&mut want_values, &old);
                        bump(&mut want_keys, &k);
                    }
                    None => prop_assert_eq!(outcome, PutOutcome::Inserted),
                }
            }
            OpI::Get(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.get(&caps, k), model.get(k));
            }
            OpI::Remove(i) => {
                let k = pool[i].clone();
                let removed = sut.remove(&caps, &k);
                match model.remove(&k) {
                    Some(old) => {
                        prop_assert!(removed);
                        bump(&mut want_values, &old);
                        bump(&mut want_keys, &k);
                    }
                    None => prop_assert!(!removed),
                }
            }
            OpI::Contains(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.contains_key(&caps, k), model.contains_key(k));
            }
        }

        prop_assert_eq!(sut.len(), model.len());
        let capacity = sut.capacity();
        prop_assert!(capacity == last_capacity || capacity == last_capacity * 2);
        prop_assert!(sut.len() * 4 <= capacity * 3, "load factor exceeded");
        last_capacity = capacity;
        prop_assert_eq!(&*caps.keys.borrow(), &want_keys);
        prop_assert_eq!(&*caps.values.borrow(), &want_values);
    }

    for (k, v) in &model {
        prop_assert_eq!(sut.get(&caps, k), Some(v));
    }

    sut.clear(&caps);
    for (k, v) in model.drain() {
        bump(&mut want_keys, &k);
        bump(&mut want_values, &v);
    }
    prop_assert_eq!(sut.len(), 0);
    prop_assert_eq!(sut.capacity(), last_capacity);
    prop_assert_eq!(&*caps.keys.borrow(), &want_keys);
    prop_assert_eq!(&*caps.values.borrow(), &want_values);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_state_machine(fnv, pool, ops)?;
    }

    // Same invariants with every key in one chain, stressing equality
    // resolution and unlinking at every chain position.
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_state_machine(colliding, pool, ops)?;
    }
}
