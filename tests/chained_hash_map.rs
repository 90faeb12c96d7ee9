use chained_hashmap::{
    Capabilities, CapabilitiesBuilder, Capability, ChainedHashMap, Error, FnCapabilities,
    INITIAL_CAPACITY,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

/// Identity hash over `u64` keys; counts destroyed keys and values by id.
#[derive(Clone, Default)]
struct Counting {
    keys: Arc<Mutex<BTreeMap<u64, usize>>>,
    values: Arc<Mutex<BTreeMap<u64, usize>>>,
}

impl Counting {
    fn key_destroys(&self, k: u64) -> usize {
        self.keys.lock().unwrap().get(&k).copied().unwrap_or(0)
    }
    fn value_destroys(&self, v: u64) -> usize {
        self.values.lock().unwrap().get(&v).copied().unwrap_or(0)
    }
    fn total(&self) -> (usize, usize) {
        (
            self.keys.lock().unwrap().values().sum(),
            self.values.lock().unwrap().values().sum(),
        )
    }
}

impl Capabilities<u64, u64> for Counting {
    fn hash(&self, key: &u64) -> u64 {
        *key
    }
    fn equals(&self, a: &u64, b: &u64) -> bool {
        a == b
    }
    fn destroy_key(&self, key: u64) {
        *self.keys.lock().unwrap().entry(key).or_default() += 1;
    }
    fn destroy_value(&self, value: u64) {
        *self.values.lock().unwrap().entry(value).or_default() += 1;
    }
}

fn noop_numeric() -> CapabilitiesBuilder<u64, u64> {
    CapabilitiesBuilder::<u64, u64>::new()
        .hash(|k| *k)
        .equals(|a, b| a == b)
        .destroy_key(|_| {})
        .destroy_value(|_| {})
}

#[test]
fn example_scenario() {
    init_tracing();
    let m = ChainedHashMap::try_from_builder(noop_numeric()).expect("all capabilities");
    m.put(1, 2).unwrap();
    assert_eq!(*m.get(&1).expect("present"), 2);
    m.put(1, 5).unwrap();
    assert_eq!(*m.get(&1).expect("present"), 5);
    m.remove(&1);
    assert!(m.get(&1).is_none());
    m.destroy();
}

#[test]
fn round_trip_many_keys() {
    let m: ChainedHashMap<String, usize> = ChainedHashMap::new();
    for i in 0..500 {
        m.put(format!("key-{i}"), i).unwrap();
    }
    assert_eq!(m.len(), 500);
    for i in 0..500 {
        assert_eq!(m.get(&format!("key-{i}")).as_deref(), Some(&i));
    }
    assert!(m.get(&"key-500".to_string()).is_none());
}

#[test]
fn replace_destroys_old_value_and_duplicate_key_once() {
    let caps = Counting::default();
    let m: ChainedHashMap<u64, u64, Counting> = ChainedHashMap::with_capabilities(caps.clone());
    m.put(7, 100).unwrap();
    m.put(7, 200).unwrap();
    assert_eq!(m.len(), 1);
    assert_eq!(*m.get(&7).unwrap(), 200);
    assert_eq!(caps.value_destroys(100), 1);
    assert_eq!(caps.value_destroys(200), 0);
    // The duplicate key passed to the second put is destroyed; the stored
    // one is still live.
    assert_eq!(caps.key_destroys(7), 1);

    m.destroy();
    assert_eq!(caps.key_destroys(7), 2);
    assert_eq!(caps.value_destroys(200), 1);
}

#[test]
fn absent_remove_is_noop() {
    let caps = Counting::default();
    let m: ChainedHashMap<u64, u64, Counting> = ChainedHashMap::with_capabilities(caps.clone());
    m.put(1, 10).unwrap();
    m.put(17, 170).unwrap();
    assert!(!m.remove(&33));
    assert!(!m.remove(&2));
    assert_eq!(m.len(), 2);
    assert_eq!(caps.total(), (0, 0));
    assert_eq!(*m.get(&1).unwrap(), 10);
    assert_eq!(*m.get(&17).unwrap(), 170);
}

#[test]
fn remove_destroys_key_and_value_once() {
    let caps = Counting::default();
    let m: ChainedHashMap<u64, u64, Counting> = ChainedHashMap::with_capabilities(caps.clone());
    m.put(3, 30).unwrap();
    assert!(m.remove(&3));
    assert!(!m.remove(&3));
    assert_eq!(caps.key_destroys(3), 1);
    assert_eq!(caps.value_destroys(30), 1);
    assert!(m.is_empty());
}

#[test]
fn growth_trigger_at_thirteen_keys() {
    init_tracing();
    let m = ChainedHashMap::try_from_builder(noop_numeric()).unwrap();
    assert_eq!(m.capacity(), INITIAL_CAPACITY);
    for k in 0..12u64 {
        m.put(k, k * 3).unwrap();
    }
    assert_eq!(m.capacity(), 16);
    m.put(12, 36).unwrap();
    assert_eq!(m.capacity(), 32);
    assert_eq!(m.len(), 13);
    for k in 0..13u64 {
        assert_eq!(*m.get(&k).unwrap(), k * 3);
    }
}

#[test]
fn values_survive_repeated_rehash() {
    let m: ChainedHashMap<u64, String> = ChainedHashMap::new();
    let mut seen_capacities = vec![m.capacity()];
    for k in 0..1000u64 {
        m.put(k, format!("v{k}")).unwrap();
        let c = m.capacity();
        if *seen_capacities.last().unwrap() != c {
            assert_eq!(c, seen_capacities.last().unwrap() * 2, "capacity doubles");
            seen_capacities.push(c);
        }
    }
    assert_eq!(m.capacity(), 2048);
    for k in 0..1000u64 {
        assert_eq!(m.get(&k).unwrap().as_str(), format!("v{k}"));
    }
}

#[test]
fn capacity_never_shrinks() {
    let m = ChainedHashMap::try_from_builder(noop_numeric()).unwrap();
    for k in 0..100u64 {
        m.put(k, k).unwrap();
    }
    let grown = m.capacity();
    for k in 0..100u64 {
        assert!(m.remove(&k));
    }
    assert!(m.is_empty());
    assert_eq!(m.capacity(), grown);
}

#[test]
fn destroy_completeness() {
    let caps = Counting::default();
    let m: ChainedHashMap<u64, u64, Counting> = ChainedHashMap::with_capabilities(caps.clone());
    for k in 0..40u64 {
        m.put(k, k + 1000).unwrap();
    }
    for k in 0..10u64 {
        m.remove(&k);
    }
    m.destroy();
    for k in 0..40u64 {
        assert_eq!(caps.key_destroys(k), 1, "key {k}");
        assert_eq!(caps.value_destroys(k + 1000), 1, "value {k}");
    }
    assert_eq!(caps.total(), (40, 40));
}

#[test]
fn drop_destroys_like_destroy() {
    let caps = Counting::default();
    {
        let m: ChainedHashMap<u64, u64, Counting> = ChainedHashMap::with_capabilities(caps.clone());
        m.put(1, 1).unwrap();
        m.put(2, 2).unwrap();
    }
    assert_eq!(caps.total(), (2, 2));
}

#[test]
fn missing_capability_construction() {
    let built = Arc::new(AtomicUsize::new(0));

    let cases: Vec<(CapabilitiesBuilder<u64, u64>, Capability)> = vec![
        (
            CapabilitiesBuilder::<u64, u64>::new()
                .equals(|a, b| a == b)
                .destroy_key(|_| {})
                .destroy_value(|_| {}),
            Capability::Hash,
        ),
        (
            CapabilitiesBuilder::<u64, u64>::new()
                .hash(|k| *k)
                .destroy_key(|_| {})
                .destroy_value(|_| {}),
            Capability::Equals,
        ),
        (
            CapabilitiesBuilder::<u64, u64>::new()
                .hash(|k| *k)
                .equals(|a, b| a == b)
                .destroy_value(|_| {}),
            Capability::DestroyKey,
        ),
        (
            CapabilitiesBuilder::<u64, u64>::new()
                .hash(|k| *k)
                .equals(|a, b| a == b)
                .destroy_key(|_| {}),
            Capability::DestroyValue,
        ),
        (CapabilitiesBuilder::<u64, u64>::new(), Capability::Hash),
    ];

    for (builder, missing) in cases {
        match ChainedHashMap::try_from_builder(builder) {
            Err(e) => assert_eq!(e, Error::MissingCapability(missing)),
            Ok(_) => {
                built.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
    assert_eq!(built.load(Ordering::SeqCst), 0);
}

#[test]
fn closure_capabilities_own_heap_values() {
    let freed = Arc::new(AtomicUsize::new(0));
    let f = freed.clone();
    let caps: FnCapabilities<String, Vec<u8>> = CapabilitiesBuilder::new()
        .hash(|k: &String| k.len() as u64)
        .equals(|a: &String, b: &String| a == b)
        .destroy_key(|k: String| drop(k))
        .destroy_value(move |v: Vec<u8>| {
            f.fetch_add(v.len(), Ordering::SeqCst);
        })
        .build()
        .unwrap();
    let m = ChainedHashMap::with_capabilities(caps);

    // Same length, so every key shares a bucket.
    m.put("aa".to_string(), vec![0; 3]).unwrap();
    m.put("bb".to_string(), vec![0; 5]).unwrap();
    m.put("cc".to_string(), vec![0; 7]).unwrap();
    assert_eq!(m.get(&"bb".to_string()).map(|v| v.len()), Some(5));

    assert!(m.remove(&"aa".to_string()));
    assert_eq!(freed.load(Ordering::SeqCst), 3);
    m.put("cc".to_string(), vec![]).unwrap();
    assert_eq!(freed.load(Ordering::SeqCst), 10);
    drop(m);
    assert_eq!(freed.load(Ordering::SeqCst), 15);
}

#[test]
fn contains_key_and_get_with() {
    let m: ChainedHashMap<&'static str, i32> = ChainedHashMap::default();
    m.put("x", 1).unwrap();
    assert!(m.contains_key(&"x"));
    assert!(!m.contains_key(&"y"));
    assert_eq!(m.get_with(&"x", |v| v + 1), Some(2));
    assert_eq!(m.get_with(&"y", |v| v + 1), None);
}
