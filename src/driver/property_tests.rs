//! Property-Based Tests for Cache Drivers
//!
//! Uses proptest to check the driver contract against the file and memory
//! backends.

use proptest::prelude::*;
use std::cell::Cell;
use std::collections::HashMap;

use serde_json::{json, Value};
use tempfile::TempDir;

use crate::driver::{Driver, FileDriver, MemoryDriver, MemoryStore};

// == Test Configuration ==
const TEST_TTL_MINUTES: i64 = 60;

// == Strategies ==
/// Generates cache keys that are also valid file names
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_-]{1,64}"
}

/// Generates structured JSON values: scalars, arrays and objects
fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 !?]{0,32}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
            prop::collection::hash_map("[a-z]{1,8}", inner, 0..4)
                .prop_map(|m| json!(m)),
        ]
    })
}

/// Generates a sequence of cache operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: Value },
    Retrieve { key: String },
    Forget { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    // a small key space so operations collide
    let key = "[a-d]";
    prop_oneof![
        (key, value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key.prop_map(|key| CacheOp::Retrieve { key }),
        key.prop_map(|key| CacheOp::Forget { key }),
    ]
}

fn file_driver(prefix: &str) -> (TempDir, FileDriver) {
    let dir = tempfile::tempdir().unwrap();
    let driver = FileDriver::new(prefix, dir.path()).unwrap();
    (dir, driver)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Storing a value and retrieving it before expiry returns the same value.
    #[test]
    fn prop_roundtrip_storage(key in valid_key_strategy(), value in value_strategy()) {
        let (_dir, file) = file_driver("prop_");
        let memory = MemoryDriver::new("prop_");

        prop_assert!(file.set(&key, &value, TEST_TTL_MINUTES).unwrap());
        prop_assert!(memory.set(&key, &value, TEST_TTL_MINUTES).unwrap());

        prop_assert_eq!(file.retrieve::<Value>(&key).unwrap(), Some(value.clone()));
        prop_assert_eq!(memory.retrieve::<Value>(&key).unwrap(), Some(value));
    }

    // forget succeeds twice in a row and leaves the key absent.
    #[test]
    fn prop_idempotent_forget(key in valid_key_strategy(), value in value_strategy()) {
        let (_dir, file) = file_driver("prop_");

        file.set(&key, &value, TEST_TTL_MINUTES).unwrap();
        prop_assert!(file.forget(&key).unwrap());
        prop_assert!(!file.exists(&key).unwrap());
        prop_assert!(file.forget(&key).unwrap());
        prop_assert!(!file.exists(&key).unwrap());
    }

    // Drivers with different prefixes over one medium never see each other.
    #[test]
    fn prop_namespace_isolation(key in valid_key_strategy(), value in value_strategy()) {
        let dir = tempfile::tempdir().unwrap();
        let file_a = FileDriver::new("tenant_a_", dir.path()).unwrap();
        let file_b = FileDriver::new("tenant_b_", dir.path()).unwrap();
        let store = MemoryStore::new();
        let memory_a = MemoryDriver::with_store("tenant_a_", store.clone());
        let memory_b = MemoryDriver::with_store("tenant_b_", store);

        file_a.set(&key, &value, TEST_TTL_MINUTES).unwrap();
        memory_a.set(&key, &value, TEST_TTL_MINUTES).unwrap();

        prop_assert_eq!(file_b.retrieve::<Value>(&key).unwrap(), None);
        prop_assert_eq!(memory_b.retrieve::<Value>(&key).unwrap(), None);
    }

    // A miss computes exactly once; the next call returns the stored value.
    #[test]
    fn prop_read_through(key in valid_key_strategy(), first in value_strategy(), second in value_strategy()) {
        let (_dir, file) = file_driver("prop_");
        let calls = Cell::new(0);

        let got = file.remember(&key, TEST_TTL_MINUTES, || { calls.set(calls.get() + 1); first.clone() }).unwrap();
        prop_assert_eq!(&got, &first);

        let again = file.remember(&key, TEST_TTL_MINUTES, || { calls.set(calls.get() + 1); second.clone() }).unwrap();
        prop_assert_eq!(again, first);
        prop_assert_eq!(calls.get(), 1);
    }

    // Any sequence of operations matches a plain HashMap model.
    #[test]
    fn prop_matches_model(ops in prop::collection::vec(cache_op_strategy(), 1..40)) {
        let (_dir, file) = file_driver("model_");
        let memory = MemoryDriver::new("model_");
        let mut model: HashMap<String, Value> = HashMap::new();

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    prop_assert!(file.set(&key, &value, TEST_TTL_MINUTES).unwrap());
                    prop_assert!(memory.set(&key, &value, TEST_TTL_MINUTES).unwrap());
                    model.insert(key, value);
                }
                CacheOp::Retrieve { key } => {
                    let expected = model.get(&key).cloned();
                    prop_assert_eq!(file.retrieve::<Value>(&key).unwrap(), expected.clone());
                    prop_assert_eq!(memory.retrieve::<Value>(&key).unwrap(), expected);
                }
                CacheOp::Forget { key } => {
                    prop_assert!(file.forget(&key).unwrap());
                    prop_assert!(memory.forget(&key).unwrap());
                    model.remove(&key);
                }
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    // Zero and negative TTLs are accepted and read back as absent.
    #[test]
    fn prop_non_positive_ttl_is_absent(key in valid_key_strategy(), ttl in -1000i64..=0) {
        let (_dir, file) = file_driver("prop_");
        let memory = MemoryDriver::new("prop_");

        prop_assert!(file.set(&key, &"value", ttl).unwrap());
        prop_assert!(memory.set(&key, &"value", ttl).unwrap());

        prop_assert!(!file.exists(&key).unwrap());
        prop_assert!(!memory.exists(&key).unwrap());
    }
}
