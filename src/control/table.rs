use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::YieldError;

/// One serialized row of a [`LookupTable`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableEntry<K, V> {
    key: K,
    value: V,
}

/// A read-only multi-key coefficient table.
///
/// Serialized as a list of `{"key": ..., "value": ...}` rows so that tuple
/// keys survive the trip through JSON as arrays.
#[derive(Debug, Clone)]
pub struct LookupTable<K, V> {
    entries: HashMap<K, V>,
}

impl<K: Eq + Hash, V> Default for LookupTable<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Debug, V> LookupTable<K, V> {
    pub fn insert(&mut self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    pub fn with(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    pub fn find(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// The value under `key`, or a processing failure naming the table.
    pub fn get(&self, key: &K, table: &str) -> Result<&V, YieldError> {
        self.entries
            .get(key)
            .ok_or_else(|| YieldError::missing_coefficients(table, key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Eq + Hash + Debug, V: Copy> LookupTable<K, V> {
    /// The value under `key`, or `default` when the table has no entry.
    pub fn get_or(&self, key: &K, default: V) -> V {
        self.entries.get(key).copied().unwrap_or(default)
    }
}

impl<K, V> Serialize for LookupTable<K, V>
where
    K: Serialize + Eq + Hash + Ord + Clone,
    V: Serialize + Clone,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut rows: Vec<TableEntry<K, V>> = self
            .entries
            .iter()
            .map(|(key, value)| TableEntry {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        rows.serialize(serializer)
    }
}

impl<'de, K, V> Deserialize<'de> for LookupTable<K, V>
where
    K: DeserializeOwned + Eq + Hash,
    V: DeserializeOwned,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let rows: Vec<TableEntry<K, V>> = Vec::deserialize(deserializer)?;
        Ok(Self {
            entries: rows.into_iter().map(|row| (row.key, row.value)).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_present_and_missing() {
        let table = LookupTable::default().with(3, vec![1.0f32, 2.0]);
        assert_eq!(table.get(&3, "net breakage").unwrap(), &vec![1.0, 2.0]);
        let err = table.get(&4, "net breakage").unwrap_err();
        assert!(err.to_string().contains("net breakage"));
        assert!(err.to_string().contains('4'));
    }

    #[test]
    fn test_get_or_default() {
        let table = LookupTable::default().with(("B".to_string(), 1), 0.5f32);
        assert_eq!(table.get_or(&("B".to_string(), 1), 1.0), 0.5);
        assert_eq!(table.get_or(&("H".to_string(), 1), 1.0), 1.0);
    }

    #[test]
    fn test_tuple_keys_deserialize_from_arrays() {
        let table: LookupTable<(i32, String, String), Vec<f32>> = serde_json::from_str(
            r#"[{"key":[1,"B","CWH"],"value":[0.5,0.25]},{"key":[2,"B","CWH"],"value":[1.0]}]"#,
        )
        .unwrap();
        assert_eq!(table.len(), 2);
        let key = (1, "B".to_string(), "CWH".to_string());
        assert_eq!(table.find(&key), Some(&vec![0.5, 0.25]));
    }

    #[test]
    fn test_serialize_is_sorted_by_key() {
        let table = LookupTable::default().with(2, 0.2f32).with(1, 0.1f32);
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"[{"key":1,"value":0.1},{"key":2,"value":0.2}]"#);
    }
}
