use crate::value::Value;

/// An ordered `String -> Value` mapping with unique keys.
///
/// Iteration order is insertion order. Implemented as a flat
/// `Vec` rather than a hash map: state parameter trees are small (a handful
/// of entries), so linear lookup is simpler and keeps insertion order for
/// free, without a dependency on an order-preserving map crate.
#[derive(Debug, Clone, Default)]
pub struct ValueObject {
    entries: Vec<(String, Value)>,
}

impl ValueObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Insert `value` at `key`, replacing in place if the key already
    /// exists (preserving its original position) or appending otherwise.
    pub fn insert(&mut self, key: String, value: Value) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Remove `key`. A missing key is a no-op.
    pub fn remove(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl PartialEq for ValueObject {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter()
            .all(|(k, v)| other.get(k).is_some_and(|ov| ov == v))
    }
}
