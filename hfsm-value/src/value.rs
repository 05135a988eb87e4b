use std::sync::{Arc, Mutex};

use crate::error::{ValueError, ValueResult};
use crate::object::ValueObject;
use crate::path::{self, Segment};

/// The tagged contents held behind a [`Value`] cell.
///
/// One variant. `Undefined` is distinct from
/// `Null`: it is what a fresh `Value` starts as and what a missed path
/// lookup yields, and it never round-trips through a serializer.
#[derive(Debug, Clone, Default)]
pub enum Contents {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(ValueObject),
}

impl Contents {
    pub fn type_name(&self) -> &'static str {
        match self {
            Contents::Undefined => "undefined",
            Contents::Null => "null",
            Contents::Boolean(_) => "boolean",
            Contents::Integer(_) => "integer",
            Contents::Float(_) => "float",
            Contents::String(_) => "string",
            Contents::Array(_) => "array",
            Contents::Object(_) => "object",
        }
    }
}

/// A node in the value tree.
///
/// Backed by `Arc<Mutex<Contents>>` rather than `Rc<RefCell<_>>`: plugin
/// completions arrive from other threads and may write
/// into the tree through a bound alias, so the cell has to be `Send + Sync`.
/// Cloning a `Value` clones the handle, not the contents — this is the
/// aliasing half of the sharing model; [`Value::deep_copy`] is the other.
#[derive(Debug, Clone)]
pub struct Value(Arc<Mutex<Contents>>);

impl Default for Value {
    fn default() -> Self {
        Value::undefined()
    }
}

impl Value {
    fn from_contents(c: Contents) -> Self {
        Value(Arc::new(Mutex::new(c)))
    }

    pub fn undefined() -> Self {
        Self::from_contents(Contents::Undefined)
    }

    pub fn null() -> Self {
        Self::from_contents(Contents::Null)
    }

    pub fn boolean(v: bool) -> Self {
        Self::from_contents(Contents::Boolean(v))
    }

    pub fn integer(v: i64) -> Self {
        Self::from_contents(Contents::Integer(v))
    }

    pub fn float(v: f64) -> Self {
        Self::from_contents(Contents::Float(v))
    }

    pub fn string(v: impl Into<String>) -> Self {
        Self::from_contents(Contents::String(v.into()))
    }

    pub fn array() -> Self {
        Self::from_contents(Contents::Array(Vec::new()))
    }

    pub fn object() -> Self {
        Self::from_contents(Contents::Object(ValueObject::new()))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Contents> {
        self.0.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn type_name(&self) -> &'static str {
        self.lock().type_name()
    }

    /// A shallow clone of this cell's current contents: scalars are copied,
    /// Array/Object children are cloned as `Value` handles (still aliased to
    /// their own cells). Used by format adapters that need to match on the
    /// tag without holding the lock across recursive calls.
    pub fn snapshot(&self) -> Contents {
        self.lock().clone()
    }

    pub fn is_undefined(&self) -> bool {
        matches!(*self.lock(), Contents::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(*self.lock(), Contents::Null)
    }

    pub fn is_array(&self) -> bool {
        matches!(*self.lock(), Contents::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(*self.lock(), Contents::Object(_))
    }

    pub fn is_container(&self) -> bool {
        self.is_array() || self.is_object()
    }

    /// Replace the contents of this cell in place, so every existing alias
    /// observes the new value. This is the primitive `set` operation.
    pub fn set(&self, v: impl Into<Contents>) {
        *self.lock() = v.into();
    }

    pub fn as_bool(&self) -> ValueResult<bool> {
        match &*self.lock() {
            Contents::Boolean(b) => Ok(*b),
            other => Err(ValueError::TypeMismatch {
                expected: "boolean",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_i64(&self) -> ValueResult<i64> {
        match &*self.lock() {
            Contents::Integer(i) => Ok(*i),
            other => Err(ValueError::TypeMismatch {
                expected: "integer",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_f64(&self) -> ValueResult<f64> {
        match &*self.lock() {
            Contents::Float(f) => Ok(*f),
            Contents::Integer(i) => Ok(*i as f64),
            other => Err(ValueError::TypeMismatch {
                expected: "float",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_str(&self) -> ValueResult<String> {
        match &*self.lock() {
            Contents::String(s) => Ok(s.clone()),
            other => Err(ValueError::TypeMismatch {
                expected: "string",
                found: other.type_name(),
            }),
        }
    }

    pub fn as_bool_or(&self, default: bool) -> bool {
        self.as_bool().unwrap_or(default)
    }

    pub fn as_i64_or(&self, default: i64) -> i64 {
        self.as_i64().unwrap_or(default)
    }

    pub fn as_f64_or(&self, default: f64) -> f64 {
        self.as_f64().unwrap_or(default)
    }

    pub fn as_str_or(&self, default: impl Into<String>) -> String {
        self.as_str().unwrap_or_else(|_| default.into())
    }

    /// Array length, object size, or `-1` for scalars/Undefined/Null.
    pub fn size(&self) -> i64 {
        match &*self.lock() {
            Contents::Array(a) => a.len() as i64,
            Contents::Object(o) => o.len() as i64,
            _ => -1,
        }
    }

    // -- Array / Object element access -------------------------------------

    pub fn index(&self, i: usize) -> ValueResult<Value> {
        match &*self.lock() {
            Contents::Array(a) => a.get(i).cloned().ok_or(ValueError::IndexOutOfRange {
                index: i as i64,
                len: a.len(),
            }),
            other => Err(ValueError::TypeMismatch {
                expected: "array",
                found: other.type_name(),
            }),
        }
    }

    pub fn field(&self, key: &str) -> Option<Value> {
        match &*self.lock() {
            Contents::Object(o) => o.get(key).cloned(),
            _ => None,
        }
    }

    /// Insert `value` into this Object at `key`, auto-converting this cell
    /// to an empty Object first if it is currently Undefined. Rejects the
    /// insertion if it would create a reference cycle (see
    /// [`Value::contains_cell`]).
    pub fn insert_field(&self, key: impl Into<String>, value: Value) -> ValueResult<()> {
        if value.contains_cell(self) {
            return Err(ValueError::CycleDetected);
        }
        let mut guard = self.lock();
        if matches!(*guard, Contents::Undefined) {
            *guard = Contents::Object(ValueObject::new());
        }
        match &mut *guard {
            Contents::Object(o) => {
                o.insert(key.into(), value);
                Ok(())
            }
            other => Err(ValueError::TypeMismatch {
                expected: "object",
                found: other.type_name(),
            }),
        }
    }

    pub fn remove_field(&self, key: &str) -> ValueResult<()> {
        match &mut *self.lock() {
            Contents::Object(o) => {
                o.remove(key);
                Ok(())
            }
            other => Err(ValueError::TypeMismatch {
                expected: "object",
                found: other.type_name(),
            }),
        }
    }

    /// Push onto this Array, auto-converting an Undefined cell to an empty
    /// Array first.
    pub fn push(&self, value: Value) -> ValueResult<()> {
        if value.contains_cell(self) {
            return Err(ValueError::CycleDetected);
        }
        let mut guard = self.lock();
        if matches!(*guard, Contents::Undefined) {
            *guard = Contents::Array(Vec::new());
        }
        match &mut *guard {
            Contents::Array(a) => {
                a.push(value);
                Ok(())
            }
            other => Err(ValueError::TypeMismatch {
                expected: "array",
                found: other.type_name(),
            }),
        }
    }

    /// Set the Array element at `index`, auto-converting Undefined to an
    /// empty Array and filling any gap up to `index` with `Null`.
    pub fn set_index(&self, index: usize, value: Value) -> ValueResult<()> {
        if value.contains_cell(self) {
            return Err(ValueError::CycleDetected);
        }
        let mut guard = self.lock();
        if matches!(*guard, Contents::Undefined) {
            *guard = Contents::Array(Vec::new());
        }
        match &mut *guard {
            Contents::Array(a) => {
                while a.len() <= index {
                    a.push(Value::null());
                }
                a[index] = value;
                Ok(())
            }
            other => Err(ValueError::TypeMismatch {
                expected: "array",
                found: other.type_name(),
            }),
        }
    }

    pub fn remove_index(&self, index: usize) -> ValueResult<()> {
        match &mut *self.lock() {
            Contents::Array(a) => {
                if index < a.len() {
                    a.remove(index);
                }
                Ok(())
            }
            other => Err(ValueError::TypeMismatch {
                expected: "array",
                found: other.type_name(),
            }),
        }
    }

    // -- Path access ---------------------------------------------------------

    /// Walk a dotted/indexed path (`a.b[3].c`), returning `Value::undefined()`
    /// for any segment that does not resolve rather than erroring — a path
    /// miss is an ordinary, expected outcome in dataflow bindings.
    pub fn path_get(&self, path: &str) -> ValueResult<Value> {
        let segments = path::parse(path)?;
        let mut current = self.clone();
        for segment in &segments {
            let next = match segment {
                Segment::Key(k) => current.field(k),
                Segment::Index(i) => current.index(*i).ok(),
            };
            match next {
                Some(v) => current = v,
                None => return Ok(Value::undefined()),
            }
        }
        Ok(current)
    }

    /// Write `value` at a dotted/indexed path, auto-vivifying intermediate
    /// Objects (for key segments) and Arrays (for index segments) as it
    /// descends.
    pub fn path_set(&self, path: &str, value: Value) -> ValueResult<()> {
        let segments = path::parse(path)?;
        let Some((last, init)) = segments.split_last() else {
            // Empty path: replace this cell's contents with `value`'s.
            self.assign_from(&value);
            return Ok(());
        };

        let mut current = self.clone();
        for segment in init {
            current = match segment {
                Segment::Key(k) => {
                    if current.field(k).is_none() {
                        current.insert_field(k.clone(), Value::undefined())?;
                    }
                    current.field(k).expect("just inserted")
                }
                Segment::Index(i) => {
                    if current.index(*i).is_err() {
                        current.set_index(*i, Value::undefined())?;
                    }
                    current.index(*i)?
                }
            };
        }

        match last {
            Segment::Key(k) => current.insert_field(k.clone(), value),
            Segment::Index(i) => current.set_index(*i, value),
        }
    }

    // -- Sharing: alias vs deep copy ------------------------------------------

    /// Alias this handle onto `other`'s cell: after this call, writes through
    /// either `Value` are visible through the other.
    pub fn bind_to(&mut self, other: &Value) {
        self.0 = Arc::clone(&other.0);
    }

    /// Deep-copy `other`'s contents into this cell, preserving this handle's
    /// identity (and therefore its existing aliases).
    pub fn assign_from(&self, other: &Value) {
        let copied = other.deep_copy();
        *self.lock() = copied.into_contents();
    }

    /// Produce a new `Value` tree with entirely fresh cells, recursively.
    pub fn deep_copy(&self) -> Value {
        let contents = match &*self.lock() {
            Contents::Array(a) => Contents::Array(a.iter().map(|v| v.deep_copy()).collect()),
            Contents::Object(o) => {
                let mut copy = ValueObject::new();
                for (k, v) in o.iter() {
                    copy.insert(k.to_string(), v.deep_copy());
                }
                Contents::Object(copy)
            }
            other => other.clone(),
        };
        Value::from_contents(contents)
    }

    fn into_contents(self) -> Contents {
        match Arc::try_unwrap(self.0) {
            Ok(mutex) => mutex.into_inner().unwrap_or(Contents::Undefined),
            Err(arc) => arc.lock().unwrap_or_else(|p| p.into_inner()).clone(),
        }
    }

    /// True if `other`'s cell is reachable from this value's cell (including
    /// `self` itself). Used to reject insertions that would otherwise create
    /// a reference cycle. This only detects cycles reachable through `self`
    /// at the time of the check — it does not catch a cycle assembled by two
    /// later, independent mutations that never pass through this call.
    pub fn contains_cell(&self, other: &Value) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        match &*self.lock() {
            Contents::Array(a) => a.iter().any(|v| v.contains_cell(other)),
            Contents::Object(o) => o.iter().any(|(_, v)| v.contains_cell(other)),
            _ => false,
        }
    }

    /// Recursively merge `other` into this value in place: matching Object keys merge recursively when both sides are
    /// Objects, matching Array indices merge recursively when both sides are
    /// Arrays, and anywhere else `other` wins. Missing Array indices on the
    /// left are padded with `Null` before merging.
    pub fn unite(&self, other: &Value) -> ValueResult<()> {
        if Arc::ptr_eq(&self.0, &other.0) {
            return Ok(());
        }

        if self.is_object() && other.is_object() {
            let Contents::Object(from) = other.snapshot() else {
                unreachable!()
            };
            for (k, v) in from.iter() {
                let mergeable = self
                    .field(k)
                    .map(|existing| {
                        (existing.is_object() && v.is_object())
                            || (existing.is_array() && v.is_array())
                    })
                    .unwrap_or(false);
                if mergeable {
                    self.field(k).expect("checked above").unite(v)?;
                } else {
                    self.insert_field(k.to_string(), v.deep_copy())?;
                }
            }
            return Ok(());
        }

        if self.is_array() && other.is_array() {
            let Contents::Array(from) = other.snapshot() else {
                unreachable!()
            };
            for _ in (self.size() as usize)..from.len() {
                self.push(Value::null())?;
            }
            for (i, v) in from.iter().enumerate() {
                let existing = self.index(i)?;
                let mergeable = (existing.is_object() && v.is_object())
                    || (existing.is_array() && v.is_array());
                if mergeable {
                    existing.unite(v)?;
                } else {
                    self.set_index(i, v.deep_copy())?;
                }
            }
            return Ok(());
        }

        // Type mismatch (or both scalar): the incoming value wins outright.
        *self.lock() = other.deep_copy().into_contents();
        Ok(())
    }
}

impl PartialEq for Value {
    /// Structural equality: compares contents recursively, ignoring cell
    /// identity/sharing topology.
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        match (&*self.lock(), &*other.lock()) {
            (Contents::Undefined, Contents::Undefined) => true,
            (Contents::Null, Contents::Null) => true,
            (Contents::Boolean(a), Contents::Boolean(b)) => a == b,
            (Contents::Integer(a), Contents::Integer(b)) => a == b,
            (Contents::Float(a), Contents::Float(b)) => a == b,
            (Contents::String(a), Contents::String(b)) => a == b,
            (Contents::Array(a), Contents::Array(b)) => a == b,
            (Contents::Object(a), Contents::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Contents {
    fn from(v: bool) -> Self {
        Contents::Boolean(v)
    }
}
impl From<i64> for Contents {
    fn from(v: i64) -> Self {
        Contents::Integer(v)
    }
}
impl From<f64> for Contents {
    fn from(v: f64) -> Self {
        Contents::Float(v)
    }
}
impl From<String> for Contents {
    fn from(v: String) -> Self {
        Contents::String(v)
    }
}
impl From<&str> for Contents {
    fn from(v: &str) -> Self {
        Contents::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_set_auto_vivifies() {
        let root = Value::undefined();
        root.path_set("a.b[2].c", Value::integer(42)).unwrap();
        assert_eq!(root.path_get("a.b[2].c").unwrap().as_i64().unwrap(), 42);
        // the hole at index 0/1 is filled with Null
        assert!(root.path_get("a.b[0]").unwrap().is_null());
    }

    #[test]
    fn path_get_missing_is_undefined() {
        let root = Value::object();
        assert!(root.path_get("missing.nested").unwrap().is_undefined());
    }

    #[test]
    fn bind_to_aliases() {
        let a = Value::integer(1);
        let mut b = Value::integer(2);
        b.bind_to(&a);
        a.set(99i64);
        assert_eq!(b.as_i64().unwrap(), 99);
    }

    #[test]
    fn assign_from_deep_copies() {
        let a = Value::object();
        a.insert_field("x", Value::integer(1)).unwrap();
        let b = Value::object();
        b.assign_from(&a);
        a.path_set("x", Value::integer(2)).unwrap();
        assert_eq!(b.path_get("x").unwrap().as_i64().unwrap(), 1);
    }

    #[test]
    fn unite_merges_objects_recursively() {
        let a = Value::object();
        a.insert_field("x", Value::integer(1)).unwrap();
        a.insert_field("nested", {
            let n = Value::object();
            n.insert_field("keep", Value::integer(1)).unwrap();
            n.insert_field("override", Value::integer(1)).unwrap();
            n
        })
        .unwrap();

        let b = Value::object();
        b.insert_field("y", Value::integer(2)).unwrap();
        b.insert_field("nested", {
            let n = Value::object();
            n.insert_field("override", Value::integer(2)).unwrap();
            n
        })
        .unwrap();

        a.unite(&b).unwrap();
        assert_eq!(a.path_get("x").unwrap().as_i64().unwrap(), 1);
        assert_eq!(a.path_get("y").unwrap().as_i64().unwrap(), 2);
        assert_eq!(a.path_get("nested.keep").unwrap().as_i64().unwrap(), 1);
        assert_eq!(a.path_get("nested.override").unwrap().as_i64().unwrap(), 2);
    }

    #[test]
    fn insert_rejects_direct_cycle() {
        let root = Value::object();
        let err = root.insert_field("self", root.clone()).unwrap_err();
        assert!(matches!(err, ValueError::CycleDetected));
    }

    #[test]
    fn structural_equality_ignores_sharing() {
        let a = Value::object();
        a.insert_field("x", Value::integer(1)).unwrap();
        let b = Value::object();
        b.insert_field("x", Value::integer(1)).unwrap();
        assert_eq!(a, b);
    }
}
