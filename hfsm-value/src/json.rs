use crate::error::{ValueError, ValueResult};
use crate::value::{Contents, Value};

/// Convert a `Value` tree into a `serde_json::Value`. Fails on any
/// `Undefined` cell reachable from `value` — JSON has no undefined-value
/// tag, only `null`.
pub fn to_json(value: &Value) -> ValueResult<serde_json::Value> {
    match value.snapshot() {
        Contents::Undefined => Err(ValueError::UndefinedNotSerializable),
        Contents::Null => Ok(serde_json::Value::Null),
        Contents::Boolean(b) => Ok(serde_json::Value::Bool(b)),
        Contents::Integer(i) => Ok(serde_json::Value::Number(i.into())),
        Contents::Float(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| ValueError::XmlStructure("non-finite float".into())),
        Contents::String(s) => Ok(serde_json::Value::String(s)),
        Contents::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in &items {
                out.push(to_json(item)?);
            }
            Ok(serde_json::Value::Array(out))
        }
        Contents::Object(obj) => {
            let mut map = serde_json::Map::new();
            for (k, v) in obj.iter() {
                map.insert(k.to_string(), to_json(v)?);
            }
            Ok(serde_json::Value::Object(map))
        }
    }
}

pub fn to_json_string(value: &Value) -> ValueResult<String> {
    Ok(serde_json::to_string(&to_json(value)?)?)
}

pub fn to_json_string_pretty(value: &Value) -> ValueResult<String> {
    Ok(serde_json::to_string_pretty(&to_json(value)?)?)
}

/// Build a `Value` tree from a `serde_json::Value`. JSON `null` maps to
/// `Value::null()`; there is no way to produce `Undefined` from JSON input.
pub fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::null(),
        serde_json::Value::Bool(b) => Value::boolean(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::integer(i)
            } else {
                Value::float(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Value::string(s.clone()),
        serde_json::Value::Array(items) => {
            let v = Value::array();
            for item in items {
                v.push(from_json(item)).expect("fresh array accepts push");
            }
            v
        }
        serde_json::Value::Object(map) => {
            let v = Value::object();
            for (k, val) in map {
                v.insert_field(k.clone(), from_json(val))
                    .expect("fresh object accepts insert");
            }
            v
        }
    }
}

pub fn from_json_str(s: &str) -> ValueResult<Value> {
    let parsed: serde_json::Value = serde_json::from_str(s)?;
    Ok(from_json(&parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_nested_structure() {
        let root = Value::object();
        root.insert_field("name", Value::string("idle")).unwrap();
        root.insert_field("retries", Value::integer(3)).unwrap();
        let tags = Value::array();
        tags.push(Value::string("a")).unwrap();
        tags.push(Value::string("b")).unwrap();
        root.insert_field("tags", tags).unwrap();

        let s = to_json_string(&root).unwrap();
        let back = from_json_str(&s).unwrap();
        assert_eq!(root, back);
    }

    #[test]
    fn undefined_rejected() {
        let v = Value::undefined();
        assert!(matches!(
            to_json(&v),
            Err(ValueError::UndefinedNotSerializable)
        ));
    }
}
