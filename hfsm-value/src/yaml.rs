use crate::error::{ValueError, ValueResult};
use crate::value::{Contents, Value};

/// Convert a `Value` tree into a `serde_yaml::Value`. Same `Undefined`
/// restriction as [`crate::json::to_json`].
pub fn to_yaml(value: &Value) -> ValueResult<serde_yaml::Value> {
    match value.snapshot() {
        Contents::Undefined => Err(ValueError::UndefinedNotSerializable),
        Contents::Null => Ok(serde_yaml::Value::Null),
        Contents::Boolean(b) => Ok(serde_yaml::Value::Bool(b)),
        Contents::Integer(i) => Ok(serde_yaml::Value::Number(i.into())),
        Contents::Float(f) => Ok(serde_yaml::Value::Number(f.into())),
        Contents::String(s) => Ok(serde_yaml::Value::String(s)),
        Contents::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in &items {
                out.push(to_yaml(item)?);
            }
            Ok(serde_yaml::Value::Sequence(out))
        }
        Contents::Object(obj) => {
            let mut map = serde_yaml::Mapping::new();
            for (k, v) in obj.iter() {
                map.insert(serde_yaml::Value::String(k.to_string()), to_yaml(v)?);
            }
            Ok(serde_yaml::Value::Mapping(map))
        }
    }
}

pub fn to_yaml_string(value: &Value) -> ValueResult<String> {
    Ok(serde_yaml::to_string(&to_yaml(value)?)?)
}

/// Build a `Value` tree from a `serde_yaml::Value`.
///
/// `serde_yaml` already applies the Boolean -> Integer -> Float -> String
/// scalar inference order when it parses plain (unquoted) scalars, so this
/// conversion only needs to map tags through, not re-infer them.
pub fn from_yaml(yaml: &serde_yaml::Value) -> Value {
    match yaml {
        serde_yaml::Value::Null => Value::null(),
        serde_yaml::Value::Bool(b) => Value::boolean(*b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::integer(i)
            } else {
                Value::float(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_yaml::Value::String(s) => Value::string(s.clone()),
        serde_yaml::Value::Sequence(items) => {
            let v = Value::array();
            for item in items {
                v.push(from_yaml(item)).expect("fresh array accepts push");
            }
            v
        }
        serde_yaml::Value::Mapping(map) => {
            let v = Value::object();
            for (k, val) in map {
                let key = k.as_str().map(str::to_string).unwrap_or_else(|| {
                    serde_yaml::to_string(k).unwrap_or_default().trim().to_string()
                });
                v.insert_field(key, from_yaml(val))
                    .expect("fresh object accepts insert");
            }
            v
        }
        serde_yaml::Value::Tagged(tagged) => from_yaml(&tagged.value),
    }
}

pub fn from_yaml_str(s: &str) -> ValueResult<Value> {
    let parsed: serde_yaml::Value = serde_yaml::from_str(s)?;
    Ok(from_yaml(&parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_nested_structure() {
        let root = Value::object();
        root.insert_field("name", Value::string("idle")).unwrap();
        root.insert_field("retries", Value::integer(3)).unwrap();
        root.insert_field("enabled", Value::boolean(true)).unwrap();

        let s = to_yaml_string(&root).unwrap();
        let back = from_yaml_str(&s).unwrap();
        assert_eq!(root, back);
    }

    #[test]
    fn infers_scalar_types_from_plain_text() {
        let doc = "a: true\nb: 3\nc: 3.5\nd: hello\n";
        let v = from_yaml_str(doc).unwrap();
        assert!(v.path_get("a").unwrap().as_bool().unwrap());
        assert_eq!(v.path_get("b").unwrap().as_i64().unwrap(), 3);
        assert_eq!(v.path_get("c").unwrap().as_f64().unwrap(), 3.5);
        assert_eq!(v.path_get("d").unwrap().as_str().unwrap(), "hello");
    }
}
