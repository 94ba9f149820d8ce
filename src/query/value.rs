//! Conversions between decoded documents and query values

use std::rc::Rc;
use jaq_json::Val;
use serde_json::{Map, Number, Value};

/// Convert a decoded document into a query value.
pub fn json_to_val(json: Value) -> Val {
    match json {
        Value::Null => Val::Null,
        Value::Bool(b) => Val::Bool(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                // Integers that do not fit isize keep their decimal text
                match isize::try_from(i) {
                    Ok(i) => Val::Int(i),
                    Err(_) => Val::Num(Rc::new(n.to_string())),
                }
            } else if n.is_f64() {
                Val::Float(n.as_f64().unwrap_or_default())
            } else {
                Val::Num(Rc::new(n.to_string()))
            }
        }
        Value::String(s) => Val::Str(Rc::new(s)),
        Value::Array(arr) => Val::Arr(Rc::new(arr.into_iter().map(json_to_val).collect())),
        Value::Object(obj) => {
            Val::obj(obj.into_iter().map(|(k, v)| (Rc::new(k), json_to_val(v))).collect())
        }
    }
}

/// Convert a query value back into a document for encoding.
///
/// Integral floats become integers, so `3.0` encodes as `3`. Non-finite
/// floats have no document form and become null.
pub fn val_to_json(val: &Val) -> Value {
    match val {
        Val::Null => Value::Null,
        Val::Bool(b) => Value::Bool(*b),
        Val::Int(n) => Value::Number((*n as i64).into()),
        Val::Float(f) => float_to_json(*f),
        Val::Num(s) => serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.to_string())),
        Val::Str(s) => Value::String(s.to_string()),
        Val::Arr(arr) => Value::Array(arr.iter().map(val_to_json).collect()),
        Val::Obj(obj) => {
            let map: Map<String, Value> = obj
                .iter()
                .map(|(k, v)| (k.to_string(), val_to_json(v)))
                .collect();
            Value::Object(map)
        }
    }
}

/// Convert a query value into a YAML document. Mappings are written with
/// sorted keys; non-finite floats keep their YAML spelling (`.inf`, `.nan`).
pub fn val_to_yaml(val: &Val) -> serde_yaml::Value {
    use serde_yaml::Value as Yaml;
    match val {
        Val::Null => Yaml::Null,
        Val::Bool(b) => Yaml::Bool(*b),
        Val::Int(n) => Yaml::Number((*n as i64).into()),
        Val::Float(f) if is_exact_int(*f) => Yaml::Number((*f as i64).into()),
        Val::Float(f) => Yaml::Number((*f).into()),
        Val::Num(s) => serde_yaml::from_str(s).unwrap_or_else(|_| Yaml::String(s.to_string())),
        Val::Str(s) => Yaml::String(s.to_string()),
        Val::Arr(arr) => Yaml::Sequence(arr.iter().map(val_to_yaml).collect()),
        Val::Obj(obj) => {
            let mut entries: Vec<_> = obj.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Yaml::Mapping(entries
                .into_iter()
                .map(|(k, v)| (Yaml::String(k.to_string()), val_to_yaml(v)))
                .collect())
        }
    }
}

const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

fn is_exact_int(f: f64) -> bool {
    f.fract() == 0.0 && f.abs() < MAX_EXACT_INT
}

fn float_to_json(f: f64) -> Value {
    if is_exact_int(f) {
        return Value::Number((f as i64).into());
    }
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}
