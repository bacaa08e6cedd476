// value.rs
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Mapa ordenado por inserción de campo -> valor. El orden de los campos se
/// conserva para que el aplanado y la generación de operaciones sean
/// deterministas.
pub type Document = IndexMap<String, Value>;

/// Valor recursivo de un registro: escalar, secuencia o mapa anidado.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "JsonValue", into = "JsonValue")]
pub enum Value {
  #[default]
  Null,
  Bool(bool),
  Int(i64),
  Float(f64),
  Str(String),
  List(Vec<Value>),
  Map(Document),
}

impl Value {
  pub fn is_null(&self) -> bool {
    matches!(self, Value::Null)
  }

  /// Valores "vacíos": null, false, 0, 0.0, "", lista vacía y mapa vacío.
  pub fn is_falsy(&self) -> bool {
    match self {
      Value::Null => true,
      Value::Bool(b) => !b,
      Value::Int(i) => *i == 0,
      Value::Float(f) => *f == 0.0,
      Value::Str(s) => s.is_empty(),
      Value::List(items) => items.is_empty(),
      Value::Map(map) => map.is_empty(),
    }
  }

  pub fn as_map(&self) -> Option<&Document> {
    match self {
      Value::Map(m) => Some(m),
      _ => None,
    }
  }

  pub fn as_list(&self) -> Option<&[Value]> {
    match self {
      Value::List(items) => Some(items),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::Str(s) => Some(s),
      _ => None,
    }
  }

  /// Valor numérico como `f64` (enteros incluidos), usado en comparaciones
  /// de timestamps.
  pub fn as_f64(&self) -> Option<f64> {
    match self {
      Value::Int(i) => Some(*i as f64),
      Value::Float(f) => Some(*f),
      _ => None,
    }
  }
}

/// Lee un valor siguiendo una ruta con puntos (`a.b.c`).
pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
  let mut parts = path.split('.');
  let mut current = document.get(parts.next()?)?;
  for part in parts {
    current = current.as_map()?.get(part)?;
  }
  Some(current)
}

/// Elimina recursivamente los campos cuyo valor es `Null`. Las listas se
/// conservan tal cual; sólo se podan campos de mapas.
pub fn strip_nulls(document: &Document) -> Document {
  document.iter()
          .filter(|(_, v)| !v.is_null())
          .map(|(k, v)| {
            let v = match v {
              Value::Map(inner) => Value::Map(strip_nulls(inner)),
              other => other.clone(),
            };
            (k.clone(), v)
          })
          .collect()
}

impl From<JsonValue> for Value {
  fn from(v: JsonValue) -> Self {
    match v {
      JsonValue::Null => Value::Null,
      JsonValue::Bool(b) => Value::Bool(b),
      JsonValue::Number(n) => match n.as_i64() {
        Some(i) => Value::Int(i),
        None => Value::Float(n.as_f64().unwrap_or_default()),
      },
      JsonValue::String(s) => Value::Str(s),
      JsonValue::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
      JsonValue::Object(map) => Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()),
    }
  }
}

impl From<Value> for JsonValue {
  fn from(v: Value) -> Self {
    match v {
      Value::Null => JsonValue::Null,
      Value::Bool(b) => JsonValue::Bool(b),
      Value::Int(i) => JsonValue::from(i),
      // NaN/inf have no JSON form and degrade to null
      Value::Float(f) => serde_json::Number::from_f64(f).map(JsonValue::Number).unwrap_or(JsonValue::Null),
      Value::Str(s) => JsonValue::String(s),
      Value::List(items) => JsonValue::Array(items.into_iter().map(JsonValue::from).collect()),
      Value::Map(map) => JsonValue::Object(map.into_iter().map(|(k, v)| (k, JsonValue::from(v))).collect()),
    }
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::Str(s.to_string())
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Value::Str(s)
  }
}

impl From<i64> for Value {
  fn from(i: i64) -> Self {
    Value::Int(i)
  }
}

impl From<f64> for Value {
  fn from(f: f64) -> Self {
    Value::Float(f)
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Bool(b)
  }
}

impl From<Document> for Value {
  fn from(m: Document) -> Self {
    Value::Map(m)
  }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
  fn from(items: Vec<T>) -> Self {
    Value::List(items.into_iter().map(Into::into).collect())
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", JsonValue::from(self.clone()))
  }
}
