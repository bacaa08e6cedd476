// record.rs
use crate::value::{Document, Value};
use crate::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Nombre del campo identificador obligatorio de todo registro.
pub const ID_FIELD: &str = "_id";

/// Identificador de documento. Sólo se aceptan cadenas no vacías o enteros.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentId {
  Int(i64),
  Str(String),
}

impl DocumentId {
  pub fn from_value(value: &Value) -> Result<Self, DomainError> {
    match value {
      Value::Str(s) if !s.is_empty() => Ok(DocumentId::Str(s.clone())),
      Value::Int(i) => Ok(DocumentId::Int(*i)),
      other => Err(DomainError::InvalidRecord(format!("identificador no válido: {}", other))),
    }
  }

  pub fn to_value(&self) -> Value {
    match self {
      DocumentId::Int(i) => Value::Int(*i),
      DocumentId::Str(s) => Value::Str(s.clone()),
    }
  }
}

impl From<&str> for DocumentId {
  fn from(s: &str) -> Self {
    DocumentId::Str(s.to_string())
  }
}

impl From<String> for DocumentId {
  fn from(s: String) -> Self {
    DocumentId::Str(s)
  }
}

impl From<i64> for DocumentId {
  fn from(i: i64) -> Self {
    DocumentId::Int(i)
  }
}

impl fmt::Display for DocumentId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DocumentId::Int(i) => write!(f, "{}", i),
      DocumentId::Str(s) => write!(f, "{}", s),
    }
  }
}

/// Clave de partición que acompaña al identificador en cada operación
/// contra stores particionados.
#[derive(Debug, Clone, PartialEq)]
pub struct ShardKey {
  pub path: String,
  pub value: Value,
}

/// Registro observado: documento anidado con `_id` obligatorio.
///
/// Se construye una vez por observación y se descarta tras el envío del
/// lote; ningún componente lo retiene entre ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
  id: DocumentId,
  fields: Document,
}

impl Record {
  /// Valida que el documento tenga `_id` y construye el registro.
  pub fn new(fields: Document) -> Result<Self, DomainError> {
    let raw = fields.get(ID_FIELD)
                    .ok_or_else(|| DomainError::InvalidRecord(format!("falta el campo {}", ID_FIELD)))?;
    let id = DocumentId::from_value(raw)?;
    Ok(Self { id, fields })
  }

  pub fn from_json(value: serde_json::Value) -> Result<Self, DomainError> {
    match Value::from(value) {
      Value::Map(fields) => Self::new(fields),
      other => Err(DomainError::InvalidRecord(format!("se esperaba un objeto, se recibió {}", other))),
    }
  }

  pub fn id(&self) -> &DocumentId {
    &self.id
  }

  pub fn fields(&self) -> &Document {
    &self.fields
  }

  pub fn into_fields(self) -> Document {
    self.fields
  }

  /// Busca un valor siguiendo una ruta separada por puntos (`a.b.c`).
  pub fn get_path(&self, path: &str) -> Option<&Value> {
    crate::value::get_path(&self.fields, path)
  }

  /// Resuelve la shard key configurada. Un valor ausente o null es un
  /// registro inválido.
  pub fn shard_key(&self, path: &str) -> Result<ShardKey, DomainError> {
    match self.get_path(path) {
      Some(v) if !v.is_null() => Ok(ShardKey { path: path.to_string(), value: v.clone() }),
      _ => Err(DomainError::InvalidRecord(format!("el registro {} no tiene la shard key '{}'", self.id, path))),
    }
  }
}

impl TryFrom<Document> for Record {
  type Error = DomainError;

  fn try_from(fields: Document) -> Result<Self, Self::Error> {
    Record::new(fields)
  }
}
