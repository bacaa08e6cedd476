// Archivo: flatten.rs
// Propósito: aplanar un documento anidado en pares (ruta, valor hoja).
use sync_domain::{Document, Value};

/// Separador entre claves de una ruta.
pub const PATH_SEPARATOR: char = '.';

/// Campo aplanado: `path` es la secuencia de claves unida con `.`; `value`
/// es un escalar o una lista (las listas nunca se expanden).
#[derive(Debug, Clone, PartialEq)]
pub struct FlatField {
    pub path: String,
    pub value: Value,
}

/// Aplana `document` recorriendo los mapas anidados en orden de inserción.
///
/// - Las listas y los escalares son hojas.
/// - Los mapas vacíos desaparecen (no generan campo).
/// - Los valores null se conservan: el planner los usa para detectar campos
///   que deben borrarse.
pub fn flatten(document: &Document) -> Vec<FlatField> {
    let mut out = Vec::with_capacity(document.len());
    flatten_into(document, None, &mut out);
    out
}

fn flatten_into(document: &Document, prefix: Option<&str>, out: &mut Vec<FlatField>) {
    for (key, value) in document {
        let path = match prefix {
            Some(p) => format!("{}{}{}", p, PATH_SEPARATOR, key),
            None => key.clone(),
        };
        match value {
            Value::Map(inner) => flatten_into(inner, Some(&path), out),
            leaf => out.push(FlatField { path, value: leaf.clone() }),
        }
    }
}
