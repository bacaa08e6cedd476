// Archivo: apply.rs
// Propósito: semántica compartida de las operaciones de upsert sobre un
// `Document`. Los stores concretos (memoria, SQLite) sólo se ocupan de leer
// y escribir el documento; la mutación se hace aquí.
use crate::errors::{Result, StoreError};
use crate::flatten::PATH_SEPARATOR;
use crate::repository::{StoreOperation, UpsertCommand};
use sync_domain::{get_path, Document, DocumentId, ShardKey, Value, ID_FIELD};

/// Documento inicial de un upsert: `_id` y shard key, como los copiaría el
/// filtro de igualdad de un store documental.
pub fn seed_document(id: &DocumentId, shard: Option<&ShardKey>) -> Result<Document> {
    let mut doc = Document::new();
    doc.insert(ID_FIELD.to_string(), id.to_value());
    if let Some(shard) = shard {
        set_path(&mut doc, &shard.path, shard.value.clone())?;
    }
    Ok(doc)
}

/// Aplica un comando sobre el documento existente (o sobre uno nuevo si no
/// existe). Devuelve el documento resultante y si fue creado.
///
/// El documento de entrada no se modifica: si la operación falla a mitad
/// no queda ningún cambio parcial.
pub fn upsert_document(existing: Option<&Document>, command: &UpsertCommand) -> Result<(Document, bool)> {
    let (mut doc, created) = match existing {
        Some(doc) => {
            check_shard(doc, command)?;
            (doc.clone(), false)
        }
        None => (seed_document(&command.id, command.shard.as_ref())?, true),
    };
    apply_operation(&mut doc, &command.operation)?;
    Ok((doc, created))
}

fn check_shard(doc: &Document, command: &UpsertCommand) -> Result<()> {
    if let Some(shard) = &command.shard {
        let current = get_path(doc, &shard.path);
        if current != Some(&shard.value) {
            return Err(StoreError::Conflict(format!("el documento {} no pertenece al shard {}={}",
                                                    command.id, shard.path, shard.value)));
        }
    }
    Ok(())
}

/// Aplica una operación de bajo nivel sobre `doc`.
pub fn apply_operation(doc: &mut Document, operation: &StoreOperation) -> Result<()> {
    match operation {
        StoreOperation::Unset(paths) => {
            for path in paths {
                unset_path(doc, path);
            }
        }
        StoreOperation::Set(fields) => {
            for (path, value) in fields {
                if path == ID_FIELD {
                    if doc.get(ID_FIELD) != Some(value) {
                        return Err(StoreError::Conflict(format!("el campo {} es inmutable", ID_FIELD)));
                    }
                    continue;
                }
                set_path(doc, path, value.clone())?;
            }
        }
        StoreOperation::AddToSet(fields) => {
            for (path, values) in fields {
                add_to_set(doc, path, values)?;
            }
        }
    }
    Ok(())
}

/// Asigna `value` en `path`, creando mapas intermedios. Falla si un tramo
/// intermedio existe y no es un mapa.
pub fn set_path(doc: &mut Document, path: &str, value: Value) -> Result<()> {
    let (parent, leaf) = parent_map(doc, path, true)?;
    match parent {
        Some(map) => {
            map.insert(leaf.to_string(), value);
            Ok(())
        }
        None => Err(StoreError::Conflict(format!("no se puede crear el campo '{}'", path))),
    }
}

/// Borra `path` si existe. Rutas inexistentes o que atraviesan escalares
/// son un no-op.
pub fn unset_path(doc: &mut Document, path: &str) {
    if let Ok((Some(map), leaf)) = parent_map(doc, path, false) {
        map.shift_remove(leaf);
    }
}

fn add_to_set(doc: &mut Document, path: &str, values: &[Value]) -> Result<()> {
    let (parent, leaf) = parent_map(doc, path, true)?;
    let map = parent.ok_or_else(|| StoreError::Conflict(format!("no se puede crear el campo '{}'", path)))?;
    let entry = map.entry(leaf.to_string()).or_insert_with(|| Value::List(Vec::new()));
    match entry {
        Value::List(items) => {
            for v in values {
                if !items.contains(v) {
                    items.push(v.clone());
                }
            }
            Ok(())
        }
        other => Err(StoreError::Conflict(format!("add-to-set sobre '{}' que no es una lista ({})", path, other))),
    }
}

/// Navega hasta el mapa padre del último tramo de `path`. Con `create`
/// crea los mapas intermedios ausentes; sin él devuelve `None` si falta
/// alguno.
fn parent_map<'a, 'p>(doc: &'a mut Document,
                      path: &'p str,
                      create: bool)
                      -> Result<(Option<&'a mut Document>, &'p str)> {
    let mut parts: Vec<&str> = path.split(PATH_SEPARATOR).collect();
    let leaf = parts.pop().unwrap_or_default();
    if leaf.is_empty() {
        return Err(StoreError::Other(format!("ruta vacía en '{}'", path)));
    }
    let mut current = doc;
    for part in parts {
        if !current.contains_key(part) {
            if !create {
                return Ok((None, leaf));
            }
            current.insert(part.to_string(), Value::Map(Document::new()));
        }
        current = match current.get_mut(part) {
            Some(Value::Map(inner)) => inner,
            Some(other) => {
                if !create {
                    return Ok((None, leaf));
                }
                return Err(StoreError::Conflict(format!("no se puede crear '{}' dentro de '{}' ({})", leaf, part, other)));
            }
            None => return Ok((None, leaf)),
        };
    }
    Ok((Some(current), leaf))
}

/// Indica si el campo numérico `field` del documento es anterior a
/// `before`.
pub fn is_outdated(doc: &Document, field: &str, before: f64) -> bool {
    get_path(doc, field).and_then(Value::as_f64).map(|ts| ts < before).unwrap_or(false)
}
