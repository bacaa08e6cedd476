// Archivo: repository.rs
// Propósito: definir el trait `DocumentStore` y los comandos de upsert que
// consume. Describe el contrato que deben implementar los stores
// (SQLite, in-memory, etc.).
use crate::errors::{Result, StoreError};
use sync_domain::{Document, DocumentId, ShardKey, Value};

/// Operación de bajo nivel sobre un documento.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOperation {
    /// Borra cada ruta (no falla si no existe).
    Unset(Vec<String>),
    /// Asigna cada ruta, creando los mapas intermedios.
    Set(Vec<(String, Value)>),
    /// Añade cada valor a la lista de la ruta si aún no está presente.
    AddToSet(Vec<(String, Vec<Value>)>),
}

impl StoreOperation {
    pub fn is_empty(&self) -> bool {
        match self {
            StoreOperation::Unset(paths) => paths.is_empty(),
            StoreOperation::Set(fields) => fields.is_empty(),
            StoreOperation::AddToSet(fields) => fields.is_empty(),
        }
    }
}

/// Comando de upsert dirigido a un documento por `_id` (y shard key).
/// Si el documento no existe se crea con el `_id` y la shard key.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertCommand {
    pub id: DocumentId,
    pub shard: Option<ShardKey>,
    pub operation: StoreOperation,
}

/// Fallo de un comando individual dentro de un lote.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandFailure {
    pub index: usize,
    pub id: DocumentId,
    pub error: StoreError,
}

/// Resultado agregado de `upsert_batch`. Los comandos se procesan de forma
/// independiente: un fallo no revierte ni detiene a los demás.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    /// Documentos existentes modificados.
    pub matched: usize,
    /// Documentos creados por el upsert.
    pub upserted: usize,
    pub failures: Vec<CommandFailure>,
}

/// Contrato mínimo del store de documentos.
///
/// Las colecciones se crean implícitamente en la primera escritura.
pub trait DocumentStore: Send + Sync {
    /// Ejecuta un lote heterogéneo de comandos en orden, con upsert.
    /// Un `Err` indica que el lote no pudo procesarse (p. ej. conexión);
    /// los fallos por comando van en `BatchResult::failures`.
    fn upsert_batch(&self, collection: &str, commands: &[UpsertCommand]) -> Result<BatchResult>;

    /// Obtiene un documento por id.
    fn get_doc(&self, collection: &str, id: &DocumentId) -> Result<Option<Document>>;

    /// Obtiene los documentos con los ids dados; con `ids` vacío devuelve
    /// la colección completa.
    fn get_docs(&self, collection: &str, ids: &[DocumentId]) -> Result<Vec<Document>>;

    /// Elimina los documentos indicados. Devuelve cuántos se borraron.
    fn remove_docs_by_keys(&self, collection: &str, ids: &[DocumentId]) -> Result<usize>;

    /// Elimina los documentos cuyo campo numérico `field` es menor que
    /// `before`. Los documentos sin ese campo se conservan.
    fn remove_outdated_docs(&self, collection: &str, field: &str, before: f64) -> Result<usize>;
}
