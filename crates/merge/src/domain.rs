// Archivo: domain.rs
// Propósito: tipos del motor de merge: política de merge, destino de una
// operación e intents de mutación.
use std::fmt;
use sync_domain::{Document, DocumentId, ShardKey, Value};

/// Política que decide cómo un registro se convierte en intents.
///
/// - `merge = true` (por defecto): el registro se aplana y se compara campo
///   a campo.
/// - `merge = false`: el registro se envía como una única unidad de
///   reemplazo; `keep_none` decide si los campos null se conservan.
/// - `shard_key`: ruta de la clave de partición que debe acompañar al `_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct MergePolicy {
    pub merge: bool,
    pub keep_none: bool,
    pub shard_key: Option<String>,
}

impl Default for MergePolicy {
    fn default() -> Self {
        MergePolicy { merge: true,
                      keep_none: false,
                      shard_key: None }
    }
}

impl MergePolicy {
    pub fn with_shard_key(mut self, path: impl Into<String>) -> Self {
        self.shard_key = Some(path.into());
        self
    }
}

/// Documento al que apunta un intent: identificador más shard key opcional.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentTarget {
    pub id: DocumentId,
    pub shard: Option<ShardKey>,
}

impl IntentTarget {
    pub fn new(id: DocumentId) -> Self {
        Self { id, shard: None }
    }
}

/// Operación que debe cumplirse tras el merge.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationIntent {
    /// El campo debe quedar ausente.
    Remove { target: IntentTarget, path: String },
    /// El campo debe ser igual a `value`.
    Replace { target: IntentTarget, path: String, value: Value },
    /// Cada elemento de `values` debe estar presente en el conjunto, sin
    /// duplicar ni borrar los existentes.
    AppendUnique { target: IntentTarget, path: String, values: Vec<Value> },
    /// Reemplazo del registro completo (merge desactivado). Viaja en el
    /// sub-lote de `Replace`.
    ReplaceDocument { target: IntentTarget, document: Document },
}

impl MutationIntent {
    pub fn target(&self) -> &IntentTarget {
        match self {
            MutationIntent::Remove { target, .. }
            | MutationIntent::Replace { target, .. }
            | MutationIntent::AppendUnique { target, .. }
            | MutationIntent::ReplaceDocument { target, .. } => target,
        }
    }

    pub fn kind(&self) -> IntentKind {
        match self {
            MutationIntent::Remove { .. } => IntentKind::Remove,
            MutationIntent::Replace { .. } | MutationIntent::ReplaceDocument { .. } => IntentKind::Replace,
            MutationIntent::AppendUnique { .. } => IntentKind::AppendUnique,
        }
    }

    /// Ruta afectada; `None` para el reemplazo de documento completo.
    pub fn path(&self) -> Option<&str> {
        match self {
            MutationIntent::Remove { path, .. }
            | MutationIntent::Replace { path, .. }
            | MutationIntent::AppendUnique { path, .. } => Some(path),
            MutationIntent::ReplaceDocument { .. } => None,
        }
    }
}

/// Tipo de sub-lote. El orden de declaración es el orden de envío.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IntentKind {
    Remove,
    Replace,
    AppendUnique,
}

impl IntentKind {
    pub const ORDERED: [IntentKind; 3] = [IntentKind::Remove, IntentKind::Replace, IntentKind::AppendUnique];
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntentKind::Remove => "unset",
            IntentKind::Replace => "set",
            IntentKind::AppendUnique => "add-to-set",
        };
        f.write_str(s)
    }
}
