// Archivo: errors.rs
// Propósito: errores del store de documentos y del envío por lotes.
use crate::domain::IntentKind;
use crate::service::BatchReport;
use thiserror::Error;

/// Errores del store de documentos.
///
/// - `NotFound`: documento o colección inexistente.
/// - `Conflict`: la operación choca con el contenido actual (shard key
///   distinta, ruta que atraviesa un escalar, campo no-lista en un
///   add-to-set).
/// - `Storage`: error del almacenamiento subyacente (BD, pool, etc.).
/// - `Other`: cualquier otro error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
  #[error("No encontrado: {0}")]
  NotFound(String),
  #[error("Conflicto: {0}")]
  Conflict(String),
  #[error("Error de almacenamiento: {0}")]
  Storage(String),
  #[error("Otro: {0}")]
  Other(String),
}

/// Alias de resultado usado por las APIs del store.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Fallo agregado de un envío de `BatchWriter::submit`. Ya fue registrado
/// en el log cuando llega al llamador.
#[derive(Error, Debug, Clone)]
pub enum BatchWriteError {
  /// El store rechazó un sub-lote completo; los sub-lotes siguientes no se
  /// enviaron.
  #[error("falló el sub-lote {kind}: {source}")]
  Store {
    kind: IntentKind,
    #[source]
    source: StoreError,
  },
  /// Algunos comandos fallaron de forma independiente; el resto se aplicó.
  #[error("{failed} de {total} comandos fallaron")]
  Partial { failed: usize, total: usize, report: BatchReport },
}
