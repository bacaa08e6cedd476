// Archivo: service.rs
// Propósito: `BatchWriter`, que agrupa intents en sub-lotes ordenados y los
// envía al store, y `MergeUpsert`, la capa de alto nivel que planifica y
// envía los registros de un tick.
use crate::domain::{IntentKind, IntentTarget, MergePolicy, MutationIntent};
use crate::engine::plan;
use crate::errors::BatchWriteError;
use crate::repository::{DocumentStore, StoreOperation, UpsertCommand};
use indexmap::IndexMap;
use sync_domain::{DocumentId, Record, SharedLog, ID_FIELD};

/// Resumen de un envío.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Comandos enviados al store (tras agrupar por identificador).
    pub commands: usize,
    pub matched: usize,
    pub upserted: usize,
    pub failed: usize,
    /// Registros descartados antes de planificar (sin `_id` o shard key).
    pub rejected: usize,
}

/// Comandos de un envío, ya separados en los tres sub-lotes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubBatches {
    pub removes: Vec<UpsertCommand>,
    pub replaces: Vec<UpsertCommand>,
    pub appends: Vec<UpsertCommand>,
}

impl SubBatches {
    /// Sub-lotes en orden de envío.
    pub fn ordered(&self) -> [(IntentKind, &[UpsertCommand]); 3] {
        [(IntentKind::Remove, self.removes.as_slice()),
         (IntentKind::Replace, self.replaces.as_slice()),
         (IntentKind::AppendUnique, self.appends.as_slice())]
    }

    pub fn len(&self) -> usize {
        self.removes.len() + self.replaces.len() + self.appends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Escritor por lotes.
///
/// Contrato de orden: todos los `Remove`, luego todos los `Replace`, luego
/// todos los `AppendUnique`. Así un campo borrado en este tick no se
/// repuebla con un append del mismo tick dirigido al valor anterior. Dentro
/// de cada sub-lote los intents del mismo documento se agrupan en un único
/// comando, en orden de primera aparición.
///
/// No guarda conexión entre llamadas: el store se pasa en cada `submit`.
pub struct BatchWriter {
    log: SharedLog,
}

impl BatchWriter {
    pub fn new(log: SharedLog) -> Self {
        Self { log }
    }

    /// Agrupa los intents en los tres sub-lotes.
    pub fn build_commands(intents: &[MutationIntent]) -> SubBatches {
        let mut removes = CommandGroup::default();
        let mut replaces = CommandGroup::default();
        let mut appends = CommandGroup::default();

        for intent in intents {
            match intent {
                MutationIntent::Remove { target, path } => removes.push(target, path.clone()),
                MutationIntent::Replace { target, path, value } => replaces.push(target, (path.clone(), value.clone())),
                MutationIntent::ReplaceDocument { target, document } => {
                    replaces.touch(target);
                    for (key, value) in document.iter().filter(|(k, _)| k.as_str() != ID_FIELD) {
                        replaces.push(target, (key.clone(), value.clone()));
                    }
                }
                MutationIntent::AppendUnique { target, path, values } => appends.push(target, (path.clone(), values.clone())),
            }
        }

        SubBatches { removes: removes.into_commands(StoreOperation::Unset),
                     replaces: replaces.into_commands(StoreOperation::Set),
                     appends: appends.into_commands(StoreOperation::AddToSet) }
    }

    /// Envía los intents al store en tres sub-lotes ordenados con upsert.
    ///
    /// Los errores se registran en el log antes de devolverse; el llamador
    /// debe tratarlos como contenidos (el tick se considera intentado, no
    /// revertido).
    pub fn submit<S>(&self,
                     store: &S,
                     collection: &str,
                     intents: &[MutationIntent])
                     -> Result<BatchReport, BatchWriteError>
        where S: DocumentStore + ?Sized
    {
        let batches = Self::build_commands(intents);
        let mut report = BatchReport { commands: batches.len(),
                                       ..Default::default() };
        if batches.is_empty() {
            return Ok(report);
        }

        for (kind, commands) in batches.ordered() {
            if commands.is_empty() {
                continue;
            }
            match store.upsert_batch(collection, commands) {
                Ok(result) => {
                    report.matched += result.matched;
                    report.upserted += result.upserted;
                    report.failed += result.failures.len();
                    for failure in &result.failures {
                        self.log.warn(&format!("[{}] comando {} ({}) sobre {} falló: {}",
                                               collection, failure.index, kind, failure.id, failure.error));
                    }
                }
                Err(source) => {
                    self.log.error(&format!("[{}] el sub-lote {} ({} comandos) falló: {}",
                                            collection,
                                            kind,
                                            commands.len(),
                                            source));
                    return Err(BatchWriteError::Store { kind, source });
                }
            }
        }

        if report.failed > 0 {
            self.log.error(&format!("[{}] {} de {} comandos fallaron", collection, report.failed, report.commands));
            return Err(BatchWriteError::Partial { failed: report.failed,
                                                  total: report.commands,
                                                  report });
        }
        self.log.info(&format!("[{}] lote aplicado: {} comandos, {} creados, {} modificados",
                               collection, report.commands, report.upserted, report.matched));
        Ok(report)
    }
}

/// Acumula los campos de cada documento manteniendo el orden de
/// aparición; la clave es `_id` más la shard key serializada.
struct CommandGroup<T> {
    entries: IndexMap<(DocumentId, Option<String>), (IntentTarget, Vec<T>)>,
}

impl<T> Default for CommandGroup<T> {
    fn default() -> Self {
        Self { entries: IndexMap::new() }
    }
}

impl<T> CommandGroup<T> {
    fn touch(&mut self, target: &IntentTarget) -> &mut Vec<T> {
        let shard_key = target.shard.as_ref().map(|s| format!("{}={}", s.path, s.value));
        &mut self.entries
                 .entry((target.id.clone(), shard_key))
                 .or_insert_with(|| (target.clone(), Vec::new()))
                 .1
    }

    fn push(&mut self, target: &IntentTarget, item: T) {
        self.touch(target).push(item);
    }

    fn into_commands(self, operation: impl Fn(Vec<T>) -> StoreOperation) -> Vec<UpsertCommand> {
        self.entries
            .into_values()
            .map(|(target, items)| UpsertCommand { id: target.id,
                                                   shard: target.shard,
                                                   operation: operation(items) })
            .collect()
    }
}

/// Capa de alto nivel: valida, planifica y envía los registros de un tick
/// a una colección.
pub struct MergeUpsert {
    policy: MergePolicy,
    writer: BatchWriter,
    log: SharedLog,
}

impl MergeUpsert {
    pub fn new(policy: MergePolicy, log: SharedLog) -> Self {
        Self { policy,
               writer: BatchWriter::new(log.clone()),
               log }
    }

    pub fn policy(&self) -> &MergePolicy {
        &self.policy
    }

    /// Planifica y envía `records`. Los registros sin shard key se
    /// descartan (se registran y se cuentan en `rejected`); el resto se
    /// envía en un único `submit`.
    pub fn update_docs<S>(&self, store: &S, collection: &str, records: &[Record]) -> Result<BatchReport, BatchWriteError>
        where S: DocumentStore + ?Sized
    {
        let mut intents = Vec::new();
        let mut rejected = 0;
        for record in records {
            match plan(record, &self.policy) {
                Ok(planned) => intents.extend(planned),
                Err(e) => {
                    rejected += 1;
                    self.log.warn(&format!("[{}] registro {} descartado: {}", collection, record.id(), e));
                }
            }
        }
        let mut report = self.writer
                             .submit(store, collection, &intents)
                             .map_err(|e| add_rejected(e, rejected))?;
        report.rejected += rejected;
        Ok(report)
    }

    /// Igual que `update_docs` pero parte de documentos JSON; los que no
    /// tienen `_id` válido cuentan como rechazados.
    pub fn update_json<S>(&self,
                          store: &S,
                          collection: &str,
                          docs: Vec<serde_json::Value>)
                          -> Result<BatchReport, BatchWriteError>
        where S: DocumentStore + ?Sized
    {
        let mut records = Vec::with_capacity(docs.len());
        let mut rejected = 0;
        for doc in docs {
            match Record::from_json(doc) {
                Ok(r) => records.push(r),
                Err(e) => {
                    rejected += 1;
                    self.log.warn(&format!("[{}] documento descartado: {}", collection, e));
                }
            }
        }
        let mut report = self.update_docs(store, collection, &records)
                             .map_err(|e| add_rejected(e, rejected))?;
        report.rejected += rejected;
        Ok(report)
    }
}

/// Suma los registros descartados al informe de un envío parcial.
fn add_rejected(err: BatchWriteError, rejected: usize) -> BatchWriteError {
    match err {
        BatchWriteError::Partial { failed, total, mut report } => {
            report.rejected += rejected;
            BatchWriteError::Partial { failed, total, report }
        }
        other => other,
    }
}
