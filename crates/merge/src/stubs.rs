// Archivo: stubs.rs
// Propósito: implementación en memoria de `DocumentStore` para pruebas y
// wiring rápido. No es durable.
use crate::apply::{is_outdated, upsert_document};
use crate::errors::{Result, StoreError};
use crate::repository::{BatchResult, CommandFailure, DocumentStore, UpsertCommand};
use dashmap::DashMap;
use indexmap::IndexMap;
use std::sync::atomic::{AtomicBool, Ordering};
use sync_domain::{Document, DocumentId};

type Collection = IndexMap<DocumentId, Document>;

/// Store en memoria: una entrada por colección, documentos en orden de
/// creación.
///
/// `set_unavailable(true)` hace que toda operación devuelva
/// `StoreError::Storage`, para simular una caída del backend.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: DashMap<String, Collection>,
    unavailable: AtomicBool,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Número de documentos de una colección.
    pub fn count(&self, collection: &str) -> usize {
        self.collections.get(collection).map(|c| c.len()).unwrap_or(0)
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Storage("store en memoria no disponible".into()));
        }
        Ok(())
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn upsert_batch(&self, collection: &str, commands: &[UpsertCommand]) -> Result<BatchResult> {
        self.check_available()?;
        let mut docs = self.collections.entry(collection.to_string()).or_default();
        let mut result = BatchResult::default();
        for (index, command) in commands.iter().enumerate() {
            match upsert_document(docs.get(&command.id), command) {
                Ok((doc, created)) => {
                    if created {
                        result.upserted += 1;
                    } else {
                        result.matched += 1;
                    }
                    docs.insert(command.id.clone(), doc);
                }
                Err(error) => result.failures.push(CommandFailure { index,
                                                                    id: command.id.clone(),
                                                                    error }),
            }
        }
        Ok(result)
    }

    fn get_doc(&self, collection: &str, id: &DocumentId) -> Result<Option<Document>> {
        self.check_available()?;
        Ok(self.collections.get(collection).and_then(|docs| docs.get(id).cloned()))
    }

    fn get_docs(&self, collection: &str, ids: &[DocumentId]) -> Result<Vec<Document>> {
        self.check_available()?;
        let Some(docs) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };
        if ids.is_empty() {
            return Ok(docs.values().cloned().collect());
        }
        Ok(ids.iter().filter_map(|id| docs.get(id).cloned()).collect())
    }

    fn remove_docs_by_keys(&self, collection: &str, ids: &[DocumentId]) -> Result<usize> {
        self.check_available()?;
        let Some(mut docs) = self.collections.get_mut(collection) else {
            return Ok(0);
        };
        Ok(ids.iter().filter(|id| docs.shift_remove(*id).is_some()).count())
    }

    fn remove_outdated_docs(&self, collection: &str, field: &str, before: f64) -> Result<usize> {
        self.check_available()?;
        let Some(mut docs) = self.collections.get_mut(collection) else {
            return Ok(0);
        };
        let initial = docs.len();
        docs.retain(|_, doc| !is_outdated(doc, field, before));
        Ok(initial - docs.len())
    }
}
