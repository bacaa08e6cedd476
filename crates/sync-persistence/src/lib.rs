//! Persistencia SQLite para el trait `merge::DocumentStore`.
//! Expone el módulo `schema` y reexporta el store Diesel; la
//! implementación está en `document_persistence.rs`.

mod document_persistence;
pub mod schema;

pub use document_persistence::{DieselDocumentStore, DEFAULT_DATABASE_URL};
