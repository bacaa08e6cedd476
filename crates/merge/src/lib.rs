//! Crate `merge` — motor de merge-upsert para registros parciales
//!
//! Dado un documento disperso con los hechos observados en un ciclo, el
//! crate calcula las operaciones mínimas contra el store (borrar campo,
//! reemplazar campo, añadir a conjunto) y las envía como un lote.
//!
//! Diseño resumido:
//! - `flatten`: documento anidado -> rutas `a.b.c` con valores hoja.
//! - `engine::plan`: clasifica cada campo en `Remove` / `Replace` /
//!   `AppendUnique` según la `MergePolicy`.
//! - `service::BatchWriter`: agrupa los intents en tres sub-lotes ordenados
//!   (Remove -> Replace -> AppendUnique) y los envía al `DocumentStore`.
//! - `stubs::InMemoryDocumentStore`: store en memoria para pruebas.
//!
//! Ejemplo rápido:
//! ```rust
//! use merge::{BatchWriter, InMemoryDocumentStore, MergePolicy, MergeUpsert};
//! use sync_domain::FacadeLogSink;
//! let store = InMemoryDocumentStore::new();
//! let upsert = MergeUpsert::new(MergePolicy::default(), FacadeLogSink::shared("merge"));
//! let doc = serde_json::json!({"_id": "u1", "followers": 10});
//! let report = upsert.update_json(&store, "users", vec![doc]).expect("submit");
//! assert_eq!(report.upserted, 1);
//! ```
pub mod apply;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod flatten;
pub mod repository;
pub mod service;
pub mod stubs;

pub use domain::*;
pub use engine::{plan, plan_batch, MergePlanner};
pub use errors::*;
pub use flatten::{flatten, FlatField};
pub use repository::*;
pub use service::*;
pub use stubs::*;
