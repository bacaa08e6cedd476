//! Job de ingesta: lee un snapshot de perfiles, publicaciones y relaciones
//! de seguimiento, lo traduce a registros y lo fusiona en el store.

pub mod job;
pub mod source;
pub mod translate;

pub use job::{IngestJob, IngestSettings};
pub use source::JsonFileSource;
