mod errors;
mod log_sink;
mod record;
mod value;

pub use errors::DomainError;
pub use log_sink::{FacadeLogSink, LogSink, MemoryLogSink, SharedLog};
pub use record::{DocumentId, Record, ShardKey, ID_FIELD};
pub use value::{get_path, strip_nulls, Document, Value};
