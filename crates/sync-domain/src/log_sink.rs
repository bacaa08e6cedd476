// log_sink.rs
use log::Level;
use std::sync::{Arc, Mutex};

/// Capacidad de logging inyectada en los componentes al construirlos.
///
/// No hay logger global: cada componente recibe su `SharedLog` y escribe
/// a través de él durante toda la vida del proceso.
pub trait LogSink: Send + Sync {
  fn log(&self, level: Level, message: &str);

  fn info(&self, message: &str) {
    self.log(Level::Info, message)
  }

  fn warn(&self, message: &str) {
    self.log(Level::Warn, message)
  }

  fn error(&self, message: &str) {
    self.log(Level::Error, message)
  }
}

pub type SharedLog = Arc<dyn LogSink>;

/// Reenvía los mensajes a la fachada `log` con un target por componente.
#[derive(Debug, Clone)]
pub struct FacadeLogSink {
  target: String,
}

impl FacadeLogSink {
  pub fn new(target: impl Into<String>) -> Self {
    Self { target: target.into() }
  }

  pub fn shared(target: impl Into<String>) -> SharedLog {
    Arc::new(Self::new(target))
  }
}

impl LogSink for FacadeLogSink {
  fn log(&self, level: Level, message: &str) {
    log::log!(target: self.target.as_str(), level, "{}", message);
  }
}

/// Sink en memoria para pruebas: guarda cada entrada con su nivel.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
  entries: Mutex<Vec<(Level, String)>>,
}

impl MemoryLogSink {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn entries(&self) -> Vec<(Level, String)> {
    self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
  }

  /// Cuenta las entradas de un nivel dado.
  pub fn count(&self, level: Level) -> usize {
    self.entries().iter().filter(|(l, _)| *l == level).count()
  }

  pub fn contains(&self, needle: &str) -> bool {
    self.entries().iter().any(|(_, m)| m.contains(needle))
  }
}

impl LogSink for MemoryLogSink {
  fn log(&self, level: Level, message: &str) {
    self.entries.lock().unwrap_or_else(|e| e.into_inner()).push((level, message.to_string()));
  }
}
