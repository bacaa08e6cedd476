use sync_domain::DomainError;
use thiserror::Error;

// Errores del scheduler.
//
// `ScheduleError` agrupa los errores de configuración detectados al
// construir el `Scheduler`; `TickError` es lo que devuelve un `Job` cuando
// un tick falla. Ninguno de los dos termina el bucle de ejecución.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    /// Intervalo nulo, menor de un segundo o con fracción de segundo.
    #[error("Intervalo no válido: {0}")]
    InvalidInterval(String),

    /// Cualquier otra combinación de parámetros incoherente.
    #[error("Configuración no válida: {0}")]
    InvalidConfig(String),
}

/// Fallo de un tick. Se registra y, según `retry_on_error`, se reintenta o
/// se da el tick por terminado.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TickError {
    /// El trabajo principal del tick falló.
    #[error("Error de ejecución: {0}")]
    Execution(String),

    /// Un hook del ciclo de vida falló.
    #[error("Error en el hook {hook}: {message}")]
    Hook { hook: &'static str, message: String },

    /// Los datos producidos por el tick no eran válidos.
    #[error("Error de dominio: {0}")]
    Domain(#[from] DomainError),
}

impl TickError {
    /// Atajo para envolver cualquier error mostrable como fallo de
    /// ejecución.
    pub fn execution(err: impl std::fmt::Display) -> Self {
        TickError::Execution(err.to_string())
    }

    pub fn hook(hook: &'static str, err: impl std::fmt::Display) -> Self {
        TickError::Hook { hook,
                          message: err.to_string() }
    }
}
