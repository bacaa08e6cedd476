use crate::errors::ScheduleError;
use std::time::Duration;

/// Espera fija antes de reintentar un tick fallido.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Configuración de una ejecución periódica.
///
/// - `interval`: separación de la rejilla de ticks. `None` ejecuta un solo
///   tick.
/// - `period` / `limit`: indicaciones que el scheduler no interpreta; se
///   entregan al trabajo en cada `TickContext`.
/// - `end_timestamp`: segundo (época) a partir del cual no se programa
///   ningún tick más. Sólo se comprueba entre ticks.
/// - `retry_on_error`: reintentar el tick tras `retry_delay` si falla.
/// - `max_retries`: tope de reintentos por tick; `None` reintenta sin
///   límite.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    pub interval: Option<Duration>,
    pub period: Option<Duration>,
    pub limit: Option<usize>,
    pub end_timestamp: Option<i64>,
    pub retry_on_error: bool,
    pub retry_delay: Duration,
    pub max_retries: Option<u32>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig { interval: None,
                         period: None,
                         limit: None,
                         end_timestamp: None,
                         retry_on_error: true,
                         retry_delay: DEFAULT_RETRY_DELAY,
                         max_retries: None }
    }
}

impl ScheduleConfig {
    /// Configuración repetitiva cada `interval`.
    pub fn every(interval: Duration) -> Self {
        Self { interval: Some(interval),
               ..Self::default() }
    }

    pub fn with_end_timestamp(mut self, end_timestamp: i64) -> Self {
        self.end_timestamp = Some(end_timestamp);
        self
    }

    pub fn with_retry(mut self, retry_on_error: bool) -> Self {
        self.retry_on_error = retry_on_error;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = Some(period);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Intervalo en segundos enteros, si hay.
    pub fn interval_secs(&self) -> Option<i64> {
        self.interval.map(|d| d.as_secs() as i64)
    }

    /// Comprueba que el intervalo sea un número entero de segundos >= 1.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if let Some(interval) = self.interval {
            if interval.as_secs() == 0 {
                return Err(ScheduleError::InvalidInterval(format!("{:?} es menor de un segundo", interval)));
            }
            if interval.subsec_nanos() != 0 {
                return Err(ScheduleError::InvalidInterval(format!("{:?} no es un número entero de segundos",
                                                                  interval)));
            }
        }
        if self.limit == Some(0) {
            return Err(ScheduleError::InvalidConfig("limit debe ser mayor que cero".into()));
        }
        Ok(())
    }
}
