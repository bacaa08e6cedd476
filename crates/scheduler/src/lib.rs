//! scheduler: ejecución periódica de un trabajo alineada a una rejilla fija
//!
//! El `Scheduler` invoca un `Job` una vez por tick. Los ticks caen en
//! múltiplos exactos del intervalo contados desde la época, de modo que un
//! tick que se alarga no desplaza a los siguientes. Los fallos del trabajo
//! se registran y se contienen: nunca terminan el proceso.
//!
//! El tiempo se obtiene de un `Clock` inyectado (`SystemClock` en
//! producción, `ManualClock` en pruebas) y el log de un `SharedLog`.

pub mod clock;
pub mod config;
pub mod engine;
pub mod errors;
pub mod job;
pub mod timing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ScheduleConfig, DEFAULT_RETRY_DELAY};
pub use engine::{RunSummary, Scheduler, SchedulerState, StopReason};
pub use errors::{ScheduleError, TickError};
pub use job::{FnJob, Job, TickContext};
pub use timing::{next_aligned_instant, next_aligned_timestamp, round_timestamp};
