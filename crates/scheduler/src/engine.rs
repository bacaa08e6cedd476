// Archivo: engine.rs
// Propósito: bucle de ejecución del scheduler. Ejecuta los hooks del `Job`
// en orden, contiene los fallos y alinea cada tick a la rejilla del
// intervalo.
use crate::clock::Clock;
use crate::config::ScheduleConfig;
use crate::errors::{ScheduleError, TickError};
use crate::job::{Job, TickContext};
use crate::timing::next_aligned_timestamp;
use std::sync::Arc;
use std::time::Duration;
use sync_domain::SharedLog;

/// Estado del scheduler.
///
/// `Idle → Running → (Succeeded | Failed) → [Retrying → Running]* → Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Succeeded,
    Failed,
    Retrying,
    Stopped,
}

/// Motivo por el que terminó `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Sin intervalo: se ejecutó un único tick.
    SingleRun,
    /// El siguiente tick (`next`) quedaba después de `end_timestamp`.
    EndTimestamp { next: i64 },
}

/// Resumen de una ejecución completa.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks completados.
    pub ticks: u64,
    /// Ticks que terminaron con un fallo contenido.
    pub failed_ticks: u64,
    /// Reintentos realizados en total.
    pub retries: u64,
    pub stop: StopReason,
}

pub struct Scheduler {
    config: ScheduleConfig,
    clock: Arc<dyn Clock>,
    log: SharedLog,
    state: SchedulerState,
}

impl Scheduler {
    /// Crea el scheduler validando la configuración.
    pub fn new(config: ScheduleConfig, clock: Arc<dyn Clock>, log: SharedLog) -> Result<Self, ScheduleError> {
        config.validate()?;
        Ok(Self { config,
                  clock,
                  log,
                  state: SchedulerState::Idle })
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Ejecuta `job` hasta que se cumpla una condición de parada.
    ///
    /// Nunca se ejecutan dos ticks a la vez y ningún fallo del trabajo
    /// termina el bucle.
    pub fn run<J>(&mut self, job: &mut J) -> RunSummary
        where J: Job + ?Sized
    {
        if let Err(e) = job.pre_start() {
            self.log.error(&format!("pre_start falló: {}", e));
        }

        let mut ticks = 0u64;
        let mut failed_ticks = 0u64;
        let mut retries = 0u64;

        let stop = loop {
            ticks += 1;
            let (ctx, outcome, tick_retries) = self.run_tick(job, ticks);
            retries += tick_retries as u64;
            if outcome.is_err() {
                failed_ticks += 1;
            }

            if let Err(e) = job.end(&ctx) {
                self.log.error(&format!("end del tick {} falló: {}", ticks, e));
            }

            let Some(interval) = self.config.interval_secs() else {
                break StopReason::SingleRun;
            };

            let now = self.clock.now();
            let next = next_aligned_timestamp(now.timestamp(), interval);
            if let Some(end) = self.config.end_timestamp {
                if next > end {
                    self.log.info(&format!("siguiente tick {} posterior a end_timestamp {}; fin", next, end));
                    break StopReason::EndTimestamp { next };
                }
            }

            let wait_ms = next * 1000 - now.timestamp_millis();
            if wait_ms > 0 {
                self.log.info(&format!("durmiendo {:.3} segundos", wait_ms as f64 / 1000.0));
                self.clock.sleep(Duration::from_millis(wait_ms as u64));
            }
        };

        self.state = SchedulerState::Stopped;
        if let Err(e) = job.follow_end() {
            self.log.error(&format!("follow_end falló: {}", e));
        }
        RunSummary { ticks,
                     failed_ticks,
                     retries,
                     stop }
    }

    /// Ejecuta un tick con sus reintentos. Devuelve el contexto del último
    /// intento, el resultado y el número de reintentos hechos.
    fn run_tick<J>(&mut self, job: &mut J, tick: u64) -> (TickContext, Result<(), TickError>, u32)
        where J: Job + ?Sized
    {
        let mut attempt = 0u32;
        loop {
            self.state = SchedulerState::Running;
            let ctx = TickContext { tick,
                                    attempt,
                                    started_at: self.clock.now(),
                                    interval: self.config.interval,
                                    period: self.config.period,
                                    limit: self.config.limit };

            let outcome = job.start(&ctx).and_then(|_| job.execute(&ctx));
            let err = match outcome {
                Ok(()) => {
                    self.state = SchedulerState::Succeeded;
                    self.log.info(&format!("tick {} completado", tick));
                    return (ctx, Ok(()), attempt);
                }
                Err(e) => e,
            };

            self.state = SchedulerState::Failed;
            self.log.warn(&format!("algo salió mal en el tick {} (intento {}): {}", tick, attempt, err));

            let may_retry = self.config.retry_on_error && self.config.max_retries.map_or(true, |max| attempt < max);
            if !may_retry {
                if self.config.retry_on_error {
                    self.log.error(&format!("tick {} abandonado tras {} reintentos", tick, attempt));
                }
                return (ctx, Err(err), attempt);
            }

            self.state = SchedulerState::Retrying;
            self.log.warn(&format!("reintento en {:?}", self.config.retry_delay));
            self.clock.sleep(self.config.retry_delay);
            attempt += 1;
        }
    }
}
