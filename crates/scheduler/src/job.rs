use crate::errors::TickError;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Datos del tick en curso que el scheduler entrega al trabajo.
#[derive(Debug, Clone, PartialEq)]
pub struct TickContext {
    /// Número de tick, empezando en 1.
    pub tick: u64,
    /// Intento dentro del tick (0 en la primera ejecución).
    pub attempt: u32,
    /// Instante en que empezó el intento, según el reloj del scheduler.
    pub started_at: DateTime<Utc>,
    pub interval: Option<Duration>,
    pub period: Option<Duration>,
    pub limit: Option<usize>,
}

/// Unidad de trabajo con hooks de ciclo de vida.
///
/// Sólo `execute` es obligatorio. Los fallos de `start` y `execute` son
/// fallos del tick; los de `pre_start`, `end` y `follow_end` se registran y
/// no afectan al bucle.
pub trait Job {
    /// Preparación única antes del primer tick.
    fn pre_start(&mut self) -> Result<(), TickError> {
        Ok(())
    }

    /// Preparación de cada intento.
    fn start(&mut self, _ctx: &TickContext) -> Result<(), TickError> {
        Ok(())
    }

    /// Trabajo del tick.
    fn execute(&mut self, ctx: &TickContext) -> Result<(), TickError>;

    /// Cierre de cada tick completado (con éxito o con fallo contenido).
    fn end(&mut self, _ctx: &TickContext) -> Result<(), TickError> {
        Ok(())
    }

    /// Cierre final al detenerse el scheduler.
    fn follow_end(&mut self) -> Result<(), TickError> {
        Ok(())
    }
}

type Hook = Box<dyn FnMut() -> Result<(), TickError> + Send>;
type TickHook = Box<dyn FnMut(&TickContext) -> Result<(), TickError> + Send>;

/// `Job` compuesto a partir de closures.
///
/// ```rust
/// use scheduler::{FnJob, Job};
/// let mut job = FnJob::new(|ctx| {
///                   println!("tick {}", ctx.tick);
///                   Ok(())
///               }).on_follow_end(|| Ok(()));
/// assert!(job.follow_end().is_ok());
/// ```
pub struct FnJob {
    execute: TickHook,
    pre_start: Option<Hook>,
    start: Option<TickHook>,
    end: Option<TickHook>,
    follow_end: Option<Hook>,
}

impl FnJob {
    pub fn new<F>(execute: F) -> Self
        where F: FnMut(&TickContext) -> Result<(), TickError> + Send + 'static
    {
        Self { execute: Box::new(execute),
               pre_start: None,
               start: None,
               end: None,
               follow_end: None }
    }

    pub fn on_pre_start<F>(mut self, hook: F) -> Self
        where F: FnMut() -> Result<(), TickError> + Send + 'static
    {
        self.pre_start = Some(Box::new(hook));
        self
    }

    pub fn on_start<F>(mut self, hook: F) -> Self
        where F: FnMut(&TickContext) -> Result<(), TickError> + Send + 'static
    {
        self.start = Some(Box::new(hook));
        self
    }

    pub fn on_end<F>(mut self, hook: F) -> Self
        where F: FnMut(&TickContext) -> Result<(), TickError> + Send + 'static
    {
        self.end = Some(Box::new(hook));
        self
    }

    pub fn on_follow_end<F>(mut self, hook: F) -> Self
        where F: FnMut() -> Result<(), TickError> + Send + 'static
    {
        self.follow_end = Some(Box::new(hook));
        self
    }
}

impl Job for FnJob {
    fn pre_start(&mut self) -> Result<(), TickError> {
        self.pre_start.as_mut().map_or(Ok(()), |h| h())
    }

    fn start(&mut self, ctx: &TickContext) -> Result<(), TickError> {
        self.start.as_mut().map_or(Ok(()), |h| h(ctx))
    }

    fn execute(&mut self, ctx: &TickContext) -> Result<(), TickError> {
        (self.execute)(ctx)
    }

    fn end(&mut self, ctx: &TickContext) -> Result<(), TickError> {
        self.end.as_mut().map_or(Ok(()), |h| h(ctx))
    }

    fn follow_end(&mut self) -> Result<(), TickError> {
        self.follow_end.as_mut().map_or(Ok(()), |h| h())
    }
}
