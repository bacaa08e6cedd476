mod config;
mod ingest;
mod state_file;

use anyhow::Context;
use config::AppConfig;
use ingest::{IngestJob, IngestSettings, JsonFileSource};
use scheduler::{Scheduler, SystemClock};
use std::sync::Arc;
use sync_domain::FacadeLogSink;
use sync_persistence::DieselDocumentStore;
use tracing_subscriber::EnvFilter;

/// Sincroniza periódicamente el snapshot observado con el store de
/// documentos.
///
/// Toda la configuración llega por variables de entorno (ver `.env`):
/// `DATABASE_URL`, `SYNC_INTERVAL`, `SYNC_PERIOD`, `SYNC_LIMIT`,
/// `SYNC_END_TIMESTAMP`, `SYNC_RETRY`, `SYNC_SNAPSHOT_FILE`,
/// `SYNC_STATE_FILE`, `SYNC_START_TIMESTAMP`, `SYNC_STREAMS`...
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
                             .init();

    let config = AppConfig::from_env().context("configuración no válida")?;
    tracing::info!(database = %config.database_url, schedule = ?config.schedule, "arrancando");

    let last_synced = match &config.state_file {
        Some(path) => state_file::resume_from(path, config.start_timestamp).context("no se pudo preparar el fichero de estado")?,
        None => config.start_timestamp,
    };
    if let Some(ts) = last_synced {
        tracing::info!(last_synced = ts, "reanudando");
    }

    let store = DieselDocumentStore::new(&config.database_url).context("no se pudo abrir el store")?;
    let mut job = IngestJob::new(IngestSettings::from_config(&config, last_synced),
                                 Box::new(JsonFileSource::new(&config.snapshot_file)),
                                 Arc::new(store),
                                 FacadeLogSink::shared("merge"));

    let mut scheduler = Scheduler::new(config.schedule.clone(), Arc::new(SystemClock), FacadeLogSink::shared("scheduler"))
        .context("planificación no válida")?;
    let summary = scheduler.run(&mut job);

    tracing::info!(ticks = summary.ticks,
                   failed = summary.failed_ticks,
                   retries = summary.retries,
                   commands = job.stats().commands,
                   last_synced = ?job.last_synced(),
                   stop = ?summary.stop,
                   "fin");
    Ok(())
}
