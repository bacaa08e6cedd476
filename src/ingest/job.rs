// Archivo: job.rs
// Propósito: `IngestJob`, el trabajo que ejecuta el scheduler en cada tick:
// lee el snapshot, lo traduce a registros y los envía con merge-upsert a
// cada colección.
use super::source::{RecordSource, Snapshot};
use super::translate::{follow_record, post_record, profile_record, select_posts, TranslateOptions, DEFAULT_ROUND_SECS,
                       FOLLOWS_COLLECTION, POSTS_COLLECTION, USERS_COLLECTION};
use crate::config::{AppConfig, Stream};
use crate::state_file::write_last_synced;
use merge::{BatchWriteError, DocumentStore, MergePolicy, MergeUpsert};
use scheduler::{round_timestamp, Job, TickContext, TickError};
use std::path::PathBuf;
use std::sync::Arc;
use sync_domain::{DomainError, Record, SharedLog};
use tokio::runtime::Runtime;
use uuid::Uuid;

/// Parámetros del job que no cambian entre ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSettings {
    pub streams: Vec<Stream>,
    pub policy: MergePolicy,
    pub state_file: Option<PathBuf>,
    /// Último instante sincronizado al arrancar.
    pub last_synced: Option<i64>,
}

impl IngestSettings {
    pub fn from_config(config: &AppConfig, last_synced: Option<i64>) -> Self {
        Self { streams: config.streams.clone(),
               policy: config.policy.clone(),
               state_file: config.state_file.clone(),
               last_synced }
    }

    pub fn wants(&self, stream: Stream) -> bool {
        self.streams.contains(&stream)
    }
}

/// Contadores acumulados durante la ejecución.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub ticks: u64,
    /// Comandos enviados al store.
    pub commands: usize,
    pub failed_commands: usize,
    /// Sub-lotes rechazados por completo por el store.
    pub failed_batches: usize,
    /// Registros descartados antes de planificar.
    pub rejected: usize,
}

pub struct IngestJob {
    settings: IngestSettings,
    source: Box<dyn RecordSource>,
    store: Arc<dyn DocumentStore>,
    upsert: MergeUpsert,
    runtime: Option<Runtime>,
    stats: IngestStats,
}

fn build_runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread().enable_all().build()
}

impl IngestJob {
    pub fn new(settings: IngestSettings,
               source: Box<dyn RecordSource>,
               store: Arc<dyn DocumentStore>,
               log: SharedLog)
               -> Self {
        let upsert = MergeUpsert::new(settings.policy.clone(), log);
        Self { settings,
               source,
               store,
               upsert,
               runtime: None,
               stats: IngestStats::default() }
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn last_synced(&self) -> Option<i64> {
        self.settings.last_synced
    }

    fn fetch(&mut self) -> Result<Snapshot, TickError> {
        let runtime = match self.runtime.take() {
            Some(rt) => rt,
            None => build_runtime().map_err(TickError::execution)?,
        };
        let fetched = runtime.block_on(self.source.fetch());
        self.runtime = Some(runtime);
        fetched.map_err(TickError::execution)
    }

    fn options(&self, ctx: &TickContext) -> TranslateOptions {
        TranslateOptions { now: ctx.started_at.timestamp(),
                           round: ctx.interval
                                     .map(|i| i.as_secs() as i64)
                                     .filter(|s| *s > 0)
                                     .unwrap_or(DEFAULT_ROUND_SECS),
                           period: ctx.period.map(|p| p.as_secs() as i64),
                           limit: ctx.limit,
                           last_synced: self.settings.last_synced }
    }

    /// Traduce las entradas de un flujo. Las que no forman un registro
    /// válido se descartan y se cuentan.
    fn collect<T, F>(&mut self, collection: &str, items: &[T], translate: F) -> Vec<Record>
        where F: Fn(&T) -> Result<Record, DomainError>
    {
        let mut records = Vec::with_capacity(items.len());
        for item in items {
            match translate(item) {
                Ok(r) => records.push(r),
                Err(e) => {
                    self.stats.rejected += 1;
                    tracing::warn!(collection, error = %e, "entrada descartada");
                }
            }
        }
        records
    }

    /// Envía los registros de una colección. Devuelve `false` si el store
    /// rechazó un sub-lote completo.
    fn write(&mut self, collection: &str, records: &[Record]) -> bool {
        if records.is_empty() {
            return true;
        }
        match self.upsert.update_docs(&*self.store, collection, records) {
            Ok(report) => {
                tracing::info!(collection,
                               commands = report.commands,
                               upserted = report.upserted,
                               matched = report.matched,
                               "colección actualizada");
                self.stats.commands += report.commands;
                self.stats.rejected += report.rejected;
                true
            }
            Err(BatchWriteError::Partial { failed, report, .. }) => {
                self.stats.commands += report.commands;
                self.stats.failed_commands += failed;
                self.stats.rejected += report.rejected;
                true
            }
            Err(BatchWriteError::Store { kind, source }) => {
                tracing::error!(collection, %kind, error = %source, "sub-lote rechazado");
                self.stats.failed_batches += 1;
                false
            }
        }
    }
}

impl Job for IngestJob {
    fn pre_start(&mut self) -> Result<(), TickError> {
        tracing::info!(source = %self.source.describe(), streams = ?self.settings.streams, "preparando ingesta");
        self.runtime = Some(build_runtime().map_err(|e| TickError::hook("pre_start", e))?);
        Ok(())
    }

    fn execute(&mut self, ctx: &TickContext) -> Result<(), TickError> {
        let span = tracing::info_span!("tick", id = %Uuid::new_v4(), n = ctx.tick, attempt = ctx.attempt);
        let _guard = span.enter();

        let snapshot = self.fetch()?;
        let opts = self.options(ctx);
        let mut failed = Vec::new();

        if self.settings.wants(Stream::Profiles) {
            let records = self.collect(USERS_COLLECTION, &snapshot.profiles, |p| profile_record(p, &opts));
            if !self.write(USERS_COLLECTION, &records) {
                failed.push(USERS_COLLECTION);
            }
        }
        if self.settings.wants(Stream::Posts) {
            let posts: Vec<_> = select_posts(&snapshot.posts, &opts).into_iter().cloned().collect();
            let records = self.collect(POSTS_COLLECTION, &posts, |p| post_record(p, &opts));
            if !self.write(POSTS_COLLECTION, &records) {
                failed.push(POSTS_COLLECTION);
            }
        }
        if self.settings.wants(Stream::Follows) {
            let records = self.collect(FOLLOWS_COLLECTION, &snapshot.follows, follow_record);
            if !self.write(FOLLOWS_COLLECTION, &records) {
                failed.push(FOLLOWS_COLLECTION);
            }
        }

        if !failed.is_empty() {
            return Err(TickError::execution(format!("el store rechazó escrituras en {}", failed.join(", "))));
        }

        // Se guarda el límite de la rejilla, no el instante exacto del tick.
        let boundary = round_timestamp(opts.now, opts.round);
        self.settings.last_synced = Some(boundary);
        if let Some(path) = &self.settings.state_file {
            write_last_synced(path, boundary).map_err(TickError::execution)?;
        }
        Ok(())
    }

    fn end(&mut self, _ctx: &TickContext) -> Result<(), TickError> {
        self.stats.ticks += 1;
        Ok(())
    }

    fn follow_end(&mut self) -> Result<(), TickError> {
        let s = &self.stats;
        tracing::info!(ticks = s.ticks,
                       commands = s.commands,
                       failed_commands = s.failed_commands,
                       failed_batches = s.failed_batches,
                       rejected = s.rejected,
                       "ingesta terminada");
        self.runtime = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::JsonFileSource;
    use merge::InMemoryDocumentStore;
    use scheduler::{ManualClock, ScheduleConfig, Scheduler};
    use serde_json::json;
    use std::path::Path;
    use std::time::Duration;
    use sync_domain::{DocumentId, FacadeLogSink, Value};

    fn snapshot_file(dir: &Path, followers: i64) -> PathBuf {
        let path = dir.join("snapshot.json");
        let body = json!({
            "profiles": [{"id": "42", "userName": "trava_finance", "followersCount": followers}],
            "posts": [{"id": "p1", "author": "42", "timestamp": 90_000, "views": 7},
                      {"id": "p0", "author": "42", "timestamp": 10}],
            "follows": [{"from": "9", "to": "42"}]
        });
        std::fs::write(&path, body.to_string()).unwrap();
        path
    }

    fn settings(streams: Vec<Stream>, state_file: Option<PathBuf>) -> IngestSettings {
        IngestSettings { streams,
                         policy: MergePolicy::default(),
                         state_file,
                         last_synced: None }
    }

    fn run_once(job: &mut IngestJob, at: i64) -> scheduler::RunSummary {
        let config = ScheduleConfig::default().with_retry(false)
                                              .with_period(Duration::from_secs(86_400));
        let mut scheduler = Scheduler::new(config, Arc::new(ManualClock::at(at)), FacadeLogSink::shared("test")).unwrap();
        scheduler.run(job)
    }

    #[test]
    fn single_tick_writes_every_stream_and_the_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("last_synced.txt");
        let store = Arc::new(InMemoryDocumentStore::new());
        let mut job = IngestJob::new(settings(Stream::ALL.to_vec(), Some(state.clone())),
                                     Box::new(JsonFileSource::new(snapshot_file(dir.path(), 10))),
                                     store.clone(),
                                     FacadeLogSink::shared("merge"));

        let summary = run_once(&mut job, 90_061);

        assert_eq!(summary.ticks, 1);
        assert_eq!(summary.failed_ticks, 0);
        assert_eq!(store.count(USERS_COLLECTION), 1);
        assert_eq!(store.count(POSTS_COLLECTION), 2);
        assert_eq!(store.count(FOLLOWS_COLLECTION), 1);
        assert!(store.get_doc(FOLLOWS_COLLECTION, &DocumentId::from("9_42")).unwrap().is_some());
        assert_eq!(crate::state_file::read_last_synced(&state).unwrap(), 90_000);
        assert_eq!(job.last_synced(), Some(90_000));
        assert_eq!(job.stats().ticks, 1);
    }

    #[test]
    fn successive_ticks_accumulate_count_logs() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryDocumentStore::new());
        let source = snapshot_file(dir.path(), 10);
        let mut job = IngestJob::new(settings(vec![Stream::Profiles], None),
                                     Box::new(JsonFileSource::new(&source)),
                                     store.clone(),
                                     FacadeLogSink::shared("merge"));
        run_once(&mut job, 90_061);
        snapshot_file(dir.path(), 11);
        run_once(&mut job, 93_661);

        let doc = store.get_doc(USERS_COLLECTION, &DocumentId::from("42")).unwrap().unwrap();
        let logs = doc["countLogs"].as_map().unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs["90000"].as_map().unwrap()["followersCount"], Value::Int(10));
        assert_eq!(logs["93600"].as_map().unwrap()["followersCount"], Value::Int(11));
        assert_eq!(doc["followersCount"], Value::Int(11));
        assert_eq!(store.count(POSTS_COLLECTION), 0);
    }

    #[test]
    fn old_posts_are_skipped_once_synced() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryDocumentStore::new());
        let mut s = settings(vec![Stream::Posts], None);
        s.last_synced = Some(90_000);
        let mut job = IngestJob::new(s,
                                     Box::new(JsonFileSource::new(snapshot_file(dir.path(), 10))),
                                     store.clone(),
                                     FacadeLogSink::shared("merge"));
        run_once(&mut job, 90_061);

        assert_eq!(store.count(POSTS_COLLECTION), 1);
        let post = store.get_doc(POSTS_COLLECTION, &DocumentId::from("p1")).unwrap().unwrap();
        assert!(post.contains_key("impressionLogs"));
    }

    #[test]
    fn unreadable_source_fails_the_tick_without_advancing_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("last_synced.txt");
        let store = Arc::new(InMemoryDocumentStore::new());
        let mut job = IngestJob::new(settings(Stream::ALL.to_vec(), Some(state.clone())),
                                     Box::new(JsonFileSource::new(dir.path().join("missing.json"))),
                                     store.clone(),
                                     FacadeLogSink::shared("merge"));

        let summary = run_once(&mut job, 90_061);

        assert_eq!(summary.failed_ticks, 1);
        assert!(!state.exists());
        assert_eq!(job.last_synced(), None);
        assert_eq!(job.stats().ticks, 1);
    }

    #[test]
    fn unavailable_store_fails_the_tick() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryDocumentStore::new());
        store.set_unavailable(true);
        let mut job = IngestJob::new(settings(Stream::ALL.to_vec(), None),
                                     Box::new(JsonFileSource::new(snapshot_file(dir.path(), 10))),
                                     store.clone(),
                                     FacadeLogSink::shared("merge"));

        let summary = run_once(&mut job, 90_061);

        assert_eq!(summary.failed_ticks, 1);
        assert_eq!(job.stats().failed_batches, 3);
        assert_eq!(job.last_synced(), None);
    }
}
