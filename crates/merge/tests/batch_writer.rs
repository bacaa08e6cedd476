use log::Level;
use merge::{BatchResult, BatchWriteError, BatchWriter, CommandFailure, DocumentStore, InMemoryDocumentStore, IntentKind,
            IntentTarget, MergePolicy, MergeUpsert, MutationIntent, StoreError, StoreOperation, UpsertCommand};
use serde_json::json;
use std::sync::{Arc, Mutex};
use sync_domain::{Document, DocumentId, MemoryLogSink, SharedLog, Value};

/// Store que sólo registra los lotes recibidos; puede fallar en un
/// sub-lote concreto o rechazar comandos sueltos.
#[derive(Default)]
struct RecordingStore {
  calls: Mutex<Vec<Vec<UpsertCommand>>>,
  fail_on_call: Option<usize>,
  reject_ids: Vec<DocumentId>,
}

impl RecordingStore {
  fn calls(&self) -> Vec<Vec<UpsertCommand>> {
    self.calls.lock().unwrap().clone()
  }
}

impl DocumentStore for RecordingStore {
  fn upsert_batch(&self, _collection: &str, commands: &[UpsertCommand]) -> merge::Result<BatchResult> {
    let mut calls = self.calls.lock().unwrap();
    calls.push(commands.to_vec());
    if self.fail_on_call == Some(calls.len()) {
      return Err(StoreError::Storage("conexión rechazada".into()));
    }
    let mut result = BatchResult::default();
    for (index, c) in commands.iter().enumerate() {
      if self.reject_ids.contains(&c.id) {
        result.failures.push(CommandFailure { index,
                                              id: c.id.clone(),
                                              error: StoreError::Conflict("rechazado".into()) });
      } else {
        result.upserted += 1;
      }
    }
    Ok(result)
  }

  fn get_doc(&self, _: &str, _: &DocumentId) -> merge::Result<Option<Document>> {
    Ok(None)
  }

  fn get_docs(&self, _: &str, _: &[DocumentId]) -> merge::Result<Vec<Document>> {
    Ok(Vec::new())
  }

  fn remove_docs_by_keys(&self, _: &str, _: &[DocumentId]) -> merge::Result<usize> {
    Ok(0)
  }

  fn remove_outdated_docs(&self, _: &str, _: &str, _: f64) -> merge::Result<usize> {
    Ok(0)
  }
}

fn target(id: &str) -> IntentTarget {
  IntentTarget::new(id.into())
}

fn mixed_intents() -> Vec<MutationIntent> {
  vec![MutationIntent::AppendUnique { target: target("u1"),
                                      path: "tags".into(),
                                      values: vec!["a".into()] },
       MutationIntent::Replace { target: target("u1"),
                                 path: "name".into(),
                                 value: "alice".into() },
       MutationIntent::Remove { target: target("u2"),
                                path: "bio".into() },
       MutationIntent::Replace { target: target("u2"),
                                 path: "name".into(),
                                 value: "bob".into() },
       MutationIntent::Remove { target: target("u1"),
                                path: "tags".into() },
       MutationIntent::Replace { target: target("u1"),
                                 path: "age".into(),
                                 value: Value::Int(30) },]
}

fn memory_log() -> (Arc<MemoryLogSink>, SharedLog) {
  let sink = Arc::new(MemoryLogSink::new());
  let shared: SharedLog = sink.clone();
  (sink, shared)
}

fn json_doc(doc: Option<Document>) -> serde_json::Value {
  doc.map(|d| serde_json::Value::from(Value::Map(d))).unwrap_or(serde_json::Value::Null)
}

#[test]
fn sub_batches_are_sent_remove_then_replace_then_append() {
  let store = RecordingStore::default();
  let (_, log) = memory_log();
  let report = BatchWriter::new(log).submit(&store, "users", &mixed_intents()).unwrap();

  let calls = store.calls();
  assert_eq!(calls.len(), 3);
  assert!(calls[0].iter().all(|c| matches!(c.operation, StoreOperation::Unset(_))));
  assert!(calls[1].iter().all(|c| matches!(c.operation, StoreOperation::Set(_))));
  assert!(calls[2].iter().all(|c| matches!(c.operation, StoreOperation::AddToSet(_))));

  // un comando por documento, en orden de primera aparición
  let ids: Vec<String> = calls[0].iter().map(|c| c.id.to_string()).collect();
  assert_eq!(ids, vec!["u2", "u1"]);
  let ids: Vec<String> = calls[1].iter().map(|c| c.id.to_string()).collect();
  assert_eq!(ids, vec!["u1", "u2"]);
  assert_eq!(calls[1][0].operation,
             StoreOperation::Set(vec![("name".into(), "alice".into()), ("age".into(), Value::Int(30))]));
  assert_eq!(report.commands, 5);
}

#[test]
fn empty_sub_batches_are_skipped() {
  let store = RecordingStore::default();
  let (_, log) = memory_log();
  let intents = vec![MutationIntent::Replace { target: target("u1"),
                                               path: "name".into(),
                                               value: "x".into() }];
  BatchWriter::new(log).submit(&store, "users", &intents).unwrap();
  assert_eq!(store.calls().len(), 1);

  let (_, log) = memory_log();
  let report = BatchWriter::new(log).submit(&store, "users", &[]).unwrap();
  assert_eq!(report.commands, 0);
  assert_eq!(store.calls().len(), 1);
}

#[test]
fn transport_failure_aborts_later_sub_batches_and_is_logged() {
  let store = RecordingStore { fail_on_call: Some(2),
                               ..Default::default() };
  let (sink, log) = memory_log();
  let err = BatchWriter::new(log).submit(&store, "users", &mixed_intents()).unwrap_err();

  match err {
    BatchWriteError::Store { kind, source } => {
      assert_eq!(kind, IntentKind::Replace);
      assert!(matches!(source, StoreError::Storage(_)));
    }
    other => panic!("error inesperado: {:?}", other),
  }
  assert_eq!(store.calls().len(), 2);
  assert_eq!(sink.count(Level::Error), 1);
  assert!(sink.contains("conexión rechazada"));
}

#[test]
fn per_command_failures_do_not_stop_the_batch() {
  let store = RecordingStore { reject_ids: vec!["u2".into()],
                               ..Default::default() };
  let (sink, log) = memory_log();
  let err = BatchWriter::new(log).submit(&store, "users", &mixed_intents()).unwrap_err();

  assert_eq!(store.calls().len(), 3);
  match err {
    BatchWriteError::Partial { failed, total, report } => {
      assert_eq!(failed, 2);
      assert_eq!(total, 5);
      assert_eq!(report.upserted, 3);
    }
    other => panic!("error inesperado: {:?}", other),
  }
  assert_eq!(sink.count(Level::Warn), 2);
  assert_eq!(sink.count(Level::Error), 1);
}

#[test]
fn end_to_end_merge_against_memory_store() {
  let store = InMemoryDocumentStore::new();
  let (sink, log) = memory_log();
  let upsert = MergeUpsert::new(MergePolicy::default(), log);

  upsert.update_json(&store, "users", vec![json!({"_id": "u1", "name": "alice", "bio": "hi", "tags": ["a"]})])
        .unwrap();
  let report = upsert.update_json(&store,
                                  "users",
                                  vec![json!({"_id": "u1", "bio": null, "tags": ["a", "", "b", "a"],
                                              "countLogs": {"3600": {"followers": 10}}})])
                     .unwrap();
  assert_eq!(report.matched, 3);
  assert_eq!(report.upserted, 0);

  let doc = store.get_doc("users", &"u1".into()).unwrap();
  assert_eq!(json_doc(doc),
             json!({"_id": "u1", "name": "alice", "tags": ["a", "b"], "countLogs": {"3600": {"followers": 10}}}));
  assert!(sink.count(Level::Info) >= 2);
}

#[test]
fn applying_the_same_record_twice_is_idempotent() {
  let store = InMemoryDocumentStore::new();
  let (_, log) = memory_log();
  let upsert = MergeUpsert::new(MergePolicy::default(), log);
  let record = json!({"_id": 1, "a": {"b": 2}, "gone": null, "set": [1, 2, 2]});

  upsert.update_json(&store, "c", vec![record.clone()]).unwrap();
  let first = store.get_doc("c", &1i64.into()).unwrap();
  upsert.update_json(&store, "c", vec![record]).unwrap();
  let second = store.get_doc("c", &1i64.into()).unwrap();

  assert_eq!(first, second);
  assert_eq!(json_doc(second), json!({"_id": 1, "a": {"b": 2}, "set": [1, 2]}));
}

#[test]
fn merge_off_round_trips_the_record() {
  let store = InMemoryDocumentStore::new();
  let (_, log) = memory_log();
  let policy = MergePolicy { merge: false,
                             ..MergePolicy::default() };
  let upsert = MergeUpsert::new(policy, log.clone());
  upsert.update_json(&store, "c", vec![json!({"_id": "x", "a": {"b": 1}, "n": null})]).unwrap();
  assert_eq!(json_doc(store.get_doc("c", &"x".into()).unwrap()), json!({"_id": "x", "a": {"b": 1}}));

  let keep = MergePolicy { merge: false,
                           keep_none: true,
                           ..MergePolicy::default() };
  MergeUpsert::new(keep, log).update_json(&store, "k", vec![json!({"_id": "x", "n": null})]).unwrap();
  assert_eq!(json_doc(store.get_doc("k", &"x".into()).unwrap()), json!({"_id": "x", "n": null}));
}

#[test]
fn records_without_shard_key_are_rejected_and_the_rest_written() {
  let store = InMemoryDocumentStore::new();
  let (sink, log) = memory_log();
  let upsert = MergeUpsert::new(MergePolicy::default().with_shard_key("chain"), log);
  let report = upsert.update_json(&store,
                                  "wallets",
                                  vec![json!({"_id": "w1", "chain": "eth", "balance": 1}),
                                       json!({"_id": "w2", "balance": 2}),
                                       json!({"balance": 3}),])
                     .unwrap();
  assert_eq!(report.rejected, 2);
  assert_eq!(report.upserted, 1);
  assert_eq!(store.count("wallets"), 1);
  assert_eq!(sink.count(Level::Warn), 2);
}

#[test]
fn shard_mismatch_on_existing_document_is_a_partial_failure() {
  let store = InMemoryDocumentStore::new();
  let (_, log) = memory_log();
  let upsert = MergeUpsert::new(MergePolicy::default().with_shard_key("chain"), log);
  upsert.update_json(&store, "wallets", vec![json!({"_id": "w1", "chain": "eth"})]).unwrap();
  let err = upsert.update_json(&store, "wallets", vec![json!({"_id": "w1", "chain": "bsc", "x": 1})])
                  .unwrap_err();
  assert!(matches!(err, BatchWriteError::Partial { failed: 1, .. }));
}

#[test]
fn unavailable_store_is_reported_not_panicking() {
  let store = InMemoryDocumentStore::new();
  store.set_unavailable(true);
  let (sink, log) = memory_log();
  let upsert = MergeUpsert::new(MergePolicy::default(), log);
  let err = upsert.update_json(&store, "users", vec![json!({"_id": "u1", "a": 1})]).unwrap_err();
  assert!(matches!(err, BatchWriteError::Store { kind: IntentKind::Replace, .. }));
  assert_eq!(sink.count(Level::Error), 1);
}

#[test]
fn maintenance_operations_on_memory_store() {
  let store = InMemoryDocumentStore::new();
  let (_, log) = memory_log();
  let upsert = MergeUpsert::new(MergePolicy::default(), log);
  upsert.update_json(&store,
                     "users",
                     vec![json!({"_id": "a", "lastUpdatedAt": 100}),
                          json!({"_id": "b", "lastUpdatedAt": 300}),
                          json!({"_id": "c", "name": "c"}),])
        .unwrap();

  assert_eq!(store.get_docs("users", &[]).unwrap().len(), 3);
  assert_eq!(store.get_docs("users", &["b".into(), "zz".into()]).unwrap().len(), 1);
  assert_eq!(store.remove_outdated_docs("users", "lastUpdatedAt", 200.0).unwrap(), 1);
  assert_eq!(store.remove_docs_by_keys("users", &["c".into(), "missing".into()]).unwrap(), 1);
  let left: Vec<serde_json::Value> = store.get_docs("users", &[])
                                          .unwrap()
                                          .into_iter()
                                          .map(|d| json_doc(Some(d)))
                                          .collect();
  assert_eq!(left, vec![json!({"_id": "b", "lastUpdatedAt": 300})]);
  assert_eq!(store.get_docs("nothing", &[]).unwrap().len(), 0);
}

#[test]
fn partial_failure_still_reports_rejected_records() {
  let store = InMemoryDocumentStore::new();
  let (_, log) = memory_log();
  let upsert = MergeUpsert::new(MergePolicy::default(), log);
  upsert.update_json(&store, "users", vec![json!({"_id": "a", "x": 5})]).unwrap();

  let err = upsert.update_json(&store, "users", vec![json!({"_id": "a", "x": {"y": 1}}), json!({"name": "sin id"})])
                  .unwrap_err();
  match err {
    BatchWriteError::Partial { failed, report, .. } => {
      assert_eq!(failed, 1);
      assert_eq!(report.rejected, 1);
    }
    other => panic!("se esperaba un fallo parcial: {:?}", other),
  }
}
