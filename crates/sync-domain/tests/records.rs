use log::Level;
use serde_json::json;
use std::sync::Arc;
use sync_domain::{get_path, strip_nulls, DocumentId, MemoryLogSink, Record, SharedLog, Value};

#[test]
fn strip_nulls_recurses_into_maps_but_not_lists() {
  let r = Record::from_json(json!({"_id": "u1", "a": null, "b": {"c": null, "d": 1}, "l": [null, 1]})).unwrap();
  let stripped = strip_nulls(r.fields());
  assert_eq!(serde_json::Value::from(Value::Map(stripped)),
             json!({"_id": "u1", "b": {"d": 1}, "l": [null, 1]}));
}

#[test]
fn document_id_serializes_as_plain_json() {
  assert_eq!(serde_json::to_string(&DocumentId::from("u1")).unwrap(), "\"u1\"");
  assert_eq!(serde_json::to_string(&DocumentId::from(7i64)).unwrap(), "7");
  let back: DocumentId = serde_json::from_str("7").unwrap();
  assert_eq!(back, DocumentId::Int(7));
}

#[test]
fn value_round_trips_through_serde() {
  let v: Value = serde_json::from_str(r#"{"x": [1, 2.5, "s", true, null]}"#).unwrap();
  let map = v.as_map().unwrap();
  assert_eq!(map["x"].as_list().unwrap()[1], Value::Float(2.5));
  assert_eq!(serde_json::to_string(&v).unwrap(), r#"{"x":[1,2.5,"s",true,null]}"#);
}

#[test]
fn memory_sink_counts_by_level() {
  let sink = Arc::new(MemoryLogSink::new());
  let log: SharedLog = sink.clone();
  log.info("tick 1 completado");
  log.warn("reintento");
  log.error("fallo");
  log.warn("otro");
  assert_eq!(sink.count(Level::Warn), 2);
  assert_eq!(sink.entries().len(), 4);
  assert!(sink.contains("tick 1"));
}

#[test]
fn record_and_document_share_path_lookup() {
  let r = Record::from_json(json!({"_id": "u1", "meta": {"chain": "eth", "n": 0}, "flat": 1})).unwrap();
  assert_eq!(r.get_path("meta.chain"), get_path(r.fields(), "meta.chain"));
  assert_eq!(get_path(r.fields(), "meta.n"), Some(&Value::Int(0)));
  assert_eq!(get_path(r.fields(), "flat.x"), None);
  assert_eq!(get_path(r.fields(), "missing"), None);
}
