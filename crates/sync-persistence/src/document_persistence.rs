use crate::schema::documents;
use crate::schema::documents::dsl;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::result::Error as DieselError;
use diesel::sql_types::{Double, Text};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use merge::apply::upsert_document;
use merge::{BatchResult, CommandFailure, DocumentStore, Result, StoreError, UpsertCommand};
use std::sync::Arc;
use sync_domain::{Document, DocumentId};
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");
/// URL usada cuando `DATABASE_URL` no está definida.
pub const DEFAULT_DATABASE_URL: &str = "file:pulse-sync.db";
type DbPool = Pool<ConnectionManager<SqliteConnection>>;
type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;
/// Store Diesel/SQLite que implementa `DocumentStore`.
///
/// Cada comando se aplica en su propia transacción: leer, aplicar con
/// `merge::apply` y reescribir la fila. Un fallo de un comando no afecta a
/// los demás del lote.
pub struct DieselDocumentStore {
  pool: Arc<DbPool>,
}
impl DieselDocumentStore {
  /// Abre (o crea) la base de datos y aplica las migraciones pendientes.
  pub fn new(database_url: &str) -> Result<Self> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = Pool::builder().max_size(4)
                              .build(manager)
                              .map_err(|e| StoreError::Storage(format!("no se pudo crear el pool de conexiones: {}", e)))?;
    let store = DieselDocumentStore { pool: Arc::new(pool) };
    let mut c = store.conn()?;
    let _ = diesel::sql_query("PRAGMA journal_mode = WAL;").execute(&mut c);
    let _ = diesel::sql_query("PRAGMA busy_timeout = 5000;").execute(&mut c);
    c.run_pending_migrations(MIGRATIONS)
     .map_err(|e| StoreError::Storage(format!("migraciones: {}", e)))?;
    log::debug!(target: "sync_persistence", "store abierto en {}", database_url);
    Ok(store)
  }
  fn conn(&self) -> Result<DbConn> {
    self.pool.get().map_err(|e| StoreError::Storage(format!("pool: {}", e)))
  }
}
#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = documents)]
struct DocumentRow {
  pub collection: String,
  pub id: String,
  pub body: String,
  pub updated_at_ts: i64,
}
/// Error interno de una transacción: o falla Diesel o falla la operación
/// sobre el documento.
#[derive(Debug, thiserror::Error)]
enum TxError {
  #[error("db: {0}")]
  Diesel(#[from] DieselError),
  #[error("{0}")]
  Store(StoreError),
}
impl From<TxError> for StoreError {
  fn from(e: TxError) -> Self {
    match e {
      TxError::Store(e) => e,
      TxError::Diesel(e) => StoreError::Storage(format!("db: {}", e)),
    }
  }
}
fn map_db_err<T>(res: std::result::Result<T, DieselError>) -> Result<T> {
  res.map_err(|e| StoreError::Storage(format!("db: {}", e)))
}
fn encode_id(id: &DocumentId) -> Result<String> {
  serde_json::to_string(id).map_err(|e| StoreError::Other(format!("id no serializable: {}", e)))
}
fn decode_body(body: &str) -> Result<Document> {
  serde_json::from_str(body).map_err(|e| StoreError::Storage(format!("documento corrupto: {}", e)))
}
fn encode_body(doc: &Document) -> Result<String> {
  serde_json::to_string(doc).map_err(|e| StoreError::Other(format!("documento no serializable: {}", e)))
}
/// Ruta JSON de SQLite para un campo con puntos: `a.b` -> `$."a"."b"`.
fn json_path(field: &str) -> String {
  field.split('.').fold(String::from("$"), |mut acc, part| {
                    acc.push_str(&format!(".\"{}\"", part.replace('"', "\\\"")));
                    acc
                  })
}
/// Aplica un comando dentro de una transacción. Devuelve si el documento
/// fue creado.
fn apply_command(conn: &mut SqliteConnection, collection: &str, command: &UpsertCommand) -> std::result::Result<bool, TxError> {
  conn.transaction::<bool, TxError, _>(|conn| {
        let key = encode_id(&command.id).map_err(TxError::Store)?;
        let existing = dsl::documents.filter(dsl::collection.eq(collection))
                                     .filter(dsl::id.eq(&key))
                                     .first::<DocumentRow>(conn)
                                     .optional()?;
        let current = match existing {
          Some(row) => Some(decode_body(&row.body).map_err(TxError::Store)?),
          None => None,
        };
        let (doc, created) = upsert_document(current.as_ref(), command).map_err(TxError::Store)?;
        let row = DocumentRow { collection: collection.to_string(),
                                id: key,
                                body: encode_body(&doc).map_err(TxError::Store)?,
                                updated_at_ts: Utc::now().timestamp() };
        diesel::replace_into(dsl::documents).values(&row).execute(conn)?;
        Ok(created)
      })
}
impl DocumentStore for DieselDocumentStore {
  fn upsert_batch(&self, collection: &str, commands: &[UpsertCommand]) -> Result<BatchResult> {
    let mut conn = self.conn()?;
    let mut result = BatchResult::default();
    for (index, command) in commands.iter().enumerate() {
      match apply_command(&mut conn, collection, command) {
        Ok(true) => result.upserted += 1,
        Ok(false) => result.matched += 1,
        Err(e) => result.failures.push(CommandFailure { index,
                                                        id: command.id.clone(),
                                                        error: e.into() }),
      }
    }
    Ok(result)
  }
  fn get_doc(&self, collection: &str, id: &DocumentId) -> Result<Option<Document>> {
    let mut conn = self.conn()?;
    let key = encode_id(id)?;
    let row = map_db_err(dsl::documents.filter(dsl::collection.eq(collection))
                                       .filter(dsl::id.eq(&key))
                                       .first::<DocumentRow>(&mut conn)
                                       .optional())?;
    row.map(|r| decode_body(&r.body)).transpose()
  }
  fn get_docs(&self, collection: &str, ids: &[DocumentId]) -> Result<Vec<Document>> {
    let mut conn = self.conn()?;
    let mut query = dsl::documents.filter(dsl::collection.eq(collection)).into_boxed::<diesel::sqlite::Sqlite>();
    if !ids.is_empty() {
      let keys = ids.iter().map(encode_id).collect::<Result<Vec<_>>>()?;
      query = query.filter(dsl::id.eq_any(keys));
    }
    let rows = map_db_err(query.order(dsl::id.asc()).load::<DocumentRow>(&mut conn))?;
    rows.iter().map(|r| decode_body(&r.body)).collect()
  }
  fn remove_docs_by_keys(&self, collection: &str, ids: &[DocumentId]) -> Result<usize> {
    if ids.is_empty() {
      return Ok(0);
    }
    let mut conn = self.conn()?;
    let keys = ids.iter().map(encode_id).collect::<Result<Vec<_>>>()?;
    map_db_err(diesel::delete(dsl::documents.filter(dsl::collection.eq(collection)).filter(dsl::id.eq_any(keys)))
                 .execute(&mut conn))
  }
  /// El filtro se evalúa en SQLite con `json_extract`; recorre las filas
  /// de la colección sin cargarlas en memoria (no hay índice por campo).
  fn remove_outdated_docs(&self, collection: &str, field: &str, before: f64) -> Result<usize> {
    let mut conn = self.conn()?;
    let path = json_path(field);
    map_db_err(diesel::sql_query("DELETE FROM documents WHERE collection = ? AND json_type(body, ?) IN ('integer', 'real') \
                                  AND json_extract(body, ?) < ?").bind::<Text, _>(collection)
                                                                  .bind::<Text, _>(&path)
                                                                  .bind::<Text, _>(&path)
                                                                  .bind::<Double, _>(before)
                                                                  .execute(&mut conn))
  }
}
