// Esquema Diesel del store de documentos (SQLite).
// Tabla: documents. `id` guarda el `_id` serializado en JSON para distinguir
// `"7"` de `7`; `body` guarda el documento completo.
diesel::table! {
    documents (collection, id) {
        collection -> Text,
        id -> Text,
        body -> Text,
        updated_at_ts -> BigInt,
    }
}
