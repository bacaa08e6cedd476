// Archivo: source.rs
// Propósito: origen de los datos observados en un tick. El trait es
// asíncrono; el job lo ejecuta sobre un runtime tokio propio.
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("No se pudo leer {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot mal formado en {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Perfil observado. Los contadores ausentes se envían como null y, con
/// merge activo, borran el campo guardado.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub user_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub verified: Option<bool>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub raw_description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub followers_count: Option<i64>,
    #[serde(default)]
    pub friends_count: Option<i64>,
    #[serde(default)]
    pub favourites_count: Option<i64>,
    #[serde(default)]
    pub listed_count: Option<i64>,
    #[serde(default)]
    pub media_count: Option<i64>,
    #[serde(default)]
    pub statuses_count: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub author: String,
    #[serde(default)]
    pub author_name: Option<String>,
    /// Segundos desde la época.
    pub timestamp: i64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub views: Option<i64>,
    #[serde(default)]
    pub likes: Option<i64>,
    #[serde(default)]
    pub reply_counts: Option<i64>,
    #[serde(default)]
    pub retweet_counts: Option<i64>,
    #[serde(default)]
    pub hash_tags: Vec<String>,
    /// id de usuario -> nombre.
    #[serde(default)]
    pub user_mentions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Follow {
    pub from: String,
    pub to: String,
}

/// Todo lo observado en un tick.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub profiles: Vec<Profile>,
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub follows: Vec<Follow>,
}

#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Obtiene el snapshot del tick actual.
    async fn fetch(&self) -> Result<Snapshot, SourceError>;

    /// Descripción corta para el log.
    fn describe(&self) -> String;
}

/// Lee el snapshot de un fichero JSON en cada tick.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RecordSource for JsonFileSource {
    async fn fetch(&self) -> Result<Snapshot, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path).await
                                                       .map_err(|source| SourceError::Io { path: self.path.clone(),
                                                                                           source })?;
        serde_json::from_str(&raw).map_err(|source| SourceError::Parse { path: self.path.clone(),
                                                                         source })
    }

    fn describe(&self) -> String {
        format!("fichero {}", self.path.display())
    }
}
