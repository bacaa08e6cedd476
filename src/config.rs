// Archivo: config.rs
// Propósito: configuración del binario leída de variables de entorno
// (cargando `.env` con dotenvy).
use merge::MergePolicy;
use scheduler::{ScheduleConfig, ScheduleError, DEFAULT_RETRY_DELAY};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_INTERVAL_SECS: u64 = 86_400;
pub const DEFAULT_PERIOD_SECS: u64 = 172_800;
pub const DEFAULT_SNAPSHOT_FILE: &str = "snapshot.json";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Valor no válido para {var}: '{value}' ({reason})")]
    Invalid { var: &'static str, value: String, reason: String },
}

/// Flujos de datos que el job de ingesta puede procesar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Profiles,
    Posts,
    Follows,
}

impl Stream {
    pub const ALL: [Stream; 3] = [Stream::Profiles, Stream::Posts, Stream::Follows];
}

impl FromStr for Stream {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "profiles" => Ok(Stream::Profiles),
            "posts" => Ok(Stream::Posts),
            "follows" => Ok(Stream::Follows),
            other => Err(format!("flujo desconocido '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub schedule: ScheduleConfig,
    pub snapshot_file: PathBuf,
    pub state_file: Option<PathBuf>,
    pub start_timestamp: Option<i64>,
    pub policy: MergePolicy,
    pub streams: Vec<Stream>,
}

impl AppConfig {
    /// Lee la configuración del entorno del proceso.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Construye la configuración a partir de una función de búsqueda de
    /// variables (permite probar sin tocar el entorno).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
        where F: Fn(&str) -> Option<String>
    {
        let interval = parse_or("SYNC_INTERVAL", &lookup, DEFAULT_INTERVAL_SECS)?;
        let period = parse_or("SYNC_PERIOD", &lookup, DEFAULT_PERIOD_SECS)?;
        let retry_delay = parse_or("SYNC_RETRY_DELAY", &lookup, DEFAULT_RETRY_DELAY.as_secs())?;

        let schedule = ScheduleConfig { interval: (interval > 0).then(|| Duration::from_secs(interval)),
                                        period: Some(Duration::from_secs(period)),
                                        limit: parse_opt("SYNC_LIMIT", &lookup)?,
                                        end_timestamp: parse_opt("SYNC_END_TIMESTAMP", &lookup)?,
                                        retry_on_error: parse_bool("SYNC_RETRY", &lookup, false)?,
                                        retry_delay: Duration::from_secs(retry_delay),
                                        max_retries: parse_opt("SYNC_MAX_RETRIES", &lookup)? };
        schedule.validate().map_err(|e| {
                               let var = match e {
                                   ScheduleError::InvalidInterval(_) => "SYNC_INTERVAL",
                                   ScheduleError::InvalidConfig(_) => "SYNC_LIMIT",
                               };
                               ConfigError::Invalid { var,
                                                      value: lookup(var).unwrap_or_default(),
                                                      reason: e.to_string() }
                           })?;

        let policy = MergePolicy { merge: parse_bool("SYNC_MERGE", &lookup, true)?,
                                   keep_none: parse_bool("SYNC_KEEP_NONE", &lookup, false)?,
                                   shard_key: lookup("SYNC_SHARD_KEY").filter(|s| !s.trim().is_empty()) };

        let streams = match lookup("SYNC_STREAMS") {
            Some(raw) if !raw.trim().is_empty() => {
                raw.split(',')
                   .map(|s| {
                       s.parse::<Stream>().map_err(|reason| ConfigError::Invalid { var: "SYNC_STREAMS",
                                                                                    value: raw.clone(),
                                                                                    reason })
                   })
                   .collect::<Result<Vec<_>, _>>()?
            }
            _ => Stream::ALL.to_vec(),
        };

        Ok(Self { database_url: lookup("DATABASE_URL").unwrap_or_else(|| sync_persistence::DEFAULT_DATABASE_URL.into()),
                  schedule,
                  snapshot_file: lookup("SYNC_SNAPSHOT_FILE").unwrap_or_else(|| DEFAULT_SNAPSHOT_FILE.into())
                                                            .into(),
                  state_file: lookup("SYNC_STATE_FILE").map(PathBuf::from),
                  start_timestamp: parse_opt("SYNC_START_TIMESTAMP", &lookup)?,
                  policy,
                  streams })
    }
}

fn parse_opt<T, F>(var: &'static str, lookup: &F) -> Result<Option<T>, ConfigError>
    where T: FromStr,
          T::Err: std::fmt::Display,
          F: Fn(&str) -> Option<String>
{
    match lookup(var) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse::<T>().map(Some).map_err(|e| ConfigError::Invalid { var,
                                                                                 value: raw.clone(),
                                                                                 reason: e.to_string() })
        }
        _ => Ok(None),
    }
}

fn parse_or<T, F>(var: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
    where T: FromStr,
          T::Err: std::fmt::Display,
          F: Fn(&str) -> Option<String>
{
    Ok(parse_opt(var, lookup)?.unwrap_or(default))
}

fn parse_bool<F>(var: &'static str, lookup: &F, default: bool) -> Result<bool, ConfigError>
    where F: Fn(&str) -> Option<String>
{
    match lookup(var).map(|s| s.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(s) if s.is_empty() => Ok(default),
        Some(s) => match s.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { var,
                                            value: s,
                                            reason: "se esperaba un booleano".into() }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_follow_a_daily_schedule() {
        let c = config(&[]).unwrap();
        assert_eq!(c.schedule.interval, Some(Duration::from_secs(86_400)));
        assert_eq!(c.schedule.period, Some(Duration::from_secs(172_800)));
        assert!(!c.schedule.retry_on_error);
        assert_eq!(c.schedule.retry_delay, Duration::from_secs(3));
        assert_eq!(c.policy, MergePolicy::default());
        assert_eq!(c.streams, Stream::ALL.to_vec());
        assert_eq!(c.database_url, "file:pulse-sync.db");
        assert!(c.state_file.is_none());
    }

    #[test]
    fn explicit_values_are_parsed() {
        let c = config(&[("SYNC_INTERVAL", "0"),
                         ("SYNC_LIMIT", "50"),
                         ("SYNC_END_TIMESTAMP", "1700000000"),
                         ("SYNC_RETRY", "yes"),
                         ("SYNC_MAX_RETRIES", "5"),
                         ("SYNC_SHARD_KEY", "chain"),
                         ("SYNC_MERGE", "false"),
                         ("SYNC_KEEP_NONE", "1"),
                         ("SYNC_STREAMS", "posts, follows"),
                         ("SYNC_STATE_FILE", "/tmp/last_synced.txt")]).unwrap();
        assert_eq!(c.schedule.interval, None);
        assert_eq!(c.schedule.limit, Some(50));
        assert_eq!(c.schedule.end_timestamp, Some(1_700_000_000));
        assert!(c.schedule.retry_on_error);
        assert_eq!(c.schedule.max_retries, Some(5));
        assert_eq!(c.policy.shard_key.as_deref(), Some("chain"));
        assert!(!c.policy.merge);
        assert!(c.policy.keep_none);
        assert_eq!(c.streams, vec![Stream::Posts, Stream::Follows]);
        assert_eq!(c.state_file, Some(PathBuf::from("/tmp/last_synced.txt")));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = config(&[("SYNC_LIMIT", "many")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "SYNC_LIMIT", .. }));
        let err = config(&[("SYNC_RETRY", "maybe")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "SYNC_RETRY", .. }));
        let err = config(&[("SYNC_STREAMS", "posts,likes")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "SYNC_STREAMS", .. }));
        let err = config(&[("SYNC_LIMIT", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "SYNC_LIMIT", .. }));
    }
}
