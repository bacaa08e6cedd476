// Archivo: state_file.rs
// Propósito: fichero con el último instante sincronizado (un entero por
// línea). Lo escribe la aplicación tras cada tick; el scheduler no lo toca.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateFileError {
    #[error("Error de E/S en {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Contenido no válido en {path}: '{content}'")]
    Parse { path: PathBuf, content: String },

    #[error("{0} no debe existir si se indica un instante inicial; borre el fichero o quite SYNC_START_TIMESTAMP")]
    AlreadyExists(PathBuf),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> StateFileError + '_ {
    move |source| StateFileError::Io { path: path.to_path_buf(),
                                       source }
}

/// Lee el instante guardado en `path`.
pub fn read_last_synced(path: &Path) -> Result<i64, StateFileError> {
    let content = fs::read_to_string(path).map_err(io_err(path))?;
    content.trim().parse::<i64>().map_err(|_| StateFileError::Parse { path: path.to_path_buf(),
                                                                    content: content.trim().to_string() })
}

/// Escribe `timestamp` en `path`, creando los directorios padre.
pub fn write_last_synced(path: &Path, timestamp: i64) -> Result<(), StateFileError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(path))?;
    }
    fs::write(path, format!("{}\n", timestamp)).map_err(io_err(path))
}

/// Inicializa el fichero con `start`. Falla si ya existe, para no perder
/// el progreso guardado.
pub fn init_last_synced(path: &Path, start: i64) -> Result<(), StateFileError> {
    if path.exists() {
        return Err(StateFileError::AlreadyExists(path.to_path_buf()));
    }
    write_last_synced(path, start)
}

/// Resuelve el instante de partida: inicializa el fichero si se indicó
/// `start`, lo lee si existe y, si no hay fichero, devuelve `None`.
pub fn resume_from(path: &Path, start: Option<i64>) -> Result<Option<i64>, StateFileError> {
    if let Some(start) = start {
        init_last_synced(path, start)?;
        return Ok(Some(start));
    }
    if !path.exists() {
        return Ok(None);
    }
    read_last_synced(path).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("last_synced.txt");
        write_last_synced(&path, 1_700_000_000).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "1700000000\n");
        assert_eq!(read_last_synced(&path).unwrap(), 1_700_000_000);
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_synced.txt");
        init_last_synced(&path, 10).unwrap();
        assert!(matches!(init_last_synced(&path, 20), Err(StateFileError::AlreadyExists(_))));
        assert_eq!(read_last_synced(&path).unwrap(), 10);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_synced.txt");
        fs::write(&path, "ayer").unwrap();
        assert!(matches!(read_last_synced(&path), Err(StateFileError::Parse { .. })));
    }

    #[test]
    fn resume_without_file_or_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.txt");
        assert_eq!(resume_from(&path, None).unwrap(), None);
        assert_eq!(resume_from(&path, Some(5)).unwrap(), Some(5));
        assert_eq!(resume_from(&path, None).unwrap(), Some(5));
        assert!(resume_from(&path, Some(6)).is_err());
    }
}
