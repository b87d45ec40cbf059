//! File-backed WAL persistence (spec §6 "Persisted state"). `myco-core`'s
//! [`Wal`] is Sans-IO; this module is the only place that touches disk
//! for it, reading the log/snapshot buffers at startup and writing them
//! back after every mutation.

use std::path::{Path, PathBuf};

use myco_core::Wal;

use crate::error::ServerError;

const LOG_FILE: &str = "wal.log";
const SNAPSHOT_FILE: &str = "wal.snapshot";

/// Load a WAL's log/snapshot buffers from `state_dir`, sizing them at
/// `log_capacity`/`snapshot_capacity` if no files exist yet (first run).
///
/// # Errors
///
/// [`ServerError::Persistence`] on any I/O failure other than the files
/// not existing yet.
pub fn load(state_dir: &Path, log_capacity: usize, snapshot_capacity: usize) -> Result<Wal, ServerError> {
    std::fs::create_dir_all(state_dir)
        .map_err(|source| ServerError::Persistence { path: state_dir.to_path_buf(), source })?;

    let log = read_or_default(&log_path(state_dir), log_capacity)?;
    let snapshot = read_or_default(&snapshot_path(state_dir), snapshot_capacity)?;
    Ok(Wal::from_parts(log, snapshot))
}

/// Persist a WAL's current log/snapshot buffers back to `state_dir`.
///
/// # Errors
///
/// [`ServerError::Persistence`] on any I/O failure.
pub fn save(state_dir: &Path, wal: &Wal) -> Result<(), ServerError> {
    write_atomic(&log_path(state_dir), wal.log_bytes())?;
    write_atomic(&snapshot_path(state_dir), wal.snapshot_bytes())?;
    Ok(())
}

fn log_path(state_dir: &Path) -> PathBuf {
    state_dir.join(LOG_FILE)
}

fn snapshot_path(state_dir: &Path) -> PathBuf {
    state_dir.join(SNAPSHOT_FILE)
}

fn read_or_default(path: &Path, capacity: usize) -> Result<Vec<u8>, ServerError> {
    match std::fs::read(path) {
        Ok(mut bytes) => {
            bytes.resize(capacity, 0);
            Ok(bytes)
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(vec![0u8; capacity]),
        Err(source) => Err(ServerError::Persistence { path: path.to_path_buf(), source }),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ServerError> {
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, bytes)
        .map_err(|source| ServerError::Persistence { path: tmp_path.clone(), source })?;
    std::fs::rename(&tmp_path, path)
        .map_err(|source| ServerError::Persistence { path: path.to_path_buf(), source })
}
