//! Session Store (C11, §4.11).
//!
//! Each session is one JSON document on disk, written via write-temp-then-
//! rename for atomicity and guarded by an exclusive file lock (via `fs2`) so
//! two callers never interleave a read-modify-write. Documents carry a
//! schema version; an unknown major version is a hard failure rather than a
//! best-effort upgrade (§4.11, §9 "Schema migration policy").

use crate::error::{EngineError, Result};
use crate::types::ExplorationSession;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Current on-disk schema's major version. Documents are rejected outright
/// if their `schema_version` doesn't match (§9: no partial-upgrade path
/// exists yet — adding one is future work, not a silent no-op).
pub const SCHEMA_VERSION: u32 = 1;

/// The on-disk envelope. `extra` preserves fields this version of the store
/// doesn't know about, so a newer writer's additions survive a round trip
/// through an older build (§4.11 "Unknown-field preservation").
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct SessionDocument {
    schema_version: u32,
    session: ExplorationSession,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

pub struct SessionStore {
    dir: PathBuf,
    lock_timeout: Duration,
}

impl SessionStore {
    pub fn new(dir: PathBuf, lock_timeout: Duration) -> Self {
        Self { dir, lock_timeout }
    }

    fn doc_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }

    fn lock_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.lock"))
    }

    fn acquire_lock(&self, session_id: &str) -> Result<File> {
        fs::create_dir_all(&self.dir).map_err(|e| EngineError::FileAccess { path: self.dir.clone(), source: e })?;
        let lock_path = self.lock_path(session_id);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| EngineError::FileAccess { path: lock_path.clone(), source: e })?;

        let deadline = Instant::now() + self.lock_timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(file),
                Err(_) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(20));
                }
                Err(_) => return Err(EngineError::Timeout(self.lock_timeout)),
            }
        }
    }

    /// Loads and validates the session named `session_id`. `NotFound` if no
    /// document exists; `Schema` if its major version doesn't match.
    pub fn load(&self, session_id: &str) -> Result<ExplorationSession> {
        let path = self.doc_path(session_id);
        let _lock = self.acquire_lock(session_id)?;
        read_document(&path)
    }

    /// Writes `session` atomically: serialize to a temp file in the same
    /// directory, then rename over the final path (§4.11 "Atomic writes").
    pub fn save(&self, session: &ExplorationSession) -> Result<()> {
        let path = self.doc_path(&session.session_id);
        let _lock = self.acquire_lock(&session.session_id)?;

        let existing_extra = read_document_extra(&path);
        let doc = SessionDocument {
            schema_version: SCHEMA_VERSION,
            session: session.clone(),
            extra: existing_extra,
        };
        let body = serde_json::to_vec_pretty(&doc)
            .map_err(|e| EngineError::Internal(format!("failed to serialize session document: {e}")))?;

        let tmp_path = path.with_extension("json.tmp");
        {
            let mut tmp = File::create(&tmp_path).map_err(|e| EngineError::FileAccess { path: tmp_path.clone(), source: e })?;
            tmp.write_all(&body).map_err(|e| EngineError::FileAccess { path: tmp_path.clone(), source: e })?;
            tmp.sync_all().map_err(|e| EngineError::FileAccess { path: tmp_path.clone(), source: e })?;
        }
        fs::rename(&tmp_path, &path).map_err(|e| EngineError::FileAccess { path: path.clone(), source: e })?;
        Ok(())
    }

    /// Lists every session id with a document on disk, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        let entries = fs::read_dir(&self.dir).map_err(|e| EngineError::FileAccess { path: self.dir.clone(), source: e })?;
        for entry in entries {
            let entry = entry.map_err(|e| EngineError::FileAccess { path: self.dir.clone(), source: e })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Deletes a session's document (and its lock file, if any). Not an
    /// error if the session doesn't exist (§4.11 "Delete is idempotent").
    pub fn delete(&self, session_id: &str) -> Result<()> {
        let _lock = self.acquire_lock(session_id)?;
        let path = self.doc_path(session_id);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| EngineError::FileAccess { path: path.clone(), source: e })?;
        }
        let lock_path = self.lock_path(session_id);
        let _ = fs::remove_file(&lock_path);
        Ok(())
    }
}

fn read_document(path: &Path) -> Result<ExplorationSession> {
    let mut file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            EngineError::NotFound(format!("no session document at {}", path.display()))
        } else {
            EngineError::FileAccess { path: path.to_path_buf(), source: e }
        }
    })?;
    let mut body = String::new();
    file.read_to_string(&mut body).map_err(|e| EngineError::FileAccess { path: path.to_path_buf(), source: e })?;
    let doc: SessionDocument = serde_json::from_str(&body)
        .map_err(|e| EngineError::Internal(format!("corrupt session document {}: {e}", path.display())))?;
    if doc.schema_version != SCHEMA_VERSION {
        return Err(EngineError::Schema { found: doc.schema_version, supported: SCHEMA_VERSION });
    }
    Ok(doc.session)
}

fn read_document_extra(path: &Path) -> serde_json::Map<String, serde_json::Value> {
    let Ok(body) = fs::read_to_string(path) else { return serde_json::Map::new() };
    let Ok(doc) = serde_json::from_str::<SessionDocument>(&body) else { return serde_json::Map::new() };
    doc.extra
}
