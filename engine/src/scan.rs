//! Project Scanner (C1, §4.1).
//!
//! Deterministic, gitignore-aware enumeration of candidate source files.
//! Grounded on the source project's `ignore`-crate-based parallel walker;
//! adapted to always return results in sorted-path order so later stages
//! (C2's parallel tag extraction) can rely on a deterministic file list
//! without re-sorting themselves.

use crate::error::{EngineError, Result};
use ignore::{WalkBuilder, WalkState};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// A single scanned file, ready for C2.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub ext: String,
    pub byte_len: u64,
}

/// Walk `root`, honoring `extensions` and `ignore_patterns`, skipping files
/// larger than `max_file_bytes`. Returns files sorted by relative path.
///
/// Fails with [`EngineError::FileAccess`] only if `root` itself cannot be
/// read; per-file I/O errors are logged and the file is skipped (§4.1,
/// §7 "ParseError"/per-file policy — scanning itself has no per-file error
/// kind of its own, so skipped files are logged at `warn!` and dropped).
pub fn scan(
    root: &Path,
    extensions: &HashSet<String>,
    ignore_patterns: &[String],
    max_file_bytes: u64,
) -> Result<Vec<ScannedFile>> {
    if !root.exists() {
        return Err(EngineError::FileAccess {
            path: root.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "project root not found"),
        });
    }
    std::fs::read_dir(root).map_err(|source| EngineError::FileAccess {
        path: root.to_path_buf(),
        source,
    })?;

    let root = root.canonicalize().map_err(|source| EngineError::FileAccess {
        path: root.to_path_buf(),
        source,
    })?;

    let results: Mutex<Vec<ScannedFile>> = Mutex::new(Vec::new());
    let num_threads = rayon::current_num_threads().clamp(1, 12);

    let mut builder = WalkBuilder::new(&root);
    builder
        .hidden(true)
        .git_ignore(true)
        .git_global(false)
        .git_exclude(true)
        .follow_links(false)
        .threads(num_threads);
    for pattern in ignore_patterns {
        builder.add_custom_ignore_filename(pattern);
    }

    builder.build_parallel().run(|| {
        let root = root.clone();
        let extensions = extensions.clone();
        Box::new(move |entry| {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    warn!(error = %err, "scan: skipping unreadable entry");
                    return WalkState::Continue;
                }
            };
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                return WalkState::Continue;
            }
            let path = entry.path();
            // `ignore` follows symlinks only if configured to; with
            // follow_links(false) a symlinked entry pointing outside root
            // is simply never descended into, satisfying §4.1's guard.
            let ext = match path.extension().and_then(|e| e.to_str()) {
                Some(e) => e.to_ascii_lowercase(),
                None => return WalkState::Continue,
            };
            if !extensions.contains(&ext) {
                return WalkState::Continue;
            }
            let meta = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "scan: metadata read failed, skipping");
                    return WalkState::Continue;
                }
            };
            if meta.len() > max_file_bytes {
                warn!(path = %path.display(), size = meta.len(), cap = max_file_bytes, "scan: file exceeds max_file_bytes, skipping");
                return WalkState::Continue;
            }
            let rel_path = match path.strip_prefix(&root) {
                Ok(r) => r.to_string_lossy().replace('\\', "/"),
                Err(_) => return WalkState::Continue,
            };
            results.lock().unwrap().push(ScannedFile {
                rel_path,
                abs_path: path.to_path_buf(),
                ext,
                byte_len: meta.len(),
            });
            WalkState::Continue
        })
    });

    let mut files = results.into_inner().unwrap();
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    debug!(count = files.len(), root = %root.display(), "scan complete");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scan_is_deterministic_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.rs"), "fn b() {}").unwrap();
        fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
        fs::write(dir.path().join("ignored.bin"), [0u8; 4]).unwrap();
        let exts: HashSet<String> = ["rs".to_string()].into_iter().collect();
        let files = scan(dir.path(), &exts, &[], 1024 * 1024).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.rel_path.clone()).collect();
        assert_eq!(names, vec!["a.rs".to_string(), "b.rs".to_string()]);
    }

    #[test]
    fn scan_skips_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("big.rs"), vec![b'x'; 100]).unwrap();
        let exts: HashSet<String> = ["rs".to_string()].into_iter().collect();
        let files = scan(dir.path(), &exts, &[], 10).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn scan_fails_on_missing_root() {
        let err = scan(Path::new("/does/not/exist/ever"), &HashSet::new(), &[], 1024).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::FileAccessError);
    }
}
