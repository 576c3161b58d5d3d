//! Line storage for sheet documents.
//!
//! The mutation engine reads and writes whole documents as ordered line
//! sequences through the [`LineStore`] trait. [`FsLineStore`] is the real
//! backend: client-supplied relative paths are resolved through
//! [`PathResolver`], and every write is atomic (temp file + rename) under
//! an advisory file lock so a crashed writer can never leave a torn
//! sheet on disk. [`MemLineStore`] backs unit tests.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Error, Result};
use crate::paths::PathResolver;

/// How long a writer waits for the advisory file lock.
const FILE_LOCK_TIMEOUT_MS: u64 = 5000;

/// Retry interval while waiting for the file lock.
const FILE_LOCK_RETRY_MS: u64 = 50;

/// Whole-document line storage.
pub trait LineStore: Send + Sync {
    /// Read the ordered lines of a document.
    fn read(&self, path: &str) -> Result<Vec<String>>;

    /// Replace the document with the given lines.
    fn write(&self, path: &str, lines: &[String]) -> Result<()>;

    /// Whether the document exists.
    fn exists(&self, path: &str) -> bool;
}

/// Filesystem-backed line store rooted at a sheet directory.
pub struct FsLineStore {
    resolver: PathResolver,
}

impl FsLineStore {
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }
}

impl LineStore for FsLineStore {
    fn read(&self, path: &str) -> Result<Vec<String>> {
        let file = self.resolver.resolve(path)?;
        if !file.exists() {
            return Err(Error::SheetNotFound(path.to_string()));
        }
        let raw = fs::read_to_string(&file)?;
        Ok(raw.lines().map(str::to_string).collect())
    }

    fn write(&self, path: &str, lines: &[String]) -> Result<()> {
        let file = self.resolver.resolve(path)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut data = lines.join("\n");
        data.push('\n');

        let lock_path = PathBuf::from(format!("{}.lock", file.display()));
        let _lock = FileLock::acquire(&lock_path, FILE_LOCK_TIMEOUT_MS)?;
        write_atomic(&file, data.as_bytes())
    }

    fn exists(&self, path: &str) -> bool {
        self.resolver
            .resolve(path)
            .map(|p| p.exists())
            .unwrap_or(false)
    }
}

/// In-memory line store for tests.
#[derive(Default)]
pub struct MemLineStore {
    sheets: Mutex<HashMap<String, Vec<String>>>,
}

impl MemLineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document.
    pub fn insert(&self, path: &str, lines: &[&str]) {
        let key = PathResolver::canonical_key(path);
        let lines = lines.iter().map(|l| l.to_string()).collect();
        self.sheets.lock().unwrap().insert(key, lines);
    }
}

impl LineStore for MemLineStore {
    fn read(&self, path: &str) -> Result<Vec<String>> {
        let key = PathResolver::canonical_key(path);
        self.sheets
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::SheetNotFound(path.to_string()))
    }

    fn write(&self, path: &str, lines: &[String]) -> Result<()> {
        let key = PathResolver::canonical_key(path);
        self.sheets.lock().unwrap().insert(key, lines.to_vec());
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        let key = PathResolver::canonical_key(path);
        self.sheets.lock().unwrap().contains_key(&key)
    }
}

fn is_lock_contended(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }

    // On Windows, fs2 can surface lock/sharing violations as "Other".
    #[cfg(windows)]
    {
        matches!(err.raw_os_error(), Some(32) | Some(33))
    }
    #[cfg(not(windows))]
    {
        false
    }
}

/// Advisory file lock guard; released on drop.
struct FileLock {
    file: File,
}

impl FileLock {
    fn acquire(path: &Path, timeout_ms: u64) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let start = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);
        let retry = Duration::from_millis(FILE_LOCK_RETRY_MS);

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(FileLock { file }),
                Err(e) if is_lock_contended(&e) => {
                    if start.elapsed() >= timeout {
                        return Err(Error::FileLockFailed(path.to_path_buf()));
                    }
                    std::thread::sleep(retry);
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Write `data` to a temp file in the target's directory, then rename
/// over the target. The document is either fully replaced or untouched.
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let temp_path = path.with_extension(format!(
        "{}.tmp.{}",
        path.extension().and_then(|e| e.to_str()).unwrap_or(""),
        std::process::id()
    ));

    let mut temp_file = File::create(&temp_path)?;
    temp_file.write_all(data)?;
    temp_file.sync_all()?;
    drop(temp_file);

    fs::rename(&temp_path, path)?;
    Ok(())
}
