#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sheetsync::engine::SheetEngine;
use sheetsync::feed::ChangeFeed;
use sheetsync::notes::FsNoteStore;
use sheetsync::paths::PathResolver;
use sheetsync::registry::CellLockRegistry;
use sheetsync::store::FsLineStore;
use tempfile::TempDir;

/// Four-line starter document used across suites: header, fixed row,
/// one data row, footer.
pub const SMALL_SHEET: &[&str] = &["h;h", "FIX;1", "1;a", "FOOT;0"];

/// A temp directory of sheet files plus a fully wired engine.
pub struct TestWorkspace {
    dir: TempDir,
    pub locks: Arc<CellLockRegistry>,
    pub feed: Arc<ChangeFeed>,
    pub engine: SheetEngine<FsLineStore>,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let resolver = PathResolver::new(dir.path());
        let locks = Arc::new(CellLockRegistry::default());
        let feed = Arc::new(ChangeFeed::default());
        let engine = SheetEngine::new(
            FsLineStore::new(resolver.clone()),
            Arc::clone(&locks),
            Arc::clone(&feed),
        )
        .with_notes(Box::new(FsNoteStore::new(resolver)));

        Self {
            dir,
            locks,
            feed,
            engine,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_sheet(&self, rel_path: &str, lines: &[&str]) -> PathBuf {
        let rel = rel_path.trim_start_matches('/');
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create sheet dir");
        }
        let mut contents = lines.join("\n");
        contents.push('\n');
        fs::write(&path, contents).expect("write sheet");
        path
    }

    pub fn read_sheet(&self, rel_path: &str) -> Vec<String> {
        let rel = rel_path.trim_start_matches('/');
        let raw = fs::read_to_string(self.dir.path().join(rel)).expect("read sheet");
        raw.lines().map(str::to_string).collect()
    }

    pub fn write_config(&self, contents: &str) -> PathBuf {
        let path = self.dir.path().join(".sheetsync.toml");
        fs::write(&path, contents).expect("write config");
        path
    }

    pub fn write_note(&self, sheet: &str, row: usize, body: &str) -> PathBuf {
        let path = self.note_path(sheet, row);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create note dir");
        }
        fs::write(&path, body).expect("write note");
        path
    }

    pub fn note_path(&self, sheet: &str, row: usize) -> PathBuf {
        let clean = sheet.trim_start_matches('/').trim_end_matches(".csv");
        let flat: String = clean
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.dir
            .path()
            .join("notes")
            .join(format!("_{flat}"))
            .join(format!("{row}.txt"))
    }
}
