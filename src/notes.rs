//! Per-row note attachments.
//!
//! Each data row may carry a free-text note stored outside the sheet
//! file, under `notes/<flattened sheet name>/<row>.txt` at the sheet
//! root. Promotion copies the source row's note to the target sheet's
//! note directory, and removes a stale target note when the source has
//! none.

use std::fs;

use crate::error::Result;
use crate::paths::PathResolver;

/// Directory under the sheet root holding all note attachments.
pub const NOTES_DIR: &str = "notes";

/// Access to per-row note attachments.
pub trait NoteStore: Send + Sync {
    /// Mirror the note of `(source_sheet, row)` onto `target_sheet`:
    /// copy it when present, delete the target's note when absent.
    fn copy_note(&self, source_sheet: &str, row: usize, target_sheet: &str) -> Result<()>;
}

/// Filesystem note store.
pub struct FsNoteStore {
    resolver: PathResolver,
}

impl FsNoteStore {
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// `/BDBR/Prelim.csv` maps to `notes/_BDBR_Prelim/` under the root.
    fn note_dir(sheet: &str) -> String {
        let clean = sheet.trim_end_matches(".csv");
        let mut flat: String = clean
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        if !flat.starts_with('_') {
            flat.insert(0, '_');
        }
        format!("{}/{}", NOTES_DIR, flat)
    }

    fn note_rel_path(sheet: &str, row: usize) -> String {
        format!("{}/{}.txt", Self::note_dir(sheet), row)
    }
}

impl NoteStore for FsNoteStore {
    fn copy_note(&self, source_sheet: &str, row: usize, target_sheet: &str) -> Result<()> {
        let source = self
            .resolver
            .resolve(&Self::note_rel_path(source_sheet, row))?;
        let target = self
            .resolver
            .resolve(&Self::note_rel_path(target_sheet, row))?;

        if source.exists() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&source, &target)?;
        } else if target.exists() {
            fs::remove_file(&target)?;
        }

        Ok(())
    }
}

/// Note store that stores nothing; used by tests and deployments
/// without attachments.
pub struct NoNotes;

impl NoteStore for NoNotes {
    fn copy_note(&self, _source_sheet: &str, _row: usize, _target_sheet: &str) -> Result<()> {
        Ok(())
    }
}
