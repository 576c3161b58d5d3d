//! Row mutation engine.
//!
//! Implements the structural sheet operations (insert, delete, move,
//! cell edit, promote) against whole-document snapshots from a
//! [`LineStore`], consulting and updating the [`CellLockRegistry`] and
//! publishing every successful mutation to the [`ChangeFeed`] before
//! returning.
//!
//! Concurrency: each document has a mutual-exclusion scope. A
//! structural mutation's read-validate-mutate-renumber-write cycle runs
//! entirely inside it, so two mutations of the same sheet can never
//! interleave; cell edits share the scope so they cannot race a
//! structural change. Operations on different sheets proceed in
//! parallel. Nothing blocks on advisory locks: a conflict is returned
//! to the caller immediately.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::feed::{ChangeDraft, ChangeFeed, ChangeKind};
use crate::notes::{NoNotes, NoteStore};
use crate::paths::PathResolver;
use crate::registry::{CellLockRegistry, CellRef};
use crate::sheet::{self, blank_row, ColumnDefaults, Sheet, FIRST_DATA_LINE, FIXED_LINE};
use crate::store::LineStore;

/// Column of the source row that counts how many times it was promoted.
const PROMOTE_COUNTER_COL: usize = 1;

#[derive(Serialize)]
struct InsertPayload {
    row: usize,
    after: usize,
}

#[derive(Serialize)]
struct RowPayload {
    row: usize,
}

#[derive(Serialize)]
struct MovePayload {
    from: usize,
    to: usize,
}

#[derive(Serialize)]
struct CellPayload<'a> {
    row: usize,
    col: usize,
    value: &'a str,
}

/// The mutation engine over one sheet root.
pub struct SheetEngine<S: LineStore> {
    store: S,
    locks: Arc<CellLockRegistry>,
    feed: Arc<ChangeFeed>,
    notes: Box<dyn NoteStore>,
    defaults: ColumnDefaults,
    guards: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: LineStore> SheetEngine<S> {
    pub fn new(store: S, locks: Arc<CellLockRegistry>, feed: Arc<ChangeFeed>) -> Self {
        Self {
            store,
            locks,
            feed,
            notes: Box::new(NoNotes),
            defaults: ColumnDefaults::default(),
            guards: Mutex::new(HashMap::new()),
        }
    }

    /// Attach a note store for per-row attachments.
    pub fn with_notes(mut self, notes: Box<dyn NoteStore>) -> Self {
        self.notes = notes;
        self
    }

    /// Override the column-default table for inserted rows.
    pub fn with_defaults(mut self, defaults: ColumnDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn guard(&self, key: &str) -> Arc<Mutex<()>> {
        let mut guards = self.guards.lock().unwrap();
        Arc::clone(guards.entry(key.to_string()).or_default())
    }

    /// Raw lines of a sheet, for viewers.
    pub fn load(&self, path: &str) -> Result<Vec<String>> {
        let key = PathResolver::canonical_key(path);
        self.store.read(&key)
    }

    /// Create a fresh sheet: header, blank fixed row, blank footer.
    pub fn create_sheet(&self, path: &str, header: &str) -> Result<()> {
        let key = PathResolver::canonical_key(path);
        let guard = self.guard(&key);
        let _g = guard.lock().unwrap();

        if self.store.exists(&key) {
            return Err(Error::InvalidArgument(format!(
                "sheet already exists: {}",
                key
            )));
        }

        let sheet = Sheet::scaffold(header);
        self.store.write(&key, sheet.lines())?;
        self.feed.publish(ChangeDraft::new(ChangeKind::Created, key.as_str()));
        info!(sheet = %key, "sheet created");
        Ok(())
    }

    /// Check that no column of `row` is locked by anyone but `user`.
    ///
    /// This is the single conflict-detection primitive shared by
    /// delete, move, and promote.
    fn validate_row_free(&self, key: &str, row: usize, user: &str, sheet: &Sheet) -> Result<()> {
        for col in 0..sheet.column_count() {
            let cell = CellRef::new(key, row, col);
            if let Some(owner) = self.locks.owner(&cell) {
                if owner != user {
                    return Err(Error::RowLocked { column: col, owner });
                }
            }
        }
        Ok(())
    }

    /// Insert a fresh default-valued row immediately below model row
    /// `after`. Returns the model row of the new line.
    pub fn insert_row(&self, path: &str, after: usize, user: &str) -> Result<usize> {
        let key = PathResolver::canonical_key(path);
        let guard = self.guard(&key);
        let _g = guard.lock().unwrap();

        let mut doc = Sheet::from_lines(self.store.read(&key)?);
        if !doc.has_frame() {
            return Err(Error::InvalidArgument(format!(
                "sheet {} is missing its header/fixed/footer frame",
                key
            )));
        }

        // Strictly below the fixed row, strictly above the footer: an
        // out-of-range target is clamped into the mutable region.
        let insert_line = after
            .saturating_add(2)
            .min(doc.footer_line())
            .max(FIRST_DATA_LINE);

        doc.insert_line(insert_line, self.defaults.new_row(doc.column_count()));
        doc.renumber();
        self.store.write(&key, doc.lines())?;

        // Every lock at or below the insertion point moves down one row.
        let inserted_row = insert_line - 1;
        self.locks.shift_rows(&key, inserted_row, 1);

        self.feed.publish(
            ChangeDraft::new(ChangeKind::RowInserted, key.as_str())
                .actor(user)
                .with_data(InsertPayload {
                    row: inserted_row,
                    after,
                })?,
        );
        info!(sheet = %key, row = inserted_row, user = %user, "row inserted");
        Ok(inserted_row)
    }

    /// Delete the data row at model row `row`.
    pub fn delete_row(&self, path: &str, row: usize, user: &str) -> Result<()> {
        let key = PathResolver::canonical_key(path);
        let guard = self.guard(&key);
        let _g = guard.lock().unwrap();

        let mut doc = Sheet::from_lines(self.store.read(&key)?);
        if !doc.has_frame() {
            return Err(Error::InvalidArgument(format!(
                "sheet {} is missing its header/fixed/footer frame",
                key
            )));
        }

        let line = sheet::file_line(row);
        if line <= FIXED_LINE {
            return Err(Error::InvalidArgument(
                "the fixed top row cannot be deleted".to_string(),
            ));
        }
        if line >= doc.footer_line() {
            return Err(Error::InvalidArgument(
                "the footer cannot be deleted".to_string(),
            ));
        }

        self.validate_row_free(&key, row, user, &doc)?;

        doc.remove_line(line);
        doc.renumber();
        self.store.write(&key, doc.lines())?;

        // Locks on the removed row reference a row that no longer
        // exists; everything below closes the gap.
        self.locks.release_row(&key, row);
        self.locks.shift_rows(&key, row + 1, -1);

        self.feed.publish(
            ChangeDraft::new(ChangeKind::RowDeleted, key.as_str())
                .actor(user)
                .with_data(RowPayload { row })?,
        );
        info!(sheet = %key, row, user = %user, "row deleted");
        Ok(())
    }

    /// Move the data row at model row `from` to model row `to`.
    ///
    /// Locks anywhere in the transit span block the move, not just the
    /// endpoints: renumbering touches every row between them. Because
    /// the whole span is verified lock-free, the move itself never
    /// relocates locks.
    pub fn move_row(&self, path: &str, from: usize, to: usize, user: &str) -> Result<()> {
        let key = PathResolver::canonical_key(path);
        let guard = self.guard(&key);
        let _g = guard.lock().unwrap();

        let mut doc = Sheet::from_lines(self.store.read(&key)?);
        if !doc.has_frame() {
            return Err(Error::InvalidArgument(format!(
                "sheet {} is missing its header/fixed/footer frame",
                key
            )));
        }

        let from_line = sheet::file_line(from);
        let to_line = sheet::file_line(to);
        let footer = doc.footer_line();

        if from_line <= FIXED_LINE || to_line <= FIXED_LINE {
            return Err(Error::InvalidArgument(
                "the fixed top row cannot be moved or displaced".to_string(),
            ));
        }
        if from_line >= footer || to_line >= footer {
            return Err(Error::InvalidArgument(
                "the footer cannot be moved or displaced".to_string(),
            ));
        }
        if from == to {
            return Err(Error::InvalidArgument(
                "move source and destination are the same row".to_string(),
            ));
        }

        for row in from.min(to)..=from.max(to) {
            self.validate_row_free(&key, row, user, &doc)?;
        }

        let moved = doc.remove_line(from_line);
        doc.insert_line(to_line, moved);
        doc.renumber();
        self.store.write(&key, doc.lines())?;

        self.feed.publish(
            ChangeDraft::new(ChangeKind::RowMoved, key.as_str())
                .actor(user)
                .with_data(MovePayload { from, to })?,
        );
        info!(sheet = %key, from, to, user = %user, "row moved");
        Ok(())
    }

    /// Replace one cell value. Lock ownership is the caller's
    /// responsibility: the transport acquires the cell lock before
    /// routing an edit here. Rows narrower than `col` are padded with
    /// empty columns.
    pub fn edit_cell(
        &self,
        path: &str,
        row: usize,
        col: usize,
        value: &str,
        user: &str,
    ) -> Result<()> {
        let key = PathResolver::canonical_key(path);
        let guard = self.guard(&key);
        let _g = guard.lock().unwrap();

        let mut doc = Sheet::from_lines(self.store.read(&key)?);
        let line = sheet::file_line(row);
        if line >= doc.len() {
            return Err(Error::RowNotFound(row));
        }

        doc.set_cell(line, col, value);
        self.store.write(&key, doc.lines())?;

        self.feed.publish(
            ChangeDraft::new(ChangeKind::CellChanged, key.as_str())
                .actor(user)
                .with_data(CellPayload { row, col, value })?,
        );
        info!(sheet = %key, row, col, user = %user, "cell edited");
        Ok(())
    }

    /// Copy the source row into the target sheet ("promote to final"),
    /// incrementing the promotion counter in column 1 of the source.
    ///
    /// The target row index equals the source row index; the target is
    /// created and padded with blank rows as needed, and its footer is
    /// held aside so the copy can never displace it. The source counter
    /// increment persists even if the target write is later refused:
    /// promote is two document transactions, not one.
    pub fn promote_row(&self, source: &str, row: usize, target: &str, user: &str) -> Result<()> {
        let src_key = PathResolver::canonical_key(source);
        let tgt_key = PathResolver::canonical_key(target);

        // Take both document scopes in sorted order so two opposite
        // promotes cannot deadlock.
        let (first, second) = if src_key <= tgt_key {
            (&src_key, &tgt_key)
        } else {
            (&tgt_key, &src_key)
        };
        let first_guard = self.guard(first);
        let second_guard = (first != second).then(|| self.guard(second));
        let _g1 = first_guard.lock().unwrap();
        let _g2 = second_guard.as_ref().map(|m| m.lock().unwrap());

        let mut src = Sheet::from_lines(self.store.read(&src_key)?);
        let line = sheet::file_line(row);
        if line >= src.len() {
            return Err(Error::RowNotFound(row));
        }
        self.validate_row_free(&src_key, row, user, &src)?;

        // Bump the promotion counter; blank or garbage counts as zero.
        let columns_wanted = src.column_count().max(PROMOTE_COUNTER_COL + 1);
        let mut columns = src.columns(line).unwrap_or_default();
        if columns.len() < columns_wanted {
            columns.resize(columns_wanted, String::new());
        }
        let count: u64 = columns[PROMOTE_COUNTER_COL].trim().parse().unwrap_or(0);
        columns[PROMOTE_COUNTER_COL] = (count + 1).to_string();
        let promoted = sheet::join_columns(&columns);

        src.set_line(line, promoted.clone());
        self.store.write(&src_key, src.lines())?;

        // Bootstrap the target with header + footer when absent.
        let header = src.line(0).unwrap_or_default().to_string();
        let width = src.column_count();
        if !self.store.exists(&tgt_key) {
            let lines = vec![header, blank_row(width)];
            self.store.write(&tgt_key, &lines)?;
        }

        let mut tgt = Sheet::from_lines(self.store.read(&tgt_key)?);

        // Hold the footer aside, pad up to the destination, write the
        // row, then put the footer back at the end.
        let footer = if tgt.len() > 1 {
            tgt.pop_line().unwrap_or_default()
        } else {
            blank_row(width)
        };

        while tgt.len() <= line {
            tgt.push_line(blank_row(width));
        }

        self.validate_row_free(&tgt_key, row, user, &tgt)?;
        tgt.set_line(line, promoted);
        tgt.push_line(footer);
        self.store.write(&tgt_key, tgt.lines())?;

        self.notes.copy_note(&src_key, row, &tgt_key)?;

        // Viewers of the target see the new row; viewers of the source
        // see the incremented counter.
        self.feed.publish(
            ChangeDraft::new(ChangeKind::RowInserted, tgt_key.as_str())
                .actor(user)
                .with_data(RowPayload { row })?,
        );
        self.feed.publish(
            ChangeDraft::new(ChangeKind::RowInserted, src_key.as_str())
                .actor(user)
                .with_data(RowPayload { row })?,
        );
        info!(source = %src_key, target = %tgt_key, row, user = %user, "row promoted");
        Ok(())
    }

    /// Restore the sequential-numbering invariant of a sheet. Returns
    /// how many lines changed; only a changed sheet is rewritten.
    pub fn renumber(&self, path: &str, user: &str) -> Result<usize> {
        let key = PathResolver::canonical_key(path);
        let guard = self.guard(&key);
        let _g = guard.lock().unwrap();

        let mut doc = Sheet::from_lines(self.store.read(&key)?);
        let changed = doc.renumber();
        if changed > 0 {
            self.store.write(&key, doc.lines())?;
            self.feed
                .publish(ChangeDraft::new(ChangeKind::Updated, key.as_str()).actor(user));
            info!(sheet = %key, changed, user = %user, "sheet renumbered");
        }
        Ok(changed)
    }
}
