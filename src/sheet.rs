//! In-memory model of a shared sheet document.
//!
//! A sheet is an ordered list of semicolon-delimited lines:
//!
//! ```text
//! line 0          header (defines the column count)
//! line 1          fixed row (never deleted, moved, or displaced)
//! lines 2..len-2  mutable data region
//! line len-1      footer (totals; never deleted or displaced)
//! ```
//!
//! Clients address cells by *model row*, the 0-based grid row where row 0
//! is the fixed row: `file_line = model_row + 1`. Column 0 of every line
//! in the mutable region carries its 1-based sequential position; the
//! renumbering pass restores that invariant after structural mutations.

use std::collections::BTreeMap;

/// Column separator used by all sheet documents.
pub const SEPARATOR: char = ';';

/// File line holding the header.
pub const HEADER_LINE: usize = 0;

/// File line holding the protected fixed row.
pub const FIXED_LINE: usize = 1;

/// First file line of the mutable data region.
pub const FIRST_DATA_LINE: usize = 2;

/// Convert a model row (grid row, fixed row = 0) to a file line index.
pub fn file_line(model_row: usize) -> usize {
    model_row + 1
}

/// Convert a file line index back to a model row.
///
/// Returns `None` for the header, which has no model row.
pub fn model_row(file_line: usize) -> Option<usize> {
    file_line.checked_sub(1)
}

/// Split a line into columns, preserving empty trailing columns.
pub fn split_columns(line: &str) -> Vec<String> {
    line.split(SEPARATOR).map(str::to_string).collect()
}

/// Join columns back into a line.
pub fn join_columns(columns: &[String]) -> String {
    columns.join(&SEPARATOR.to_string())
}

/// Per-column default values for newly inserted rows, keyed by column
/// position. The table is fixed and position-indexed; nothing is inferred
/// from cell content.
#[derive(Debug, Clone)]
pub struct ColumnDefaults {
    values: BTreeMap<usize, String>,
}

impl Default for ColumnDefaults {
    fn default() -> Self {
        let mut values = BTreeMap::new();
        values.insert(0, "0".to_string());
        values.insert(8, "00:00".to_string());
        values.insert(9, "00:00".to_string());
        values.insert(10, "00:00".to_string());
        values.insert(13, "00:00:00".to_string());
        Self { values }
    }
}

impl ColumnDefaults {
    /// Build a defaults table from explicit per-column values. An empty
    /// map falls back to the built-in table.
    pub fn from_overrides(overrides: BTreeMap<usize, String>) -> Self {
        if overrides.is_empty() {
            Self::default()
        } else {
            Self { values: overrides }
        }
    }

    /// Default value for a column position; empty string when unlisted.
    pub fn value_for(&self, col: usize) -> &str {
        self.values.get(&col).map(String::as_str).unwrap_or("")
    }

    /// Build a fresh row with the given column count.
    pub fn new_row(&self, columns: usize) -> String {
        let cells: Vec<String> = (0..columns)
            .map(|col| self.value_for(col).to_string())
            .collect();
        join_columns(&cells)
    }
}

/// A sheet document held as an ordered line buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    lines: Vec<String>,
}

impl Sheet {
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Minimal well-formed sheet: header, fixed row, footer.
    ///
    /// The fixed row and footer are blank rows matching the header's
    /// column count.
    pub fn scaffold(header: &str) -> Self {
        let columns = split_columns(header).len();
        let blank = blank_row(columns);
        Self {
            lines: vec![header.to_string(), blank.clone(), blank],
        }
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// File line index of the footer.
    pub fn footer_line(&self) -> usize {
        self.lines.len().saturating_sub(1)
    }

    /// Column count as defined by the header.
    pub fn column_count(&self) -> usize {
        match self.lines.first() {
            Some(header) => split_columns(header).len(),
            None => 0,
        }
    }

    /// Whether the sheet has the protected header/fixed/footer frame.
    pub fn has_frame(&self) -> bool {
        self.lines.len() >= 3
    }

    /// Whether a file line falls inside the mutable data region.
    pub fn is_mutable_line(&self, line: usize) -> bool {
        self.has_frame() && line >= FIRST_DATA_LINE && line < self.footer_line()
    }

    /// Number of rows in the mutable data region.
    pub fn data_row_count(&self) -> usize {
        if self.has_frame() {
            self.footer_line() - FIRST_DATA_LINE
        } else {
            0
        }
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn insert_line(&mut self, index: usize, line: String) {
        self.lines.insert(index, line);
    }

    pub fn remove_line(&mut self, index: usize) -> String {
        self.lines.remove(index)
    }

    pub fn push_line(&mut self, line: String) {
        self.lines.push(line);
    }

    pub fn pop_line(&mut self) -> Option<String> {
        self.lines.pop()
    }

    pub fn set_line(&mut self, index: usize, line: String) {
        self.lines[index] = line;
    }

    /// Columns of a file line, split preserving empties.
    pub fn columns(&self, line: usize) -> Option<Vec<String>> {
        self.lines.get(line).map(|l| split_columns(l))
    }

    /// Set one cell of a file line, padding the row with empty columns
    /// when `col` exceeds its current width.
    pub fn set_cell(&mut self, line: usize, col: usize, value: &str) {
        let mut columns = split_columns(&self.lines[line]);
        if col >= columns.len() {
            columns.resize(col + 1, String::new());
        }
        columns[col] = value.to_string();
        self.lines[line] = join_columns(&columns);
    }

    /// A blank row matching the header's column count.
    pub fn blank_row(&self) -> String {
        blank_row(self.column_count())
    }

    /// Rewrite column 0 of every line in the mutable data region to its
    /// 1-based sequential position. Lines whose number already matches
    /// are left untouched. Returns how many lines changed.
    pub fn renumber(&mut self) -> usize {
        if !self.has_frame() {
            return 0;
        }

        let footer = self.footer_line();
        let mut sequence = 1usize;
        let mut changed = 0usize;

        for index in FIRST_DATA_LINE..footer {
            let mut columns = split_columns(&self.lines[index]);
            let wanted = sequence.to_string();
            if !columns.is_empty() && columns[0] != wanted {
                columns[0] = wanted;
                self.lines[index] = join_columns(&columns);
                changed += 1;
            }
            sequence += 1;
        }

        changed
    }

    /// Check the sequential-numbering invariant without mutating.
    pub fn is_numbered(&self) -> bool {
        if !self.has_frame() {
            return true;
        }

        let footer = self.footer_line();
        for (offset, index) in (FIRST_DATA_LINE..footer).enumerate() {
            let columns = split_columns(&self.lines[index]);
            let wanted = (offset + 1).to_string();
            if columns.first().map(String::as_str) != Some(wanted.as_str()) {
                return false;
            }
        }
        true
    }
}

/// A row of empty cells for the given column count.
pub fn blank_row(columns: usize) -> String {
    SEPARATOR.to_string().repeat(columns.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(lines: &[&str]) -> Sheet {
        Sheet::from_lines(lines.iter().map(|l| l.to_string()).collect())
    }

    #[test]
    fn split_preserves_empty_columns() {
        assert_eq!(split_columns("a;;c;"), vec!["a", "", "c", ""]);
        assert_eq!(split_columns(""), vec![""]);
    }

    #[test]
    fn geometry() {
        let s = sheet(&["h;h;h", "FIX;;", "1;a;b", "2;c;d", "TOTAL;;"]);
        assert_eq!(s.column_count(), 3);
        assert_eq!(s.footer_line(), 4);
        assert_eq!(s.data_row_count(), 2);
        assert!(s.is_mutable_line(2));
        assert!(s.is_mutable_line(3));
        assert!(!s.is_mutable_line(1));
        assert!(!s.is_mutable_line(4));
    }

    #[test]
    fn model_row_mapping() {
        // Model row 0 is the fixed row at file line 1.
        assert_eq!(file_line(0), 1);
        assert_eq!(file_line(3), 4);
        assert_eq!(model_row(1), Some(0));
        assert_eq!(model_row(0), None);
    }

    #[test]
    fn renumber_rewrites_only_wrong_lines() {
        let mut s = sheet(&["h;h", "FIX;1", "0;a", "1;b", "9;c", "FOOT;0"]);
        let changed = s.renumber();
        assert_eq!(changed, 3);
        assert_eq!(
            s.lines(),
            &["h;h", "FIX;1", "1;a", "2;b", "3;c", "FOOT;0"]
        );

        // Already sequential: nothing rewritten.
        assert_eq!(s.renumber(), 0);
        assert!(s.is_numbered());
    }

    #[test]
    fn renumber_post_insert_matches_contract() {
        // ["h;h","FIX;1","0;...","A;1","FOOT;0"] pre-renumber becomes
        // ["h;h","FIX;1","1;...","A;2","FOOT;0"].
        let mut s = sheet(&["h;h", "FIX;1", "0;x", "A;1", "FOOT;0"]);
        s.renumber();
        assert_eq!(s.lines(), &["h;h", "FIX;1", "1;x", "2;1", "FOOT;0"]);
    }

    #[test]
    fn set_cell_pads_columns() {
        let mut s = sheet(&["h;h", "FIX;1", "1;a", "FOOT;0"]);
        s.set_cell(2, 4, "v");
        assert_eq!(s.line(2), Some("1;a;;;v"));
    }

    #[test]
    fn column_defaults_table() {
        let defaults = ColumnDefaults::default();
        assert_eq!(defaults.value_for(0), "0");
        assert_eq!(defaults.value_for(8), "00:00");
        assert_eq!(defaults.value_for(13), "00:00:00");
        assert_eq!(defaults.value_for(5), "");

        let row = defaults.new_row(3);
        assert_eq!(row, "0;;");
    }

    #[test]
    fn column_defaults_overrides() {
        let mut overrides = BTreeMap::new();
        overrides.insert(1, "n/a".to_string());
        let defaults = ColumnDefaults::from_overrides(overrides);
        assert_eq!(defaults.value_for(0), "");
        assert_eq!(defaults.value_for(1), "n/a");

        // Empty override map keeps the built-in table.
        let defaults = ColumnDefaults::from_overrides(BTreeMap::new());
        assert_eq!(defaults.value_for(0), "0");
    }

    #[test]
    fn scaffold_has_frame() {
        let s = Sheet::scaffold("num;title;status");
        assert_eq!(s.len(), 3);
        assert!(s.has_frame());
        assert_eq!(s.column_count(), 3);
        assert_eq!(s.line(1), Some(";;"));
        assert_eq!(s.data_row_count(), 0);
    }
}
