//! Advisory lock registries for cells and whole sheets.
//!
//! Locks are in-memory, per-process, and carry a TTL. There is no sweep
//! thread: a lock whose TTL has passed is evicted the next time its key
//! is accessed. A stale lock on a key nobody touches stays in the table
//! harmlessly until the next `acquire`/`owner` call on that exact key.
//!
//! `acquire` is a non-blocking try-lock. It never queues; a caller that
//! wants blocking semantics retries outside the registry.
//!
//! Registries are plain constructor-injected values with an internal
//! mutex, so tests can run any number of independent instances.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Default time-to-live for cell and sheet locks.
pub fn default_ttl() -> Duration {
    Duration::minutes(2)
}

/// Address of one cell: sheet path plus model row/column.
///
/// Row and column are model indices as seen by the client grid (row 0 is
/// the fixed row), not raw file line indices. The sheet path must be the
/// canonical root-relative key; callers normalize before locking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CellRef {
    pub sheet: String,
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    pub fn new(sheet: impl Into<String>, row: usize, col: usize) -> Self {
        Self {
            sheet: sheet.into(),
            row,
            col,
        }
    }
}

/// An advisory lock on one cell. Immutable; renewal replaces the value.
#[derive(Debug, Clone, Serialize)]
pub struct CellLock {
    pub cell: CellRef,
    pub owner: String,
    pub expires_at: DateTime<Utc>,
}

impl CellLock {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// In-memory registry of per-cell advisory locks.
pub struct CellLockRegistry {
    ttl: Duration,
    locks: Mutex<HashMap<CellRef, CellLock>>,
}

impl CellLockRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Try to acquire or renew the lock on a cell.
    ///
    /// Re-acquiring a live lock you already own renews its expiry and is
    /// never a conflict. A live lock held by someone else fails with
    /// [`Error::LockConflict`] naming the holder, and leaves the table
    /// untouched.
    pub fn acquire(&self, cell: CellRef, owner: &str) -> Result<CellLock> {
        self.acquire_at(cell, owner, Utc::now())
    }

    pub fn acquire_at(
        &self,
        cell: CellRef,
        owner: &str,
        now: DateTime<Utc>,
    ) -> Result<CellLock> {
        let mut locks = self.locks.lock().unwrap();

        let existing = locks
            .get(&cell)
            .map(|lock| (lock.is_expired_at(now), lock.owner.clone()));
        match existing {
            Some((true, stale_owner)) => {
                debug!(sheet = %cell.sheet, row = cell.row, col = cell.col,
                       stale_owner = %stale_owner, "evicting expired lock");
                locks.remove(&cell);
            }
            Some((false, holder)) if holder != owner => {
                debug!(sheet = %cell.sheet, row = cell.row, col = cell.col,
                       holder = %holder, requester = %owner, "lock refused");
                return Err(Error::LockConflict { owner: holder });
            }
            _ => {}
        }

        let lock = CellLock {
            cell: cell.clone(),
            owner: owner.to_string(),
            expires_at: now + self.ttl,
        };
        debug!(sheet = %cell.sheet, row = cell.row, col = cell.col,
               owner = %owner, expires_at = %lock.expires_at, "lock granted");
        locks.insert(cell, lock.clone());
        Ok(lock)
    }

    /// Current owner of a cell's lock, evicting it first if expired.
    pub fn owner(&self, cell: &CellRef) -> Option<String> {
        self.owner_at(cell, Utc::now())
    }

    pub fn owner_at(&self, cell: &CellRef, now: DateTime<Utc>) -> Option<String> {
        let mut locks = self.locks.lock().unwrap();
        let state = locks
            .get(cell)
            .map(|lock| (lock.is_expired_at(now), lock.owner.clone()));
        match state {
            Some((true, _)) => {
                locks.remove(cell);
                None
            }
            Some((false, owner)) => Some(owner),
            None => None,
        }
    }

    /// Whether `owner` holds a live lock on the cell.
    pub fn is_owner(&self, cell: &CellRef, owner: &str) -> bool {
        self.is_owner_at(cell, owner, Utc::now())
    }

    pub fn is_owner_at(&self, cell: &CellRef, owner: &str, now: DateTime<Utc>) -> bool {
        self.owner_at(cell, now).as_deref() == Some(owner)
    }

    /// Release a lock if, and only if, `owner` currently holds it.
    /// Releasing someone else's lock, or a missing lock, is a no-op.
    pub fn release(&self, cell: &CellRef, owner: &str) {
        let mut locks = self.locks.lock().unwrap();
        let holder = locks.get(cell).map(|lock| lock.owner.clone());
        match holder {
            Some(current) if current == owner => {
                locks.remove(cell);
                debug!(sheet = %cell.sheet, row = cell.row, col = cell.col,
                       owner = %owner, "lock released");
            }
            Some(current) => {
                debug!(sheet = %cell.sheet, row = cell.row, col = cell.col,
                       holder = %current, requester = %owner,
                       "release denied: not owner");
            }
            None => {}
        }
    }

    /// Relocate every lock on `sheet` with `row >= from_row` by `delta`
    /// rows, preserving owner and expiry. Locks that would land on a
    /// negative row are dropped. Collisions resolve in favor of the
    /// shifted lock.
    pub fn shift_rows(&self, sheet: &str, from_row: usize, delta: i64) {
        let mut locks = self.locks.lock().unwrap();

        let affected: Vec<CellRef> = locks
            .keys()
            .filter(|cell| cell.sheet == sheet && cell.row >= from_row)
            .cloned()
            .collect();

        for old_cell in affected {
            let Some(lock) = locks.remove(&old_cell) else {
                continue;
            };
            let new_row = old_cell.row as i64 + delta;
            if new_row < 0 {
                debug!(sheet = %sheet, row = old_cell.row, col = old_cell.col,
                       "lock dropped: shifted below row 0");
                continue;
            }

            let new_cell = CellRef::new(old_cell.sheet.clone(), new_row as usize, old_cell.col);
            debug!(sheet = %sheet, col = old_cell.col,
                   from = old_cell.row, to = new_cell.row, "lock shifted");
            locks.insert(
                new_cell.clone(),
                CellLock {
                    cell: new_cell,
                    owner: lock.owner,
                    expires_at: lock.expires_at,
                },
            );
        }
    }

    /// Drop every lock on one row of a sheet, regardless of owner. Used
    /// when the row itself is removed.
    pub fn release_row(&self, sheet: &str, row: usize) {
        let mut locks = self.locks.lock().unwrap();
        locks.retain(|cell, _| !(cell.sheet == sheet && cell.row == row));
    }

    /// Drop every lock held by `owner` across all sheets. Returns how
    /// many were removed. Called on disconnect or session timeout.
    pub fn release_all_by_owner(&self, owner: &str) -> usize {
        let mut locks = self.locks.lock().unwrap();
        let before = locks.len();
        locks.retain(|_, lock| lock.owner != owner);
        let removed = before - locks.len();
        if removed > 0 {
            debug!(owner = %owner, count = removed, "released all locks for owner");
        }
        removed
    }

    /// Number of table entries, live or stale.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CellLockRegistry {
    fn default() -> Self {
        Self::new(default_ttl())
    }
}

/// A whole-sheet advisory lock.
#[derive(Debug, Clone, Serialize)]
pub struct SheetLock {
    pub path: String,
    pub owner: String,
    pub expires_at: DateTime<Utc>,
}

impl SheetLock {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Registry of whole-document locks, used when a client holds an entire
/// sheet (bulk edits, imports). Same TTL and lazy-expiry contract as the
/// cell registry, independent table.
pub struct SheetLockRegistry {
    ttl: Duration,
    locks: Mutex<HashMap<String, SheetLock>>,
}

impl SheetLockRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire or renew the whole-sheet lock.
    pub fn try_lock(&self, path: &str, owner: &str) -> Result<SheetLock> {
        self.try_lock_at(path, owner, Utc::now())
    }

    pub fn try_lock_at(&self, path: &str, owner: &str, now: DateTime<Utc>) -> Result<SheetLock> {
        let mut locks = self.locks.lock().unwrap();

        let existing = locks
            .get(path)
            .map(|lock| (lock.is_expired_at(now), lock.owner.clone()));
        match existing {
            Some((true, _)) => {
                locks.remove(path);
            }
            Some((false, holder)) if holder != owner => {
                debug!(path = %path, holder = %holder, requester = %owner,
                       "sheet lock refused");
                return Err(Error::SheetLocked {
                    path: path.to_string(),
                    owner: holder,
                });
            }
            _ => {}
        }

        let lock = SheetLock {
            path: path.to_string(),
            owner: owner.to_string(),
            expires_at: now + self.ttl,
        };
        debug!(path = %path, owner = %owner, "sheet lock granted");
        locks.insert(path.to_string(), lock.clone());
        Ok(lock)
    }

    /// Release if held by `owner`; otherwise a no-op.
    pub fn unlock(&self, path: &str, owner: &str) {
        let mut locks = self.locks.lock().unwrap();
        if locks.get(path).map(|l| l.owner == owner).unwrap_or(false) {
            locks.remove(path);
            debug!(path = %path, owner = %owner, "sheet lock released");
        }
    }

    pub fn owner(&self, path: &str) -> Option<String> {
        self.owner_at(path, Utc::now())
    }

    pub fn owner_at(&self, path: &str, now: DateTime<Utc>) -> Option<String> {
        let mut locks = self.locks.lock().unwrap();
        let state = locks
            .get(path)
            .map(|lock| (lock.is_expired_at(now), lock.owner.clone()));
        match state {
            Some((true, _)) => {
                locks.remove(path);
                None
            }
            Some((false, owner)) => Some(owner),
            None => None,
        }
    }

    pub fn is_owner(&self, path: &str, owner: &str) -> bool {
        self.owner(path).as_deref() == Some(owner)
    }
}

impl Default for SheetLockRegistry {
    fn default() -> Self {
        Self::new(default_ttl())
    }
}
