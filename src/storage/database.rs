// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded record store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! For every [`Table`] two redb tables exist:
//!
//! - `<table>`: primary token → JSON `{ "seq": u64, "row": {...} }`
//! - `<table>_idx`: composite key (field|value|seq) → primary token
//!
//! plus a shared `meta` table holding the insertion sequence counter. The
//! sequence makes index scans return rows in insertion order.
//!
//! ## Concurrency
//!
//! Read transactions are MVCC snapshots and never block. Write transactions
//! are serialized by redb, so every mutation of a row (including the
//! read-modify-write in [`Store::update`]) is linearizable.

use std::path::Path;

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use serde::{Deserialize, Serialize};

use super::table::{new_token, Record, Table};

// =============================================================================
// Table Definitions
// =============================================================================

/// Store-wide counters: "seq" → last assigned insertion sequence.
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const SEQ_KEY: &str = "seq";

/// Separator between the parts of an index key. Index values are digests,
/// tokens or validated names and never contain it.
const SEP: u8 = 0x1f;

fn rows_def(table: Table) -> TableDefinition<'static, &'static str, &'static [u8]> {
    TableDefinition::new(table.rows_name())
}

fn index_def(table: Table) -> TableDefinition<'static, &'static [u8], &'static str> {
    TableDefinition::new(table.index_name())
}

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("failed to decode {table} row: {source}")]
    Decode {
        table: Table,
        source: serde_json::Error,
    },

    #[error("failed to encode row: {0}")]
    Encode(serde_json::Error),

    #[error("duplicate index: {0}")]
    Duplicate(String),

    #[error("store already exists: {0}")]
    AlreadyExists(String),

    #[error("store file is missing: {0}")]
    Missing(String),

    #[error("cannot prepare store directory {path}: {source}")]
    Directory {
        path: String,
        source: std::io::Error,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// On-disk envelope around a row.
#[derive(Serialize, Deserialize)]
struct Stored<T> {
    seq: u64,
    row: T,
}

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Composite index key: `field | value | seq_be`.
fn make_index_key(field: &str, value: &str, seq: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(field.len() + value.len() + 2 + 8);
    key.extend_from_slice(field.as_bytes());
    key.push(SEP);
    key.extend_from_slice(value.as_bytes());
    key.push(SEP);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// Half-open range `[field|value|, field|value|+1)` covering every sequence.
fn make_prefix_range(field: &str, value: &str) -> (Vec<u8>, Vec<u8>) {
    let mut start = Vec::with_capacity(field.len() + value.len() + 2);
    start.extend_from_slice(field.as_bytes());
    start.push(SEP);
    start.extend_from_slice(value.as_bytes());
    let mut end = start.clone();
    start.push(SEP);
    end.push(SEP + 1);
    (start, end)
}

fn indexable(entries: Vec<(&'static str, String)>) -> impl Iterator<Item = (&'static str, String)> {
    entries
        .into_iter()
        .filter(|(_, value)| !value.is_empty() && !value.as_bytes().contains(&SEP))
}

/// Primary tokens matching `field == value`, in insertion order.
fn lookup_index<I>(idx: &I, field: &str, value: &str) -> StoreResult<Vec<String>>
where
    I: ReadableTable<&'static [u8], &'static str>,
{
    let (start, end) = make_prefix_range(field, value);
    let mut keys = Vec::new();
    for entry in idx.range(start.as_slice()..end.as_slice())? {
        let (_, token) = entry?;
        keys.push(token.value().to_string());
    }
    Ok(keys)
}

fn load_row<T, R>(rows: &R, key: &str) -> StoreResult<Option<Stored<T>>>
where
    T: Record,
    R: ReadableTable<&'static str, &'static [u8]>,
{
    match rows.get(key)? {
        Some(value) => {
            let stored = serde_json::from_slice(value.value()).map_err(|source| {
                StoreError::Decode {
                    table: T::TABLE,
                    source,
                }
            })?;
            Ok(Some(stored))
        }
        None => Ok(None),
    }
}

// =============================================================================
// Write-transaction helpers
// =============================================================================

fn next_seq(txn: &WriteTransaction) -> StoreResult<u64> {
    let mut meta = txn.open_table(META)?;
    let current = meta.get(SEQ_KEY)?.map(|v| v.value()).unwrap_or(0);
    let next = current + 1;
    meta.insert(SEQ_KEY, next)?;
    Ok(next)
}

fn write_row<T: Record>(txn: &WriteTransaction, row: &T, seq: u64) -> StoreResult<()> {
    let stored = Stored { seq, row };
    let json = serde_json::to_vec(&stored).map_err(StoreError::Encode)?;

    let mut rows = txn.open_table(rows_def(T::TABLE))?;
    rows.insert(row.key(), json.as_slice())?;

    let mut idx = txn.open_table(index_def(T::TABLE))?;
    for (field, value) in indexable(row.index_entries()) {
        let key = make_index_key(field, &value, seq);
        idx.insert(key.as_slice(), row.key())?;
    }
    Ok(())
}

fn remove_row<T: Record>(txn: &WriteTransaction, key: &str) -> StoreResult<Option<Stored<T>>> {
    let stored: Stored<T> = {
        let mut rows = txn.open_table(rows_def(T::TABLE))?;
        let bytes = match rows.remove(key)? {
            Some(value) => value.value().to_vec(),
            None => return Ok(None),
        };
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
            table: T::TABLE,
            source,
        })?
    };

    let mut idx = txn.open_table(index_def(T::TABLE))?;
    for (field, value) in indexable(stored.row.index_entries()) {
        let index_key = make_index_key(field, &value, stored.seq);
        idx.remove(index_key.as_slice())?;
    }
    Ok(Some(stored))
}

/// Fail with `Duplicate` if another row already holds one of the `unique`
/// index values of `row`.
fn check_unique<T: Record>(txn: &WriteTransaction, row: &T, unique: &[&str]) -> StoreResult<()> {
    if unique.is_empty() {
        return Ok(());
    }
    let idx = txn.open_table(index_def(T::TABLE))?;
    for (field, value) in indexable(row.index_entries()) {
        if !unique.contains(&field) {
            continue;
        }
        let holders = lookup_index(&idx, field, &value)?;
        if holders.iter().any(|holder| holder != row.key()) {
            return Err(StoreError::Duplicate(field.to_string()));
        }
    }
    Ok(())
}

fn matching_keys<T: Record>(txn: &WriteTransaction, field: &str, value: &str) -> StoreResult<Vec<String>> {
    if field == T::KEY {
        let rows = txn.open_table(rows_def(T::TABLE))?;
        let exists = rows.get(value)?.is_some();
        return Ok(if exists { vec![value.to_string()] } else { Vec::new() });
    }
    let idx = txn.open_table(index_def(T::TABLE))?;
    lookup_index(&idx, field, value)
}

// =============================================================================
// Store
// =============================================================================

/// Typed record store over the vault tables.
pub struct Store {
    db: Database,
}

impl Store {
    /// Create a brand new store file. Fails if one already exists.
    pub fn create_new(path: &Path) -> StoreResult<Self> {
        if path.exists() {
            return Err(StoreError::AlreadyExists(path.display().to_string()));
        }
        Self::open_or_create(path)
    }

    /// Open an existing store file. Fails if it is missing.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            return Err(StoreError::Missing(path.display().to_string()));
        }
        Self::open_or_create(path)
    }

    /// Open (or create) the store at the given path.
    pub fn open_or_create(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::Directory {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(META)?;
            for table in Table::ALL {
                let _ = write_txn.open_table(rows_def(table))?;
                let _ = write_txn.open_table(index_def(table))?;
            }
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Persist a row, assigning a fresh token if it has none.
    ///
    /// Does not deduplicate; see [`Store::create_unique`].
    pub fn create<T: Record>(&self, row: T) -> StoreResult<String> {
        self.create_unique(row, &[])
    }

    /// Persist a row unless another row already holds one of its `unique`
    /// index values. The check and the insert share one write transaction.
    pub fn create_unique<T: Record>(&self, mut row: T, unique: &[&str]) -> StoreResult<String> {
        if row.key().is_empty() {
            row.set_key(new_token());
        }

        let write_txn = self.db.begin_write()?;
        check_unique(&write_txn, &row, unique)?;
        let seq = next_seq(&write_txn)?;
        write_row(&write_txn, &row, seq)?;
        write_txn.commit()?;

        Ok(row.key().to_string())
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Point lookup by primary token or by a secondary index.
    pub fn get<T: Record>(&self, index: &str, value: &str) -> StoreResult<Option<T>> {
        let read_txn = self.db.begin_read()?;
        let rows = read_txn.open_table(rows_def(T::TABLE))?;

        if index == T::KEY {
            return Ok(load_row::<T, _>(&rows, value)?.map(|s| s.row));
        }

        let idx = read_txn.open_table(index_def(T::TABLE))?;
        for key in lookup_index(&idx, index, value)? {
            if let Some(stored) = load_row::<T, _>(&rows, &key)? {
                return Ok(Some(stored.row));
            }
        }
        Ok(None)
    }

    /// Rows where `field == value`, in insertion order.
    ///
    /// `offset = 0, limit = 0` returns everything.
    pub fn list<T: Record>(
        &self,
        field: &str,
        value: &str,
        offset: usize,
        limit: usize,
    ) -> StoreResult<Vec<T>> {
        let read_txn = self.db.begin_read()?;
        let rows = read_txn.open_table(rows_def(T::TABLE))?;
        let idx = read_txn.open_table(index_def(T::TABLE))?;

        let keys = lookup_index(&idx, field, value)?;
        let take = if limit == 0 { usize::MAX } else { limit };

        let mut results = Vec::new();
        for key in keys.into_iter().skip(offset).take(take) {
            if let Some(stored) = load_row::<T, _>(&rows, &key)? {
                results.push(stored.row);
            }
        }
        Ok(results)
    }

    /// Number of rows where `field == value`.
    pub fn count<T: Record>(&self, field: &str, value: &str) -> StoreResult<u64> {
        let read_txn = self.db.begin_read()?;
        let idx = read_txn.open_table(index_def(T::TABLE))?;
        Ok(lookup_index(&idx, field, value)?.len() as u64)
    }

    /// Total number of rows in the table.
    pub fn count_all<T: Record>(&self) -> StoreResult<u64> {
        let read_txn = self.db.begin_read()?;
        let rows = read_txn.open_table(rows_def(T::TABLE))?;
        Ok(rows.len()?)
    }

    /// Every row of the table, in insertion order.
    pub fn scan<T: Record>(&self) -> StoreResult<Vec<T>> {
        let read_txn = self.db.begin_read()?;
        let rows = read_txn.open_table(rows_def(T::TABLE))?;

        let mut all: Vec<Stored<T>> = Vec::new();
        for entry in rows.iter()? {
            let (_, value) = entry?;
            let stored = serde_json::from_slice(value.value()).map_err(|source| {
                StoreError::Decode {
                    table: T::TABLE,
                    source,
                }
            })?;
            all.push(stored);
        }
        all.sort_by_key(|s| s.seq);
        Ok(all.into_iter().map(|s| s.row).collect())
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Read-modify-write one row inside a single write transaction.
    ///
    /// Returns `Ok(None)` when the row does not exist. If `f` fails, nothing
    /// is written. The primary token cannot be changed.
    pub fn update<T, F, E>(&self, key: &str, unique: &[&str], f: F) -> Result<Option<T>, E>
    where
        T: Record,
        F: FnOnce(&mut T) -> Result<(), E>,
        E: From<StoreError>,
    {
        let write_txn = self.db.begin_write().map_err(StoreError::from)?;

        let Some(stored) = remove_row::<T>(&write_txn, key)? else {
            return Ok(None);
        };
        let mut row = stored.row;
        f(&mut row)?;
        row.set_key(key.to_string());

        check_unique(&write_txn, &row, unique)?;
        write_row(&write_txn, &row, stored.seq)?;
        write_txn.commit().map_err(StoreError::from)?;

        Ok(Some(row))
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Delete every row where `index == value`. Returns whether any existed.
    pub fn delete<T: Record>(&self, index: &str, value: &str) -> StoreResult<bool> {
        let write_txn = self.db.begin_write()?;
        let keys = matching_keys::<T>(&write_txn, index, value)?;

        let mut removed = false;
        for key in keys {
            removed |= remove_row::<T>(&write_txn, &key)?.is_some();
        }
        write_txn.commit()?;
        Ok(removed)
    }

    /// Delete every row matching both `field1 == value1` and
    /// `field2 == value2`. Returns whether any existed.
    pub fn delete2<T: Record>(
        &self,
        field1: &str,
        value1: &str,
        field2: &str,
        value2: &str,
    ) -> StoreResult<bool> {
        let write_txn = self.db.begin_write()?;
        let first = matching_keys::<T>(&write_txn, field1, value1)?;
        let second = matching_keys::<T>(&write_txn, field2, value2)?;

        let mut removed = false;
        for key in first.iter().filter(|k| second.contains(k)) {
            removed |= remove_row::<T>(&write_txn, key)?.is_some();
        }
        write_txn.commit()?;
        Ok(removed)
    }

    /// Remove rows whose [`Record::expires_at`] is before `cutoff`.
    pub fn delete_expired<T: Record>(&self, cutoff: i64) -> StoreResult<u64> {
        let write_txn = self.db.begin_write()?;

        let expired: Vec<String> = {
            let rows = write_txn.open_table(rows_def(T::TABLE))?;
            let mut keys = Vec::new();
            for entry in rows.iter()? {
                let (key, value) = entry?;
                let stored: Stored<T> =
                    serde_json::from_slice(value.value()).map_err(|source| StoreError::Decode {
                        table: T::TABLE,
                        source,
                    })?;
                if stored.row.expires_at().is_some_and(|at| at < cutoff) {
                    keys.push(key.value().to_string());
                }
            }
            keys
        };

        let mut removed = 0;
        for key in &expired {
            if remove_row::<T>(&write_txn, key)?.is_some() {
                removed += 1;
            }
        }
        write_txn.commit()?;
        Ok(removed)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn temp_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_or_create(&dir.path().join("test.redb")).unwrap();
        (store, dir)
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        owner: String,
        tag: String,
        expires: Option<i64>,
    }

    impl Record for Note {
        const TABLE: Table = Table::Sharedrecords;
        const KEY: &'static str = "id";

        fn key(&self) -> &str {
            &self.id
        }

        fn set_key(&mut self, key: String) {
            self.id = key;
        }

        fn index_entries(&self) -> Vec<(&'static str, String)> {
            vec![("owner", self.owner.clone()), ("tag", self.tag.clone())]
        }

        fn expires_at(&self) -> Option<i64> {
            self.expires
        }
    }

    fn note(owner: &str, tag: &str) -> Note {
        Note {
            id: String::new(),
            owner: owner.to_string(),
            tag: tag.to_string(),
            expires: None,
        }
    }

    #[test]
    fn create_assigns_token_and_get_by_key() {
        let (store, _dir) = temp_store();
        let token = store.create(note("alice", "a")).unwrap();
        assert!(crate::validation::is_valid_uuid(&token));

        let loaded: Note = store.get("id", &token).unwrap().unwrap();
        assert_eq!(loaded.id, token);
        assert_eq!(loaded.owner, "alice");
    }

    #[test]
    fn create_keeps_given_token() {
        let (store, _dir) = temp_store();
        let mut row = note("alice", "a");
        row.id = "fixed-id".to_string();
        assert_eq!(store.create(row).unwrap(), "fixed-id");
    }

    #[test]
    fn get_by_secondary_index() {
        let (store, _dir) = temp_store();
        let token = store.create(note("alice", "a")).unwrap();
        store.create(note("bob", "b")).unwrap();

        let loaded: Note = store.get("owner", "alice").unwrap().unwrap();
        assert_eq!(loaded.id, token);
        assert!(store.get::<Note>("owner", "carol").unwrap().is_none());
    }

    #[test]
    fn list_pagination_and_sentinel() {
        let (store, _dir) = temp_store();
        let mut tokens = Vec::new();
        for i in 0..5 {
            tokens.push(store.create(note("alice", &format!("t{i}"))).unwrap());
        }
        store.create(note("bob", "x")).unwrap();

        let all: Vec<Note> = store.list("owner", "alice", 0, 0).unwrap();
        assert_eq!(all.iter().map(|n| n.id.clone()).collect::<Vec<_>>(), tokens);

        let page: Vec<Note> = store.list("owner", "alice", 1, 2).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, tokens[1]);
        assert_eq!(page[1].id, tokens[2]);

        let tail: Vec<Note> = store.list("owner", "alice", 4, 10).unwrap();
        assert_eq!(tail.len(), 1);

        assert_eq!(store.count::<Note>("owner", "alice").unwrap(), 5);
        assert_eq!(store.count::<Note>("owner", "nobody").unwrap(), 0);
    }

    #[test]
    fn create_unique_rejects_taken_value() {
        let (store, _dir) = temp_store();
        store.create_unique(note("alice", "a"), &["tag"]).unwrap();

        let result = store.create_unique(note("bob", "a"), &["tag"]);
        assert!(matches!(result, Err(StoreError::Duplicate(ref f)) if f == "tag"));
        assert_eq!(store.count_all::<Note>().unwrap(), 1);

        // Non-unique fields may repeat
        store.create_unique(note("alice", "b"), &["tag"]).unwrap();
        assert_eq!(store.count_all::<Note>().unwrap(), 2);
    }

    #[test]
    fn update_reindexes_row() {
        let (store, _dir) = temp_store();
        let token = store.create(note("alice", "a")).unwrap();

        let updated = store
            .update::<Note, _, StoreError>(&token, &[], |n| {
                n.owner = "bob".to_string();
                Ok(())
            })
            .unwrap()
            .unwrap();
        assert_eq!(updated.owner, "bob");

        assert!(store.get::<Note>("owner", "alice").unwrap().is_none());
        assert_eq!(store.get::<Note>("owner", "bob").unwrap().unwrap().id, token);
    }

    #[test]
    fn update_missing_row_is_none() {
        let (store, _dir) = temp_store();
        let result = store
            .update::<Note, _, StoreError>("missing", &[], |_| Ok(()))
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn failed_update_writes_nothing() {
        let (store, _dir) = temp_store();
        let token = store.create(note("alice", "a")).unwrap();

        let result = store.update::<Note, _, StoreError>(&token, &[], |n| {
            n.owner = "mallory".to_string();
            Err(StoreError::Duplicate("forced".to_string()))
        });
        assert!(result.is_err());

        let loaded: Note = store.get("id", &token).unwrap().unwrap();
        assert_eq!(loaded.owner, "alice");
    }

    #[test]
    fn update_enforces_uniqueness_against_other_rows() {
        let (store, _dir) = temp_store();
        store.create(note("alice", "a")).unwrap();
        let token = store.create(note("bob", "b")).unwrap();

        let result = store.update::<Note, _, StoreError>(&token, &["tag"], |n| {
            n.tag = "a".to_string();
            Ok(())
        });
        assert!(matches!(result, Err(StoreError::Duplicate(_))));

        // Keeping its own value is fine
        let same = store.update::<Note, _, StoreError>(&token, &["tag"], |_| Ok(()));
        assert!(same.unwrap().is_some());
    }

    #[test]
    fn delete_reports_existence() {
        let (store, _dir) = temp_store();
        let token = store.create(note("alice", "a")).unwrap();

        assert!(store.delete::<Note>("id", &token).unwrap());
        assert!(!store.delete::<Note>("id", &token).unwrap());
        assert!(store.get::<Note>("owner", "alice").unwrap().is_none());
    }

    #[test]
    fn delete_by_index_removes_all_matches() {
        let (store, _dir) = temp_store();
        store.create(note("alice", "a")).unwrap();
        store.create(note("alice", "b")).unwrap();
        store.create(note("bob", "c")).unwrap();

        assert!(store.delete::<Note>("owner", "alice").unwrap());
        assert_eq!(store.count_all::<Note>().unwrap(), 1);
    }

    #[test]
    fn delete2_requires_both_fields() {
        let (store, _dir) = temp_store();
        store.create(note("alice", "a")).unwrap();
        store.create(note("alice", "b")).unwrap();

        assert!(!store.delete2::<Note>("owner", "alice", "tag", "z").unwrap());
        assert!(store.delete2::<Note>("owner", "alice", "tag", "b").unwrap());
        let left: Vec<Note> = store.list("owner", "alice", 0, 0).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].tag, "a");
    }

    #[test]
    fn delete_expired_uses_cutoff() {
        let (store, _dir) = temp_store();
        let mut old = note("alice", "old");
        old.expires = Some(100);
        let mut fresh = note("alice", "fresh");
        fresh.expires = Some(300);
        store.create(old).unwrap();
        store.create(fresh).unwrap();
        store.create(note("alice", "forever")).unwrap();

        assert_eq!(store.delete_expired::<Note>(200).unwrap(), 1);
        let tags: Vec<String> = store
            .scan::<Note>()
            .unwrap()
            .into_iter()
            .map(|n| n.tag)
            .collect();
        assert_eq!(tags, vec!["fresh".to_string(), "forever".to_string()]);
    }

    #[test]
    fn open_requires_existing_file_and_create_new_refuses_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.redb");

        assert!(matches!(Store::open(&path), Err(StoreError::Missing(_))));
        drop(Store::create_new(&path).unwrap());
        assert!(matches!(
            Store::create_new(&path),
            Err(StoreError::AlreadyExists(_))
        ));
        assert!(Store::open(&path).is_ok());
    }

    #[test]
    fn missing_parent_directories_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/vault.redb");
        assert!(Store::create_new(&path).is_ok());
        assert!(path.exists());
    }

    #[test]
    fn unusable_parent_directory_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let result = Store::open_or_create(&blocker.join("sub/vault.redb"));
        assert!(matches!(result, Err(StoreError::Directory { .. })));
    }

    #[test]
    fn index_key_prefix_range_is_tight() {
        let (start, end) = make_prefix_range("owner", "al");
        let inside = make_index_key("owner", "al", 7);
        let longer_value = make_index_key("owner", "alice", 1);
        assert!(inside.as_slice() >= start.as_slice() && inside.as_slice() < end.as_slice());
        assert!(!(longer_value.as_slice() >= start.as_slice() && longer_value.as_slice() < end.as_slice()));
    }
}
