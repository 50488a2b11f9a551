//! Persistent state store
//!
//! A bucketed key/value store recording what hearth last wrote. Two buckets
//! are used, both keyed by target path:
//!
//! - `entryState`: hash and mode of the last captured or materialized content
//! - `scriptState`: hash of the last successful run of each script
//!
//! Every `set` is its own write transaction.

use crate::error::{Error, Result};
use crate::hash::hash_content;
use hearth_core::path::RelPath;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, TableError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use subtle::ConstantTimeEq;

/// Bucket holding [`EntryState`] records
pub const ENTRY_STATE_BUCKET: &str = "entryState";
/// Bucket holding [`ScriptState`] records
pub const SCRIPT_STATE_BUCKET: &str = "scriptState";

/// Trait for persistent state storage
pub trait PersistentState {
    /// Get a value from a bucket
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Set a value in a bucket
    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key from a bucket
    fn delete(&self, bucket: &str, key: &[u8]) -> Result<()>;

    /// Delete an entire bucket
    fn delete_bucket(&self, bucket: &str) -> Result<()>;

    /// Visit every key/value pair in a bucket, in key order
    fn for_each(&self, bucket: &str, f: &mut dyn FnMut(&[u8], &[u8]) -> Result<()>)
    -> Result<()>;
}

fn table(bucket: &str) -> TableDefinition<'_, &'static [u8], &'static [u8]> {
    TableDefinition::new(bucket)
}

fn state_error(action: &str, e: impl std::fmt::Display) -> Error {
    Error::State(format!("Failed to {action}: {e}"))
}

/// Persistent state backed by a redb database file
pub struct RedbPersistentState {
    db: Database,
}

impl RedbPersistentState {
    /// Create or open a persistent state database
    ///
    /// Parent directories are created as needed.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(|e| state_error("create database", e))?;
        Ok(Self { db })
    }

    /// Open an existing database
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::open(path).map_err(|e| state_error("open database", e))?;
        Ok(Self { db })
    }
}

impl PersistentState for RedbPersistentState {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| state_error("begin read transaction", e))?;
        let table = match read_txn.open_table(table(bucket)) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(state_error("open table", e)),
        };
        let value = table.get(key).map_err(|e| state_error("get value", e))?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| state_error("begin write transaction", e))?;
        {
            let mut table = write_txn
                .open_table(table(bucket))
                .map_err(|e| state_error("open table", e))?;
            table
                .insert(key, value)
                .map_err(|e| state_error("insert value", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| state_error("commit transaction", e))
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| state_error("begin write transaction", e))?;
        {
            let mut table = write_txn
                .open_table(table(bucket))
                .map_err(|e| state_error("open table", e))?;
            table
                .remove(key)
                .map_err(|e| state_error("remove value", e))?;
        }
        write_txn
            .commit()
            .map_err(|e| state_error("commit transaction", e))
    }

    fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| state_error("begin write transaction", e))?;
        write_txn
            .delete_table(table(bucket))
            .map_err(|e| state_error("delete table", e))?;
        write_txn
            .commit()
            .map_err(|e| state_error("commit transaction", e))
    }

    fn for_each(
        &self,
        bucket: &str,
        f: &mut dyn FnMut(&[u8], &[u8]) -> Result<()>,
    ) -> Result<()> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| state_error("begin read transaction", e))?;
        let table = match read_txn.open_table(table(bucket)) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => return Ok(()),
            Err(e) => return Err(state_error("open table", e)),
        };

        for item in table.iter().map_err(|e| state_error("iterate table", e))? {
            let (key, value) = item.map_err(|e| state_error("read item", e))?;
            f(key.value(), value.value())?;
        }
        Ok(())
    }
}

type BucketData = std::collections::BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory persistent state for tests and dry runs
#[derive(Default)]
pub struct MockPersistentState {
    data: RwLock<HashMap<String, BucketData>>,
}

impl MockPersistentState {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> Error {
        Error::State("state lock poisoned".to_string())
    }
}

impl PersistentState for MockPersistentState {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let data = self.data.read().map_err(|_| Self::poisoned())?;
        Ok(data.get(bucket).and_then(|b| b.get(key).cloned()))
    }

    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let mut data = self.data.write().map_err(|_| Self::poisoned())?;
        data.entry(bucket.to_string())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> Result<()> {
        let mut data = self.data.write().map_err(|_| Self::poisoned())?;
        if let Some(bucket_data) = data.get_mut(bucket) {
            bucket_data.remove(key);
        }
        Ok(())
    }

    fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let mut data = self.data.write().map_err(|_| Self::poisoned())?;
        data.remove(bucket);
        Ok(())
    }

    fn for_each(
        &self,
        bucket: &str,
        f: &mut dyn FnMut(&[u8], &[u8]) -> Result<()>,
    ) -> Result<()> {
        let data = self.data.read().map_err(|_| Self::poisoned())?;
        if let Some(bucket_data) = data.get(bucket) {
            for (k, v) in bucket_data {
                f(k, v)?;
            }
        }
        Ok(())
    }
}

fn encode_record<T: bincode::Encode>(record: &T) -> Result<Vec<u8>> {
    bincode::encode_to_vec(record, bincode::config::standard())
        .map_err(|e| state_error("encode record", e))
}

fn decode_record<T: bincode::Decode<()>>(bytes: &[u8]) -> Result<T> {
    bincode::decode_from_slice(bytes, bincode::config::standard())
        .map(|(record, _len)| record)
        .map_err(|e| state_error("decode record", e))
}

/// Last known content of a target
#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct EntryState {
    /// blake3 hash of the content
    pub content_hash: [u8; 32],
    /// Unix mode, when known
    pub mode: Option<u32>,
}

impl EntryState {
    /// Create a new entry state from content and mode
    pub fn new(content: &[u8], mode: Option<u32>) -> Self {
        Self {
            content_hash: hash_content(content),
            mode,
        }
    }

    /// Whether `content` hashes to the recorded hash
    pub fn matches(&self, content: &[u8]) -> bool {
        self.content_hash.ct_eq(&hash_content(content)).into()
    }

    /// Load the record for `target`
    pub fn load(store: &dyn PersistentState, target: &RelPath) -> Result<Option<Self>> {
        store
            .get(ENTRY_STATE_BUCKET, target.as_str().as_bytes())?
            .map(|bytes| decode_record(&bytes))
            .transpose()
    }

    /// Store this record for `target`
    pub fn save(&self, store: &dyn PersistentState, target: &RelPath) -> Result<()> {
        store.set(
            ENTRY_STATE_BUCKET,
            target.as_str().as_bytes(),
            &encode_record(self)?,
        )
    }

    /// Forget the record for `target`
    pub fn remove(store: &dyn PersistentState, target: &RelPath) -> Result<()> {
        store.delete(ENTRY_STATE_BUCKET, target.as_str().as_bytes())
    }
}

/// Last successful run of a script
#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct ScriptState {
    /// blake3 hash of the rendered script
    pub content_hash: [u8; 32],
}

impl ScriptState {
    /// Create a new script state from content
    pub fn new(content: &[u8]) -> Self {
        Self {
            content_hash: hash_content(content),
        }
    }

    /// Whether `content` differs from what last ran
    pub fn changed(&self, content: &[u8]) -> bool {
        !bool::from(self.content_hash.ct_eq(&hash_content(content)))
    }

    /// Load the record for `target`
    pub fn load(store: &dyn PersistentState, target: &RelPath) -> Result<Option<Self>> {
        store
            .get(SCRIPT_STATE_BUCKET, target.as_str().as_bytes())?
            .map(|bytes| decode_record(&bytes))
            .transpose()
    }

    /// Store this record for `target`
    pub fn save(&self, store: &dyn PersistentState, target: &RelPath) -> Result<()> {
        store.set(
            SCRIPT_STATE_BUCKET,
            target.as_str().as_bytes(),
            &encode_record(self)?,
        )
    }
}
