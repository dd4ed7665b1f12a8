use redb::{
    CommitError, Database, DatabaseError, ReadableTable, StorageError, TableDefinition, TableError,
    TransactionError,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Redb database error: {0}")]
    RedbDatabase(#[from] DatabaseError),
    #[error("Redb storage error: {0}")]
    RedbStorage(#[from] StorageError),
    #[error("Redb transaction error: {0}")]
    RedbTransaction(#[from] TransactionError),
    #[error("Redb table error: {0}")]
    RedbTable(#[from] TableError),
    #[error("Redb commit error: {0}")]
    RedbCommit(#[from] CommitError),
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

/// Every record lives in one table keyed by its id; values are JSON documents.
pub const KV_STORE: TableDefinition<&str, &str> = TableDefinition::new("kv_store");

/// Result of a guarded write.
#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome {
    Swapped,
    Missing,
    Mismatch(Value),
}

/// Generic persistence used by the submission, publication and moderation services.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, DbError>;

    fn set(&self, key: &str, value: &Value) -> Result<(), DbError>;

    /// Values of every key starting with `prefix`, in key order.
    fn get_by_prefix(&self, prefix: &str) -> Result<Vec<Value>, DbError>;

    /// Writes `new` only if the stored value still equals `expected`.
    fn compare_and_set(&self, key: &str, expected: &Value, new: &Value) -> Result<CasOutcome, DbError>;
}

pub struct RedbKvStore {
    db: Database,
}

impl RedbKvStore {
    /// Wraps an open database, creating the table if this is a fresh file.
    pub fn new(db: Database) -> Result<Self, DbError> {
        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(KV_STORE)?;
        }
        write_txn.commit()?;
        Ok(Self { db })
    }

    pub fn open(path: &Path) -> Result<Self, DbError> {
        Self::new(Database::create(path)?)
    }
}

impl KvStore for RedbKvStore {
    fn get(&self, key: &str) -> Result<Option<Value>, DbError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(KV_STORE)?;
        let value = match table.get(key)? {
            Some(guard) => Some(serde_json::from_str(guard.value())?),
            None => None,
        };
        Ok(value)
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), DbError> {
        let json = serde_json::to_string(value)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(KV_STORE)?;
            table.insert(key, json.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get_by_prefix(&self, prefix: &str) -> Result<Vec<Value>, DbError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(KV_STORE)?;

        let mut values = Vec::new();
        for item in table.range(prefix..)? {
            let (key, value) = item?;
            if !key.value().starts_with(prefix) {
                break;
            }
            match serde_json::from_str(value.value()) {
                Ok(parsed) => values.push(parsed),
                Err(e) => log::warn!("Skipping unreadable record '{}': {}", key.value(), e),
            }
        }
        Ok(values)
    }

    fn compare_and_set(&self, key: &str, expected: &Value, new: &Value) -> Result<CasOutcome, DbError> {
        let new_json = serde_json::to_string(new)?;

        // redb serializes write transactions, so the read and the insert below are atomic.
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let mut table = write_txn.open_table(KV_STORE)?;
            let current: Option<Value> = match table.get(key)? {
                Some(guard) => Some(serde_json::from_str(guard.value())?),
                None => None,
            };

            match current {
                None => CasOutcome::Missing,
                Some(current) if &current != expected => CasOutcome::Mismatch(current),
                Some(_) => {
                    table.insert(key, new_json.as_str())?;
                    CasOutcome::Swapped
                }
            }
        };

        if outcome == CasOutcome::Swapped {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(outcome)
    }
}

/// Reads every record under `prefix` as `T`, skipping records of another shape.
pub fn read_records<T: DeserializeOwned>(store: &dyn KvStore, prefix: &str) -> Result<Vec<T>, DbError> {
    let records = store
        .get_by_prefix(prefix)?
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<T>(value) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Ignoring malformed record under prefix '{}': {}", prefix, e);
                None
            }
        })
        .collect();
    Ok(records)
}

pub fn write_record<T: Serialize>(store: &dyn KvStore, key: &str, record: &T) -> Result<(), DbError> {
    let value = serde_json::to_value(record)?;
    store.set(key, &value)
}
