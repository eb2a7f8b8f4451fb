//! LMDB-backed suggestion store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to keep cache entries in a
//! durable, memory-mapped B-tree keyed by [`EntryKey`].
//!
//! # Atomicity
//!
//! LMDB allows a single writer at a time. Each mutating operation reads,
//! modifies, and writes inside one write transaction, so `upsert_increment`
//! and `create_if_absent` are atomic per key without extra locking. Reads use
//! read transactions and see a consistent snapshot.

use std::collections::HashSet;
use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn};
use larder_core::{
    CacheEntry, EntryId, FieldType, LarderError, LarderResult, StorageError, TenantId, Timestamp,
};

use crate::entry_key::EntryKey;
use crate::{rank_order, EntryFilter, SuggestionStore};

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<heed::Error> for LmdbStoreError {
    fn from(e: heed::Error) -> Self {
        LmdbStoreError::Transaction(e.to_string())
    }
}

/// Convert LmdbStoreError to LarderError.
impl From<LmdbStoreError> for LarderError {
    fn from(e: LmdbStoreError) -> Self {
        let storage = match e {
            LmdbStoreError::EnvOpen(reason) | LmdbStoreError::DbOpen(reason) => {
                StorageError::EnvOpen { reason }
            }
            LmdbStoreError::Serialization(reason) | LmdbStoreError::Deserialization(reason) => {
                StorageError::Serialization { reason }
            }
            other => StorageError::TransactionFailed {
                reason: other.to_string(),
            },
        };
        LarderError::Storage(storage)
    }
}

/// Durable suggestion store on LMDB.
///
/// # Example
///
/// ```ignore
/// use larder_storage::{LmdbSuggestionStore, SuggestionStore};
/// use larder_core::{FieldType, TenantId};
///
/// let store = LmdbSuggestionStore::new("/var/lib/larder/suggest", 64)?;
/// store.upsert_increment(TenantId::new(1), &FieldType::category(), "Food", chrono::Utc::now())?;
/// ```
pub struct LmdbSuggestionStore {
    env: Env,
    /// Entry key bytes to JSON-encoded [`CacheEntry`].
    db: Database<Bytes, Bytes>,
}

impl LmdbSuggestionStore {
    /// Open (or create) a store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn()?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;
        wtxn.commit()?;

        Ok(Self { env, db })
    }

    fn encode_entry(entry: &CacheEntry) -> Result<Vec<u8>, LmdbStoreError> {
        serde_json::to_vec(entry).map_err(|e| LmdbStoreError::Serialization(e.to_string()))
    }

    fn decode_entry(bytes: &[u8]) -> Result<CacheEntry, LmdbStoreError> {
        serde_json::from_slice(bytes).map_err(|e| LmdbStoreError::Deserialization(e.to_string()))
    }

    fn get_entry(&self, txn: &RoTxn, key: &[u8]) -> Result<Option<CacheEntry>, LmdbStoreError> {
        match self.db.get(txn, key)? {
            Some(bytes) => Ok(Some(Self::decode_entry(bytes)?)),
            None => Ok(None),
        }
    }

    /// Decode every entry whose key starts with `prefix`.
    ///
    /// Each entry must agree with the key it is stored under.
    fn scan_prefix(
        &self,
        txn: &RoTxn,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, CacheEntry)>, LmdbStoreError> {
        let mut found = Vec::new();
        for item in self.db.prefix_iter(txn, prefix)? {
            let (key, bytes) = item?;
            let entry = Self::decode_entry(bytes)?;
            let stored_under = EntryKey::decode(key)
                .ok_or_else(|| LmdbStoreError::Deserialization("malformed entry key".to_string()))?;
            if stored_under.tenant_id() != entry.tenant_id
                || stored_under.field_type() != &entry.field_type
                || stored_under.value() != entry.value
            {
                return Err(LmdbStoreError::Deserialization(format!(
                    "entry {:?} stored under key for {:?}",
                    entry.value,
                    stored_under.value()
                )));
            }
            found.push((key.to_vec(), entry));
        }
        Ok(found)
    }
}

impl SuggestionStore for LmdbSuggestionStore {
    fn find_one(
        &self,
        tenant_id: TenantId,
        field_type: &FieldType,
        value: &str,
    ) -> LarderResult<Option<CacheEntry>> {
        let key = EntryKey::new(tenant_id, field_type.clone(), value).encode()?;
        let rtxn = self.env.read_txn().map_err(LmdbStoreError::from)?;
        Ok(self.get_entry(&rtxn, &key)?)
    }

    fn upsert_increment(
        &self,
        tenant_id: TenantId,
        field_type: &FieldType,
        value: &str,
        at: Timestamp,
    ) -> LarderResult<CacheEntry> {
        let key = EntryKey::new(tenant_id, field_type.clone(), value).encode()?;
        let mut wtxn = self.env.write_txn().map_err(LmdbStoreError::from)?;

        let entry = match self.get_entry(&wtxn, &key)? {
            Some(mut existing) => {
                existing.touch(at);
                existing
            }
            None => CacheEntry::new(tenant_id, field_type.clone(), value, 1, at),
        };

        let bytes = Self::encode_entry(&entry)?;
        self.db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbStoreError::from)?;
        wtxn.commit().map_err(LmdbStoreError::from)?;
        Ok(entry)
    }

    fn list(&self, tenant_id: TenantId, filter: &EntryFilter) -> LarderResult<Vec<CacheEntry>> {
        let prefix = match &filter.field_type {
            Some(field_type) => EntryKey::scope_prefix(tenant_id, field_type)?,
            None => EntryKey::tenant_prefix(tenant_id).to_vec(),
        };

        let rtxn = self.env.read_txn().map_err(LmdbStoreError::from)?;
        let mut selected: Vec<CacheEntry> = self
            .scan_prefix(&rtxn, &prefix)?
            .into_iter()
            .map(|(_, entry)| entry)
            .filter(|entry| filter.matches(entry))
            .collect();
        selected.sort_by(rank_order);
        Ok(selected)
    }

    fn count(&self, tenant_id: TenantId, field_type: &FieldType) -> LarderResult<usize> {
        let prefix = EntryKey::scope_prefix(tenant_id, field_type)?;
        let rtxn = self.env.read_txn().map_err(LmdbStoreError::from)?;
        let mut count = 0;
        for item in self
            .db
            .prefix_iter(&rtxn, &prefix)
            .map_err(LmdbStoreError::from)?
        {
            item.map_err(LmdbStoreError::from)?;
            count += 1;
        }
        Ok(count)
    }

    fn delete_many(&self, tenant_id: TenantId, ids: &[EntryId]) -> LarderResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let wanted: HashSet<EntryId> = ids.iter().copied().collect();
        let prefix = EntryKey::tenant_prefix(tenant_id);

        let mut wtxn = self.env.write_txn().map_err(LmdbStoreError::from)?;
        let victims: Vec<Vec<u8>> = self
            .scan_prefix(&wtxn, &prefix)?
            .into_iter()
            .filter(|(_, entry)| wanted.contains(&entry.entry_id))
            .map(|(key, _)| key)
            .collect();

        let mut removed = 0;
        for key in &victims {
            if self.db.delete(&mut wtxn, key).map_err(LmdbStoreError::from)? {
                removed += 1;
            }
        }
        wtxn.commit().map_err(LmdbStoreError::from)?;
        Ok(removed)
    }

    fn create_if_absent(
        &self,
        tenant_id: TenantId,
        field_type: &FieldType,
        value: &str,
        frequency: u64,
        at: Timestamp,
    ) -> LarderResult<bool> {
        let key = EntryKey::new(tenant_id, field_type.clone(), value).encode()?;
        let mut wtxn = self.env.write_txn().map_err(LmdbStoreError::from)?;

        if self.db.get(&wtxn, &key).map_err(LmdbStoreError::from)?.is_some() {
            return Ok(false);
        }

        let entry = CacheEntry::new(tenant_id, field_type.clone(), value, frequency, at);
        let bytes = Self::encode_entry(&entry)?;
        self.db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbStoreError::from)?;
        wtxn.commit().map_err(LmdbStoreError::from)?;
        Ok(true)
    }
}
