use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::TransactionError;
use sled::Transactional;
use themine_core::account::AccountRecord;
use themine_core::error::SaleError;
use themine_core::ledger::GlobalState;
use themine_core::params::SaleParams;
use themine_core::types::Address;
use themine_quorum::{ActionKind, PendingAction};

const META_PARAMS: &str = "params";
const META_GLOBAL: &str = "global";

/// Persistent sale state backed by sled.
///
/// Named trees:
///   accounts  address bytes    → bincode(AccountRecord)
///   pending   action key utf8  → bincode(PendingAction)
///   meta      utf8 key bytes   → bincode(SaleParams | GlobalState)
pub struct StateDb {
    db: sled::Db,
    accounts: sled::Tree,
    pending: sled::Tree,
    meta: sled::Tree,
}

/// Everything one admitted call changes, written in a single transaction.
#[derive(Debug, Default)]
pub struct CommitBatch {
    pub global: Option<GlobalState>,
    pub accounts: Vec<AccountRecord>,
    /// `None` clears the slot.
    pub pending: Vec<(ActionKind, Option<PendingAction>)>,
}

fn storage(e: impl std::fmt::Display) -> SaleError {
    SaleError::Storage(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, SaleError> {
    bincode::serialize(value).map_err(|e| SaleError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SaleError> {
    bincode::deserialize(bytes).map_err(|e| SaleError::Serialization(e.to_string()))
}

impl StateDb {
    /// Open or create the state database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SaleError> {
        let db = sled::open(path).map_err(storage)?;
        Self::with_db(db)
    }

    /// In-memory database removed on drop. Used by tests and dry runs.
    pub fn open_temporary() -> Result<Self, SaleError> {
        let db = sled::Config::new().temporary(true).open().map_err(storage)?;
        Self::with_db(db)
    }

    fn with_db(db: sled::Db) -> Result<Self, SaleError> {
        let accounts = db.open_tree("accounts").map_err(storage)?;
        let pending  = db.open_tree("pending").map_err(storage)?;
        let meta     = db.open_tree("meta").map_err(storage)?;
        Ok(Self { db, accounts, pending, meta })
    }

    // ── Accounts ─────────────────────────────────────────────────────────────

    pub fn get_account(&self, address: &Address) -> Result<Option<AccountRecord>, SaleError> {
        match self.accounts.get(address.as_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_account(&self, account: &AccountRecord) -> Result<(), SaleError> {
        let bytes = encode(account)?;
        self.accounts
            .insert(account.address.as_bytes(), bytes)
            .map_err(storage)?;
        Ok(())
    }

    pub fn iter_accounts(&self) -> Result<Vec<AccountRecord>, SaleError> {
        let mut out = Vec::new();
        for item in self.accounts.iter() {
            let (_, value) = item.map_err(storage)?;
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    // ── Pending confirmations ────────────────────────────────────────────────

    pub fn get_pending(&self, kind: ActionKind) -> Result<Option<PendingAction>, SaleError> {
        match self.pending.get(kind.as_str().as_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn iter_pending(&self) -> Result<Vec<PendingAction>, SaleError> {
        let mut out = Vec::new();
        for item in self.pending.iter() {
            let (_, value) = item.map_err(storage)?;
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    // ── Meta ──────────────────────────────────────────────────────────────────

    pub fn is_initialized(&self) -> bool {
        self.meta.contains_key(META_GLOBAL.as_bytes()).unwrap_or(false)
    }

    pub fn get_params(&self) -> Result<SaleParams, SaleError> {
        match self.meta.get(META_PARAMS.as_bytes()).map_err(storage)? {
            Some(bytes) => decode(&bytes),
            None => Err(SaleError::NotInitialized),
        }
    }

    pub fn put_params(&self, params: &SaleParams) -> Result<(), SaleError> {
        self.meta
            .insert(META_PARAMS.as_bytes(), encode(params)?)
            .map_err(storage)?;
        Ok(())
    }

    pub fn get_global(&self) -> Result<GlobalState, SaleError> {
        match self.meta.get(META_GLOBAL.as_bytes()).map_err(storage)? {
            Some(bytes) => decode(&bytes),
            None => Err(SaleError::NotInitialized),
        }
    }

    pub fn put_global(&self, global: &GlobalState) -> Result<(), SaleError> {
        self.meta
            .insert(META_GLOBAL.as_bytes(), encode(global)?)
            .map_err(storage)?;
        Ok(())
    }

    // ── Atomic commit ─────────────────────────────────────────────────────────

    /// Write a staged batch across all three trees in one sled transaction.
    /// Either every row lands or none does.
    pub fn commit(&self, batch: &CommitBatch) -> Result<(), SaleError> {
        let global_row = batch.global.as_ref().map(encode).transpose()?;
        let mut account_rows = Vec::with_capacity(batch.accounts.len());
        for account in &batch.accounts {
            account_rows.push((account.address, encode(account)?));
        }
        let mut pending_rows = Vec::with_capacity(batch.pending.len());
        for (kind, slot) in &batch.pending {
            pending_rows.push((kind.as_str(), slot.as_ref().map(encode).transpose()?));
        }

        let result: Result<(), TransactionError<SaleError>> =
            (&self.accounts, &self.pending, &self.meta).transaction(|(accounts, pending, meta)| {
                for (address, bytes) in &account_rows {
                    accounts.insert(&address.as_bytes()[..], bytes.as_slice())?;
                }
                for (key, row) in &pending_rows {
                    match row {
                        Some(bytes) => {
                            pending.insert(key.as_bytes(), bytes.as_slice())?;
                        }
                        None => {
                            pending.remove(key.as_bytes())?;
                        }
                    }
                }
                if let Some(bytes) = &global_row {
                    meta.insert(META_GLOBAL.as_bytes(), bytes.as_slice())?;
                }
                Ok(())
            });
        result.map_err(storage)
    }

    pub fn flush(&self) -> Result<(), SaleError> {
        self.db.flush().map_err(storage)?;
        Ok(())
    }
}
