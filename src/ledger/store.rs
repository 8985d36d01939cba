//! Network-partitioned transaction ledger.
//!
//! Every mutation rewrites the whole snapshot through the storage backend.
//! There is no per-record lock: two writers on the same storage can lose an
//! update (last writer wins).

use alloy::primitives::Address;
use dashmap::DashMap;
use std::sync::Arc;

use crate::ledger::record::TransactionRecord;
use crate::ledger::storage::{LedgerError, LedgerSnapshot, LedgerStorage};
use crate::observability::metrics;

pub struct TransactionLedger {
    partitions: DashMap<String, Vec<TransactionRecord>>,
    storage: Arc<dyn LedgerStorage>,
}

impl TransactionLedger {
    /// Open the ledger, loading whatever the backend already holds.
    pub fn open(storage: Arc<dyn LedgerStorage>) -> Result<Self, LedgerError> {
        let partitions = DashMap::new();
        for (network, records) in storage.load()? {
            partitions.insert(network, records);
        }
        Ok(Self {
            partitions,
            storage,
        })
    }

    /// Insert, or replace the record with the same hash in place.
    ///
    /// If the backend rejects the write, the in-memory partition is restored
    /// before the error is returned.
    pub fn save(&self, network: &str, record: TransactionRecord) -> Result<(), LedgerError> {
        let (undo, size) = {
            let mut partition = self.partitions.entry(network.to_string()).or_default();
            let undo = match partition
                .iter()
                .position(|r| r.hash_matches(&record.transaction_hash))
            {
                Some(index) => {
                    let previous = std::mem::replace(&mut partition[index], record);
                    Undo::Restore(index, previous)
                }
                None => {
                    partition.push(record);
                    Undo::Pop
                }
            };
            (undo, partition.len())
        };
        self.commit(network, undo)?;
        metrics::record_ledger_size(network, size);
        Ok(())
    }

    /// Replace an existing record wholesale.
    pub fn update(
        &self,
        network: &str,
        hash: &str,
        record: TransactionRecord,
    ) -> Result<TransactionRecord, LedgerError> {
        let undo = {
            let mut partition = self
                .partitions
                .get_mut(network)
                .ok_or_else(|| LedgerError::NotFound(hash.to_string()))?;
            let index = partition
                .iter()
                .position(|r| r.hash_matches(hash))
                .ok_or_else(|| LedgerError::NotFound(hash.to_string()))?;
            let previous = std::mem::replace(&mut partition[index], record.clone());
            Undo::Restore(index, previous)
        };
        self.commit(network, undo)?;
        Ok(record)
    }

    /// Case-insensitive lookup.
    pub fn get(&self, network: &str, hash: &str) -> Option<TransactionRecord> {
        self.partitions
            .get(network)?
            .iter()
            .find(|r| r.hash_matches(hash))
            .cloned()
    }

    /// All records of a network, oldest first.
    pub fn records(&self, network: &str) -> Vec<TransactionRecord> {
        self.partitions
            .get(network)
            .map(|p| p.value().clone())
            .unwrap_or_default()
    }

    /// Records sent by `account`, plus withdrawals it receives.
    pub fn user_records(&self, network: &str, account: Address) -> Vec<TransactionRecord> {
        self.records(network)
            .into_iter()
            .filter(|r| r.involves(account))
            .collect()
    }

    /// Records that still need polling.
    pub fn pending(&self, network: &str) -> Vec<TransactionRecord> {
        self.records(network)
            .into_iter()
            .filter(|r| !r.is_terminal())
            .collect()
    }

    /// Persist the current state, reverting `undo` when the backend fails.
    fn commit(&self, network: &str, undo: Undo) -> Result<(), LedgerError> {
        let Err(err) = self.flush() else {
            return Ok(());
        };
        if let Some(mut partition) = self.partitions.get_mut(network) {
            match undo {
                Undo::Restore(index, previous) => {
                    if let Some(slot) = partition.get_mut(index) {
                        *slot = previous;
                    }
                }
                Undo::Pop => {
                    partition.pop();
                }
            }
        }
        self.partitions.remove_if(network, |_, records| records.is_empty());
        tracing::warn!(network = %network, error = %err, "Ledger write rejected, change reverted");
        Err(err)
    }

    fn flush(&self) -> Result<(), LedgerError> {
        let snapshot: LedgerSnapshot = self
            .partitions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        self.storage.persist(&snapshot)
    }
}

/// How to revert one mutation.
enum Undo {
    Restore(usize, TransactionRecord),
    Pop,
}

impl std::fmt::Debug for TransactionLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionLedger")
            .field("networks", &self.partitions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::record::{Destination, Party, TokenAmount, TransactionType};
    use crate::ledger::storage::MemoryStorage;
    use alloy::primitives::U256;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn record(kind: TransactionType, hash: &str, from: u8, to: u8) -> TransactionRecord {
        TransactionRecord::new(
            kind,
            TokenAmount {
                address: Address::ZERO,
                l1_address: None,
                symbol: "ETH".to_string(),
                decimals: 18,
                amount: U256::from(5u64),
            },
            Party::new(Address::repeat_byte(from), Destination::L2),
            Party::new(Address::repeat_byte(to), Destination::L1),
            hash,
        )
    }

    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        fail: AtomicBool,
    }

    impl LedgerStorage for FlakyStorage {
        fn load(&self) -> Result<LedgerSnapshot, LedgerError> {
            self.inner.load()
        }

        fn persist(&self, snapshot: &LedgerSnapshot) -> Result<(), LedgerError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(std::io::Error::other("disk full").into());
            }
            self.inner.persist(snapshot)
        }
    }

    fn ledger() -> (TransactionLedger, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        (TransactionLedger::open(storage.clone()).unwrap(), storage)
    }

    #[test]
    fn test_save_upserts_by_hash() {
        let (ledger, _) = ledger();
        ledger
            .save("mainnet", record(TransactionType::Transfer, "0xAB", 1, 2))
            .unwrap();

        let mut done = record(TransactionType::Transfer, "0xab", 1, 2);
        done.info.completed = true;
        ledger.save("mainnet", done).unwrap();

        let records = ledger.records("mainnet");
        assert_eq!(records.len(), 1);
        assert!(records[0].info.completed);
    }

    #[test]
    fn test_resave_keeps_position() {
        let (ledger, storage) = ledger();
        for hash in ["0x01", "0x02", "0x03"] {
            ledger
                .save("mainnet", record(TransactionType::Transfer, hash, 1, 2))
                .unwrap();
        }

        let mut done = record(TransactionType::Transfer, "0x02", 1, 2);
        done.info.completed = true;
        ledger.save("mainnet", done).unwrap();

        let records = ledger.records("mainnet");
        let hashes: Vec<&str> = records.iter().map(|r| r.transaction_hash.as_str()).collect();
        assert_eq!(hashes, ["0x01", "0x02", "0x03"]);
        assert!(records[1].info.completed);
        assert_eq!(storage.load().unwrap()["mainnet"], records);
    }

    #[test]
    fn test_rejected_write_leaves_memory_unchanged() {
        let storage = Arc::new(FlakyStorage::default());
        let ledger = TransactionLedger::open(storage.clone()).unwrap();
        ledger
            .save("mainnet", record(TransactionType::Transfer, "0x01", 1, 2))
            .unwrap();

        storage.fail.store(true, Ordering::SeqCst);

        let mut done = record(TransactionType::Transfer, "0x01", 1, 2);
        done.info.completed = true;
        assert!(ledger.save("mainnet", done.clone()).is_err());
        assert!(ledger.update("mainnet", "0x01", done).is_err());
        assert!(ledger
            .save("mainnet", record(TransactionType::Transfer, "0x02", 1, 2))
            .is_err());
        assert!(ledger
            .save("testnet", record(TransactionType::Transfer, "0x03", 1, 2))
            .is_err());

        let records = ledger.records("mainnet");
        assert_eq!(records.len(), 1);
        assert!(!records[0].info.completed);
        assert!(ledger.records("testnet").is_empty());

        // Memory still matches what the backend last accepted
        storage.fail.store(false, Ordering::SeqCst);
        ledger
            .save("mainnet", record(TransactionType::Transfer, "0x04", 1, 2))
            .unwrap();
        let persisted = storage.inner.load().unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted["mainnet"], ledger.records("mainnet"));
    }

    #[test]
    fn test_update_requires_existing_record() {
        let (ledger, _) = ledger();
        let missing = ledger.update(
            "mainnet",
            "0x01",
            record(TransactionType::Transfer, "0x01", 1, 2),
        );
        assert!(matches!(missing, Err(LedgerError::NotFound(_))));

        ledger
            .save("mainnet", record(TransactionType::Transfer, "0x01", 1, 2))
            .unwrap();
        let mut replacement = record(TransactionType::Transfer, "0x01", 1, 2);
        replacement.mark_failed();
        ledger.update("mainnet", "0x01", replacement).unwrap();
        assert!(ledger.get("mainnet", "0x01").unwrap().info.failed);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let (ledger, _) = ledger();
        ledger
            .save("mainnet", record(TransactionType::Deposit, "0xABCDEF", 1, 2))
            .unwrap();

        let found = ledger.get("mainnet", "0xabcdef").unwrap();
        // Case preserved on write
        assert_eq!(found.transaction_hash, "0xABCDEF");
    }

    #[test]
    fn test_partitions_are_isolated() {
        let (ledger, _) = ledger();
        ledger
            .save("mainnet", record(TransactionType::Transfer, "0x01", 1, 2))
            .unwrap();
        assert!(ledger.get("testnet", "0x01").is_none());
        assert!(ledger.records("testnet").is_empty());
    }

    #[test]
    fn test_user_and_pending_views() {
        let (ledger, _) = ledger();
        ledger
            .save("mainnet", record(TransactionType::Transfer, "0x01", 1, 2))
            .unwrap();
        ledger
            .save("mainnet", record(TransactionType::Withdrawal, "0x02", 3, 1))
            .unwrap();
        let mut done = record(TransactionType::Transfer, "0x03", 1, 4);
        done.info.completed = true;
        ledger.save("mainnet", done).unwrap();

        let mine = ledger.user_records("mainnet", Address::repeat_byte(1));
        assert_eq!(mine.len(), 3);

        let pending = ledger.pending("mainnet");
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn test_reopen_restores_records() {
        let (ledger, storage) = ledger();
        ledger
            .save("mainnet", record(TransactionType::Deposit, "0x01", 1, 2))
            .unwrap();

        let reopened = TransactionLedger::open(storage).unwrap();
        assert!(reopened.get("mainnet", "0x01").is_some());
    }
}
