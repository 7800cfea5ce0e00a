//! Batched persistence of file records.

use super::files::upsert_in;
use super::{Store, StoreError};
use crate::model::FileRecord;

/// Default number of records committed per transaction.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Totals reported by [`BatchWriter::finish`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Records written
    pub records: usize,
    /// Transactions committed
    pub transactions: usize,
}

/// Accumulates records and commits them in fixed-size transactions.
///
/// A transaction is committed whenever `batch_size` records are pending and
/// once more by [`BatchWriter::finish`] for any remainder. Each batch
/// commits fully or not at all.
pub struct BatchWriter<'s> {
    store: &'s Store,
    batch_size: usize,
    pending: Vec<FileRecord>,
    summary: BatchSummary,
}

impl<'s> BatchWriter<'s> {
    /// Create a writer committing every `batch_size` records (minimum 1).
    #[must_use]
    pub fn new(store: &'s Store, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            store,
            batch_size,
            pending: Vec::with_capacity(batch_size),
            summary: BatchSummary::default(),
        }
    }

    /// Queue a record, committing the batch if it is now full.
    ///
    /// # Errors
    ///
    /// Returns an error if committing the full batch fails; that batch is
    /// rolled back and discarded.
    pub fn push(&mut self, record: FileRecord) -> Result<(), StoreError> {
        self.pending.push(record);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Commit whatever is pending, even a partial batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; the batch is rolled back and
    /// discarded.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.pending);
        let tx = self.store.conn().unchecked_transaction()?;
        for record in &batch {
            upsert_in(&tx, record)?;
        }
        tx.commit()?;
        self.summary.records += batch.len();
        self.summary.transactions += 1;
        log::debug!(
            "Committed batch of {} records ({} total)",
            batch.len(),
            self.summary.records
        );
        Ok(())
    }

    /// Records waiting for the next commit.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Totals so far.
    #[must_use]
    pub fn summary(&self) -> BatchSummary {
        self.summary
    }

    /// Flush the remainder and return the totals.
    ///
    /// # Errors
    ///
    /// Returns an error if the final commit fails.
    pub fn finish(mut self) -> Result<BatchSummary, StoreError> {
        self.flush()?;
        Ok(self.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;

    fn record(i: usize) -> FileRecord {
        FileRecord::new(PathBuf::from(format!("/data/file-{i:05}")), i as u64, Utc::now())
    }

    #[test]
    fn test_2500_records_commit_in_three_transactions() {
        let store = Store::open_in_memory().unwrap();
        let mut writer = BatchWriter::new(&store, DEFAULT_BATCH_SIZE);
        for i in 0..2500 {
            writer.push(record(i)).unwrap();
        }
        assert_eq!(writer.summary().transactions, 2);
        assert_eq!(writer.pending(), 500);

        let summary = writer.finish().unwrap();
        assert_eq!(
            summary,
            BatchSummary {
                records: 2500,
                transactions: 3
            }
        );
        assert_eq!(store.file_count().unwrap(), 2500);
    }

    #[test]
    fn test_finish_with_nothing_pending() {
        let store = Store::open_in_memory().unwrap();
        let summary = BatchWriter::new(&store, 10).finish().unwrap();
        assert_eq!(summary.transactions, 0);
    }

    #[test]
    fn test_failed_batch_leaves_no_rows() {
        let store = Store::open_in_memory().unwrap();
        let mut writer = BatchWriter::new(&store, 3);
        writer.push(record(1)).unwrap();
        writer.push(record(2)).unwrap();
        let mut bad = record(3);
        bad.size = u64::MAX;
        assert!(writer.push(bad).is_err());
        assert_eq!(store.file_count().unwrap(), 0);
        assert_eq!(writer.summary().transactions, 0);
    }
}
