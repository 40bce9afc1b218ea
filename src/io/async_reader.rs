//! Asynchronous transaction CSV reader with batch interface
//!
//! Provides batched, streaming access to the transactions file so that the
//! pipeline can hand work to the engine without loading the whole file.
//!
//! # Architecture
//!
//! ```text
//! CSV Reader → TransactionReader → Batches of Transactions
//!                     ↓
//!              csv_format module
//!   (TransactionCsvRecord, convert_transaction_record)
//! ```

use crate::io::csv_format::{convert_transaction_record, TransactionCsvRecord};
use crate::types::Transaction;
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;

/// Asynchronous transactions reader
///
/// Maintains streaming behavior with constant memory usage per batch.
pub struct TransactionReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    skipped: usize,
}

impl<R: AsyncRead + Unpin + Send + 'static> TransactionReader<R> {
    /// Create a new TransactionReader from an async reader
    ///
    /// # Arguments
    ///
    /// * `reader` - Async reader providing CSV data
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            skipped: 0,
        }
    }

    /// Read up to `batch_size` transactions
    ///
    /// Rows that fail to parse or convert are logged and skipped.
    ///
    /// # Returns
    ///
    /// The converted transactions in file order; empty at end of file.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<Transaction> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<TransactionCsvRecord>();

        while batch.len() < batch_size {
            match records.next().await {
                Some(Ok(csv_record)) => match convert_transaction_record(csv_record) {
                    Ok(transaction) => batch.push(transaction),
                    Err(e) => {
                        log::warn!("Skipping transaction row: {}", e);
                        self.skipped += 1;
                    }
                },
                Some(Err(e)) => {
                    log::warn!("CSV parse error: {}", e);
                    self.skipped += 1;
                }
                None => break,
            }
        }

        batch
    }

    /// Rows skipped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
