use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use anyhow::Result;
use log::{info, warn};

use super::{block::Block, blockchain::Blockchain, transaction::Transaction};

pub type TransactionVec = Vec<Transaction>;

type TransactionMap = HashMap<String, Transaction>;
type SyncedTransactionMap = Arc<Mutex<TransactionMap>>;

/// Unconfirmed transactions, at most one per sender address.
#[derive(Debug, Clone, Default)]
pub struct TransactionPool {
    transactions: SyncedTransactionMap,
}

impl TransactionPool {
    pub fn new() -> TransactionPool {
        TransactionPool {
            transactions: SyncedTransactionMap::default(),
        }
    }

    /// Inserts `transaction`, replacing any pending one from the same sender.
    pub fn set_transaction(&self, transaction: Transaction) {
        let mut transactions = self.transactions.lock().unwrap();
        info!(
            "Transaction {} from {} added to pool",
            transaction.id, transaction.input.address
        );
        transactions.insert(transaction.input.address.clone(), transaction);
    }

    /// Builds the next pending transaction of `address` from the current one
    /// (if any) and stores it, all under one lock so that concurrent callers
    /// cannot interleave.
    pub fn upsert_transaction<F, E>(&self, address: &str, build: F) -> Result<Transaction, E>
    where
        F: FnOnce(Option<&Transaction>) -> Result<Transaction, E>,
    {
        let mut transactions = self.transactions.lock().unwrap();
        let transaction = build(transactions.get(address))?;

        info!(
            "Transaction {} from {} added to pool",
            transaction.id, transaction.input.address
        );
        transactions.insert(transaction.input.address.clone(), transaction.clone());

        Ok(transaction)
    }

    #[cfg(test)]
    pub fn existing_transaction(&self, address: &str) -> Option<Transaction> {
        let transactions = self.transactions.lock().unwrap();

        transactions.get(address).cloned()
    }

    /// Pooled transactions that still pass validation. Invalid ones are
    /// dropped from the pool.
    pub fn valid_transactions(&self) -> TransactionVec {
        self.retain_transactions(|transaction| Ok(transaction.validate()?))
    }

    /// Valid pooled transactions that also spend their sender's balance as
    /// of `blocks`, ready to be mined on top of them. Everything else is
    /// dropped.
    pub fn mineable_transactions(&self, blocks: &[Block]) -> TransactionVec {
        self.retain_transactions(|transaction| {
            transaction.validate()?;
            Blockchain::validate_historic_balance(blocks, transaction)?;

            Ok(())
        })
    }

    fn retain_transactions<F>(&self, check: F) -> TransactionVec
    where
        F: Fn(&Transaction) -> Result<()>,
    {
        let mut transactions = self.transactions.lock().unwrap();

        transactions.retain(|_, transaction| match check(transaction) {
            Ok(()) => true,
            Err(err) => {
                warn!("Dropping pooled transaction {}: {:#}", transaction.id, err);
                false
            }
        });

        transactions.values().cloned().collect()
    }

    /// Drops every pooled transaction already committed to `blockchain`.
    pub fn clear_blockchain_transactions(&self, blockchain: &Blockchain) {
        let committed: HashSet<String> = blockchain
            .get_all_blocks()
            .into_iter()
            .flat_map(|block| block.data.into_iter())
            .map(|transaction| transaction.id)
            .collect();

        let mut transactions = self.transactions.lock().unwrap();
        transactions.retain(|_, transaction| !committed.contains(&transaction.id));
    }

    pub fn transaction_data(&self) -> TransactionVec {
        let transactions = self.transactions.lock().unwrap();

        transactions.values().cloned().collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.transactions.lock().unwrap().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
