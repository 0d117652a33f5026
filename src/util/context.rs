use std::sync::Arc;

use anyhow::Result;
use rand::Rng;

use crate::{
    model::{Block, Blockchain, Transaction, TransactionPool, Wallet},
    peer::{Broadcaster, HttpBroadcaster},
};

use super::config::Config;

const SEED_BLOCKS: usize = 10;
const SEED_POOLED_TRANSACTIONS: usize = 3;

/// State of one node: its chain, pool and wallet plus the way it reaches
/// peers. Clones share the same state.
#[derive(Clone)]
pub struct Context {
    pub config: Config,
    pub blockchain: Blockchain,
    pub pool: TransactionPool,
    pub wallet: Wallet,
    pub broadcaster: Arc<dyn Broadcaster>,
}

impl Context {
    pub fn new(config: Config) -> Context {
        let broadcaster = Arc::new(HttpBroadcaster::new(config.peers.clone()));

        Context::with_broadcaster(config, broadcaster)
    }

    pub fn with_broadcaster(config: Config, broadcaster: Arc<dyn Broadcaster>) -> Context {
        let blockchain = Blockchain::new();
        let wallet = Wallet::with_blockchain(blockchain.clone());

        Context {
            config,
            blockchain,
            pool: TransactionPool::new(),
            wallet,
            broadcaster,
        }
    }

    /// Pays `amount` to `recipient` from the node wallet, extending the
    /// wallet's pending transaction if there is one.
    pub fn transact(&self, recipient: &str, amount: u64) -> Result<Transaction> {
        let transaction = self
            .pool
            .upsert_transaction(self.wallet.address(), |existing| match existing {
                Some(transaction) => transaction.update(&self.wallet, recipient, amount),
                None => Transaction::new(&self.wallet, recipient, amount),
            })?;

        self.broadcaster.broadcast_transaction(&transaction);

        Ok(transaction)
    }

    /// Accepts a block announced by a peer.
    pub fn receive_block(&self, block: Block) -> Result<()> {
        let hash = block.hash.clone();

        self.blockchain.receive_block(block)?;
        self.pool.clear_blockchain_transactions(&self.blockchain);

        info!("Received new block {}", hash);

        Ok(())
    }

    /// Admits a transaction announced by a peer once it validates and
    /// spends its sender's balance on the local chain.
    pub fn receive_transaction(&self, transaction: Transaction) -> Result<()> {
        transaction.validate()?;
        Blockchain::validate_historic_balance(&self.blockchain.get_all_blocks(), &transaction)?;

        info!("Received new transaction {}", transaction.id);
        self.pool.set_transaction(transaction);

        Ok(())
    }

    /// Fills the chain and pool with transfers between throwaway wallets.
    pub fn seed_data(&self) -> Result<()> {
        let mut rng = rand::thread_rng();
        let mut random_transaction =
            || Transaction::new(&Wallet::new(), Wallet::new().address(), rng.gen_range(2..=50));

        for _ in 0..SEED_BLOCKS {
            let data = vec![random_transaction()?, random_transaction()?];
            self.blockchain.add_block(data)?;
        }

        for _ in 0..SEED_POOLED_TRANSACTIONS {
            self.pool.set_transaction(random_transaction()?);
        }

        info!(
            "Seeded {} blocks and {} pooled transactions",
            SEED_BLOCKS, SEED_POOLED_TRANSACTIONS
        );

        Ok(())
    }
}
