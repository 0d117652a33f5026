use std::sync::{Arc, Mutex};

use anyhow::Result;
use thiserror::Error;

use crate::{
    model::{Block, Blockchain, Transaction, TransactionPool, TransactionVec, Wallet},
    peer::Broadcaster,
    util::{
        execution::{sleep_millis, Runnable},
        Context,
    },
};

#[derive(Error, Debug)]
pub enum MinerError {
    #[error("No valid block was mined at index `{0}`")]
    BlockNotMined(usize),

    #[error("Cannot mine on an empty chain")]
    EmptyChain,
}

/// Packages pooled transactions and a reward into blocks. Clones share one
/// mining lock, so at most one search runs per node.
#[derive(Clone)]
pub struct Miner {
    wallet: Wallet,
    auto_mine: bool,
    max_blocks: u64,
    max_nonce: u64,
    transaction_waiting_ms: u64,
    blockchain: Blockchain,
    pool: TransactionPool,
    broadcaster: Arc<dyn Broadcaster>,
    mining: Arc<Mutex<()>>,
}

impl Runnable for Miner {
    fn run(&self) -> Result<()> {
        self.start()
    }
}

impl Miner {
    pub fn new(context: &Context) -> Miner {
        Miner {
            wallet: context.wallet.clone(),
            auto_mine: context.config.auto_mine,
            max_blocks: context.config.max_blocks,
            max_nonce: context.config.max_nonce,
            transaction_waiting_ms: context.config.transaction_waiting_ms,
            blockchain: context.blockchain.clone(),
            pool: context.pool.clone(),
            broadcaster: context.broadcaster.clone(),
            mining: Arc::default(),
        }
    }

    fn must_stop_mining(&self, block_counter: u64) -> bool {
        self.max_blocks > 0 && block_counter >= self.max_blocks
    }

    fn create_reward_transaction(&self) -> Transaction {
        Transaction::reward(&self.wallet)
    }

    fn mine_block(&self, last_block: &Block, transactions: TransactionVec) -> Option<Block> {
        if self.max_nonce == 0 {
            return Some(Block::mine(last_block, transactions));
        }

        Block::mine_with_limit(last_block, transactions, self.max_nonce)
    }

    /// Mines the pooled transactions that are valid on the current chain
    /// plus a reward, appends the block, clears the included transactions
    /// from the pool and broadcasts the block.
    pub fn mine_next(&self) -> Result<Block> {
        let _mining = self.mining.lock().unwrap();

        let blocks = self.blockchain.get_all_blocks();
        let last_block = blocks.last().ok_or(MinerError::EmptyChain)?;
        let index = blocks.len();

        let mut transactions = self.pool.mineable_transactions(&blocks);
        transactions.push(self.create_reward_transaction());

        let block = match self.mine_block(last_block, transactions) {
            Some(block) => block,
            None => {
                error!("No valid block was found for index {}", index);

                return Err(MinerError::BlockNotMined(index).into());
            }
        };

        info!(
            "Valid block found for index {} with difficulty {}",
            index, block.difficulty
        );

        self.blockchain.add_mined_block(block.clone())?;
        self.pool.clear_blockchain_transactions(&self.blockchain);
        self.broadcaster.broadcast_block(&block);

        Ok(block)
    }

    pub fn start(&self) -> Result<()> {
        if !self.auto_mine {
            info!("Automatic mining disabled");

            return Ok(());
        }

        info!("Start mining pooled transactions");

        let mut block_counter = 0;

        loop {
            if self.must_stop_mining(block_counter) {
                info!("Block limit reached, stopping mining");

                return Ok(());
            }

            if self.pool.valid_transactions().is_empty() {
                sleep_millis(self.transaction_waiting_ms);

                continue;
            }

            self.mine_next()?;
            block_counter += 1;
        }
    }
}
