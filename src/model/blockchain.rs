use std::{
    collections::{BTreeSet, HashSet},
    sync::{Arc, Mutex},
};

use anyhow::Result;
use log::info;
use thiserror::Error;

use super::{
    block::{Block, BlockError},
    transaction::{Transaction, TransactionError},
    wallet::Wallet,
};

pub type BlockVec = Vec<Block>;

type SyncedBlockVec = Arc<Mutex<BlockVec>>;

#[derive(Error, PartialEq, Debug)]
pub enum ChainValidationError {
    #[error("Chain is empty")]
    EmptyChain,

    #[error("Chain does not start with the genesis block")]
    InvalidGenesis,

    #[error("Invalid block at index {index}: {source}")]
    InvalidBlock { index: usize, source: BlockError },

    #[error("Transaction `{0}` appears more than once")]
    DuplicateTransaction(String),

    #[error("Block at index {0} holds more than one mining reward")]
    MultipleRewards(usize),

    #[error("Block at index {index} holds more than one transfer from `{address}`")]
    MultipleTransfers { index: usize, address: String },

    #[error("Transaction `{0}` does not match its sender's historic balance")]
    InvalidHistoricBalance(String),

    #[error("Invalid transaction `{id}`: {source}")]
    InvalidTransaction { id: String, source: TransactionError },
}

#[derive(Error, PartialEq, Debug)]
pub enum BlockchainError {
    #[error("Incoming chain of length {incoming} is not longer than local chain of length {local}")]
    ChainTooShort { incoming: usize, local: usize },

    #[error("Incoming chain is invalid: {0}")]
    InvalidChain(#[from] ChainValidationError),

    #[error("Invalid block: {0}")]
    InvalidBlock(#[from] BlockError),
}

/// Shared handle to the ledger. Clones refer to the same chain; every
/// mutation happens under a single lock and only after full validation.
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: SyncedBlockVec,
}

impl Default for Blockchain {
    fn default() -> Self {
        Blockchain::new()
    }
}

impl Blockchain {
    pub fn new() -> Blockchain {
        let blocks = vec![Block::genesis()];

        Blockchain {
            blocks: Arc::new(Mutex::new(blocks)),
        }
    }

    pub fn get_last_block(&self) -> Block {
        let blocks = self.blocks.lock().unwrap();

        blocks[blocks.len() - 1].clone()
    }

    pub fn get_all_blocks(&self) -> BlockVec {
        let blocks = self.blocks.lock().unwrap();

        blocks.clone()
    }

    pub fn len(&self) -> usize {
        self.blocks.lock().unwrap().len()
    }

    /// Blocks newest first, sliced to `start..end` (clamped to the chain).
    pub fn range(&self, start: usize, end: usize) -> BlockVec {
        let blocks = self.blocks.lock().unwrap();
        let end = end.min(blocks.len());
        let start = start.min(end);

        blocks.iter().rev().skip(start).take(end - start).cloned().collect()
    }

    /// Every address that has ever received an output entry.
    pub fn known_addresses(&self) -> BTreeSet<String> {
        let blocks = self.blocks.lock().unwrap();

        blocks
            .iter()
            .flat_map(|block| block.data.iter())
            .flat_map(|transaction| transaction.output.keys().cloned())
            .collect()
    }

    /// Mines `data` on top of the current last block and appends the result.
    /// The search runs without holding the chain lock.
    pub fn add_block(&self, data: Vec<Transaction>) -> Result<Block> {
        let last_block = self.get_last_block();
        let block = Block::mine(&last_block, data);

        self.add_mined_block(block.clone())?;

        Ok(block)
    }

    /// Appends an already sealed block if it extends the current last block.
    pub fn add_mined_block(&self, block: Block) -> Result<()> {
        let mut blocks = self.blocks.lock().unwrap();
        let last = &blocks[blocks.len() - 1];

        block.validate(last).map_err(BlockchainError::from)?;

        blocks.push(block);

        Ok(())
    }

    pub fn validate_chain(chain: &[Block]) -> Result<(), ChainValidationError> {
        let genesis = chain.first().ok_or(ChainValidationError::EmptyChain)?;

        if *genesis != Block::genesis() {
            return Err(ChainValidationError::InvalidGenesis);
        }

        for (index, pair) in chain.windows(2).enumerate() {
            let (last_block, block) = (&pair[0], &pair[1]);

            block
                .validate(last_block)
                .map_err(|source| ChainValidationError::InvalidBlock {
                    index: index + 1,
                    source,
                })?;
        }

        Ok(())
    }

    #[cfg(test)]
    pub fn is_valid_chain(chain: &[Block]) -> bool {
        Blockchain::validate_chain(chain).is_ok()
    }

    /// Checks the transactions of a chain: ids are unique, each block holds at
    /// most one reward and at most one transfer per sender, and every transfer
    /// is valid and spends exactly the balance its sender had before the block.
    pub fn validate_transaction_chain(chain: &[Block]) -> Result<(), ChainValidationError> {
        let mut seen_ids = HashSet::new();

        for (index, block) in chain.iter().enumerate() {
            let mut has_reward = false;
            let mut senders = HashSet::new();

            for transaction in &block.data {
                if !seen_ids.insert(transaction.id.as_str()) {
                    return Err(ChainValidationError::DuplicateTransaction(
                        transaction.id.clone(),
                    ));
                }

                transaction
                    .validate()
                    .map_err(|source| ChainValidationError::InvalidTransaction {
                        id: transaction.id.clone(),
                        source,
                    })?;

                if transaction.is_reward() {
                    if has_reward {
                        return Err(ChainValidationError::MultipleRewards(index));
                    }

                    has_reward = true;
                    continue;
                }

                if !senders.insert(transaction.input.address.as_str()) {
                    return Err(ChainValidationError::MultipleTransfers {
                        index,
                        address: transaction.input.address.clone(),
                    });
                }

                Blockchain::validate_historic_balance(&chain[..index], transaction)?;
            }
        }

        Ok(())
    }

    /// Checks that `transaction` spends exactly the balance its sender holds
    /// after `blocks`. Rewards have no sender balance and always pass.
    pub fn validate_historic_balance(
        blocks: &[Block],
        transaction: &Transaction,
    ) -> Result<(), ChainValidationError> {
        if transaction.is_reward() {
            return Ok(());
        }

        let historic_balance = Wallet::calculate_balance(blocks, &transaction.input.address);

        if transaction.input.amount != historic_balance {
            return Err(ChainValidationError::InvalidHistoricBalance(
                transaction.id.clone(),
            ));
        }

        Ok(())
    }

    fn ensure_longer(incoming: usize, local: usize) -> Result<(), BlockchainError> {
        if incoming <= local {
            return Err(BlockchainError::ChainTooShort { incoming, local });
        }

        Ok(())
    }

    /// Adopts `chain` if it is strictly longer than the local one and fully
    /// valid. Validation runs without holding the chain lock; the length is
    /// checked again before the swap. The local chain is untouched on any
    /// rejection.
    pub fn replace_chain(&self, chain: BlockVec) -> Result<()> {
        Blockchain::ensure_longer(chain.len(), self.len())?;

        Blockchain::validate_chain(&chain).map_err(BlockchainError::from)?;
        Blockchain::validate_transaction_chain(&chain).map_err(BlockchainError::from)?;

        let mut blocks = self.blocks.lock().unwrap();
        Blockchain::ensure_longer(chain.len(), blocks.len())?;

        info!(
            "Replacing chain of length {} with chain of length {}",
            blocks.len(),
            chain.len()
        );
        *blocks = chain;

        Ok(())
    }

    /// Accepts a block announced by a peer by validating the local chain
    /// extended with it.
    pub fn receive_block(&self, block: Block) -> Result<()> {
        let mut candidate = self.get_all_blocks();
        candidate.push(block);

        self.replace_chain(candidate)
    }

    pub fn to_json(&self) -> Result<String> {
        let blocks = self.blocks.lock().unwrap();

        Ok(serde_json::to_string(&*blocks)?)
    }

    /// Parses a chain record. Shape errors are rejected here; chain validity
    /// is left to `replace_chain`.
    pub fn from_json(json: &str) -> Result<BlockVec> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod test_chain_util {
    use super::*;

    /// A chain with `count` mined blocks, each holding two transfers between
    /// fresh wallets and a reward.
    pub fn blockchain_with_blocks(count: usize) -> Blockchain {
        let blockchain = Blockchain::new();

        for _ in 0..count {
            let miner = Wallet::new();
            let data = vec![
                Transaction::new(&Wallet::new(), "recipient-a", 10).unwrap(),
                Transaction::new(&Wallet::new(), "recipient-b", 20).unwrap(),
                Transaction::reward(&miner),
            ];

            blockchain.add_block(data).unwrap();
        }

        blockchain
    }
}
