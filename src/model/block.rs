use chrono::Utc;
use ethereum_types::U256;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::{crypto::canonical_json, transaction::Transaction};

/// Target milliseconds between blocks. Faster blocks raise the difficulty,
/// slower ones lower it.
pub const MINE_RATE_MS: i64 = 4000;

const GENESIS_TIMESTAMP: i64 = 1;
const GENESIS_LAST_HASH: &str = "genesis_last_hash";
const GENESIS_HASH: &str = "genesis_hash";
const GENESIS_NONCE: u64 = 0;
const GENESIS_DIFFICULTY: u32 = 3;

const MIN_DIFFICULTY: u32 = 1;

#[derive(Error, PartialEq, Debug)]
pub enum BlockError {
    #[error("Last hash does not match the previous block")]
    ChainLink,

    #[error("Hash does not match block content or difficulty")]
    ProofOfWork,

    #[error("Difficulty jumped from {from} to {to}")]
    DifficultyJump { from: u32, to: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub timestamp: i64,
    pub last_hash: String,
    pub hash: String,
    pub data: Vec<Transaction>,
    pub nonce: u64,
    pub difficulty: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HashPreimage<'a> {
    timestamp: i64,
    last_hash: &'a str,
    data: &'a [Transaction],
    nonce: u64,
    difficulty: u32,
}

impl Block {
    pub fn genesis() -> Block {
        Block {
            timestamp: GENESIS_TIMESTAMP,
            last_hash: GENESIS_LAST_HASH.to_string(),
            hash: GENESIS_HASH.to_string(),
            data: Vec::new(),
            nonce: GENESIS_NONCE,
            difficulty: GENESIS_DIFFICULTY,
        }
    }

    pub fn calculate_hash(
        timestamp: i64,
        last_hash: &str,
        data: &[Transaction],
        nonce: u64,
        difficulty: u32,
    ) -> String {
        let preimage = HashPreimage {
            timestamp,
            last_hash,
            data,
            nonce,
            difficulty,
        };

        hex::encode(Sha256::digest(canonical_json(&preimage).as_bytes()))
    }

    pub fn compute_hash(&self) -> String {
        Block::calculate_hash(
            self.timestamp,
            &self.last_hash,
            &self.data,
            self.nonce,
            self.difficulty,
        )
    }

    /// Number of leading zero bits of a hex encoded 256-bit hash, `None` if
    /// the hash is not one.
    fn leading_zeros(hash: &str) -> Option<u32> {
        let bytes = hex::decode(hash).ok()?;
        if bytes.len() != 32 {
            return None;
        }

        Some(U256::from_big_endian(&bytes).leading_zeros())
    }

    pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
        Block::leading_zeros(hash).map_or(false, |zeros| zeros >= difficulty)
    }

    pub fn adjust_difficulty(last_block: &Block, timestamp: i64) -> u32 {
        if timestamp - last_block.timestamp < MINE_RATE_MS {
            return last_block.difficulty.saturating_add(1);
        }

        last_block.difficulty.saturating_sub(1).max(MIN_DIFFICULTY)
    }

    /// Attempts a single nonce. Timestamp and difficulty are refreshed on
    /// every attempt.
    fn try_nonce(last_block: &Block, data: &[Transaction], nonce: u64) -> Option<Block> {
        let timestamp = Utc::now().timestamp_millis();
        let difficulty = Block::adjust_difficulty(last_block, timestamp);
        let hash = Block::calculate_hash(timestamp, &last_block.hash, data, nonce, difficulty);

        if !Block::meets_difficulty(&hash, difficulty) {
            return None;
        }

        Some(Block {
            timestamp,
            last_hash: last_block.hash.clone(),
            hash,
            data: data.to_vec(),
            nonce,
            difficulty,
        })
    }

    /// Searches nonces until the proof of work is met. Blocks the calling
    /// thread for as long as that takes.
    pub fn mine(last_block: &Block, data: Vec<Transaction>) -> Block {
        let mut nonce = 0;

        loop {
            if let Some(block) = Block::try_nonce(last_block, &data, nonce) {
                return block;
            }

            nonce = nonce.wrapping_add(1);
        }
    }

    /// Like `mine` but gives up after `max_nonce` attempts.
    pub fn mine_with_limit(
        last_block: &Block,
        data: Vec<Transaction>,
        max_nonce: u64,
    ) -> Option<Block> {
        (0..max_nonce).find_map(|nonce| Block::try_nonce(last_block, &data, nonce))
    }

    pub fn validate(&self, last_block: &Block) -> Result<(), BlockError> {
        if self.last_hash != last_block.hash {
            return Err(BlockError::ChainLink);
        }

        if self.difficulty < MIN_DIFFICULTY
            || self.hash != self.compute_hash()
            || !Block::meets_difficulty(&self.hash, self.difficulty)
        {
            return Err(BlockError::ProofOfWork);
        }

        if self.difficulty.abs_diff(last_block.difficulty) > 1 {
            return Err(BlockError::DifficultyJump {
                from: last_block.difficulty,
                to: self.difficulty,
            });
        }

        Ok(())
    }
}
