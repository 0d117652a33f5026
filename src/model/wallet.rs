use serde::Serialize;

use super::{
    block::Block,
    blockchain::Blockchain,
    crypto::{KeyPair, TransactionSignature},
};

pub const STARTING_BALANCE: u64 = 1000;

/// Signing identity of a participant. The balance is never stored; it is
/// replayed from the chain the wallet is attached to.
#[derive(Debug, Clone)]
pub struct Wallet {
    address: String,
    keypair: KeyPair,
    public_key: String,
    blockchain: Option<Blockchain>,
}

impl Default for Wallet {
    fn default() -> Self {
        Wallet::new()
    }
}

impl Wallet {
    /// A wallet that is not attached to any chain; its balance is always
    /// `STARTING_BALANCE`.
    pub fn new() -> Wallet {
        let keypair = KeyPair::generate();
        let public_key = keypair.public_key_pem();

        Wallet {
            address: keypair.address(),
            keypair,
            public_key,
            blockchain: None,
        }
    }

    pub fn with_blockchain(blockchain: Blockchain) -> Wallet {
        Wallet {
            blockchain: Some(blockchain),
            ..Wallet::new()
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn balance(&self) -> u64 {
        match &self.blockchain {
            Some(blockchain) => Wallet::calculate_balance(&blockchain.get_all_blocks(), &self.address),
            None => STARTING_BALANCE,
        }
    }

    pub fn sign<T: Serialize>(&self, data: &T) -> TransactionSignature {
        self.keypair.sign(data)
    }

    /// Replays `blocks` oldest to newest. A transaction sent by `address`
    /// resets the balance to its own output entry (the post-spend remainder);
    /// a transaction merely paying `address` adds to it.
    pub fn calculate_balance(blocks: &[Block], address: &str) -> u64 {
        let mut balance = STARTING_BALANCE;

        for transaction in blocks.iter().flat_map(|block| block.data.iter()) {
            if transaction.input.address == address {
                balance = transaction.output.get(address).copied().unwrap_or(0);
            } else if let Some(amount) = transaction.output.get(address) {
                balance += amount;
            }
        }

        balance
    }
}
