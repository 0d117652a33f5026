use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{
    crypto::{self, TransactionSignature},
    wallet::Wallet,
};

pub const MINING_REWARD: u64 = 50;
pub const MINING_REWARD_ADDRESS: &str = "*--official-mining-reward--*";

const ID_LEN: usize = 8;

fn short_id() -> String {
    Uuid::new_v4().to_string()[..ID_LEN].to_string()
}

/// Recipient (or sender) address to allotted amount. Ordered so that the
/// signed serialization is canonical.
pub type TransactionOutput = BTreeMap<String, u64>;

#[derive(Error, PartialEq, Debug)]
pub enum TransactionError {
    #[error("Amount {amount} exceeds balance {balance}")]
    InsufficientFunds { amount: u64, balance: u64 },

    #[error("Sender cannot be its own recipient")]
    SelfTransfer,

    #[error("Output total {actual} does not match input amount {expected}")]
    InvalidOutputTotal { expected: u64, actual: u128 },

    #[error("Sender address `{0}` is not owned by the signing public key")]
    AddressMismatch(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid mining reward")]
    InvalidReward,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInput {
    pub timestamp: i64,
    pub amount: u64,
    pub address: String,
    pub public_key: String,
    pub signature: TransactionSignature,
}

impl TransactionInput {
    fn signed(sender: &Wallet, amount: u64, output: &TransactionOutput) -> TransactionInput {
        TransactionInput {
            timestamp: Utc::now().timestamp_millis(),
            amount,
            address: sender.address().to_string(),
            public_key: sender.public_key().to_string(),
            signature: sender.sign(output),
        }
    }

    fn reward() -> TransactionInput {
        TransactionInput {
            timestamp: Utc::now().timestamp_millis(),
            amount: MINING_REWARD,
            address: MINING_REWARD_ADDRESS.to_string(),
            public_key: String::new(),
            signature: TransactionSignature::default(),
        }
    }
}

/// A signed transfer of value from one wallet to one or more recipients.
///
/// The sender's own output entry holds its remaining balance, so the output
/// always sums to `input.amount`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub id: String,
    pub input: TransactionInput,
    pub output: TransactionOutput,
}

impl Transaction {
    pub fn new(sender: &Wallet, recipient: &str, amount: u64) -> Result<Transaction, TransactionError> {
        if recipient == sender.address() {
            return Err(TransactionError::SelfTransfer);
        }

        let balance = sender.balance();
        if amount > balance {
            return Err(TransactionError::InsufficientFunds { amount, balance });
        }

        let output = TransactionOutput::from([
            (sender.address().to_string(), balance - amount),
            (recipient.to_string(), amount),
        ]);
        let input = TransactionInput::signed(sender, balance, &output);

        Ok(Transaction {
            id: short_id(),
            input,
            output,
        })
    }

    /// Returns a copy of this transaction paying `amount` more to `recipient`
    /// out of the sender's remaining balance, re-signed by `sender`.
    pub fn update(
        &self,
        sender: &Wallet,
        recipient: &str,
        amount: u64,
    ) -> Result<Transaction, TransactionError> {
        if recipient == sender.address() {
            return Err(TransactionError::SelfTransfer);
        }

        let remaining = self.output.get(sender.address()).copied().unwrap_or(0);
        if amount > remaining {
            return Err(TransactionError::InsufficientFunds {
                amount,
                balance: remaining,
            });
        }

        let mut output = self.output.clone();
        *output.entry(recipient.to_string()).or_insert(0) += amount;
        output.insert(sender.address().to_string(), remaining - amount);

        let input = TransactionInput::signed(sender, self.input.amount, &output);

        Ok(Transaction {
            id: self.id.clone(),
            input,
            output,
        })
    }

    pub fn reward(miner: &Wallet) -> Transaction {
        Transaction {
            id: short_id(),
            input: TransactionInput::reward(),
            output: TransactionOutput::from([(miner.address().to_string(), MINING_REWARD)]),
        }
    }

    pub fn is_reward(&self) -> bool {
        self.input.address == MINING_REWARD_ADDRESS
    }

    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.is_reward() {
            let amounts: Vec<u64> = self.output.values().copied().collect();
            if amounts != [MINING_REWARD] {
                return Err(TransactionError::InvalidReward);
            }

            return Ok(());
        }

        let total: u128 = self.output.values().map(|amount| *amount as u128).sum();
        if total != self.input.amount as u128 {
            return Err(TransactionError::InvalidOutputTotal {
                expected: self.input.amount,
                actual: total,
            });
        }

        let owner = crypto::address_of(&self.input.public_key).ok();
        if owner.as_deref() != Some(self.input.address.as_str()) {
            return Err(TransactionError::AddressMismatch(
                self.input.address.clone(),
            ));
        }

        if !crypto::verify(&self.input.public_key, &self.output, &self.input.signature) {
            return Err(TransactionError::InvalidSignature);
        }

        Ok(())
    }

    #[cfg(test)]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
