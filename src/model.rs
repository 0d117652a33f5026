mod block;
mod blockchain;
mod crypto;
mod transaction;
mod transaction_pool;
mod wallet;

pub use block::Block;
pub use blockchain::Blockchain;
pub use transaction::Transaction;
pub use transaction_pool::{TransactionPool, TransactionVec};
pub use wallet::Wallet;

#[cfg(test)]
pub use blockchain::ChainValidationError;
#[cfg(test)]
pub use transaction::{TransactionError, MINING_REWARD};
#[cfg(test)]
pub use wallet::STARTING_BALANCE;
