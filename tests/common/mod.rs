mod api;
mod server;

#[allow(unused_imports)]
pub use api::{Api, Block, Transaction, WalletInfo, MINING_REWARD, STARTING_BALANCE};
pub use server::{Server, ServerBuilder};
