use std::thread;

use anyhow::{anyhow, Result};
use isahc::{ReadResponseExt, Request};
use serde::Serialize;

use crate::{
    model::{Block, Blockchain, Transaction, TransactionPool},
    util::{
        execution::{sleep_millis, Runnable},
        Context,
    },
};

/// Outbound side of the peer network. Delivery is fire-and-forget: callers
/// never wait for, or learn about, the outcome.
pub trait Broadcaster: Send + Sync {
    fn broadcast_block(&self, block: &Block);
    fn broadcast_transaction(&self, transaction: &Transaction);
}

pub struct HttpBroadcaster {
    peers: Vec<String>,
}

impl HttpBroadcaster {
    pub fn new(peers: Vec<String>) -> HttpBroadcaster {
        HttpBroadcaster { peers }
    }

    fn post_to_peers<T: Serialize>(&self, path: &str, payload: &T) {
        if self.peers.is_empty() {
            return;
        }

        let body = match serde_json::to_string(payload) {
            Ok(body) => body,
            Err(err) => {
                error!("Could not serialize broadcast payload: {}", err);
                return;
            }
        };

        for peer in &self.peers {
            let uri = format!("{}{}", peer, path);
            let body = body.clone();

            thread::spawn(move || {
                if let Err(err) = post_json(&uri, body) {
                    warn!("Broadcast to {} failed: {}", uri, err);
                }
            });
        }
    }
}

impl Broadcaster for HttpBroadcaster {
    fn broadcast_block(&self, block: &Block) {
        self.post_to_peers("/blocks", block);
    }

    fn broadcast_transaction(&self, transaction: &Transaction) {
        self.post_to_peers("/transactions", transaction);
    }
}

fn post_json(uri: &str, body: String) -> Result<()> {
    let request = Request::post(uri)
        .header("Content-Type", "application/json")
        .body(body)?;

    let mut response = isahc::send(request)?;

    if !response.status().is_success() {
        let reason = response.text().unwrap_or_default();
        return Err(anyhow!("peer answered {}: {}", response.status(), reason));
    }

    Ok(())
}

/// Periodically pulls every peer's chain and adopts it when it is longer
/// and valid.
pub struct Peer {
    peers: Vec<String>,
    peer_sync_ms: u64,
    blockchain: Blockchain,
    pool: TransactionPool,
}

impl Runnable for Peer {
    fn run(&self) -> Result<()> {
        self.start()
    }
}

impl Peer {
    pub fn new(context: &Context) -> Peer {
        Peer {
            peers: context.config.peers.clone(),
            peer_sync_ms: context.config.peer_sync_ms,
            blockchain: context.blockchain.clone(),
            pool: context.pool.clone(),
        }
    }

    fn fetch_chain(peer: &str) -> Result<Vec<Block>> {
        let uri = format!("{}/blockchain", peer);
        let mut response = isahc::get(uri)?;

        if !response.status().is_success() {
            return Err(anyhow!("peer answered {}", response.status()));
        }

        Blockchain::from_json(&response.text()?)
    }

    fn sync_with(&self, peer: &str) -> Result<()> {
        let blocks = Peer::fetch_chain(peer)?;

        if blocks.len() <= self.blockchain.len() {
            return Ok(());
        }

        self.blockchain.replace_chain(blocks)?;
        self.pool.clear_blockchain_transactions(&self.blockchain);

        info!(
            "Added new peer block(s) from {}, chain length is now {}",
            peer,
            self.blockchain.len()
        );

        Ok(())
    }

    pub fn start(&self) -> Result<()> {
        if self.peers.is_empty() {
            info!("No peers configured, peer sync disabled");

            return Ok(());
        }

        info!("Syncing with peers {:?}", self.peers);

        loop {
            for peer in &self.peers {
                if let Err(err) = self.sync_with(peer) {
                    warn!("Could not sync with {}: {:#}", peer, err);
                }
            }

            sleep_millis(self.peer_sync_ms);
        }
    }
}

#[cfg(test)]
pub mod test_broadcast_util {
    use std::sync::Mutex;

    use super::*;

    /// Keeps every broadcast in memory instead of sending it.
    #[derive(Default)]
    pub struct RecordingBroadcaster {
        pub blocks: Mutex<Vec<Block>>,
        pub transactions: Mutex<Vec<Transaction>>,
    }

    impl Broadcaster for RecordingBroadcaster {
        fn broadcast_block(&self, block: &Block) {
            self.blocks.lock().unwrap().push(block.clone());
        }

        fn broadcast_transaction(&self, transaction: &Transaction) {
            self.transactions.lock().unwrap().push(transaction.clone());
        }
    }
}
