use std::collections::BTreeMap;

use isahc::{Body, ReadResponseExt, Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::Server;

pub const STARTING_BALANCE: u64 = 1000;
pub const MINING_REWARD: u64 = 50;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub input: Value,
    pub output: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub timestamp: i64,
    pub last_hash: String,
    pub hash: String,
    pub data: Vec<Transaction>,
    pub nonce: u64,
    pub difficulty: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletInfo {
    pub address: String,
    pub balance: u64,
}

pub trait Api {
    fn get_blocks(&self) -> Vec<Block>;
    fn get_last_block(&self) -> Block;
    fn get_length(&self) -> usize;
    fn get_range(&self, start: usize, end: usize) -> Vec<Block>;
    fn mine(&self) -> Block;
    fn transact(&self, recipient: &str, amount: u64) -> Response<Body>;
    fn get_wallet_info(&self) -> WalletInfo;
    fn get_known_addresses(&self) -> Vec<String>;
    fn get_transactions(&self) -> Vec<Transaction>;
    fn add_block(&self, block: &Block) -> Response<Body>;
}

impl Api for Server {
    fn get_blocks(&self) -> Vec<Block> {
        get_json(self, "/blockchain")
    }

    fn get_last_block(&self) -> Block {
        self.get_blocks().last().unwrap().to_owned()
    }

    fn get_length(&self) -> usize {
        get_json(self, "/blockchain/length")
    }

    fn get_range(&self, start: usize, end: usize) -> Vec<Block> {
        get_json(
            self,
            &format!("/blockchain/range?start={}&end={}", start, end),
        )
    }

    fn mine(&self) -> Block {
        get_json(self, "/blockchain/mine")
    }

    fn transact(&self, recipient: &str, amount: u64) -> Response<Body> {
        let uri = format!("{}/wallet/transact", get_base_url(self));
        let body = json!({ "recipient": recipient, "amount": amount }).to_string();

        post_request(uri, body)
    }

    fn get_wallet_info(&self) -> WalletInfo {
        get_json(self, "/wallet/info")
    }

    fn get_known_addresses(&self) -> Vec<String> {
        get_json(self, "/known-addresses")
    }

    fn get_transactions(&self) -> Vec<Transaction> {
        get_json(self, "/transactions")
    }

    fn add_block(&self, block: &Block) -> Response<Body> {
        let uri = format!("{}/blocks", get_base_url(self));
        let body = serde_json::to_string(&block).unwrap();

        post_request(uri, body)
    }
}

fn get_base_url(server: &Server) -> String {
    format!("http://127.0.0.1:{}", server.config.port)
}

fn get_json<T: serde::de::DeserializeOwned>(server: &Server, path: &str) -> T {
    let uri = format!("{}{}", get_base_url(server), path);
    let mut response = isahc::get(uri).unwrap();

    assert_eq!(response.status().as_u16(), 200);

    let raw_body = response.text().unwrap();
    serde_json::from_str(&raw_body).unwrap()
}

fn post_request(uri: String, body: String) -> Response<Body> {
    let request = Request::post(uri)
        .header("Content-Type", "application/json")
        .body(body)
        .unwrap();

    isahc::send(request).unwrap()
}
