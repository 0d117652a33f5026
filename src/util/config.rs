extern crate dotenv;

use std::{env, str::FromStr};

use dotenv::dotenv;

type StringVec = Vec<String>;

/// Node settings. Consensus constants (starting balance, reward, mine rate)
/// are fixed in `model` and never configurable.
#[derive(Debug, Clone)]
pub struct Config {
    // Network settings
    pub host: String,
    pub port: u16,

    // Peer settings
    pub peers: StringVec,
    pub peer_sync_ms: u64,

    // Miner settings
    pub auto_mine: bool,
    pub max_blocks: u64,
    pub max_nonce: u64,
    pub transaction_waiting_ms: u64,

    // Start-up settings
    pub seed_data: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 8000,
            peers: StringVec::default(),
            peer_sync_ms: 10000,
            auto_mine: false,
            max_blocks: 0,
            max_nonce: 0,
            transaction_waiting_ms: 10000,
            seed_data: false,
        }
    }
}

impl Config {
    pub fn read_envvar<T: FromStr>(key: &str, default_value: T) -> T {
        match env::var(key) {
            Ok(value) => value.trim().parse::<T>().unwrap_or(default_value),
            Err(_) => default_value,
        }
    }

    pub fn read_vec_envvar(key: &str, separator: &str, default_value: StringVec) -> StringVec {
        match env::var(key) {
            Ok(value) => value
                .trim()
                .split_terminator(separator)
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => default_value,
        }
    }

    pub fn read() -> Config {
        dotenv().ok();

        let defaults = Config::default();

        Config {
            // Network settings
            host: Config::read_envvar("HOST", defaults.host),
            port: Config::read_envvar::<u16>("PORT", defaults.port),

            // Peer settings
            peers: Config::read_vec_envvar("PEERS", ",", defaults.peers),
            peer_sync_ms: Config::read_envvar("PEER_SYNC_MS", defaults.peer_sync_ms),

            // Miner settings
            auto_mine: Config::read_envvar("AUTO_MINE", defaults.auto_mine),
            max_blocks: Config::read_envvar("MAX_BLOCKS", defaults.max_blocks),
            max_nonce: Config::read_envvar("MAX_NONCE", defaults.max_nonce),
            transaction_waiting_ms: Config::read_envvar(
                "TRANSACTION_WAITING_MS",
                defaults.transaction_waiting_ms,
            ),

            // Start-up settings
            seed_data: Config::read_envvar("SEED_DATA", defaults.seed_data),
        }
    }
}
