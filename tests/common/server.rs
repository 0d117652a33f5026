use std::{
    io::{BufRead, BufReader},
    process::{Child, Command, Stdio},
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use assert_cmd::cargo::cargo_bin;

pub struct Config {
    pub port: u16,
    pub peers: Vec<String>,
    pub peer_sync_ms: u64,
    pub auto_mine: bool,
    pub max_nonce: u64,
    pub transaction_waiting_ms: u64,
}

pub struct ServerBuilder {
    config: Config,
}

#[allow(dead_code)]
impl ServerBuilder {
    pub fn new() -> ServerBuilder {
        let config = Config {
            port: 8000,
            peer_sync_ms: 50,
            auto_mine: false,
            transaction_waiting_ms: 10,
            peers: Vec::<String>::new(),
            max_nonce: 0,
        };

        ServerBuilder { config }
    }

    pub fn auto_mine(mut self) -> ServerBuilder {
        self.config.auto_mine = true;

        self
    }

    pub fn port(mut self, port: u16) -> ServerBuilder {
        self.config.port = port;

        self
    }

    pub fn peer(mut self, port: u16) -> ServerBuilder {
        let address = format!("http://127.0.0.1:{}", port);
        self.config.peers.push(address);

        self
    }

    pub fn start(self) -> Server {
        Server::new(self.config)
    }
}

type SyncedOutput = Arc<Mutex<Vec<String>>>;

pub struct Server {
    pub config: Config,
    process: Child,
    output: SyncedOutput,
}

#[allow(dead_code)]
impl Server {
    fn start_process(config: &Config) -> Child {
        Command::new(cargo_bin("pow_ledger"))
            .env("HOST", "127.0.0.1")
            .env("PORT", config.port.to_string())
            .env("PEERS", config.peers.join(","))
            .env("AUTO_MINE", config.auto_mine.to_string())
            .env("MAX_NONCE", config.max_nonce.to_string())
            .env(
                "TRANSACTION_WAITING_MS",
                config.transaction_waiting_ms.to_string(),
            )
            .env("PEER_SYNC_MS", config.peer_sync_ms.to_string())
            .env("RUST_LOG", "info")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .unwrap()
    }

    fn start_stdout_reading(process: &mut Child) -> SyncedOutput {
        let output = Arc::new(Mutex::new(Vec::<String>::new()));
        let thread_output = output.clone();
        let stdout = process.stdout.take().unwrap();

        thread::spawn(move || {
            let buf = BufReader::new(stdout);

            for line in buf.lines() {
                match line {
                    Ok(line) => thread_output.lock().unwrap().push(line),
                    Err(_) => break,
                }
            }
        });

        output
    }

    fn search_message_in_output(&self, message: &str) -> bool {
        let lines = self.output.lock().unwrap();

        lines.iter().any(|line| line.contains(message))
    }

    /// Polls `condition` until it holds or the timeout elapses.
    pub fn wait_until<F: FnMut() -> bool>(mut condition: F) -> bool {
        let wait_time = Duration::from_millis(50);
        let max_wait_time = Duration::from_secs(10);

        let start = Instant::now();

        while Instant::now() < start + max_wait_time {
            if condition() {
                return true;
            }

            thread::sleep(wait_time);
        }

        false
    }

    pub fn wait_for_log_message(&self, message: &str) -> bool {
        Server::wait_until(|| self.search_message_in_output(message))
    }

    pub fn new(config: Config) -> Server {
        let mut process = Server::start_process(&config);
        let output = Server::start_stdout_reading(&mut process);

        let server = Server {
            process,
            config,
            output,
        };

        assert!(
            server.wait_for_log_message("actix-web-service"),
            "server on port {} did not start",
            server.config.port
        );

        server
    }

    fn stop(&mut self) {
        println!("Shutting down server on port {}", self.config.port);

        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

// Kills the node process even when the test panics.
impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}
