use env_logger::{Builder, Env, Target};

/// Logs to stdout at `info` unless `RUST_LOG` says otherwise.
pub fn initialize_logger() {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.target(Target::Stdout);
    builder.init();
}
