mod config;
mod context;
pub mod execution;
mod logger;
pub mod termination;

pub use config::Config;
pub use context::Context;
pub use logger::initialize_logger;
