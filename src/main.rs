use util::initialize_logger;

use crate::{
    api::Api,
    miner::Miner,
    peer::Peer,
    util::{execution, termination, Config, Context},
};

#[macro_use]
extern crate log;

mod api;
mod miner;
mod model;
mod peer;
mod util;

fn main() {
    initialize_logger();

    info!("Starting up");

    termination::set_ctrlc_handler();

    let config = Config::read();
    let context = Context::new(config);

    info!("Node wallet address is {}", context.wallet.address());

    if context.config.seed_data {
        if let Err(err) = context.seed_data() {
            error!("Could not seed data: {:#}", err);
        }
    }

    let miner = Miner::new(&context);
    let api = Api::new(&context, &miner);
    let peer = Peer::new(&context);

    execution::run_in_parallel(vec![&miner, &api, &peer]);
}
