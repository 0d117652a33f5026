use actix_web::{get, post, rt::System, web, App, HttpResponse, HttpServer, Responder};
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{
    miner::Miner,
    model::{Block, Transaction},
    util::{execution::Runnable, Context},
};

#[derive(Deserialize)]
struct RangeQuery {
    start: usize,
    end: usize,
}

#[derive(Deserialize)]
struct TransactRequest {
    recipient: String,
    amount: u64,
}

#[derive(Serialize)]
struct WalletInfo<'a> {
    address: &'a str,
    balance: u64,
}

fn bad_request(err: anyhow::Error) -> HttpResponse {
    HttpResponse::BadRequest().body(format!("{:#}", err))
}

#[get("/")]
async fn welcome() -> impl Responder {
    HttpResponse::Ok().body("Welcome to the blockchain")
}

#[get("/blockchain")]
async fn get_blockchain(context: web::Data<Context>) -> impl Responder {
    match context.blockchain.to_json() {
        Ok(json) => HttpResponse::Ok()
            .content_type("application/json")
            .body(json),
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

#[get("/blockchain/range")]
async fn get_blockchain_range(
    context: web::Data<Context>,
    query: web::Query<RangeQuery>,
) -> impl Responder {
    HttpResponse::Ok().json(context.blockchain.range(query.start, query.end))
}

#[get("/blockchain/length")]
async fn get_blockchain_length(context: web::Data<Context>) -> impl Responder {
    HttpResponse::Ok().json(context.blockchain.len())
}

/// Mining runs on the blocking thread pool so request workers stay free.
#[get("/blockchain/mine")]
async fn mine_block(miner: web::Data<Miner>) -> impl Responder {
    let miner = miner.get_ref().clone();

    match web::block(move || miner.mine_next()).await {
        Ok(Ok(block)) => HttpResponse::Ok().json(block),
        Ok(Err(err)) => {
            error!("Mining failed: {:#}", err);
            HttpResponse::InternalServerError().body(format!("{:#}", err))
        }
        Err(err) => HttpResponse::InternalServerError().body(err.to_string()),
    }
}

#[post("/wallet/transact")]
async fn transact(
    context: web::Data<Context>,
    request: web::Json<TransactRequest>,
) -> impl Responder {
    match context.transact(&request.recipient, request.amount) {
        Ok(transaction) => HttpResponse::Ok().json(transaction),
        Err(err) => bad_request(err),
    }
}

#[get("/wallet/info")]
async fn wallet_info(context: web::Data<Context>) -> impl Responder {
    HttpResponse::Ok().json(WalletInfo {
        address: context.wallet.address(),
        balance: context.wallet.balance(),
    })
}

#[get("/known-addresses")]
async fn known_addresses(context: web::Data<Context>) -> impl Responder {
    HttpResponse::Ok().json(context.blockchain.known_addresses())
}

#[get("/transactions")]
async fn get_transactions(context: web::Data<Context>) -> impl Responder {
    HttpResponse::Ok().json(context.pool.transaction_data())
}

#[post("/blocks")]
async fn receive_block(context: web::Data<Context>, block: web::Json<Block>) -> impl Responder {
    match context.receive_block(block.into_inner()) {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(err) => {
            warn!("Rejected peer block: {:#}", err);
            bad_request(err)
        }
    }
}

#[post("/transactions")]
async fn receive_transaction(
    context: web::Data<Context>,
    transaction: web::Json<Transaction>,
) -> impl Responder {
    match context.receive_transaction(transaction.into_inner()) {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(err) => {
            warn!("Rejected peer transaction: {:#}", err);
            bad_request(err)
        }
    }
}

pub struct Api {
    context: Context,
    miner: Miner,
}

impl Runnable for Api {
    fn run(&self) -> Result<()> {
        System::new().block_on(self.start())?;

        Ok(())
    }
}

impl Api {
    pub fn new(context: &Context, miner: &Miner) -> Api {
        Api {
            context: context.clone(),
            miner: miner.clone(),
        }
    }

    async fn start(&self) -> std::io::Result<()> {
        let host = self.context.config.host.clone();
        let port = self.context.config.port;
        let context = web::Data::new(self.context.clone());
        let miner = web::Data::new(self.miner.clone());

        info!("Starting api on {}:{}", host, port);

        HttpServer::new(move || {
            App::new()
                .app_data(context.clone())
                .app_data(miner.clone())
                .service(welcome)
                .service(get_blockchain)
                .service(get_blockchain_range)
                .service(get_blockchain_length)
                .service(mine_block)
                .service(transact)
                .service(wallet_info)
                .service(known_addresses)
                .service(get_transactions)
                .service(receive_block)
                .service(receive_transaction)
        })
        .bind((host.as_str(), port))?
        .run()
        .await
    }
}
