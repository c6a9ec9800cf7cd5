mod balance;
mod chain;
mod health;
pub mod models;
mod stats;
mod tx;
mod wallet;

use actix_web::HttpResponse;
use actix_web::web::{self, ServiceConfig};
use std::sync::MutexGuard;

use utxo_chain::Blockchain;
use utxo_chain::blockchain::model;

pub use models::AppState;

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(chain::get_chain)
            .service(chain::validate_chain)
            .service(chain::post_genesis)
            .service(tx::post_transfer)
            .service(balance::get_balance)
            .service(balance::get_utxos)
            .service(stats::get_stats)
            .service(wallet::create_wallet),
    );
}

/// Lock the ledger for a read handler, turning a poisoned lock into a 500.
fn ledger(state: &AppState) -> Result<MutexGuard<'_, Blockchain>, HttpResponse> {
    model::lock(&state.ledger).map_err(|e| HttpResponse::InternalServerError().body(e.to_string()))
}
