use actix_web::{HttpResponse, Responder, get, post, web};
use log::{error, info, warn};

use utxo_chain::blockchain::model;
use utxo_chain::crypto::normalize_address;
use utxo_chain::{ChainError, Wallet};

use super::ledger;
use super::models::{AppState, ChainResponse, GenesisRequest, GenesisResponse, ValidateResponse};

/// Get the full blockchain.
#[get("/chain/")]
pub async fn get_chain(state: web::Data<AppState>) -> impl Responder {
    let bc = match ledger(&state) {
        Ok(bc) => bc,
        Err(resp) => return resp,
    };
    HttpResponse::Ok().json(ChainResponse {
        length: bc.len(),
        difficulty: bc.config().difficulty,
        chain: bc.blocks(),
    })
}

/// Validate the whole chain.
#[get("/validate/")]
pub async fn validate_chain(state: web::Data<AppState>) -> impl Responder {
    let bc = match ledger(&state) {
        Ok(bc) => bc,
        Err(resp) => return resp,
    };
    HttpResponse::Ok().json(ValidateResponse {
        valid: bc.is_valid_chain(),
        length: bc.len(),
        difficulty: bc.config().difficulty,
    })
}

/// Bootstrap the chain: an ephemeral lender grants `amount` to `address`
/// in a mined genesis block. Only accepted on an empty ledger.
#[post("/genesis/")]
pub async fn post_genesis(
    state: web::Data<AppState>,
    body: web::Json<GenesisRequest>,
) -> impl Responder {
    let GenesisRequest { address, amount } = body.into_inner();
    if !amount.is_finite() || amount <= 0.0 {
        return HttpResponse::BadRequest().body("amount must be > 0");
    }
    let address = match normalize_address(&address) {
        Ok(a) => a,
        Err(e) => return HttpResponse::BadRequest().body(e.to_string()),
    };

    let st = state.clone();
    match web::block(move || mint_genesis(&st, &address, amount)).await {
        Ok(Ok(resp)) => {
            info!("GENESIS - sealed {} (txid={})", resp.hash, resp.txid);
            HttpResponse::Ok().json(resp)
        }
        Ok(Err(e)) => {
            warn!("POST /genesis/ - rejected: {e}");
            HttpResponse::BadRequest().body(e.to_string())
        }
        Err(e) => {
            error!("POST /genesis/ - blocking task failed: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

fn mint_genesis(state: &AppState, address: &str, amount: f64) -> Result<GenesisResponse, ChainError> {
    let mut miner = state.miner.lock().map_err(|_| ChainError::LockPoisoned)?;
    let lender = Wallet::new();

    let block = model::lock(&state.ledger)?.genesis_block(&lender, address, amount)?;
    let txid = block.transactions[0].transaction_id.clone();
    let (_, hash, nonce) = state.seal(&mut miner, block)?;

    Ok(GenesisResponse {
        txid,
        hash,
        nonce,
        lender: lender.address().to_string(),
    })
}
