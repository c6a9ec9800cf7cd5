use actix_web::{HttpResponse, Responder, post, web};
use log::{debug, error, info, warn};
use std::time::Instant;

use utxo_chain::blockchain::model;
use utxo_chain::crypto::normalize_address;
use utxo_chain::{ChainError, Wallet};

use super::models::{AppState, TransferRequest, TransferResponse};

/// Build, sign, settle and mine a transfer in a block of its own.
#[post("/transfer/")]
pub async fn post_transfer(
    state: web::Data<AppState>,
    body: web::Json<TransferRequest>,
) -> impl Responder {
    let t0 = Instant::now();
    let TransferRequest {
        private_key,
        receiver,
        amount,
    } = body.into_inner();

    if !amount.is_finite() || amount <= 0.0 {
        warn!("POST /transfer/ - rejected: non-positive amount");
        return HttpResponse::BadRequest().body("amount must be > 0");
    }
    let sender = match Wallet::from_secret_hex(&private_key) {
        Ok(w) => w,
        Err(e) => return HttpResponse::BadRequest().body(e.to_string()),
    };
    let receiver = match normalize_address(&receiver) {
        Ok(a) => a,
        Err(e) => return HttpResponse::BadRequest().body(e.to_string()),
    };
    debug!(
        "POST /transfer/ - {} -> {} amount={amount:.6}",
        sender.address(),
        receiver
    );

    let st = state.clone();
    match web::block(move || settle_transfer(&st, &sender, &receiver, amount)).await {
        Ok(Ok(resp)) => {
            info!(
                "POST /transfer/ - txid={} mined in block #{} ({} ms)",
                resp.txid,
                resp.mined_index,
                t0.elapsed().as_millis()
            );
            HttpResponse::Ok().json(resp)
        }
        Ok(Err(e)) => {
            warn!("POST /transfer/ - rejected: {e}");
            HttpResponse::BadRequest().body(e.to_string())
        }
        Err(e) => {
            error!("POST /transfer/ - blocking task failed: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Settle under the ledger lock, then mine with the ledger unlocked. The
/// miner lock is held throughout so the tail cannot move under the search.
fn settle_transfer(
    state: &AppState,
    sender: &Wallet,
    receiver: &str,
    amount: f64,
) -> Result<TransferResponse, ChainError> {
    let mut miner = state.miner.lock().map_err(|_| ChainError::LockPoisoned)?;

    let block = {
        let mut ledger = model::lock(&state.ledger)?;
        if ledger.is_empty() {
            return Err(ChainError::MissingGenesis);
        }
        let tx = sender.transfer(receiver, amount, &ledger);
        let mut block = ledger.next_block();
        block.add_transaction(tx, &mut ledger)?;
        block
    };
    let txid = block.transactions[0].transaction_id.clone();

    let (mined_index, hash, nonce) = state.seal(&mut miner, block)?;

    let ledger = model::lock(&state.ledger)?;
    Ok(TransferResponse {
        txid,
        mined_index,
        hash,
        nonce,
        sender_balance: sender.balance(&ledger),
        receiver_balance: ledger.balance_of(receiver),
    })
}
