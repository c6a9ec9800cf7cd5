use actix_web::{HttpResponse, Responder, get, web};

use utxo_chain::crypto::normalize_address;

use super::ledger;
use super::models::{AppState, BalanceResponse, UtxoResponse};

#[get("/balance/{address}/")]
pub async fn get_balance(state: web::Data<AppState>, path: web::Path<(String,)>) -> impl Responder {
    let address = match normalize_address(&path.into_inner().0) {
        Ok(a) => a,
        Err(e) => return HttpResponse::BadRequest().body(e.to_string()),
    };

    let (sum, count): (f64, usize) = {
        let bc = match ledger(&state) {
            Ok(bc) => bc,
            Err(resp) => return resp,
        };
        let owned: Vec<f64> = bc.utxos().owned_by(&address).map(|o| o.amount).collect();
        (owned.iter().sum(), owned.len())
    };

    HttpResponse::Ok().json(BalanceResponse {
        address,
        balance: sum,
        utxos: count,
    })
}

/// Snapshot of the unspent set.
#[get("/utxos/")]
pub async fn get_utxos(state: web::Data<AppState>) -> impl Responder {
    let bc = match ledger(&state) {
        Ok(bc) => bc,
        Err(resp) => return resp,
    };
    let mut utxos: Vec<_> = bc.utxo_snapshot().into_values().collect();
    utxos.sort_by(|a, b| a.id.cmp(&b.id));
    HttpResponse::Ok().json(UtxoResponse {
        size: utxos.len(),
        utxos,
    })
}
