use actix_web::{HttpResponse, Responder, get, web};
use std::sync::TryLockError;

use super::ledger;
use super::models::{AppState, StatsResponse};

#[get("/stats/")]
pub async fn get_stats(state: web::Data<AppState>) -> impl Responder {
    // Snapshot the ledger first
    let (height, difficulty, reward_per_block, validation, last_interval_ms, utxo_size) = {
        let bc = match ledger(&state) {
            Ok(bc) => bc,
            Err(resp) => return resp,
        };
        let blocks = bc.blocks();
        let last_interval_ms = match blocks {
            [.., older, newer] => Some((newer.timestamp - older.timestamp).max(0)),
            _ => None,
        };
        let cfg = bc.config();
        (
            bc.len(),
            cfg.difficulty,
            cfg.reward,
            cfg.validation,
            last_interval_ms,
            bc.utxos().len(),
        )
    };

    // Miner counters; the miner is locked for the whole of a search, so
    // don't wait for it
    let (miner_reward, blocks_mined, mining) = match state.miner.try_lock() {
        Ok(m) => (Some(m.reward()), Some(m.blocks_mined()), false),
        Err(TryLockError::WouldBlock) => (None, None, true),
        Err(TryLockError::Poisoned(_)) => {
            return HttpResponse::InternalServerError().body("miner lock poisoned");
        }
    };

    HttpResponse::Ok().json(StatsResponse {
        height,
        difficulty,
        reward_per_block,
        validation,
        last_interval_ms,
        utxo_size,
        miner_reward,
        blocks_mined,
        mining,
    })
}
