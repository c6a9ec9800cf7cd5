use actix_web::{HttpResponse, Responder, post};
use serde::Serialize;

use utxo_chain::Wallet;

#[derive(Serialize)]
struct NewWalletResponse {
    private_key: String,
    public_key: String,
    address: String,
}

/// Generate a key pair. Nothing is stored server side.
#[post("/wallet/new/")]
pub async fn create_wallet() -> impl Responder {
    let wallet = Wallet::new();
    HttpResponse::Ok().json(NewWalletResponse {
        private_key: wallet.keys().secret_key_hex(),
        public_key: wallet.keys().public_key_hex(),
        address: wallet.address().to_string(),
    })
}
