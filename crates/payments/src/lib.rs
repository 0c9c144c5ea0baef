//! Talking to the payment gateway.
//!
//! A payment goes through three steps: the portal creates an order with the
//! gateway, the participant pays for it on the gateway's hosted checkout, and
//! the checkout sends the browser back with a payment id and a signature over
//! `"<order_id>|<payment_id>"` which the portal checks with [`verify_signature`]
//! before recording the registration.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

pub mod gateway;
pub mod offline;

pub use gateway::HostedGateway;
pub use offline::OfflineGateway;

/// Longest receipt the gateway accepts.
pub const MAX_RECEIPT_LEN: usize = 40;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not reach the payment gateway: {0}")]
    Http(#[from] reqwest::Error),
    #[error("the payment gateway rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("no such order: {0}")]
    UnknownOrder(String),
    #[error("amount must be positive (got {0})")]
    InvalidAmount(i64),
}

/// What the portal asks the gateway to charge.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    /// In minor currency units.
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayOrderStatus {
    Created,
    /// A payment was attempted but has not (yet) succeeded.
    Attempted,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: GatewayOrderStatus,
}

/// How the browser is sent to pay for an order.
#[derive(Debug, Clone)]
pub enum Checkout {
    /// The gateway's checkout script is loaded with the public key id.
    Hosted { key_id: String, script_url: String },
    /// No gateway is involved: the portal shows a confirmation form whose
    /// submission carries a payment id signed with this secret.
    Offline { secret: String },
}

#[rocket::async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(
        &self,
        request: &OrderRequest,
    ) -> Result<GatewayOrder, Error>;

    async fn fetch_order(&self, order_id: &str) -> Result<GatewayOrder, Error>;

    fn checkout(&self) -> Checkout;

    /// The secret the checkout's return signature is computed with.
    fn signing_secret(&self) -> &str;
}

type HmacSha256 = Hmac<Sha256>;

fn mac_of(order_id: &str, payment_id: &str, secret: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    mac
}

/// Hex encoded HMAC-SHA256 of `"<order_id>|<payment_id>"`.
pub fn sign(order_id: &str, payment_id: &str, secret: &str) -> String {
    hex::encode(mac_of(order_id, payment_id, secret).finalize().into_bytes())
}

/// Checks the signature returned by the checkout. The comparison is constant
/// time.
pub fn verify_signature(
    order_id: &str,
    payment_id: &str,
    signature: &str,
    secret: &str,
) -> bool {
    let Ok(signature) = hex::decode(signature.trim()) else {
        return false;
    };
    mac_of(order_id, payment_id, secret)
        .verify_slice(&signature)
        .is_ok()
}

/// Builds the receipt sent along with an order: `rcpt_<event>_<timestamp>`,
/// where `<event>` is the first eight characters of the event's public id.
pub fn receipt(event_public_id: &str, unix_timestamp: i64) -> String {
    let event: String = event_public_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect();
    let mut receipt = format!("rcpt_{event}_{unix_timestamp}");
    receipt.truncate(MAX_RECEIPT_LEN);
    receipt
}

fn validate(request: &OrderRequest) -> Result<(), Error> {
    if request.amount <= 0 {
        return Err(Error::InvalidAmount(request.amount));
    }
    Ok(())
}
