//! Card gateway adapter (Stripe-style REST API, no SDK dependency)
//!
//! Charges the barber's stored card off-session. Card debits settle
//! synchronously: a succeeded intent returns [`DebitStatus::Settled`].

use super::{DebitReceipt, DebitRequest, DebitStatus, GatewayError, PaymentGateway};
use async_trait::async_trait;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 30;

pub struct CardGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
    /// Platform customer namespace for stored instruments
    platform_account: String,
}

impl CardGateway {
    pub fn new(base_url: String, secret_key: String, platform_account: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            secret_key,
            platform_account,
        }
    }
}

#[async_trait]
impl PaymentGateway for CardGateway {
    async fn debit(&self, req: &DebitRequest) -> Result<DebitReceipt, GatewayError> {
        let amount = req.amount_cents.to_string();
        let currency = req.currency.to_lowercase();
        let description = format!("Clipper platform collection {}", req.collection_id);

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .header("Idempotency-Key", &req.idempotency_key)
            .form(&[
                ("amount", amount.as_str()),
                ("currency", currency.as_str()),
                ("payment_method", req.source_instrument.as_str()),
                ("customer", self.platform_account.as_str()),
                ("confirm", "true"),
                ("off_session", "true"),
                ("description", description.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    GatewayError::Transient(format!("card charge request failed: {e}"))
                } else {
                    GatewayError::Declined(format!("card charge request error: {e}"))
                }
            })?;

        let status = response.status();

        if status.is_server_error() || status.as_u16() == 429 {
            return Err(GatewayError::Transient(format!(
                "card rail returned {status}"
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Transient(format!("card response unreadable: {e}")))?;

        if !status.is_success() {
            let error_type = body["error"]["type"].as_str().unwrap_or("");
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("card charge rejected")
                .to_string();
            return match error_type {
                "card_error" => Err(GatewayError::Declined(message)),
                "invalid_request_error" => Err(GatewayError::InvalidInstrument(message)),
                _ => Err(GatewayError::Declined(message)),
            };
        }

        let intent_id = body["id"].as_str().map(String::from).ok_or_else(|| {
            GatewayError::Transient("card charge succeeded but no intent id returned".into())
        })?;

        match body["status"].as_str() {
            Some("succeeded") => Ok(DebitReceipt {
                gateway_transaction_id: intent_id,
                processing_fee_cents: 0,
                net_amount_cents: req.amount_cents,
                status: DebitStatus::Settled,
            }),
            // Intent created but not settled (processing / requires_action):
            // treat like an async rail and let the webhook close it
            Some("processing") => Ok(DebitReceipt {
                gateway_transaction_id: intent_id,
                processing_fee_cents: 0,
                net_amount_cents: req.amount_cents,
                status: DebitStatus::Pending,
            }),
            other => Err(GatewayError::Declined(format!(
                "card charge did not settle (status: {})",
                other.unwrap_or("unknown")
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "card"
    }
}
