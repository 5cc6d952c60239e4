//! ACH gateway adapter (Dwolla-style transfer API, REST via reqwest)
//!
//! Creates a transfer from the barber's funding source to the platform's
//! master funding source. ACH settles asynchronously: a successful create
//! returns [`DebitStatus::Pending`] and the rail's webhook closes the loop.

use super::{DebitReceipt, DebitRequest, DebitStatus, GatewayError, PaymentGateway};
use async_trait::async_trait;
use std::time::Duration;

/// Bounded request timeout; a hung rail call becomes a retryable failure
const REQUEST_TIMEOUT_SECS: u64 = 30;

pub struct AchGateway {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
    /// Platform-side destination funding source for collected money
    platform_funding_source: String,
}

impl AchGateway {
    pub fn new(base_url: String, api_token: String, platform_funding_source: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            api_token,
            platform_funding_source,
        }
    }

    fn transfer_body(&self, req: &DebitRequest) -> serde_json::Value {
        serde_json::json!({
            "_links": {
                "source": { "href": format!("{}/funding-sources/{}", self.base_url, req.source_instrument) },
                "destination": { "href": format!("{}/funding-sources/{}", self.base_url, self.platform_funding_source) }
            },
            "amount": {
                "currency": req.currency,
                "value": shared::money::cents_to_decimal(req.amount_cents).to_string()
            },
            "correlationId": req.idempotency_key
        })
    }
}

#[async_trait]
impl PaymentGateway for AchGateway {
    async fn debit(&self, req: &DebitRequest) -> Result<DebitReceipt, GatewayError> {
        let response = self
            .client
            .post(format!("{}/transfers", self.base_url))
            .bearer_auth(&self.api_token)
            .header("Idempotency-Key", &req.idempotency_key)
            .json(&self.transfer_body(req))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    GatewayError::Transient(format!("ACH transfer request failed: {e}"))
                } else {
                    GatewayError::Declined(format!("ACH transfer request error: {e}"))
                }
            })?;

        let status = response.status();

        if status.is_server_error() || status.as_u16() == 429 {
            return Err(GatewayError::Transient(format!(
                "ACH rail returned {status}"
            )));
        }

        if status == reqwest::StatusCode::CREATED || status.is_success() {
            // Transfer id comes back in the Location header
            let transfer_ref = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|loc| loc.rsplit('/').next())
                .map(String::from);

            let transfer_ref = match transfer_ref {
                Some(r) => r,
                None => {
                    // Fall back to the response body id
                    let body: serde_json::Value = response
                        .json()
                        .await
                        .map_err(|e| GatewayError::Transient(format!("ACH response unreadable: {e}")))?;
                    body["id"].as_str().map(String::from).ok_or_else(|| {
                        GatewayError::Transient("ACH transfer created but no reference returned".into())
                    })?
                }
            };

            // ACH carries no per-transfer fee on this rail
            return Ok(DebitReceipt {
                gateway_transaction_id: transfer_ref,
                processing_fee_cents: 0,
                net_amount_cents: req.amount_cents,
                status: DebitStatus::Pending,
            });
        }

        // 4xx: read the rail's error description
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        let message = body["message"]
            .as_str()
            .unwrap_or("ACH transfer rejected")
            .to_string();

        if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::NOT_FOUND {
            Err(GatewayError::InvalidInstrument(message))
        } else {
            Err(GatewayError::Declined(message))
        }
    }

    fn name(&self) -> &'static str {
        "ach"
    }
}
