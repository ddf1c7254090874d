use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;
use tracing::{debug, error, warn};

use shared_config::AppConfig;

use crate::models::{PaymentError, SignatureRequest, SignatureResponse};

type HmacSha256 = Hmac<Sha256>;

/// Produces the gateway signature for a payment request.
///
/// `Err` means the signer could not be reached; a reachable signer that
/// refuses answers `Ok` with `success: false`.
#[async_trait]
pub trait PaymentSigner: Send + Sync {
    async fn sign(&self, request: &SignatureRequest) -> Result<SignatureResponse, PaymentError>;
}

/// Remote signer when `payment_signer_url` is set, local HMAC otherwise.
pub fn signer_from_config(config: &AppConfig) -> Arc<dyn PaymentSigner> {
    if config.payment_signer_url.is_empty() {
        Arc::new(HmacSigner::new(&config.payment_auth_key))
    } else {
        Arc::new(RemoteSigner::new(&config.payment_signer_url))
    }
}

/// Signs with the merchant auth key: base64 of HMAC-SHA256 over the
/// `|`-joined tuple.
pub struct HmacSigner {
    auth_key: String,
}

impl HmacSigner {
    pub fn new(auth_key: &str) -> Self {
        Self { auth_key: auth_key.to_string() }
    }

    pub fn compute(&self, request: &SignatureRequest) -> Option<String> {
        if self.auth_key.is_empty() {
            return None;
        }

        let mut mac = HmacSha256::new_from_slice(self.auth_key.as_bytes()).ok()?;
        mac.update(request.signing_input().as_bytes());

        Some(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl PaymentSigner for HmacSigner {
    async fn sign(&self, request: &SignatureRequest) -> Result<SignatureResponse, PaymentError> {
        Ok(match self.compute(request) {
            Some(signature) => SignatureResponse::signed(signature),
            None => {
                warn!("Payment auth key not configured, cannot sign order {}", request.order_no);
                SignatureResponse::failed("Payment auth key is not configured")
            }
        })
    }
}

/// Delegates signing to the merchant's credential service.
pub struct RemoteSigner {
    client: Client,
    endpoint: String,
}

impl RemoteSigner {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl PaymentSigner for RemoteSigner {
    async fn sign(&self, request: &SignatureRequest) -> Result<SignatureResponse, PaymentError> {
        debug!("Requesting signature for order {} from {}", request.order_no, self.endpoint);

        let response = self.client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!("Payment signer unreachable: {}", e);
                PaymentError::SignatureError(format!("Signer unreachable: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Payment signer error ({}): {}", status, body);
            return Err(PaymentError::SignatureError(format!("Signer returned {}", status)));
        }

        response.json::<SignatureResponse>().await.map_err(|e| {
            PaymentError::SignatureError(format!("Invalid signer response: {}", e))
        })
    }
}
