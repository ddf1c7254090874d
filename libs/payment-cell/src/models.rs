// libs/payment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use appointment_cell::AppointmentStatus;

/// Both values are part of the signed tuple and must be sent unchanged.
pub const PAYMENT_METHOD: &str = "CARD";
pub const TRANSACTION_TYPE: &str = "P";

pub const GUEST_BUYER_NAME: &str = "Guest";

// ==============================================================================
// SIGNER BOUNDARY
// ==============================================================================

/// The exact tuple the gateway signature covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRequest {
    #[serde(rename = "CPID")]
    pub merchant_id: String,
    #[serde(rename = "ORDERNO")]
    pub order_no: String,
    #[serde(rename = "AMOUNT")]
    pub amount: String,
    #[serde(rename = "PAYMETHOD")]
    pub pay_method: String,
    #[serde(rename = "TYPE")]
    pub transaction_type: String,
}

impl SignatureRequest {
    pub fn new(merchant_id: &str, order_no: &str, amount: &str) -> Self {
        Self {
            merchant_id: merchant_id.to_string(),
            order_no: order_no.to_string(),
            amount: amount.to_string(),
            pay_method: PAYMENT_METHOD.to_string(),
            transaction_type: TRANSACTION_TYPE.to_string(),
        }
    }

    /// Fields in signing order, `|`-separated.
    pub fn signing_input(&self) -> String {
        [
            self.merchant_id.as_str(),
            self.order_no.as_str(),
            self.amount.as_str(),
            self.pay_method.as_str(),
            self.transaction_type.as_str(),
        ].join("|")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignatureResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(rename = "KIWOOM_ENC", default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SignatureResponse {
    pub fn signed(signature: String) -> Self {
        Self { success: true, signature: Some(signature), error: None }
    }

    pub fn failed(error: &str) -> Self {
        Self { success: false, signature: None, error: Some(error.to_string()) }
    }

    /// A usable signature, or the reason there is none.
    pub fn into_signature(self) -> Result<String, PaymentError> {
        match (self.success, self.signature) {
            (true, Some(signature)) if !signature.is_empty() => Ok(signature),
            (_, _) => Err(PaymentError::SignatureError(
                self.error.unwrap_or_else(|| "Failed to generate payment signature".to_string()),
            )),
        }
    }
}

// ==============================================================================
// LINK AND CALLBACK MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentLink {
    pub url: String,
    pub order_no: String,
    pub amount: String,
    pub timestamp: String,
}

/// Buyer fields copied from the session into the redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buyer {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCallbackRequest {
    pub appointment_id: Uuid,
    pub result: String,
}

impl PaymentCallbackRequest {
    pub fn is_success(&self) -> bool {
        self.result.trim().eq_ignore_ascii_case("SUCCESS")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentCallbackResponse {
    pub appointment_id: Uuid,
    pub confirmed: bool,
    pub status: AppointmentStatus,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Appointment not found")]
    NotFound,

    #[error("Invalid appointment state: {0}")]
    InvalidState(String),

    #[error("Signature error: {0}")]
    SignatureError(String),

    #[error("Payment gateway not configured: {0}")]
    NotConfigured(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signer_payload_uses_gateway_field_names() {
        let request = SignatureRequest::new("CP001", "ORD-1-2", "30000");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["CPID"], "CP001");
        assert_eq!(json["ORDERNO"], "ORD-1-2");
        assert_eq!(json["AMOUNT"], "30000");
        assert_eq!(json["PAYMETHOD"], "CARD");
        assert_eq!(json["TYPE"], "P");
        assert_eq!(request.signing_input(), "CP001|ORD-1-2|30000|CARD|P");
    }

    #[test]
    fn signer_response_needs_success_and_hash() {
        let ok: SignatureResponse = serde_json::from_str(r#"{"success":true,"KIWOOM_ENC":"abc"}"#).unwrap();
        assert_eq!(ok.into_signature().unwrap(), "abc");

        let no_hash: SignatureResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(no_hash.into_signature().is_err());

        let failed = SignatureResponse::failed("merchant suspended");
        match failed.into_signature() {
            Err(PaymentError::SignatureError(msg)) => assert_eq!(msg, "merchant suspended"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn callback_result_is_case_insensitive() {
        let request: PaymentCallbackRequest = serde_json::from_str(
            r#"{"appointmentId":"1f0c6a8e-7d0b-4b7e-9b43-2f4b3f1e2c11","result":"success"}"#,
        ).unwrap();
        assert!(request.is_success());

        let request = PaymentCallbackRequest { result: "FAIL".to_string(), ..request };
        assert!(!request.is_success());
    }
}
