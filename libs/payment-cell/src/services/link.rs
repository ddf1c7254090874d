use std::sync::Arc;

use chrono::Utc;
use reqwest::Url;
use tracing::{debug, info};
use uuid::Uuid;

use appointment_cell::{AppointmentError, AppointmentService};
use shared_config::AppConfig;
use shared_models::auth::User;

use crate::models::{
    Buyer, PaymentError, PaymentLink, SignatureRequest, GUEST_BUYER_NAME,
};
use crate::services::order::{generate_order_no, payment_timestamp};
use crate::services::signer::{signer_from_config, PaymentSigner};

/// Builds signed redirect URLs to the card-payment gateway.
pub struct PaymentLinkService {
    appointment_service: AppointmentService,
    signer: Arc<dyn PaymentSigner>,
    merchant_id: String,
    action_url: String,
    return_url: String,
}

impl PaymentLinkService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_signer(config, signer_from_config(config))
    }

    pub fn with_signer(config: &AppConfig, signer: Arc<dyn PaymentSigner>) -> Self {
        Self {
            appointment_service: AppointmentService::new(config),
            signer,
            merchant_id: config.payment_merchant_id.clone(),
            action_url: config.payment_action_url.clone(),
            return_url: config.payment_return_url.clone(),
        }
    }

    /// Produces a new link on every call. The stored appointment is left
    /// untouched.
    pub async fn build_payment_link(
        &self,
        session: Option<&User>,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<PaymentLink, PaymentError> {
        let user = session.ok_or(PaymentError::Unauthorized)?;

        let appointment = self.appointment_service
            .get_appointment(appointment_id, auth_token)
            .await
            .map_err(|e| match e {
                AppointmentError::NotFound => PaymentError::NotFound,
                other => PaymentError::DatabaseError(other.to_string()),
            })?;

        let doctor_name = appointment.doctor_name().ok_or(PaymentError::NotFound)?;
        let price = appointment.price.ok_or_else(|| {
            PaymentError::InvalidState("Price not set".to_string())
        })?;

        let order_no = generate_order_no();
        let amount = price.to_string();
        let timestamp = payment_timestamp(Utc::now());

        let request = SignatureRequest::new(&self.merchant_id, &order_no, &amount);
        let signature = self.signer.sign(&request).await?.into_signature()?;

        let url = assemble_payment_url(
            &self.action_url,
            &request,
            &signature,
            &format!("Consultation: {}", doctor_name),
            &buyer_from_session(user),
            &timestamp,
            &self.return_url,
        )?;

        info!("Payment link issued for appointment {} (order {})", appointment_id, order_no);
        debug!("Payment redirect: {}", url);

        Ok(PaymentLink { url, order_no, amount, timestamp })
    }
}

pub fn buyer_from_session(user: &User) -> Buyer {
    let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.trim().is_empty());

    Buyer {
        name: non_empty(&user.name).unwrap_or_else(|| GUEST_BUYER_NAME.to_string()),
        email: non_empty(&user.email).unwrap_or_default(),
    }
}

/// Redirect URL with the gateway's parameter names. `PAYMETHOD` and `TYPE`
/// are taken from the signed request.
pub fn assemble_payment_url(
    action_url: &str,
    request: &SignatureRequest,
    signature: &str,
    product_name: &str,
    buyer: &Buyer,
    timestamp: &str,
    return_url: &str,
) -> Result<String, PaymentError> {
    let url = Url::parse_with_params(action_url, &[
        ("CPID", request.merchant_id.as_str()),
        ("ORDERNO", request.order_no.as_str()),
        ("AMOUNT", request.amount.as_str()),
        ("PRODUCT_NM", product_name),
        ("BUYER_NM", buyer.name.as_str()),
        ("BUYER_EMAIL", buyer.email.as_str()),
        ("TIMESTAMP", timestamp),
        ("SIGNATURE", signature),
        ("PAYMETHOD", request.pay_method.as_str()),
        ("TYPE", request.transaction_type.as_str()),
        ("RETURN_URL", return_url),
    ]).map_err(|e| {
        PaymentError::NotConfigured(format!("Invalid payment action URL '{}': {}", action_url, e))
    })?;

    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use shared_utils::test_utils::TestUser;

    fn params(url: &str) -> HashMap<String, String> {
        Url::parse(url).unwrap().query_pairs().into_owned().collect()
    }

    #[test]
    fn url_carries_every_gateway_parameter() {
        let request = SignatureRequest::new("CP001", "ORD-1-7", "30000");
        let buyer = Buyer { name: "Kim Minji".to_string(), email: "minji@example.com".to_string() };

        let url = assemble_payment_url(
            "https://pay.example.com/card/pay",
            &request,
            "c2lnbmF0dXJl+/=",
            "Consultation: Dr. Lee",
            &buyer,
            "1700000000",
            "http://localhost:3000/api/payment/callback",
        ).unwrap();

        assert!(url.starts_with("https://pay.example.com/card/pay?CPID=CP001&ORDERNO=ORD-1-7&AMOUNT=30000&PRODUCT_NM="));

        let params = params(&url);
        assert_eq!(params.len(), 11);
        assert_eq!(params["PRODUCT_NM"], "Consultation: Dr. Lee");
        assert_eq!(params["BUYER_NM"], "Kim Minji");
        assert_eq!(params["SIGNATURE"], "c2lnbmF0dXJl+/=");
        assert_eq!(params["PAYMETHOD"], "CARD");
        assert_eq!(params["TYPE"], "P");
        assert_eq!(params["RETURN_URL"], "http://localhost:3000/api/payment/callback");
    }

    #[test]
    fn anonymous_buyer_fields() {
        let mut user = TestUser::patient("").to_user();
        user.email = None;

        let buyer = buyer_from_session(&user);
        assert_eq!(buyer.name, "Guest");
        assert_eq!(buyer.email, "");

        let user = TestUser::patient("a@example.com").with_name("Park Jisoo").to_user();
        let buyer = buyer_from_session(&user);
        assert_eq!(buyer.name, "Park Jisoo");
        assert_eq!(buyer.email, "a@example.com");
    }

    #[test]
    fn unparsable_action_url_is_a_configuration_error() {
        let request = SignatureRequest::new("CP001", "ORD-1-7", "30000");
        let buyer = Buyer { name: "Guest".to_string(), email: String::new() };

        let result = assemble_payment_url("", &request, "sig", "Consultation: Dr. Lee", &buyer, "0", "");
        assert!(matches!(result, Err(PaymentError::NotConfigured(_))));
    }
}
