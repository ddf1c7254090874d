use std::env;
use tracing::warn;

pub const DEFAULT_PAYMENT_RETURN_URL: &str = "http://localhost:3000/api/payment/callback";
pub const DEFAULT_SERVER_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub payment_merchant_id: String,
    pub payment_auth_key: String,
    pub payment_action_url: String,
    /// Credential service that signs payment requests. Empty means sign locally.
    pub payment_signer_url: String,
    pub payment_return_url: String,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            payment_merchant_id: env::var("PAYMENT_MERCHANT_ID")
                .unwrap_or_else(|_| {
                    warn!("PAYMENT_MERCHANT_ID not set, using empty value");
                    String::new()
                }),
            payment_auth_key: env::var("PAYMENT_AUTH_KEY")
                .unwrap_or_else(|_| {
                    warn!("PAYMENT_AUTH_KEY not set, using empty value");
                    String::new()
                }),
            payment_action_url: env::var("PAYMENT_ACTION_URL")
                .unwrap_or_else(|_| {
                    warn!("PAYMENT_ACTION_URL not set, using empty value");
                    String::new()
                }),
            payment_signer_url: env::var("PAYMENT_SIGNER_URL")
                .unwrap_or_else(|_| {
                    warn!("PAYMENT_SIGNER_URL not set, payment requests will be signed locally");
                    String::new()
                }),
            payment_return_url: env::var("PAYMENT_RETURN_URL")
                .unwrap_or_else(|_| {
                    warn!("PAYMENT_RETURN_URL not set, using default");
                    DEFAULT_PAYMENT_RETURN_URL.to_string()
                }),
            server_port: env::var("PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(DEFAULT_SERVER_PORT),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        if !config.is_payment_configured() {
            warn!("Payment gateway not configured - payment links will fail");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_payment_configured(&self) -> bool {
        !self.payment_merchant_id.is_empty()
            && !self.payment_action_url.is_empty()
            && (!self.payment_signer_url.is_empty() || !self.payment_auth_key.is_empty())
    }
}
