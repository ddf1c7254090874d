pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::payment_routes;
pub use services::{
    HmacSigner, PaymentCallbackService, PaymentLinkService, PaymentSigner, RemoteSigner,
};
