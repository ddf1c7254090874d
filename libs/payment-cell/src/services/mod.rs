pub mod callback;
pub mod link;
pub mod order;
pub mod signer;

pub use callback::PaymentCallbackService;
pub use link::PaymentLinkService;
pub use signer::{HmacSigner, PaymentSigner, RemoteSigner};
