#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("checkout api error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("invalid: {0}")]
    Invalid(String),
    #[error("{0}")]
    Message(String),
    #[error("session not found")]
    SessionNotFound,
    #[error("checkout request timed out")]
    Timeout,
    #[error("checkout gateway unavailable")]
    Unavailable,
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

pub mod checkout;
pub use checkout::Checkout;

pub mod stripe;
pub use stripe::Stripe;

pub mod memory;
pub use memory::Memory;

/// Placeholder the gateway replaces with the session id in success urls.
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";
