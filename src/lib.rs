use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::error;
mod admin;
mod api;
mod app;
pub mod auth;
mod donations;
mod service;
pub mod setting;

pub use {
    app::*,
    service::{rand_id, DonationFilter, Initiated, NewUser, Service, Summary},
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Checkout(#[from] checkout_client::Error),
    #[error(transparent)]
    DbErr(#[from] sea_orm::DbErr),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Bcrypt(#[from] bcrypt::BcryptError),
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Auth(#[from] auth::AuthError),
    #[error("{0}")]
    Message(String),
    #[error("{0}")]
    Str(&'static str),
    #[error("{0}")]
    InvalidParam(String),
    #[error("Access denied.")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Payment initiation failed")]
    PaymentInitiation(#[source] checkout_client::Error),
    #[error("Verification error")]
    PaymentVerification(#[source] checkout_client::Error),
}

impl Error {
    /// message safe to show to the caller
    fn public_message(&self) -> String {
        match self {
            Error::InvalidParam(_)
            | Error::Auth(_)
            | Error::Forbidden
            | Error::NotFound(_)
            | Error::PaymentInitiation(_)
            | Error::PaymentVerification(_) => self.to_string(),
            _ => "Internal Server Error".to_owned(),
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidParam(_) => StatusCode::BAD_REQUEST,
            Error::Auth(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Creates full response for error.
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            match self {
                Error::PaymentInitiation(e) | Error::PaymentVerification(e) => {
                    error!(error = e.to_string(), "{}", self)
                }
                _ => error!(error = self.to_string(), "Unexpected error"),
            }
        }
        HttpResponse::build(status).json(json!({
            "error": self.public_message(),
            "status_code": status.as_u16(),
        }))
    }
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status() {
        assert_eq!(
            Error::InvalidParam("x".to_owned()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            Error::Auth(auth::AuthError::Invalid("missing auth token")).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::NotFound("donation").status_code(),
            StatusCode::NOT_FOUND
        );
        let e = Error::PaymentInitiation(checkout_client::Error::Unavailable);
        assert_eq!(e.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.public_message(), "Payment initiation failed");
        let e = Error::Message("select * from users".to_owned());
        assert_eq!(e.public_message(), "Internal Server Error");
    }
}
