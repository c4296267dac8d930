mod jwt;
mod password;

pub use jwt::*;
pub use password::*;

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("Token is not valid")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("{0}")]
    Invalid(&'static str),
    #[error("User not found")]
    UserNotFound,
}
