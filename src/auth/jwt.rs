use crate::{auth::AuthError, now, AppState, Error, Result};
use actix_web::http::header::AUTHORIZATION;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use entity::user;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::{future::Future, pin::Pin};

#[derive(Serialize, Deserialize, Debug)]
pub struct JwtToken {
    // issued at
    pub iat: i64,
    // expiration
    pub exp: i64,
    // data
    pub user_id: i32,
    pub role: String,
}

impl JwtToken {
    pub fn from_str(token: &str, secret: &[u8]) -> Result<Self, AuthError> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        Ok(
            jsonwebtoken::decode::<JwtToken>(
                token,
                &DecodingKey::from_secret(secret),
                &validation,
            )?
            .claims,
        )
    }

    pub fn generate(user: &user::Model, expiry: usize, secret: &[u8]) -> Result<String> {
        let now = now() as i64;
        let payload = JwtToken {
            iat: now,
            exp: now + expiry as i64,
            user_id: user.id,
            role: user.role.as_str().to_owned(),
        };

        Ok(jsonwebtoken::encode(
            &Header::default(),
            &payload,
            &EncodingKey::from_secret(secret),
        )?)
    }
}

/// Caller identified by a bearer token.
/// The role is taken from the stored user, not from the token.
#[derive(Debug)]
pub struct AuthedUser {
    pub user: user::Model,
}

impl AuthedUser {
    pub async fn from_token(token: &str, state: &AppState) -> Result<Self, Error> {
        let token = JwtToken::from_str(token, state.setting.auth.secret.as_bytes())?;
        let user = state
            .service
            .get_user_by_id(token.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        Ok(Self { user })
    }
}

fn bearer(req: &HttpRequest) -> Option<String> {
    let auth = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    if auth.starts_with("bearer ") || auth.starts_with("Bearer ") {
        let token = auth[7..].trim();
        if !token.is_empty() {
            return Some(token.to_owned());
        }
    }
    None
}

impl FromRequest for AuthedUser {
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<AuthedUser>>>>;

    fn from_request(req: &HttpRequest, _pl: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let state = req
                .app_data::<web::Data<AppState>>()
                .ok_or(Error::Str("AppState required"))?;
            match bearer(&req) {
                Some(token) => AuthedUser::from_token(&token, state).await,
                None => Err(AuthError::Invalid("No token, authorization denied").into()),
            }
        })
    }
}

/// Authed user with the admin role.
#[derive(Debug)]
pub struct AdminUser {
    pub user: user::Model,
}

impl TryFrom<AuthedUser> for AdminUser {
    type Error = Error;
    fn try_from(user: AuthedUser) -> Result<Self, Error> {
        if user.user.role == user::Role::Admin {
            Ok(AdminUser { user: user.user })
        } else {
            Err(Error::Forbidden)
        }
    }
}

impl FromRequest for AdminUser {
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<AdminUser>>>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        let fut = AuthedUser::from_request(req, pl);
        Box::pin(async move { AdminUser::try_from(fut.await?) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use std::time::Duration;

    fn user() -> user::Model {
        user::Model {
            id: 1,
            name: "Asha".to_owned(),
            email: "asha@ngo.org".to_owned(),
            password: "".to_owned(),
            phone: None,
            role: user::Role::Admin,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn token() -> anyhow::Result<()> {
        let token = JwtToken::generate(&user(), 3600, b"secret")?;
        let auth = JwtToken::from_str(&token, b"secret")?;
        assert_eq!(auth.user_id, 1);
        assert_eq!(auth.role, "admin");
        assert!(JwtToken::from_str(&token, b"other").is_err());
        // expired
        let token = JwtToken::generate(&user(), 1, b"secret")?;
        tokio::time::sleep(Duration::from_secs(2)).await;
        let res = JwtToken::from_str(&token, b"secret");
        assert!(res.is_err());
        Ok(())
    }

    #[test]
    fn bearer_header() {
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer abc.def"))
            .to_http_request();
        assert_eq!(bearer(&req).as_deref(), Some("abc.def"));
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Basic abc"))
            .to_http_request();
        assert!(bearer(&req).is_none());
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer "))
            .to_http_request();
        assert!(bearer(&req).is_none());
        assert!(bearer(&TestRequest::default().to_http_request()).is_none());
    }

    #[test]
    fn admin() {
        let mut u = user();
        assert!(AdminUser::try_from(AuthedUser { user: u.clone() }).is_ok());
        u.role = user::Role::User;
        assert!(matches!(
            AdminUser::try_from(AuthedUser { user: u }),
            Err(Error::Forbidden)
        ));
    }
}
