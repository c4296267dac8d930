//! account api

use crate::{
    auth::{AuthedUser, JwtToken},
    service::NewUser,
    setting::CARGO_PKG_VERSION,
    AppState, Error,
};
use actix_web::{get, post, web, HttpResponse, Responder};
use entity::user;
use serde::{Deserialize, Serialize};
use serde_json::json;

fn version() -> String {
    CARGO_PKG_VERSION.map(ToOwned::to_owned).unwrap_or_default()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
        .service(info)
        .service(campaigns)
        .service(register)
        .service(login)
        .service(profile);
}

#[get("/")]
pub async fn index() -> impl Responder {
    "Givebox is running!"
}

#[get("/info")]
pub async fn info(state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let checkout = &state.setting.checkout;
    Ok(HttpResponse::Ok().json(json!({
        "version": version(),
        "gateway": state.service.name(),
        "currency": checkout.currency,
        "min_amount": checkout.min_amount,
        "max_amount": checkout.max_amount,
        "campaigns": checkout.campaigns,
    })))
}

#[get("/campaigns")]
pub async fn campaigns(state: web::Data<AppState>) -> impl Responder {
    web::Json(state.setting.checkout.campaigns.clone())
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RegisterReq {
    name: String,
    email: String,
    password: String,
    phone: Option<String>,
}

#[post("/register")]
pub async fn register(
    state: web::Data<AppState>,
    data: web::Json<RegisterReq>,
) -> Result<HttpResponse, Error> {
    let data = data.into_inner();
    state
        .service
        .register(
            NewUser {
                name: data.name,
                email: data.email,
                password: data.password,
                phone: data.phone,
            },
            &state.setting.auth,
        )
        .await?;
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Secure registration successful!"
    })))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoginReq {
    email: String,
    password: String,
}

#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    data: web::Json<LoginReq>,
) -> Result<HttpResponse, Error> {
    if data.email.is_empty() || data.password.is_empty() {
        return Err(Error::InvalidParam(
            "Email and password are required".to_owned(),
        ));
    }
    let user = state.service.login(&data.email, &data.password).await?;
    let token = JwtToken::generate(
        &user,
        state.setting.auth.token_expiry,
        state.setting.auth.secret.as_bytes(),
    )?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Login successful",
        "token": token,
        "user": {
            "name": user.name,
            "role": user.role.as_str(),
        }
    })))
}

/// user without the password hash
#[derive(Debug, Clone, Serialize)]
pub struct UserRes {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: &'static str,
    pub created_at: i64,
}

impl From<user::Model> for UserRes {
    fn from(value: user::Model) -> Self {
        Self {
            id: value.id,
            name: value.name,
            email: value.email,
            phone: value.phone,
            role: value.role.as_str(),
            created_at: value.created_at,
        }
    }
}

/// current user info
#[get("/user/profile")]
pub async fn profile(user: AuthedUser) -> Result<impl Responder, Error> {
    Ok(web::Json(UserRes::from(user.user)))
}
