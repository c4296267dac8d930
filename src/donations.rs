//! donation api

use crate::{auth::AuthedUser, AppState, Error, Result};
use actix_web::{get, http::header::LOCATION, post, web, HttpResponse, Responder};
use entity::donation;
use serde::{Deserialize, Serialize};
use serde_aux::prelude::deserialize_number_from_string;
use serde_json::json;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/donations")
            .service(create)
            .service(success)
            .service(cancel)
            .service(my),
    );
}

fn redirect(url: String) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((LOCATION, url))
        .finish()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CreateReq {
    campaign: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    amount: i64,
}

#[post("")]
pub async fn create(
    state: web::Data<AppState>,
    user: AuthedUser,
    data: web::Json<CreateReq>,
) -> Result<HttpResponse, Error> {
    let initiated = state
        .service
        .initiate(
            user.user.id,
            &data.campaign,
            data.amount,
            &state.setting.site(),
        )
        .await?;
    Ok(HttpResponse::Created().json(json!({
        "id": initiated.donation.id,
        "payment_url": initiated.payment_url,
    })))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CallbackReq {
    #[serde(rename = "donationId")]
    donation_id: String,
    session_id: String,
}

/// checkout success redirect, never trusted without asking the gateway
#[get("/success")]
pub async fn success(
    state: web::Data<AppState>,
    query: web::Query<CallbackReq>,
) -> Result<HttpResponse, Error> {
    if query.donation_id.is_empty() {
        return Err(Error::InvalidParam("donationId is required".to_owned()));
    }
    let donation = state
        .service
        .confirm_success(&query.donation_id, &query.session_id)
        .await?;
    let frontend = &state.setting.frontend;
    Ok(match donation.status {
        donation::Status::Success => redirect(frontend.success(&donation.id)),
        _ => redirect(frontend.failed()),
    })
}

#[get("/cancel")]
pub async fn cancel(
    state: web::Data<AppState>,
    query: web::Query<CallbackReq>,
) -> Result<HttpResponse, Error> {
    if query.donation_id.is_empty() {
        return Err(Error::InvalidParam("donationId is required".to_owned()));
    }
    state.service.confirm_cancel(&query.donation_id).await?;
    Ok(redirect(state.setting.frontend.failed()))
}

#[derive(Debug, Clone, Serialize)]
pub struct DonationRes {
    pub id: String,
    pub transaction_id: Option<String>,
    pub campaign: String,
    pub amount: i64,
    pub date: i64,
    pub status: &'static str,
    pub r#type: &'static str,
}

impl From<donation::Model> for DonationRes {
    fn from(value: donation::Model) -> Self {
        Self {
            id: value.id,
            transaction_id: value.payment_id,
            campaign: value.campaign,
            amount: value.amount,
            date: value.created_at,
            status: value.status.as_str(),
            r#type: "MONEY",
        }
    }
}

/// donation history of the current user, newest first
#[get("/my")]
pub async fn my(state: web::Data<AppState>, user: AuthedUser) -> Result<impl Responder, Error> {
    let list = state
        .service
        .list_by_user(user.user.id)
        .await?
        .into_iter()
        .map(DonationRes::from)
        .collect::<Vec<_>>();
    Ok(web::Json(list))
}
