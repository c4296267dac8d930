//! admin api

use crate::{
    api::UserRes, auth::AdminUser, service::DonationFilter, AppState, Error, Result,
};
use actix_web::{get, web, Responder, Scope};
use entity::{donation, user};
use serde::{Deserialize, Serialize};

pub fn scope() -> Scope {
    web::scope("/admin")
        .service(summary)
        .service(donations)
        .service(users)
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct DonationsReq {
    pub campaign: Option<String>,
    pub status: Option<String>,
}

impl DonationsReq {
    fn filter(&self) -> Result<DonationFilter> {
        let status = match &self.status {
            Some(s) if !s.is_empty() && !s.eq_ignore_ascii_case("all") => {
                Some(s.parse::<donation::Status>().map_err(Error::InvalidParam)?)
            }
            _ => None,
        };
        Ok(DonationFilter {
            campaign: self.campaign.clone().filter(|c| !c.is_empty() && c != "All"),
            status,
        })
    }
}

/// donation joined with the donor identity
#[derive(Debug, Clone, Serialize)]
pub struct AdminDonationRes {
    pub id: String,
    pub user: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub campaign: String,
    pub amount: i64,
    pub transaction: Option<String>,
    pub date: i64,
    pub status: &'static str,
}

impl From<(donation::Model, Option<user::Model>)> for AdminDonationRes {
    fn from((d, u): (donation::Model, Option<user::Model>)) -> Self {
        let (user, email, phone) = match u {
            Some(u) => (Some(u.name), Some(u.email), u.phone),
            None => (None, None, None),
        };
        Self {
            id: d.id,
            user,
            email,
            phone,
            campaign: d.campaign,
            amount: d.amount,
            transaction: d.payment_id,
            date: d.created_at,
            status: d.status.as_str(),
        }
    }
}

#[get("/donations")]
pub async fn donations(
    state: web::Data<AppState>,
    _admin: AdminUser,
    query: web::Query<DonationsReq>,
) -> Result<impl Responder, Error> {
    let list = state
        .service
        .list_all(&query.filter()?)
        .await?
        .into_iter()
        .map(AdminDonationRes::from)
        .collect::<Vec<_>>();
    Ok(web::Json(list))
}

#[get("/donations/summary")]
pub async fn summary(
    state: web::Data<AppState>,
    _admin: AdminUser,
    query: web::Query<DonationsReq>,
) -> Result<impl Responder, Error> {
    let filter = query.filter()?;
    let summary = state.service.summary(filter.campaign.as_deref()).await?;
    Ok(web::Json(summary))
}

#[get("/users")]
pub async fn users(
    state: web::Data<AppState>,
    _admin: AdminUser,
) -> Result<impl Responder, Error> {
    let list = state
        .service
        .list_users()
        .await?
        .into_iter()
        .map(UserRes::from)
        .collect::<Vec<_>>();
    Ok(web::Json(list))
}
