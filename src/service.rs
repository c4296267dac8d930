use crate::{auth, now, setting, Error, Result};
use checkout_client::{checkout::SessionRequest, Checkout, SESSION_ID_PLACEHOLDER};
use entity::{donation, user};
use rand::RngCore;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DbConn, EntityTrait, NotSet, QueryFilter,
    QueryOrder, Set, SqlErr,
};
use serde::Serialize;
use std::{
    collections::HashSet,
    future::Future,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

const CAMPAIGN_MAX_CHARS: usize = 100;
const NAME_MAX_CHARS: usize = 100;
const EMAIL_MAX_CHARS: usize = 255;
const PHONE_MAX_CHARS: usize = 30;
const PASSWORD_MIN_CHARS: usize = 6;

/// opaque donation id
pub fn rand_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Result of a successful donation initiation.
#[derive(Debug, Clone)]
pub struct Initiated {
    pub donation: donation::Model,
    /// hosted checkout page
    pub payment_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct DonationFilter {
    pub campaign: Option<String>,
    pub status: Option<donation::Status>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// sum of successful donations
    pub total_amount: i64,
    /// distinct users with at least one donation
    pub total_donors: usize,
    pub success: u64,
    pub pending: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

/// Donation service
pub struct Service {
    checkout: Box<dyn Checkout + Sync + Send>,
    conn: DbConn,
    name: String,
    setting: setting::Checkout,
    sweeping: AtomicBool,
}

impl Service {
    pub fn new(
        name: String,
        checkout: Box<dyn Checkout + Sync + Send>,
        conn: DbConn,
        setting: setting::Checkout,
    ) -> Self {
        Self {
            name,
            checkout,
            conn,
            setting,
            sweeping: AtomicBool::new(false),
        }
    }

    /// gateway name
    pub fn name(&self) -> &String {
        &self.name
    }

    pub fn db(&self) -> &DbConn {
        &self.conn
    }

    pub fn setting(&self) -> &setting::Checkout {
        &self.setting
    }

    async fn gateway<T, F>(&self, fut: F) -> checkout_client::Result<T>
    where
        F: Future<Output = checkout_client::Result<T>>,
    {
        match tokio::time::timeout(self.setting.gateway_timeout(), fut).await {
            Ok(res) => res,
            Err(_) => Err(checkout_client::Error::Timeout),
        }
    }

    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<user::Model>> {
        Ok(user::Entity::find_by_id(id).one(self.db()).await?)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<user::Model>> {
        Ok(user::Entity::find()
            .filter(user::Column::Email.eq(normalize_email(email)))
            .one(self.db())
            .await?)
    }

    pub async fn create_user(
        &self,
        name: String,
        email: String,
        password_hash: String,
        phone: Option<String>,
        role: user::Role,
    ) -> Result<user::Model> {
        let time = now() as i64;
        let res = user::ActiveModel {
            id: NotSet,
            name: Set(name),
            email: Set(email),
            password: Set(password_hash),
            phone: Set(phone),
            role: Set(role),
            created_at: Set(time),
            updated_at: Set(time),
        }
        .insert(self.db())
        .await;
        match res {
            Ok(user) => Ok(user),
            Err(e) => match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    Err(Error::InvalidParam("Email already in use".to_owned()))
                }
                _ => Err(e.into()),
            },
        }
    }

    /// Create an account with role `user`, or `admin` for emails in the admin list.
    pub async fn register(&self, data: NewUser, auth: &setting::Auth) -> Result<user::Model> {
        let data = validate_user(data)?;
        if self.get_user_by_email(&data.email).await?.is_some() {
            return Err(Error::InvalidParam("User already exists".to_owned()));
        }
        let cost = auth.bcrypt_cost;
        let password = data.password;
        let hash =
            tokio::task::spawn_blocking(move || auth::hash_password(&password, cost)).await??;
        let role = if auth.is_admin(&data.email) {
            user::Role::Admin
        } else {
            user::Role::User
        };
        let user = self
            .create_user(data.name, data.email, hash, data.phone, role)
            .await?;
        info!(user = user.id, role = user.role.as_str(), "register user");
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<user::Model> {
        let invalid = || Error::InvalidParam("Invalid email or password".to_owned());
        let user = self.get_user_by_email(email).await?.ok_or_else(invalid)?;
        let hash = user.password.clone();
        let password = password.to_owned();
        let matched =
            tokio::task::spawn_blocking(move || auth::verify_password(&password, &hash))
                .await??;
        if matched {
            Ok(user)
        } else {
            Err(invalid())
        }
    }

    /// all users, newest first
    pub async fn list_users(&self) -> Result<Vec<user::Model>> {
        Ok(user::Entity::find()
            .order_by_desc(user::Column::CreatedAt)
            .order_by_desc(user::Column::Id)
            .all(self.db())
            .await?)
    }

    pub async fn create_donation(
        &self,
        user_id: i32,
        campaign: String,
        amount: i64,
        created_at: i64,
    ) -> Result<donation::Model> {
        Ok(donation::ActiveModel {
            seq: NotSet,
            id: Set(rand_id()),
            user_id: Set(user_id),
            campaign: Set(campaign),
            amount: Set(amount),
            status: Set(donation::Status::Pending),
            payment_id: Set(None),
            session_id: Set(None),
            created_at: Set(created_at),
            updated_at: Set(created_at),
        }
        .insert(self.db())
        .await?)
    }

    pub async fn get_donation(&self, id: &str) -> Result<Option<donation::Model>> {
        Ok(donation::Entity::find()
            .filter(donation::Column::Id.eq(id))
            .one(self.db())
            .await?)
    }

    /// Move a pending donation to a terminal status.
    ///
    /// `payment_id` is required for `Success` and dropped otherwise.
    /// Returns false when the donation was not pending, which leaves it untouched.
    pub async fn update_status(
        &self,
        id: &str,
        status: donation::Status,
        payment_id: Option<String>,
    ) -> Result<bool> {
        let payment_id = match status {
            donation::Status::Pending => {
                return Err(Error::Str("Can't move a donation back to pending"))
            }
            donation::Status::Success => Some(
                payment_id
                    .filter(|p| !p.is_empty())
                    .ok_or(Error::Str("A successful donation needs a payment id"))?,
            ),
            donation::Status::Failed => None,
        };
        let res = donation::Entity::update_many()
            .set(donation::ActiveModel {
                status: Set(status),
                payment_id: Set(payment_id),
                updated_at: Set(now() as i64),
                ..Default::default()
            })
            .filter(donation::Column::Id.eq(id))
            .filter(donation::Column::Status.eq(donation::Status::Pending))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected == 1)
    }

    /// Fail every pending donation matching `condition` in a single statement.
    pub async fn update_many_status(
        &self,
        condition: Condition,
        status: donation::Status,
    ) -> Result<u64> {
        if status != donation::Status::Failed {
            return Err(Error::Str("Only FAILED can be applied in bulk"));
        }
        let res = donation::Entity::update_many()
            .set(donation::ActiveModel {
                status: Set(status),
                updated_at: Set(now() as i64),
                ..Default::default()
            })
            .filter(donation::Column::Status.eq(donation::Status::Pending))
            .filter(condition)
            .exec(self.db())
            .await?;
        Ok(res.rows_affected)
    }

    /// donations of the user, newest first
    pub async fn list_by_user(&self, user_id: i32) -> Result<Vec<donation::Model>> {
        Ok(donation::Entity::find()
            .filter(donation::Column::UserId.eq(user_id))
            .order_by_desc(donation::Column::CreatedAt)
            .order_by_desc(donation::Column::Seq)
            .all(self.db())
            .await?)
    }

    /// all donations with their donor, newest first
    pub async fn list_all(
        &self,
        filter: &DonationFilter,
    ) -> Result<Vec<(donation::Model, Option<user::Model>)>> {
        let mut query = donation::Entity::find().find_also_related(user::Entity);
        if let Some(campaign) = &filter.campaign {
            query = query.filter(donation::Column::Campaign.eq(campaign.clone()));
        }
        if let Some(status) = filter.status {
            query = query.filter(donation::Column::Status.eq(status));
        }
        Ok(query
            .order_by_desc(donation::Column::CreatedAt)
            .order_by_desc(donation::Column::Seq)
            .all(self.db())
            .await?)
    }

    pub async fn summary(&self, campaign: Option<&str>) -> Result<Summary> {
        let mut query = donation::Entity::find();
        if let Some(campaign) = campaign {
            query = query.filter(donation::Column::Campaign.eq(campaign));
        }
        let list = query.all(self.db()).await?;
        let mut summary = Summary::default();
        let mut donors = HashSet::new();
        for d in list.iter() {
            donors.insert(d.user_id);
            match d.status {
                donation::Status::Pending => summary.pending += 1,
                donation::Status::Success => {
                    summary.success += 1;
                    summary.total_amount += d.amount;
                }
                donation::Status::Failed => summary.failed += 1,
            }
        }
        summary.total_donors = donors.len();
        Ok(summary)
    }

    /// Create a pending donation and a hosted checkout session for it.
    ///
    /// `site` is the public base url the gateway redirects back to.
    pub async fn initiate(
        &self,
        user_id: i32,
        campaign: &str,
        amount: i64,
        site: &str,
    ) -> Result<Initiated> {
        let campaign = validate_donation(&self.setting, campaign, amount)?;
        let minor = (amount as u64)
            .checked_mul(self.setting.minor_unit)
            .ok_or_else(|| Error::InvalidParam("Amount is too large".to_owned()))?;

        let mut donation = self
            .create_donation(user_id, campaign, amount, now() as i64)
            .await?;

        let req = SessionRequest {
            reference: donation.id.clone(),
            amount: minor,
            currency: self.setting.currency.clone(),
            description: format!("Donation: {}", donation.campaign),
            success_url: format!(
                "{}/donations/success?donationId={}&session_id={}",
                site, donation.id, SESSION_ID_PLACEHOLDER
            ),
            cancel_url: format!("{}/donations/cancel?donationId={}", site, donation.id),
        };

        let session = self
            .gateway(self.checkout.create_session(req))
            .await
            .and_then(|s| match s.url.clone() {
                Some(url) => Ok((s, url)),
                None => Err(checkout_client::Error::Message(
                    "checkout session without url".to_owned(),
                )),
            });
        let (session, payment_url) = match session {
            Ok(s) => s,
            Err(e) => {
                // the sweep resolves it if this also fails
                if let Err(err) = self
                    .update_status(&donation.id, donation::Status::Failed, None)
                    .await
                {
                    warn!(
                        donation = donation.id,
                        error = err.to_string(),
                        "failed to fail donation after checkout error"
                    );
                }
                return Err(Error::PaymentInitiation(e));
            }
        };

        donation::Entity::update_many()
            .set(donation::ActiveModel {
                session_id: Set(Some(session.id.clone())),
                ..Default::default()
            })
            .filter(donation::Column::Id.eq(donation.id.clone()))
            .filter(donation::Column::Status.eq(donation::Status::Pending))
            .exec(self.db())
            .await?;
        donation.session_id = Some(session.id);

        info!(
            donation = donation.id,
            user = user_id,
            amount = amount,
            "initiate donation"
        );
        Ok(Initiated {
            donation,
            payment_url,
        })
    }

    /// Verify the checkout session with the gateway and settle the donation.
    ///
    /// Terminal donations are returned unchanged.
    pub async fn confirm_success(
        &self,
        donation_id: &str,
        session_id: &str,
    ) -> Result<donation::Model> {
        let donation = self
            .get_donation(donation_id)
            .await?
            .ok_or(Error::NotFound("Donation"))?;
        if donation.status.is_terminal() {
            debug!(donation = donation.id, "donation already settled");
            return Ok(donation);
        }
        if session_id.is_empty() {
            return Err(Error::InvalidParam("session_id is required".to_owned()));
        }
        if let Some(recorded) = &donation.session_id {
            if recorded != session_id {
                return Err(Error::InvalidParam(
                    "Session does not belong to the donation".to_owned(),
                ));
            }
        }

        // a gateway outage leaves the donation pending
        let session = self
            .gateway(self.checkout.retrieve_session(session_id))
            .await
            .map_err(Error::PaymentVerification)?;

        if session.reference.as_deref() != Some(donation.id.as_str()) {
            return Err(Error::InvalidParam(
                "Session does not belong to the donation".to_owned(),
            ));
        }

        if session.status.is_paid() {
            let payment_id = session
                .payment_id
                .filter(|p| !p.is_empty())
                .unwrap_or(session.id);
            if self
                .update_status(&donation.id, donation::Status::Success, Some(payment_id))
                .await?
            {
                info!(donation = donation.id, "donation succeeded");
            }
        } else if self
            .update_status(&donation.id, donation::Status::Failed, None)
            .await?
        {
            info!(
                donation = donation.id,
                status = ?session.status,
                "donation not paid"
            );
        }

        self.get_donation(&donation.id)
            .await?
            .ok_or(Error::NotFound("Donation"))
    }

    /// The payer backed out of checkout.
    pub async fn confirm_cancel(&self, donation_id: &str) -> Result<donation::Model> {
        let donation = self
            .get_donation(donation_id)
            .await?
            .ok_or(Error::NotFound("Donation"))?;
        if donation.status.is_terminal() {
            return Ok(donation);
        }
        if self
            .update_status(&donation.id, donation::Status::Failed, None)
            .await?
        {
            info!(donation = donation.id, "donation canceled");
        }
        self.get_donation(&donation.id)
            .await?
            .ok_or(Error::NotFound("Donation"))
    }

    /// Fail donations still pending `abandon_after` seconds before `now`.
    pub async fn sweep_abandoned(&self, now: u64) -> Result<u64> {
        let threshold = now as i64 - self.setting.abandon_after as i64;
        self.update_many_status(
            Condition::all().add(donation::Column::CreatedAt.lt(threshold)),
            donation::Status::Failed,
        )
        .await
    }

    /// Run the abandoned donation sweep every `interval`, forever.
    /// Only one sweep loop runs per service.
    pub async fn sweep(&self, interval: Duration) {
        if self.sweeping.swap(true, Ordering::SeqCst) {
            warn!("abandoned donation sweep already running");
            return;
        }
        let _guard = SweepGuard(&self.sweeping);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.sweep_abandoned(now()).await {
                Ok(0) => debug!("no abandoned donations"),
                Ok(count) => info!(count = count, "failed abandoned donations"),
                Err(e) => error!(error = e.to_string(), "sweep abandoned donations"),
            }
        }
    }
}

/// clears the running flag when the sweep loop is dropped
struct SweepGuard<'a>(&'a AtomicBool);

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_user(data: NewUser) -> Result<NewUser> {
    let name = data.name.trim().to_owned();
    let email = normalize_email(&data.email);
    if name.is_empty() || email.is_empty() || data.password.is_empty() {
        return Err(Error::InvalidParam(
            "Name, email and password are required".to_owned(),
        ));
    }
    if !email.contains('@') || email.chars().any(char::is_whitespace) {
        return Err(Error::InvalidParam("Invalid email".to_owned()));
    }
    if name.chars().count() > NAME_MAX_CHARS {
        return Err(Error::InvalidParam(format!(
            "The name cannot be longer than {}",
            NAME_MAX_CHARS
        )));
    }
    if email.chars().count() > EMAIL_MAX_CHARS {
        return Err(Error::InvalidParam(format!(
            "The email cannot be longer than {}",
            EMAIL_MAX_CHARS
        )));
    }
    if data.password.chars().count() < PASSWORD_MIN_CHARS {
        return Err(Error::InvalidParam(format!(
            "The password must be at least {} characters",
            PASSWORD_MIN_CHARS
        )));
    }
    let phone = data
        .phone
        .map(|p| p.trim().to_owned())
        .filter(|p| !p.is_empty());
    if phone
        .as_ref()
        .map_or(false, |p| p.chars().count() > PHONE_MAX_CHARS)
    {
        return Err(Error::InvalidParam(format!(
            "The phone cannot be longer than {}",
            PHONE_MAX_CHARS
        )));
    }
    Ok(NewUser {
        name,
        email,
        password: data.password,
        phone,
    })
}

fn validate_donation(setting: &setting::Checkout, campaign: &str, amount: i64) -> Result<String> {
    let campaign = campaign.trim();
    if campaign.is_empty() {
        return Err(Error::InvalidParam("Please select a campaign".to_owned()));
    }
    if campaign.chars().count() > CAMPAIGN_MAX_CHARS {
        return Err(Error::InvalidParam(format!(
            "The campaign name cannot be longer than {}",
            CAMPAIGN_MAX_CHARS
        )));
    }
    if !setting.campaigns.is_empty() && !setting.campaigns.iter().any(|c| c == campaign) {
        return Err(Error::InvalidParam(format!("Unknown campaign: {}", campaign)));
    }
    if amount <= 0 || amount < setting.min_amount || amount > setting.max_amount {
        return Err(Error::InvalidParam(format!(
            "The amount must be between {} and {}",
            setting.min_amount, setting.max_amount
        )));
    }
    Ok(campaign.to_owned())
}
