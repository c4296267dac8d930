//! Stripe Checkout api, https://stripe.com/docs/api/checkout/sessions

use crate::{checkout::*, Error, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_URL: &str = "https://api.stripe.com";

#[derive(Clone, Debug)]
pub struct Stripe {
    client: Client,
    url: String,
    secret_key: String,
}

impl Stripe {
    pub fn new(url: String, secret_key: String, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout).connect_timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            url: url.trim_end_matches('/').to_owned(),
            secret_key,
        })
    }

    fn sessions_url(&self) -> String {
        format!("{}/v1/checkout/sessions", self.url)
    }
}

#[derive(Deserialize, Debug)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    message: Option<String>,
    code: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StripeSession {
    id: String,
    url: Option<String>,
    client_reference_id: Option<String>,
    payment_status: String,
    payment_intent: Option<String>,
    amount_total: Option<u64>,
}

impl From<StripeSession> for Session {
    fn from(value: StripeSession) -> Self {
        let status = match value.payment_status.as_str() {
            "paid" => PaymentStatus::Paid,
            "no_payment_required" => PaymentStatus::NoPaymentRequired,
            _ => PaymentStatus::Unpaid,
        };
        Self {
            id: value.id,
            url: value.url,
            reference: value.client_reference_id,
            status,
            payment_id: value.payment_intent,
            amount: value.amount_total,
        }
    }
}

fn session_form(req: &SessionRequest) -> Vec<(&'static str, String)> {
    vec![
        ("mode", "payment".to_owned()),
        ("payment_method_types[0]", "card".to_owned()),
        ("client_reference_id", req.reference.clone()),
        ("metadata[donation_id]", req.reference.clone()),
        ("line_items[0][quantity]", "1".to_owned()),
        ("line_items[0][price_data][currency]", req.currency.clone()),
        ("line_items[0][price_data][unit_amount]", req.amount.to_string()),
        (
            "line_items[0][price_data][product_data][name]",
            req.description.clone(),
        ),
        ("success_url", req.success_url.clone()),
        ("cancel_url", req.cancel_url.clone()),
    ]
}

/// session ids end up in the request path
fn valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 255
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

async fn read_session(res: reqwest::Response) -> Result<Session> {
    let status = res.status();
    let body = res.text().await?;
    parse_session(status, &body)
}

/// session from a response status and body, or the api error it describes
fn parse_session(status: StatusCode, body: &str) -> Result<Session> {
    if status.is_success() {
        return Ok(serde_json::from_str::<StripeSession>(body)?.into());
    }
    if status == StatusCode::NOT_FOUND {
        return Err(Error::SessionNotFound);
    }
    let message = serde_json::from_str::<ApiError>(body)
        .ok()
        .and_then(|e| e.error.message.or(e.error.code))
        .unwrap_or_else(|| status.to_string());
    Err(Error::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait::async_trait]
impl Checkout for Stripe {
    async fn create_session(&self, req: SessionRequest) -> Result<Session> {
        if req.amount == 0 {
            return Err(Error::Invalid("amount must be positive".to_owned()));
        }
        let res = self
            .client
            .post(self.sessions_url())
            .bearer_auth(&self.secret_key)
            .form(&session_form(&req))
            .send()
            .await
            .map_err(timeout_or_http)?;
        read_session(res).await
    }

    async fn retrieve_session(&self, id: &str) -> Result<Session> {
        if !valid_session_id(id) {
            return Err(Error::Invalid(format!("session id {:?}", id)));
        }
        let res = self
            .client
            .get(format!("{}/{}", self.sessions_url(), id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(timeout_or_http)?;
        read_session(res).await
    }
}

fn timeout_or_http(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout
    } else {
        Error::Http(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form() {
        let req = SessionRequest {
            reference: "d1".to_owned(),
            amount: 50_000,
            currency: "inr".to_owned(),
            description: "Donation: Disaster Relief".to_owned(),
            success_url: "http://localhost/ok?session_id={CHECKOUT_SESSION_ID}".to_owned(),
            cancel_url: "http://localhost/cancel".to_owned(),
        };
        let form = session_form(&req);
        let get = |k: &str| {
            form.iter()
                .find(|(key, _)| *key == k)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get("line_items[0][price_data][unit_amount]"), "50000");
        assert_eq!(get("client_reference_id"), "d1");
        assert_eq!(get("mode"), "payment");
        assert!(get("success_url").ends_with("{CHECKOUT_SESSION_ID}"));
    }

    #[test]
    fn api_error() {
        let res = parse_session(
            StatusCode::BAD_REQUEST,
            r#"{"error": {"message": "Invalid currency: xyz", "code": "parameter_invalid"}}"#,
        );
        match res {
            Err(Error::Api { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid currency: xyz");
            }
            r => panic!("unexpected {:?}", r),
        }

        // code when there is no message
        let res = parse_session(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error": {"code": "rate_limit"}}"#,
        );
        assert!(matches!(res, Err(Error::Api { status: 429, message }) if message == "rate_limit"));

        // status text for a body that isn't an error envelope
        let res = parse_session(StatusCode::BAD_GATEWAY, "<html>upstream</html>");
        assert!(matches!(res, Err(Error::Api { status: 502, message }) if message.contains("Bad Gateway")));

        let res = parse_session(
            StatusCode::NOT_FOUND,
            r#"{"error": {"message": "No such checkout.session: cs_x"}}"#,
        );
        assert!(matches!(res, Err(Error::SessionNotFound)));

        // success with a body that isn't a session
        let res = parse_session(StatusCode::OK, "{}");
        assert!(matches!(res, Err(Error::Json(_))));
    }

    #[test]
    fn session() -> anyhow::Result<()> {
        let json = r#"{
            "id": "cs_test_a1",
            "object": "checkout.session",
            "url": null,
            "client_reference_id": "d1",
            "payment_status": "paid",
            "payment_intent": "pi_3Nx",
            "amount_total": 50000,
            "status": "complete"
        }"#;
        let session: Session = serde_json::from_str::<StripeSession>(json)?.into();
        assert!(session.status.is_paid());
        assert_eq!(session.payment_id.as_deref(), Some("pi_3Nx"));
        assert_eq!(session.reference.as_deref(), Some("d1"));
        assert_eq!(session.amount, Some(50000));

        let json = r#"{"id": "cs_test_a2", "payment_status": "unpaid", "payment_intent": null}"#;
        let session: Session = serde_json::from_str::<StripeSession>(json)?.into();
        assert_eq!(session.status, PaymentStatus::Unpaid);
        assert!(session.payment_id.is_none());
        Ok(())
    }

    #[test]
    fn session_id() {
        assert!(valid_session_id("cs_test_a1B2"));
        assert!(!valid_session_id(""));
        assert!(!valid_session_id("../charges"));
        assert!(!valid_session_id("cs?expand=x"));
    }
}
