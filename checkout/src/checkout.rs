use crate::Result;
use serde::{Deserialize, Serialize};

/// Parameters of a single hosted payment attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRequest {
    /// correlation id echoed back by the gateway, our donation id
    pub reference: String,
    /// amount in the currency's minor unit
    pub amount: u64,
    pub currency: String,
    pub description: String,
    /// may contain `{CHECKOUT_SESSION_ID}`
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

impl PaymentStatus {
    pub fn is_paid(&self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    /// hosted page the payer is redirected to
    pub url: Option<String>,
    pub reference: Option<String>,
    pub status: PaymentStatus,
    /// processor transaction id once paid
    pub payment_id: Option<String>,
    /// total in minor unit
    pub amount: Option<u64>,
}

/// the checkout trait for multiple backends
#[async_trait::async_trait]
pub trait Checkout {
    async fn create_session(&self, req: SessionRequest) -> Result<Session>;
    async fn retrieve_session(&self, id: &str) -> Result<Session>;
}
