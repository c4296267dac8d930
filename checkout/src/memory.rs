//! In-process checkout gateway for development and tests.

use crate::{checkout::*, Error, Result, SESSION_ID_PLACEHOLDER};
use parking_lot::RwLock;
use rand::RngCore;
use std::{collections::HashMap, sync::Arc, time::Duration};

#[derive(Debug, Clone)]
pub struct MemorySession {
    pub session: Session,
    pub request: SessionRequest,
}

impl MemorySession {
    /// success url with the session id filled in, where the payer lands after paying
    pub fn success_url(&self) -> String {
        self.request
            .success_url
            .replace(SESSION_ID_PLACEHOLDER, &self.session.id)
    }
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<String, MemorySession>,
    unavailable: bool,
    delay: Option<Duration>,
}

/// Cloned handles share the same sessions.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    inner: Arc<RwLock<Inner>>,
}

fn rand_id(prefix: &str) -> String {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}_{}", prefix, hex::encode(bytes))
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the session paid, as the processor does once the payer completes checkout.
    pub fn pay(&self, id: &str, payment_id: Option<String>) -> Result<Session> {
        let mut inner = self.inner.write();
        let s = inner.sessions.get_mut(id).ok_or(Error::SessionNotFound)?;
        s.session.status = PaymentStatus::Paid;
        s.session.payment_id = Some(payment_id.unwrap_or_else(|| rand_id("pi_mem")));
        Ok(s.session.clone())
    }

    /// Fail every following request with [`Error::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.write().unavailable = unavailable;
    }

    /// Delay every following request.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.inner.write().delay = delay;
    }

    pub fn session(&self, id: &str) -> Option<MemorySession> {
        self.inner.read().sessions.get(id).cloned()
    }

    pub fn find_by_reference(&self, reference: &str) -> Option<MemorySession> {
        self.inner
            .read()
            .sessions
            .values()
            .find(|s| s.request.reference == reference)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn check(&self) -> Result<()> {
        let (delay, unavailable) = {
            let inner = self.inner.read();
            (inner.delay, inner.unavailable)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if unavailable {
            Err(Error::Unavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl Checkout for Memory {
    async fn create_session(&self, req: SessionRequest) -> Result<Session> {
        self.check().await?;
        if req.amount == 0 {
            return Err(Error::Invalid("amount must be positive".to_owned()));
        }
        let id = rand_id("cs_mem");
        let session = Session {
            id: id.clone(),
            url: Some(format!("memory://checkout/{}", id)),
            reference: Some(req.reference.clone()),
            status: PaymentStatus::Unpaid,
            payment_id: None,
            amount: Some(req.amount),
        };
        self.inner.write().sessions.insert(
            id,
            MemorySession {
                session: session.clone(),
                request: req,
            },
        );
        Ok(session)
    }

    async fn retrieve_session(&self, id: &str) -> Result<Session> {
        self.check().await?;
        self.inner
            .read()
            .sessions
            .get(id)
            .map(|s| s.session.clone())
            .ok_or(Error::SessionNotFound)
    }
}
