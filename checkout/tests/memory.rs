use anyhow::Result;
use checkout_client::{
    checkout::{PaymentStatus, SessionRequest},
    Checkout, Error, Memory,
};
use std::time::Duration;

fn request(reference: &str) -> SessionRequest {
    SessionRequest {
        reference: reference.to_owned(),
        amount: 50_000,
        currency: "inr".to_owned(),
        description: "Donation: Disaster Relief".to_owned(),
        success_url: format!(
            "http://127.0.0.1:5000/donations/success?donationId={}&session_id={{CHECKOUT_SESSION_ID}}",
            reference
        ),
        cancel_url: format!(
            "http://127.0.0.1:5000/donations/cancel?donationId={}",
            reference
        ),
    }
}

#[tokio::test]
async fn session() -> Result<()> {
    let memory = Memory::new();
    let c: Box<dyn Checkout + Send + Sync> = Box::new(memory.clone());

    let session = c.create_session(request("d1")).await?;
    assert_eq!(session.status, PaymentStatus::Unpaid);
    assert_eq!(session.reference.as_deref(), Some("d1"));
    assert!(session.url.is_some());
    assert_eq!(memory.len(), 1);

    let stored = memory.find_by_reference("d1").unwrap();
    assert!(stored.success_url().ends_with(&session.id));

    let paid = memory.pay(&session.id, Some("tx_1".to_owned()))?;
    assert!(paid.status.is_paid());
    let remote = c.retrieve_session(&session.id).await?;
    assert_eq!(remote.payment_id.as_deref(), Some("tx_1"));
    assert!(remote.status.is_paid());

    assert!(matches!(
        c.retrieve_session("cs_none").await,
        Err(Error::SessionNotFound)
    ));
    Ok(())
}

#[tokio::test]
async fn unavailable() -> Result<()> {
    let memory = Memory::new();
    memory.set_unavailable(true);
    assert!(matches!(
        memory.create_session(request("d2")).await,
        Err(Error::Unavailable)
    ));
    assert!(memory.is_empty());

    memory.set_unavailable(false);
    memory.set_delay(Some(Duration::from_millis(300)));
    let res = tokio::time::timeout(
        Duration::from_millis(50),
        memory.create_session(request("d3")),
    )
    .await;
    assert!(res.is_err());
    Ok(())
}
