use card_relay::config::RelayConfig;
use card_relay::dispatcher::WebhookDisposition;
use card_relay::issuance::ChannelGateway;
use card_relay::lifecycle::RelaySystem;
use card_relay::live::{PushOutcome, SessionOutcome};
use card_relay::model::{AsyncResult, IdentitySnapshot, IssuedCard, Outcome, SessionRecord};
use card_relay::records::MemoryRecordStore;
use card_relay::webhook::{DeliveryOutcome, RecordingTransport};
use card_relay::RelayError;
use std::sync::Arc;
use std::time::Duration;

fn ana() -> SessionRecord {
    SessionRecord::new(
        IdentitySnapshot::new("Ana", "Diaz", "1990-04-02", "CO"),
        "1020304050",
    )
}

fn card() -> IssuedCard {
    IssuedCard {
        pan: "4000123412349876".into(),
        cvv: "123".into(),
        expiry_date: "2030-01-31".into(),
        card_type: String::new(),
    }
}

/// Full end-to-end flow with the real store actor, live registry and an
/// in-process issuer. Only the webhook transport is recorded.
#[tokio::test]
async fn test_full_card_flow() {
    let transport = RecordingTransport::new();
    let records = Arc::new(MemoryRecordStore::new());
    let (gateway, mut issuer) = ChannelGateway::new(4);
    let system = RelaySystem::new(
        &RelayConfig::default(),
        Arc::new(transport.clone()),
        Arc::new(gateway),
        records.clone(),
    );

    // Register the end user and a subscriber
    let session = system
        .sessions
        .register(&ana())
        .await
        .expect("Failed to register session");
    let acme = system
        .subscribers
        .subscribe("Acme", "https://acme.example/cb")
        .await
        .expect("Failed to subscribe");

    // The browser tab waits for its result
    let listener = system.live.open(&session);
    let waiting = tokio::spawn(listener.wait(std::future::pending()));

    let request = system
        .issuance
        .request_card(&session, "credit")
        .await
        .expect("Failed to request card");

    // The issuer sees the request and answers, echoing the session token
    let submitted = issuer.recv().await.expect("Issuer got nothing");
    assert_eq!(submitted.request_uuid, request);
    let result = AsyncResult::issued(&submitted.request_uuid, card())
        .with_subscriber(&acme)
        .with_session(submitted.session_token.clone().expect("No session token"));

    let report = system
        .dispatcher
        .dispatch(result)
        .await
        .expect("Dispatch failed");
    assert_eq!(report.identity, session);
    assert_eq!(report.live, PushOutcome::Delivered);
    assert!(report.cleaned_up);
    assert!(report.persistence.is_ok());

    // Exactly one POST to the subscriber, carrying its token
    let WebhookDisposition::Scheduled(handle) = report.webhook else {
        panic!("Webhook was not scheduled");
    };
    assert_eq!(
        handle.await.unwrap(),
        DeliveryOutcome::Delivered { status: 200 }
    );
    let posts = transport.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, "https://acme.example/cb");
    let body = serde_json::to_value(&posts[0].1).unwrap();
    assert_eq!(body["data"]["suscriptor_token"], acme.as_str());
    assert_eq!(body["type"], "card.issued");

    // The listener got the card, with the requested type filled in
    match waiting.await.unwrap() {
        SessionOutcome::Delivered(delivered) => match delivered.outcome {
            Outcome::Issued(card) => assert_eq!(card.card_type, "credit"),
            other => panic!("Expected issued card, got {other:?}"),
        },
        other => panic!("Expected delivery, got {other:?}"),
    }

    // Recorded once and the pending entry is gone
    assert_eq!(records.records_for(&session).len(), 1);
    assert!(system
        .correlation
        .get(&request)
        .await
        .unwrap_err()
        .is_not_found());

    // The same result again is rejected
    let replay = AsyncResult::issued(&request, card()).with_session(&session);
    assert!(system.dispatcher.dispatch(replay).await.unwrap_err().is_not_found());
    assert_eq!(records.len(), 1);

    system.shutdown().await.expect("Shutdown failed");
}

#[tokio::test]
async fn test_declined_without_listener_or_subscriber() {
    let transport = RecordingTransport::new();
    let records = Arc::new(MemoryRecordStore::new());
    let (gateway, mut issuer) = ChannelGateway::new(4);
    let system = RelaySystem::new(
        &RelayConfig::default(),
        Arc::new(transport.clone()),
        Arc::new(gateway),
        records.clone(),
    );

    let session = system.sessions.register(&ana()).await.unwrap();
    system.issuance.request_card(&session, "debit").await.unwrap();
    let submitted = issuer.recv().await.unwrap();

    // This issuer does not echo the session token
    let result = AsyncResult::declined(&submitted.request_uuid, "User not eligible due to age");
    let report = system.dispatcher.dispatch(result).await.unwrap();

    assert_eq!(report.identity, session);
    assert_eq!(report.live, PushOutcome::NoConnection);
    assert!(matches!(report.webhook, WebhookDisposition::NotRequested));
    assert!(transport.posts().is_empty());

    let stored = records.records_for(&session);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].request_token(), submitted.request_uuid);

    system.shutdown().await.unwrap();
}

/// A pending request is gone a day later even if no result ever arrives.
#[tokio::test]
async fn test_pending_request_expires() {
    tokio::time::pause();
    let (gateway, _issuer) = ChannelGateway::new(4);
    let system = RelaySystem::new(
        &RelayConfig::default(),
        Arc::new(RecordingTransport::new()),
        Arc::new(gateway),
        Arc::new(MemoryRecordStore::new()),
    );

    let session = system.sessions.register(&ana()).await.unwrap();
    let request = system.issuance.request_card(&session, "credit").await.unwrap();
    assert!(system.correlation.get(&request).await.is_ok());

    tokio::time::advance(Duration::from_secs(25 * 60 * 60)).await;
    assert!(system
        .correlation
        .get(&request)
        .await
        .unwrap_err()
        .is_not_found());

    let late = AsyncResult::declined(&request, "too late").with_session(&session);
    assert!(system.dispatcher.dispatch(late).await.unwrap_err().is_not_found());

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_second_tab_replaces_first() {
    let (gateway, _issuer) = ChannelGateway::new(4);
    let system = RelaySystem::new(
        &RelayConfig::default(),
        Arc::new(RecordingTransport::new()),
        Arc::new(gateway),
        Arc::new(MemoryRecordStore::new()),
    );

    let first = system.live.open("session-1");
    let second = system.live.open("session-1");
    assert_eq!(system.live.connection_count(), 1);

    assert!(matches!(
        first.wait(std::future::pending()).await,
        SessionOutcome::Replaced
    ));
    assert_eq!(
        system
            .live
            .push("session-1", AsyncResult::declined("r-1", "no")),
        PushOutcome::Delivered
    );
    assert!(matches!(
        second.wait(std::future::pending()).await,
        SessionOutcome::Delivered(result) if result.request_token == "r-1"
    ));

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_releases_listeners_and_store() {
    let (gateway, _issuer) = ChannelGateway::new(4);
    let system = RelaySystem::new(
        &RelayConfig::default(),
        Arc::new(RecordingTransport::new()),
        Arc::new(gateway),
        Arc::new(MemoryRecordStore::new()),
    );

    let session = system.sessions.register(&ana()).await.unwrap();
    let listener = system.live.open(&session);
    let waiting = tokio::spawn(listener.wait(std::future::pending()));
    let sessions = system.sessions.clone();

    system.shutdown().await.expect("Shutdown failed");

    assert!(matches!(waiting.await.unwrap(), SessionOutcome::Closed));
    assert!(matches!(
        sessions.get(&session).await,
        Err(RelayError::StoreUnavailable(_))
    ));
}
