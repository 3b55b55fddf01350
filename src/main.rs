//! Demo of the full card flow.
//!
//! 1. Start the [`RelaySystem`] from the environment.
//! 2. Register a session and a webhook subscriber.
//! 3. Open a live stream for the session.
//! 4. Request a card. An in-process issuer answers unless `ISSUER_URL` is set.
//! 5. Print the stream frames and shut down.

use anyhow::Context;
use card_relay::config::RelayConfig;
use card_relay::dispatcher::{ResultDispatcher, WebhookDisposition};
use card_relay::issuance::{ChannelGateway, HttpIssuerGateway, IssuanceService, IssuerGateway};
use card_relay::lifecycle::{setup_tracing, RelaySystem};
use card_relay::live::stream;
use card_relay::model::{AsyncResult, IdentitySnapshot, IssueRequest, IssuedCard, SessionRecord};
use card_relay::records::MemoryRecordStore;
use card_relay::webhook::HttpTransport;
use chrono::{Months, NaiveDate, Utc};
use rand::Rng;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn, Instrument};

const DEMO_CALLBACK_URL: &str = "http://127.0.0.1:8081/webhook";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = RelayConfig::from_env();
    setup_tracing(config.log_format);

    info!("Starting card relay demo");

    let records = Arc::new(MemoryRecordStore::new());
    let (channel_gateway, issuer_inbox) = ChannelGateway::new(8);
    let gateway: Arc<dyn IssuerGateway> = match &config.issuer_url {
        Some(url) => Arc::new(
            HttpIssuerGateway::new(reqwest::Client::new(), url.clone())
                .with_timeout(config.issuer_timeout),
        ),
        None => Arc::new(channel_gateway),
    };

    let system = RelaySystem::new(
        &config,
        Arc::new(HttpTransport::default()),
        gateway.clone(),
        records.clone(),
    );

    let (reports_tx, mut reports) = mpsc::channel(1);
    if config.issuer_url.is_none() {
        tokio::spawn(run_demo_issuer(
            issuer_inbox,
            system.dispatcher.clone(),
            reports_tx,
        ));
    } else {
        drop(reports_tx);
    }

    // Register the end user and a subscriber
    let session = system
        .sessions
        .register(&SessionRecord::new(
            IdentitySnapshot::new("Ana", "Diaz", "1990-04-02", "CO"),
            "1020304050",
        ))
        .await
        .context("registering session")?;

    let subscriber = system
        .subscribers
        .subscribe("Demo Subscriber", DEMO_CALLBACK_URL)
        .await
        .context("subscribing callback")?;
    info!(callback = DEMO_CALLBACK_URL, "Subscriber registered");

    // Open the live stream before requesting, as a browser tab would
    let (sink, mut frames) = mpsc::channel::<String>(4);
    let stream_task = tokio::spawn(stream::drive(system.live.open(&session), sink));

    let issuance = IssuanceService::new(
        system.sessions.clone(),
        system.correlation.clone(),
        gateway,
        config.subscriber_token.clone().or(Some(subscriber)),
    );

    let span = tracing::info_span!("card_request");
    let request = async {
        info!("Requesting card");
        issuance.request_card(&session, "credit").await
    }
    .instrument(span)
    .await
    .context("requesting card")?;
    info!(request = %request, "Card requested");

    if config.issuer_url.is_some() {
        info!("Request forwarded to the external issuer, results arrive through its callback");
        system.live.close(&session);
    }

    while let Some(frame) = frames.recv().await {
        info!(frame = frame.trim_end(), "Stream frame");
    }
    let outcome = stream_task.await.context("stream task")?;
    info!(?outcome, "Stream ended");

    if let Some(summary) = reports.recv().await {
        info!(%summary, "Dispatch finished");
    }

    info!(
        records = records.len(),
        dead_letters = system.dead_letters().len(),
        "Demo summary"
    );

    system.shutdown().await.context("shutting down")?;
    info!("Application completed successfully");
    Ok(())
}

/// Stand-in for the external issuer: decides, then feeds the result to the
/// dispatcher the way the callback endpoint would.
async fn run_demo_issuer(
    mut inbox: mpsc::Receiver<IssueRequest>,
    dispatcher: ResultDispatcher,
    reports: mpsc::Sender<String>,
) {
    while let Some(request) = inbox.recv().await {
        let span = tracing::info_span!("demo_issuer", request = %request.request_uuid);
        let summary = async {
            let result = decide(&request);
            match dispatcher.dispatch(result).await {
                Ok(report) => {
                    let webhook = match report.webhook {
                        WebhookDisposition::Scheduled(handle) => match handle.await {
                            Ok(delivery) => format!("{delivery:?}"),
                            Err(e) => format!("webhook task failed: {e}"),
                        },
                        other => format!("{other:?}"),
                    };
                    format!("live={:?} webhook={webhook}", report.live)
                }
                Err(e) => {
                    warn!(error = %e, "Dispatch rejected");
                    format!("rejected: {e}")
                }
            }
        }
        .instrument(span)
        .await;

        if reports.send(summary).await.is_err() {
            break;
        }
    }
}

fn decide(request: &IssueRequest) -> AsyncResult {
    let min_age = match request.country_code.as_str() {
        "US" => 18,
        "CO" => 14,
        "DE" => 16,
        _ => return declined(request, "Country not eligible"),
    };
    let Ok(birth) = NaiveDate::parse_from_str(&request.birth_date, "%Y-%m-%d") else {
        return declined(request, "Invalid birth date");
    };
    let today = Utc::now().date_naive();
    if today.years_since(birth).unwrap_or(0) < min_age {
        return declined(request, "User not eligible due to age");
    }

    let mut rng = rand::thread_rng();
    let pan: String = std::iter::once('4')
        .chain((0..15).map(|_| char::from(b'0' + rng.gen_range(0..10))))
        .collect();
    let expiry = today
        .checked_add_months(Months::new(48))
        .unwrap_or(today)
        .format("%Y-%m-%d")
        .to_string();
    let card = IssuedCard {
        pan,
        cvv: format!("{:03}", rng.gen_range(0..1000)),
        expiry_date: expiry,
        card_type: request.card_type.clone(),
    };
    echo(request, AsyncResult::issued(&request.request_uuid, card))
}

fn declined(request: &IssueRequest, reason: &str) -> AsyncResult {
    echo(request, AsyncResult::declined(&request.request_uuid, reason))
}

fn echo(request: &IssueRequest, mut result: AsyncResult) -> AsyncResult {
    if !request.suscriptor_token.is_empty() {
        result = result.with_subscriber(&request.suscriptor_token);
    }
    if let Some(session) = &request.session_token {
        result = result.with_session(session);
    }
    result
}
