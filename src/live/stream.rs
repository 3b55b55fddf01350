//! Server-sent-events rendering of a live session.
//!
//! A stream emits exactly two frames: a connected acknowledgement as soon as it
//! opens, then either the result or a timeout notice. The HTTP layer forwards
//! whatever lands in the sink and ends the response when the sink's sender is
//! dropped.

use super::session::{LiveSession, SessionOutcome};
use crate::model::AsyncResult;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{error, instrument};

#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    Connected,
    Result(AsyncResult),
    TimedOut,
}

impl StreamFrame {
    /// Encodes the frame as `data: <json>\n\n`.
    pub fn to_sse(&self) -> serde_json::Result<String> {
        let payload = match self {
            StreamFrame::Connected => json!({"status": "connected"}).to_string(),
            StreamFrame::TimedOut => json!({"status": "timed_out"}).to_string(),
            StreamFrame::Result(result) => serde_json::to_string(result)?,
        };
        Ok(format!("data: {payload}\n\n"))
    }
}

/// Drives `session` to completion, writing frames into `sink`.
///
/// The receiver side of `sink` going away is treated as the client
/// disconnecting.
#[instrument(skip_all, fields(identity = %session.identity()))]
pub async fn drive(session: LiveSession, sink: mpsc::Sender<String>) -> SessionOutcome {
    if !emit(&sink, &StreamFrame::Connected).await {
        return SessionOutcome::Disconnected;
    }

    let outcome = session.wait(sink.closed()).await;

    match &outcome {
        SessionOutcome::Delivered(result) => {
            emit(&sink, &StreamFrame::Result(result.clone())).await;
        }
        SessionOutcome::TimedOut => {
            emit(&sink, &StreamFrame::TimedOut).await;
        }
        _ => {}
    }
    outcome
}

async fn emit(sink: &mpsc::Sender<String>, frame: &StreamFrame) -> bool {
    let encoded = match frame.to_sse() {
        Ok(encoded) => encoded,
        Err(e) => {
            error!(error = %e, "Failed to encode stream frame");
            return false;
        }
    };
    sink.send(encoded).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::LiveRegistry;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stream_emits_connected_then_result() {
        let registry = LiveRegistry::new(None);
        let session = registry.open("alice");
        let (sink, mut frames) = mpsc::channel(4);
        let stream = tokio::spawn(drive(session, sink));

        assert_eq!(
            frames.recv().await.unwrap(),
            "data: {\"status\":\"connected\"}\n\n"
        );

        registry.push("alice", AsyncResult::declined("r1", "age"));
        let frame = frames.recv().await.unwrap();
        assert!(frame.starts_with("data: {"));
        assert!(frame.contains("\"request_uuid\":\"r1\""));
        assert!(frame.ends_with("\n\n"));

        assert!(matches!(
            stream.await.unwrap(),
            SessionOutcome::Delivered(_)
        ));
        assert_eq!(frames.recv().await, None);
    }

    #[tokio::test]
    async fn test_dropped_receiver_disconnects() {
        let registry = LiveRegistry::new(None);
        let session = registry.open("bob");
        let (sink, mut frames) = mpsc::channel(4);
        let stream = tokio::spawn(drive(session, sink));

        frames.recv().await.unwrap();
        drop(frames);

        assert_eq!(stream.await.unwrap(), SessionOutcome::Disconnected);
        assert!(!registry.is_connected("bob"));
    }

    #[tokio::test]
    async fn test_timeout_frame() {
        tokio::time::pause();
        let registry = LiveRegistry::new(Some(Duration::from_secs(5)));
        let (sink, mut frames) = mpsc::channel(4);
        let outcome = drive(registry.open("carol"), sink).await;

        assert_eq!(outcome, SessionOutcome::TimedOut);
        frames.recv().await.unwrap();
        assert_eq!(
            frames.recv().await.unwrap(),
            "data: {\"status\":\"timed_out\"}\n\n"
        );
    }
}
