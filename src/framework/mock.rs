//! # Mock Store
//!
//! Utilities for testing store-backed components in isolation.
//!
//! | Feature | MockStore | Real StoreActor |
//! |---------|-----------|-----------------|
//! | **State** | None (scripted replies) | Real map with expiry |
//! | **Failure injection** | Easy (`return_err`) | Only by shutting the actor down |
//! | **Use case** | Races, outages, corrupt values | Round trips, TTL behavior |
//!
//! Use [`MockStore`] for the fluent expectation API, or [`create_mock_store`]
//! together with [`expect_get`] / [`expect_set`] to answer requests by hand.

use crate::framework::{SetMode, StoreClient, StoreError, StoreRequest};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};

// =============================================================================
// EXPECTATION BUILDER API
// =============================================================================

/// Represents an expected request to the mock store.
enum Expectation {
    Set {
        key: String,
        response: Result<bool, StoreError>,
    },
    Get {
        key: String,
        response: Result<Option<String>, StoreError>,
    },
    Delete {
        key: String,
        response: Result<bool, StoreError>,
    },
    Keys {
        prefix: String,
        response: Result<Vec<String>, StoreError>,
    },
}

type Expectations = Arc<Mutex<VecDeque<Expectation>>>;

/// A scripted store with expectation tracking.
///
/// Requests must arrive in the order the expectations were declared, and the key
/// (or prefix) must match exactly. Anything else panics the background task, which
/// surfaces in the test as [`StoreError::ActorDropped`] on the caller side.
///
/// # Example
/// ```ignore
/// let mut mock = MockStore::new();
/// mock.expect_get("request:abc").return_ok(None);
/// mock.expect_delete("request:abc").return_err(StoreError::Backend("down".into()));
///
/// let store = mock.client();
/// // Use store in tests...
/// mock.verify(); // Ensures all expectations were met
/// ```
pub struct MockStore {
    client: StoreClient,
    expectations: Expectations,
    _handle: tokio::task::JoinHandle<()>,
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStore {
    /// Creates a new mock store with no expectations.
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::channel::<StoreRequest>(100);
        let expectations: Expectations = Arc::new(Mutex::new(VecDeque::new()));
        let expectations_clone = expectations.clone();

        let handle = tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                let mut exps = expectations_clone.lock().unwrap();
                let expectation = exps.pop_front();
                drop(exps);

                match (request, expectation) {
                    (
                        StoreRequest::Set {
                            key, respond_to, ..
                        },
                        Some(Expectation::Set {
                            key: expected,
                            response,
                        }),
                    ) => {
                        assert_eq!(key, expected, "unexpected key for set");
                        let _ = respond_to.send(response);
                    }
                    (
                        StoreRequest::Get { key, respond_to },
                        Some(Expectation::Get {
                            key: expected,
                            response,
                        }),
                    ) => {
                        assert_eq!(key, expected, "unexpected key for get");
                        let _ = respond_to.send(response);
                    }
                    (
                        StoreRequest::Delete { key, respond_to },
                        Some(Expectation::Delete {
                            key: expected,
                            response,
                        }),
                    ) => {
                        assert_eq!(key, expected, "unexpected key for delete");
                        let _ = respond_to.send(response);
                    }
                    (
                        StoreRequest::Keys { prefix, respond_to },
                        Some(Expectation::Keys {
                            prefix: expected,
                            response,
                        }),
                    ) => {
                        assert_eq!(prefix, expected, "unexpected prefix for keys");
                        let _ = respond_to.send(response);
                    }
                    (StoreRequest::Shutdown { respond_to }, _) => {
                        let _ = respond_to.send(());
                        break;
                    }
                    (request, _) => {
                        panic!("Unexpected request or expectation mismatch: {request:?}");
                    }
                }
            }
        });

        Self {
            client: StoreClient::new(sender),
            expectations,
            _handle: handle,
        }
    }

    /// Returns the client for use in tests.
    pub fn client(&self) -> StoreClient {
        self.client.clone()
    }

    /// Expects a `set` on `key`.
    pub fn expect_set(&mut self, key: impl Into<String>) -> ExpectationBuilder<bool> {
        ExpectationBuilder::new(self.expectations.clone(), key.into(), |key, response| {
            Expectation::Set { key, response }
        })
    }

    /// Expects a `get` on `key`.
    pub fn expect_get(&mut self, key: impl Into<String>) -> ExpectationBuilder<Option<String>> {
        ExpectationBuilder::new(self.expectations.clone(), key.into(), |key, response| {
            Expectation::Get { key, response }
        })
    }

    /// Expects a `delete` on `key`.
    pub fn expect_delete(&mut self, key: impl Into<String>) -> ExpectationBuilder<bool> {
        ExpectationBuilder::new(self.expectations.clone(), key.into(), |key, response| {
            Expectation::Delete { key, response }
        })
    }

    /// Expects a `keys` scan over `prefix`.
    pub fn expect_keys(&mut self, prefix: impl Into<String>) -> ExpectationBuilder<Vec<String>> {
        ExpectationBuilder::new(self.expectations.clone(), prefix.into(), |prefix, response| {
            Expectation::Keys { prefix, response }
        })
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let exps = self.expectations.lock().unwrap();
        if !exps.is_empty() {
            panic!("Not all expectations were met. {} remaining", exps.len());
        }
    }
}

/// Builder that records the reply for one expected request.
pub struct ExpectationBuilder<T> {
    expectations: Expectations,
    key: String,
    make: fn(String, Result<T, StoreError>) -> Expectation,
}

impl<T> ExpectationBuilder<T> {
    fn new(
        expectations: Expectations,
        key: String,
        make: fn(String, Result<T, StoreError>) -> Expectation,
    ) -> Self {
        Self {
            expectations,
            key,
            make,
        }
    }

    /// Sets the expectation to return a successful result.
    pub fn return_ok(self, value: T) {
        let mut exps = self.expectations.lock().unwrap();
        exps.push_back((self.make)(self.key, Ok(value)));
    }

    /// Sets the expectation to return an error.
    pub fn return_err(self, error: StoreError) {
        let mut exps = self.expectations.lock().unwrap();
        exps.push_back((self.make)(self.key, Err(error)));
    }
}

// =============================================================================
// MANUAL HELPERS
// =============================================================================

/// Creates a store client and the receiver its requests land on.
///
/// # Testing Strategy
/// The test holds the receiver and answers each request itself, which lets it
/// pause a component halfway through a multi-step sequence and interleave other
/// work, e.g. deleting a session between a resolver's `keys` and `get` calls.
///
/// **Note**: Consider using [`MockStore`] for a more fluent API.
pub fn create_mock_store(buffer_size: usize) -> (StoreClient, mpsc::Receiver<StoreRequest>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (StoreClient::new(sender), receiver)
}

type Reply<T> = oneshot::Sender<Result<T, StoreError>>;

/// Helper to verify that the next message is a Set request.
pub async fn expect_set(
    receiver: &mut mpsc::Receiver<StoreRequest>,
) -> Option<(String, String, SetMode, Reply<bool>)> {
    match receiver.recv().await {
        Some(StoreRequest::Set {
            key,
            value,
            mode,
            respond_to,
            ..
        }) => Some((key, value, mode, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next message is a Get request.
pub async fn expect_get(
    receiver: &mut mpsc::Receiver<StoreRequest>,
) -> Option<(String, Reply<Option<String>>)> {
    match receiver.recv().await {
        Some(StoreRequest::Get { key, respond_to }) => Some((key, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next message is a Keys request.
pub async fn expect_keys(
    receiver: &mut mpsc::Receiver<StoreRequest>,
) -> Option<(String, Reply<Vec<String>>)> {
    match receiver.recv().await {
        Some(StoreRequest::Keys { prefix, respond_to }) => Some((prefix, respond_to)),
        _ => None,
    }
}
