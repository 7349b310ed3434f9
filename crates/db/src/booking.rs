//! Availability query and booking commit over an [`InventoryRepository`].
//!
//! A commit is read, decide, then compare-and-set on the version that was
//! read. Commits through one desk queue per key, so they apply one after
//! another. The version check still guards against writers outside this
//! process: losing that race re-reads and re-decides, and `available` never
//! goes below zero.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use concierge_core::booking::{decide, CommitRetryPolicy};
use concierge_core::domain::inventory::{
    BookingReceipt, BookingRequest, InventoryKey, InventoryRecord,
};
use concierge_core::errors::{InventoryError, INVENTORY_READ, INVENTORY_WRITE};

use crate::repositories::{InventoryRepository, RepositoryError};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);
const CONFLICT_BACKOFF_STEP: Duration = Duration::from_millis(5);
const CONFLICT_BACKOFF_CAP: Duration = Duration::from_millis(100);

pub struct BookingDesk<R: ?Sized> {
    repository: Arc<R>,
    policy: CommitRetryPolicy,
    store_timeout: Duration,
    key_locks: Mutex<HashMap<InventoryKey, Arc<Mutex<()>>>>,
}

impl<R: InventoryRepository + ?Sized> BookingDesk<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            policy: CommitRetryPolicy::default(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_policy(mut self, policy: CommitRetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    pub async fn check_availability(
        &self,
        key: &InventoryKey,
    ) -> Result<InventoryRecord, InventoryError> {
        let record = self.bounded(INVENTORY_READ, self.repository.find(key)).await?;
        record.ok_or_else(|| not_found(key))
    }

    pub async fn commit(&self, request: &BookingRequest) -> Result<BookingReceipt, InventoryError> {
        let key_lock = self.key_lock(&request.key).await;
        let _serialized = key_lock.lock().await;
        let max_attempts = self.policy.max_attempts;

        for attempt in 1..=max_attempts {
            let record = self.check_availability(&request.key).await?;

            let plan = match decide(&record, request) {
                Ok(plan) => plan,
                Err(rejection) => {
                    let error = rejection.into_error(request);
                    info!(
                        event_name = "inventory.booking.rejected",
                        key = %request.key,
                        requested = request.count,
                        available = record.available,
                        "booking rejected"
                    );
                    return Err(error);
                }
            };

            // A timed-out write may still have landed; the caller sees Timeout
            // and has to re-check availability.
            let swapped = self
                .bounded(
                    INVENTORY_WRITE,
                    self.repository.compare_and_set_available(
                        &request.key,
                        plan.expected_version,
                        plan.new_available,
                    ),
                )
                .await?;

            if swapped {
                info!(
                    event_name = "inventory.booking.committed",
                    key = %request.key,
                    count = request.count,
                    remaining = plan.new_available,
                    attempt,
                    "booking committed"
                );
                return Ok(BookingReceipt {
                    key: request.key.clone(),
                    count: request.count,
                    remaining: plan.new_available,
                    price: plan.price,
                });
            }

            debug!(
                event_name = "inventory.booking.conflict",
                key = %request.key,
                expected_version = plan.expected_version,
                attempt,
                "booking lost a write race; retrying"
            );
            sleep(conflict_backoff(attempt)).await;
        }

        warn!(
            event_name = "inventory.booking.contention",
            key = %request.key,
            attempts = max_attempts,
            "booking gave up after repeated write races"
        );
        Err(InventoryError::Contention { attempts: max_attempts })
    }

    async fn key_lock(&self, key: &InventoryKey) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().await;
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, InventoryError>
    where
        F: Future<Output = Result<T, RepositoryError>>,
    {
        match timeout(self.store_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(RepositoryError::Invalid(error))) => Err(InventoryError::Invalid(error)),
            Ok(Err(error)) => {
                warn!(
                    event_name = "inventory.store.unavailable",
                    operation,
                    error = %error,
                    "inventory store call failed"
                );
                Err(InventoryError::StoreUnavailable(error.to_string()))
            }
            Err(_) => Err(InventoryError::Timeout {
                operation,
                after_ms: u64::try_from(self.store_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

fn conflict_backoff(attempt: u32) -> Duration {
    CONFLICT_BACKOFF_STEP.saturating_mul(attempt).min(CONFLICT_BACKOFF_CAP)
}

fn not_found(key: &InventoryKey) -> InventoryError {
    InventoryError::NotFound { room_type: key.room_type.to_string(), date: key.date.to_string() }
}
