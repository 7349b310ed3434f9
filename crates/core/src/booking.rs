//! Check-and-compute step of a booking commit.
//!
//! The decision is pure: it never touches storage. Callers turn a
//! [`CommitPlan`] into a conditional write guarded by `expected_version`
//! and re-run the decision against a fresh read when the write loses a race.

use crate::domain::inventory::{BookingRequest, InventoryRecord};
use crate::errors::InventoryError;

pub const DEFAULT_COMMIT_MAX_ATTEMPTS: u32 = 8;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitPlan {
    pub expected_version: i64,
    pub new_available: u32,
    pub price: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BookingRejection {
    InsufficientInventory { available: u32 },
}

impl BookingRejection {
    pub fn into_error(self, request: &BookingRequest) -> InventoryError {
        match self {
            Self::InsufficientInventory { available } => InventoryError::InsufficientInventory {
                room_type: request.key.room_type.to_string(),
                date: request.key.date.to_string(),
                requested: request.count,
                available,
            },
        }
    }
}

pub fn decide(
    record: &InventoryRecord,
    request: &BookingRequest,
) -> Result<CommitPlan, BookingRejection> {
    match record.available.checked_sub(request.count) {
        Some(new_available) => Ok(CommitPlan {
            expected_version: record.version,
            new_available,
            price: record.price.clone(),
        }),
        None => Err(BookingRejection::InsufficientInventory { available: record.available }),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommitRetryPolicy {
    pub max_attempts: u32,
}

impl Default for CommitRetryPolicy {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_COMMIT_MAX_ATTEMPTS }
    }
}

impl CommitRetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts: max_attempts.max(1) }
    }
}

#[cfg(test)]
mod tests {
    use super::{decide, BookingRejection, CommitRetryPolicy};
    use crate::domain::inventory::{BookingRequest, InventoryKey, InventoryRecord};
    use crate::errors::InventoryError;

    fn suite(available: u32, version: i64) -> InventoryRecord {
        let key = InventoryKey::parse("suite", "2025-04-12").expect("key");
        InventoryRecord {
            id: key.record_id(),
            key,
            available,
            price: "$250".to_string(),
            description: "Spacious suite with an ocean view".to_string(),
            version,
        }
    }

    fn request(count: i64) -> BookingRequest {
        let key = InventoryKey::parse("suite", "2025-04-12").expect("key");
        BookingRequest::new(key, count).expect("request")
    }

    #[test]
    fn plan_carries_version_and_price_at_read_time() {
        let plan = decide(&suite(2, 7), &request(1)).expect("plan");
        assert_eq!(plan.expected_version, 7);
        assert_eq!(plan.new_available, 1);
        assert_eq!(plan.price, "$250");
    }

    #[test]
    fn booking_the_last_rooms_drains_to_zero() {
        let plan = decide(&suite(2, 0), &request(2)).expect("plan");
        assert_eq!(plan.new_available, 0);
    }

    #[test]
    fn overbooking_is_rejected_with_actual_count() {
        let rejection = decide(&suite(1, 3), &request(2)).expect_err("rejection");
        assert_eq!(rejection, BookingRejection::InsufficientInventory { available: 1 });

        let error = rejection.into_error(&request(2));
        assert!(matches!(
            error,
            InventoryError::InsufficientInventory { requested: 2, available: 1, .. }
        ));
    }

    #[test]
    fn empty_inventory_rejects_any_request() {
        assert_eq!(
            decide(&suite(0, 0), &request(1)),
            Err(BookingRejection::InsufficientInventory { available: 0 })
        );
    }

    #[test]
    fn retry_policy_allows_at_least_one_attempt() {
        assert_eq!(CommitRetryPolicy::new(0).max_attempts, 1);
        assert_eq!(CommitRetryPolicy::default().max_attempts, 8);
    }
}
