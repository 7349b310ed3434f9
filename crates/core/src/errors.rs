use thiserror::Error;

pub const INVENTORY_READ: &str = "inventory read";
pub const INVENTORY_WRITE: &str = "inventory write";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid room type `{0}`")]
    InvalidRoomType(String),
    #[error("invalid date `{0}` (expected YYYY-MM-DD)")]
    InvalidDate(String),
    #[error("booking count must be at least 1, got {0}")]
    InvalidBookingCount(i64),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InventoryError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error("no inventory record for {room_type} on {date}")]
    NotFound { room_type: String, date: String },
    #[error("requested {requested} {room_type} on {date} but only {available} available")]
    InsufficientInventory { room_type: String, date: String, requested: u32, available: u32 },
    #[error("inventory store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: &'static str, after_ms: u64 },
    #[error("booking commit lost {attempts} consecutive write races")]
    Contention { attempts: u32 },
}

impl InventoryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Timeout { .. } | Self::Contention { .. })
    }

    /// A write that timed out may still have been applied by the store.
    pub fn outcome_unknown(&self) -> bool {
        matches!(self, Self::Timeout { operation, .. } if *operation == INVENTORY_WRITE)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("embedding failure: {0}")]
    EmbeddingFailure(String),
    #[error("inventory store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: &'static str, after_ms: u64 },
}

impl SearchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{DomainError, InventoryError, SearchError, INVENTORY_READ, INVENTORY_WRITE};

    #[test]
    fn domain_error_converts_into_inventory_error() {
        let error = InventoryError::from(DomainError::InvalidBookingCount(0));
        assert!(matches!(error, InventoryError::Invalid(DomainError::InvalidBookingCount(0))));
        assert!(!error.is_transient());
    }

    #[test]
    fn not_found_and_unavailable_are_distinguishable() {
        let not_found =
            InventoryError::NotFound { room_type: "suite".to_owned(), date: "2025-04-12".to_owned() };
        let unavailable = InventoryError::StoreUnavailable("database is locked".to_owned());

        assert_ne!(not_found, unavailable);
        assert!(!not_found.is_transient());
        assert!(unavailable.is_transient());
    }

    #[test]
    fn insufficient_inventory_reports_actual_count() {
        let error = InventoryError::InsufficientInventory {
            room_type: "suite".to_owned(),
            date: "2025-04-12".to_owned(),
            requested: 2,
            available: 1,
        };
        assert_eq!(
            error.to_string(),
            "requested 2 suite on 2025-04-12 but only 1 available"
        );
    }

    #[test]
    fn timeouts_are_transient() {
        let error = SearchError::Timeout { operation: "embedding request", after_ms: 30_000 };
        assert!(error.is_transient());
        assert_eq!(error.to_string(), "embedding request timed out after 30000ms");
        assert!(!SearchError::EmbeddingFailure("HTTP 400".to_owned()).is_transient());
    }

    #[test]
    fn only_write_timeouts_leave_the_outcome_unknown() {
        let write = InventoryError::Timeout { operation: INVENTORY_WRITE, after_ms: 50 };
        let read = InventoryError::Timeout { operation: INVENTORY_READ, after_ms: 50 };

        assert!(write.outcome_unknown());
        assert!(!read.outcome_unknown());
        assert!(!InventoryError::Contention { attempts: 8 }.outcome_unknown());
    }
}
