pub mod booking;
pub mod config;
pub mod domain;
pub mod errors;
pub mod search;

pub use booking::{decide, BookingRejection, CommitPlan, CommitRetryPolicy};
pub use domain::inventory::{
    BookingReceipt, BookingRequest, Embedding, InventoryKey, InventoryRecord, NewInventoryRecord,
    RoomMatch, RoomType, StayDate,
};
pub use errors::{DomainError, InventoryError, SearchError};
pub use search::Embedder;
