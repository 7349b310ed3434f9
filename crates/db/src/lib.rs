pub mod booking;
pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use booking::BookingDesk;
pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use fixtures::{SeedDataset, SeedError, SeedResult, VerificationResult, SEED_ROOMS};
pub use repositories::{
    InMemoryInventoryRepository, InsertOutcome, InventoryRepository, RepositoryError,
    SqlInventoryRepository,
};
