//! The concierge's tool surface.
//!
//! Tool names keep the `<Plugin>-<function>` shape models were prompted with,
//! so recorded evaluation datasets stay comparable across runs.

pub mod booking;
pub mod dining;
pub mod room_search;
pub mod time;

use std::sync::Arc;

use concierge_core::search::Embedder;
use concierge_db::{BookingDesk, InMemoryInventoryRepository, InventoryRepository};

use crate::embedding::HashingEmbedder;
use crate::tools::{ToolDefinition, ToolRegistry};

pub use booking::{CheckAvailabilityTool, ConfirmBookingTool, SharedDesk};
pub use dining::{ItemPriceTool, ReserveTableTool, SpecialsTool};
pub use room_search::RoomSearchTool;
pub use time::{Clock, FixedClock, RelativeDateTool, SystemClock, TodayTool};

pub struct ConciergeSkills {
    pub desk: SharedDesk,
    pub embedder: Arc<dyn Embedder>,
    pub clock: Arc<dyn Clock>,
    pub search_top_k: usize,
}

impl ConciergeSkills {
    pub fn into_registry(self) -> ToolRegistry {
        let repository = Arc::clone(self.desk.repository());
        let store_timeout = self.desk.store_timeout();

        let mut registry = ToolRegistry::default();
        registry.register(CheckAvailabilityTool::new(Arc::clone(&self.desk)));
        registry.register(ConfirmBookingTool::new(self.desk));
        registry.register(SpecialsTool);
        registry.register(ItemPriceTool);
        registry.register(ReserveTableTool);
        registry.register(RoomSearchTool::new(
            repository,
            self.embedder,
            self.search_top_k,
            store_timeout,
        ));
        registry.register(TodayTool::new(Arc::clone(&self.clock)));
        registry.register(RelativeDateTool::new(self.clock));
        registry
    }
}

/// The tool catalog without live dependencies, for judges that only need to
/// know what the concierge could have called.
pub fn catalog() -> Vec<ToolDefinition> {
    let repository: Arc<dyn InventoryRepository> = Arc::new(InMemoryInventoryRepository::default());
    ConciergeSkills {
        desk: Arc::new(BookingDesk::new(repository)),
        embedder: Arc::new(HashingEmbedder::default()),
        clock: Arc::new(SystemClock),
        search_top_k: 1,
    }
    .into_registry()
    .definitions()
}
