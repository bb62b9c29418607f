pub mod automation;
pub mod conflict;
pub mod continuity;
pub mod conversion;
pub mod quota;
pub mod room_finder;
pub mod scheduler;
pub mod sessions;
pub mod slot_search;
pub mod suggest;

pub use automation::{AutomationService, PublishReport};
pub use conversion::{ConversionReport, ConversionService};
pub use quota::QuotaTracker;
pub use scheduler::AutomationScheduler;
pub use sessions::SessionService;
pub use suggest::{SlotAdvice, SlotAdvisor, SuggestSlotQuery};
