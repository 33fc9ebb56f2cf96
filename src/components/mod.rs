// Export components
pub mod calendar;
pub mod date_grid;
pub mod event_cache;
pub mod event_remote;
pub mod session;

pub use calendar::CalendarController;
pub use date_grid::{DateGrid, DayCell};
pub use event_cache::{CacheState, EventCacheHandle, SelectOutcome, UpdateOutcome};
pub use event_remote::{Event, EventDraft, EventRemote, MonthKey};
pub use session::SessionStore;
