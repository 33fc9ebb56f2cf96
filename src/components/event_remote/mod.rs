mod http;
mod memory;
pub mod models;

pub use http::HttpEventRemote;
pub use memory::InMemoryEventRemote;
pub use models::{Event, EventDraft, MonthKey};

use crate::error::CalResult;
use async_trait::async_trait;

/// Collaborator interface to the remote event store.
///
/// Implementations attach the current session token to every call. An
/// authorization failure invalidates the session as a side effect and is
/// then returned as `Error::Auth`.
#[async_trait]
pub trait EventRemote: Send + Sync {
    /// Events dated inside the given month
    async fn get_by_month(&self, key: MonthKey) -> CalResult<Vec<Event>>;

    /// Every event of the user
    async fn get_all(&self) -> CalResult<Vec<Event>>;

    /// A single event
    async fn get_by_id(&self, id: &str) -> CalResult<Event>;

    /// Store a new event, the store assigns its id
    async fn create(&self, draft: EventDraft) -> CalResult<Event>;

    /// Replace an existing event
    async fn update(&self, event: Event) -> CalResult<Event>;

    /// Remove an event
    async fn delete(&self, id: &str) -> CalResult<()>;
}
