use super::models::{Event, EventDraft, MonthKey};
use super::EventRemote;
use crate::error::{remote_error, CalResult};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Process-local event store with locally generated ids.
///
/// Backs the `memory` backend and serves as the reference store in tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventRemote {
    events: Arc<Mutex<Vec<Event>>>,
}

impl InMemoryEventRemote {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store preloaded with events
    pub fn with_events(events: Vec<Event>) -> Self {
        Self {
            events: Arc::new(Mutex::new(events)),
        }
    }

    /// Copy of everything currently stored
    pub async fn snapshot(&self) -> Vec<Event> {
        self.events.lock().await.clone()
    }
}

fn not_found(id: &str) -> crate::error::Error {
    remote_error(404, &format!("Event {} not found", id))
}

#[async_trait]
impl EventRemote for InMemoryEventRemote {
    async fn get_by_month(&self, key: MonthKey) -> CalResult<Vec<Event>> {
        let events = self.events.lock().await;
        Ok(events
            .iter()
            .filter(|e| key.contains(e.date))
            .cloned()
            .collect())
    }

    async fn get_all(&self) -> CalResult<Vec<Event>> {
        Ok(self.events.lock().await.clone())
    }

    async fn get_by_id(&self, id: &str) -> CalResult<Event> {
        let events = self.events.lock().await;
        events
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn create(&self, draft: EventDraft) -> CalResult<Event> {
        let event = Event::from_draft(uuid::Uuid::new_v4().to_string(), draft);
        debug!("Storing event {} in memory", event.id);
        self.events.lock().await.push(event.clone());
        Ok(event)
    }

    async fn update(&self, event: Event) -> CalResult<Event> {
        let mut events = self.events.lock().await;
        let slot = events
            .iter_mut()
            .find(|e| e.id == event.id)
            .ok_or_else(|| not_found(&event.id))?;
        *slot = event.clone();
        Ok(event)
    }

    async fn delete(&self, id: &str) -> CalResult<()> {
        let mut events = self.events.lock().await;
        let before = events.len();
        events.retain(|e| e.id != id);
        if events.len() == before {
            return Err(not_found(id));
        }
        Ok(())
    }
}
