use super::actor::{CacheCommand, EventCacheActor};
use super::{CacheState, SelectOutcome, UpdateOutcome};
use crate::components::event_remote::{Event, EventDraft, EventRemote, MonthKey};
use crate::error::{component_error, CalResult};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Handle for interacting with the event cache actor
#[derive(Clone)]
pub struct EventCacheHandle {
    command_tx: mpsc::Sender<CacheCommand>,
    _actor_task: Arc<JoinHandle<()>>,
}

impl EventCacheHandle {
    /// Create a new EventCacheHandle and spawn the actor
    pub fn new(remote: Arc<dyn EventRemote>) -> Self {
        let (mut actor, command_tx) = EventCacheActor::new(remote);

        let actor_task = tokio::spawn(async move {
            actor.run().await;
        });

        Self {
            command_tx,
            _actor_task: Arc::new(actor_task),
        }
    }

    /// Make `key` the resident month, fetching it unless it is already loaded.
    ///
    /// Resolves to `Superseded` when another month is selected before the
    /// fetch completes.
    pub async fn select_month(&self, key: MonthKey) -> CalResult<SelectOutcome> {
        self.request(|tx| CacheCommand::SelectMonth(key, tx)).await?
    }

    /// Create an event. Requires a loaded month.
    pub async fn create(&self, draft: EventDraft) -> CalResult<Event> {
        self.request(|tx| CacheCommand::Create(draft, tx)).await?
    }

    /// Update a resident event
    pub async fn update(&self, event: Event) -> CalResult<UpdateOutcome> {
        self.request(|tx| CacheCommand::Update(event, tx)).await?
    }

    /// Delete an event by id
    pub async fn delete(&self, id: &str) -> CalResult<()> {
        let id = id.to_string();
        self.request(|tx| CacheCommand::Delete(id, tx)).await?
    }

    /// Every event of the user, straight from the remote store
    pub async fn list_all(&self) -> CalResult<Vec<Event>> {
        self.request(CacheCommand::ListAll).await?
    }

    /// One event by id, straight from the remote store
    pub async fn get(&self, id: &str) -> CalResult<Event> {
        let id = id.to_string();
        self.request(|tx| CacheCommand::Get(id, tx)).await?
    }

    /// Force the next selection of the resident month to refetch
    pub async fn invalidate(&self) -> CalResult<()> {
        self.send(CacheCommand::Invalidate).await
    }

    /// Drop the resident month, e.g. after logout
    pub async fn reset(&self) -> CalResult<()> {
        self.send(CacheCommand::Reset).await
    }

    /// Snapshot of the cache state
    pub async fn state(&self) -> CalResult<CacheState> {
        self.request(CacheCommand::State).await
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> CalResult<()> {
        let _ = self.command_tx.send(CacheCommand::Shutdown).await;
        Ok(())
    }

    async fn send(&self, cmd: CacheCommand) -> CalResult<()> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|e| component_error(&format!("Actor mailbox error: {}", e)))
    }

    async fn request<T>(&self, cmd: impl FnOnce(oneshot::Sender<T>) -> CacheCommand) -> CalResult<T> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(cmd(response_tx)).await?;

        response_rx
            .await
            .map_err(|_| component_error("Response channel closed"))
    }
}
