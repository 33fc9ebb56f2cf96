use super::{CacheState, SelectOutcome, UpdateOutcome};
use crate::components::event_remote::{Event, EventDraft, EventRemote, MonthKey};
use crate::error::{CalResult, Error};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

type Reply<T> = oneshot::Sender<CalResult<T>>;

/// Messages processed by the cache actor
pub enum CacheCommand {
    SelectMonth(MonthKey, Reply<SelectOutcome>),
    Create(EventDraft, Reply<Event>),
    Update(Event, Reply<UpdateOutcome>),
    Delete(String, Reply<()>),
    ListAll(Reply<Vec<Event>>),
    Get(String, Reply<Event>),
    Invalidate,
    Reset,
    State(oneshot::Sender<CacheState>),
    Shutdown,

    // Completions posted back by spawned remote calls
    Fetched {
        generation: u64,
        key: MonthKey,
        result: CalResult<Vec<Event>>,
    },
    Created {
        key: MonthKey,
        result: CalResult<Event>,
        reply: Reply<Event>,
    },
    Updated {
        key: MonthKey,
        result: CalResult<Event>,
        reply: Reply<UpdateOutcome>,
    },
    Deleted {
        id: String,
        result: CalResult<()>,
        reply: Reply<()>,
    },
}

/// The event cache actor that owns the resident set
pub struct EventCacheActor {
    remote: Arc<dyn EventRemote>,
    state: CacheState,
    /// Bumped for every fetch started and on reset
    generation: u64,
    /// Set by `Invalidate`, forces the next selection of the resident month to refetch
    stale: bool,
    /// Callers waiting for the in-flight fetch
    waiters: Vec<Reply<SelectOutcome>>,
    /// Ids deleted while the in-flight fetch was outstanding. Its response
    /// may predate the delete, so these are dropped from it.
    deleted_in_flight: HashSet<String>,
    command_rx: mpsc::Receiver<CacheCommand>,
    /// Weak so that dropping every handle stops the actor
    mailbox: mpsc::WeakSender<CacheCommand>,
}

impl EventCacheActor {
    /// Create a new actor and the sender its handle talks through
    pub fn new(remote: Arc<dyn EventRemote>) -> (Self, mpsc::Sender<CacheCommand>) {
        let (command_tx, command_rx) = mpsc::channel(32);

        let actor = Self {
            remote,
            state: CacheState::Empty,
            generation: 0,
            stale: false,
            waiters: Vec::new(),
            deleted_in_flight: HashSet::new(),
            command_rx,
            mailbox: command_tx.downgrade(),
        };

        (actor, command_tx)
    }

    /// Start the actor's processing loop
    pub async fn run(&mut self) {
        info!("Event cache actor started");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                CacheCommand::Shutdown => {
                    info!("Event cache actor shutting down");
                    break;
                }
                cmd => self.handle(cmd),
            }
        }

        info!("Event cache actor shut down");
    }

    fn handle(&mut self, cmd: CacheCommand) {
        match cmd {
            CacheCommand::SelectMonth(key, reply) => self.select_month(key, reply),
            CacheCommand::Create(draft, reply) => self.create(draft, reply),
            CacheCommand::Update(event, reply) => self.update(event, reply),
            CacheCommand::Delete(id, reply) => self.delete(id, reply),
            CacheCommand::ListAll(reply) => {
                let remote = Arc::clone(&self.remote);
                tokio::spawn(async move {
                    let _ = reply.send(remote.get_all().await);
                });
            }
            CacheCommand::Get(id, reply) => {
                let remote = Arc::clone(&self.remote);
                tokio::spawn(async move {
                    let _ = reply.send(remote.get_by_id(&id).await);
                });
            }
            CacheCommand::Invalidate => {
                debug!("Resident month marked stale");
                self.stale = true;
            }
            CacheCommand::Reset => {
                debug!("Event cache reset");
                self.generation += 1;
                self.stale = false;
                self.supersede_waiters();
                self.deleted_in_flight.clear();
                self.state = CacheState::Empty;
            }
            CacheCommand::State(reply) => {
                let _ = reply.send(self.state.clone());
            }
            CacheCommand::Fetched {
                generation,
                key,
                result,
            } => self.fetched(generation, key, result),
            CacheCommand::Created { key, result, reply } => self.created(key, result, reply),
            CacheCommand::Updated { key, result, reply } => self.updated(key, result, reply),
            CacheCommand::Deleted { id, result, reply } => self.deleted(id, result, reply),
            CacheCommand::Shutdown => {}
        }
    }

    fn select_month(&mut self, key: MonthKey, reply: Reply<SelectOutcome>) {
        match &self.state {
            CacheState::Ready { key: current, events } if *current == key && !self.stale => {
                debug!("{} already resident", key);
                let _ = reply.send(Ok(SelectOutcome::AlreadyLoaded(events.clone())));
                return;
            }
            CacheState::Loading(current) if *current == key => {
                // Join the fetch already in flight
                self.waiters.push(reply);
                return;
            }
            _ => {}
        }

        self.supersede_waiters();
        self.generation += 1;
        self.stale = false;
        self.deleted_in_flight.clear();
        self.state = CacheState::Loading(key);
        self.waiters.push(reply);

        let generation = self.generation;
        debug!("Loading {} (generation {})", key, generation);

        let remote = Arc::clone(&self.remote);
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            let result = remote.get_by_month(key).await;
            post(
                &mailbox,
                CacheCommand::Fetched {
                    generation,
                    key,
                    result,
                },
            )
            .await;
        });
    }

    fn fetched(&mut self, generation: u64, key: MonthKey, result: CalResult<Vec<Event>>) {
        if generation != self.generation {
            debug!(
                "Discarding stale response for {} (generation {}, current {})",
                key, generation, self.generation
            );
            return;
        }

        let deleted = std::mem::take(&mut self.deleted_in_flight);
        match result {
            Ok(events) => {
                let (events, stray): (Vec<Event>, Vec<Event>) = events
                    .into_iter()
                    .filter(|e| !deleted.contains(&e.id))
                    .partition(|e| key.contains(e.date));
                if !stray.is_empty() {
                    warn!(
                        "Dropped {} event(s) dated outside {} from the month response",
                        stray.len(),
                        key
                    );
                }

                debug!("{} ready with {} event(s)", key, events.len());
                for waiter in self.waiters.drain(..) {
                    let _ = waiter.send(Ok(SelectOutcome::Loaded(events.clone())));
                }
                self.state = CacheState::Ready { key, events };
            }
            Err(e) => {
                error!("Failed to load events for {}: {}", key, e);
                for waiter in self.waiters.drain(..) {
                    let _ = waiter.send(Err(e.clone()));
                }
                self.state = CacheState::Error {
                    key,
                    cause: e.to_string(),
                };
            }
        }
    }

    fn create(&mut self, draft: EventDraft, reply: Reply<Event>) {
        let Some(key) = self.ready_key() else {
            let _ = reply.send(Err(Error::NotReady(
                "events can only be created once a month has loaded".to_string(),
            )));
            return;
        };

        let remote = Arc::clone(&self.remote);
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            let result = remote.create(draft).await;
            post(&mailbox, CacheCommand::Created { key, result, reply }).await;
        });
    }

    fn created(&mut self, key: MonthKey, result: CalResult<Event>, reply: Reply<Event>) {
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                error!("Failed to create event: {}", e);
                let _ = reply.send(Err(e));
                return;
            }
        };

        match self.resident_events(key) {
            Some(events) if key.contains(event.date) => upsert(events, event.clone()),
            Some(_) => debug!("Created event {} lies outside {}", event.id, key),
            None => debug!("{} no longer resident, not applying create", key),
        }
        let _ = reply.send(Ok(event));
    }

    fn update(&mut self, event: Event, reply: Reply<UpdateOutcome>) {
        let key = match &self.state {
            CacheState::Ready { key, events } if events.iter().any(|e| e.id == event.id) => *key,
            _ => {
                let _ = reply.send(Err(Error::NotResident(event.id)));
                return;
            }
        };

        let remote = Arc::clone(&self.remote);
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            let result = remote.update(event).await;
            post(&mailbox, CacheCommand::Updated { key, result, reply }).await;
        });
    }

    fn updated(&mut self, key: MonthKey, result: CalResult<Event>, reply: Reply<UpdateOutcome>) {
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                error!("Failed to update event: {}", e);
                let _ = reply.send(Err(e));
                return;
            }
        };

        let moved_out = !key.contains(event.date);
        match self.resident_events(key) {
            Some(events) if moved_out => {
                debug!("Event {} moved out of {}", event.id, key);
                events.retain(|e| e.id != event.id);
            }
            Some(events) => upsert(events, event.clone()),
            None => debug!("{} no longer resident, not applying update", key),
        }
        let _ = reply.send(Ok(UpdateOutcome { event, moved_out }));
    }

    fn delete(&mut self, id: String, reply: Reply<()>) {
        let remote = Arc::clone(&self.remote);
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            let result = remote.delete(&id).await;
            post(&mailbox, CacheCommand::Deleted { id, result, reply }).await;
        });
    }

    fn deleted(&mut self, id: String, result: CalResult<()>, reply: Reply<()>) {
        if let Err(e) = result {
            error!("Failed to delete event {}: {}", id, e);
            let _ = reply.send(Err(e));
            return;
        }

        match &mut self.state {
            CacheState::Ready { events, .. } => events.retain(|e| e.id != id),
            CacheState::Loading(key) => {
                debug!("Event {} deleted while {} is loading", id, key);
                self.deleted_in_flight.insert(id);
            }
            _ => {}
        }
        let _ = reply.send(Ok(()));
    }

    fn ready_key(&self) -> Option<MonthKey> {
        match &self.state {
            CacheState::Ready { key, .. } => Some(*key),
            _ => None,
        }
    }

    /// Resident set, only if `key` is the month currently resident
    fn resident_events(&mut self, key: MonthKey) -> Option<&mut Vec<Event>> {
        match &mut self.state {
            CacheState::Ready { key: current, events } if *current == key => Some(events),
            _ => None,
        }
    }

    /// Answer everyone waiting on the current fetch, it will not be used
    fn supersede_waiters(&mut self) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Ok(SelectOutcome::Superseded));
        }
    }
}

/// Replace the event with the same id, or append it
fn upsert(events: &mut Vec<Event>, event: Event) {
    match events.iter_mut().find(|e| e.id == event.id) {
        Some(slot) => *slot = event,
        None => events.push(event),
    }
}

/// Deliver a completion to the actor if it is still running
async fn post(mailbox: &mpsc::WeakSender<CacheCommand>, cmd: CacheCommand) {
    if let Some(tx) = mailbox.upgrade() {
        let _ = tx.send(cmd).await;
    }
}
