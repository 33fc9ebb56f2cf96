//! Shared fixtures for the integration tests.
//!
//! `GatedRemote` is an in-memory event store whose month queries can be
//! held open and released in any order, which is what the ordering tests
//! need. `ScriptedAuth` answers token verification from a fixed table.
//! `TestServer` (in `server.rs`) is an axum fake of the REST backend and
//! `FakeRedis` (in `fake_redis.rs`) stands in for the token store's Redis.
#![allow(dead_code)]

mod fake_redis;
mod server;

pub use fake_redis::FakeRedis;
pub use server::{BackendState, TestServer};

use async_trait::async_trait;
use chrono::NaiveDate;
use kalenteri::components::event_remote::{Event, EventDraft, EventRemote, MonthKey};
use kalenteri::components::session::{AuthResponse, AuthService, User};
use kalenteri::error::{CalResult, Error};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn month(m: u32, y: i32) -> MonthKey {
    MonthKey::new(m, y).unwrap()
}

pub fn event(id: &str, title: &str, date: NaiveDate, time: &str) -> Event {
    Event {
        id: id.to_string(),
        title: title.to_string(),
        date,
        time: time.to_string(),
        end_time: String::new(),
        description: String::new(),
    }
}

pub fn draft(title: &str, date: NaiveDate) -> EventDraft {
    EventDraft {
        title: title.to_string(),
        ..EventDraft::blank(date)
    }
}

/// Let spawned tasks and the cache actor run to quiescence. Meant for
/// tests with a paused clock, where the sleep auto-advances once every
/// task is idle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// In-memory remote with controllable month queries
#[derive(Default)]
pub struct GatedRemote {
    events: Mutex<Vec<Event>>,
    gates: Mutex<HashMap<MonthKey, Arc<Semaphore>>>,
    /// Listed by month queries although the store no longer has them
    ghosts: Mutex<Vec<Event>>,
    failing: AtomicBool,
    month_fetches: AtomicUsize,
    mutations: AtomicUsize,
    next_ids: Mutex<VecDeque<String>>,
    created: AtomicUsize,
    /// Mutations wait for a permit while set
    mutation_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl GatedRemote {
    pub fn new(events: Vec<Event>) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(events),
            ..Default::default()
        })
    }

    /// Make month queries for `key` wait until `release`
    pub fn hold(&self, key: MonthKey) {
        self.gates
            .lock()
            .unwrap()
            .insert(key, Arc::new(Semaphore::new(0)));
    }

    /// Let the held query for `key` complete
    pub fn release(&self, key: MonthKey) {
        if let Some(gate) = self.gates.lock().unwrap().remove(&key) {
            gate.add_permits(1);
        }
    }

    /// Make create/update/delete wait until `release_mutations`
    pub fn hold_mutations(&self) {
        *self.mutation_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_mutations(&self) {
        if let Some(gate) = self.mutation_gate.lock().unwrap().take() {
            gate.add_permits(Semaphore::MAX_PERMITS);
        }
    }

    async fn mutation_started(&self) -> CalResult<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);

        let gate = self.mutation_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _ = gate.acquire().await;
        }
        self.check()
    }

    /// Make every following call fail with a remote error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Keep listing `event` in month queries
    pub fn add_ghost(&self, event: Event) {
        self.ghosts.lock().unwrap().push(event);
    }

    /// Id the next create assigns instead of a generated one
    pub fn assign_next_id(&self, id: &str) {
        self.next_ids.lock().unwrap().push_back(id.to_string());
    }

    pub fn month_fetches(&self) -> usize {
        self.month_fetches.load(Ordering::SeqCst)
    }

    /// Number of create/update/delete calls that reached the store
    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn check(&self) -> CalResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Remote {
                status: 500,
                message: "Internal server error".to_string(),
            });
        }
        Ok(())
    }

    fn not_found(id: &str) -> Error {
        Error::Remote {
            status: 404,
            message: format!("Event {} not found", id),
        }
    }
}

#[async_trait]
impl EventRemote for GatedRemote {
    async fn get_by_month(&self, key: MonthKey) -> CalResult<Vec<Event>> {
        self.month_fetches.fetch_add(1, Ordering::SeqCst);

        let gate = self.gates.lock().unwrap().get(&key).cloned();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        self.check()?;
        let mut events: Vec<Event> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| key.contains(e.date))
            .cloned()
            .collect();
        events.extend(self.ghosts.lock().unwrap().iter().cloned());
        Ok(events)
    }

    async fn get_all(&self) -> CalResult<Vec<Event>> {
        self.check()?;
        Ok(self.stored())
    }

    async fn get_by_id(&self, id: &str) -> CalResult<Event> {
        self.check()?;
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| Self::not_found(id))
    }

    async fn create(&self, draft: EventDraft) -> CalResult<Event> {
        self.mutation_started().await?;

        let id = match self.next_ids.lock().unwrap().pop_front() {
            Some(id) => id,
            None => format!("evt-{}", self.created.fetch_add(1, Ordering::SeqCst) + 1),
        };
        let event = Event::from_draft(id, draft);
        self.events.lock().unwrap().push(event.clone());
        Ok(event)
    }

    async fn update(&self, event: Event) -> CalResult<Event> {
        self.mutation_started().await?;

        let mut events = self.events.lock().unwrap();
        let slot = events
            .iter_mut()
            .find(|e| e.id == event.id)
            .ok_or_else(|| Self::not_found(&event.id))?;
        *slot = event.clone();
        Ok(event)
    }

    async fn delete(&self, id: &str) -> CalResult<()> {
        self.mutation_started().await?;

        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|e| e.id != id);
        if events.len() == before {
            return Err(Self::not_found(id));
        }
        Ok(())
    }
}

/// Auth collaborator answering from a fixed token table
#[derive(Default)]
pub struct ScriptedAuth {
    users: Mutex<HashMap<String, User>>,
    verify_calls: AtomicUsize,
    /// Verification waits for this when set
    verify_gate: Mutex<Option<Arc<Notify>>>,
    unreachable: AtomicBool,
}

impl ScriptedAuth {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Accept `token` for `email`, also as a password for `login`
    pub fn with_user(self: Arc<Self>, token: &str, email: &str) -> Arc<Self> {
        self.users.lock().unwrap().insert(
            token.to_string(),
            User {
                id: format!("user-{}", email),
                email: email.to_string(),
            },
        );
        self
    }

    /// Fail every call as if the network were down
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Hold token verification until the returned notify fires
    pub fn hold_verification(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.verify_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    fn reachable(&self) -> CalResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(Error::Network("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthService for ScriptedAuth {
    /// The password doubles as the token to hand out
    async fn login(&self, email: &str, password: &str) -> CalResult<AuthResponse> {
        self.reachable()?;
        let users = self.users.lock().unwrap();
        match users.get(password) {
            Some(user) if user.email == email => Ok(AuthResponse {
                user: user.clone(),
                token: password.to_string(),
            }),
            _ => Err(Error::Remote {
                status: 400,
                message: "Invalid credentials".to_string(),
            }),
        }
    }

    async fn signup(&self, email: &str, password: &str) -> CalResult<AuthResponse> {
        self.reachable()?;
        let user = User {
            id: format!("user-{}", email),
            email: email.to_string(),
        };
        self.users
            .lock()
            .unwrap()
            .insert(password.to_string(), user.clone());
        Ok(AuthResponse {
            user,
            token: password.to_string(),
        })
    }

    async fn verify_token(&self, token: &str) -> CalResult<User> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.verify_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.reachable()?;
        self.users
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or_else(|| Error::Auth("Invalid token".to_string()))
    }
}
