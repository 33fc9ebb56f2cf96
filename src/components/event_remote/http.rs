use super::models::{Event, EventDraft, MonthKey};
use super::EventRemote;
use crate::components::session::SessionStore;
use crate::error::{config_error, CalResult, Error};
use crate::utils::http::{read_empty, read_json, send, with_bearer, ApiClient};
use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

/// Event store client speaking the REST contract of the backend
#[derive(Clone)]
pub struct HttpEventRemote {
    api: ApiClient,
    session: SessionStore,
}

impl HttpEventRemote {
    pub fn new(api: ApiClient, session: SessionStore) -> Self {
        Self { api, session }
    }

    /// Token of the live session. Nothing is sent without one.
    fn token(&self) -> CalResult<String> {
        self.session
            .token()
            .ok_or_else(|| Error::Auth("No active session".to_string()))
    }

    /// Invalidate the session when the store rejected the token we sent
    async fn observe<T>(&self, operation: &str, token: &str, result: CalResult<T>) -> CalResult<T> {
        if let Err(Error::Auth(message)) = &result {
            warn!("{} rejected by the event store: {}", operation, message);
            self.session.invalidate(token, message).await;
        }
        result
    }
}

/// URL of a single event. Ids are opaque and always stay one path segment.
fn event_url(api: &ApiClient, id: &str) -> CalResult<Url> {
    let mut url = api.url("events")?;
    url.path_segments_mut()
        .map_err(|_| config_error("API URL cannot carry path segments"))?
        .push(id);
    Ok(url)
}

#[async_trait]
impl EventRemote for HttpEventRemote {
    async fn get_by_month(&self, key: MonthKey) -> CalResult<Vec<Event>> {
        let mut url = self.api.url("events/month")?;
        url.query_pairs_mut()
            .append_pair("month", &key.month().to_string())
            .append_pair("year", &key.year().to_string());

        debug!("Fetching events for {}", key);
        let token = self.token()?;
        let result = async {
            let response = send(with_bearer(self.api.get(url), &token)).await?;
            read_json::<Vec<Event>>(response).await
        }
        .await;
        self.observe("Month query", &token, result).await
    }

    async fn get_all(&self) -> CalResult<Vec<Event>> {
        let url = self.api.url("events")?;
        let token = self.token()?;
        let result = async {
            let response = send(with_bearer(self.api.get(url), &token)).await?;
            read_json::<Vec<Event>>(response).await
        }
        .await;
        self.observe("Event listing", &token, result).await
    }

    async fn get_by_id(&self, id: &str) -> CalResult<Event> {
        let url = event_url(&self.api, id)?;
        let token = self.token()?;
        let result = async {
            let response = send(with_bearer(self.api.get(url), &token)).await?;
            read_json::<Event>(response).await
        }
        .await;
        self.observe("Event lookup", &token, result).await
    }

    async fn create(&self, draft: EventDraft) -> CalResult<Event> {
        let url = self.api.url("events")?;
        let token = self.token()?;
        let result = async {
            let request = with_bearer(self.api.post(url), &token).json(&draft);
            let response = send(request).await?;
            read_json::<Event>(response).await
        }
        .await;
        self.observe("Create", &token, result).await
    }

    async fn update(&self, event: Event) -> CalResult<Event> {
        let url = event_url(&self.api, &event.id)?;
        let token = self.token()?;
        let result = async {
            let request = with_bearer(self.api.put(url), &token).json(&event);
            let response = send(request).await?;
            read_json::<Event>(response).await
        }
        .await;
        self.observe("Update", &token, result).await
    }

    async fn delete(&self, id: &str) -> CalResult<()> {
        let url = event_url(&self.api, id)?;
        let token = self.token()?;
        let result = async {
            let response = send(with_bearer(self.api.delete(url), &token)).await?;
            read_empty(response).await
        }
        .await;
        self.observe("Delete", &token, result).await
    }
}
