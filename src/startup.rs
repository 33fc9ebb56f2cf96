//! Wiring shared by the binaries: logging, configuration and the
//! construction of the session and event components.

use crate::components::event_cache::EventCacheHandle;
use crate::components::event_remote::{EventRemote, HttpEventRemote, InMemoryEventRemote};
use crate::components::session::{
    AuthService, FileTokenStore, HttpAuthService, InMemoryAuthService, MemoryTokenStore,
    RedisTokenStore, SessionState, SessionStore, TokenStore,
};
use crate::config::{Backend, Config, TokenStoreKind};
use crate::error::{CalResult, Error};
use crate::utils::http::ApiClient;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn")),
        )
        // stdout belongs to the interactive prompt
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Component(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load the application config
pub fn load_config() -> miette::Result<Config> {
    match Config::load() {
        Ok(config) => Ok(config),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Token persistence selected by the config
pub fn build_token_store(config: &Config) -> CalResult<Arc<dyn TokenStore>> {
    let store: Arc<dyn TokenStore> = match config.token_store {
        TokenStoreKind::File => Arc::new(FileTokenStore::new(
            config.token_path.clone(),
            config.token_key.clone(),
        )),
        TokenStoreKind::Redis => Arc::new(RedisTokenStore::new(
            &config.redis_url,
            config.token_key.clone(),
            config.request_timeout,
        )?),
        TokenStoreKind::Memory => Arc::new(MemoryTokenStore::new()),
    };
    Ok(store)
}

fn api_client(config: &Config) -> CalResult<ApiClient> {
    ApiClient::new(config.api_base_url.clone(), config.request_timeout)
}

/// Auth collaborator for the configured backend
pub fn build_auth(config: &Config) -> CalResult<Arc<dyn AuthService>> {
    let auth: Arc<dyn AuthService> = match config.backend {
        Backend::Http => Arc::new(HttpAuthService::new(api_client(config)?)),
        Backend::Memory => Arc::new(InMemoryAuthService::new()),
    };
    Ok(auth)
}

/// Session store in its loading state. The caller hydrates it.
pub fn build_session(config: &Config) -> CalResult<SessionStore> {
    Ok(SessionStore::new(
        build_token_store(config)?,
        build_auth(config)?,
    ))
}

/// Event remote for the configured backend
pub fn build_remote(config: &Config, session: &SessionStore) -> CalResult<Arc<dyn EventRemote>> {
    let remote: Arc<dyn EventRemote> = match config.backend {
        Backend::Http => Arc::new(HttpEventRemote::new(api_client(config)?, session.clone())),
        Backend::Memory => Arc::new(InMemoryEventRemote::new()),
    };
    info!("Using {:?} event backend", config.backend);
    Ok(remote)
}

/// Drop the resident month whenever the session ends or changes hands,
/// whether by logout or because the remote store rejected the token.
pub fn spawn_session_watcher(session: &SessionStore, cache: EventCacheHandle) -> JoinHandle<()> {
    let mut session_rx = session.subscribe();
    let mut previous = current_token(&session_rx.borrow());

    tokio::spawn(async move {
        while session_rx.changed().await.is_ok() {
            let token = current_token(&session_rx.borrow_and_update());
            if previous.is_some() && previous != token {
                debug!("Session ended, resetting event cache");
                if let Err(e) = cache.reset().await {
                    error!("Failed to reset event cache: {}", e);
                    break;
                }
            }
            previous = token;
        }
    })
}

fn current_token(state: &SessionState) -> Option<String> {
    state.session.as_ref().map(|s| s.token.clone())
}
