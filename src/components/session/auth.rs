use super::models::{AuthResponse, Credentials, User};
use crate::error::{remote_error, CalResult, Error};
use crate::utils::http::{read_json, send, with_bearer, ApiClient};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Collaborator that exchanges credentials for a session token
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> CalResult<AuthResponse>;

    async fn signup(&self, email: &str, password: &str) -> CalResult<AuthResponse>;

    /// Resolve a previously issued token to its user
    async fn verify_token(&self, token: &str) -> CalResult<User>;
}

/// Auth endpoints of the backend
#[derive(Debug, Clone)]
pub struct HttpAuthService {
    api: ApiClient,
}

/// The verify endpoint answers with either the user or `{ "user": ... }`
#[derive(Deserialize)]
#[serde(untagged)]
enum VerifyResponse {
    Wrapped { user: User },
    Bare(User),
}

impl HttpAuthService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    async fn exchange(&self, path: &str, email: &str, password: &str) -> CalResult<AuthResponse> {
        let url = self.api.url(path)?;
        let credentials = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = send(self.api.post(url).json(&credentials)).await?;
        read_json::<AuthResponse>(response).await
    }
}

#[async_trait]
impl AuthService for HttpAuthService {
    async fn login(&self, email: &str, password: &str) -> CalResult<AuthResponse> {
        self.exchange("auth/login", email, password).await
    }

    async fn signup(&self, email: &str, password: &str) -> CalResult<AuthResponse> {
        self.exchange("auth/signup", email, password).await
    }

    async fn verify_token(&self, token: &str) -> CalResult<User> {
        let url = self.api.url("auth/verify-token")?;
        let response = send(with_bearer(self.api.post(url), token)).await?;
        match read_json::<VerifyResponse>(response).await? {
            VerifyResponse::Wrapped { user } | VerifyResponse::Bare(user) => Ok(user),
        }
    }
}

#[derive(Debug)]
struct Account {
    user: User,
    password: String,
}

#[derive(Debug, Default)]
struct Accounts {
    by_email: HashMap<String, Account>,
    tokens: HashMap<String, User>,
}

/// Process-local accounts for the memory backend. Tokens are not valid
/// across restarts, so a persisted token is dropped on the next start.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuthService {
    accounts: Arc<Mutex<Accounts>>,
}

impl InMemoryAuthService {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue(accounts: &mut Accounts, user: &User) -> AuthResponse {
        let token = format!("local-{}", uuid::Uuid::new_v4());
        accounts.tokens.insert(token.clone(), user.clone());
        AuthResponse {
            user: user.clone(),
            token,
        }
    }
}

#[async_trait]
impl AuthService for InMemoryAuthService {
    async fn login(&self, email: &str, password: &str) -> CalResult<AuthResponse> {
        let mut accounts = self.accounts.lock().await;
        let user = match accounts.by_email.get(&email.trim().to_lowercase()) {
            Some(account) if account.password == password => account.user.clone(),
            _ => return Err(remote_error(401, "Invalid email or password")),
        };
        Ok(Self::issue(&mut accounts, &user))
    }

    async fn signup(&self, email: &str, password: &str) -> CalResult<AuthResponse> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || password.is_empty() {
            return Err(remote_error(400, "Email and password are required"));
        }

        let mut accounts = self.accounts.lock().await;
        if accounts.by_email.contains_key(&email) {
            return Err(remote_error(409, "User already exists"));
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.clone(),
        };
        accounts.by_email.insert(
            email,
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        Ok(Self::issue(&mut accounts, &user))
    }

    async fn verify_token(&self, token: &str) -> CalResult<User> {
        let accounts = self.accounts.lock().await;
        accounts
            .tokens
            .get(token)
            .cloned()
            .ok_or_else(|| Error::Auth("Invalid token".to_string()))
    }
}
