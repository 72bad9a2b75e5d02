//! IndieAuth gate: discovery, login redirect, callback verification,
//! session check and logout for a single trusted identity.

pub mod callback;
pub mod config;
pub mod discovery;
pub mod error;
pub mod logout;
pub mod middleware;
pub mod redirect;
pub mod rels;
pub mod session;
pub mod state;

pub use callback::{callback_handler, CallbackQuery, VerifyResponse};
pub use config::IndieAuthConfig;
pub use discovery::{discover, Endpoints};
pub use error::{AuthError, ConfigError, DiscoveryError, InitError, SessionError};
pub use logout::logout_handler;
pub use middleware::require_login;
pub use session::{is_authenticated, MemorySessionStore, Session, SessionStore};
pub use state::StateCache;

use axum::{middleware::from_fn_with_state, routing::get, Router};
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// The gate shared by every request. Cheap to clone.
#[derive(Clone)]
pub struct IndieAuth {
    config: Arc<IndieAuthConfig>,
    endpoints: Arc<Endpoints>,
    client: Client,
    states: Arc<StateCache>,
    sessions: Arc<dyn SessionStore>,
}

impl IndieAuth {
    /// Validate `config`, discover the authorization endpoint of `me` and
    /// build the gate with a fresh state cache.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or discovery fails.
    pub async fn new(
        config: IndieAuthConfig,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self, InitError> {
        let states = Arc::new(StateCache::new(config.state_capacity())?);
        Self::with_state_cache(config, sessions, states).await
    }

    /// Same as [`IndieAuth::new`] with a caller-owned state cache.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or discovery fails.
    pub async fn with_state_cache(
        config: IndieAuthConfig,
        sessions: Arc<dyn SessionStore>,
        states: Arc<StateCache>,
    ) -> Result<Self, InitError> {
        config.validate()?;
        let client = discovery::http_client(&config).map_err(InitError::HttpClient)?;
        let endpoints = discover(&client, config.me()).await?;
        if let Some(token) = &endpoints.token {
            debug!("Token endpoint advertised at {token}, not used");
        }
        Ok(Self::from_parts(config, endpoints, client, states, sessions))
    }

    /// Assemble a gate from already discovered endpoints.
    #[must_use]
    pub fn from_parts(
        config: IndieAuthConfig,
        endpoints: Endpoints,
        client: Client,
        states: Arc<StateCache>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        info!(
            "IndieAuth gate for {} using {}",
            config.me(),
            endpoints.authorization
        );
        Self {
            config: Arc::new(config),
            endpoints: Arc::new(endpoints),
            client,
            states,
            sessions,
        }
    }

    #[must_use]
    pub fn config(&self) -> &IndieAuthConfig {
        &self.config
    }

    #[must_use]
    pub fn me(&self) -> &str {
        self.config.me()
    }

    #[must_use]
    pub fn authorization_endpoint(&self) -> &Url {
        &self.endpoints.authorization
    }

    #[must_use]
    pub fn token_endpoint(&self) -> Option<&Url> {
        self.endpoints.token.as_ref()
    }

    #[must_use]
    pub fn states(&self) -> &StateCache {
        &self.states
    }

    #[must_use]
    pub fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    /// Router serving only the callback path.
    pub fn router(&self) -> Router {
        Router::new()
            .route(self.config.callback_path(), get(callback_handler))
            .with_state(self.clone())
    }

    /// Put every route of `app` behind the gate and mount the callback.
    pub fn protect(&self, app: Router) -> Router {
        app.layer(from_fn_with_state(self.clone(), require_login))
            .merge(self.router())
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    #[tokio::test]
    async fn new_discovers_endpoint() {
        if !can_bind_localhost() {
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"<link rel="authorization_endpoint" href="/indieauth">"#,
                "text/html",
            ))
            .mount(&server)
            .await;

        let me = format!("{}/", server.uri());
        let gate = IndieAuth::new(
            IndieAuthConfig::new(&me, "http://localhost:8080"),
            MemorySessionStore::shared(),
        )
        .await
        .unwrap();

        assert_eq!(gate.me(), me);
        assert_eq!(
            gate.authorization_endpoint().as_str(),
            format!("{}/indieauth", server.uri())
        );
        assert_eq!(gate.token_endpoint(), None);
        assert_eq!(gate.states().capacity(), 64);
    }

    #[tokio::test]
    async fn new_fails_without_endpoint() {
        if !can_bind_localhost() {
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
            .mount(&server)
            .await;

        let result = IndieAuth::new(
            IndieAuthConfig::new(format!("{}/", server.uri()), "http://localhost:8080"),
            MemorySessionStore::shared(),
        )
        .await;
        assert!(matches!(result, Err(InitError::Discovery(_))));
    }

    #[tokio::test]
    async fn new_rejects_invalid_config_before_network() {
        let result = IndieAuth::new(
            IndieAuthConfig::new("https://me.example/", "https://app.example")
                .with_state_capacity(0),
            MemorySessionStore::shared(),
        )
        .await;
        assert!(matches!(result, Err(InitError::Config(_))));
    }

    #[tokio::test]
    async fn injected_state_cache_is_used() {
        if !can_bind_localhost() {
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Link", r#"</auth>; rel="authorization_endpoint""#),
            )
            .mount(&server)
            .await;

        let states = Arc::new(StateCache::new(3).unwrap());
        let gate = IndieAuth::with_state_cache(
            IndieAuthConfig::new(format!("{}/", server.uri()), "http://localhost:8080"),
            MemorySessionStore::shared(),
            states.clone(),
        )
        .await
        .unwrap();

        gate.begin_login("/somewhere").await.unwrap();
        assert_eq!(states.len().await, 1);
        assert_eq!(gate.states().capacity(), 3);
    }
}
