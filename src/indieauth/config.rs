//! Gate configuration.

use std::time::Duration;

use super::error::ConfigError;

pub const DEFAULT_CALLBACK_PATH: &str = "/indieauth-redirect";
pub const DEFAULT_COOKIE_NAME: &str = "indieauth";
pub const DEFAULT_STATE_CAPACITY: usize = 64;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 5;

#[derive(Clone, Debug)]
pub struct IndieAuthConfig {
    me: String,
    client_id: String,
    callback_path: String,
    cookie_name: String,
    state_capacity: usize,
    request_timeout: Duration,
    connect_timeout: Duration,
}

impl IndieAuthConfig {
    #[must_use]
    pub fn new(me: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            me: me.into(),
            client_id: client_id.into(),
            callback_path: DEFAULT_CALLBACK_PATH.to_string(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            state_capacity: DEFAULT_STATE_CAPACITY,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECONDS),
        }
    }

    #[must_use]
    pub fn with_callback_path(mut self, path: impl Into<String>) -> Self {
        self.callback_path = path.into();
        self
    }

    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_state_capacity(mut self, capacity: usize) -> Self {
        self.state_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Check the settings that cannot be repaired later.
    ///
    /// # Errors
    /// Returns an error when `me` is not an absolute http(s) URL, the callback
    /// path does not start with `/`, or the state capacity is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let me = url::Url::parse(&self.me).map_err(|source| ConfigError::InvalidMe {
            me: self.me.clone(),
            source,
        })?;
        if !matches!(me.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(me.scheme().to_string()));
        }
        if !self.callback_path.starts_with('/') {
            return Err(ConfigError::InvalidCallbackPath(self.callback_path.clone()));
        }
        if self.state_capacity == 0 {
            return Err(ConfigError::ZeroStateCapacity);
        }
        Ok(())
    }

    #[must_use]
    pub fn me(&self) -> &str {
        &self.me
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn callback_path(&self) -> &str {
        &self.callback_path
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    #[must_use]
    pub fn state_capacity(&self) -> usize {
        self.state_capacity
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Where the authorization endpoint sends the visitor back to.
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!(
            "{}{}",
            self.client_id.trim_end_matches('/'),
            self.callback_path
        )
    }

    /// Only mark cookies secure when the application is served over HTTPS.
    pub(crate) fn cookie_secure(&self) -> bool {
        self.client_id.starts_with("https://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_and_overrides() {
        let config = IndieAuthConfig::new("https://me.example/", "https://app.example");

        assert_eq!(config.me(), "https://me.example/");
        assert_eq!(config.callback_path(), DEFAULT_CALLBACK_PATH);
        assert_eq!(config.cookie_name(), DEFAULT_COOKIE_NAME);
        assert_eq!(config.state_capacity(), DEFAULT_STATE_CAPACITY);
        assert_eq!(
            config.request_timeout(),
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS)
        );

        let config = config
            .with_callback_path("/auth/callback")
            .with_cookie_name("gate")
            .with_state_capacity(8)
            .with_request_timeout(Duration::from_secs(2))
            .with_connect_timeout(Duration::from_secs(1));

        assert_eq!(config.callback_path(), "/auth/callback");
        assert_eq!(config.cookie_name(), "gate");
        assert_eq!(config.state_capacity(), 8);
        assert_eq!(config.request_timeout(), Duration::from_secs(2));
        assert_eq!(config.connect_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn redirect_uri_appends_callback_path() {
        let config = IndieAuthConfig::new("https://me.example/", "https://app.example/");
        assert_eq!(
            config.redirect_uri(),
            "https://app.example/indieauth-redirect"
        );
        assert!(config.cookie_secure());

        let config = IndieAuthConfig::new("https://me.example/", "http://localhost:8080");
        assert_eq!(
            config.redirect_uri(),
            "http://localhost:8080/indieauth-redirect"
        );
        assert!(!config.cookie_secure());
    }

    #[test]
    fn validate_rejects_bad_settings() {
        let ok = IndieAuthConfig::new("https://me.example/", "https://app.example");
        assert!(ok.validate().is_ok());

        let bad_me = IndieAuthConfig::new("not a url", "https://app.example");
        assert!(matches!(
            bad_me.validate(),
            Err(ConfigError::InvalidMe { .. })
        ));

        let bad_scheme = IndieAuthConfig::new("ftp://me.example/", "https://app.example");
        assert!(matches!(
            bad_scheme.validate(),
            Err(ConfigError::UnsupportedScheme(_))
        ));

        let bad_path = ok.clone().with_callback_path("callback");
        assert!(matches!(
            bad_path.validate(),
            Err(ConfigError::InvalidCallbackPath(_))
        ));

        let zero = ok.with_state_capacity(0);
        assert!(matches!(
            zero.validate(),
            Err(ConfigError::ZeroStateCapacity)
        ));
    }
}
