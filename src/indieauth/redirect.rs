//! Outbound authorization request.

use tracing::debug;
use url::Url;

use super::{error::AuthError, state::generate_state, IndieAuth};

const AUTH_PARAMS: [&str; 4] = ["me", "client_id", "redirect_uri", "state"];

impl IndieAuth {
    /// Authorization endpoint URL carrying `me`, `client_id`, `redirect_uri`
    /// and `state`. Other query parameters of the endpoint are kept.
    #[must_use]
    pub fn authorization_url(&self, state: &str) -> Url {
        let mut url = self.authorization_endpoint().clone();
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| {
                let key: &str = key;
                !AUTH_PARAMS.contains(&key)
            })
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        let redirect_uri = self.config().redirect_uri();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair("me", self.me())
            .append_pair("client_id", self.config().client_id())
            .append_pair("redirect_uri", &redirect_uri)
            .append_pair("state", state);
        url
    }

    /// Remember `original` under a new state token and return where the
    /// visitor must be sent to log in. No network call is made.
    ///
    /// # Errors
    /// Returns an error if no state token can be generated.
    pub async fn begin_login(&self, original: &str) -> Result<Url, AuthError> {
        let state = generate_state().map_err(AuthError::Entropy)?;
        self.states()
            .put(state.clone(), original.to_string())
            .await;
        debug!("Issued state for {original}");
        Ok(self.authorization_url(&state))
    }
}
