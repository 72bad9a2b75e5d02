//! Clearing the login flag.

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use tracing::info;

use super::{
    error::AuthError,
    session::{load_session, Session},
    IndieAuth,
};

impl IndieAuth {
    /// Clear the session's login flag. Calling it on a logged out session is
    /// a no-op apart from saving the session again.
    ///
    /// # Errors
    /// Returns an error if the session cannot be saved.
    pub async fn logout(&self, session: &mut Session) -> Result<(), AuthError> {
        session.set_logged_in(false);
        self.sessions().save(session).await?;
        info!("Logged out");
        Ok(())
    }
}

/// Optional handler applications can mount to log the visitor out.
pub async fn logout_handler(State(gate): State<IndieAuth>, headers: HeaderMap) -> Response {
    let mut session =
        match load_session(gate.sessions(), &headers, gate.config().cookie_name()).await {
            Ok(session) => session,
            Err(e) => return AuthError::from(e).into_response(),
        };

    // Nothing to clear for visitors without a stored session.
    if !session.is_new() {
        if let Err(e) = gate.logout(&mut session).await {
            return e.into_response();
        }
    }

    Redirect::to("/").into_response()
}
