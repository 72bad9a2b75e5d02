//! Access check in front of protected handlers.

use axum::{
    extract::{OriginalUri, Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use super::{
    error::AuthError,
    session::{is_authenticated, load_session},
    IndieAuth,
};

/// Let authenticated visitors through and send everyone else to log in.
///
/// The callback path is always let through. Use with
/// `axum::middleware::from_fn_with_state(gate, require_login)`.
pub async fn require_login(
    State(gate): State<IndieAuth>,
    request: Request,
    next: Next,
) -> Response {
    // Nested routers strip their prefix from the request URI.
    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map_or_else(|| request.uri().clone(), |original| original.0.clone());

    if uri.path() == gate.config().callback_path() {
        return next.run(request).await;
    }

    let session =
        match load_session(gate.sessions(), request.headers(), gate.config().cookie_name()).await
        {
            Ok(session) => session,
            Err(e) => return AuthError::from(e).into_response(),
        };

    if is_authenticated(&session) {
        return next.run(request).await;
    }

    let original = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), ToString::to_string);

    match gate.begin_login(&original).await {
        Ok(target) => Redirect::temporary(target.as_str()).into_response(),
        Err(e) => e.into_response(),
    }
}
