//! Callback handling: identity and state checks, then code verification.

use axum::{
    extract::{Query, State},
    http::{
        header::{ALLOW, SET_COOKIE},
        HeaderMap, Method, StatusCode,
    },
    response::{IntoResponse, Redirect, Response},
};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::{debug, error, info, instrument};
use url::Url;

use super::{
    error::AuthError,
    session::{load_session, session_cookie, Session},
    IndieAuth,
};

/// Query string the authorization endpoint sends the visitor back with.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub me: Option<String>,
    pub code: Option<String>,
    pub state: Option<String>,
}

/// Body of a successful code verification.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyResponse {
    #[serde(default)]
    pub me: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl IndieAuth {
    /// Validate a callback and mark `session` as logged in.
    ///
    /// Returns the path the visitor originally asked for. The identity and
    /// state checks never touch the network.
    ///
    /// # Errors
    /// Returns an error if `me` does not match, `state` is unknown, the
    /// endpoint rejects or fails to verify the code, or the session cannot
    /// be saved.
    pub async fn handle_callback(
        &self,
        session: &mut Session,
        query: &CallbackQuery,
    ) -> Result<String, AuthError> {
        let me = query
            .me
            .as_deref()
            .ok_or(AuthError::MissingParameter("me"))?;
        let state = query
            .state
            .as_deref()
            .ok_or(AuthError::MissingParameter("state"))?;
        let code = query
            .code
            .as_deref()
            .ok_or(AuthError::MissingParameter("code"))?;

        if me != self.me() {
            return Err(AuthError::IdentityMismatch {
                expected: self.me().to_string(),
                got: me.to_string(),
            });
        }

        // Single use: a replayed or evicted state is rejected.
        let original = self
            .states()
            .take(state)
            .await
            .ok_or(AuthError::InvalidState)?;

        let verified = self.verify_code(code).await?;
        let returned = verified.me.unwrap_or_default();
        if !same_identity(&returned, self.me()) {
            return Err(AuthError::IdentityMismatch {
                expected: self.me().to_string(),
                got: returned,
            });
        }

        session.set_logged_in(true);
        self.sessions().save(session).await?;

        info!("Logged in as {}", self.me());
        Ok(original)
    }

    /// Ask the authorization endpoint to confirm `code`.
    ///
    /// # Errors
    /// Returns [`AuthError::Forbidden`] on `403`, and
    /// [`AuthError::Verification`] on transport failures, any other non-`200`
    /// status, or an undecodable body.
    #[instrument(skip(self, code))]
    pub async fn verify_code(&self, code: &str) -> Result<VerifyResponse, AuthError> {
        let redirect_uri = self.config().redirect_uri();
        let form = [
            ("code", code),
            ("client_id", self.config().client_id()),
            ("redirect_uri", redirect_uri.as_str()),
        ];

        let response = self
            .client()
            .post(self.authorization_endpoint().clone())
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::Verification(format!("request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            return Err(AuthError::Forbidden);
        }
        if status != StatusCode::OK {
            return Err(AuthError::Verification(format!(
                "{} answered with {status}",
                self.authorization_endpoint()
            )));
        }

        let verified: VerifyResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Verification(format!("invalid response body: {e}")))?;

        debug!(
            "Code verified, scope: {}",
            verified.scope.as_deref().unwrap_or("none")
        );

        Ok(verified)
    }
}

// Endpoints may canonicalize `me`, e.g. add a trailing slash to a bare host.
fn same_identity(returned: &str, expected: &str) -> bool {
    if returned.is_empty() {
        return false;
    }
    match (Url::parse(returned), Url::parse(expected)) {
        (Ok(returned), Ok(expected)) => returned == expected,
        _ => returned == expected,
    }
}

/// Handler for the callback path. Anything but `GET` answers `405`, including
/// the `HEAD` requests axum routes to `get` handlers.
pub async fn callback_handler(
    State(gate): State<IndieAuth>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if method != Method::GET {
        return (StatusCode::METHOD_NOT_ALLOWED, [(ALLOW, "GET")]).into_response();
    }

    let mut session = match load_session(gate.sessions(), &headers, gate.config().cookie_name())
        .await
    {
        Ok(session) => session,
        Err(e) => return AuthError::from(e).into_response(),
    };

    let original = match gate.handle_callback(&mut session, &query).await {
        Ok(original) => original,
        Err(e) => return e.into_response(),
    };

    let mut response = Redirect::temporary(&original).into_response();
    match session_cookie(gate.config(), &session) {
        Ok(cookie) => {
            response.headers_mut().insert(SET_COOKIE, cookie);
        }
        Err(e) => {
            error!("Failed to build session cookie: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::test_support::{gate, ME};
    use super::*;
    use serde_json::json;
    use std::net::TcpListener;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn callback(me: &str, code: &str, state: &str) -> CallbackQuery {
        CallbackQuery {
            me: Some(me.to_string()),
            code: Some(code.to_string()),
            state: Some(state.to_string()),
        }
    }

    #[test]
    fn same_identity_normalizes_urls() {
        assert!(same_identity("https://me.example", "https://me.example/"));
        assert!(same_identity("https://ME.example/", "https://me.example/"));
        assert!(!same_identity("https://other.example/", "https://me.example/"));
        assert!(!same_identity("", "https://me.example/"));
    }

    #[tokio::test]
    async fn successful_callback_logs_in() {
        if !can_bind_localhost() {
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth"))
            .and(header("accept", "application/json"))
            .and(body_string_contains("code=good"))
            .and(body_string_contains("client_id=https%3A%2F%2Fapp.example"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "me": ME,
                "state": "ignored",
                "scope": "profile"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gate = gate(&format!("{}/auth", server.uri()), 8).unwrap();
        gate.states()
            .put("s1".to_string(), "/private".to_string())
            .await;

        let mut session = Session::new().unwrap();
        let original = gate
            .handle_callback(&mut session, &callback(ME, "good", "s1"))
            .await
            .unwrap();

        assert_eq!(original, "/private");
        assert!(session.logged_in());
        let stored = gate.sessions().load(session.id()).await.unwrap().unwrap();
        assert!(stored.logged_in());
        // consumed
        assert_eq!(gate.states().get("s1").await, None);
    }

    #[tokio::test]
    async fn identity_mismatch_skips_verification() {
        if !can_bind_localhost() {
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "me": ME })))
            .expect(0)
            .mount(&server)
            .await;

        let gate = gate(&format!("{}/auth", server.uri()), 8).unwrap();
        gate.states()
            .put("s1".to_string(), "/private".to_string())
            .await;

        let mut session = Session::new().unwrap();
        let err = gate
            .handle_callback(
                &mut session,
                &callback("https://evil.example/", "good", "s1"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::IdentityMismatch { .. }));
        assert!(!session.logged_in());
        // the state was not consumed by a rejected identity
        assert!(gate.states().get("s1").await.is_some());
    }

    #[tokio::test]
    async fn unknown_state_skips_verification() {
        if !can_bind_localhost() {
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "me": ME })))
            .expect(0)
            .mount(&server)
            .await;

        let gate = gate(&format!("{}/auth", server.uri()), 8).unwrap();
        let mut session = Session::new().unwrap();
        let err = gate
            .handle_callback(&mut session, &callback(ME, "good", "nope"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidState));
    }

    #[tokio::test]
    async fn forbidden_is_reported_distinctly() {
        if !can_bind_localhost() {
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let gate = gate(&format!("{}/auth", server.uri()), 8).unwrap();
        gate.states()
            .put("s1".to_string(), "/private".to_string())
            .await;

        let mut session = Session::new().unwrap();
        let err = gate
            .handle_callback(&mut session, &callback(ME, "bad", "s1"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Forbidden));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert!(!session.logged_in());
    }

    #[tokio::test]
    async fn other_statuses_and_bad_bodies_fail_verification() {
        if !can_bind_localhost() {
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/garbage"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let broken = gate(&format!("{}/broken", server.uri()), 8).unwrap();
        assert!(matches!(
            broken.verify_code("x").await,
            Err(AuthError::Verification(_))
        ));

        let garbage = gate(&format!("{}/garbage", server.uri()), 8).unwrap();
        assert!(matches!(
            garbage.verify_code("x").await,
            Err(AuthError::Verification(_))
        ));
    }

    #[tokio::test]
    async fn returned_identity_must_match() {
        if !can_bind_localhost() {
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "me": "https://someone-else.example/" })),
            )
            .mount(&server)
            .await;

        let gate = gate(&format!("{}/auth", server.uri()), 8).unwrap();
        gate.states()
            .put("s1".to_string(), "/private".to_string())
            .await;

        let mut session = Session::new().unwrap();
        let err = gate
            .handle_callback(&mut session, &callback(ME, "good", "s1"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::IdentityMismatch { .. }));
        assert!(!session.logged_in());
    }

    #[tokio::test]
    async fn missing_parameters_are_rejected() {
        let gate = gate("https://auth.example/auth", 8).unwrap();
        let mut session = Session::new().unwrap();

        let err = gate
            .handle_callback(&mut session, &CallbackQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingParameter("me")));
    }
}
