use axum::{extract::State, response::IntoResponse};

use crate::indieauth::IndieAuth;

// Only reachable once the gate let the visitor through.
pub async fn root(State(gate): State<IndieAuth>) -> impl IntoResponse {
    format!("Hello, {}\n", gate.me())
}
