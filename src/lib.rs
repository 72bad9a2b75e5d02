//! # IndieAuth gate
//!
//! `indieauth` protects an axum application so that only one pre-configured
//! identity (the `me` URL) can reach its handlers. Visitors prove control of
//! that URL through an IndieAuth authorization-code exchange.
//!
//! ## Flow
//!
//! 1. At startup the identity URL is fetched once and its
//!    `authorization_endpoint` relation is discovered (`Link` header first,
//!    HTML `<link>` elements second).
//! 2. A visitor without an authenticated session is redirected to that
//!    endpoint with a random `state`, remembered in a bounded LRU cache
//!    together with the page they asked for.
//! 3. The endpoint sends the visitor back to the callback path
//!    (`/indieauth-redirect`) with `me`, `code` and `state`.
//! 4. The callback checks `me`, consumes `state`, verifies `code` against the
//!    endpoint and marks the session as logged in.
//!
//! ## Usage
//!
//! ```ignore
//! use indieauth::indieauth::{IndieAuth, IndieAuthConfig, MemorySessionStore};
//!
//! let config = IndieAuthConfig::new("https://me.example", "https://app.example");
//! let gate = IndieAuth::new(config, MemorySessionStore::shared()).await?;
//!
//! let app = gate.protect(Router::new().route("/", get(index)));
//! ```

pub mod api;
pub mod cli;
pub mod indieauth;

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "",
};

pub const APP_USER_AGENT: &str = concat!(
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION"),
    " (+",
    env!("CARGO_PKG_REPOSITORY"),
    ")"
);
