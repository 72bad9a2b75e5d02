//! Authorization endpoint discovery for the configured identity URL.

use reqwest::{header::ACCEPT, Client};
use tracing::{debug, info, instrument};
use url::Url;

use super::{
    config::IndieAuthConfig,
    error::DiscoveryError,
    rels::{self, Rels},
};

pub const AUTHORIZATION_ENDPOINT: &str = "authorization_endpoint";
pub const TOKEN_ENDPOINT: &str = "token_endpoint";

/// Endpoints advertised by an identity URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    pub authorization: Url,
    pub token: Option<Url>,
}

/// Build the HTTP client shared by discovery and code verification.
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialized.
pub fn http_client(config: &IndieAuthConfig) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(crate::APP_USER_AGENT)
        .timeout(config.request_timeout())
        .connect_timeout(config.connect_timeout())
        .build()
}

/// Fetch `me` and resolve its `authorization_endpoint`.
///
/// A relation in the `Link` header wins over any `<link>` element in the
/// HTML body; within the body the first element in document order wins.
///
/// # Errors
/// Returns an error if the fetch fails, the response is not successful, or
/// no `authorization_endpoint` relation is advertised.
#[instrument(skip(client))]
pub async fn discover(client: &Client, me: &str) -> Result<Endpoints, DiscoveryError> {
    let url = Url::parse(me).map_err(|source| DiscoveryError::InvalidUrl {
        url: me.to_string(),
        source,
    })?;

    let response = client
        .get(url)
        .header(ACCEPT, "text/html")
        .send()
        .await
        .map_err(|source| DiscoveryError::Request {
            url: me.to_string(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(DiscoveryError::Status {
            url: me.to_string(),
            status,
        });
    }

    // Relative targets resolve against where redirects finally landed.
    let base = response.url().clone();
    let header_rels = rels::from_link_headers(response.headers(), &base);
    debug!("Link header rels: {}", header_rels.len());

    let body = response
        .text()
        .await
        .map_err(|source| DiscoveryError::Request {
            url: me.to_string(),
            source,
        })?;
    let html_rels = rels::from_html(&body, &base);
    debug!("HTML rels: {}", html_rels.len());

    let authorization = select(&header_rels, &html_rels, AUTHORIZATION_ENDPOINT)
        .ok_or_else(|| DiscoveryError::NoAuthorizationEndpoint(me.to_string()))?;
    let token = select(&header_rels, &html_rels, TOKEN_ENDPOINT);

    info!("Discovered authorization endpoint {authorization} for {me}");

    Ok(Endpoints {
        authorization,
        token,
    })
}

fn select(header_rels: &Rels, html_rels: &Rels, rel: &str) -> Option<Url> {
    header_rels
        .first(rel)
        .or_else(|| html_rels.first(rel))
        .cloned()
}
