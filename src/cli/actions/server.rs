use crate::{
    api,
    indieauth::{IndieAuth, IndieAuthConfig, MemorySessionStore},
};
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub me: String,
    pub client_id: String,
    pub state_capacity: usize,
    pub timeout: Duration,
}

impl Args {
    fn config(&self) -> IndieAuthConfig {
        IndieAuthConfig::new(&self.me, &self.client_id)
            .with_state_capacity(self.state_capacity)
            .with_request_timeout(self.timeout)
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if discovery fails or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let config = args.config();
    log_startup_args(&args, &config);

    let gate = IndieAuth::new(config, MemorySessionStore::shared())
        .await
        .with_context(|| format!("Could not set up IndieAuth for {}", args.me))?;

    api::new(args.port, gate).await
}

fn log_startup_args(args: &Args, config: &IndieAuthConfig) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("me", args.me.clone()),
        ("client_id", args.client_id.clone()),
        ("redirect_uri", config.redirect_uri()),
        ("state_capacity", args.state_capacity.to_string()),
        ("timeout", format!("{}s", args.timeout.as_secs())),
    ];
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\nStartup configuration:", banner());
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn banner() -> String {
    format!(
        "indieauth - {} - {}",
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    )
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_commit_truncates() {
        assert_eq!(short_commit("0123456789abcdef"), "0123456");
        assert_eq!(short_commit(" abc "), "abc");
        assert_eq!(short_commit(""), "");
    }

    #[test]
    fn args_map_to_config() {
        let args = Args {
            port: 8080,
            me: "https://me.example/".to_string(),
            client_id: "https://app.example".to_string(),
            state_capacity: 12,
            timeout: Duration::from_secs(3),
        };
        let config = args.config();
        assert_eq!(config.me(), "https://me.example/");
        assert_eq!(config.state_capacity(), 12);
        assert_eq!(config.request_timeout(), Duration::from_secs(3));
        assert_eq!(
            config.redirect_uri(),
            "https://app.example/indieauth-redirect"
        );
    }
}
