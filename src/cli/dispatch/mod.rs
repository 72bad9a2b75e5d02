use crate::cli::actions::{server::Args, Action};
use anyhow::{Context, Result};
use std::time::Duration;

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let me = matches
        .get_one::<String>("me")
        .cloned()
        .context("missing required argument: --me")?;
    let client_id = matches
        .get_one::<String>("client-id")
        .cloned()
        .context("missing required argument: --client-id")?;
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let state_capacity = matches
        .get_one::<u32>("state-capacity")
        .copied()
        .unwrap_or(64);
    let timeout = matches.get_one::<u64>("timeout").copied().unwrap_or(10);

    Ok(Action::Server(Args {
        port,
        me,
        client_id,
        state_capacity: usize::try_from(state_capacity).context("invalid --state-capacity")?,
        timeout: Duration::from_secs(timeout),
    }))
}
