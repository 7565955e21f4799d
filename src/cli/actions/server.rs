use crate::{api, cli::actions::Action};
use anyhow::Result;

/// Handle the server action
/// # Errors
/// Returns an error if the server fails to start.
pub async fn handle(action: Action) -> Result<()> {
    let Action::Server { port, dsn, config } = action;

    api::new(port, dsn, config).await
}
