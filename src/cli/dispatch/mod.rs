//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action the binary should execute.

use crate::api::ServerConfig;
use crate::cli::actions::Action;
use crate::cli::commands::oauth;
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let token_secret = matches
        .get_one::<String>("token-secret")
        .cloned()
        .context("missing required argument: --token-secret")?;

    let oauth_opts = oauth::Options::parse(matches)?;

    Ok(Action::Server {
        port,
        dsn,
        config: ServerConfig {
            token_secret: SecretString::from(token_secret),
            frontend_url: matches.get_one::<String>("frontend-url").cloned(),
            github: oauth_opts.github,
            google: oauth_opts.google,
            oauth_redirect_url: oauth_opts.redirect_url,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn server_action_from_args() {
        temp_env::with_vars(
            [
                ("IDENTIGO_GITHUB_CLIENT_ID", None::<&str>),
                ("IDENTIGO_GITHUB_CLIENT_SECRET", None::<&str>),
                ("IDENTIGO_GOOGLE_CLIENT_ID", None::<&str>),
                ("IDENTIGO_GOOGLE_CLIENT_SECRET", None::<&str>),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec![
                    "identigo",
                    "--port",
                    "9100",
                    "--dsn",
                    "postgres://user@localhost:5432/identigo",
                    "--token-secret",
                    "super-secret",
                    "--github-client-id",
                    "iv1.abc",
                    "--github-client-secret",
                    "gh-secret",
                ]);

                let action = handler(&matches);
                let Ok(Action::Server { port, dsn, config }) = action else {
                    panic!("expected server action");
                };
                assert_eq!(port, 9100);
                assert_eq!(dsn, "postgres://user@localhost:5432/identigo");
                assert_eq!(config.token_secret.expose_secret(), "super-secret");
                assert_eq!(
                    config.github.map(|github| github.client_id),
                    Some("iv1.abc".to_string())
                );
                assert!(config.google.is_none());
            },
        );
    }

    #[test]
    fn dsn_required() {
        temp_env::with_vars([("IDENTIGO_DSN", None::<&str>)], || {
            let command = crate::cli::commands::new();
            let result = command.try_get_matches_from(vec![
                "identigo",
                "--token-secret",
                "super-secret",
            ]);
            assert_eq!(
                result.map_err(|e| e.kind()),
                Err(clap::error::ErrorKind::MissingRequiredArgument)
            );
        });
    }
}
