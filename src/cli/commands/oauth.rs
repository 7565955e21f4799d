use crate::api::OAuthClientConfig;
use anyhow::{anyhow, Result};
use clap::{Arg, Command};
use secrecy::SecretString;

pub const ARG_GITHUB_CLIENT_ID: &str = "github-client-id";
pub const ARG_GITHUB_CLIENT_SECRET: &str = "github-client-secret";
pub const ARG_GOOGLE_CLIENT_ID: &str = "google-client-id";
pub const ARG_GOOGLE_CLIENT_SECRET: &str = "google-client-secret";
pub const ARG_OAUTH_REDIRECT_URL: &str = "oauth-redirect-url";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_GITHUB_CLIENT_ID)
                .long(ARG_GITHUB_CLIENT_ID)
                .help("GitHub OAuth application client id")
                .env("IDENTIGO_GITHUB_CLIENT_ID")
                .requires(ARG_GITHUB_CLIENT_SECRET),
        )
        .arg(
            Arg::new(ARG_GITHUB_CLIENT_SECRET)
                .long(ARG_GITHUB_CLIENT_SECRET)
                .help("GitHub OAuth application client secret")
                .env("IDENTIGO_GITHUB_CLIENT_SECRET")
                .hide_env_values(true)
                .requires(ARG_GITHUB_CLIENT_ID),
        )
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_ID)
                .long(ARG_GOOGLE_CLIENT_ID)
                .help("Google OAuth client id")
                .env("IDENTIGO_GOOGLE_CLIENT_ID")
                .requires(ARG_GOOGLE_CLIENT_SECRET)
                .requires(ARG_OAUTH_REDIRECT_URL),
        )
        .arg(
            Arg::new(ARG_GOOGLE_CLIENT_SECRET)
                .long(ARG_GOOGLE_CLIENT_SECRET)
                .help("Google OAuth client secret")
                .env("IDENTIGO_GOOGLE_CLIENT_SECRET")
                .hide_env_values(true)
                .requires(ARG_GOOGLE_CLIENT_ID),
        )
        .arg(
            Arg::new(ARG_OAUTH_REDIRECT_URL)
                .long(ARG_OAUTH_REDIRECT_URL)
                .help("Redirect URL registered with the OAuth providers")
                .env("IDENTIGO_OAUTH_REDIRECT_URL"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub github: Option<OAuthClientConfig>,
    pub google: Option<OAuthClientConfig>,
    pub redirect_url: Option<String>,
}

impl Options {
    /// Collect provider credentials from CLI matches.
    ///
    /// # Errors
    /// Returns an error if a client id is present without its secret.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        let github = client_config(
            matches,
            ARG_GITHUB_CLIENT_ID,
            ARG_GITHUB_CLIENT_SECRET,
        )?;
        let google = client_config(
            matches,
            ARG_GOOGLE_CLIENT_ID,
            ARG_GOOGLE_CLIENT_SECRET,
        )?;

        Ok(Self {
            github,
            google,
            redirect_url: matches.get_one::<String>(ARG_OAUTH_REDIRECT_URL).cloned(),
        })
    }
}

fn client_config(
    matches: &clap::ArgMatches,
    id_arg: &str,
    secret_arg: &str,
) -> Result<Option<OAuthClientConfig>> {
    let Some(client_id) = matches.get_one::<String>(id_arg).cloned() else {
        return Ok(None);
    };
    let client_secret = matches
        .get_one::<String>(secret_arg)
        .cloned()
        .ok_or_else(|| anyhow!("missing required argument: --{secret_arg}"))?;

    Ok(Some(OAuthClientConfig {
        client_id,
        client_secret: SecretString::from(client_secret),
    }))
}
