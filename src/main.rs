#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
#![warn(clippy::perf)]
#![warn(clippy::complexity)]
#![warn(clippy::style)]
#![allow(clippy::multiple_crate_versions)]

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use playlist_reaper::{
    auth::{AuthConfig, OAUTH_SCOPE, load_credentials},
    playlist::{ReapOptions, reap_playlist},
    util::init_http_client,
    youtube::YouTube,
};
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

/// Waits out a fraction of a YouTube playlist's runtime, then deletes the playlist
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The playlist runtime is divided by this before waiting
    divisor: i64,

    /// Exact title of the playlist to delete
    #[arg(short, long, env = "PLAYLIST_TITLE", default_value = "asdf")]
    title: String,

    /// Seconds added on top of the divided runtime
    #[arg(short, long, default_value_t = 5.0)]
    grace: f64,

    /// Where the OAuth credential is cached between runs
    #[arg(long, env = "TOKEN_CACHE", default_value = "token.json")]
    token_cache: PathBuf,

    /// OAuth client secrets downloaded from the Google Cloud console
    #[arg(long, env = "CLIENT_SECRETS", default_value = "client_secrets.json")]
    client_secrets: PathBuf,

    /// Local port Google redirects to after consent
    #[arg(long, default_value_t = 8080)]
    redirect_port: u16,

    /// Print the consent URL instead of opening a browser
    #[arg(long)]
    no_browser: bool,
}

impl Args {
    fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            token_cache: self.token_cache.clone(),
            client_secrets: self.client_secrets.clone(),
            scope: OAUTH_SCOPE.to_string(),
            redirect_port: self.redirect_port,
            open_browser: !self.no_browser,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = Args::parse();
    let client = init_http_client()?;

    let credential = load_credentials(&client, &args.auth_config()).await?;
    let youtube = YouTube::new(client, &credential.access_token)?;

    let deleted = reap_playlist(
        &youtube,
        &ReapOptions {
            title: args.title,
            divisor: args.divisor,
            grace: args.grace,
        },
    )
    .await?;

    info!("Deleted playlist {:?} ({})", deleted.localized_title(), deleted.id);

    Ok(())
}
