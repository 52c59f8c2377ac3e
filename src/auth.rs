use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, TimeDelta, Utc};
use pkce::{code_challenge, code_verifier};
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::oauth_server;

pub const OAUTH_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const OAUTH_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const OAUTH_SCOPE: &str = "https://www.googleapis.com/auth/youtubepartner";

/// Access tokens this close to their expiry count as expired
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Where credentials come from and where they are cached
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub token_cache: PathBuf,
    pub client_secrets: PathBuf,
    pub scope: String,
    pub redirect_port: u16,
    pub open_browser: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_cache: PathBuf::from("token.json"),
            client_secrets: PathBuf::from("client_secrets.json"),
            scope: OAUTH_SCOPE.to_string(),
            redirect_port: 8080,
            open_browser: true,
        }
    }
}

/// OAuth client registration, as downloaded from the Google Cloud console
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    OAUTH_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    OAUTH_TOKEN_URI.to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ClientSecretsFile {
    Installed(ClientSecrets),
    Web(ClientSecrets),
}

impl ClientSecrets {
    /// Parses a `client_secrets.json` document (`installed` or `web` application)
    ///
    /// # Errors
    /// Errors when the document is not a recognised client secrets file
    pub fn from_json(json: &str) -> Result<Self> {
        let file = serde_json::from_str::<ClientSecretsFile>(json)
            .context("Parsing client secrets file")?;
        Ok(match file {
            ClientSecretsFile::Installed(s) | ClientSecretsFile::Web(s) => s,
        })
    }

    /// # Errors
    /// Errors when the file cannot be read or parsed
    pub async fn from_file(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Reading client secrets from {}", path.display()))?;
        Self::from_json(&json)
    }
}

/// An OAuth 2.0 user credential that can renew itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

impl Credential {
    /// Whether the access token can be used right now
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty()
            && self
                .expiry
                .is_none_or(|expiry| Utc::now() + TimeDelta::seconds(EXPIRY_MARGIN_SECS) < expiry)
    }

    /// Renews the access token in place using the refresh token
    ///
    /// # Errors
    /// Errors on network error / missing or revoked refresh token / malformed body
    #[instrument(skip_all)]
    pub async fn refresh(&mut self, client: &Client) -> Result<()> {
        let refresh_token = self
            .refresh_token
            .as_deref()
            .context("Cached credential has no refresh token, delete the cache to sign in again")?;

        let res = client
            .post(&self.token_uri)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .context("Sending refresh access token request")?;

        let token = token_response(res)
            .await
            .context("Unable to refresh access token")?;
        self.apply(token);

        Ok(())
    }

    fn apply(&mut self, token: TokenResponse) {
        self.access_token = token.access_token;
        self.expiry = token
            .expires_in
            .map(|secs| Utc::now() + TimeDelta::seconds(secs));
        // Google only sometimes rotates the refresh token
        if token.refresh_token.is_some() {
            self.refresh_token = token.refresh_token;
        }
        if let Some(scope) = token.scope {
            self.scopes = scope.split_whitespace().map(str::to_string).collect();
        }
    }

    /// # Errors
    /// Errors when the cache cannot be read or is corrupt
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Reading cached credentials from {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Parsing cached credentials from {}", path.display()))
    }

    /// # Errors
    /// Errors when the cache cannot be written
    pub async fn persist(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Serializing credentials")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Writing credentials to {}", path.display()))
    }
}

async fn token_response(res: Response) -> Result<TokenResponse> {
    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        error!("Token endpoint returned {status}: {body}");
        bail!("Token endpoint returned {status}");
    }

    res.json::<TokenResponse>()
        .await
        .context("Parsing token response")
}

/// Returns a usable credential, from the cache when possible
///
/// A cached credential that is no longer valid is refreshed in memory only; the cache is
/// written just once, after an interactive sign-in.
///
/// # Errors
/// Errors on a corrupt cache, a failed refresh or a failed interactive sign-in
pub async fn load_credentials(client: &Client, config: &AuthConfig) -> Result<Credential> {
    let cached = tokio::fs::try_exists(&config.token_cache)
        .await
        .with_context(|| format!("Checking for {}", config.token_cache.display()))?;

    if cached {
        info!("Attempting to load credentials...");
        let mut credential = Credential::load(&config.token_cache).await?;

        if !credential.is_valid() {
            info!("Refreshing credentials...");
            credential.refresh(client).await?;
        }

        return Ok(credential);
    }

    info!("Fetching new tokens...");
    let credential = authorize_interactively(client, config).await?;

    info!("Storing credentials for future use...");
    credential.persist(&config.token_cache).await?;

    Ok(credential)
}

async fn authorize_interactively(client: &Client, config: &AuthConfig) -> Result<Credential> {
    let secrets = ClientSecrets::from_file(&config.client_secrets).await?;
    let listener = oauth_server::bind(config.redirect_port).await?;
    let port = listener
        .local_addr()
        .context("Reading redirect listener address")?
        .port();

    let redirect_url = format!("http://localhost:{port}/");
    let (verifier, url) = generate_login_url(&secrets, &redirect_url, &config.scope)?;

    info!("Please visit this URL to authorize this application: {url}");
    if config.open_browser && webbrowser::open(url.as_str()).is_err() {
        debug!("Unable to open a browser");
    }

    let code = oauth_server::wait_google_redirect(listener).await?;
    exchange_auth_code(client, &secrets, &verifier, &code, &redirect_url).await
}

/// Builds the consent page URL, returning the PKCE verifier alongside it
///
/// # Errors
/// Errors when the secrets carry an invalid `auth_uri`
pub fn generate_login_url(
    secrets: &ClientSecrets,
    redirect_url: &str,
    scope: &str,
) -> Result<(Vec<u8>, Url)> {
    let verifier = code_verifier(64);

    let mut url = Url::parse(&secrets.auth_uri).context("Parsing OAuth authorization URI")?;
    url.query_pairs_mut()
        .append_pair("client_id", &secrets.client_id)
        .append_pair("redirect_uri", redirect_url)
        .append_pair("response_type", "code")
        .append_pair("scope", scope)
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent")
        .append_pair("code_challenge", &code_challenge(&verifier))
        .append_pair("code_challenge_method", "S256")
        .finish();

    Ok((verifier, url))
}

/// Exchanges an OAuth authorization code for a credential
///
/// # Errors
/// Errors on network error / invalid auth code / malformed body
#[instrument(skip_all)]
pub async fn exchange_auth_code(
    client: &Client,
    secrets: &ClientSecrets,
    verifier: &[u8],
    code: &str,
    redirect_url: &str,
) -> Result<Credential> {
    let verifier = std::str::from_utf8(verifier).context("PKCE verifier is not UTF-8")?;

    let res = client
        .post(&secrets.token_uri)
        .form(&[
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_url),
        ])
        .send()
        .await
        .context("Sending authentication code exchange request")?;

    let token = token_response(res)
        .await
        .context("Failed to exchange auth code to tokens")?;

    let mut credential = Credential {
        access_token: String::new(),
        refresh_token: None,
        expiry: None,
        token_uri: secrets.token_uri.clone(),
        client_id: secrets.client_id.clone(),
        client_secret: secrets.client_secret.clone(),
        scopes: Vec::new(),
    };
    credential.apply(token);

    Ok(credential)
}
