use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::Url;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    time::timeout,
};
use tracing::debug;

/// How long a connection may stay silent before it is dropped
const REQUEST_LINE_TIMEOUT: Duration = Duration::from_secs(3);

/// Binds the redirect listener on `localhost:{port}`
///
/// Must be bound before the consent page is opened.
///
/// # Errors
/// If the port is taken
pub async fn bind(port: u16) -> Result<TcpListener> {
    TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("Launching HTTP server on localhost:{port}"))
}

/// Listens for Google's OAuth redirect and returns the authorization code
///
/// Connections that carry neither a `code` nor an `error` (favicon requests) are answered
/// with a 404 and skipped. Connections that send nothing within a few seconds (browser
/// pre-connects) are dropped.
///
/// # Errors
/// * If the user denied access (`error=...` in the redirect)
/// * If a connection cannot be accepted or read
pub async fn wait_google_redirect(listener: TcpListener) -> Result<Box<str>> {
    loop {
        let (mut stream, addr) = listener
            .accept()
            .await
            .context("Accepting new HTTP connection")?;
        debug!("Accepted redirect connection from {addr}");

        let mut reader = BufReader::new(&mut stream);
        let mut request_line = String::new();
        let Ok(read) = timeout(REQUEST_LINE_TIMEOUT, reader.read_line(&mut request_line)).await
        else {
            debug!("Dropping idle connection from {addr}");
            continue;
        };
        read.context("Reading connection data")?;

        if request_line.trim().is_empty() {
            continue;
        }

        match parse_redirect(&request_line) {
            Ok(Some(code)) => {
                respond(
                    &mut stream,
                    "200 OK",
                    "Authentication complete - you may close this window.",
                )
                .await;
                return Ok(code);
            }
            Ok(None) => respond(&mut stream, "404 Not Found", "Not found").await,
            Err(e) => {
                respond(&mut stream, "400 Bad Request", &format!("{e:#}")).await;
                return Err(e);
            }
        }
    }
}

/// Extracts the authorization code from an HTTP request line like `GET /?code=... HTTP/1.1`
///
/// Returns `None` when the request is not an OAuth redirect.
///
/// # Errors
/// * If the request line is malformed
/// * If the redirect reports an authorization error
pub fn parse_redirect(request_line: &str) -> Result<Option<Box<str>>> {
    let target = request_line
        .split_whitespace()
        .nth(1)
        .context("Request line has no target")?;
    let url = Url::parse(&format!("http://localhost{target}")).context("Parsing redirect URL")?;

    if let Some((_, error)) = url.query_pairs().find(|(key, _)| key == "error") {
        bail!("Authorization was not granted: {error}");
    }

    Ok(url
        .query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, code)| code.into_owned().into_boxed_str()))
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    stream
        .write_all(
            format!(
                "HTTP/1.1 {status}\r\ncontent-type: text/plain; charset=utf-8\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            )
            .as_bytes(),
        )
        .await
        .ok();
}
