use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{HeaderMap, HeaderValue};
use tokio::time::Instant;

/// # Errors
/// Errors when the HTTP client cannot be built
pub fn init_http_client() -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        "User-Agent",
        HeaderValue::from_str(&format!(
            "{}/{} (+{})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_REPOSITORY")
        ))
        .context("Building User-Agent header")?,
    );

    reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("Unable to build HTTP client")
}

/// Sleeps for `duration`, drawing a progress bar that ticks every second
pub async fn wait_with_progress(duration: Duration) {
    let deadline = Instant::now() + duration;

    let pb = ProgressBar::new(duration.as_secs());
    pb.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len}s ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        tokio::time::sleep(remaining.min(Duration::from_secs(1))).await;
        pb.set_position(
            duration
                .saturating_sub(deadline.saturating_duration_since(Instant::now()))
                .as_secs(),
        );
    }

    pb.finish_and_clear();
}
