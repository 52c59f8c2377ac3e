use std::sync::LazyLock;

use anyhow::{Context, Result, ensure};
use regex::Regex;

static DAYS_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)D").unwrap());
static HOURS_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)H").unwrap());
static MINUTES_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)M").unwrap());
static SECONDS_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)S").unwrap());

fn component(regex: &Regex, encoded: &str) -> Result<u64> {
    regex.captures(encoded).map_or(Ok(0), |c| {
        c[1].parse::<u64>()
            .with_context(|| format!("Parsing duration component `{}` of `{encoded}`", &c[0]))
    })
}

/// Decodes a YouTube `contentDetails.duration` value (e.g. `PT1H2M3S`) into seconds
///
/// Every component is optional and defaults to zero.
///
/// # Errors
/// Errors when a component does not fit into a `u64` or the total overflows
pub fn parse_duration(encoded: &str) -> Result<u64> {
    let days = component(&DAYS_REGEX, encoded)?;
    let hours = component(&HOURS_REGEX, encoded)?;
    let minutes = component(&MINUTES_REGEX, encoded)?;
    let seconds = component(&SECONDS_REGEX, encoded)?;

    days.checked_mul(86_400)
        .and_then(|t| hours.checked_mul(3600).and_then(|h| t.checked_add(h)))
        .and_then(|t| minutes.checked_mul(60).and_then(|m| t.checked_add(m)))
        .and_then(|t| t.checked_add(seconds))
        .with_context(|| format!("Duration `{encoded}` overflows"))
}

/// Seconds to wait before deleting: `total / divisor + grace`
///
/// # Errors
/// * If `divisor` is zero
/// * If the result is negative or not finite
#[allow(clippy::cast_precision_loss)]
pub fn wait_seconds(total: f64, divisor: i64, grace: f64) -> Result<f64> {
    ensure!(divisor != 0, "Cannot divide the playlist duration by zero");

    let wait = total / divisor as f64 + grace;
    ensure!(
        wait.is_finite() && wait >= 0.0,
        "Computed wait of {wait} seconds is not a valid duration"
    );

    Ok(wait)
}
