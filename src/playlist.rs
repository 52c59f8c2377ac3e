use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::{
    duration::{parse_duration, wait_seconds},
    util::wait_with_progress,
    youtube::{Playlist, YouTube},
};

/// What to delete and how long to hold off
#[derive(Debug, Clone)]
pub struct ReapOptions {
    /// Exact localized title of the playlist
    pub title: String,
    /// The playlist runtime is divided by this
    pub divisor: i64,
    /// Seconds added on top of the divided runtime
    pub grace: f64,
}

/// First playlist, in listing order, whose localized title is exactly `title`
#[must_use]
pub fn find_playlist_by_title<'a>(playlists: &'a [Playlist], title: &str) -> Option<&'a Playlist> {
    playlists.iter().find(|p| p.localized_title() == title)
}

/// Sums encoded video durations into seconds
///
/// # Errors
/// Errors when any duration cannot be decoded
#[allow(clippy::cast_precision_loss)]
pub fn total_seconds<'a>(durations: impl IntoIterator<Item = &'a str>) -> Result<f64> {
    durations.into_iter().try_fold(0.0, |total, encoded| {
        Ok::<_, anyhow::Error>(total + parse_duration(encoded)? as f64)
    })
}

/// Total runtime of a playlist in seconds
///
/// Only the first page of playlist items is considered.
///
/// # Errors
/// Errors on any API failure or undecodable duration
#[instrument(skip(youtube))]
pub async fn playlist_duration(youtube: &YouTube, playlist_id: &str) -> Result<f64> {
    let video_ids = youtube.list_playlist_video_ids(playlist_id).await?;
    if video_ids.is_empty() {
        warn!("Playlist {playlist_id} has no videos");
        return Ok(0.0);
    }

    let durations = youtube.list_video_durations(&video_ids).await?;
    total_seconds(durations.iter().map(String::as_str))
}

/// Finds the playlist, waits out its (divided) runtime plus grace, then deletes it
///
/// Returns the deleted playlist.
///
/// # Errors
/// * If no playlist carries the title; nothing is deleted
/// * If the divisor is zero; nothing is deleted
/// * On any API failure
pub async fn reap_playlist(youtube: &YouTube, options: &ReapOptions) -> Result<Playlist> {
    let playlists = youtube.list_my_playlists().await?;
    let playlist = find_playlist_by_title(&playlists, &options.title)
        .with_context(|| {
            format!(
                "No playlist titled {:?} among your {} playlists",
                options.title,
                playlists.len()
            )
        })?
        .clone();
    info!("Found playlist {:?} ({})", options.title, playlist.id);

    let duration = playlist_duration(youtube, &playlist.id).await?;
    info!("Playlist runtime: {duration} seconds");

    let wait = wait_seconds(duration, options.divisor, options.grace)?;
    info!("Waiting for {wait} seconds...");
    let wait = Duration::try_from_secs_f64(wait).context("Wait does not fit a duration")?;
    wait_with_progress(wait).await;

    info!("Deleting playlist {}", playlist.id);
    youtube.delete_playlist(&playlist.id).await?;

    Ok(playlist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::youtube::{Localized, PlaylistSnippet};

    fn playlist(id: &str, title: &str, localized: Option<&str>) -> Playlist {
        Playlist {
            id: id.to_string(),
            snippet: PlaylistSnippet {
                title: title.to_string(),
                localized: localized.map(|t| Localized {
                    title: t.to_string(),
                }),
            },
        }
    }

    #[test]
    fn first_exact_match_wins() {
        let playlists = [
            playlist("PL1", "asdf ", Some("asdf ")),
            playlist("PL2", "asdf", Some("asdf")),
            playlist("PL3", "asdf", Some("asdf")),
        ];
        assert_eq!(find_playlist_by_title(&playlists, "asdf").unwrap().id, "PL2");
        assert!(find_playlist_by_title(&playlists, "ASDF").is_none());
    }

    #[test]
    fn matches_on_localized_title() {
        let playlists = [playlist("PL1", "Default", Some("Localisé"))];
        assert!(find_playlist_by_title(&playlists, "Default").is_none());
        assert_eq!(find_playlist_by_title(&playlists, "Localisé").unwrap().id, "PL1");

        let unlocalized = [playlist("PL2", "Plain", None)];
        assert_eq!(find_playlist_by_title(&unlocalized, "Plain").unwrap().id, "PL2");
    }

    #[test]
    fn total_is_order_independent() {
        let durations = ["PT1H2M3S", "PT45S", "PT10M", "P0D"];
        let forward = total_seconds(durations).unwrap();
        let backward = total_seconds(durations.iter().rev().copied()).unwrap();

        assert!((forward - 4368.0).abs() < f64::EPSILON);
        assert!((forward - backward).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_total_is_zero() {
        assert!(total_seconds(Vec::<&str>::new()).unwrap().abs() < f64::EPSILON);
    }
}
