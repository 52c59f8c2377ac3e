use anyhow::{Context, Result, bail};
use reqwest::{Client, RequestBuilder, Response, Url, header::AUTHORIZATION};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, error, instrument};

pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3/";

/// Largest page `playlistItems.list` and `playlists.list` will return. Only the first page is read.
pub const MAX_RESULTS: &str = "50";

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub snippet: PlaylistSnippet,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistSnippet {
    pub title: String,
    pub localized: Option<Localized>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Localized {
    pub title: String,
}

impl Playlist {
    /// The title shown to the authenticated user, falling back to the default-language title
    #[must_use]
    pub fn localized_title(&self) -> &str {
        self.snippet
            .localized
            .as_ref()
            .map_or(&self.snippet.title, |l| &l.title)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    content_details: PlaylistItemContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemContentDetails {
    video_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Video {
    content_details: VideoContentDetails,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    duration: String,
}

/// Authorized handle on the YouTube Data API v3
#[derive(Debug, Clone)]
pub struct YouTube {
    client: Client,
    base_url: Url,
    access_token: Box<str>,
}

impl YouTube {
    /// # Errors
    /// Never in practice, the base URL is a constant
    pub fn new(client: Client, access_token: &str) -> Result<Self> {
        let base_url = Url::parse(YOUTUBE_API_BASE).context("Parsing YouTube API base URL")?;
        Ok(Self::with_base_url(client, base_url, access_token))
    }

    /// `base_url` must end with a `/`
    #[must_use]
    pub fn with_base_url(client: Client, base_url: Url, access_token: &str) -> Self {
        Self {
            client,
            base_url,
            access_token: access_token.into(),
        }
    }

    fn request(&self, method: reqwest::Method, resource: &str) -> Result<RequestBuilder> {
        let url = self
            .base_url
            .join(resource)
            .with_context(|| format!("Building URL for `{resource}`"))?;
        Ok(self
            .client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token)))
    }

    async fn list<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let res = self
            .request(reqwest::Method::GET, resource)?
            .query(query)
            .send()
            .await
            .with_context(|| format!("Fetching {resource}"))?;
        let res = ensure_success(res, resource).await?;

        let body = res
            .json::<ListResponse<T>>()
            .await
            .with_context(|| format!("Parsing {resource} response"))?;
        debug!("{resource} returned {} items", body.items.len());

        Ok(body.items)
    }

    /// Lists the playlists owned by the authenticated user (first page only)
    ///
    /// # Errors
    /// Errors on network / authorization / quota errors
    #[instrument(skip(self))]
    pub async fn list_my_playlists(&self) -> Result<Vec<Playlist>> {
        self.list(
            "playlists",
            &[("part", "snippet"), ("mine", "true"), ("maxResults", MAX_RESULTS)],
        )
        .await
    }

    /// Lists the video IDs in a playlist, in playlist order (first page only)
    ///
    /// # Errors
    /// Errors on network / authorization / quota errors
    #[instrument(skip(self))]
    pub async fn list_playlist_video_ids(&self, playlist_id: &str) -> Result<Vec<String>> {
        let items = self
            .list::<PlaylistItem>(
                "playlistItems",
                &[
                    ("part", "contentDetails"),
                    ("playlistId", playlist_id),
                    ("maxResults", MAX_RESULTS),
                ],
            )
            .await?;

        Ok(items
            .into_iter()
            .map(|i| i.content_details.video_id)
            .collect())
    }

    /// Looks up the encoded durations (`PT#H#M#S`) of a batch of videos in one request
    ///
    /// Videos that are private or deleted are silently missing from the result.
    ///
    /// # Errors
    /// Errors on network / authorization / quota errors
    #[instrument(skip(self))]
    pub async fn list_video_durations(&self, video_ids: &[String]) -> Result<Vec<String>> {
        let ids = video_ids.join(",");
        let videos = self
            .list::<Video>("videos", &[("part", "contentDetails"), ("id", ids.as_str())])
            .await?;

        Ok(videos
            .into_iter()
            .map(|v| v.content_details.duration)
            .collect())
    }

    /// # Errors
    /// Errors on network / authorization / quota errors
    #[instrument(skip(self))]
    pub async fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        let res = self
            .request(reqwest::Method::DELETE, "playlists")?
            .query(&[("id", playlist_id)])
            .send()
            .await
            .context("Deleting playlist")?;
        ensure_success(res, "playlists").await?;

        Ok(())
    }
}

async fn ensure_success(res: Response, resource: &str) -> Result<Response> {
    if res.status().is_success() {
        return Ok(res);
    }

    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    error!("YouTube API `{resource}` returned {status}");
    error!(body);
    bail!("YouTube API `{resource}` request failed with status {status}");
}
