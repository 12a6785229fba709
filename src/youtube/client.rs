//! reqwest-backed `PlaylistApi` implementation against the YouTube Data API
//! v3. The credential rides along as the `key` query parameter on every
//! request; any non-success status is terminal for the in-flight call.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;

use super::{PlaylistApi, PlaylistItem, PlaylistPage, VideoDetail, MAX_PAGE_SIZE};
use crate::error::ImportError;
use crate::util::env;

const PLAYLIST_ITEMS_URL: &str = "https://www.googleapis.com/youtube/v3/playlistItems";
const VIDEOS_URL: &str = "https://www.googleapis.com/youtube/v3/videos";

pub struct YouTubeClient {
    http: reqwest::Client,
    api_key: String,
}

impl YouTubeClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ImportError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ImportError::Input("YouTube API key is empty".to_string()));
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, api_key })
    }

    /// Build from `YOUTUBE_API_KEY` / `HTTP_TIMEOUT_SECS`. Fails fast when
    /// the credential is absent; there is no embedded fallback key.
    pub fn from_env() -> Result<Self, ImportError> {
        let key = env::youtube_api_key().map_err(|e| ImportError::Input(e.to_string()))?;
        Self::new(key, Duration::from_secs(env::http_timeout_secs()))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ImportError> {
        let resp = self.http.get(url).query(query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(%status, url, "upstream request failed");
            return Err(ImportError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json::<T>().await?)
    }
}

#[async_trait]
impl PlaylistApi for YouTubeClient {
    async fn list_playlist_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
    ) -> Result<PlaylistPage, ImportError> {
        let page_size = MAX_PAGE_SIZE.to_string();
        let mut query = vec![
            ("key", self.api_key.as_str()),
            ("part", "snippet,contentDetails"),
            ("playlistId", playlist_id),
            ("maxResults", page_size.as_str()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }
        let resp: PlaylistItemsResponse = self.get_json(PLAYLIST_ITEMS_URL, &query).await?;
        Ok(PlaylistPage {
            items: resp.items.into_iter().filter_map(convert_item).collect(),
            next_page_token: resp.next_page_token,
        })
    }

    async fn list_video_details(
        &self,
        video_ids: &[String],
    ) -> Result<Vec<VideoDetail>, ImportError> {
        let ids = video_ids.join(",");
        let page_size = MAX_PAGE_SIZE.to_string();
        let query = [
            ("key", self.api_key.as_str()),
            ("part", "contentDetails"),
            ("id", ids.as_str()),
            ("maxResults", page_size.as_str()),
        ];
        let resp: VideosResponse = self.get_json(VIDEOS_URL, &query).await?;
        Ok(resp.items.into_iter().filter_map(convert_video).collect())
    }
}

/// Rows without an id are dropped; a missing duration field reads as `PT0S`.
fn convert_video(raw: RawVideo) -> Option<VideoDetail> {
    Some(VideoDetail {
        video_id: raw.id?,
        duration: raw
            .content_details
            .and_then(|c| c.duration)
            .unwrap_or_else(|| "PT0S".to_string()),
    })
}

/// Entries without an extractable video id are malformed upstream rows and
/// silently dropped.
fn convert_item(raw: RawPlaylistItem) -> Option<PlaylistItem> {
    let video_id = raw.content_details?.video_id?;
    if video_id.is_empty() {
        return None;
    }
    let snippet = raw.snippet.unwrap_or_default();
    let thumbnail_url = snippet.thumbnails.as_ref().and_then(pick_thumbnail);
    Some(PlaylistItem {
        video_id,
        title: snippet.title,
        thumbnail_url,
    })
}

/// Best available resolution wins; having none at all is fine ("no
/// thumbnail"), not an error.
fn pick_thumbnail(set: &ThumbnailSet) -> Option<String> {
    [
        &set.maxres,
        &set.standard,
        &set.high,
        &set.medium,
        &set.default,
    ]
    .into_iter()
    .find_map(|t| t.as_ref().and_then(|t| t.url.clone()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<RawPlaylistItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlaylistItem {
    snippet: Option<Snippet>,
    content_details: Option<ItemContentDetails>,
}

#[derive(Debug, Default, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
    thumbnails: Option<ThumbnailSet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemContentDetails {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThumbnailSet {
    maxres: Option<Thumbnail>,
    standard: Option<Thumbnail>,
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<RawVideo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVideo {
    id: Option<String>,
    content_details: Option<VideoContentDetails>,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    duration: Option<String>,
}
