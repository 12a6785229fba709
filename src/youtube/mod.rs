//! Upstream playlist plumbing: identifier extraction, duration parsing, the
//! `PlaylistApi` seam, and the page-following / batching drivers on top of it.

pub mod client;

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::error::ImportError;

/// Upstream hard cap for both list-page size and per-request detail lookups.
pub const MAX_PAGE_SIZE: usize = 50;

/// One playlist entry as fetched upstream. Transient; nothing persists this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistItem {
    pub video_id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
}

/// One page of playlist items plus the opaque continuation token, when the
/// upstream has more to give.
#[derive(Debug, Clone, Default)]
pub struct PlaylistPage {
    pub items: Vec<PlaylistItem>,
    pub next_page_token: Option<String>,
}

/// Raw per-video detail as returned by the lookup endpoint. The duration
/// string is parsed later so mocks can hand back arbitrary encodings.
#[derive(Debug, Clone)]
pub struct VideoDetail {
    pub video_id: String,
    pub duration: String,
}

/// Seam over the two read-only upstream endpoints. The reqwest client in
/// [`client`] is the production implementation; tests mock this directly.
#[async_trait]
pub trait PlaylistApi: Send + Sync {
    /// Fetch one page of playlist items, following `page_token` when given.
    async fn list_playlist_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
    ) -> Result<PlaylistPage, ImportError>;

    /// Fetch details for up to [`MAX_PAGE_SIZE`] video ids in one request.
    async fn list_video_details(&self, video_ids: &[String])
        -> Result<Vec<VideoDetail>, ImportError>;
}

/// Normalize a raw user-supplied string (full URL or bare ID) into the
/// canonical playlist identifier.
///
/// Reads the first non-empty `list` query parameter when the input parses as
/// a URL; otherwise the trimmed input round-trips unchanged. Never errors:
/// a malformed identifier simply fails later at the upstream call.
pub fn extract_playlist_id(url_or_id: &str) -> String {
    if let Ok(url) = url::Url::parse(url_or_id.trim()) {
        if let Some((_, v)) = url.query_pairs().find(|(k, v)| k == "list" && !v.is_empty()) {
            return v.into_owned();
        }
    }
    url_or_id.trim().to_string()
}

/// Parse the `PT[nH][nM][nS]` subset of ISO-8601 durations into whole
/// seconds. All three components are optional; `PT0S` is zero. Malformed or
/// unparseable input degrades to 0 ("duration unknown"), never an error.
pub fn parse_iso8601_duration(raw: &str) -> u32 {
    let Some(rest) = raw.trim().strip_prefix("PT") else {
        return 0;
    };
    let mut total: u64 = 0;
    let mut digits = String::new();
    for ch in rest.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let Ok(value) = digits.parse::<u64>() else {
            return 0;
        };
        digits.clear();
        match ch {
            'H' => total += value * 3600,
            'M' => total += value * 60,
            'S' => total += value,
            _ => return 0,
        }
    }
    if !digits.is_empty() {
        // Trailing digits without a unit letter: malformed.
        return 0;
    }
    u32::try_from(total).unwrap_or(0)
}

/// Drive the listing endpoint page by page until the continuation token runs
/// out, returning every item in upstream order.
///
/// A page with zero items and no token terminates normally (empty playlist).
/// Any upstream failure aborts the whole fetch; callers re-invoke from the
/// start rather than resuming mid-sequence.
pub async fn fetch_playlist_items(
    api: &dyn PlaylistApi,
    playlist_id: &str,
) -> Result<Vec<PlaylistItem>, ImportError> {
    let mut items: Vec<PlaylistItem> = Vec::new();
    let mut token: Option<String> = None;
    let mut pages = 0u32;
    loop {
        let page = api.list_playlist_page(playlist_id, token.as_deref()).await?;
        pages += 1;
        debug!(playlist_id, page = pages, count = page.items.len(), "playlist page fetched");
        items.extend(page.items);
        match page.next_page_token {
            Some(t) => token = Some(t),
            None => break,
        }
    }
    debug!(playlist_id, pages, total = items.len(), "playlist fetch complete");
    Ok(items)
}

/// Resolve durations for `video_ids` in batches of at most [`MAX_PAGE_SIZE`].
///
/// Ids absent from every response are simply missing from the map; callers
/// treat "missing" as duration-unknown (0). One failed batch aborts the whole
/// resolve with no partial map.
pub async fn resolve_durations(
    api: &dyn PlaylistApi,
    video_ids: &[String],
) -> Result<HashMap<String, u32>, ImportError> {
    let mut out: HashMap<String, u32> = HashMap::with_capacity(video_ids.len());
    for chunk in video_ids.chunks(MAX_PAGE_SIZE) {
        let details = api.list_video_details(chunk).await?;
        debug!(requested = chunk.len(), returned = details.len(), "duration batch resolved");
        for detail in details {
            out.insert(detail.video_id, parse_iso8601_duration(&detail.duration));
        }
    }
    Ok(out)
}
