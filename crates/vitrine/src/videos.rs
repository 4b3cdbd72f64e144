// ABOUTME: Normalizes raw video records: thumbnail fallback chain, HLS detection, title and duration labels.
// ABOUTME: Deduplicates by URL value, keeping the first occurrence.

use tracing::debug;
use url::Url;

use crate::candidate::absolutize;
use crate::dedup::UrlBucket;
use crate::model::{VideoRaw, VideoRecord};

/// Title used when a video has none.
pub const UNTITLED: &str = "Untitled";

/// Duration label used when the length is zero or unknown.
pub const UNKNOWN_DURATION: &str = "Unknown";

const HLS_MARKER: &str = ".m3u8";

/// Normalizes every raw video with a non-empty URL.
pub fn normalize(videos: &[VideoRaw]) -> Vec<VideoRecord> {
    normalize_with_base(videos, None)
}

/// Like [`normalize`], resolving relative video and thumbnail URLs against `base`.
pub fn normalize_with_base(videos: &[VideoRaw], base: Option<&Url>) -> Vec<VideoRecord> {
    let mut bucket = UrlBucket::new();

    for raw in videos {
        let url = raw.url.trim();
        if url.is_empty() {
            continue;
        }
        let url = absolutize(url, base);
        let thumbnail_url = match thumbnail_url(raw) {
            Some(t) => absolutize(&t, base),
            None => String::new(),
        };

        let kept = bucket.push(VideoRecord {
            is_segmented: is_segmented(&url),
            title: raw
                .title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(UNTITLED)
                .to_string(),
            duration: format_duration(raw.duration_seconds),
            thumbnail_url,
            url,
        });
        if !kept {
            debug!(url = %raw.url, "dropping duplicate video");
        }
    }

    bucket.into_vec()
}

/// Thumbnail priority: slate image, nested `large`, nested `thumb`, flat `thumbUrl`.
pub fn thumbnail_url(raw: &VideoRaw) -> Option<String> {
    let nested = raw.thumbnail.as_ref();
    [
        raw.slate_url.as_deref(),
        nested.and_then(|t| t.large.as_deref()),
        nested.and_then(|t| t.thumb.as_deref()),
        raw.thumb_url.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .find(|s| !s.is_empty())
    .map(str::to_string)
}

/// True for HLS playlists.
pub fn is_segmented(url: &str) -> bool {
    url.contains(HLS_MARKER)
}

/// Formats seconds as `M:SS`; zero or absent becomes "Unknown".
pub fn format_duration(seconds: Option<u64>) -> String {
    match seconds {
        None | Some(0) => UNKNOWN_DURATION.to_string(),
        Some(total) => format!("{}:{:02}", total / 60, total % 60),
    }
}
