// ABOUTME: Picks the single best URL for an image candidate by a fixed priority order.
// ABOUTME: Also hosts the quality filter (sprite rejection, hi-res size markers) and URL absolutization.

use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;
use url::Url;

use crate::model::{ImageCandidate, LargeImageDescriptor, SrcsetEntry};

/// Substring marking a sprite sheet rather than a product photo.
pub const SPRITE_MARKER: &str = "x-spritesheet";

/// Size tokens denoting variants at least 1500px on the long edge.
pub const HI_RES_MARKERS: &[&str] = &[
    "_SL1500_", "_SX1500_", "_SY1500_", "_UL1500_", "_UX1500_", "_UY1500_", "_SL2000_",
    "_SX2000_", "_SY2000_", "_UL2000_",
];

static HI_RES_MATCHER: Lazy<Option<AhoCorasick>> = Lazy::new(|| AhoCorasick::new(HI_RES_MARKERS).ok());

static SRCSET_ENTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|,)\s*(\S+)\s+(\d+)w\b").unwrap());

/// Which acceptance rules a caller applies to resolved URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityFilter {
    /// Structured records already encode resolution tiers; only sprites are rejected.
    Structured,
    /// DOM scraping also requires a hi-res size marker.
    Dom,
}

impl QualityFilter {
    pub fn accepts(&self, url: &str) -> bool {
        if is_sprite(url) {
            return false;
        }
        match self {
            QualityFilter::Structured => true,
            QualityFilter::Dom => has_hi_res_marker(url),
        }
    }
}

pub fn is_sprite(url: &str) -> bool {
    url.contains(SPRITE_MARKER)
}

pub fn has_hi_res_marker(url: &str) -> bool {
    match HI_RES_MATCHER.as_ref() {
        Some(matcher) => matcher.is_match(url),
        None => HI_RES_MARKERS.iter().any(|m| url.contains(m)),
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Resolves the best URL for `candidate`.
///
/// Priority, first non-empty wins:
/// 1. hi-res override
/// 2. large override
/// 3. large-image descriptor (widest entry; malformed descriptors are logged and skipped)
/// 4. responsive list (widest entry, ties to the first)
/// 5. plain source
pub fn resolve(candidate: &ImageCandidate) -> Option<String> {
    if let Some(url) = non_empty(candidate.hi_res.as_deref()) {
        return Some(url);
    }
    if let Some(url) = non_empty(candidate.large.as_deref()) {
        return Some(url);
    }
    if let Some(url) = candidate.descriptor.as_ref().and_then(resolve_descriptor) {
        return Some(url);
    }
    if let Some(url) = widest(&candidate.responsive) {
        return Some(url);
    }
    non_empty(candidate.src.as_deref())
}

fn resolve_descriptor(descriptor: &LargeImageDescriptor) -> Option<String> {
    match descriptor {
        LargeImageDescriptor::Decoded(entries) => widest(entries),
        LargeImageDescriptor::Encoded(raw) => match decode_descriptor(raw) {
            Ok(entries) => widest(&entries),
            Err(err) => {
                warn!(error = %err, "skipping malformed large-image descriptor");
                None
            }
        },
    }
}

/// Decodes a `{"url": [width, height], ...}` descriptor, keeping document order.
pub fn decode_descriptor(raw: &str) -> Result<Vec<SrcsetEntry>, serde_json::Error> {
    let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(raw.trim())?;
    Ok(descriptor_entries(&map))
}

/// Converts an already-parsed descriptor object into entries. Non-numeric dimensions count as width 0.
pub fn descriptor_entries(map: &serde_json::Map<String, serde_json::Value>) -> Vec<SrcsetEntry> {
    map.iter()
        .map(|(url, dims)| {
            let width = match dims {
                serde_json::Value::Array(items) => items.first().and_then(|w| w.as_u64()),
                serde_json::Value::Number(n) => n.as_u64(),
                _ => None,
            };
            SrcsetEntry {
                url: url.clone(),
                width: width.and_then(|w| u32::try_from(w).ok()).unwrap_or(0),
            }
        })
        .collect()
}

/// Returns the URL of the widest entry; on equal widths the earlier entry wins.
fn widest(entries: &[SrcsetEntry]) -> Option<String> {
    let mut best: Option<&SrcsetEntry> = None;
    for entry in entries.iter().filter(|e| !e.url.trim().is_empty()) {
        match best {
            Some(b) if entry.width <= b.width => {}
            _ => best = Some(entry),
        }
    }
    best.map(|e| e.url.trim().to_string())
}

/// Parses an HTML `srcset` value, keeping only width (`w`) descriptors.
pub fn parse_srcset(srcset: &str) -> Vec<SrcsetEntry> {
    SRCSET_ENTRY_RE
        .captures_iter(srcset)
        .filter_map(|cap| {
            let url = cap.get(1)?.as_str();
            let width = cap.get(2)?.as_str().parse::<u32>().ok()?;
            Some(SrcsetEntry {
                url: url.to_string(),
                width,
            })
        })
        .collect()
}

/// Resolves `raw` against `base` when it is relative or protocol-relative.
///
/// Absolute and `data:` URLs pass through unchanged, as does everything when no base is given.
pub fn absolutize(raw: &str, base: Option<&Url>) -> String {
    let raw = raw.trim();
    if raw.starts_with("http://") || raw.starts_with("https://") || raw.starts_with("data:") {
        return raw.to_string();
    }
    match base.and_then(|b| b.join(raw).ok()) {
        Some(resolved) => resolved.to_string(),
        None => raw.to_string(),
    }
}
