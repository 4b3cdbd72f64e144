// ABOUTME: Structured-data path: finds the embedded JSON media payload inside inline scripts.
// ABOUTME: Produces a MediaDataset; malformed payloads are logged and yield an empty dataset.

//! Structured-data extraction.
//!
//! Product pages embed their gallery as a JavaScript string literal handed to
//! `jQuery.parseJSON`. This module locates that literal, undoes the JS quote
//! escaping, and decodes it into a typed [`MediaDataset`].
//!
//! Key behaviors:
//! - Scripts are scanned in document order; the first one whose payload matches wins.
//! - Every key is optional. Missing keys become empty collections.
//! - Records that are not objects are skipped. Inside a record, a field of the
//!   wrong JSON type reads as absent.
//! - A payload that is present but not valid JSON is reported through `tracing`
//!   and produces an empty dataset so the caller can fall back to the DOM scan.
//! - When there is no payload, or it parses without a `videos` key, other scripts
//!   are searched for a standalone `"videos": [...]` array.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::candidate::{descriptor_entries, parse_srcset};
use crate::error::ExtractError;
use crate::extractors::compiled::get_or_compile;
use crate::model::{
    lenient_object, lenient_string, ImageCandidate, LargeImageDescriptor, MediaDataset,
    VariantImages, VideoRaw,
};

/// Text a script must contain before the payload pattern is tried against it.
pub const PAYLOAD_INTRODUCER: &str = "jQuery.parseJSON";

static PAYLOAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"var\s+obj\s*=\s*jQuery\.parseJSON\('(.+?)'\);").unwrap());

static VIDEOS_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""videos"\s*:\s*\["#).unwrap());

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Payload {
    #[serde(default)]
    color_images: Option<Value>,
    #[serde(default)]
    landing_asin_color: Option<Value>,
    #[serde(default)]
    videos: Option<Value>,
    #[serde(default)]
    color_to_asin: Option<Value>,
}

/// One image record. Fields of the wrong JSON type read as absent so lower priorities still apply.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawImage {
    #[serde(default, deserialize_with = "lenient_string")]
    hi_res: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    large: Option<String>,
    #[serde(default, deserialize_with = "lenient_object")]
    main: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "lenient_string")]
    srcset: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    thumb: Option<String>,
}

impl From<RawImage> for ImageCandidate {
    fn from(raw: RawImage) -> Self {
        ImageCandidate {
            hi_res: raw.hi_res,
            large: raw.large,
            descriptor: raw
                .main
                .map(|m| LargeImageDescriptor::Decoded(descriptor_entries(&m))),
            responsive: raw.srcset.as_deref().map(parse_srcset).unwrap_or_default(),
            src: raw.thumb,
        }
    }
}

/// Extracts the media dataset from raw document text.
pub fn extract(html: &str) -> MediaDataset {
    let doc = Html::parse_document(html);
    extract_from_document(&doc)
}

/// Extracts the media dataset from an already-parsed document.
pub fn extract_from_document(doc: &Html) -> MediaDataset {
    let scripts = script_bodies(doc);

    let payload = match find_payload(&scripts) {
        Some(p) => p,
        None => {
            debug!("no embedded media payload found");
            return MediaDataset {
                videos: find_standalone_videos(&scripts).unwrap_or_default(),
                ..Default::default()
            };
        }
    };

    let (mut dataset, has_videos) = match parse_payload(&payload) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(error = %err, "discarding malformed media payload");
            return MediaDataset::default();
        }
    };

    if !has_videos {
        if let Some(videos) = find_standalone_videos(&scripts) {
            debug!(count = videos.len(), "videos taken from standalone script array");
            dataset.videos = videos;
        }
    }

    dataset
}

/// Text of every `<script>` element in document order.
pub fn script_bodies(doc: &Html) -> Vec<String> {
    let Some(selector) = get_or_compile("script") else {
        return Vec::new();
    };
    doc.select(&selector)
        .map(|el| el.text().collect::<String>())
        .filter(|text| !text.trim().is_empty())
        .collect()
}

/// Returns the unescaped JSON text of the first script carrying the payload.
pub fn find_payload(scripts: &[String]) -> Option<String> {
    scripts
        .iter()
        .filter(|s| s.contains(PAYLOAD_INTRODUCER))
        .find_map(|s| PAYLOAD_RE.captures(s))
        .and_then(|cap| cap.get(1))
        .map(|m| unescape_quotes(m.as_str()))
}

fn unescape_quotes(s: &str) -> String {
    s.replace("\\'", "'").replace("\\\"", "\"")
}

/// Decodes payload JSON into a dataset. The flag reports whether a `videos` key was present.
pub fn parse_payload(json: &str) -> Result<(MediaDataset, bool), ExtractError> {
    let payload: Payload = serde_json::from_str(json).map_err(|e| {
        ExtractError::malformed_payload("embedded media payload", "ParsePayload", Some(e.into()))
    })?;

    let has_videos = payload.videos.as_ref().is_some_and(|v| !v.is_null());
    let dataset = MediaDataset {
        color_images: color_images(payload.color_images),
        videos: payload.videos.map(videos_from_value).unwrap_or_default(),
        landing_asin_color: payload
            .landing_asin_color
            .as_ref()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        color_to_asin: color_to_asin(payload.color_to_asin),
    };
    Ok((dataset, has_videos))
}

fn color_images(value: Option<Value>) -> Vec<VariantImages> {
    let map = match value {
        Some(Value::Object(map)) => map,
        Some(Value::Null) | None => return Vec::new(),
        Some(other) => {
            warn!(kind = json_kind(&other), "colorImages is not an object; ignoring");
            return Vec::new();
        }
    };

    map.into_iter()
        .map(|(name, records)| {
            let images = match records {
                Value::Array(items) => items
                    .into_iter()
                    .filter_map(|item| match serde_json::from_value::<RawImage>(item) {
                        Ok(raw) => Some(ImageCandidate::from(raw)),
                        Err(err) => {
                            debug!(variant = %name, error = %err, "skipping malformed image record");
                            None
                        }
                    })
                    .collect(),
                _ => Vec::new(),
            };
            VariantImages { name, images }
        })
        .collect()
}

fn videos_from_value(value: Value) -> Vec<VideoRaw> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<VideoRaw>(item) {
                Ok(video) => Some(video),
                Err(err) => {
                    debug!(error = %err, "skipping malformed video record");
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn color_to_asin(value: Option<Value>) -> HashMap<String, String> {
    let Some(Value::Object(map)) = value else {
        return HashMap::new();
    };
    map.into_iter()
        .filter_map(|(name, entry)| {
            let id = match &entry {
                Value::String(s) => Some(s.as_str()),
                Value::Object(obj) => obj
                    .get("asin")
                    .or_else(|| obj.get("productId"))
                    .and_then(Value::as_str),
                _ => None,
            }?;
            let id = id.trim();
            if id.is_empty() {
                None
            } else {
                Some((name, id.to_string()))
            }
        })
        .collect()
}

/// Searches scripts for a `"videos": [...]` array and decodes the first that parses.
pub fn find_standalone_videos(scripts: &[String]) -> Option<Vec<VideoRaw>> {
    for script in scripts {
        for m in VIDEOS_KEY_RE.find_iter(script) {
            let start = m.end() - 1;
            let Some(array) = balanced_array(&script[start..]) else {
                continue;
            };
            let parsed = serde_json::from_str::<Value>(array)
                .or_else(|_| serde_json::from_str::<Value>(&unescape_quotes(array)));
            match parsed {
                Ok(value) => return Some(videos_from_value(value)),
                Err(err) => warn!(error = %err, "ignoring malformed standalone videos array"),
            }
        }
    }
    None
}

/// Returns the prefix of `text` (which starts at `[`) up to its matching `]`.
fn balanced_array(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
