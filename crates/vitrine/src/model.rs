// ABOUTME: Data model for extracted product media: candidates, datasets, records and the final bundle.
// ABOUTME: MediaBundle is the value handed to presentation/export consumers, with flattening helpers.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One entry of a responsive candidate list: a URL and its declared pixel width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrcsetEntry {
    pub url: String,
    pub width: u32,
}

/// A large-image descriptor mapping URLs to dimensions.
///
/// The DOM carries it as JSON text inside an attribute, so it may still need a
/// nested parse when the resolver reaches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LargeImageDescriptor {
    Encoded(String),
    Decoded(Vec<SrcsetEntry>),
}

/// Every place a single image might declare its URL. Read once from the source, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageCandidate {
    pub hi_res: Option<String>,
    pub large: Option<String>,
    pub descriptor: Option<LargeImageDescriptor>,
    pub responsive: Vec<SrcsetEntry>,
    pub src: Option<String>,
}

/// The image candidates published for one variant, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantImages {
    pub name: String,
    pub images: Vec<ImageCandidate>,
}

/// Nested thumbnail object carried by some video records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VideoThumbnail {
    #[serde(default, deserialize_with = "lenient_string")]
    pub large: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub thumb: Option<String>,
}

/// A video record as published by the source, before normalization.
///
/// Only `url` matters for admission; every other field of the wrong JSON type reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRaw {
    #[serde(default, deserialize_with = "string_or_empty")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub thumb_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub slate_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_thumbnail")]
    pub thumbnail: Option<VideoThumbnail>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub duration_seconds: Option<u64>,
}

/// Reads a string field; any other JSON type counts as absent.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

/// Reads an object field; any other JSON type counts as absent.
pub(crate) fn lenient_object<'de, D>(deserializer: D) -> Result<Option<Map<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    })
}

fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}

fn lenient_thumbnail<'de, D>(deserializer: D) -> Result<Option<VideoThumbnail>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_object(deserializer)?
        .and_then(|map| serde_json::from_value(Value::Object(map)).ok()))
}

/// Accepts integer, fractional (floored) or numeric-string second counts.
fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.floor() as u64)),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().and_then(|f| {
            if f >= 0.0 {
                Some(f.floor() as u64)
            } else {
                None
            }
        }),
        _ => None,
    })
}

/// Everything the structured-data path found, produced fresh per extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaDataset {
    pub color_images: Vec<VariantImages>,
    pub videos: Vec<VideoRaw>,
    pub landing_asin_color: Option<String>,
    pub color_to_asin: HashMap<String, String>,
}

impl MediaDataset {
    /// True when there are no variants and no videos.
    pub fn is_empty(&self) -> bool {
        self.color_images.is_empty() && self.videos.is_empty()
    }

    /// Variant names in dataset order.
    pub fn variant_names(&self) -> impl Iterator<Item = &str> {
        self.color_images.iter().map(|v| v.name.as_str())
    }

    /// Returns true if `name` is a variant key of `color_images`.
    pub fn has_variant(&self, name: &str) -> bool {
        self.color_images.iter().any(|v| v.name == name)
    }
}

/// Which bucket a media record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Main,
    Variant,
    Plain,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MediaKind::Main => "main",
            MediaKind::Variant => "variant",
            MediaKind::Plain => "plain",
        };
        write!(f, "{}", s)
    }
}

/// A single image in the final bundle. Two records are duplicates iff their URLs match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub url: String,
    pub alt: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// A normalized video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub url: String,
    pub thumbnail_url: String,
    pub is_segmented: bool,
    pub title: String,
    pub duration: String,
}

/// A selectable product style/color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub name: String,
    pub is_default: bool,
    pub product_id: String,
}

/// The canonical result of one extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaBundle {
    pub main_images: Vec<MediaRecord>,
    pub variant_images: Vec<MediaRecord>,
    pub videos: Vec<VideoRecord>,
    pub variants: BTreeMap<String, Variant>,
    pub default_variant: String,
}

/// One flattened row in the `URL, Type, Variant` shape export consumers read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow<'a> {
    pub url: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub variant: &'a str,
}

impl MediaBundle {
    /// Returns true if neither path found anything. Presentation renders this as "nothing found".
    pub fn is_empty(&self) -> bool {
        self.main_images.is_empty() && self.variant_images.is_empty() && self.videos.is_empty()
    }

    /// Number of image records across both buckets.
    pub fn image_count(&self) -> usize {
        self.main_images.len() + self.variant_images.len()
    }

    /// Videos delivered as HLS playlists.
    pub fn segmented_videos(&self) -> impl Iterator<Item = &VideoRecord> {
        self.videos.iter().filter(|v| v.is_segmented)
    }

    /// Look up a variant by name.
    pub fn variant(&self, name: &str) -> Option<&Variant> {
        self.variants.get(name)
    }

    /// Flatten images then videos into export rows.
    pub fn records(&self) -> Vec<ExportRow<'_>> {
        let images = self
            .main_images
            .iter()
            .chain(self.variant_images.iter())
            .map(|r| ExportRow {
                url: &r.url,
                kind: match r.kind {
                    MediaKind::Main => "main",
                    MediaKind::Variant => "variant",
                    MediaKind::Plain => "plain",
                },
                variant: r.variant.as_deref().unwrap_or(""),
            });
        let videos = self.videos.iter().map(|v| ExportRow {
            url: &v.url,
            kind: "video",
            variant: "",
        });
        images.chain(videos).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(url: &str, kind: MediaKind, variant: Option<&str>) -> MediaRecord {
        MediaRecord {
            url: url.to_string(),
            alt: "Product Image".to_string(),
            kind,
            variant: variant.map(String::from),
        }
    }

    #[test]
    fn empty_bundle_is_empty() {
        let bundle = MediaBundle::default();
        assert!(bundle.is_empty());
        assert_eq!(bundle.image_count(), 0);
        assert!(bundle.records().is_empty());
    }

    #[test]
    fn records_flatten_in_bucket_order() {
        let bundle = MediaBundle {
            main_images: vec![record("a.jpg", MediaKind::Main, Some("Red"))],
            variant_images: vec![record("b.jpg", MediaKind::Variant, Some("Blue"))],
            videos: vec![VideoRecord {
                url: "v.m3u8".to_string(),
                thumbnail_url: String::new(),
                is_segmented: true,
                title: "Untitled".to_string(),
                duration: "Unknown".to_string(),
            }],
            ..Default::default()
        };

        let rows = bundle.records();
        assert_eq!(
            rows,
            vec![
                ExportRow { url: "a.jpg", kind: "main", variant: "Red" },
                ExportRow { url: "b.jpg", kind: "variant", variant: "Blue" },
                ExportRow { url: "v.m3u8", kind: "video", variant: "" },
            ]
        );
        assert_eq!(bundle.segmented_videos().count(), 1);
        assert!(!bundle.is_empty());
    }

    #[test]
    fn bundle_serializes_with_camel_case_keys() {
        let bundle = MediaBundle {
            main_images: vec![record("a.jpg", MediaKind::Main, Some("Red"))],
            default_variant: "Red".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&bundle).unwrap();
        assert_eq!(json["defaultVariant"], "Red");
        assert_eq!(json["mainImages"][0]["type"], "main");
        assert_eq!(json["mainImages"][0]["variant"], "Red");
        assert!(json["variantImages"].as_array().unwrap().is_empty());
    }

    #[test]
    fn plain_record_omits_variant_key() {
        let json = serde_json::to_value(record("x.jpg", MediaKind::Plain, None)).unwrap();
        assert_eq!(json["type"], "plain");
        assert!(json.get("variant").is_none());
    }

    #[test]
    fn video_raw_accepts_loose_duration_shapes() {
        let v: VideoRaw = serde_json::from_str(r#"{"url":"a.mp4","durationSeconds":125.9}"#).unwrap();
        assert_eq!(v.duration_seconds, Some(125));

        let v: VideoRaw = serde_json::from_str(r#"{"url":"a.mp4","durationSeconds":"59"}"#).unwrap();
        assert_eq!(v.duration_seconds, Some(59));

        let v: VideoRaw = serde_json::from_str(r#"{"url":null,"durationSeconds":null}"#).unwrap();
        assert_eq!(v.url, "");
        assert_eq!(v.duration_seconds, None);
    }

    #[test]
    fn video_raw_wrong_typed_fields_read_as_absent() {
        let v: VideoRaw = serde_json::from_str(
            r#"{"url":"v.mp4","title":7,"thumbUrl":false,"slateUrl":["s.jpg"],"thumbnail":"t.jpg"}"#,
        )
        .unwrap();
        assert_eq!(
            v,
            VideoRaw {
                url: "v.mp4".to_string(),
                ..Default::default()
            }
        );

        let v: VideoRaw =
            serde_json::from_str(r#"{"url":3,"thumbnail":{"large":1,"thumb":"n.jpg"}}"#).unwrap();
        assert_eq!(v.url, "");
        assert_eq!(
            v.thumbnail,
            Some(VideoThumbnail {
                large: None,
                thumb: Some("n.jpg".to_string()),
            })
        );
    }

    #[test]
    fn dataset_emptiness_counts_variants_and_videos() {
        let mut ds = MediaDataset::default();
        assert!(ds.is_empty());

        ds.videos.push(VideoRaw {
            url: "a.mp4".to_string(),
            ..Default::default()
        });
        assert!(!ds.is_empty());

        let ds = MediaDataset {
            color_images: vec![VariantImages {
                name: "Red".to_string(),
                images: vec![],
            }],
            ..Default::default()
        };
        assert!(!ds.is_empty());
        assert!(ds.has_variant("Red"));
        assert_eq!(ds.variant_names().collect::<Vec<_>>(), vec!["Red"]);
    }
}
