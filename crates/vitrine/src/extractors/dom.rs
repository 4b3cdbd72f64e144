// ABOUTME: DOM fallback path: scans known gallery and variant-thumbnail regions for hi-res images.
// ABOUTME: Used when no structured payload is available; applies the DOM quality filter per element.

//! DOM fallback extraction.
//!
//! Two disjoint regions are scanned in document order:
//! - the main gallery (several known container selectors), emitting `plain` records;
//! - the variant thumbnails (twister/variation selectors), emitting `variant` records.
//!
//! Regions are positional. The DOM does not expose the variant names the
//! structured payload uses, so records from this path never carry a variant name.

use std::collections::HashSet;

use ego_tree::NodeId;
use scraper::{ElementRef, Html};
use tracing::debug;

use crate::candidate::{parse_srcset, resolve, QualityFilter};
use crate::dedup::UrlBucket;
use crate::extractors::compiled::compile_all;
use crate::model::{ImageCandidate, LargeImageDescriptor, MediaKind, MediaRecord};

/// Containers holding the main product gallery.
pub const GALLERY_SELECTORS: &[&str] = &[
    "#altImages img",
    "#imageBlock img",
    "#main-image-container img",
    "#imgTagWrapperId img",
    ".imgTagWrapper img",
];

/// Containers holding variant (color/style) thumbnails.
pub const VARIANT_SELECTORS: &[&str] = &[
    "#twister img",
    "#variation_color_name img",
    "#variation_style_name img",
    ".twister-plus-buying-options img",
    "#inline-twister-expander-content-color_name img",
];

const HI_RES_ATTRS: &[&str] = &["data-old-hires"];
const LARGE_ATTRS: &[&str] = &["data-a-hires", "data-zoom-image"];
const DESCRIPTOR_ATTRS: &[&str] = &["data-a-dynamic-image"];
const SRCSET_ATTRS: &[&str] = &["srcset", "data-srcset"];
const SRC_ATTRS: &[&str] = &["src", "data-src"];

const GALLERY_ALT: &str = "Product Image";
const VARIANT_ALT: &str = "Variant Image";

/// Images found by the DOM scan, split by region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomMedia {
    pub images: Vec<MediaRecord>,
    pub variant_images: Vec<MediaRecord>,
}

impl DomMedia {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.variant_images.is_empty()
    }
}

/// Extracts gallery and variant images from raw document text.
pub fn extract(html: &str) -> DomMedia {
    let doc = Html::parse_document(html);
    extract_from_document(&doc)
}

/// Extracts gallery and variant images from a parsed document.
pub fn extract_from_document(doc: &Html) -> DomMedia {
    let mut claimed = HashSet::new();

    let images = scan_region(doc, GALLERY_SELECTORS, MediaKind::Plain, GALLERY_ALT, &mut claimed);
    let variant_images = scan_region(
        doc,
        VARIANT_SELECTORS,
        MediaKind::Variant,
        VARIANT_ALT,
        &mut claimed,
    );

    debug!(
        gallery = images.len(),
        variants = variant_images.len(),
        "DOM fallback scan complete"
    );

    DomMedia {
        images,
        variant_images,
    }
}

/// Scans every selector of one region, skipping elements an earlier region already claimed.
fn scan_region(
    doc: &Html,
    selectors: &[&str],
    kind: MediaKind,
    default_alt: &str,
    claimed: &mut HashSet<NodeId>,
) -> Vec<MediaRecord> {
    let mut bucket = UrlBucket::new();

    for selector in compile_all(selectors) {
        for el in doc.select(&selector) {
            if !claimed.insert(el.id()) {
                continue;
            }
            let Some(url) = resolve(&candidate_from_element(&el)) else {
                continue;
            };
            if !QualityFilter::Dom.accepts(&url) {
                continue;
            }
            bucket.push(MediaRecord {
                url,
                alt: element_alt(&el).unwrap_or_else(|| default_alt.to_string()),
                kind,
                variant: None,
            });
        }
    }

    bucket.into_vec()
}

/// Reads every URL-bearing attribute of an image element into a candidate.
pub fn candidate_from_element(el: &ElementRef<'_>) -> ImageCandidate {
    let attr = |names: &[&str]| -> Option<String> {
        names
            .iter()
            .filter_map(|name| el.value().attr(name))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(str::to_string)
    };

    ImageCandidate {
        hi_res: attr(HI_RES_ATTRS),
        large: attr(LARGE_ATTRS),
        descriptor: attr(DESCRIPTOR_ATTRS).map(LargeImageDescriptor::Encoded),
        responsive: attr(SRCSET_ATTRS)
            .map(|s| parse_srcset(&s))
            .unwrap_or_default(),
        src: attr(SRC_ATTRS).filter(|s| !s.starts_with("data:")),
    }
}

fn element_alt(el: &ElementRef<'_>) -> Option<String> {
    el.value()
        .attr("alt")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HI_A: &str = "https://m.example.com/images/I/71aaa._AC_SL1500_.jpg";
    const HI_B: &str = "https://m.example.com/images/I/71bbb._AC_SX1500_.jpg";
    const THUMB: &str = "https://m.example.com/images/I/71aaa._AC_US40_.jpg";

    #[test]
    fn gallery_uses_hi_res_attribute_over_src() {
        let html = format!(
            r#"<div id="imgTagWrapperId"><img src="{THUMB}" data-old-hires="{HI_A}" alt="Blue mug"></div>"#
        );
        let media = extract(&html);
        assert_eq!(
            media.images,
            vec![MediaRecord {
                url: HI_A.to_string(),
                alt: "Blue mug".to_string(),
                kind: MediaKind::Plain,
                variant: None,
            }]
        );
        assert!(media.variant_images.is_empty());
    }

    #[test]
    fn dynamic_image_descriptor_is_parsed() {
        let descriptor = format!(r#"{{"{THUMB}":[40,40],"{HI_B}":[1500,1500]}}"#)
            .replace('"', "&quot;");
        let html = format!(
            r#"<div id="main-image-container"><img src="{THUMB}" data-a-dynamic-image="{descriptor}"></div>"#
        );
        let media = extract(&html);
        assert_eq!(media.images.len(), 1);
        assert_eq!(media.images[0].url, HI_B);
        assert_eq!(media.images[0].alt, "Product Image");
    }

    #[test]
    fn thumbnails_without_size_marker_are_rejected() {
        let html = format!(r#"<div id="altImages"><img src="{THUMB}"></div>"#);
        assert!(extract(&html).is_empty());
    }

    #[test]
    fn sprites_are_rejected_even_with_marker() {
        let html = r#"<div id="altImages"><img src="https://m.example.com/G/x-spritesheet._SL1500_.png"></div>"#;
        assert!(extract(html).is_empty());
    }

    #[test]
    fn duplicates_within_region_are_dropped() {
        let html = format!(
            r#"<div id="imageBlock"><div id="altImages"><img src="{HI_A}"><img data-old-hires="{HI_A}" src="{THUMB}"></div></div>"#
        );
        let media = extract(&html);
        assert_eq!(media.images.len(), 1);
    }

    #[test]
    fn variant_region_emits_variant_records() {
        let html = format!(
            r#"<div id="altImages"><img src="{HI_A}"></div>
               <div id="twister"><ul><li><img src="{HI_B}" alt="Red"></li></ul></div>"#
        );
        let media = extract(&html);
        assert_eq!(media.images.len(), 1);
        assert_eq!(media.variant_images.len(), 1);
        assert_eq!(media.variant_images[0].kind, MediaKind::Variant);
        assert_eq!(media.variant_images[0].alt, "Red");
        assert_eq!(media.variant_images[0].variant, None);
    }

    #[test]
    fn element_claimed_by_gallery_is_not_rescanned() {
        let html = format!(r#"<div id="imageBlock"><div id="twister"><img src="{HI_A}"></div></div>"#);
        let media = extract(&html);
        assert_eq!(media.images.len(), 1);
        assert!(media.variant_images.is_empty());
    }

    #[test]
    fn responsive_list_used_when_no_overrides() {
        let html = format!(
            r#"<div class="imgTagWrapper"><img src="{THUMB}" srcset="{THUMB} 40w, {HI_B} 1500w"></div>"#
        );
        let media = extract(&html);
        assert_eq!(media.images[0].url, HI_B);
    }

    #[test]
    fn data_uri_placeholders_are_not_sources() {
        let html = r#"<div id="altImages"><img src="data:image/gif;base64,R0lGOD_SL1500_"></div>"#;
        assert!(extract(html).is_empty());
    }
}
