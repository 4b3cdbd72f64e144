// ABOUTME: Determines the default variant and partitions structured images into main and variant buckets.
// ABOUTME: Builds the variant registry (name, default flag, product id) in dataset order.

use std::collections::BTreeMap;

use tracing::debug;
use url::Url;

use crate::candidate::{self, absolutize, QualityFilter};
use crate::dedup::UrlBucket;
use crate::model::{MediaDataset, MediaKind, MediaRecord, Variant};

/// Product id reported for variants the payload does not map.
pub const UNKNOWN_PRODUCT_ID: &str = "N/A";

const MAIN_ALT: &str = "Product Image";
const VARIANT_ALT: &str = "Variant Image";

/// Output of [`resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantResolution {
    pub main_images: Vec<MediaRecord>,
    pub variant_images: Vec<MediaRecord>,
    pub variants: BTreeMap<String, Variant>,
    pub default_variant: String,
}

/// The landing color when it names a known variant, otherwise the first variant in dataset order.
pub fn default_variant(dataset: &MediaDataset) -> Option<&str> {
    if let Some(landing) = dataset.landing_asin_color.as_deref() {
        if dataset.has_variant(landing) {
            return Some(landing);
        }
        debug!(landing, "landing color is not a colorImages key; using first variant");
    }
    dataset.color_images.first().map(|v| v.name.as_str())
}

/// Partitions every structured image into main (default variant) and variant buckets.
pub fn resolve(dataset: &MediaDataset) -> VariantResolution {
    resolve_with_base(dataset, None)
}

/// Like [`resolve`], resolving relative image URLs against `base` before deduplication.
///
/// A URL admitted to the main bucket is never emitted as a variant image, even when
/// the variant listing it comes first in the dataset.
pub fn resolve_with_base(dataset: &MediaDataset, base: Option<&Url>) -> VariantResolution {
    let default = default_variant(dataset).unwrap_or_default().to_string();

    let mut variants = BTreeMap::new();
    let mut main = UrlBucket::new();
    let mut others = Vec::new();

    for set in &dataset.color_images {
        let is_default = set.name == default;
        variants.insert(
            set.name.clone(),
            Variant {
                name: set.name.clone(),
                is_default,
                product_id: dataset
                    .color_to_asin
                    .get(&set.name)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_PRODUCT_ID.to_string()),
            },
        );

        for image in &set.images {
            let Some(url) = candidate::resolve(image) else {
                continue;
            };
            let url = absolutize(&url, base);
            if !QualityFilter::Structured.accepts(&url) {
                debug!(%url, variant = %set.name, "skipping sprite image");
                continue;
            }

            if is_default {
                main.push(MediaRecord {
                    url,
                    alt: MAIN_ALT.to_string(),
                    kind: MediaKind::Main,
                    variant: Some(set.name.clone()),
                });
            } else {
                others.push(MediaRecord {
                    url,
                    alt: VARIANT_ALT.to_string(),
                    kind: MediaKind::Variant,
                    variant: Some(set.name.clone()),
                });
            }
        }
    }

    let mut variant_bucket = UrlBucket::new();
    for record in others {
        if main.contains(&record.url) {
            continue;
        }
        variant_bucket.push(record);
    }

    VariantResolution {
        main_images: main.into_vec(),
        variant_images: variant_bucket.into_vec(),
        variants,
        default_variant: default,
    }
}
