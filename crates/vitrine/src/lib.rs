// ABOUTME: Main library entry point for Vitrine, a product-media extraction engine.
// ABOUTME: Re-exports the public API: Extractor, ExtractorBuilder, MediaBundle, ExtractError, ErrorCode, Options.

//! Vitrine - extracts product images, variant images and videos from product pages.
//!
//! A document is read through its embedded structured payload first; when that yields
//! nothing and fallback is permitted, known gallery regions of the DOM are scanned
//! instead. The result is a [`MediaBundle`] with main images, variant images, videos
//! and the variant registry.
//!
//! # Example
//!
//! ```no_run
//! use vitrine::{Extractor, ExtractError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ExtractError> {
//!     let extractor = Extractor::builder().build();
//!     let bundle = extractor.fetch_bundle("https://shop.example.com/dp/B000000000").await?;
//!     for row in bundle.records() {
//!         println!("{},{},{}", row.url, row.kind, row.variant);
//!     }
//!     Ok(())
//! }
//! ```

pub mod candidate;
pub mod dedup;
pub mod error;
pub mod extractor;
pub mod extractors;
pub mod model;
pub mod options;
pub mod prepare;
pub mod protocol;
pub mod resource;
pub mod variants;
pub mod videos;

pub use crate::error::{ErrorCode, ExtractError};
pub use crate::extractor::{aggregate, Extractor};
pub use crate::model::{
    ExportRow, ImageCandidate, MediaBundle, MediaDataset, MediaKind, MediaRecord, Variant,
    VideoRaw, VideoRecord,
};
pub use crate::options::{ExtractorBuilder, Options};
pub use crate::prepare::{prepare, CancelFlag, PrepareReport, ThumbnailActivator};
pub use crate::protocol::{Request, Response};
