// ABOUTME: The Extractor orchestrates structured extraction, DOM fallback, variant resolution and video normalization.
// ABOUTME: Provides aggregate() over a supplied document and async fetch_bundle() for pages loaded over HTTP.

use std::net::ToSocketAddrs;

use once_cell::sync::OnceCell;
use scraper::Html;
use tracing::{debug, warn};
use url::Url;

use crate::candidate::absolutize;
use crate::dedup::UrlBucket;
use crate::error::ExtractError;
use crate::extractors::{dom, structured};
use crate::model::{MediaBundle, MediaRecord};
use crate::options::{ExtractorBuilder, Options, MAX_SETTLE_DELAY};
use crate::prepare::{self, CancelFlag, PrepareReport, ThumbnailActivator};
use crate::resource::{fetch, is_private_ip, FetchOptions};
use crate::{variants, videos};

/// Aggregates one document into a [`MediaBundle`] with default options.
///
/// `allow_fallback` permits the DOM scan when the structured payload yields nothing.
pub fn aggregate(html: &str, allow_fallback: bool) -> MediaBundle {
    Extractor::builder()
        .allow_dom_fallback(allow_fallback)
        .build()
        .aggregate(html)
}

/// Turns product documents into media bundles.
///
/// The HTTP client is built on first fetch, so document-only use never touches the network stack.
pub struct Extractor {
    opts: Options,
    http_client: OnceCell<reqwest::Client>,
}

impl Extractor {
    /// Create a new ExtractorBuilder for configuring the extractor.
    pub fn builder() -> ExtractorBuilder {
        ExtractorBuilder::new()
    }

    /// Create a new Extractor with the given options. The settle delay is capped at [`MAX_SETTLE_DELAY`].
    pub fn new(mut opts: Options) -> Self {
        opts.settle_delay = opts.settle_delay.min(MAX_SETTLE_DELAY);
        let http_client = OnceCell::new();
        if let Some(client) = opts.http_client.clone() {
            let _ = http_client.set(client);
        }
        Self { opts, http_client }
    }

    fn http_client(&self) -> &reqwest::Client {
        self.http_client.get_or_init(|| build_http_client(&self.opts))
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// Aggregates raw document text. Pure: no I/O, never fails.
    pub fn aggregate(&self, html: &str) -> MediaBundle {
        let doc = Html::parse_document(html);
        self.aggregate_document(&doc)
    }

    /// Aggregates an already-parsed document.
    pub fn aggregate_document(&self, doc: &Html) -> MediaBundle {
        self.aggregate_with_base(doc, self.opts.base_url.as_ref())
    }

    fn aggregate_with_base(&self, doc: &Html, base: Option<&Url>) -> MediaBundle {
        let dataset = structured::extract_from_document(doc);

        let resolution = variants::resolve_with_base(&dataset, base);
        let mut bundle = MediaBundle {
            main_images: resolution.main_images,
            variant_images: resolution.variant_images,
            videos: videos::normalize_with_base(&dataset.videos, base),
            variants: resolution.variants,
            default_variant: resolution.default_variant,
        };

        if dataset.is_empty() && self.opts.allow_dom_fallback {
            debug!("structured payload empty; running DOM fallback");
            merge_dom(&mut bundle, dom::extract_from_document(doc), base);
        }

        debug!(
            main = bundle.main_images.len(),
            variant = bundle.variant_images.len(),
            videos = bundle.videos.len(),
            default = %bundle.default_variant,
            "aggregated media bundle"
        );
        bundle
    }

    /// Fetches `url` and aggregates the page, resolving relative media against the final URL.
    pub async fn fetch_bundle(&self, url: &str) -> Result<MediaBundle, ExtractError> {
        let fetch_opts = FetchOptions {
            headers: self.opts.headers.clone(),
            allow_private_networks: self.opts.allow_private_networks,
            parse_non_200: false,
        };

        let result = fetch(self.http_client(), url, &fetch_opts).await.map_err(|e| {
            warn!(url, error = %e, "fetch failed");
            e
        })?;

        let base = self
            .opts
            .base_url
            .clone()
            .or_else(|| Url::parse(&result.final_url).ok());
        let doc = Html::parse_document(&result.text());
        Ok(self.aggregate_with_base(&doc, base.as_ref()))
    }

    /// Runs the thumbnail preparation step with this extractor's settle delay.
    pub async fn prepare<A>(&self, activator: &mut A, cancel: &CancelFlag) -> PrepareReport
    where
        A: ThumbnailActivator,
    {
        prepare::prepare(activator, self.opts.settle_delay, cancel).await
    }
}

/// Appends DOM records to the bundle. Existing records keep their place; gallery URLs win over variant URLs.
fn merge_dom(bundle: &mut MediaBundle, media: dom::DomMedia, base: Option<&Url>) {
    let mut main = UrlBucket::new();
    main.extend(std::mem::take(&mut bundle.main_images));
    let mut variant = UrlBucket::new();
    variant.extend(std::mem::take(&mut bundle.variant_images));

    for record in media.images {
        main.push(rebase(record, base));
    }
    for record in media.variant_images {
        let record = rebase(record, base);
        if main.contains(&record.url) {
            continue;
        }
        variant.push(record);
    }

    bundle.main_images = main.into_vec();
    bundle.variant_images = variant.into_vec();
}

fn rebase(mut record: MediaRecord, base: Option<&Url>) -> MediaRecord {
    record.url = absolutize(&record.url, base);
    record
}

fn build_http_client(opts: &Options) -> reqwest::Client {
    let allow_private = opts.allow_private_networks;
    let redirect_policy = reqwest::redirect::Policy::custom(move |attempt| {
        if allow_private {
            return attempt.follow();
        }
        let next = attempt.url().clone();
        let Some(host) = next.host_str() else {
            return attempt.follow();
        };
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = host.parse::<std::net::IpAddr>() {
            if is_private_ip(&ip) {
                return attempt.error("redirect to private IP blocked");
            }
            return attempt.follow();
        }
        // the redirect policy is synchronous
        let port = next.port_or_known_default().unwrap_or(80);
        match (host, port).to_socket_addrs() {
            Ok(mut addrs) => {
                if addrs.any(|sa| is_private_ip(&sa.ip())) {
                    attempt.error("redirect to private IP blocked")
                } else {
                    attempt.follow()
                }
            }
            Err(_) => attempt.error("DNS lookup failed during redirect"),
        }
    });

    reqwest::Client::builder()
        .redirect(redirect_policy)
        .user_agent(&opts.user_agent)
        .timeout(opts.timeout)
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "falling back to default HTTP client");
            reqwest::Client::new()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::model::MediaKind;
    use httpmock::prelude::*;
    use pretty_assertions::assert_eq;

    const HI: &str = "https://m.example.com/images/I/81xyz._AC_SL1500_.jpg";

    fn payload_page(json: &str) -> String {
        format!(
            "<html><head><script>P.when('A').execute(function(A){{ var obj = jQuery.parseJSON('{json}'); }});</script></head><body></body></html>"
        )
    }

    #[test]
    fn structured_payload_builds_bundle() {
        let html = payload_page(
            r#"{"colorImages":{"Red":[{"hiRes":"a.jpg"}],"Blue":[{"large":"b.jpg"}]},"landingAsinColor":"Red"}"#,
        );
        let bundle = aggregate(&html, true);

        assert_eq!(bundle.default_variant, "Red");
        assert_eq!(bundle.main_images.len(), 1);
        assert_eq!(bundle.main_images[0].url, "a.jpg");
        assert_eq!(bundle.main_images[0].variant.as_deref(), Some("Red"));
        assert_eq!(bundle.variant_images.len(), 1);
        assert_eq!(bundle.variant_images[0].url, "b.jpg");
        assert_eq!(bundle.variant_images[0].variant.as_deref(), Some("Blue"));
    }

    #[test]
    fn malformed_payload_falls_back_to_dom() {
        let html = format!(
            r#"<html><head><script>var obj = jQuery.parseJSON('{{"colorImages": [broken');</script></head>
               <body><div id="altImages"><img src="{HI}"></div></body></html>"#
        );
        let bundle = aggregate(&html, true);

        assert_eq!(bundle.image_count(), 1);
        assert_eq!(bundle.main_images[0].url, HI);
        assert_eq!(bundle.main_images[0].kind, MediaKind::Plain);
        assert!(bundle.variants.is_empty());
        assert_eq!(bundle.default_variant, "");
    }

    #[test]
    fn fallback_disabled_yields_empty_bundle() {
        let html = format!(r#"<div id="altImages"><img src="{HI}"></div>"#);
        let bundle = aggregate(&html, false);
        assert!(bundle.is_empty());
    }

    #[test]
    fn structured_results_suppress_dom_scan() {
        let html = format!(
            r#"<html><head><script>var obj = jQuery.parseJSON('{{"colorImages":{{"Red":[{{"hiRes":"a.jpg"}}]}}}}');</script></head>
               <body><div id="altImages"><img src="{HI}"></div></body></html>"#
        );
        let bundle = aggregate(&html, true);
        let urls: Vec<_> = bundle.main_images.iter().map(|m| m.url.as_str()).collect();
        assert_eq!(urls, vec!["a.jpg"]);
    }

    #[test]
    fn dom_variant_duplicate_of_gallery_is_dropped() {
        let html = format!(
            r#"<div id="altImages"><img src="{HI}"></div><div id="twister"><img src="{HI}"></div>"#
        );
        let bundle = aggregate(&html, true);
        assert_eq!(bundle.main_images.len(), 1);
        assert!(bundle.variant_images.is_empty());
    }

    #[test]
    fn base_url_resolves_relative_media() {
        let extractor = Extractor::builder()
            .base_url(Url::parse("https://shop.example.com/dp/B0").unwrap())
            .build();
        let bundle = extractor.aggregate(&payload_page(
            r#"{"colorImages":{"Red":[{"hiRes":"/img/a.jpg"}]},"videos":[{"url":"/v/a.m3u8"}]}"#,
        ));
        assert_eq!(bundle.main_images[0].url, "https://shop.example.com/img/a.jpg");
        assert_eq!(bundle.videos[0].url, "https://shop.example.com/v/a.m3u8");
        assert!(bundle.videos[0].is_segmented);
    }

    #[test]
    fn document_aggregation_leaves_http_client_unbuilt() {
        let extractor = Extractor::builder().build();
        let bundle = extractor.aggregate(&payload_page(r#"{"colorImages":{"Red":[{"hiRes":"a.jpg"}]}}"#));
        assert_eq!(bundle.main_images.len(), 1);
        assert!(extractor.http_client.get().is_none());
    }

    #[test]
    fn supplied_http_client_is_used_as_is() {
        let extractor = Extractor::new(Options {
            http_client: Some(reqwest::Client::new()),
            ..Default::default()
        });
        assert!(extractor.http_client.get().is_some());
    }

    #[test]
    fn settle_delay_is_capped_without_builder() {
        let extractor = Extractor::new(Options {
            settle_delay: std::time::Duration::from_secs(30),
            ..Default::default()
        });
        assert_eq!(extractor.options().settle_delay, MAX_SETTLE_DELAY);

        let short = std::time::Duration::from_millis(100);
        let extractor = Extractor::new(Options {
            settle_delay: short,
            ..Default::default()
        });
        assert_eq!(extractor.options().settle_delay, short);
    }

    #[test]
    fn empty_document_is_empty_bundle() {
        let bundle = aggregate("", true);
        assert!(bundle.is_empty());
        assert_eq!(bundle, MediaBundle::default());
    }

    #[tokio::test]
    async fn fetch_bundle_uses_final_url_as_base() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/dp/B0");
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body(payload_page(r#"{"colorImages":{"Red":[{"hiRes":"/img/a.jpg"}]}}"#));
        });

        let extractor = Extractor::builder().allow_private_networks(true).build();
        let bundle = extractor
            .fetch_bundle(&server.url("/dp/B0"))
            .await
            .expect("fetch should succeed");
        mock.assert();
        assert!(extractor.http_client.get().is_some());

        assert_eq!(bundle.main_images[0].url, server.url("/img/a.jpg"));
    }

    #[tokio::test]
    async fn fetch_bundle_blocks_private_hosts_by_default() {
        let server = MockServer::start();
        let extractor = Extractor::builder().build();
        let err = extractor
            .fetch_bundle(&server.url("/"))
            .await
            .expect_err("should fail on private host");
        assert_eq!(err.code, ErrorCode::Ssrf);
    }
}
