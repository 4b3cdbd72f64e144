// ABOUTME: Page loading for product documents: HTTP fetch with private-network guard and size cap.
// ABOUTME: Decodes bodies to text using the declared charset or detection, for fetched pages and local files.

use std::collections::HashMap;
use std::net::IpAddr;

use bytes::Bytes;
use ipnet::{Ipv4Net, Ipv6Net};
use tracing::debug;
use url::Url;

use crate::error::ExtractError;

/// Maximum allowed document size (10 MB).
pub const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

const OP: &str = "Fetch";

/// Options for fetching a document.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub headers: HashMap<String, String>,
    pub allow_private_networks: bool,
    pub parse_non_200: bool,
}

/// A fetched document.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: u16,
    pub url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl FetchResult {
    /// Decode the body as text, honouring the response charset when present.
    pub fn text(&self) -> String {
        decode_body(&self.body, self.content_type.as_deref())
    }
}

pub(crate) fn is_private_ip(addr: &IpAddr) -> bool {
    const V4_RANGES: &[&str] = &[
        "10.0.0.0/8",
        "172.16.0.0/12",
        "192.168.0.0/16",
        "127.0.0.0/8",
        "169.254.0.0/16",
    ];
    const V6_RANGES: &[&str] = &["fc00::/7", "fe80::/10"];

    match addr {
        IpAddr::V4(ip) => V4_RANGES
            .iter()
            .filter_map(|r| r.parse::<Ipv4Net>().ok())
            .any(|net| net.contains(ip)),
        IpAddr::V6(ip) => {
            ip.is_loopback()
                || V6_RANGES
                    .iter()
                    .filter_map(|r| r.parse::<Ipv6Net>().ok())
                    .any(|net| net.contains(ip))
        }
    }
}

/// Fails with an SSRF error if `target` names or resolves to a private address.
async fn ensure_public_host(target: &Url, requested: &str) -> Result<(), ExtractError> {
    let Some(host) = target.host_str() else {
        return Ok(());
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');

    let blocked = || {
        ExtractError::ssrf(
            requested,
            OP,
            Some(anyhow::anyhow!("private network address {} is not allowed", host)),
        )
    };

    if let Ok(ip) = host.parse::<IpAddr>() {
        return if is_private_ip(&ip) { Err(blocked()) } else { Ok(()) };
    }

    let port = target.port_or_known_default().unwrap_or(80);
    let addrs = tokio::net::lookup_host((host, port)).await.map_err(|e| {
        ExtractError::fetch(requested, OP, Some(anyhow::anyhow!("DNS lookup failed: {}", e)))
    })?;
    for socket_addr in addrs {
        if is_private_ip(&socket_addr.ip()) {
            return Err(blocked());
        }
    }
    Ok(())
}

/// Decode body bytes to a String using the content-type charset or detection.
pub fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    if let Some(encoding) = content_type
        .and_then(extract_charset)
        .and_then(|c| encoding_rs::Encoding::for_label(c.as_bytes()))
    {
        let (decoded, _, _) = encoding.decode(body);
        return decoded.into_owned();
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

fn extract_charset(content_type: &str) -> Option<String> {
    content_type
        .to_lowercase()
        .split(';')
        .find_map(|part| {
            part.trim()
                .strip_prefix("charset=")
                .map(|c| c.trim_matches('"').trim_matches('\'').to_string())
        })
}

/// Fetch a product page.
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    opts: &FetchOptions,
) -> Result<FetchResult, ExtractError> {
    if url.is_empty() {
        return Err(ExtractError::invalid_url(url, OP, None));
    }
    let parsed = Url::parse(url).map_err(|e| {
        ExtractError::invalid_url(url, OP, Some(anyhow::anyhow!("invalid URL: {}", e)))
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ExtractError::invalid_url(
            url,
            OP,
            Some(anyhow::anyhow!("scheme must be http or https")),
        ));
    }

    if !opts.allow_private_networks {
        ensure_public_host(&parsed, url).await?;
    }

    let mut request = client.get(url);
    for (key, value) in &opts.headers {
        request = request.header(key, value);
    }

    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            ExtractError::timeout(url, OP, Some(e.into()))
        } else {
            ExtractError::fetch(url, OP, Some(anyhow::anyhow!("request failed: {}", e)))
        }
    })?;

    if !opts.allow_private_networks {
        ensure_public_host(response.url(), url).await?;
    }

    if response.content_length().is_some_and(exceeds_content_cap) {
        return Err(ExtractError::fetch(url, OP, Some(anyhow::anyhow!("content too large"))));
    }

    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_lowercase());

    let body = response.bytes().await.map_err(|e| {
        ExtractError::fetch(url, OP, Some(anyhow::anyhow!("failed to read body: {}", e)))
    })?;
    if body.len() > MAX_CONTENT_LENGTH {
        return Err(ExtractError::fetch(url, OP, Some(anyhow::anyhow!("content too large"))));
    }

    if status != 200 && !opts.parse_non_200 {
        return Err(ExtractError::fetch(
            url,
            OP,
            Some(anyhow::anyhow!("HTTP status {}", status)),
        ));
    }

    debug!(url, status, bytes = body.len(), "fetched document");

    Ok(FetchResult {
        status,
        url: url.to_string(),
        final_url,
        content_type,
        body,
    })
}

/// Compares in `u64` so lengths past `usize::MAX` cannot wrap on 32-bit targets.
fn exceeds_content_cap(len: u64) -> bool {
    len > MAX_CONTENT_LENGTH as u64
}
