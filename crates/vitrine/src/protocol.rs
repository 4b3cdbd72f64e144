// ABOUTME: Request/response messages exchanged with the presentation layer: getMedia answered by mediaLoaded.
// ABOUTME: Responding never fails for getMedia; internal faults produce the empty bundle.

use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ExtractError;
use crate::extractor::Extractor;
use crate::model::MediaBundle;

const OP: &str = "Respond";

/// Messages the presentation layer sends to the extraction side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    GetMedia,
    ContentScriptLoaded,
    ContentScriptFullyLoaded,
}

/// Messages sent back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Response {
    MediaLoaded { data: MediaBundle },
    Received { received: bool },
}

impl Response {
    /// The bundle carried by a `mediaLoaded` response.
    pub fn bundle(&self) -> Option<&MediaBundle> {
        match self {
            Response::MediaLoaded { data } => Some(data),
            Response::Received { .. } => None,
        }
    }
}

impl Extractor {
    /// Answers one request against the supplied document.
    pub fn respond(&self, request: &Request, html: &str) -> Response {
        match request {
            Request::GetMedia => {
                let data = panic::catch_unwind(AssertUnwindSafe(|| self.aggregate(html)))
                    .unwrap_or_else(|_| {
                        warn!("extraction panicked; answering with an empty bundle");
                        MediaBundle::default()
                    });
                Response::MediaLoaded { data }
            }
            Request::ContentScriptLoaded | Request::ContentScriptFullyLoaded => {
                debug!(?request, "acknowledging notice");
                Response::Received { received: true }
            }
        }
    }

    /// Decodes a JSON request, answers it, and encodes the response.
    pub fn respond_json(&self, raw: &str, html: &str) -> Result<String, ExtractError> {
        let request: Request = serde_json::from_str(raw).map_err(|e| {
            ExtractError::protocol(
                "request",
                OP,
                Some(anyhow::anyhow!("unrecognised message: {}", e)),
            )
        })?;
        let response = self.respond(&request, html);
        serde_json::to_string(&response)
            .map_err(|e| ExtractError::protocol("response", OP, Some(e.into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const PAGE: &str = r#"<script>var obj = jQuery.parseJSON('{"colorImages":{"Red":[{"hiRes":"a.jpg"}]},"colorToAsin":{"Red":{"asin":"B0RED"}}}');</script>"#;

    #[test]
    fn request_wire_format() {
        let req: Request = serde_json::from_str(r#"{"action":"getMedia"}"#).unwrap();
        assert_eq!(req, Request::GetMedia);
        let req: Request = serde_json::from_str(r#"{"action":"contentScriptLoaded"}"#).unwrap();
        assert_eq!(req, Request::ContentScriptLoaded);
    }

    #[test]
    fn get_media_answers_media_loaded() {
        let extractor = Extractor::builder().build();
        let raw = extractor.respond_json(r#"{"action":"getMedia"}"#, PAGE).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(
            value,
            json!({
                "action": "mediaLoaded",
                "data": {
                    "mainImages": [
                        {"url": "a.jpg", "alt": "Product Image", "type": "main", "variant": "Red"}
                    ],
                    "variantImages": [],
                    "videos": [],
                    "variants": {
                        "Red": {"name": "Red", "isDefault": true, "productId": "B0RED"}
                    },
                    "defaultVariant": "Red"
                }
            })
        );
    }

    #[test]
    fn empty_page_still_gets_a_bundle() {
        let extractor = Extractor::builder().build();
        let response = extractor.respond(&Request::GetMedia, "<html></html>");
        let bundle = response.bundle().expect("mediaLoaded carries data");
        assert!(bundle.is_empty());
    }

    #[test]
    fn notices_are_acknowledged() {
        let extractor = Extractor::builder().build();
        let raw = extractor
            .respond_json(r#"{"action":"contentScriptLoaded"}"#, "")
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["received"], json!(true));
    }

    #[test]
    fn unknown_action_is_a_protocol_error() {
        let extractor = Extractor::builder().build();
        let err = extractor
            .respond_json(r#"{"action":"download","url":"x"}"#, "")
            .unwrap_err();
        assert!(err.is_protocol());
        let err = extractor.respond_json("not json", "").unwrap_err();
        assert!(err.is_protocol());
    }
}
