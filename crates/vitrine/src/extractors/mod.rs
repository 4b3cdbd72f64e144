// ABOUTME: The two extraction paths over a product document: embedded structured payload and DOM fallback.
// ABOUTME: Also holds the compiled CSS selector cache shared by DOM scans.

//! Extraction paths.
//!
//! - `structured`: reads the embedded JSON media payload from inline scripts.
//! - `dom`: scans gallery and variant-thumbnail regions when no payload is usable.
//! - `compiled`: process-wide cache of parsed CSS selectors.

pub mod compiled;
pub mod dom;
pub mod structured;
