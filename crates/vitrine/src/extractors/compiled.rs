// ABOUTME: Pre-compiled CSS selector cache shared by the script scanner and the DOM fallback.
// ABOUTME: Selectors are parsed once per process; invalid ones are cached as None.

//! Selector caching for repeated DOM queries.
//!
//! Every extraction runs the same fixed set of region selectors against a fresh
//! document, so parsing them once and reusing the compiled form avoids redundant
//! work across calls.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use scraper::Selector;

static SELECTOR_CACHE: Lazy<RwLock<HashMap<String, Option<Selector>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Gets or compiles a CSS selector, caching the result.
///
/// Returns `Some(Selector)` if the selector is valid, `None` if invalid.
/// A poisoned lock is recovered rather than propagated; the cache only ever holds
/// fully-constructed entries.
pub fn get_or_compile(css: &str) -> Option<Selector> {
    {
        let cache = SELECTOR_CACHE.read().unwrap_or_else(|p| p.into_inner());
        if let Some(cached) = cache.get(css) {
            return cached.clone();
        }
    }

    let compiled = Selector::parse(css).ok();
    let mut cache = SELECTOR_CACHE.write().unwrap_or_else(|p| p.into_inner());
    if let Some(cached) = cache.get(css) {
        return cached.clone();
    }
    cache.insert(css.to_string(), compiled.clone());
    compiled
}

/// Compiles each selector in `selectors`, dropping invalid ones.
pub fn compile_all(selectors: &[&str]) -> Vec<Selector> {
    selectors.iter().filter_map(|css| get_or_compile(css)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_selector_is_cached() {
        assert!(get_or_compile("#altImages img").is_some());
        assert!(get_or_compile("#altImages img").is_some());
    }

    #[test]
    fn invalid_selector_returns_none() {
        assert!(get_or_compile("[[[invalid").is_none());
        assert!(get_or_compile("[[[invalid").is_none());
    }

    #[test]
    fn compile_all_skips_invalid() {
        let compiled = compile_all(&["script", "[[[invalid", "img[src]"]);
        assert_eq!(compiled.len(), 2);
    }
}
