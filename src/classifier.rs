//! Resource classification for strategy selection
//!
//! Maps a request URL to one of a fixed set of resource classes using an
//! ordered rule table. Classification is a pure, total function: it never
//! fails, has no side effects, and is safe to call speculatively (the
//! prefetcher reuses it to route predicted resources to their stores).

use crate::models::{url_path, ResourceClass};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg", "ico", "avif"];
const FONT_EXTENSIONS: &[&str] = &["woff", "woff2", "ttf", "otf", "eot"];
const ASSET_EXTENSIONS: &[&str] = &["js", "mjs", "css", "map"];
const PAGE_EXTENSIONS: &[&str] = &["html", "htm"];

type Predicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Ordered-rule URL classifier
///
/// Rules are evaluated top-down; the first matching rule wins. A URL that
/// matches no rule classifies as `Default` (network-only, never cached).
pub struct Classifier {
    rules: Vec<(Predicate, ResourceClass)>,
}

impl Classifier {
    /// Build the rule table for the given critical set and API marker
    ///
    /// # Arguments
    /// * `critical_set` - fixed list of critical resource paths, established
    ///   at install time
    /// * `api_marker` - path substring identifying API requests
    pub fn new(critical_set: Vec<String>, api_marker: String) -> Self {
        let criticals: Vec<String> = critical_set.iter().map(|u| url_path(u).to_string()).collect();

        let rules: Vec<(Predicate, ResourceClass)> = vec![
            (
                Box::new(move |path: &str| {
                    criticals.iter().any(|c| {
                        path == c.as_str() || (c != "/" && path.ends_with(c.as_str()))
                    })
                }),
                ResourceClass::Critical,
            ),
            (
                Box::new(|path: &str| has_extension(path, IMAGE_EXTENSIONS)),
                ResourceClass::Image,
            ),
            (
                Box::new(|path: &str| has_extension(path, FONT_EXTENSIONS)),
                ResourceClass::Font,
            ),
            (
                Box::new(move |path: &str| path.contains(api_marker.as_str())),
                ResourceClass::Api,
            ),
            (
                Box::new(|path: &str| has_extension(path, ASSET_EXTENSIONS)),
                ResourceClass::Asset,
            ),
            (Box::new(is_document_path), ResourceClass::Page),
        ];

        Classifier { rules }
    }

    /// Classify a URL
    ///
    /// Total and deterministic; the caller is responsible for only routing
    /// GET-equivalent requests here.
    pub fn classify(&self, url: &str) -> ResourceClass {
        let path = url_path(url);
        for (predicate, class) in &self.rules {
            if predicate(path) {
                return *class;
            }
        }
        ResourceClass::Default
    }

    /// Short store name backing each class
    ///
    /// `Default` resources are never cached and have no store.
    pub fn store_name_for(&self, class: ResourceClass) -> Option<&'static str> {
        match class {
            ResourceClass::Critical => Some("critical"),
            ResourceClass::Image => Some("images"),
            ResourceClass::Font => Some("fonts"),
            ResourceClass::Api => Some("api"),
            ResourceClass::Asset => Some("static"),
            ResourceClass::Page => Some("general"),
            ResourceClass::Default => None,
        }
    }
}

/// Check whether the path's final segment carries one of the extensions
fn has_extension(path: &str, extensions: &[&str]) -> bool {
    let segment = path.rsplit('/').next().unwrap_or(path);
    match segment.rsplit_once('.') {
        Some((_, ext)) => {
            let ext = ext.to_ascii_lowercase();
            extensions.iter().any(|e| *e == ext)
        }
        None => false,
    }
}

/// HTML-document pattern: explicit .html/.htm, a directory path, or an
/// extensionless final segment
fn is_document_path(path: &str) -> bool {
    if has_extension(path, PAGE_EXTENSIONS) {
        return true;
    }
    if path.ends_with('/') {
        return true;
    }
    let segment = path.rsplit('/').next().unwrap_or(path);
    !segment.contains('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new(
            vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/css/critical.css".to_string(),
            ],
            "/api/".to_string(),
        )
    }

    #[test]
    fn test_critical_set_wins_first() {
        let c = classifier();
        assert_eq!(c.classify("/"), ResourceClass::Critical);
        assert_eq!(c.classify("/index.html"), ResourceClass::Critical);
        // Would be an asset, but the critical rule is evaluated first
        assert_eq!(c.classify("/css/critical.css"), ResourceClass::Critical);
        assert_eq!(c.classify("https://example.com/index.html"), ResourceClass::Critical);
    }

    #[test]
    fn test_image_extensions() {
        let c = classifier();
        assert_eq!(c.classify("/img/logo.png"), ResourceClass::Image);
        assert_eq!(c.classify("/photos/cat.JPEG"), ResourceClass::Image);
        assert_eq!(c.classify("/icons/app.svg?v=2"), ResourceClass::Image);
    }

    #[test]
    fn test_font_extensions() {
        let c = classifier();
        assert_eq!(c.classify("/fonts/inter.woff2"), ResourceClass::Font);
        assert_eq!(c.classify("/fonts/old.eot"), ResourceClass::Font);
    }

    #[test]
    fn test_api_marker() {
        let c = classifier();
        assert_eq!(c.classify("/api/health"), ResourceClass::Api);
        assert_eq!(c.classify("https://example.com/api/users?page=2"), ResourceClass::Api);
    }

    #[test]
    fn test_asset_extensions() {
        let c = classifier();
        assert_eq!(c.classify("/css/style.css"), ResourceClass::Asset);
        assert_eq!(c.classify("/js/app.js"), ResourceClass::Asset);
        assert_eq!(c.classify("/js/app.js.map"), ResourceClass::Asset);
    }

    #[test]
    fn test_page_patterns() {
        let c = classifier();
        assert_eq!(c.classify("/about.html"), ResourceClass::Page);
        assert_eq!(c.classify("/products/"), ResourceClass::Page);
        assert_eq!(c.classify("/products"), ResourceClass::Page);
    }

    #[test]
    fn test_default_fallthrough() {
        let c = classifier();
        assert_eq!(c.classify("/data/export.pdf"), ResourceClass::Default);
        assert_eq!(c.classify("/archive.tar.gz"), ResourceClass::Default);
    }

    #[test]
    fn test_api_beats_asset_ordering() {
        // An API path ending in .js still matches the API rule first
        let c = classifier();
        assert_eq!(c.classify("/api/bundle.js"), ResourceClass::Api);
    }

    #[test]
    fn test_store_names() {
        let c = classifier();
        assert_eq!(c.store_name_for(ResourceClass::Critical), Some("critical"));
        assert_eq!(c.store_name_for(ResourceClass::Image), Some("images"));
        assert_eq!(c.store_name_for(ResourceClass::Font), Some("fonts"));
        assert_eq!(c.store_name_for(ResourceClass::Api), Some("api"));
        assert_eq!(c.store_name_for(ResourceClass::Asset), Some("static"));
        assert_eq!(c.store_name_for(ResourceClass::Page), Some("general"));
        assert_eq!(c.store_name_for(ResourceClass::Default), None);
    }
}
