pub mod fetch;

use std::collections::HashMap;

use crate::error::ImageError;

/// Rewrites original image URLs to their hosted counterparts during transcoding.
pub trait ImageResolver {
    fn resolve(&self, original_url: &str) -> Option<String>;
}

impl ImageResolver for HashMap<String, String> {
    fn resolve(&self, original_url: &str) -> Option<String> {
        self.get(original_url).cloned()
    }
}

/// Resolver that keeps every URL as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepOriginal;

impl ImageResolver for KeepOriginal {
    fn resolve(&self, _original_url: &str) -> Option<String> {
        None
    }
}

/// Handle of an image stored in the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHandle {
    pub token: String,
}

/// Materializes an image in the destination store.
pub trait ImageUploader {
    fn fetch_and_store(&self, url: &str) -> Result<ImageHandle, ImageError>;
}

/// Pair original URLs with their hosted URLs by position. Originals without a
/// counterpart are left out.
pub fn build_image_map(originals: &[String], hosted: &[String]) -> HashMap<String, String> {
    originals
        .iter()
        .zip(hosted)
        .map(|(original, hosted)| (original.clone(), hosted.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_resolves_known_urls() {
        let map = build_image_map(
            &["http://x/a.png".into(), "http://x/b.png".into()],
            &["http://cdn/a.png".into()],
        );
        assert_eq!(map.len(), 1);
        assert_eq!(map.resolve("http://x/a.png").as_deref(), Some("http://cdn/a.png"));
        assert_eq!(map.resolve("http://x/b.png"), None);
        assert_eq!(KeepOriginal.resolve("http://x/a.png"), None);
    }
}
