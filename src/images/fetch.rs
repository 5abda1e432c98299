use std::io::Read;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, REFERER, USER_AGENT};
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use crate::error::ImageError;
use crate::retry::{retry_with_backoff, RetryPolicy};

pub const DEFAULT_MAX_BYTES: u64 = 20 * 1024 * 1024;

const BROWSER_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const ACCEPT_IMAGES: &str = "image/avif,image/webp,image/apng,image/svg+xml,image/*,*/*;q=0.8";

const KNOWN_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

static EXTENSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.([A-Za-z0-9]{2,5})$").unwrap());

/// Image bytes plus what the destination needs to store them.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: String,
}

/// Downloads images with browser-like headers. Hotlink-protected hosts
/// (WeChat's CDN in particular) refuse requests without a Referer.
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    http: Client,
    max_bytes: u64,
    retry: RetryPolicy,
}

impl ImageFetcher {
    pub fn new(timeout: Duration, max_bytes: u64) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(ImageFetcher {
            http,
            max_bytes,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn fetch(&self, url: &str) -> Result<FetchedImage, ImageError> {
        let image = retry_with_backoff(
            &self.retry,
            &format!("Image download {}", url),
            || self.fetch_once(url),
            ImageError::is_transient,
        )?;
        debug!(
            "Downloaded {} ({} bytes, {})",
            image.file_name,
            image.bytes.len(),
            image.content_type
        );
        Ok(image)
    }

    fn fetch_once(&self, url: &str) -> Result<FetchedImage, ImageError> {
        let response = self
            .http
            .get(url)
            .header(USER_AGENT, BROWSER_UA)
            .header(REFERER, url)
            .header(ACCEPT, ACCEPT_IMAGES)
            .send()
            .map_err(|source| ImageError::Fetch {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(ImageError::UnsupportedFormat {
                url: url.to_string(),
                content_type,
            });
        }

        if let Some(size) = response.content_length() {
            if size > self.max_bytes {
                return Err(self.too_large(url, size));
            }
        }

        let mut bytes = Vec::new();
        response
            .take(self.max_bytes + 1)
            .read_to_end(&mut bytes)
            .map_err(|source| ImageError::Read {
                url: url.to_string(),
                source,
            })?;
        if bytes.len() as u64 > self.max_bytes {
            return Err(self.too_large(url, bytes.len() as u64));
        }

        Ok(FetchedImage {
            file_name: file_name(url, &content_type),
            bytes,
            content_type,
        })
    }

    fn too_large(&self, url: &str, size: u64) -> ImageError {
        ImageError::TooLarge {
            url: url.to_string(),
            size,
            limit: self.max_bytes,
        }
    }
}

/// Stable name for the stored file: `img_<hash>.<ext>`.
pub fn file_name(url: &str, content_type: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let hash: String = digest
        .iter()
        .take(6)
        .map(|b| format!("{:02x}", b))
        .collect();
    format!("img_{}.{}", hash, extension(url, content_type))
}

/// Extension from the URL path, then WeChat's `wx_fmt` parameter, then the
/// content type. Falls back to `jpg`.
fn extension(url: &str, content_type: &str) -> String {
    let known = |ext: &str| {
        let ext = ext.to_ascii_lowercase();
        KNOWN_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
    };

    if let Ok(parsed) = Url::parse(url) {
        let from_path = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .and_then(|last| EXTENSION_RE.captures(last))
            .and_then(|caps| known(&caps[1]));
        if let Some(ext) = from_path {
            return ext;
        }
        let from_query = parsed
            .query_pairs()
            .find(|(key, _)| key == "wx_fmt")
            .and_then(|(_, value)| known(&value));
        if let Some(ext) = from_query {
            return ext;
        }
    }

    content_type
        .strip_prefix("image/")
        .map(|subtype| subtype.split(';').next().unwrap_or_default().trim())
        .and_then(known)
        .unwrap_or_else(|| "jpg".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_stable_and_hashed() {
        let a = file_name("https://example.com/a/photo.PNG", "image/png");
        let b = file_name("https://example.com/a/photo.PNG", "image/png");
        assert_eq!(a, b);
        assert!(a.starts_with("img_"));
        assert!(a.ends_with(".png"));
        assert_eq!(a.len(), "img_".len() + 12 + ".png".len());
        assert_ne!(a, file_name("https://example.com/a/other.png", "image/png"));
    }

    #[test]
    fn extension_from_path() {
        assert_eq!(extension("https://x.com/pic.webp?w=10", ""), "webp");
        assert_eq!(extension("https://x.com/pic.jpeg", "image/png"), "jpeg");
    }

    #[test]
    fn extension_from_wechat_query() {
        let url = "https://mmbiz.qpic.cn/mmbiz_png/abc/640?wx_fmt=png&from=appmsg";
        assert_eq!(extension(url, "image/jpeg"), "png");
    }

    #[test]
    fn extension_from_content_type() {
        assert_eq!(extension("https://x.com/render/42", "image/gif"), "gif");
        assert_eq!(extension("https://x.com/render/42", "image/png; charset=binary"), "png");
    }

    #[test]
    fn unknown_extension_defaults_to_jpg() {
        assert_eq!(extension("https://x.com/file.tiff", "image/tiff"), "jpg");
        assert_eq!(extension("not a url", ""), "jpg");
    }
}
