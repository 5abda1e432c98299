pub mod wire;

use std::sync::Mutex;
use std::time::{Duration, Instant};

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::convert::TargetBlock;
use crate::error::{ImageError, PublishError};
use crate::images::fetch::ImageFetcher;
use crate::images::{ImageHandle, ImageUploader};
use crate::publish::{DocumentApi, DocumentHandle};
use crate::retry::{retry_with_backoff, RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "https://open.feishu.cn";

/// Tokens are refreshed this long before they actually expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Codes the API returns for a missing, invalid or expired tenant token.
const TOKEN_ERROR_CODES: &[i64] = &[99991661, 99991663, 99991668];

#[derive(Debug, Error)]
pub enum FeishuError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error: code={code}, msg={msg}")]
    Api { code: i64, msg: String },
    #[error("response missing {0}")]
    MissingData(&'static str),
}

impl FeishuError {
    fn is_token_error(&self) -> bool {
        matches!(self, FeishuError::Api { code, .. } if TOKEN_ERROR_CODES.contains(code))
    }

    fn is_transient(&self) -> bool {
        match self {
            FeishuError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

impl From<FeishuError> for PublishError {
    fn from(e: FeishuError) -> Self {
        match e {
            FeishuError::Api { code, msg } => PublishError::Rejected { code, msg },
            other => PublishError::Transport(other.to_string()),
        }
    }
}

impl From<FeishuError> for ImageError {
    fn from(e: FeishuError) -> Self {
        ImageError::Store(e.to_string())
    }
}

// ── wire envelopes ──

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_result(self) -> Result<Option<T>, FeishuError> {
        if self.code != 0 {
            return Err(FeishuError::Api {
                code: self.code,
                msg: self.msg,
            });
        }
        Ok(self.data)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    tenant_access_token: String,
    #[serde(default)]
    expire: u64,
}

#[derive(Debug, Deserialize)]
struct CreatedDocument {
    document: DocumentMeta,
}

#[derive(Debug, Deserialize)]
struct DocumentMeta {
    document_id: String,
}

#[derive(Debug, Deserialize)]
struct UploadedMedia {
    file_token: String,
}

#[derive(Debug, Clone)]
struct TenantToken {
    value: String,
    expires_at: Instant,
}

impl TenantToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

// ── client ──

/// Blocking client for the Feishu open platform. The tenant token lives
/// behind a mutex so the uploader and the publisher can share one client.
#[derive(Debug)]
pub struct FeishuClient {
    http: Client,
    base_url: String,
    app_id: String,
    app_secret: String,
    token: Mutex<Option<TenantToken>>,
    retry: RetryPolicy,
}

impl FeishuClient {
    pub fn new(
        base_url: &str,
        app_id: &str,
        app_secret: &str,
        timeout: Duration,
    ) -> Result<Self, FeishuError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(FeishuClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id: app_id.to_string(),
            app_secret: app_secret.to_string(),
            token: Mutex::new(None),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Cached tenant access token, fetched again once it nears expiry.
    pub fn tenant_token(&self) -> Result<String, FeishuError> {
        let mut cached = self.token.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.value.clone());
        }

        info!("Fetching new tenant access token");
        let fresh = retry_with_backoff(
            &self.retry,
            "Tenant token request",
            || self.request_token(),
            FeishuError::is_transient,
        )?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    pub fn invalidate_token(&self) {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = None;
        debug!("Tenant access token invalidated");
    }

    fn request_token(&self) -> Result<TenantToken, FeishuError> {
        let response: TokenResponse = self
            .http
            .post(self.url("/open-apis/auth/v3/tenant_access_token/internal"))
            .json(&json!({ "app_id": self.app_id, "app_secret": self.app_secret }))
            .send()?
            .json()?;
        if response.code != 0 {
            return Err(FeishuError::Api {
                code: response.code,
                msg: response.msg,
            });
        }
        if response.tenant_access_token.is_empty() {
            return Err(FeishuError::MissingData("tenant_access_token"));
        }
        Ok(TenantToken {
            value: response.tenant_access_token,
            expires_at: Instant::now() + Duration::from_secs(response.expire),
        })
    }

    /// Send an authorized request, refreshing the token once if the API
    /// rejects it.
    fn call<T, F>(&self, build: F) -> Result<Option<T>, FeishuError>
    where
        T: DeserializeOwned,
        F: Fn(&str) -> Result<RequestBuilder, FeishuError>,
    {
        match self.call_once(&build) {
            Err(e) if e.is_token_error() => {
                warn!("Tenant token rejected ({}), refreshing", e);
                self.invalidate_token();
                self.call_once(&build)
            }
            other => other,
        }
    }

    fn call_once<T, F>(&self, build: &F) -> Result<Option<T>, FeishuError>
    where
        T: DeserializeOwned,
        F: Fn(&str) -> Result<RequestBuilder, FeishuError>,
    {
        let token = self.tenant_token()?;
        let envelope: Envelope<T> = build(&token)?.send()?.json()?;
        envelope.into_result()
    }

    /// Create an empty docx document, optionally inside a folder. Blocks are
    /// appended under its root block.
    pub fn create_document(
        &self,
        folder_token: Option<&str>,
        title: &str,
    ) -> Result<DocumentHandle, FeishuError> {
        let mut body = json!({ "title": title });
        if let Some(folder) = folder_token {
            body["folder_token"] = json!(folder);
        }
        let url = self.url("/open-apis/docx/v1/documents");
        let created: CreatedDocument = self
            .call(|token| Ok(self.http.post(&url).bearer_auth(token).json(&body)))?
            .ok_or(FeishuError::MissingData("document"))?;

        info!(
            "Created document {} ({})",
            created.document.document_id, title
        );
        Ok(DocumentHandle::root(created.document.document_id))
    }

    /// Upload image bytes as media attached to a document; returns the file token.
    pub fn upload_image(
        &self,
        document_id: &str,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, FeishuError> {
        let url = self.url("/open-apis/drive/v1/medias/upload_all");
        let size = bytes.len();
        let uploaded: UploadedMedia = self
            .call(|token| {
                let form = media_form(document_id, file_name, content_type, bytes.clone())?;
                Ok(self.http.post(&url).bearer_auth(token).multipart(form))
            })?
            .ok_or(FeishuError::MissingData("file_token"))?;

        debug!("Uploaded {} ({} bytes) as {}", file_name, size, uploaded.file_token);
        Ok(uploaded.file_token)
    }
}

fn media_form(
    document_id: &str,
    file_name: &str,
    content_type: &str,
    bytes: Vec<u8>,
) -> Result<Form, FeishuError> {
    let size = bytes.len();
    let part = Part::bytes(bytes)
        .file_name(file_name.to_string())
        .mime_str(media_mime(content_type))?;
    Ok(Form::new()
        .text("file_name", file_name.to_string())
        .text("parent_type", "docx_image")
        .text("parent_node", document_id.to_string())
        .text("size", size.to_string())
        .part("file", part))
}

/// Bare `image/<subtype>` of a content type header, or a generic binary type
/// when the header is unusable.
fn media_mime(content_type: &str) -> &str {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    let valid = essence.strip_prefix("image/").is_some_and(|subtype| {
        !subtype.is_empty()
            && subtype
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    });
    if valid {
        essence
    } else {
        "application/octet-stream"
    }
}

impl DocumentApi for FeishuClient {
    fn append_children(
        &self,
        document: &DocumentHandle,
        children: &[TargetBlock],
        index: usize,
    ) -> Result<(), PublishError> {
        let url = self.url(&format!(
            "/open-apis/docx/v1/documents/{}/blocks/{}/children",
            document.document_id, document.parent_block_id
        ));
        let body = json!({
            "children": wire::to_wire_all(children),
            "index": index,
        });
        self.call::<serde_json::Value, _>(|token| {
            Ok(self
                .http
                .post(&url)
                .query(&[("document_revision_id", "-1")])
                .bearer_auth(token)
                .json(&body))
        })?;
        Ok(())
    }
}

// ── image uploader ──

/// Downloads an image and stores it as media of the target document.
pub struct FeishuImageUploader<'a> {
    client: &'a FeishuClient,
    fetcher: ImageFetcher,
    document_id: String,
}

impl<'a> FeishuImageUploader<'a> {
    pub fn new(client: &'a FeishuClient, fetcher: ImageFetcher, document_id: &str) -> Self {
        FeishuImageUploader {
            client,
            fetcher,
            document_id: document_id.to_string(),
        }
    }
}

impl ImageUploader for FeishuImageUploader<'_> {
    fn fetch_and_store(&self, url: &str) -> Result<ImageHandle, ImageError> {
        let image = self.fetcher.fetch(url)?;
        let token = self.client.upload_image(
            &self.document_id,
            &image.file_name,
            &image.content_type,
            image.bytes,
        )?;
        Ok(ImageHandle { token })
    }
}
