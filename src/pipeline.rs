use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::info;

use crate::convert::{convert, ConvertOptions};
use crate::error::PipelineError;
use crate::header::ArticleHeader;
use crate::images::{ImageResolver, ImageUploader};
use crate::parser::tags::MAX_HEADING_LEVEL;
use crate::parser::{BlockKind, TranscodeOptions, Transcoder, DEFAULT_MERGE_THRESHOLD};
use crate::publish::{
    CursorPolicy, DocumentApi, DocumentHandle, PublishReport, Publisher, DEFAULT_BATCH_SIZE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub batch_size: usize,
    pub max_heading_level: u8,
    pub merge_threshold: usize,
    pub cursor_policy: CursorPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            batch_size: DEFAULT_BATCH_SIZE,
            max_heading_level: MAX_HEADING_LEVEL,
            merge_threshold: DEFAULT_MERGE_THRESHOLD,
            cursor_policy: CursorPolicy::default(),
        }
    }
}

impl PipelineOptions {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.batch_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_HEADING_LEVEL).contains(&self.max_heading_level) {
            return Err(PipelineError::InvalidConfig(format!(
                "max_heading_level must be between 1 and {}, got {}",
                MAX_HEADING_LEVEL, self.max_heading_level
            )));
        }
        if self.merge_threshold == 0 {
            return Err(PipelineError::InvalidConfig(
                "merge_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Transcode, convert and publish one document, in that order.
#[derive(Debug, Clone)]
pub struct Pipeline {
    options: PipelineOptions,
    publisher: Publisher,
    header: Option<ArticleHeader>,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Result<Self, PipelineError> {
        options.validate()?;
        let publisher = Publisher::new(options.batch_size)?.with_cursor_policy(options.cursor_policy);
        Ok(Pipeline {
            options,
            publisher,
            header: None,
        })
    }

    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.publisher = self.publisher.with_cancellation(flag);
        self
    }

    /// Prepend a title and metadata header to every published body.
    pub fn with_header(mut self, header: ArticleHeader) -> Self {
        self.header = Some(header);
        self
    }

    pub fn run<R, U, A>(
        &self,
        html: &str,
        resolver: &R,
        uploader: &U,
        api: &A,
        document: &DocumentHandle,
    ) -> PublishReport
    where
        R: ImageResolver + ?Sized,
        U: ImageUploader + ?Sized,
        A: DocumentApi + ?Sized,
    {
        let body = Transcoder::new(resolver)
            .with_options(TranscodeOptions {
                merge_threshold: self.options.merge_threshold,
            })
            .transcribe(html);
        let images = body.iter().filter(|b| b.kind() == BlockKind::Image).count();
        info!(
            "Transcoded {} bytes of markup into {} blocks ({} images)",
            html.len(),
            body.len(),
            images
        );

        let mut blocks = self
            .header
            .as_ref()
            .map(ArticleHeader::blocks)
            .unwrap_or_default();
        blocks.extend(body);

        let targets = convert(
            blocks,
            uploader,
            &ConvertOptions {
                max_heading_level: self.options.max_heading_level,
            },
        );

        info!(
            "Publishing {} blocks in batches of {}",
            targets.len(),
            self.publisher.batch_size()
        );
        self.publisher.publish(api, document, targets)
    }
}
