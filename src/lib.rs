pub mod config;
pub mod convert;
pub mod error;
pub mod feishu;
pub mod header;
pub mod images;
pub mod parser;
pub mod pipeline;
pub mod publish;
pub mod retry;

pub use convert::{convert, ConvertOptions, TargetBlock, TextElement};
pub use error::{ImageError, MarkupError, PipelineError, PublishError};
pub use header::ArticleHeader;
pub use images::{build_image_map, ImageHandle, ImageResolver, ImageUploader};
pub use parser::blocks::{ContentBlock, InlineRun};
pub use parser::{transcribe, TranscodeOptions, Transcoder};
pub use pipeline::{Pipeline, PipelineOptions};
pub use publish::{CursorPolicy, DocumentApi, DocumentHandle, PublishReport, Publisher};
