use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::convert::TargetBlock;
use crate::error::{PipelineError, PublishError};

pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Where appended blocks go: a document and the block they are children of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHandle {
    pub document_id: String,
    pub parent_block_id: String,
}

impl DocumentHandle {
    /// The document's root block, whose id equals the document id.
    pub fn root(document_id: impl Into<String>) -> Self {
        let document_id = document_id.into();
        DocumentHandle {
            parent_block_id: document_id.clone(),
            document_id,
        }
    }
}

/// The publisher's only write surface.
pub trait DocumentApi {
    fn append_children(
        &self,
        document: &DocumentHandle,
        children: &[TargetBlock],
        index: usize,
    ) -> Result<(), PublishError>;
}

/// A contiguous slice of blocks and the index it is appended at.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    pub index: usize,
    pub blocks: &'a [TargetBlock],
}

/// What happens to the insertion cursor when a batch fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CursorPolicy {
    /// Move past the failed batch anyway, so later batches land at the index
    /// they would have had on success. Fits destinations that tolerate gaps.
    #[default]
    Advance,
    /// Only move on success, for destinations that reject out-of-range indices.
    Hold,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub index: usize,
    pub len: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Blocks handed to the destination across all issued batches.
    pub attempted: usize,
    pub succeeded: usize,
    pub batches: Vec<BatchOutcome>,
    /// Set when the caller cancelled before every batch was issued.
    pub cancelled: bool,
}

impl PublishReport {
    pub fn is_success(&self) -> bool {
        self.succeeded > 0
    }

    pub fn failed_batches(&self) -> usize {
        self.batches.iter().filter(|b| b.error.is_some()).count()
    }
}

/// Appends blocks to a document in fixed-size batches.
#[derive(Debug, Clone)]
pub struct Publisher {
    batch_size: usize,
    cursor_policy: CursorPolicy,
    cancel: Option<Arc<AtomicBool>>,
}

impl Publisher {
    pub fn new(batch_size: usize) -> Result<Self, PipelineError> {
        if batch_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        Ok(Publisher {
            batch_size,
            cursor_policy: CursorPolicy::default(),
            cancel: None,
        })
    }

    pub fn with_cursor_policy(mut self, policy: CursorPolicy) -> Self {
        self.cursor_policy = policy;
        self
    }

    /// Checked before each batch; once set, no further batch is issued.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Publish every block in order. Failed batches are logged and skipped,
    /// never retried; the run always carries on to the next batch.
    pub fn publish<A: DocumentApi + ?Sized>(
        &self,
        api: &A,
        document: &DocumentHandle,
        blocks: Vec<TargetBlock>,
    ) -> PublishReport {
        let mut report = PublishReport::default();
        let mut cursor = 0usize;
        let total_batches = blocks.len().div_ceil(self.batch_size);

        for (n, chunk) in blocks.chunks(self.batch_size).enumerate() {
            if self.is_cancelled() {
                warn!(
                    "Publish cancelled before batch {}/{}",
                    n + 1,
                    total_batches
                );
                report.cancelled = true;
                break;
            }

            let batch = Batch {
                index: cursor,
                blocks: chunk,
            };
            debug!(
                "Appending batch {}/{} ({} blocks at index {})",
                n + 1,
                total_batches,
                batch.blocks.len(),
                batch.index
            );

            report.attempted += batch.blocks.len();
            let result = api.append_children(document, batch.blocks, batch.index);
            let advanced = match &result {
                Ok(()) => {
                    report.succeeded += batch.blocks.len();
                    true
                }
                Err(e) => {
                    warn!(
                        "Batch {}/{} at index {} failed: {}",
                        n + 1,
                        total_batches,
                        batch.index,
                        e
                    );
                    self.cursor_policy == CursorPolicy::Advance
                }
            };
            if advanced {
                cursor += batch.blocks.len();
            }
            report.batches.push(BatchOutcome {
                index: batch.index,
                len: batch.blocks.len(),
                error: result.err().map(|e| e.to_string()),
            });
        }

        info!(
            "Published {}/{} blocks to {} ({} failed batches)",
            report.succeeded,
            report.attempted,
            document.document_id,
            report.failed_batches()
        );
        report
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}
