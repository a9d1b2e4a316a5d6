// src/core/mod.rs
mod unit;
mod extractor;
mod doc_blocks;
mod sanitizer;
mod synthesizer;
mod rewriter;
mod fingerprint;
mod annotator;
pub mod llm;

pub use unit::{DocumentableUnit, ParamInfo, UnitKind, ANONYMOUS, MAX_CALLED_IDENTIFIERS};
pub use extractor::{extract, SourceDialect, UnitExtractor, SUPPORTED_EXTENSIONS};
pub use doc_blocks::{find_preceding_block, find_preceding_run, reindent};
pub use sanitizer::sanitize_block;
pub use synthesizer::DescriptionSynthesizer;
pub use rewriter::{PlannedEdit, RewriteOutput, Rewriter};
pub use fingerprint::{ensure_unchanged, fingerprint};

// Export the controller
pub use annotator::{
    AnnotateOptions, Annotator, ApprovalHandler, ApprovalRequest, FileAnnotationResult,
    FileChange, FileOutcome, FolderAnnotationResult, ProgressCallback, ProgressEvent,
    RenderedFile, Rendering, IGNORED_DIRS,
};
