// src/core/annotator.rs
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{AnnotatorError, Result};
use super::doc_blocks::find_preceding_run;
use super::extractor::{SourceDialect, UnitExtractor};
use super::fingerprint::{ensure_unchanged, fingerprint};
use super::llm::{create_generator, TextGenerator};
use super::rewriter::{PlannedEdit, Rewriter};
use super::synthesizer::DescriptionSynthesizer;

/// Housekeeping directories never descended into during folder runs
pub const IGNORED_DIRS: [&str; 10] = [
    "node_modules", ".git", "dist", "build", "out", ".vs", "obj", "bin", "debug", "release",
];

pub const REASON_UNSUPPORTED: &str = "Unsupported file type";
pub const REASON_NO_UNITS: &str = "No functions/classes found";
pub const REASON_ALL_DOCUMENTED: &str = "All functions already documented";
pub const REASON_NOT_APPROVED: &str = "Change not approved";
pub const REASON_NO_APPROVER: &str = "Change not approved: no approval handler available";

/// Emitted before each unit is synthesized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub file: PathBuf,
    pub function_name: String,
    /// 1-based, strictly increasing within a file
    pub index: usize,
    pub total: usize,
}

pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Everything an approver needs to decide on one file
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub path: PathBuf,
    pub change_summary: String,
    pub original: String,
    pub proposed: String,
    /// Nothing is written regardless of the answer
    pub preview_only: bool,
}

/// Yes/no decision source for interactive runs; session-wide auto-approval is the
/// implementor's business
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    async fn approve(&self, request: &ApprovalRequest) -> bool;
}

/// Per-invocation settings
#[derive(Clone, Default)]
pub struct AnnotateOptions {
    /// Replace blocks already documenting a unit instead of skipping the unit
    pub overwrite_existing: bool,

    /// Compute the new text without writing it
    pub preview_only: bool,

    /// Ask the approval handler before committing
    pub interactive: bool,

    /// Try the configured text-generation provider before the heuristic block
    pub use_external_synthesis: bool,

    /// Model name taking precedence over the configuration
    pub model_override: Option<String>,

    pub progress: Option<ProgressCallback>,

    pub approval: Option<Arc<dyn ApprovalHandler>>,
}

/// Terminal state of a single-file run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileOutcome {
    /// Nothing to do (unsupported, no units, everything documented)
    Skipped,
    /// New text computed but not written
    Previewed,
    /// New text written to disk
    Committed,
    /// Approval declined
    Discarded,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileAnnotationResult {
    pub changed: bool,

    /// Full new content, present only when it was not written
    pub rendered_text: Option<String>,

    /// Human-readable explanation of the outcome
    pub reason: String,

    pub outcome: FileOutcome,

    pub documented_units: usize,
}

impl FileAnnotationResult {
    fn skipped(reason: impl Into<String>) -> Self {
        Self {
            changed: false,
            rendered_text: None,
            reason: reason.into(),
            outcome: FileOutcome::Skipped,
            documented_units: 0,
        }
    }

    fn discarded(reason: impl Into<String>) -> Self {
        Self {
            outcome: FileOutcome::Discarded,
            ..Self::skipped(reason)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileChange {
    pub file: PathBuf,
    pub rendered_text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FolderAnnotationResult {
    pub scanned_files: usize,
    pub changed_files: usize,
    pub failed_files: usize,
    /// One line per changed or failed file
    pub summaries: Vec<String>,
    /// Changed files in traversal order, for sequential previews
    pub changes: Vec<FileChange>,
    pub summary: String,
}

/// A file whose new text has been computed but not yet persisted
#[derive(Debug, Clone)]
pub struct RenderedFile {
    pub path: PathBuf,
    pub original: String,
    pub text: String,
    pub change_summary: String,
    pub documented_units: usize,
    /// Hash of `original`, checked again before committing
    pub fingerprint: String,
}

#[derive(Debug, Clone)]
pub enum Rendering {
    Skipped { reason: String },
    Rendered(RenderedFile),
}

/// Drives extraction, synthesis, rewriting and approval for files and folders
pub struct Annotator {
    config: Config,
    rewriter: Rewriter,
    generator_override: Option<Arc<dyn TextGenerator>>,
}

impl Annotator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            rewriter: Rewriter::new(),
            generator_override: None,
        }
    }

    /// Use `generator` for external synthesis instead of the configured provider
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator_override = Some(generator);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Pick the synthesis path for one invocation; never fails, only degrades
    fn synthesizer_for(&self, options: &AnnotateOptions) -> DescriptionSynthesizer {
        if !options.use_external_synthesis {
            return DescriptionSynthesizer::heuristic();
        }

        if let Some(generator) = &self.generator_override {
            return DescriptionSynthesizer::with_generator(Arc::clone(generator));
        }

        let resolved = self.config.llm.resolve(options.model_override.as_deref());
        if !resolved.is_usable() {
            warn!("⚠️ External synthesis requested but no API key is configured; using heuristics");
            return DescriptionSynthesizer::heuristic();
        }

        match create_generator(&resolved) {
            Ok(generator) => {
                info!("✅ External synthesis enabled: {} ({})", generator.provider_name(), generator.model_name());
                DescriptionSynthesizer::with_generator(Arc::from(generator))
            }
            Err(e) => {
                warn!("⚠️ Failed to initialize text generator: {}", e);
                DescriptionSynthesizer::heuristic()
            }
        }
    }

    /// Compute the annotated text for `path` without touching the file
    pub async fn render(&self, path: &Path, options: &AnnotateOptions) -> Result<Rendering> {
        let synthesizer = self.synthesizer_for(options);
        self.render_with(path, options, &synthesizer).await
    }

    async fn render_with(
        &self,
        path: &Path,
        options: &AnnotateOptions,
        synthesizer: &DescriptionSynthesizer,
    ) -> Result<Rendering> {
        let Some(dialect) = SourceDialect::from_path(path) else {
            return Ok(Rendering::Skipped { reason: REASON_UNSUPPORTED.to_string() });
        };
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();

        let source = std::fs::read_to_string(path)?;
        let units = UnitExtractor::new(dialect)?.extract(&source)?;
        if units.is_empty() {
            return Ok(Rendering::Skipped { reason: REASON_NO_UNITS.to_string() });
        }

        let points: Vec<usize> = units.iter()
            .map(|unit| self.rewriter.insertion_point(&source, unit))
            .collect();

        // Units sharing a line own the stack of blocks above it together; the first of
        // them replaces the whole stack and the rest stack their blocks after it.
        let mut claimed = HashSet::new();
        let mut targets = Vec::with_capacity(units.len());
        for (unit, &insertion_point) in units.into_iter().zip(&points) {
            let sharing = points.iter().filter(|&&p| p == insertion_point).count();
            let replace_from = match find_preceding_run(&source, insertion_point, sharing) {
                Some(existing) if options.overwrite_existing => {
                    if claimed.insert(insertion_point) {
                        existing.start
                    } else {
                        insertion_point
                    }
                }
                Some(_) => {
                    debug!("Skipping documented {} in {}", unit.name, path.display());
                    continue;
                }
                None => insertion_point,
            };
            targets.push((unit, insertion_point, replace_from));
        }

        if targets.is_empty() {
            return Ok(Rendering::Skipped { reason: REASON_ALL_DOCUMENTED.to_string() });
        }

        let total = targets.len();
        let mut edits = Vec::with_capacity(total);
        for (index, (mut unit, insertion_point, replace_from)) in targets.into_iter().enumerate() {
            unit.summary = synthesizer.summarize(&unit);

            if let Some(progress) = &options.progress {
                progress(&ProgressEvent {
                    file: path.to_path_buf(),
                    function_name: unit.name.clone(),
                    index: index + 1,
                    total,
                });
            }

            let indent = self.rewriter.indentation_at(&source, insertion_point);
            let block = synthesizer.synthesize_block(&unit, &source, extension, indent).await;
            edits.push(PlannedEdit {
                unit_name: unit.name,
                insertion_point,
                replace_from,
                block,
            });
        }

        let output = self.rewriter.apply(&source, edits);
        debug!("Rendered {} block(s) for {}", output.applied, path.display());

        Ok(Rendering::Rendered(RenderedFile {
            path: path.to_path_buf(),
            fingerprint: fingerprint(&source),
            original: source,
            text: output.text,
            change_summary: output.change_summary,
            documented_units: output.applied,
        }))
    }

    /// Write a rendered file, refusing if the file changed since it was rendered
    pub fn commit(&self, rendered: &RenderedFile) -> Result<()> {
        let current = std::fs::read_to_string(&rendered.path)?;
        ensure_unchanged(&rendered.fingerprint, &current)?;
        std::fs::write(&rendered.path, &rendered.text)?;
        info!("✅ Documented {} function(s) in {}", rendered.documented_units, rendered.path.display());
        Ok(())
    }

    /// Run the full single-file pipeline: render, optionally ask, then commit or preview
    pub async fn annotate_file(&self, path: &Path, options: &AnnotateOptions) -> Result<FileAnnotationResult> {
        let synthesizer = self.synthesizer_for(options);
        self.annotate_file_with(path, options, &synthesizer).await
    }

    async fn annotate_file_with(
        &self,
        path: &Path,
        options: &AnnotateOptions,
        synthesizer: &DescriptionSynthesizer,
    ) -> Result<FileAnnotationResult> {
        let rendered = match self.render_with(path, options, synthesizer).await? {
            Rendering::Skipped { reason } => return Ok(FileAnnotationResult::skipped(reason)),
            Rendering::Rendered(rendered) => rendered,
        };

        if options.interactive {
            let Some(approval) = &options.approval else {
                return Ok(FileAnnotationResult::discarded(REASON_NO_APPROVER));
            };

            let request = ApprovalRequest {
                path: rendered.path.clone(),
                change_summary: rendered.change_summary.clone(),
                original: rendered.original.clone(),
                proposed: rendered.text.clone(),
                preview_only: options.preview_only,
            };
            if !approval.approve(&request).await {
                info!("Change not approved for {}", path.display());
                return Ok(FileAnnotationResult::discarded(REASON_NOT_APPROVED));
            }
        }

        if options.preview_only {
            return Ok(FileAnnotationResult {
                changed: true,
                reason: format!("Dry run: {} function(s) would be documented", rendered.documented_units),
                outcome: FileOutcome::Previewed,
                documented_units: rendered.documented_units,
                rendered_text: Some(rendered.text),
            });
        }

        self.commit(&rendered)?;
        Ok(FileAnnotationResult {
            changed: true,
            rendered_text: None,
            reason: format!("Documented {} function(s)", rendered.documented_units),
            outcome: FileOutcome::Committed,
            documented_units: rendered.documented_units,
        })
    }

    /// Annotate every supported file under `folder`, depth first, one file at a time.
    ///
    /// Errors on individual files are recorded and the walk continues; files already
    /// committed stay committed.
    pub async fn annotate_folder(&self, folder: &Path, options: &AnnotateOptions) -> Result<FolderAnnotationResult> {
        if !folder.is_dir() {
            return Err(AnnotatorError::FileSystem(format!("Not a directory: {}", folder.display())));
        }

        info!("🔍 Scanning folder: {}", folder.display());
        let synthesizer = self.synthesizer_for(options);
        let mut result = FolderAnnotationResult::default();

        let walker = WalkDir::new(folder)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_ignored_dir(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Failed to read directory entry: {}", e);
                    result.summaries.push(format!("Error on {}: {}", display_path(e.path(), folder), e));
                    result.failed_files += 1;
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().is_file() || SourceDialect::from_path(path).is_none() {
                continue;
            }

            result.scanned_files += 1;
            let relative = relative_display(path, folder);

            match self.annotate_file_with(path, options, &synthesizer).await {
                Ok(file_result) if file_result.changed => {
                    result.changed_files += 1;
                    result.summaries.push(format!("Changed: {}", relative));
                    result.changes.push(FileChange {
                        file: path.to_path_buf(),
                        rendered_text: file_result.rendered_text,
                    });
                }
                Ok(file_result) => {
                    debug!("Unchanged {}: {}", relative, file_result.reason);
                }
                Err(e) => {
                    warn!("❌ Failed to annotate {}: {}", relative, e);
                    result.failed_files += 1;
                    result.summaries.push(format!("Error on {}: {}", relative, e));
                }
            }
        }

        result.summary = format!("Scanned {} file(s). {} changed.", result.scanned_files, result.changed_files);
        if result.failed_files > 0 {
            result.summary.push_str(&format!(" {} failed.", result.failed_files));
        }
        info!("{}", result.summary);

        Ok(result)
    }
}

fn is_ignored_dir(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry.file_name().to_str().is_some_and(|name| IGNORED_DIRS.contains(&name))
}

fn relative_display(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

fn display_path(path: Option<&Path>, root: &Path) -> String {
    path.map(|p| relative_display(p, root))
        .unwrap_or_else(|| root.display().to_string())
}
