use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use anyhow::{Context, Result};
use async_trait::async_trait;
use dialoguer::Select;

use crate::config::{Config, CONFIG_CANDIDATES};
use crate::core::{
    AnnotateOptions, Annotator, ApprovalHandler, ApprovalRequest, DescriptionSynthesizer,
    FileChange, ProgressEvent, SourceDialect, UnitExtractor,
};

/// Longest preview printed to the terminal, in characters
const PREVIEW_LIMIT: usize = 4000;

#[derive(Parser)]
#[command(name = "annotator")]
#[command(about = "Adds JSDoc blocks to JavaScript and TypeScript functions")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Document a file or every supported file in a folder
    Annotate {
        /// File or folder to annotate
        target: PathBuf,

        /// Replace existing documentation blocks
        #[arg(long)]
        overwrite: bool,

        /// Dry run - show the new text without writing it
        #[arg(long)]
        dry_run: bool,

        /// Ask the configured LLM provider for each block
        #[arg(long)]
        llm: bool,

        /// Confirm each file before it is written
        #[arg(short, long)]
        interactive: bool,

        /// Model to use for this run
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List the documentable units found in a file
    Extract {
        file: PathBuf,
    },

    /// Persist the model used for LLM synthesis
    Model {
        name: String,
    },
}

impl Cli {
    pub async fn execute(self, config: Config) -> Result<()> {
        match self.command {
            Commands::Annotate { target, overwrite, dry_run, llm, interactive, model } => {
                let options = AnnotateOptions {
                    overwrite_existing: overwrite,
                    preview_only: dry_run,
                    interactive,
                    use_external_synthesis: llm,
                    model_override: model,
                    progress: Some(Arc::new(print_progress)),
                    approval: interactive.then(|| Arc::new(TerminalApproval::default()) as Arc<dyn ApprovalHandler>),
                };
                annotate(Annotator::new(config), &target, &options).await
            }
            Commands::Extract { file } => extract(&file),
            Commands::Model { name } => set_model(self.config.as_deref(), &name),
        }
    }
}

async fn annotate(annotator: Annotator, target: &Path, options: &AnnotateOptions) -> Result<()> {
    if target.is_dir() {
        let result = annotator.annotate_folder(target, options).await?;
        for line in &result.summaries {
            println!("  {}", line);
        }
        if options.preview_only {
            for change in &result.changes {
                print_change(change);
            }
        }
        println!("{}", result.summary);
        return Ok(());
    }

    let result = annotator.annotate_file(target, options).await
        .with_context(|| format!("Failed to annotate {}", target.display()))?;

    println!("{}: {}", target.display(), result.reason);
    if let Some(text) = &result.rendered_text {
        println!("{}", truncate_preview(text));
    }
    Ok(())
}

fn extract(file: &Path) -> Result<()> {
    let dialect = SourceDialect::from_path(file)
        .with_context(|| format!("Unsupported file type: {}", file.display()))?;
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let units = UnitExtractor::new(dialect)?.extract(&source)?;
    let synthesizer = DescriptionSynthesizer::heuristic();

    println!("📄 {} unit(s) in {}", units.len(), file.display());
    for unit in &units {
        let params = unit.param_names().join(", ");
        println!(
            "  {} {}({}) [{}..{}]{}",
            unit.kind.label(),
            unit.name,
            params,
            unit.span.start,
            unit.span.end,
            if unit.is_async { " async" } else { "" }
        );
        println!("      {}", synthesizer.summarize(unit));
    }
    Ok(())
}

/// Store the model in the config file, leaving environment overrides out of it
fn set_model(path: Option<&Path>, name: &str) -> Result<()> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => CONFIG_CANDIDATES.iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .unwrap_or_else(|| PathBuf::from(CONFIG_CANDIDATES[1])),
    };

    let mut config = if path.exists() {
        Config::load(&path)?
    } else {
        Config::default()
    };
    config.llm.model = Some(name.to_string());
    config.save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("✅ Model set to {} in {}", name, path.display());
    Ok(())
}

fn print_progress(event: &ProgressEvent) {
    eprintln!(
        "  [{}/{}] {} in {}",
        event.index,
        event.total,
        event.function_name,
        event.file.display()
    );
}

fn print_change(change: &FileChange) {
    println!("\n--- {}", change.file.display());
    if let Some(text) = &change.rendered_text {
        println!("{}", truncate_preview(text));
    }
}

fn truncate_preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_LIMIT) {
        Some((cut, _)) => format!("{}\n... (truncated)", &text[..cut]),
        None => text.to_string(),
    }
}

/// Terminal confirmation; "all" approves every later file of the session
#[derive(Default)]
struct TerminalApproval {
    approve_all: Arc<AtomicBool>,
}

#[async_trait]
impl ApprovalHandler for TerminalApproval {
    async fn approve(&self, request: &ApprovalRequest) -> bool {
        if self.approve_all.load(Ordering::SeqCst) {
            return true;
        }

        println!("\n--- {}", request.path.display());
        println!("{}", request.change_summary);
        println!("{}", truncate_preview(&request.proposed));

        let prompt = if request.preview_only {
            format!("Show {} as a dry run?", request.path.display())
        } else {
            format!("Write changes to {}?", request.path.display())
        };
        let approve_all = Arc::clone(&self.approve_all);

        let choice = tokio::task::spawn_blocking(move || {
            Select::new()
                .with_prompt(prompt)
                .items(&["Yes", "No", "Yes to all"])
                .default(0)
                .interact()
        })
        .await;

        match choice {
            Ok(Ok(0)) => true,
            Ok(Ok(2)) => {
                approve_all.store(true, Ordering::SeqCst);
                true
            }
            Ok(Ok(_)) => false,
            Ok(Err(e)) => {
                tracing::warn!("Approval prompt failed: {}", e);
                false
            }
            Err(e) => {
                tracing::warn!("Approval prompt task failed: {}", e);
                false
            }
        }
    }
}
