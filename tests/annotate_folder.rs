use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use assert_fs::prelude::*;
use assert_fs::TempDir;
use async_trait::async_trait;
use predicates::prelude::*;

use annotator::core::{ApprovalHandler, ApprovalRequest, FileOutcome, Rendering};
use annotator::{AnnotateOptions, Annotator, AnnotatorError, Config};

const CART: &str = "\
export class Cart {
  addItem(item, qty = 1) {
    this.items.push(item);
  }
}
";

const API: &str = "\
export const fetchOrders = async (userId: string): Promise<Order[]> => {
  const res = await fetch(`/orders/${userId}`);
  return res.json();
};
";

/// Counts requests and answers with a fixed decision
struct CountingApproval {
    answer: bool,
    asked: AtomicUsize,
}

#[async_trait]
impl ApprovalHandler for CountingApproval {
    async fn approve(&self, request: &ApprovalRequest) -> bool {
        assert!(request.proposed.contains("/**"));
        assert!(!request.change_summary.is_empty());
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

fn fixture() -> TempDir {
    let temp = TempDir::new().unwrap();
    temp.child("cart.js").write_str(CART).unwrap();
    temp.child("api/orders.ts").write_str(API).unwrap();
    temp.child("ui/View.tsx").write_str("export function renderView() {\n  return <div />;\n}\n").unwrap();
    temp.child("node_modules/pkg/index.js").write_str("function vendored() {}\n").unwrap();
    temp.child("build/out.js").write_str("function generated() {}\n").unwrap();
    temp.child("README.md").write_str("# docs\n").unwrap();
    temp
}

#[tokio::test]
async fn folder_run_documents_eligible_files_only() {
    let temp = fixture();
    let annotator = Annotator::new(Config::default());

    let result = annotator.annotate_folder(temp.path(), &AnnotateOptions::default()).await.unwrap();

    assert_eq!(result.scanned_files, 3);
    assert_eq!(result.changed_files, 3);
    assert_eq!(result.summary, "Scanned 3 file(s). 3 changed.");

    temp.child("cart.js").assert(predicate::str::contains(
        "  /**\n   * Performs item\n   * @param item - TODO: describe.\n   * @param [qty=1] - TODO: describe.\n   */\n  addItem(item, qty = 1) {",
    ));
    temp.child("api/orders.ts").assert(predicate::str::starts_with(
        "/**\n * Asynchronously fetches orders\n * @async\n * @param {string} userId - TODO: describe.\n * @returns {Promise<Order[]>}\n */\nexport const fetchOrders",
    ));
    temp.child("ui/View.tsx").assert(predicate::str::contains(" * Renders view\n */\nexport function renderView()"));
    temp.child("node_modules/pkg/index.js").assert("function vendored() {}\n");
    temp.child("build/out.js").assert("function generated() {}\n");
}

#[tokio::test]
async fn second_folder_run_is_a_no_op() {
    let temp = fixture();
    let annotator = Annotator::new(Config::default());
    let options = AnnotateOptions::default();

    annotator.annotate_folder(temp.path(), &options).await.unwrap();
    let first = std::fs::read_to_string(temp.child("cart.js").path()).unwrap();

    let second = annotator.annotate_folder(temp.path(), &options).await.unwrap();
    assert_eq!(second.scanned_files, 3);
    assert_eq!(second.changed_files, 0);
    assert!(second.summaries.is_empty());
    temp.child("cart.js").assert(first.as_str());
}

#[tokio::test]
async fn dry_run_collects_previews_without_writing() {
    let temp = fixture();
    let annotator = Annotator::new(Config::default());
    let options = AnnotateOptions {
        preview_only: true,
        ..Default::default()
    };

    let result = annotator.annotate_folder(temp.path(), &options).await.unwrap();

    assert_eq!(result.changed_files, 3);
    assert_eq!(result.changes.len(), 3);
    assert!(result.changes.iter().all(|c| c.rendered_text.as_deref().is_some_and(|t| t.contains("/**"))));
    temp.child("cart.js").assert(CART);
    temp.child("api/orders.ts").assert(API);
}

#[tokio::test]
async fn declined_approval_leaves_every_file_untouched() {
    let temp = fixture();
    let approval = Arc::new(CountingApproval { answer: false, asked: AtomicUsize::new(0) });
    let options = AnnotateOptions {
        interactive: true,
        approval: Some(approval.clone()),
        ..Default::default()
    };

    let result = Annotator::new(Config::default())
        .annotate_folder(temp.path(), &options)
        .await
        .unwrap();

    assert_eq!(approval.asked.load(Ordering::SeqCst), 3);
    assert_eq!(result.changed_files, 0);
    temp.child("cart.js").assert(CART);
    temp.child("api/orders.ts").assert(API);
}

#[tokio::test]
async fn broken_file_does_not_stop_the_walk() {
    let temp = fixture();
    temp.child("api/broken.ts").write_str("export function (( {\n").unwrap();

    let result = Annotator::new(Config::default())
        .annotate_folder(temp.path(), &AnnotateOptions::default())
        .await
        .unwrap();

    assert_eq!(result.scanned_files, 4);
    assert_eq!(result.changed_files, 3);
    assert_eq!(result.failed_files, 1);
    assert!(result.summaries.iter().any(|s| s.starts_with("Error on") && s.contains("broken.ts")));
    assert!(result.summary.ends_with("1 failed."));
}

#[tokio::test]
async fn commit_detects_concurrent_edit() {
    let temp = TempDir::new().unwrap();
    let file = temp.child("late.js");
    file.write_str("function loadConfig(path) {}\n").unwrap();
    let annotator = Annotator::new(Config::default());

    let rendering = annotator.render(file.path(), &AnnotateOptions::default()).await.unwrap();
    let Rendering::Rendered(rendered) = rendering else {
        panic!("expected a rendering");
    };
    assert_eq!(rendered.documented_units, 1);

    file.write_str("function loadConfig(path, strict) {}\n").unwrap();
    let err = annotator.commit(&rendered).unwrap_err();

    assert!(matches!(err, AnnotatorError::HashMismatch { .. }));
    file.assert("function loadConfig(path, strict) {}\n");
}

#[tokio::test]
async fn single_file_outcomes() {
    let temp = TempDir::new().unwrap();
    let file = temp.child("calc.js");
    file.write_str("const computeTotal = (items) => items.length;\n").unwrap();
    let annotator = Annotator::new(Config::default());

    let result = annotator.annotate_file(file.path(), &AnnotateOptions::default()).await.unwrap();
    assert_eq!(result.outcome, FileOutcome::Committed);
    file.assert(
        "/**\n * Computes total\n * @param items - TODO: describe.\n */\nconst computeTotal = (items) => items.length;\n",
    );
}
