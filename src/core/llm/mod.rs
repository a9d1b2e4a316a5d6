//! External text generation for documentation blocks
//!
//! The annotator only needs `generate(system, user) -> text`. Providers implement that
//! narrow trait; everything they return is sanitized by the caller, and any failure
//! simply means the heuristic block is used instead.

mod generator;
mod providers;

pub use generator::{build_user_payload, TextGenerator, SYSTEM_INSTRUCTION};
pub use providers::{create_generator, HostedApiGenerator, LocalEndpointGenerator};
