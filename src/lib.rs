//! Annotator: inserts JSDoc-style documentation blocks above JavaScript and
//! TypeScript functions, methods and arrow functions.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;

pub use crate::config::Config;
pub use crate::core::{AnnotateOptions, Annotator};
pub use crate::error::{AnnotatorError, Result};
