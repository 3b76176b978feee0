//! The row-processing pipeline.
//!
//! This module provides:
//! - `ContextAccumulator`: bounded-window history of answers within one run
//! - `PromptBuilder`: deterministic prompt assembly from row + retrieval + history
//! - `RowProcessor`: embed → retrieve → prompt → generate for a single row
//! - `BatchDriver`: fetch-once iteration, bounded worker pool, ordered write-back

pub mod context;
pub mod driver;
pub mod prompt;
pub mod row;
pub mod types;

pub use context::ContextAccumulator;
pub use driver::BatchDriver;
pub use prompt::PromptBuilder;
pub use row::RowProcessor;
pub use types::{Row, RowResult, RowStatus, RunReport};
