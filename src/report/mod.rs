//! Narrative situation reports.

pub mod completion;
pub mod narrator;

pub use completion::{CompletionClient, CompletionConfig};
pub use narrator::NarrativeReporter;
