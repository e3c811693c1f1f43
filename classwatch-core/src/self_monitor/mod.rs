//! Self-caused event suppression
//!
//! The class-change handler commonly renames or moves the note it was called
//! for. The host reports that as an ordinary rename, which would otherwise
//! re-enter the pipeline. Identifiers handed to the handler are placed in a
//! [`SuppressionWindow`] so the resulting events are recognised as feedback.

pub mod suppression;

pub use suppression::SuppressionWindow;
