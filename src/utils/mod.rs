//! Shared utility functions.
//!
//! - `html`: visible-text rendering of parsed markup

pub mod html;

pub use html::{collapse_whitespace, rendered_lines, rendered_text};
