//! Output file naming: template rendering and path-safe metadata.

mod sanitize;
mod template;

pub use sanitize::{sanitize_segment, REPLACEMENT};
pub use template::{pad_width, Template, TemplateError};
