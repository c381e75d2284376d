//! Annotator core
//!
//! Loads a PDF, renders its pages for editing, tracks free-text annotations
//! placed on them and burns those annotations into an exported copy.

pub mod busy;
pub mod config;
pub mod editor;
pub mod export;
pub mod pipeline;
pub mod transform;

#[cfg(test)]
mod test_support;

pub use busy::{BusyFlag, BusyGuard};
pub use config::{ConfigError, EditorConfig, DEFAULT_DISPLAY_SCALE, ENV_DATA_DIR, ENV_DISPLAY_SCALE};
pub use editor::{ClickOutcome, Editor, EditorError, ExportedFile, SelectedFile, PDF_MIME_TYPE};
pub use export::{export, export_point_size, export_with, text_run, ExportError, EXPORT_FILE_NAME};
pub use pipeline::{LoadError, RenderPipeline, RenderedPage};
pub use transform::{screen_to_pdf, PdfPoint};
