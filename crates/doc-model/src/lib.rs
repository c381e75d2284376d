//! Screen-space annotation model shared by the overlay and the exporter.

pub mod annotation;
pub mod geometry;

pub use annotation::{
    Annotation, AnnotationError, AnnotationId, AnnotationSet, FontSize, LINE_HEIGHT_FACTOR,
    PLACEHOLDER_TEXT,
};
pub use geometry::{PageGeometry, ScreenPoint, ScreenRect};
