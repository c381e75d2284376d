//! Screen space to PDF user space.
//!
//! Screen coordinates start at the top-left of a page surface with Y growing
//! down, measured in pixels at the display scale. PDF coordinates start at the
//! bottom-left of the page box with Y growing up, measured in points.

use doc_model::{PageGeometry, ScreenPoint};
use pdf_engine::PageBox;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfPoint {
    pub x: f32,
    pub y: f32,
}

/// Maps a point on a rendered page surface into the page's PDF user space.
///
/// `page_box` must come from the document being written, not from the pixel
/// surface, which is rounded and scaled.
pub fn screen_to_pdf(point: ScreenPoint, geometry: &PageGeometry, page_box: &PageBox) -> PdfPoint {
    PdfPoint {
        x: page_box.x0 + geometry.to_pdf_units(point.x),
        y: page_box.y0 + page_box.height_pt - geometry.to_pdf_units(point.y),
    }
}
