//! Burn annotations into a copy of the source document.

use crate::transform::screen_to_pdf;
use doc_model::{Annotation, AnnotationId, FontSize, PageGeometry, LINE_HEIGHT_FACTOR};
use pdf_engine::{LopdfAuthoring, PageBox, PdfAuthoring, PdfEngineError, TextRun};

/// Name offered for the exported file.
pub const EXPORT_FILE_NAME: &str = "edited.pdf";

/// Point size written to the PDF for each display size.
///
/// Independent of [`FontSize::display_px`]; the two tables only share keys.
pub const fn export_point_size(size: FontSize) -> f32 {
    match size {
        FontSize::Small => 10.0,
        FontSize::Medium => 14.0,
        FontSize::Large => 18.0,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to load source document: {0}")]
    Load(#[source] PdfEngineError),
    #[error("failed to read size of page {page}: {source}")]
    PageBox {
        page: usize,
        #[source]
        source: PdfEngineError,
    },
    #[error("failed to draw annotation {id}: {source}")]
    Draw {
        id: AnnotationId,
        #[source]
        source: PdfEngineError,
    },
    #[error("failed to save document: {0}")]
    Save(#[source] PdfEngineError),
}

/// Writes `annotations` into a fresh copy of `source` using lopdf.
pub fn export(
    source: &[u8],
    annotations: &[Annotation],
    geometry: &[PageGeometry],
) -> Result<Vec<u8>, ExportError> {
    export_with::<LopdfAuthoring>(source, annotations, geometry)
}

/// Writes `annotations` into a fresh copy of `source`.
///
/// `geometry[i]` is the geometry page `i` was rendered with. Annotations are
/// written in slice order. An annotation is skipped when the copy has no such
/// page or the page was never rendered.
pub fn export_with<A: PdfAuthoring>(
    source: &[u8],
    annotations: &[Annotation],
    geometry: &[PageGeometry],
) -> Result<Vec<u8>, ExportError> {
    let mut document = A::load(source).map_err(ExportError::Load)?;
    let page_count = document.page_count();

    let mut written = 0usize;
    for annotation in annotations {
        let page = annotation.page;
        let Some(page_geometry) = geometry.get(page).filter(|_| page < page_count) else {
            tracing::warn!(id = %annotation.id, page, page_count, "skipping annotation on missing page");
            continue;
        };

        let page_box =
            document.page_box(page).map_err(|source| ExportError::PageBox { page, source })?;
        let run = text_run(annotation, page_geometry, &page_box);

        document
            .draw_text(page, &run)
            .map_err(|source| ExportError::Draw { id: annotation.id, source })?;
        written += 1;
    }

    let bytes = document.save().map_err(ExportError::Save)?;
    tracing::info!(
        written,
        skipped = annotations.len() - written,
        size = bytes.len(),
        "exported document"
    );

    Ok(bytes)
}

/// Text block for one annotation, positioned in PDF user space.
///
/// Lines split on `\n` each get their own baseline; the first baseline is the
/// annotation's mapped position.
pub fn text_run(annotation: &Annotation, geometry: &PageGeometry, page_box: &PageBox) -> TextRun {
    let origin = screen_to_pdf(annotation.position(), geometry, page_box);
    let point_size = export_point_size(annotation.font_size);

    TextRun {
        x: origin.x,
        y: origin.y,
        point_size,
        leading: point_size * LINE_HEIGHT_FACTOR,
        lines: annotation
            .text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_owned())
            .collect(),
    }
}
