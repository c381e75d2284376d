//! Render pipeline
//!
//! Decodes document bytes and rasterizes every page, in order, onto a pixel
//! surface sized from the page's viewport at one display scale. The
//! [`PageGeometry`] recorded for each page is what annotation placement and
//! export measure against.

use doc_model::PageGeometry;
use pdf_engine::{DocumentHandle, PdfEngine, PdfEngineError, RgbaImage};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to decode document: {0}")]
    Decode(#[source] PdfEngineError),
    #[error("failed to render page {page}: {source}")]
    Page {
        page: usize,
        #[source]
        source: PdfEngineError,
    },
}

/// One rasterized page and the geometry its overlay must use.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub index: usize,
    pub geometry: PageGeometry,
    pub surface: RgbaImage,
}

pub struct RenderPipeline<E> {
    engine: E,
    scale: f32,
}

impl<E: PdfEngine> RenderPipeline<E> {
    pub fn new(engine: E, scale: f32) -> Self {
        Self { engine, scale }
    }

    /// Pixels per PDF point every page is rendered at.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn load(&mut self, bytes: &[u8]) -> Result<Vec<RenderedPage>, LoadError> {
        self.load_with_progress(bytes, |_| {})
    }

    /// Renders all pages, calling `on_page` as each one completes.
    ///
    /// Pages finish strictly in index order. Any failure discards every page
    /// rendered so far.
    pub fn load_with_progress(
        &mut self,
        bytes: &[u8],
        mut on_page: impl FnMut(&RenderedPage),
    ) -> Result<Vec<RenderedPage>, LoadError> {
        let handle = self.engine.open(bytes).map_err(LoadError::Decode)?;

        let result = self.render_all(handle, &mut on_page);

        if let Err(err) = self.engine.close(handle) {
            tracing::warn!(handle = handle.raw(), error = %err, "failed to close document");
        }

        result
    }

    fn render_all(
        &self,
        handle: DocumentHandle,
        on_page: &mut impl FnMut(&RenderedPage),
    ) -> Result<Vec<RenderedPage>, LoadError> {
        let page_count = self.engine.page_count(handle).map_err(LoadError::Decode)?;
        tracing::info!(page_count, scale = self.scale, "rendering document");

        let mut pages = Vec::with_capacity(page_count);
        for index in 0..page_count {
            let page = self
                .render_page(handle, index)
                .map_err(|source| LoadError::Page { page: index, source })?;

            tracing::debug!(
                page = index,
                width = page.geometry.pixel_width,
                height = page.geometry.pixel_height,
                "rendered page"
            );
            on_page(&page);
            pages.push(page);
        }

        Ok(pages)
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        index: usize,
    ) -> Result<RenderedPage, PdfEngineError> {
        let viewport = self.engine.viewport(handle, index, self.scale)?;
        let (width, height) = viewport.pixel_size();

        let mut surface = RgbaImage::new(width, height);
        self.engine.render_into(handle, index, self.scale, &mut surface)?;

        Ok(RenderedPage { index, geometry: PageGeometry::new(self.scale, width, height), surface })
    }
}
