use image::{ImageBuffer, Rgba};
use lopdf::{Document, Object, ObjectId};
use std::collections::HashMap;

pub mod authoring;
#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

pub use authoring::{LopdfAuthoring, PdfAuthoring, TextRun};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

const MAX_INHERITANCE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Page box in PDF user space (origin bottom-left, Y up, points).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub x0: f32,
    pub y0: f32,
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageBox {
    pub const LETTER: PageBox = PageBox { x0: 0.0, y0: 0.0, width_pt: 612.0, height_pt: 792.0 };

    pub fn new(width_pt: f32, height_pt: f32) -> Self {
        Self { x0: 0.0, y0: 0.0, width_pt, height_pt }
    }
}

/// Pixel box a page occupies when drawn at `scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    /// Integer surface size for this viewport, never smaller than 1x1.
    pub fn pixel_size(&self) -> (u32, u32) {
        (self.width.round().max(1.0) as u32, self.height.round().max(1.0) as u32)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: usize, page_count: usize },
    #[error("invalid render scale {0}")]
    InvalidScale(f32),
    #[error("surface is {actual:?}, page needs {expected:?}")]
    SurfaceMismatch { expected: (u32, u32), actual: (u32, u32) },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("document has no pages")]
    NoPages,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Rendering side: decode a document and rasterize its pages.
pub trait PdfEngine {
    /// Decodes `bytes`. The engine keeps whatever it needs until [`PdfEngine::close`].
    fn open(&mut self, bytes: &[u8]) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<usize, PdfEngineError>;
    fn viewport(
        &self,
        handle: DocumentHandle,
        page_index: usize,
        scale: f32,
    ) -> Result<Viewport, PdfEngineError>;
    /// Draws the page into `surface`, which must already match the viewport's pixel size.
    fn render_into(
        &self,
        handle: DocumentHandle,
        page_index: usize,
        scale: f32,
        surface: &mut RgbaImage,
    ) -> Result<(), PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    page_boxes: Vec<PageBox>,
}

/// lopdf-backed engine.
///
/// lopdf does not rasterize, so pages are painted as blank sheets with a thin
/// frame at the exact viewport size. Build with the `pdfium` feature for real
/// page content.
#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_boxes(bytes: &[u8]) -> Result<Vec<PageBox>, PdfEngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let boxes = doc
            .get_pages()
            .into_values()
            .map(|page_id| page_box(&doc, page_id))
            .collect::<Result<Vec<_>, _>>()?;

        if boxes.is_empty() {
            return Err(PdfEngineError::NoPages);
        }

        Ok(boxes)
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn page_box(&self, handle: DocumentHandle, page_index: usize) -> Result<PageBox, PdfEngineError> {
        let record = self.record(handle)?;
        record.page_boxes.get(page_index).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: record.page_boxes.len(),
        })
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, bytes: &[u8]) -> Result<DocumentHandle, PdfEngineError> {
        let page_boxes = Self::parse_boxes(bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.docs.insert(handle, DocumentRecord { page_boxes });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<usize, PdfEngineError> {
        Ok(self.record(handle)?.page_boxes.len())
    }

    fn viewport(
        &self,
        handle: DocumentHandle,
        page_index: usize,
        scale: f32,
    ) -> Result<Viewport, PdfEngineError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(PdfEngineError::InvalidScale(scale));
        }

        let page_box = self.page_box(handle, page_index)?;
        Ok(Viewport { scale, width: page_box.width_pt * scale, height: page_box.height_pt * scale })
    }

    fn render_into(
        &self,
        handle: DocumentHandle,
        page_index: usize,
        scale: f32,
        surface: &mut RgbaImage,
    ) -> Result<(), PdfEngineError> {
        let expected = self.viewport(handle, page_index, scale)?.pixel_size();
        let actual = surface.dimensions();
        if expected != actual {
            return Err(PdfEngineError::SurfaceMismatch { expected, actual });
        }

        let (width, height) = actual;
        for pixel in surface.pixels_mut() {
            *pixel = Rgba([255, 255, 255, 255]);
        }

        if width >= 4 && height >= 4 {
            for x in 0..width {
                surface.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                surface.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                surface.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                surface.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(())
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

#[cfg(feature = "pdfium")]
pub mod pdfium_backend {
    use super::*;
    use pdfium_render::prelude::*;

    /// Real rasterizer. Page geometry still comes from lopdf so both backends
    /// report identical viewports for the same bytes.
    pub struct PdfiumEngine {
        pdfium: &'static Pdfium,
        inner: LopdfEngine,
        documents: HashMap<DocumentHandle, PdfDocument<'static>>,
    }

    impl PdfiumEngine {
        /// Binds the system pdfium library. The binding lives for the rest of
        /// the process so open documents can borrow it.
        pub fn from_system_library() -> Result<Self, PdfEngineError> {
            let bindings = Pdfium::bind_to_system_library().map_err(|err| {
                PdfEngineError::Backend(format!("failed to bind pdfium system library: {err}"))
            })?;

            Ok(Self {
                pdfium: Box::leak(Box::new(Pdfium::new(bindings))),
                inner: LopdfEngine::new(),
                documents: HashMap::new(),
            })
        }
    }

    fn backend(err: PdfiumError) -> PdfEngineError {
        PdfEngineError::Backend(err.to_string())
    }

    impl PdfEngine for PdfiumEngine {
        fn open(&mut self, bytes: &[u8]) -> Result<DocumentHandle, PdfEngineError> {
            let handle = self.inner.open(bytes)?;

            match self.pdfium.load_pdf_from_byte_vec(bytes.to_vec(), None) {
                Ok(document) => {
                    self.documents.insert(handle, document);
                    Ok(handle)
                }
                Err(err) => {
                    self.inner.close(handle)?;
                    Err(backend(err))
                }
            }
        }

        fn page_count(&self, handle: DocumentHandle) -> Result<usize, PdfEngineError> {
            self.inner.page_count(handle)
        }

        fn viewport(
            &self,
            handle: DocumentHandle,
            page_index: usize,
            scale: f32,
        ) -> Result<Viewport, PdfEngineError> {
            self.inner.viewport(handle, page_index, scale)
        }

        fn render_into(
            &self,
            handle: DocumentHandle,
            page_index: usize,
            scale: f32,
            surface: &mut RgbaImage,
        ) -> Result<(), PdfEngineError> {
            self.inner.render_into(handle, page_index, scale, surface)?;

            let document =
                self.documents.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))?;
            let index = page_index.try_into().map_err(|_| PdfEngineError::PageOutOfRange {
                page: page_index,
                page_count: self.inner.page_count(handle).unwrap_or_default(),
            })?;
            let page = document.pages().get(index).map_err(backend)?;

            let config = PdfRenderConfig::new()
                .set_target_width(surface.width() as i32)
                .set_target_height(surface.height() as i32);
            let bitmap = page.render_with_config(&config).map_err(backend)?;
            let rgba = bitmap.as_rgba_bytes();

            for (pixel, chunk) in surface.pixels_mut().zip(rgba.chunks_exact(4)) {
                *pixel = Rgba([chunk[0], chunk[1], chunk[2], chunk[3]]);
            }

            Ok(())
        }

        fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
            self.documents.remove(&handle);
            self.inner.close(handle)
        }
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

/// Reads a page's MediaBox, following `/Parent` inheritance.
///
/// Pages without a usable MediaBox fall back to US Letter.
pub fn page_box(doc: &Document, page_id: ObjectId) -> Result<PageBox, PdfEngineError> {
    let Some(object) = inherited_attribute(doc, page_id, b"MediaBox")? else {
        return Ok(PageBox::LETTER);
    };

    let (_, object) = doc.dereference(object)?;
    let Ok(array) = object.as_array() else {
        return Ok(PageBox::LETTER);
    };
    if array.len() != 4 {
        return Ok(PageBox::LETTER);
    }

    let mut values = [0.0f32; 4];
    for (slot, value) in values.iter_mut().zip(array) {
        *slot = doc.dereference(value)?.1.as_float()?;
    }
    let [ax, ay, bx, by] = values;

    Ok(PageBox { x0: ax.min(bx), y0: ay.min(by), width_pt: (bx - ax).abs(), height_pt: (by - ay).abs() })
}

/// Looks up `key` on a page dictionary or the nearest ancestor that defines it.
pub(crate) fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<Option<&'a Object>, PdfEngineError> {
    let mut dict = doc.get_dictionary(page_id)?;

    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(value) = dict.get(key) {
            return Ok(Some(value));
        }

        match dict.get(b"Parent").and_then(|parent| parent.as_reference()) {
            Ok(parent) => dict = doc.get_dictionary(parent)?,
            Err(_) => return Ok(None),
        }
    }

    Ok(None)
}
