//! Editing session for one open document.
//!
//! Ties the render pipeline, the annotation set, persistence and export
//! together. Every user action maps to one method here.

use crate::busy::BusyFlag;
use crate::config::{ConfigError, EditorConfig};
use crate::export::{ExportError, EXPORT_FILE_NAME};
use crate::pipeline::{LoadError, RenderPipeline, RenderedPage};
use doc_model::{
    Annotation, AnnotationError, AnnotationId, AnnotationSet, FontSize, PageGeometry, ScreenPoint,
};
use pdf_engine::{default_engine, LopdfAuthoring, LopdfEngine, PdfAuthoring, PdfEngine};
use std::path::Path;
use storage::{DocumentKey, Storage};

pub const PDF_MIME_TYPE: &str = "application/pdf";

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("{name} is not a PDF (declared type {mime_type:?})")]
    NotPdf { name: String, mime_type: String },
    #[error("another load or export is already running")]
    Busy,
    #[error("no document is loaded")]
    NoDocument,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Annotation(#[from] AnnotationError),
}

/// A file chosen by the user, with the type label it was offered under.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), mime_type: mime_type.into(), bytes }
    }

    /// Reads a file from disk and labels it by extension, like a file picker.
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self { name, mime_type: mime_type_for(path).to_owned(), bytes })
    }

    /// Checks the declared type only. Content is validated by decoding.
    pub fn is_pdf(&self) -> bool {
        self.mime_type.eq_ignore_ascii_case(PDF_MIME_TYPE)
    }
}

fn mime_type_for(path: &Path) -> &'static str {
    let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("pdf") => PDF_MIME_TYPE,
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Empty page area: a new annotation was created and selected.
    Placed(AnnotationId),
    /// The click landed on an existing annotation, which is now selected.
    Selected(AnnotationId),
    /// The point is outside the page surface.
    OffPage,
}

#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub file_name: &'static str,
    pub bytes: Vec<u8>,
}

struct LoadedDocument {
    key: DocumentKey,
    /// Bytes exactly as selected; export always starts from these.
    source: Vec<u8>,
    pages: Vec<RenderedPage>,
}

pub struct Editor<E = LopdfEngine> {
    pipeline: RenderPipeline<E>,
    storage: Option<Storage>,
    busy: BusyFlag,
    document: Option<LoadedDocument>,
    annotations: AnnotationSet,
    dirty: bool,
}

impl Editor<LopdfEngine> {
    /// Editor on the default engine, persisting to the configured data dir.
    ///
    /// If no data dir is configured and the platform one cannot be resolved,
    /// the editor runs without persistence.
    pub fn new(config: &EditorConfig) -> Result<Self, EditorError> {
        config.validate()?;

        let storage = match &config.data_dir {
            Some(dir) => Some(Storage::with_root(dir)),
            None => match Storage::from_default_project() {
                Ok(storage) => Some(storage),
                Err(err) => {
                    tracing::warn!(error = %err, "annotation persistence disabled");
                    None
                }
            },
        };

        Ok(Self::with_engine(default_engine(), config.display_scale, storage))
    }
}

impl<E: PdfEngine> Editor<E> {
    pub fn with_engine(engine: E, display_scale: f32, storage: Option<Storage>) -> Self {
        Self {
            pipeline: RenderPipeline::new(engine, display_scale),
            storage,
            busy: BusyFlag::default(),
            document: None,
            annotations: AnnotationSet::default(),
            dirty: false,
        }
    }

    /// Handle on the in-flight flag, for disabling controls while busy.
    pub fn busy_flag(&self) -> BusyFlag {
        self.busy.clone()
    }

    pub fn open(&mut self, file: SelectedFile) -> Result<usize, EditorError> {
        self.open_with_progress(file, |_| {})
    }

    /// Loads `file`, replacing the current document.
    ///
    /// A wrongly labelled file is rejected before anything changes. Once
    /// decoding starts the previous document is gone; a failed load leaves
    /// nothing loaded. Saved annotations for the same bytes are restored.
    pub fn open_with_progress(
        &mut self,
        file: SelectedFile,
        on_page: impl FnMut(&RenderedPage),
    ) -> Result<usize, EditorError> {
        if !file.is_pdf() {
            return Err(EditorError::NotPdf { name: file.name, mime_type: file.mime_type });
        }

        let _guard = self.busy.try_acquire().ok_or(EditorError::Busy)?;
        self.close();

        tracing::info!(name = %file.name, size = file.bytes.len(), "loading document");
        let pages = self.pipeline.load_with_progress(&file.bytes, on_page)?;

        let key = DocumentKey::from_bytes(&file.bytes);
        let page_count = pages.len();
        self.annotations = self.restore_annotations(&key, page_count);
        self.document = Some(LoadedDocument { key, source: file.bytes, pages });

        Ok(page_count)
    }

    pub fn close(&mut self) {
        self.document = None;
        self.annotations = AnnotationSet::default();
        self.dirty = false;
    }

    fn restore_annotations(&self, key: &DocumentKey, page_count: usize) -> AnnotationSet {
        let Some(storage) = &self.storage else {
            return AnnotationSet::new(page_count);
        };

        let saved = match storage.load_annotations(key) {
            Ok(Some(saved)) if !saved.annotations.is_empty() => saved,
            Ok(_) => return AnnotationSet::new(page_count),
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "ignoring unreadable saved annotations");
                return AnnotationSet::new(page_count);
            }
        };

        let scale = self.pipeline.scale();
        let mut annotations = saved.annotations;
        match saved.display_scale.filter(|saved| saved.is_finite() && *saved > 0.0) {
            Some(saved_scale) if saved_scale != scale => {
                let factor = scale / saved_scale;
                tracing::debug!(saved_scale, scale, "rescaling saved annotations");
                annotations.iter_mut().for_each(|annotation| annotation.rescale(factor));
            }
            Some(_) => {}
            None => tracing::warn!(scale, "saved annotations have no display scale, assuming current"),
        }

        let (set, dropped) = AnnotationSet::restore(page_count, annotations);
        if !dropped.is_empty() {
            tracing::warn!(count = dropped.len(), "dropped unusable saved annotations");
        }
        tracing::info!(count = set.len(), "restored annotations");
        set
    }

    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    pub fn page_count(&self) -> usize {
        self.document.as_ref().map_or(0, |document| document.pages.len())
    }

    pub fn pages(&self) -> &[RenderedPage] {
        self.document.as_ref().map_or(&[], |document| document.pages.as_slice())
    }

    pub fn document_key(&self) -> Option<&DocumentKey> {
        self.document.as_ref().map(|document| &document.key)
    }

    pub fn page_geometry(&self, page: usize) -> Result<PageGeometry, EditorError> {
        let document = self.document.as_ref().ok_or(EditorError::NoDocument)?;
        document.pages.get(page).map(|rendered| rendered.geometry).ok_or_else(|| {
            AnnotationError::PageOutOfRange { page, page_count: document.pages.len() }.into()
        })
    }

    /// Handles a click on page `page`'s surface.
    ///
    /// A click on an existing annotation selects it instead of placing a new
    /// one underneath.
    pub fn click(&mut self, page: usize, point: ScreenPoint) -> Result<ClickOutcome, EditorError> {
        let geometry = self.page_geometry(page)?;
        if !geometry.contains(point) {
            return Ok(ClickOutcome::OffPage);
        }

        if let Some(id) = self.annotations.hit_test(page, point).map(|hit| hit.id) {
            self.annotations.select(id);
            return Ok(ClickOutcome::Selected(id));
        }

        self.place(page, point).map(ClickOutcome::Placed)
    }

    /// Places an annotation without hit testing.
    pub fn place(&mut self, page: usize, point: ScreenPoint) -> Result<AnnotationId, EditorError> {
        if self.document.is_none() {
            return Err(EditorError::NoDocument);
        }

        let id = self.annotations.place(page, point)?.id;
        self.changed();
        Ok(id)
    }

    pub fn update_text(&mut self, id: AnnotationId, text: impl Into<String>) -> bool {
        let found = self.annotations.update_text(id, text);
        if found {
            self.changed();
        }
        found
    }

    pub fn update_font_size(&mut self, id: AnnotationId, size: FontSize) -> bool {
        let found = self.annotations.update_font_size(id, size);
        if found {
            self.changed();
        }
        found
    }

    pub fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        let removed = self.annotations.remove(id);
        if removed.is_some() {
            self.changed();
        }
        removed
    }

    pub fn select(&mut self, id: AnnotationId) -> bool {
        self.annotations.select(id)
    }

    pub fn clear_selection(&mut self) {
        self.annotations.clear_selection();
    }

    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }

    pub fn annotations_for_page(&self, page: usize) -> impl Iterator<Item = &Annotation> + '_ {
        self.annotations.for_page(page)
    }

    /// True when annotations changed since the document was loaded or last exported.
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    /// Produces `edited.pdf` with every annotation burned in.
    ///
    /// On failure the document and annotations are left as they were.
    pub fn export(&mut self) -> Result<ExportedFile, EditorError> {
        self.export_with::<LopdfAuthoring>()
    }

    /// [`Editor::export`] through a specific authoring backend.
    pub fn export_with<A: PdfAuthoring>(&mut self) -> Result<ExportedFile, EditorError> {
        let _guard = self.busy.try_acquire().ok_or(EditorError::Busy)?;
        let document = self.document.as_ref().ok_or(EditorError::NoDocument)?;

        let geometry: Vec<PageGeometry> = document.pages.iter().map(|page| page.geometry).collect();
        let bytes = crate::export::export_with::<A>(
            &document.source,
            self.annotations.annotations(),
            &geometry,
        )?;

        self.dirty = false;
        Ok(ExportedFile { file_name: EXPORT_FILE_NAME, bytes })
    }

    fn changed(&mut self) {
        self.dirty = true;

        let (Some(storage), Some(document)) = (&self.storage, &self.document) else {
            return;
        };
        let scale = self.pipeline.scale();
        if let Err(err) =
            storage.save_annotations(&document.key, scale, self.annotations.annotations())
        {
            tracing::warn!(key = %document.key, error = %err, "failed to persist annotations");
        }
    }
}
