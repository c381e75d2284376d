//! Authoring side: load a document, draw text onto pages, serialize it.

use crate::{inherited_attribute, page_box, PageBox, PdfEngineError};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::BTreeMap;

/// Resource name the annotation font is registered under on every touched page.
const FONT_RESOURCE: &str = "AnnotHelv";

/// One left-aligned block of text in PDF user space.
///
/// The first line's baseline sits at `(x, y)`; each following line moves down
/// by `leading`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x: f32,
    pub y: f32,
    pub point_size: f32,
    pub leading: f32,
    pub lines: Vec<String>,
}

pub trait PdfAuthoring: Sized {
    fn load(bytes: &[u8]) -> Result<Self, PdfEngineError>;
    fn page_count(&self) -> usize;
    fn page_box(&self, page_index: usize) -> Result<PageBox, PdfEngineError>;
    /// Draws black Helvetica text onto a page.
    fn draw_text(&mut self, page_index: usize, run: &TextRun) -> Result<(), PdfEngineError>;
    fn save(self) -> Result<Vec<u8>, PdfEngineError>;
}

/// lopdf implementation. Text is collected per page and appended as one
/// content stream per page on [`PdfAuthoring::save`].
pub struct LopdfAuthoring {
    doc: Document,
    pages: Vec<ObjectId>,
    pending: BTreeMap<usize, Vec<Operation>>,
}

impl LopdfAuthoring {
    fn page_id(&self, page_index: usize) -> Result<ObjectId, PdfEngineError> {
        self.pages.get(page_index).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: self.pages.len(),
        })
    }
}

impl PdfAuthoring for LopdfAuthoring {
    fn load(bytes: &[u8]) -> Result<Self, PdfEngineError> {
        let doc = Document::load_mem(bytes)?;
        let pages = doc.get_pages().into_values().collect();

        Ok(Self { doc, pages, pending: BTreeMap::new() })
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_box(&self, page_index: usize) -> Result<PageBox, PdfEngineError> {
        page_box(&self.doc, self.page_id(page_index)?)
    }

    fn draw_text(&mut self, page_index: usize, run: &TextRun) -> Result<(), PdfEngineError> {
        self.page_id(page_index)?;
        self.pending.entry(page_index).or_default().extend(text_operations(run));
        Ok(())
    }

    fn save(self) -> Result<Vec<u8>, PdfEngineError> {
        let Self { mut doc, pages, pending } = self;

        if !pending.is_empty() {
            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
                "Encoding" => "WinAnsiEncoding",
            });

            for (page_index, operations) in pending {
                let page_id = pages[page_index];
                register_font(&mut doc, page_id, font_id)?;
                append_content(&mut doc, page_id, operations)?;
            }
        }

        let mut output = Vec::new();
        doc.save_to(&mut output).map_err(lopdf::Error::from)?;
        Ok(output)
    }
}

fn text_operations(run: &TextRun) -> Vec<Operation> {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Name(FONT_RESOURCE.as_bytes().to_vec()), run.point_size.into()]),
        Operation::new("rg", vec![0.into(), 0.into(), 0.into()]),
        Operation::new("TL", vec![run.leading.into()]),
        Operation::new("Td", vec![run.x.into(), run.y.into()]),
    ];

    for (index, line) in run.lines.iter().enumerate() {
        if index > 0 {
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(line), StringFormat::Literal)],
        ));
    }

    operations.push(Operation::new("ET", vec![]));
    operations
}

/// Maps text to single-byte WinAnsi codes for the standard Helvetica font.
///
/// ASCII and the Latin-1 range pass through; anything else becomes `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            '\t' => b' ',
            ' '..='~' => ch as u8,
            '\u{a0}'..='\u{ff}' => ch as u32 as u8,
            _ => b'?',
        })
        .collect()
}

/// Adds the annotation font to the page's own Resources.
///
/// Inherited or shared Resources are copied onto the page first so other pages
/// are never touched.
fn register_font(doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> Result<(), PdfEngineError> {
    let mut resources = match inherited_attribute(doc, page_id, b"Resources")? {
        Some(object) => doc.dereference(object)?.1.as_dict().cloned().unwrap_or_default(),
        None => Dictionary::new(),
    };

    let mut fonts = match resources.get(b"Font") {
        Ok(object) => doc.dereference(object)?.1.as_dict().cloned().unwrap_or_default(),
        Err(_) => Dictionary::new(),
    };
    fonts.set(FONT_RESOURCE, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    doc.get_object_mut(page_id)?.as_dict_mut()?.set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Appends text operations after the page's existing content.
///
/// The existing streams are bracketed with `q`/`Q` so any graphics state they
/// leave behind cannot shift or recolor the appended text.
fn append_content(
    doc: &mut Document,
    page_id: ObjectId,
    operations: Vec<Operation>,
) -> Result<(), PdfEngineError> {
    let existing = existing_contents(doc, page_id)?;

    let save_state = Content { operations: vec![Operation::new("q", vec![])] }.encode()?;
    let mut overlay = vec![Operation::new("Q", vec![])];
    overlay.extend(operations);
    let overlay = Content { operations: overlay }.encode()?;

    let save_id = doc.add_object(Stream::new(dictionary! {}, save_state));
    let overlay_id = doc.add_object(Stream::new(dictionary! {}, overlay));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(save_id));
    contents.extend(existing);
    contents.push(Object::Reference(overlay_id));

    doc.get_object_mut(page_id)?.as_dict_mut()?.set("Contents", Object::Array(contents));
    Ok(())
}

fn existing_contents(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>, PdfEngineError> {
    let page = doc.get_dictionary(page_id)?;

    let contents = match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id)? {
            Object::Array(items) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    Ok(contents)
}
