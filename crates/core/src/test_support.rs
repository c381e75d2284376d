//! Reads back text written by the exporter, and an authoring backend that
//! fails on demand.

use lopdf::content::Content;
use lopdf::Document;
use pdf_engine::{LopdfAuthoring, PageBox, PdfAuthoring, PdfEngineError, TextRun};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DrawnText {
    pub page: usize,
    pub x: f32,
    pub y: f32,
    pub point_size: f32,
    pub leading: f32,
    pub lines: Vec<String>,
}

/// Every BT..ET block in the document, in page then stream order.
pub(crate) fn drawn_text(bytes: &[u8]) -> Vec<DrawnText> {
    let doc = Document::load_mem(bytes).expect("exported bytes should parse");
    let mut drawn = Vec::new();

    for (page, page_id) in doc.get_pages().into_values().enumerate() {
        let content = doc.get_page_content(page_id).expect("page content");
        let operations = Content::decode(&content).expect("content should decode").operations;

        let mut current: Option<DrawnText> = None;
        for op in operations {
            let float = |index: usize| op.operands[index].as_float().expect("numeric operand");
            match op.operator.as_str() {
                "BT" => {
                    current = Some(DrawnText {
                        page,
                        x: 0.0,
                        y: 0.0,
                        point_size: 0.0,
                        leading: 0.0,
                        lines: Vec::new(),
                    })
                }
                "Tf" => current.as_mut().expect("Tf inside BT").point_size = float(1),
                "TL" => current.as_mut().expect("TL inside BT").leading = float(0),
                "Td" => {
                    let text = current.as_mut().expect("Td inside BT");
                    text.x = float(0);
                    text.y = float(1);
                }
                "Tj" => {
                    let line = op.operands[0].as_str().expect("string operand");
                    current
                        .as_mut()
                        .expect("Tj inside BT")
                        .lines
                        .push(String::from_utf8_lossy(line).into_owned());
                }
                "ET" => drawn.extend(current.take()),
                _ => {}
            }
        }
    }

    drawn
}

pub(crate) const FAIL_PAGE_BOX: u8 = 0;
pub(crate) const FAIL_DRAW: u8 = 1;
pub(crate) const FAIL_SAVE: u8 = 2;

/// Behaves like [`LopdfAuthoring`] except at the `STAGE` it is told to fail.
pub(crate) struct FailingAuthoring<const STAGE: u8>(LopdfAuthoring);

fn injected(stage: &str) -> PdfEngineError {
    PdfEngineError::Backend(format!("{stage} failed"))
}

impl<const STAGE: u8> PdfAuthoring for FailingAuthoring<STAGE> {
    fn load(bytes: &[u8]) -> Result<Self, PdfEngineError> {
        LopdfAuthoring::load(bytes).map(Self)
    }

    fn page_count(&self) -> usize {
        self.0.page_count()
    }

    fn page_box(&self, page_index: usize) -> Result<PageBox, PdfEngineError> {
        if STAGE == FAIL_PAGE_BOX {
            return Err(injected("page box"));
        }
        self.0.page_box(page_index)
    }

    fn draw_text(&mut self, page_index: usize, run: &TextRun) -> Result<(), PdfEngineError> {
        if STAGE == FAIL_DRAW {
            return Err(injected("draw"));
        }
        self.0.draw_text(page_index, run)
    }

    fn save(self) -> Result<Vec<u8>, PdfEngineError> {
        if STAGE == FAIL_SAVE {
            return Err(injected("save"));
        }
        self.0.save()
    }
}
