//! Text annotation model
//!
//! Annotations are keyed by id and partitioned by page. Positions are stored in
//! screen space, so nothing here needs to know the display scale or the PDF
//! page box.

use crate::geometry::{ScreenPoint, ScreenRect};
use serde::{Deserialize, Serialize};

/// Unique identifier for an annotation.
///
/// Opaque: no ordering is implied by its value.
pub type AnnotationId = uuid::Uuid;

/// Text shown on a freshly placed annotation.
pub const PLACEHOLDER_TEXT: &str = "Edit me";

/// Padding around the text box that still counts as the annotation's editing
/// chrome for hit testing.
const CHROME_PADDING_PX: f32 = 4.0;

/// Average glyph advance as a fraction of the font size.
const AVERAGE_ADVANCE_EM: f32 = 0.6;

/// Line height as a multiple of the font size.
pub const LINE_HEIGHT_FACTOR: f32 = 1.2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl FontSize {
    pub const ALL: [FontSize; 3] = [FontSize::Small, FontSize::Medium, FontSize::Large];

    /// On-screen text size in CSS pixels.
    ///
    /// This is the display table only. The export point sizes live with the
    /// exporter and are allowed to differ.
    pub const fn display_px(self) -> f32 {
        match self {
            FontSize::Small => 12.0,
            FontSize::Medium => 16.0,
            FontSize::Large => 20.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FontSize::Small => "small",
            FontSize::Medium => "medium",
            FontSize::Large => "large",
        }
    }
}

impl std::str::FromStr for FontSize {
    type Err = AnnotationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(FontSize::Small),
            "medium" => Ok(FontSize::Medium),
            "large" => Ok(FontSize::Large),
            _ => Err(AnnotationError::UnknownFontSize(value.to_owned())),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AnnotationError {
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: usize, page_count: usize },
    #[error("position ({x}, {y}) is not a finite point")]
    NonFinitePosition { x: f32, y: f32 },
    #[error("unknown font size {0:?} (expected small, medium or large)")]
    UnknownFontSize(String),
}

/// A free-text annotation bound to one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    /// Zero-based page index.
    pub page: usize,
    /// Offset from the page surface's left edge, in screen pixels.
    pub x: f32,
    /// Offset from the page surface's top edge, in screen pixels.
    pub y: f32,
    pub text: String,
    #[serde(default)]
    pub font_size: FontSize,
}

impl Annotation {
    pub fn new(page: usize, position: ScreenPoint) -> Self {
        Self {
            id: AnnotationId::new_v4(),
            page,
            x: position.x,
            y: position.y,
            text: PLACEHOLDER_TEXT.to_owned(),
            font_size: FontSize::default(),
        }
    }

    pub fn position(&self) -> ScreenPoint {
        ScreenPoint::new(self.x, self.y)
    }

    /// Moves the anchor onto a surface rendered at `factor` times the scale it
    /// was placed at.
    pub fn rescale(&mut self, factor: f32) {
        self.x *= factor;
        self.y *= factor;
    }

    /// Estimated screen box of the rendered text, anchored at its top-left.
    ///
    /// Glyph metrics are not available here, so the width uses an average
    /// advance per character. Empty text still occupies one em.
    pub fn text_box(&self) -> ScreenRect {
        let px = self.font_size.display_px();
        let lines: Vec<&str> = self.text.lines().collect();
        let longest = lines.iter().map(|line| line.chars().count()).max().unwrap_or(0);
        let line_count = lines.len().max(1);

        ScreenRect {
            x: self.x,
            y: self.y,
            width: (longest as f32 * px * AVERAGE_ADVANCE_EM).max(px),
            height: line_count as f32 * px * LINE_HEIGHT_FACTOR,
        }
    }

    /// Region in which a click belongs to this annotation rather than the page.
    pub fn hit_region(&self) -> ScreenRect {
        self.text_box().inflate(CHROME_PADDING_PX)
    }
}

/// Ordered set of annotations for one open document, plus the selection.
///
/// Insertion order is preserved so overlapping annotations keep their stacking
/// order across repeated renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationSet {
    annotations: Vec<Annotation>,
    selected: Option<AnnotationId>,
    page_count: usize,
}

impl AnnotationSet {
    pub fn new(page_count: usize) -> Self {
        Self { annotations: Vec::new(), selected: None, page_count }
    }

    /// Rebuilds a set from persisted annotations.
    ///
    /// Entries pointing past the last page or at a non-finite position are
    /// dropped and returned so the caller can report them.
    pub fn restore(page_count: usize, annotations: Vec<Annotation>) -> (Self, Vec<Annotation>) {
        let (kept, dropped): (Vec<_>, Vec<_>) = annotations.into_iter().partition(|annotation| {
            annotation.page < page_count && annotation.x.is_finite() && annotation.y.is_finite()
        });

        (Self { annotations: kept, selected: None, page_count }, dropped)
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Creates an annotation at a page-relative screen position and selects it.
    pub fn place(
        &mut self,
        page: usize,
        position: ScreenPoint,
    ) -> Result<&Annotation, AnnotationError> {
        if page >= self.page_count {
            return Err(AnnotationError::PageOutOfRange { page, page_count: self.page_count });
        }
        if !position.x.is_finite() || !position.y.is_finite() {
            return Err(AnnotationError::NonFinitePosition { x: position.x, y: position.y });
        }

        let annotation = Annotation::new(page, position);
        self.selected = Some(annotation.id);
        self.annotations.push(annotation);

        Ok(&self.annotations[self.annotations.len() - 1])
    }

    /// Returns true when the annotation exists.
    pub fn update_text(&mut self, id: AnnotationId, text: impl Into<String>) -> bool {
        match self.get_mut(id) {
            Some(annotation) => {
                annotation.text = text.into();
                true
            }
            None => false,
        }
    }

    /// Returns true when the annotation exists.
    pub fn update_font_size(&mut self, id: AnnotationId, size: FontSize) -> bool {
        match self.get_mut(id) {
            Some(annotation) => {
                annotation.font_size = size;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        let index = self.annotations.iter().position(|annotation| annotation.id == id)?;

        if self.selected == Some(id) {
            self.selected = None;
        }

        Some(self.annotations.remove(index))
    }

    /// Selects `id`, implicitly deselecting any other. Unknown ids are ignored.
    pub fn select(&mut self, id: AnnotationId) -> bool {
        if self.get(id).is_none() {
            return false;
        }

        self.selected = Some(id);
        true
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<AnnotationId> {
        self.selected
    }

    pub fn is_selected(&self, id: AnnotationId) -> bool {
        self.selected == Some(id)
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|annotation| annotation.id == id)
    }

    fn get_mut(&mut self, id: AnnotationId) -> Option<&mut Annotation> {
        self.annotations.iter_mut().find(|annotation| annotation.id == id)
    }

    /// Annotations on one page in insertion order.
    pub fn for_page(&self, page: usize) -> impl Iterator<Item = &Annotation> + '_ {
        self.annotations.iter().filter(move |annotation| annotation.page == page)
    }

    /// Topmost annotation on `page` whose interactive region contains `point`.
    pub fn hit_test(&self, page: usize, point: ScreenPoint) -> Option<&Annotation> {
        self.annotations
            .iter()
            .rev()
            .find(|annotation| annotation.page == page && annotation.hit_region().contains(point))
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_page_set() -> AnnotationSet {
        AnnotationSet::new(2)
    }

    #[test]
    fn place_then_for_page_returns_new_selected_annotation() {
        let mut set = two_page_set();
        let id = set.place(0, ScreenPoint::new(100.0, 50.0)).expect("place should succeed").id;

        let on_page: Vec<_> = set.for_page(0).collect();
        assert_eq!(on_page.len(), 1);
        assert_eq!(on_page[0].id, id);
        assert_eq!(on_page[0].text, PLACEHOLDER_TEXT);
        assert_eq!(on_page[0].font_size, FontSize::Medium);
        assert!(set.is_selected(id));
        assert_eq!(set.for_page(1).count(), 0);
    }

    #[test]
    fn place_rejects_missing_page() {
        let mut set = two_page_set();
        let err = set.place(2, ScreenPoint::new(0.0, 0.0)).expect_err("page 2 does not exist");

        assert_eq!(err, AnnotationError::PageOutOfRange { page: 2, page_count: 2 });
        assert!(set.is_empty());
    }

    #[test]
    fn place_rejects_non_finite_position() {
        let mut set = two_page_set();

        let err = set.place(0, ScreenPoint::new(f32::NAN, 10.0)).expect_err("NaN x");
        assert!(matches!(err, AnnotationError::NonFinitePosition { y, .. } if y == 10.0));
        assert!(set.place(0, ScreenPoint::new(5.0, f32::INFINITY)).is_err());
        assert!(set.is_empty());
        assert_eq!(set.selected(), None);
    }

    #[test]
    fn rescale_moves_anchor_with_surface() {
        let mut annotation = Annotation::new(0, ScreenPoint::new(150.0, 75.0));
        annotation.rescale(2.0);

        assert_eq!(annotation.position(), ScreenPoint::new(300.0, 150.0));
    }

    #[test]
    fn placing_moves_selection_to_newest() {
        let mut set = two_page_set();
        let first = set.place(0, ScreenPoint::new(10.0, 10.0)).expect("place").id;
        let second = set.place(1, ScreenPoint::new(10.0, 10.0)).expect("place").id;

        assert!(!set.is_selected(first));
        assert!(set.is_selected(second));

        assert!(set.select(first));
        assert_eq!(set.selected(), Some(first));
    }

    #[test]
    fn select_unknown_id_keeps_current_selection() {
        let mut set = two_page_set();
        let id = set.place(0, ScreenPoint::new(10.0, 10.0)).expect("place").id;

        assert!(!set.select(AnnotationId::new_v4()));
        assert_eq!(set.selected(), Some(id));

        set.clear_selection();
        assert_eq!(set.selected(), None);
    }

    #[test]
    fn remove_selected_clears_selection() {
        let mut set = two_page_set();
        let id = set.place(0, ScreenPoint::new(100.0, 50.0)).expect("place").id;

        assert!(set.remove(id).is_some());
        assert_eq!(set.selected(), None);
        assert_eq!(set.for_page(0).count(), 0);
    }

    #[test]
    fn remove_unknown_id_is_noop() {
        let mut set = two_page_set();
        let id = set.place(0, ScreenPoint::new(100.0, 50.0)).expect("place").id;

        assert!(set.remove(AnnotationId::new_v4()).is_none());
        assert_eq!(set.len(), 1);
        assert_eq!(set.selected(), Some(id));
    }

    #[test]
    fn remove_unselected_keeps_other_selection() {
        let mut set = two_page_set();
        let first = set.place(0, ScreenPoint::new(10.0, 10.0)).expect("place").id;
        let second = set.place(0, ScreenPoint::new(300.0, 300.0)).expect("place").id;

        set.remove(first);
        assert_eq!(set.selected(), Some(second));
    }

    #[test]
    fn updates_ignore_unknown_ids() {
        let mut set = two_page_set();
        let id = set.place(0, ScreenPoint::new(10.0, 10.0)).expect("place").id;

        assert!(!set.update_text(AnnotationId::new_v4(), "lost"));
        assert!(!set.update_font_size(AnnotationId::new_v4(), FontSize::Large));

        assert!(set.update_text(id, "Signed"));
        assert!(set.update_font_size(id, FontSize::Large));

        let annotation = set.get(id).expect("annotation should exist");
        assert_eq!(annotation.text, "Signed");
        assert_eq!(annotation.font_size, FontSize::Large);
    }

    #[test]
    fn for_page_keeps_insertion_order() {
        let mut set = AnnotationSet::new(3);
        let mut expected = Vec::new();
        for i in 0..5 {
            let page = i % 2;
            let id = set.place(page, ScreenPoint::new(i as f32, i as f32)).expect("place").id;
            if page == 0 {
                expected.push(id);
            }
        }

        let first: Vec<_> = set.for_page(0).map(|a| a.id).collect();
        let second: Vec<_> = set.for_page(0).map(|a| a.id).collect();
        assert_eq!(first, expected);
        assert_eq!(first, second);
    }

    #[test]
    fn hit_test_finds_annotation_under_click() {
        let mut set = two_page_set();
        let id = set.place(0, ScreenPoint::new(100.0, 50.0)).expect("place").id;

        let hit = set.hit_test(0, ScreenPoint::new(105.0, 55.0)).map(|a| a.id);
        assert_eq!(hit, Some(id));

        assert!(set.hit_test(1, ScreenPoint::new(105.0, 55.0)).is_none());
        assert!(set.hit_test(0, ScreenPoint::new(400.0, 400.0)).is_none());
    }

    #[test]
    fn hit_test_prefers_topmost() {
        let mut set = two_page_set();
        set.place(0, ScreenPoint::new(100.0, 50.0)).expect("place");
        let top = set.place(0, ScreenPoint::new(102.0, 52.0)).expect("place").id;

        assert_eq!(set.hit_test(0, ScreenPoint::new(110.0, 60.0)).map(|a| a.id), Some(top));
    }

    #[test]
    fn text_box_grows_with_size_and_lines() {
        let mut annotation = Annotation::new(0, ScreenPoint::new(0.0, 0.0));
        let medium = annotation.text_box();

        annotation.font_size = FontSize::Large;
        let large = annotation.text_box();
        assert!(large.width > medium.width);
        assert!(large.height > medium.height);

        annotation.text = "one\ntwo".to_owned();
        assert_eq!(annotation.text_box().height, 2.0 * 20.0 * LINE_HEIGHT_FACTOR);

        annotation.text.clear();
        assert_eq!(annotation.text_box().width, 20.0);
    }

    #[test]
    fn restore_drops_annotations_past_last_page() {
        let keep = Annotation::new(0, ScreenPoint::new(1.0, 1.0));
        let stale = Annotation::new(5, ScreenPoint::new(1.0, 1.0));
        let mut corrupt = Annotation::new(1, ScreenPoint::new(1.0, 1.0));
        corrupt.y = f32::INFINITY;

        let (set, dropped) =
            AnnotationSet::restore(2, vec![keep.clone(), stale.clone(), corrupt.clone()]);

        assert_eq!(set.annotations(), &[keep]);
        assert_eq!(dropped, vec![stale, corrupt]);
        assert_eq!(set.selected(), None);
    }

    #[test]
    fn font_size_parses_labels() {
        for size in FontSize::ALL {
            assert_eq!(size.label().parse::<FontSize>(), Ok(size));
        }
        assert_eq!(" LARGE ".parse::<FontSize>(), Ok(FontSize::Large));
        assert!("huge".parse::<FontSize>().is_err());
    }

    #[test]
    fn annotation_json_uses_lowercase_sizes() {
        let mut annotation = Annotation::new(1, ScreenPoint::new(3.5, 4.0));
        annotation.font_size = FontSize::Small;

        let json = serde_json::to_value(&annotation).expect("serialize");
        assert_eq!(json["font_size"], "small");
        assert_eq!(json["page"], 1);

        let back: Annotation = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, annotation);
    }
}
