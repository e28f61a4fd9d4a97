//! Bates stamp compositor.
//!
//! Each page is offered to an ordered list of [`OverlayStrategy`]s. The first
//! that succeeds wins; if none does, the page is left as it was and reported
//! unstamped. Stamping a page never fails the caller.

pub mod layout;
pub mod overlay;

use lopdf::{dictionary, Document, ObjectId};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::StampStyle;
use crate::pdf;
use crate::render::type1_font;
use crate::sequencer::Reservation;

pub use layout::{Frame, StampGeometry};
pub use overlay::{ContentMerge, FormRedraw, Overlay, OverlayStrategy};

pub const FONT_RESOURCE: &str = "FBates";
pub const GSTATE_RESOURCE: &str = "GSBates";
pub const FORM_RESOURCE: &str = "BatesPage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StampMethod {
    ContentMerge,
    FormRedraw,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageStamp {
    Stamped(StampMethod),
    Unstamped { reason: String },
}

impl PageStamp {
    pub fn is_stamped(&self) -> bool {
        matches!(self, PageStamp::Stamped(_))
    }
}

/// Shared font and graphics-state objects, added once per document.
#[derive(Debug, Clone, Copy)]
pub struct StampResources {
    pub font: ObjectId,
    pub graphics_state: ObjectId,
}

/// Per-page outcome for a whole document, in page order.
#[derive(Debug, Default)]
pub struct DocumentStamp {
    pub pages: Vec<PageStamp>,
}

impl DocumentStamp {
    pub fn stamped_count(&self) -> u32 {
        self.pages.iter().filter(|p| p.is_stamped()).count() as u32
    }

    /// 1-based numbers of the pages that were left unstamped.
    pub fn unstamped_pages(&self) -> Vec<u32> {
        self.pages
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.is_stamped())
            .map(|(i, _)| i as u32 + 1)
            .collect()
    }

    pub fn used(&self, method: StampMethod) -> bool {
        self.pages.contains(&PageStamp::Stamped(method))
    }
}

pub struct Compositor {
    style: StampStyle,
    strategies: Vec<Box<dyn OverlayStrategy>>,
}

impl Compositor {
    pub fn new(style: StampStyle) -> Self {
        Self::with_strategies(style, vec![Box::new(ContentMerge), Box::new(FormRedraw)])
    }

    pub fn with_strategies(style: StampStyle, strategies: Vec<Box<dyn OverlayStrategy>>) -> Self {
        Self { style, strategies }
    }

    pub fn style(&self) -> &StampStyle {
        &self.style
    }

    pub fn prepare(&self, doc: &mut Document) -> StampResources {
        let alpha = self.style.alpha();
        let font = doc.add_object(type1_font(layout::STAMP_FONT.base_name()));
        let graphics_state = doc.add_object(dictionary! {
            "Type" => "ExtGState",
            "ca" => alpha,
            "CA" => alpha,
        });
        StampResources {
            font,
            graphics_state,
        }
    }

    pub fn stamp_page(
        &self,
        doc: &mut Document,
        page_id: ObjectId,
        label: &str,
        resources: &StampResources,
    ) -> PageStamp {
        let page_box = pdf::page_box(doc, page_id);
        let geometry = StampGeometry::compute(label, &self.style, &page_box);

        let content = match overlay::encode(overlay::stamp_operations(&geometry, &self.style, label)) {
            Ok(content) => content,
            Err(e) => {
                return PageStamp::Unstamped {
                    reason: e.to_string(),
                }
            }
        };
        let overlay = Overlay {
            content,
            resources,
            page_box,
        };

        let mut reason = String::from("no overlay strategy configured");
        for strategy in &self.strategies {
            match strategy.apply(doc, page_id, &overlay) {
                Ok(()) => {
                    debug!(label, method = ?strategy.method(), "Stamped page");
                    return PageStamp::Stamped(strategy.method());
                }
                Err(e) => {
                    warn!(label, method = ?strategy.method(), error = %e, "Overlay strategy failed");
                    reason = e.to_string();
                }
            }
        }

        PageStamp::Unstamped { reason }
    }

    /// Stamps every page with its label from `reservation`, page `i` getting
    /// `first_number + i`.
    pub fn stamp_document(&self, doc: &mut Document, reservation: &Reservation) -> DocumentStamp {
        let resources = self.prepare(doc);
        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();

        let mut result = DocumentStamp::default();
        for (index, page_id) in page_ids.into_iter().enumerate() {
            let outcome = match reservation.label_for(index as u32) {
                Some(label) => self.stamp_page(doc, page_id, &label, &resources),
                None => PageStamp::Unstamped {
                    reason: format!("no label reserved for page {}", index + 1),
                },
            };
            result.pages.push(outcome);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StampError;
    use crate::pdf::fixtures;
    use crate::sequencer::{BatesSequencer, LabelFormat};
    use lopdf::Object;

    struct AlwaysFails;

    impl OverlayStrategy for AlwaysFails {
        fn method(&self) -> StampMethod {
            StampMethod::ContentMerge
        }

        fn apply(&self, _: &mut Document, _: ObjectId, _: &Overlay<'_>) -> Result<(), StampError> {
            Err(StampError::Contents("refused".to_string()))
        }
    }

    fn reservation(pages: u32) -> Reservation {
        let mut sequencer = BatesSequencer::new(LabelFormat::new("ABC", 5), 1);
        sequencer.reserve(pages)
    }

    fn page_text(doc: &Document, page_id: ObjectId) -> String {
        String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
    }

    fn first_page(doc: &Document) -> ObjectId {
        *doc.get_pages().values().next().unwrap()
    }

    // ── content merge ──

    #[test]
    fn test_content_merge_stamps_every_page() {
        let mut doc = fixtures::document(3);
        let result = Compositor::new(StampStyle::default()).stamp_document(&mut doc, &reservation(3));

        assert_eq!(result.stamped_count(), 3);
        assert!(result.unstamped_pages().is_empty());
        assert!(result.used(StampMethod::ContentMerge));

        for (index, page_id) in doc.get_pages().into_values().enumerate() {
            let text = page_text(&doc, page_id);
            assert!(text.contains(&format!("(ABC0000{})", index + 1)), "label missing: {}", text);
            assert!(text.contains(&format!("(Page {})", index + 1)), "original content lost");
        }
    }

    #[test]
    fn test_content_merge_keeps_inherited_resources() {
        let mut doc = fixtures::document(1);
        Compositor::new(StampStyle::default()).stamp_document(&mut doc, &reservation(1));

        let page = doc.get_dictionary(first_page(&doc)).unwrap();
        let resources = page.get(b"Resources").and_then(Object::as_dict).unwrap();
        let fonts = resources.get(b"Font").and_then(Object::as_dict).unwrap();
        assert!(fonts.has(b"F1"), "inherited font dropped");
        assert!(fonts.has(FONT_RESOURCE.as_bytes()));
        let states = resources.get(b"ExtGState").and_then(Object::as_dict).unwrap();
        assert!(states.has(GSTATE_RESOURCE.as_bytes()));
    }

    #[test]
    fn test_stamped_document_round_trips() {
        let mut doc = fixtures::document(2);
        Compositor::new(StampStyle::default()).stamp_document(&mut doc, &reservation(2));

        let bytes = pdf::to_bytes(&mut doc).unwrap();
        let reloaded = Document::load_mem(&bytes).unwrap();
        assert_eq!(reloaded.get_pages().len(), 2);
        assert!(page_text(&reloaded, first_page(&reloaded)).contains("(ABC00001)"));
    }

    #[test]
    fn test_opacity_goes_into_graphics_state() {
        let style = StampStyle {
            opacity: 40,
            ..StampStyle::default()
        };
        let mut doc = fixtures::document(1);
        let resources = Compositor::new(style).prepare(&mut doc);

        let state = doc.get_dictionary(resources.graphics_state).unwrap();
        let alpha = state.get(b"ca").and_then(Object::as_float).unwrap();
        assert!((alpha - 0.4).abs() < 1e-6);
    }

    // ── fallbacks ──

    #[test]
    fn test_form_redraw_when_resources_are_malformed() {
        let mut doc = fixtures::document(1);
        let page_id = first_page(&doc);
        doc.get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .unwrap()
            .set("Resources", 5);

        let result = Compositor::new(StampStyle::default()).stamp_document(&mut doc, &reservation(1));

        assert_eq!(result.pages, vec![PageStamp::Stamped(StampMethod::FormRedraw)]);
        let text = page_text(&doc, page_id);
        assert!(text.contains("/BatesPage Do"));
        assert!(text.contains("(ABC00001)"));
    }

    #[test]
    fn test_passthrough_when_every_strategy_fails() {
        let mut doc = fixtures::document(2);
        let before = page_text(&doc, first_page(&doc));

        let compositor =
            Compositor::with_strategies(StampStyle::default(), vec![Box::new(AlwaysFails)]);
        let result = compositor.stamp_document(&mut doc, &reservation(2));

        assert_eq!(result.stamped_count(), 0);
        assert_eq!(result.unstamped_pages(), vec![1, 2]);
        assert_eq!(page_text(&doc, first_page(&doc)), before, "page must be left untouched");
        match &result.pages[0] {
            PageStamp::Unstamped { reason } => assert!(reason.contains("refused")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_short_reservation_leaves_extra_pages_unstamped() {
        let mut doc = fixtures::document(3);
        let result = Compositor::new(StampStyle::default()).stamp_document(&mut doc, &reservation(2));

        assert_eq!(result.stamped_count(), 2);
        assert_eq!(result.unstamped_pages(), vec![3]);
    }
}
