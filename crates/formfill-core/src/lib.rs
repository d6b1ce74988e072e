//! Marker-anchored form filling for PDF templates
//!
//! A template carries a marker word (by default "answer") wherever a reply
//! belongs. Filling locates every marker in the text layer, pairs answers with
//! markers in document order, and draws each answer to the right of its marker.
//!
//! ```no_run
//! use formfill_core::FormFiller;
//!
//! # fn main() -> Result<(), formfill_core::FormFillError> {
//! let template = std::fs::read("form.pdf").map_err(|e| formfill_core::FormFillError::ParseError(e.to_string()))?;
//! let mut filled = FormFiller::default().fill(&template, &["Jane Doe", "41"])?;
//! filled.save("filled.pdf")?;
//! # Ok(())
//! # }
//! ```

pub mod document;
pub mod encoding;
pub mod error;
pub mod filler;
pub mod fonts;
pub mod geometry;
pub mod layout;
pub mod locator;
pub mod placement;
pub mod render;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use document::PdfForm;
pub use error::FormFillError;
pub use filler::{FillReport, FilledForm, FormFiller};
pub use geometry::{PageBox, Point, Rect};
pub use layout::{Glyph, PageText, TextLine};
pub use locator::{MarkerLocator, MarkerOccurrence, DEFAULT_MARKER};
pub use placement::{pair_answers, Pairing, PlacedAnswer, PlacementPoint, PlacementRule};
pub use render::{AnswerRenderer, TextStyle};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<usize, FormFillError> {
    Ok(PdfForm::from_bytes(bytes)?.page_count())
}

/// Locate every marker occurrence in a PDF, in document order
pub fn locate_markers(bytes: &[u8], marker: &str) -> Result<Vec<MarkerOccurrence>, FormFillError> {
    let form = PdfForm::from_bytes(bytes)?;
    MarkerLocator::new(marker)?.locate(&form)
}
