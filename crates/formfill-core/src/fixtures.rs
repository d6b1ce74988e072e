//! Sample form generation for tests
//!
//! Builds small US Letter PDFs with Helvetica text at fixed positions, so
//! marker positions can be computed from the font metrics.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};

/// One line of text drawn at a user-space baseline origin
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureLine {
    pub x: f64,
    pub y: f64,
    pub text: String,
    pub size: f64,
}

impl FixtureLine {
    /// A 12pt line at `(x, y)`
    pub fn new(x: f64, y: f64, text: &str) -> Self {
        Self {
            x,
            y,
            text: text.to_string(),
            size: 12.0,
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }
}

/// Build a PDF with one page per entry of `pages`
pub fn sample_form(pages: &[Vec<FixtureLine>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for lines in pages {
        let mut operations = Vec::new();
        for line in lines {
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), Object::Real(line.size as f32)]),
                Operation::new(
                    "Td",
                    vec![Object::Real(line.x as f32), Object::Real(line.y as f32)],
                ),
                Operation::new(
                    "Tj",
                    vec![Object::String(line.text.as_bytes().to_vec(), StringFormat::Literal)],
                ),
                Operation::new("ET", vec![]),
            ]);
        }
        let content = Content { operations }.encode().unwrap_or_default();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    // writing to a Vec cannot fail
    let _ = doc.save_to(&mut buffer);
    buffer
}

/// A single-page form with one marker line, "Answer:" at (72, 700)
pub fn single_marker_form() -> Vec<u8> {
    sample_form(&[vec![FixtureLine::new(72.0, 700.0, "Answer:")]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PdfForm;

    #[test]
    fn test_sample_form_text_layer() {
        let pdf = sample_form(&[
            vec![FixtureLine::new(72.0, 700.0, "Answer:"), FixtureLine::new(72.0, 600.0, "Second")],
            vec![],
        ]);
        let form = PdfForm::from_bytes(&pdf).unwrap();
        assert_eq!(form.page_count(), 2);
        assert_eq!(form.page_text(0).unwrap().text(), "Answer:\nSecond");
        assert!(form.page_text(1).unwrap().lines.is_empty());
    }

    #[test]
    fn test_line_size_scales_glyphs() {
        let pdf = sample_form(&[vec![FixtureLine::new(72.0, 700.0, "A").with_size(20.0)]]);
        let pages = PdfForm::from_bytes(&pdf).unwrap().text_layer().unwrap();
        let glyph = &pages[0].lines[0].glyphs[0];
        assert!((glyph.rect.width() - 0.667 * 20.0).abs() < 1e-3);
        assert!((glyph.rect.height() - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_single_marker_geometry() {
        let form = PdfForm::from_bytes(&single_marker_form()).unwrap();
        let line = &form.page_text(0).unwrap().lines[0];
        let bounds = line.bounds().unwrap();
        // "Answer:" is 3334 + 278 units of Helvetica
        assert!((bounds.x1 - (72.0 + 3.612 * 12.0)).abs() < 1e-3);
        assert!((bounds.y0 - 82.4).abs() < 1e-3);
    }
}
