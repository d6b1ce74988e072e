//! Draw answer text onto PDF pages
//!
//! Each page that receives answers gets its existing content wrapped in
//! `q ... Q` and a new content stream appended with the overlay text. The
//! font is registered on a page-local copy of the resources so shared or
//! inherited resource dictionaries are left untouched.

use std::collections::BTreeMap;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::debug;

use crate::document::{resolve, resolve_inherited, PdfForm};
use crate::encoding::encode_lossy;
use crate::error::FormFillError;
use crate::placement::PlacedAnswer;

/// Appearance of drawn answers
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    /// Standard Type1 font name
    pub base_font: String,
    pub font_size: f64,
    /// Hex color, `#RRGGBB`
    pub color: String,
    /// Line advance for embedded newlines, as a multiple of the font size
    pub line_height: f64,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            base_font: "Helvetica".to_string(),
            font_size: 11.0,
            color: "#000000".to_string(),
            line_height: 1.2,
        }
    }
}

/// Parse hex color string (e.g., "#FF0000" or "FF0000") to RGB floats (0-1 range)
fn parse_hex_color(color: &str) -> (f32, f32, f32) {
    let hex = color.trim_start_matches('#');
    if hex.len() >= 6 && hex.is_ascii() {
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).unwrap_or(0) as f32 / 255.0
        };
        (channel(0..2), channel(2..4), channel(4..6))
    } else {
        (0.0, 0.0, 0.0)
    }
}

/// Draws placed answers into a document
#[derive(Debug, Clone, Default)]
pub struct AnswerRenderer {
    style: TextStyle,
}

impl AnswerRenderer {
    pub fn new(style: TextStyle) -> Self {
        Self { style }
    }

    /// Draw every answer on its page; returns the number of answers drawn
    pub fn render(&self, form: &mut PdfForm, answers: &[PlacedAnswer]) -> Result<usize, FormFillError> {
        let mut by_page: BTreeMap<usize, Vec<&PlacedAnswer>> = BTreeMap::new();
        for answer in answers {
            by_page.entry(answer.placement.page).or_default().push(answer);
        }

        for (page, page_answers) in &by_page {
            self.render_page(form, *page, page_answers)?;
            debug!(page, count = page_answers.len(), "Rendered answers");
        }
        Ok(answers.len())
    }

    fn render_page(
        &self,
        form: &mut PdfForm,
        index: usize,
        answers: &[&PlacedAnswer],
    ) -> Result<(), FormFillError> {
        let page_id = form.page_id(index)?;
        let page_box = form.page_box(index)?;

        let font_id = form.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => Object::Name(self.style.base_font.as_bytes().to_vec()),
            "Encoding" => "WinAnsiEncoding",
        });
        let font_name = install_font(&mut form.doc, page_id, font_id)?;

        let (r, g, b) = parse_hex_color(&self.style.color);
        let size = self.style.font_size;
        let leading = size * self.style.line_height;

        let mut operations = vec![Operation::new("Q", vec![]), Operation::new("q", vec![])];
        for answer in answers {
            let (x, y) = page_box.page_to_user(answer.placement.point);
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![Object::Name(font_name.clone().into_bytes()), real(size)],
                ),
                Operation::new("rg", vec![Object::Real(r), Object::Real(g), Object::Real(b)]),
                Operation::new("TL", vec![real(leading)]),
                Operation::new("Td", vec![real(x), real(y)]),
            ]);
            for (i, line) in answer.text.split('\n').enumerate() {
                if i > 0 {
                    operations.push(Operation::new("T*", vec![]));
                }
                let line = line.strip_suffix('\r').unwrap_or(line);
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::String(encode_lossy(line), StringFormat::Hexadecimal)],
                ));
            }
            operations.push(Operation::new("ET", vec![]));
        }
        operations.push(Operation::new("Q", vec![]));

        let overlay = Content { operations }
            .encode()
            .map_err(|e| FormFillError::WriteError(e.to_string()))?;
        let save_id = form
            .doc
            .add_object(Stream::new(Dictionary::new(), b"q".to_vec()));
        let overlay_id = form.doc.add_object(Stream::new(Dictionary::new(), overlay));

        wrap_contents(&mut form.doc, page_id, save_id, overlay_id)
    }
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

/// Give the page its own resources dictionary and add the font under a fresh name
fn install_font(doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> Result<String, FormFillError> {
    let mut resources = resolve_inherited(doc, page_id, b"Resources")
        .and_then(|obj| resolve(doc, obj).as_dict().ok())
        .cloned()
        .unwrap_or_default();

    let mut fonts = resources
        .get(b"Font")
        .ok()
        .and_then(|obj| resolve(doc, obj).as_dict().ok())
        .cloned()
        .unwrap_or_default();

    let name = (1..)
        .map(|n| format!("FFill{n}"))
        .find(|candidate| !fonts.has(candidate.as_bytes()))
        .unwrap_or_else(|| "FFill".to_string());
    fonts.set(name.as_bytes().to_vec(), Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    page_dict_mut(doc, page_id)?.set("Resources", Object::Dictionary(resources));
    Ok(name)
}

/// Surround existing content with the save stream and append the overlay
fn wrap_contents(
    doc: &mut Document,
    page_id: ObjectId,
    save_id: ObjectId,
    overlay_id: ObjectId,
) -> Result<(), FormFillError> {
    let existing = match doc.get_object(page_id).and_then(|o| o.as_dict()) {
        Ok(page) => match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match doc.get_object(*id) {
                Ok(Object::Array(parts)) => parts.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(parts)) => parts.clone(),
            _ => Vec::new(),
        },
        Err(e) => return Err(FormFillError::WriteError(format!("page dictionary: {e}"))),
    };

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(save_id));
    contents.extend(existing);
    contents.push(Object::Reference(overlay_id));

    page_dict_mut(doc, page_id)?.set("Contents", Object::Array(contents));
    Ok(())
}

fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary, FormFillError> {
    doc.get_object_mut(page_id)
        .and_then(|o| o.as_dict_mut())
        .map_err(|e| FormFillError::WriteError(format!("page dictionary: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Rect};
    use crate::locator::MarkerOccurrence;
    use crate::placement::PlacementPoint;

    fn blank_form(shared_resources: bool) -> PdfForm {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {},
        });
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"1 0 0 RG".to_vec()));
        let mut kids = Vec::new();
        for _ in 0..2 {
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            };
            if !shared_resources {
                page.set("Resources", dictionary! {});
            }
            kids.push(Object::Reference(doc.add_object(page)));
        }
        let mut pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => 2,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        };
        if shared_resources {
            pages.set("Resources", resources_id);
        }
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        PdfForm::from_document(doc)
    }

    fn placed(page: usize, x: f64, y: f64, text: &str) -> PlacedAnswer {
        let point = Point::new(x, y);
        PlacedAnswer {
            marker: MarkerOccurrence {
                page,
                rect: Rect::new(x - 60.0, y, x - 20.0, y + 12.0),
            },
            placement: PlacementPoint {
                page,
                point,
                line_end: Point::new(592.0, y),
            },
            text: text.to_string(),
        }
    }

    #[test]
    fn test_hex_color_parsing() {
        assert_eq!(parse_hex_color("#000000"), (0.0, 0.0, 0.0));
        assert_eq!(parse_hex_color("FF0000"), (1.0, 0.0, 0.0));
        assert_eq!(parse_hex_color("bogus"), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_rendered_text_is_readable_at_placement() {
        let mut form = blank_form(false);
        let drawn = AnswerRenderer::default()
            .render(&mut form, &[placed(0, 132.0, 82.4, "Jane Doe")])
            .unwrap();
        assert_eq!(drawn, 1);

        let bytes = form.to_bytes().unwrap();
        let reloaded = PdfForm::from_bytes(&bytes).unwrap();
        let page = reloaded.page_text(0).unwrap();
        assert_eq!(page.text(), "Jane Doe");
        let first = &page.lines[0].glyphs[0];
        assert!((first.rect.x0 - 132.0).abs() < 1e-3);
        // ascent of 0.8 em above the baseline
        assert!((first.rect.y0 - (82.4 - 0.8 * 11.0)).abs() < 1e-3);

        assert!(reloaded.page_text(1).unwrap().lines.is_empty());
    }

    #[test]
    fn test_shared_resources_are_not_mutated() {
        let mut form = blank_form(true);
        AnswerRenderer::default()
            .render(&mut form, &[placed(0, 100.0, 100.0, "x")])
            .unwrap();

        let first = form.page_resources(0).unwrap().unwrap();
        let fonts = first.get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(b"FFill1"));

        let second = form.page_resources(1).unwrap().unwrap();
        let fonts = resolve(&form.doc, second.get(b"Font").unwrap()).as_dict().unwrap();
        assert!(!fonts.has(b"FFill1"));
    }

    #[test]
    fn test_existing_content_is_isolated() {
        let mut form = blank_form(false);
        AnswerRenderer::default()
            .render(&mut form, &[placed(0, 100.0, 100.0, "x")])
            .unwrap();

        let content = String::from_utf8(form.page_content(0).unwrap()).unwrap();
        let trimmed: Vec<&str> = content.split_whitespace().collect();
        assert_eq!(&trimmed[..5], &["q", "1", "0", "0", "RG"]);
        assert!(content.contains("/FFill1"));
        assert!(content.trim_end().ends_with('Q'));
    }

    #[test]
    fn test_newlines_stack_downwards() {
        let mut form = blank_form(false);
        AnswerRenderer::default()
            .render(&mut form, &[placed(0, 100.0, 100.0, "one\ntwo")])
            .unwrap();
        let page = form.page_text(0).unwrap();
        assert_eq!(page.text(), "one\ntwo");
        let dy = page.lines[1].glyphs[0].rect.y0 - page.lines[0].glyphs[0].rect.y0;
        assert!((dy - 13.2).abs() < 1e-3);
    }

    #[test]
    fn test_unencodable_characters_become_question_marks() {
        let mut form = blank_form(false);
        AnswerRenderer::default()
            .render(&mut form, &[placed(0, 100.0, 100.0, "名前 Ok")])
            .unwrap();
        assert_eq!(form.page_text(0).unwrap().text(), "?? Ok");
    }
}
