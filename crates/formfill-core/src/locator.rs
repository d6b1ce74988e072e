//! Marker search over the text layer

use serde::Serialize;
use tracing::debug;

use crate::document::PdfForm;
use crate::error::FormFillError;
use crate::geometry::Rect;
use crate::layout::PageText;

/// Marker used when none is configured
pub const DEFAULT_MARKER: &str = "answer";

/// One place the marker was found
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarkerOccurrence {
    /// Zero-based page index
    pub page: usize,
    /// Bounding box of the matched text, in page space
    pub rect: Rect,
}

/// Finds case-insensitive occurrences of a marker string
#[derive(Debug, Clone)]
pub struct MarkerLocator {
    needle: Vec<char>,
    dehyphenate: bool,
}

impl Default for MarkerLocator {
    fn default() -> Self {
        Self {
            needle: lower(DEFAULT_MARKER),
            dehyphenate: true,
        }
    }
}

impl MarkerLocator {
    pub fn new(marker: &str) -> Result<Self, FormFillError> {
        if marker.trim().is_empty() {
            return Err(FormFillError::EmptyMarker);
        }
        Ok(Self {
            needle: lower(marker),
            ..Self::default()
        })
    }

    /// Whether a line ending in `-` joins the next line without the hyphen
    pub fn with_dehyphenation(mut self, enabled: bool) -> Self {
        self.dehyphenate = enabled;
        self
    }

    pub fn marker(&self) -> String {
        self.needle.iter().collect()
    }

    /// All occurrences in document order: page by page, then in text-flow order
    pub fn locate(&self, form: &PdfForm) -> Result<Vec<MarkerOccurrence>, FormFillError> {
        let mut found = Vec::new();
        for page in form.text_layer()? {
            found.extend(self.locate_in_page(&page));
        }
        debug!(marker = %self.marker(), count = found.len(), "Located markers");
        Ok(found)
    }

    /// Occurrences on one extracted page, non-overlapping, left to right
    pub fn locate_in_page(&self, page: &PageText) -> Vec<MarkerOccurrence> {
        let flow = self.flow(page);
        let n = self.needle.len();
        let mut found = Vec::new();
        let mut i = 0;
        while n > 0 && i + n <= flow.len() {
            let hit = flow[i..i + n]
                .iter()
                .zip(&self.needle)
                .all(|(slot, c)| slot.ch == *c);
            if !hit {
                i += 1;
                continue;
            }
            if let Some(rect) = match_rect(&flow[i..i + n]) {
                found.push(MarkerOccurrence {
                    page: page.index,
                    rect,
                });
            }
            i += n;
        }
        found
    }

    /// Lowercased characters of the page with their source glyph boxes
    fn flow(&self, page: &PageText) -> Vec<FlowChar> {
        let mut flow = Vec::new();
        for (line_no, line) in page.lines.iter().enumerate() {
            let start = flow.len();
            for glyph in &line.glyphs {
                for ch in glyph.text.chars().flat_map(char::to_lowercase) {
                    flow.push(FlowChar {
                        ch,
                        rect: (!glyph.synthetic).then_some(glyph.rect),
                        line: line_no,
                    });
                }
            }
            if line_no + 1 == page.lines.len() {
                break;
            }
            let hyphenated = flow.len() > start && flow.last().is_some_and(|c| c.ch == '-');
            if self.dehyphenate && hyphenated {
                flow.pop();
            } else {
                flow.push(FlowChar {
                    ch: '\n',
                    rect: None,
                    line: line_no,
                });
            }
        }
        flow
    }
}

struct FlowChar {
    ch: char,
    rect: Option<Rect>,
    line: usize,
}

/// Union of the matched glyphs on the last line the match touches
fn match_rect(slots: &[FlowChar]) -> Option<Rect> {
    let last_line = slots.iter().filter(|s| s.rect.is_some()).map(|s| s.line).max()?;
    slots
        .iter()
        .filter(|s| s.line == last_line)
        .filter_map(|s| s.rect)
        .reduce(|acc, r| acc.union(&r))
}

fn lower(text: &str) -> Vec<char> {
    text.chars().flat_map(char::to_lowercase).collect()
}
