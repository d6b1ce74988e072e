//! Text layer extraction
//!
//! Interprets page content streams to recover the text a reader sees and the
//! box each glyph occupies. Glyphs are grouped into lines in content-stream
//! order; that order is the document order the marker search reports.

use std::borrow::Cow;
use std::collections::HashMap;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object};
use tracing::debug;

use crate::document::{dict_get, number, resolve, stream_bytes, PdfForm};
use crate::error::FormFillError;
use crate::fonts::FontMetrics;
use crate::geometry::{Matrix, PageBox, Rect};

/// Nested Form XObjects deeper than this are not entered
const MAX_XOBJECT_DEPTH: usize = 8;

/// One glyph of the text layer, in page space
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    /// Unicode text of the glyph; ligatures may carry several characters
    pub text: String,
    pub rect: Rect,
    /// Whether this is a space inserted for a visual gap
    pub synthetic: bool,
}

/// A run of glyphs sharing a baseline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLine {
    pub glyphs: Vec<Glyph>,
}

impl TextLine {
    pub fn text(&self) -> String {
        self.glyphs.iter().map(|g| g.text.as_str()).collect()
    }

    pub fn bounds(&self) -> Option<Rect> {
        let mut glyphs = self.glyphs.iter().filter(|g| !g.synthetic);
        let first = glyphs.next()?.rect;
        Some(glyphs.fold(first, |acc, g| acc.union(&g.rect)))
    }
}

/// The text layer of one page
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    /// Zero-based page index
    pub index: usize,
    pub page_box: PageBox,
    pub lines: Vec<TextLine>,
}

impl PageText {
    pub fn width(&self) -> f64 {
        self.page_box.width()
    }

    /// Plain text of the page, one line per text line
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(TextLine::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl PdfForm {
    /// Extract the text layer of every page, in page order
    pub fn text_layer(&self) -> Result<Vec<PageText>, FormFillError> {
        (0..self.page_count()).map(|i| self.page_text(i)).collect()
    }

    /// Extract the text layer of one page
    pub fn page_text(&self, index: usize) -> Result<PageText, FormFillError> {
        let page_box = self.page_box(index)?;
        let content = self.page_content(index)?;
        let resources = self.page_resources(index)?;

        let mut collector = LineCollector::new(page_box);
        if !content.is_empty() {
            let mut interpreter = Interpreter::new(&self.doc, index, &mut collector);
            interpreter.run(&content, resources, Matrix::IDENTITY, 0)?;
        }

        let lines = collector.finish();
        debug!(page = index, lines = lines.len(), "Extracted text layer");
        Ok(PageText {
            index,
            page_box,
            lines,
        })
    }
}

/// A glyph as produced by the interpreter, in user space
struct PlacedGlyph {
    text: String,
    bbox: Rect,
    /// Baseline origin in user space
    origin: (f64, f64),
    /// Baseline end after the advance, in user space
    end: (f64, f64),
    /// Effective font size in user space units
    size: f64,
}

/// Groups interpreter output into lines
struct LineCollector {
    page_box: PageBox,
    lines: Vec<TextLine>,
    current: TextLine,
    last: Option<((f64, f64), f64)>,
}

impl LineCollector {
    fn new(page_box: PageBox) -> Self {
        Self {
            page_box,
            lines: Vec::new(),
            current: TextLine::default(),
            last: None,
        }
    }

    fn push(&mut self, glyph: PlacedGlyph) {
        if let Some((prev_end, prev_size)) = self.last {
            let tolerance = prev_size.max(glyph.size) * 0.5;
            let same_baseline = (glyph.origin.1 - prev_end.1).abs() <= tolerance;
            let moves_forward = glyph.origin.0 >= prev_end.0 - tolerance;
            if !(same_baseline && moves_forward) {
                self.break_line();
            } else if glyph.origin.0 - prev_end.0 > prev_size.max(glyph.size) * 0.25
                && !glyph.text.trim().is_empty()
                && !self.ends_with_space()
            {
                let gap = Rect::new(prev_end.0, glyph.bbox.y0, glyph.origin.0, glyph.bbox.y1);
                self.current.glyphs.push(Glyph {
                    text: " ".to_string(),
                    rect: self.page_box.user_rect_to_page(&gap),
                    synthetic: true,
                });
            }
        }

        self.last = Some((glyph.end, glyph.size));
        self.current.glyphs.push(Glyph {
            text: glyph.text,
            rect: self.page_box.user_rect_to_page(&glyph.bbox),
            synthetic: false,
        });
    }

    fn ends_with_space(&self) -> bool {
        self.current
            .glyphs
            .last()
            .is_some_and(|g| g.text.ends_with(' '))
    }

    fn break_line(&mut self) {
        if !self.current.glyphs.is_empty() {
            self.lines.push(std::mem::take(&mut self.current));
        }
    }

    fn finish(mut self) -> Vec<TextLine> {
        self.break_line();
        self.lines
    }
}

#[derive(Clone)]
struct TextState {
    char_spacing: f64,
    word_spacing: f64,
    horizontal_scale: f64,
    leading: f64,
    rise: f64,
    font_size: f64,
    font: Option<Vec<u8>>,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            font_size: 0.0,
            font: None,
        }
    }
}

#[derive(Clone)]
struct GraphicsState {
    ctm: Matrix,
    text: TextState,
}

/// Content stream interpreter that reports shown glyphs
struct Interpreter<'a, 'c> {
    doc: &'a Document,
    page: usize,
    sink: &'c mut LineCollector,
}

impl<'a, 'c> Interpreter<'a, 'c> {
    fn new(doc: &'a Document, page: usize, sink: &'c mut LineCollector) -> Self {
        Self { doc, page, sink }
    }

    fn run(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        base_ctm: Matrix,
        depth: usize,
    ) -> Result<(), FormFillError> {
        let content = strip_inline_images(content);
        if matches!(content, Cow::Owned(_)) {
            debug!(page = self.page, depth, "Skipped inline images");
        }
        let content = Content::decode(&content).map_err(|e| FormFillError::ContentError {
            page: self.page,
            reason: e.to_string(),
        })?;

        let mut state = GraphicsState {
            ctm: base_ctm,
            text: TextState::default(),
        };
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut text_matrix = Matrix::IDENTITY;
        let mut line_matrix = Matrix::IDENTITY;
        // one resource dictionary per run, so font names are unambiguous
        let mut fonts: HashMap<Vec<u8>, FontMetrics> = HashMap::new();

        for op in &content.operations {
            let nums: Vec<f64> = op.operands.iter().filter_map(number).collect();
            match op.operator.as_str() {
                "q" => stack.push(state.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        state = saved;
                    }
                }
                "cm" => {
                    if let [a, b, c, d, e, f] = nums[..] {
                        state.ctm = Matrix::new(a, b, c, d, e, f).then(&state.ctm);
                    }
                }
                "BT" => {
                    text_matrix = Matrix::IDENTITY;
                    line_matrix = Matrix::IDENTITY;
                }
                "Tf" => {
                    if let (Some(Object::Name(name)), Some(size)) =
                        (op.operands.first(), op.operands.get(1).and_then(number))
                    {
                        state.text.font = Some(name.clone());
                        state.text.font_size = size;
                    }
                }
                "Tc" => {
                    if let [v] = nums[..] {
                        state.text.char_spacing = v;
                    }
                }
                "Tw" => {
                    if let [v] = nums[..] {
                        state.text.word_spacing = v;
                    }
                }
                "Tz" => {
                    if let [v] = nums[..] {
                        state.text.horizontal_scale = v / 100.0;
                    }
                }
                "TL" => {
                    if let [v] = nums[..] {
                        state.text.leading = v;
                    }
                }
                "Ts" => {
                    if let [v] = nums[..] {
                        state.text.rise = v;
                    }
                }
                "Td" | "TD" => {
                    if let [tx, ty] = nums[..] {
                        if op.operator == "TD" {
                            state.text.leading = -ty;
                        }
                        line_matrix = Matrix::translate(tx, ty).then(&line_matrix);
                        text_matrix = line_matrix;
                    }
                }
                "Tm" => {
                    if let [a, b, c, d, e, f] = nums[..] {
                        line_matrix = Matrix::new(a, b, c, d, e, f);
                        text_matrix = line_matrix;
                    }
                }
                "T*" => {
                    line_matrix = Matrix::translate(0.0, -state.text.leading).then(&line_matrix);
                    text_matrix = line_matrix;
                }
                "Tj" | "'" | "\"" => {
                    if op.operator == "\"" {
                        if let [aw, ac] = nums[..] {
                            state.text.word_spacing = aw;
                            state.text.char_spacing = ac;
                        }
                    }
                    if op.operator != "Tj" {
                        line_matrix =
                            Matrix::translate(0.0, -state.text.leading).then(&line_matrix);
                        text_matrix = line_matrix;
                    }
                    if let Some(Object::String(bytes, _)) = op.operands.last() {
                        if let Some(font) = self.font(&mut fonts, resources, &state) {
                            self.show(bytes, font, &state, &mut text_matrix);
                        }
                    }
                }
                "TJ" => {
                    let items = match op.operands.first() {
                        Some(Object::Array(items)) => items,
                        _ => continue,
                    };
                    if let Some(font) = self.font(&mut fonts, resources, &state) {
                        for item in items {
                            match item {
                                Object::String(bytes, _) => {
                                    self.show(bytes, font, &state, &mut text_matrix)
                                }
                                other => {
                                    if let Some(adjust) = number(other) {
                                        let tx = -adjust / 1000.0
                                            * state.text.font_size
                                            * state.text.horizontal_scale;
                                        text_matrix = Matrix::translate(tx, 0.0).then(&text_matrix);
                                    }
                                }
                            }
                        }
                    }
                }
                "Do" => {
                    if let Some(Object::Name(name)) = op.operands.first() {
                        self.run_xobject(name, resources, state.ctm, depth)?;
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn run_xobject(
        &mut self,
        name: &[u8],
        resources: Option<&'a Dictionary>,
        ctm: Matrix,
        depth: usize,
    ) -> Result<(), FormFillError> {
        if depth >= MAX_XOBJECT_DEPTH {
            debug!(page = self.page, depth, "Skipping deeply nested XObject");
            return Ok(());
        }
        let doc = self.doc;
        let Some(stream) = resources
            .and_then(|r| dict_get(doc, r, b"XObject"))
            .and_then(|o| o.as_dict().ok())
            .and_then(|xobjects| dict_get(doc, xobjects, name))
            .and_then(|o| o.as_stream().ok())
        else {
            return Ok(());
        };
        if dict_get(doc, &stream.dict, b"Subtype").and_then(|o| o.as_name().ok())
            != Some(b"Form".as_slice())
        {
            return Ok(());
        }

        let form_matrix = dict_get(doc, &stream.dict, b"Matrix")
            .and_then(|o| o.as_array().ok())
            .map(|a| a.iter().filter_map(|o| number(resolve(doc, o))).collect::<Vec<_>>())
            .and_then(|m| match m[..] {
                [a, b, c, d, e, f] => Some(Matrix::new(a, b, c, d, e, f)),
                _ => None,
            })
            .unwrap_or(Matrix::IDENTITY);
        let form_resources = dict_get(doc, &stream.dict, b"Resources")
            .and_then(|o| o.as_dict().ok())
            .or(resources);

        let content = stream_bytes(stream);
        self.run(&content, form_resources, form_matrix.then(&ctm), depth + 1)
    }

    fn font<'f>(
        &self,
        fonts: &'f mut HashMap<Vec<u8>, FontMetrics>,
        resources: Option<&'a Dictionary>,
        state: &GraphicsState,
    ) -> Option<&'f FontMetrics> {
        let name = state.text.font.as_ref()?;
        let doc = self.doc;
        let font = fonts.entry(name.clone()).or_insert_with(|| {
            resources
                .and_then(|r| dict_get(doc, r, b"Font"))
                .and_then(|o| o.as_dict().ok())
                .and_then(|font_dict| dict_get(doc, font_dict, name))
                .and_then(|o| o.as_dict().ok())
                .map(|font| FontMetrics::load(doc, font))
                .unwrap_or_default()
        });
        Some(font)
    }

    fn show(&mut self, bytes: &[u8], font: &FontMetrics, state: &GraphicsState, text_matrix: &mut Matrix) {
        let text = &state.text;

        for (code, chars) in font.decode(bytes) {
            let width = font.width(code);
            let render = Matrix::new(
                text.font_size * text.horizontal_scale,
                0.0,
                0.0,
                text.font_size,
                0.0,
                text.rise,
            )
            .then(text_matrix)
            .then(&state.ctm);

            let corners = [
                render.apply(0.0, font.descent),
                render.apply(width, font.descent),
                render.apply(0.0, font.ascent),
                render.apply(width, font.ascent),
            ];
            let origin = render.apply(0.0, 0.0);
            let end = render.apply(width, 0.0);
            let size = render.vertical_scale();

            if !chars.is_empty() && size > 0.0 {
                if let Some(bbox) = Rect::bounding(&corners) {
                    self.sink.push(PlacedGlyph {
                        text: chars,
                        bbox,
                        origin,
                        end,
                        size,
                    });
                }
            }

            let mut advance = width * text.font_size + text.char_spacing;
            if font.is_word_space(code) {
                advance += text.word_spacing;
            }
            *text_matrix = Matrix::translate(advance * text.horizontal_scale, 0.0).then(text_matrix);
        }
    }
}

fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace()
        || matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// Whether the operator `keyword` starts at `at` as a standalone token
fn keyword_at(data: &[u8], at: usize, keyword: &[u8]) -> bool {
    data[at..].starts_with(keyword)
        && (at == 0 || (is_delimiter(data[at - 1]) && data[at - 1] != b'/'))
        && data.get(at + keyword.len()).map_or(true, |&b| is_delimiter(b))
}

/// Index just past a literal string opening at `start`
fn skip_literal_string(data: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < data.len() {
        match data[i] {
            b'\\' => i += 1,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    data.len()
}

/// Index just past the `EI` closing an inline image whose dictionary starts at `from`
fn inline_image_end(data: &[u8], from: usize) -> usize {
    let Some(id) = (from..data.len()).find(|&i| keyword_at(data, i, b"ID")) else {
        return data.len();
    };
    // a single whitespace byte separates ID from the image data
    let body = (id + 3).min(data.len());
    (body..data.len())
        .find(|&i| {
            data[i..].starts_with(b"EI")
                && data[i - 1].is_ascii_whitespace()
                && data.get(i + 2).map_or(true, |b| b.is_ascii_whitespace())
        })
        .map_or(data.len(), |ei| ei + 2)
}

/// Replace inline images (`BI ... ID <data> EI`) with a space
///
/// Inline image data is raw binary and stops the content tokenizer, which
/// would silently drop every operator after it.
fn strip_inline_images(data: &[u8]) -> Cow<'_, [u8]> {
    let mut out: Option<Vec<u8>> = None;
    let mut copied = 0;
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'(' => i = skip_literal_string(data, i),
            b'%' => {
                while i < data.len() && !matches!(data[i], b'\n' | b'\r') {
                    i += 1;
                }
            }
            b'<' if data.get(i + 1) == Some(&b'<') => i += 2,
            b'<' => {
                i = data[i..]
                    .iter()
                    .position(|&b| b == b'>')
                    .map_or(data.len(), |p| i + p + 1);
            }
            b'B' if keyword_at(data, i, b"BI") => {
                let end = inline_image_end(data, i + 2);
                let buf = out.get_or_insert_with(|| Vec::with_capacity(data.len()));
                buf.extend_from_slice(&data[copied..i]);
                buf.push(b' ');
                copied = end;
                i = end;
            }
            _ => i += 1,
        }
    }
    match out {
        Some(mut buf) => {
            buf.extend_from_slice(&data[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(data),
    }
}
