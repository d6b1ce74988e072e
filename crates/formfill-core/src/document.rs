//! PDF loading and page access using lopdf

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::FormFillError;
use crate::geometry::{PageBox, Rect};

/// A loaded PDF form template
pub struct PdfForm {
    pub(crate) doc: Document,
    /// Page object IDs in document order (index 0 is the first page)
    page_ids: Vec<ObjectId>,
}

impl std::fmt::Debug for PdfForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfForm")
            .field("page_count", &self.page_ids.len())
            .finish_non_exhaustive()
    }
}

impl PdfForm {
    /// Parse a PDF from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormFillError> {
        let doc = Document::load_mem(bytes).map_err(|e| FormFillError::ParseError(e.to_string()))?;
        Ok(Self::from_document(doc))
    }

    /// Parse a PDF from a file on disk
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FormFillError> {
        let doc = Document::load(path).map_err(|e| FormFillError::ParseError(e.to_string()))?;
        Ok(Self::from_document(doc))
    }

    pub fn from_document(doc: Document) -> Self {
        // get_pages is keyed by 1-based page number
        let page_ids = doc.get_pages().into_values().collect();
        Self { doc, page_ids }
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn page_id(&self, index: usize) -> Result<ObjectId, FormFillError> {
        self.page_ids
            .get(index)
            .copied()
            .ok_or(FormFillError::PageNotFound(index))
    }

    /// Visible page box: CropBox if present, else MediaBox, else US Letter
    pub fn page_box(&self, index: usize) -> Result<PageBox, FormFillError> {
        let page_id = self.page_id(index)?;
        for key in [b"CropBox".as_slice(), b"MediaBox".as_slice()] {
            if let Some(obj) = resolve_inherited(&self.doc, page_id, key) {
                if let Some(rect) = rect_from_object(&self.doc, obj) {
                    return Ok(PageBox { rect });
                }
            }
        }
        Ok(PageBox::LETTER)
    }

    /// Serialize the document
    pub fn to_bytes(&mut self) -> Result<Vec<u8>, FormFillError> {
        let mut output = Vec::new();
        self.doc
            .save_to(&mut output)
            .map_err(|e| FormFillError::WriteError(e.to_string()))?;
        Ok(output)
    }

    /// Write the document to `path`, replacing any file already there
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<(), FormFillError> {
        self.doc
            .save(path)
            .map(|_| ())
            .map_err(|e| FormFillError::WriteError(e.to_string()))
    }

    /// Concatenated, decompressed content streams of a page
    pub(crate) fn page_content(&self, index: usize) -> Result<Vec<u8>, FormFillError> {
        let page_id = self.page_id(index)?;
        let page_dict = self.page_dict(page_id)?;

        let contents = match page_dict.get(b"Contents") {
            Ok(obj) => resolve(&self.doc, obj),
            Err(_) => return Ok(Vec::new()),
        };

        let content_error = |reason: String| FormFillError::ContentError {
            page: index,
            reason,
        };

        match contents {
            Object::Stream(stream) => Ok(stream_bytes(stream)),
            Object::Array(parts) => {
                let mut content = Vec::new();
                for part in parts {
                    let stream = resolve(&self.doc, part)
                        .as_stream()
                        .map_err(|e| content_error(format!("/Contents item is not a stream: {e}")))?;
                    if !content.is_empty() {
                        content.push(b'\n');
                    }
                    content.extend_from_slice(&stream_bytes(stream));
                }
                Ok(content)
            }
            other => Err(content_error(format!(
                "/Contents is not a stream or array: {other:?}"
            ))),
        }
    }

    /// Effective resources of a page, following /Parent inheritance
    pub(crate) fn page_resources(&self, index: usize) -> Result<Option<&Dictionary>, FormFillError> {
        let page_id = self.page_id(index)?;
        Ok(resolve_inherited(&self.doc, page_id, b"Resources")
            .and_then(|obj| resolve(&self.doc, obj).as_dict().ok()))
    }

    pub(crate) fn page_dict(&self, page_id: ObjectId) -> Result<&Dictionary, FormFillError> {
        self.doc
            .get_object(page_id)
            .and_then(|o| o.as_dict())
            .map_err(|e| FormFillError::ParseError(format!("page dictionary: {e}")))
    }
}

/// Decoded stream content; undecodable filters fall back to the raw bytes
pub(crate) fn stream_bytes(stream: &lopdf::Stream) -> Vec<u8> {
    if stream.dict.get(b"Filter").is_ok() {
        stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone())
    } else {
        stream.content.clone()
    }
}

/// Follow indirect references until a direct object is reached
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    let mut current = obj;
    // bounded to survive reference cycles
    for _ in 0..32 {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(next) => current = next,
                Err(_) => return current,
            },
            _ => return current,
        }
    }
    current
}

/// Look up a dictionary entry and resolve it
pub(crate) fn dict_get<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().map(|obj| resolve(doc, obj))
}

/// Convert a numeric object (Integer or Real) to f64
pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(*f as f64),
        _ => None,
    }
}

/// Look up a key on a page, walking up the page tree via /Parent
pub(crate) fn resolve_inherited<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current_id = page_id;
    for _ in 0..64 {
        let dict = doc.get_object(current_id).and_then(|o| o.as_dict()).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current_id = dict.get(b"Parent").and_then(|p| p.as_reference()).ok()?;
    }
    None
}

fn rect_from_object(doc: &Document, obj: &Object) -> Option<Rect> {
    let array = resolve(doc, obj).as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let values: Vec<f64> = array
        .iter()
        .filter_map(|o| number(resolve(doc, o)))
        .collect();
    match values.as_slice() {
        [x0, y0, x1, y1] => Some(Rect::new(*x0, *y0, *x1, *y1)),
        _ => None,
    }
}
