//! Document kinds and page-level helpers on top of lopdf

use std::fmt;
use std::str::FromStr;

use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};

use crate::error::OnboardPdfError;

/// Which stored onboarding document a PDF came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Waiver,
    Disclosure,
    Addon,
    Legacy,
}

impl DocumentKind {
    /// Separately stored documents, in packet order
    pub const SEPARATE: [DocumentKind; 3] = [
        DocumentKind::Waiver,
        DocumentKind::Disclosure,
        DocumentKind::Addon,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DocumentKind::Waiver => "waiver",
            DocumentKind::Disclosure => "disclosure",
            DocumentKind::Addon => "addon",
            DocumentKind::Legacy => "legacy",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "waiver" => Ok(DocumentKind::Waiver),
            "disclosure" => Ok(DocumentKind::Disclosure),
            "addon" | "add-on" | "add_on" => Ok(DocumentKind::Addon),
            "legacy" => Ok(DocumentKind::Legacy),
            other => Err(format!("Unknown document kind: {}", other)),
        }
    }
}

/// Page rectangle in default user space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PageBox {
    pub const LETTER: PageBox = PageBox {
        x0: 0.0,
        y0: 0.0,
        x1: 612.0,
        y1: 792.0,
    };

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn bottom(&self) -> f32 {
        self.y0
    }

    pub fn top(&self) -> f32 {
        self.y1
    }
}

/// Attributes a page may inherit from its ancestors in the page tree
pub const INHERITABLE_PAGE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

const MAX_TREE_DEPTH: usize = 32;

pub fn load(bytes: &[u8]) -> Result<Document, OnboardPdfError> {
    Document::load_mem(bytes).map_err(|e| OnboardPdfError::ParseError(e.to_string()))
}

pub fn save(doc: &mut Document) -> Result<Vec<u8>, OnboardPdfError> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| OnboardPdfError::SerializationError(e.to_string()))?;
    Ok(buffer)
}

/// Serialize and parse again so pending drawing is committed to the object
/// graph before pages are copied elsewhere
pub fn reload(doc: &mut Document) -> Result<Document, OnboardPdfError> {
    let bytes = save(doc)?;
    load(&bytes)
}

/// Page object ids in page order
pub fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().values().copied().collect()
}

/// Read a numeric PDF object
pub fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Resolve a rectangle array (inline or referenced) to normalized
/// `[x0, y0, x1, y1]` with `x0 <= x1` and `y0 <= y1`
pub fn rect_array(doc: &Document, obj: &Object) -> Option<[f32; 4]> {
    let arr = match obj {
        Object::Array(arr) => arr,
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(Object::Array(arr)) => arr,
            _ => return None,
        },
        _ => return None,
    };

    if arr.len() != 4 {
        return None;
    }

    let mut values = [0.0f32; 4];
    for (slot, item) in values.iter_mut().zip(arr.iter()) {
        let item = match item {
            Object::Reference(id) => doc.get_object(*id).ok()?,
            other => other,
        };
        *slot = number(item)?;
    }

    Some([
        values[0].min(values[2]),
        values[1].min(values[3]),
        values[0].max(values[2]),
        values[1].max(values[3]),
    ])
}

/// Look up `key` on the page or its nearest ancestor
pub fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = Some(page_id);
    let mut depth = 0;

    while let Some(id) = current {
        if depth > MAX_TREE_DEPTH {
            break;
        }
        let dict = doc.get_object(id).and_then(Object::as_dict).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }

    None
}

/// MediaBox of a page, walking up the page tree, US Letter when absent
pub fn page_box(doc: &Document, page_id: ObjectId) -> PageBox {
    inherited_attribute(doc, page_id, b"MediaBox")
        .and_then(|obj| rect_array(doc, &obj))
        .map(|[x0, y0, x1, y1]| PageBox { x0, y0, x1, y1 })
        .unwrap_or(PageBox::LETTER)
}

/// Mutable access to a page dictionary
pub fn page_dict_mut(
    doc: &mut Document,
    page_id: ObjectId,
) -> Result<&mut Dictionary, OnboardPdfError> {
    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| OnboardPdfError::OperationError(format!("Page {:?}: {}", page_id, e)))
}

/// Decode a PDF text string (UTF-16BE with BOM, UTF-8 with BOM, or
/// PDFDocEncoding treated as Latin-1)
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(utf8).into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}
