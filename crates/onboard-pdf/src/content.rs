//! Content stream and resource plumbing shared by the renderer, the
//! flattener and the stamper

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::document::{inherited_attribute, page_dict_mut};
use crate::error::OnboardPdfError;

/// Resource name for the body font
pub const BODY_FONT: &str = "OnbHelv";

/// Average glyph advance as a fraction of the font size. Used for the
/// character-budget truncation and underline lengths.
pub const AVG_CHAR_WIDTH_RATIO: f32 = 0.5;

/// Add a standard 14 font with WinAnsiEncoding and return its id
pub fn standard_font(doc: &mut Document, base_font: &str) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => Object::Name(base_font.as_bytes().to_vec()),
        "Encoding" => "WinAnsiEncoding",
    })
}

/// Encode text for a WinAnsi standard font. Latin-1 maps directly, anything
/// outside it becomes `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

/// Truncate `text` to the number of characters that fit in `width`
pub fn fit_text(text: &str, width: f32, font_size: f32) -> String {
    let budget = char_budget(width, font_size);
    text.chars().take(budget).collect()
}

pub fn char_budget(width: f32, font_size: f32) -> usize {
    if width <= 0.0 || font_size <= 0.0 {
        return 0;
    }
    (width / (font_size * AVG_CHAR_WIDTH_RATIO)).floor() as usize
}

pub fn estimate_text_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * AVG_CHAR_WIDTH_RATIO
}

pub fn real(value: f32) -> Object {
    Object::Real(value)
}

/// `BT /font size Tf 0 g x y Td (text) Tj ET`
pub fn text_operations(font: &str, size: f32, x: f32, y: f32, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(font.as_bytes().to_vec()), real(size)],
        ),
        Operation::new("g", vec![real(0.0)]),
        Operation::new("Td", vec![real(x), real(y)]),
        Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
    ]
}

/// Filled rectangle in the given gray level
pub fn filled_rect_operations(gray: f32, x: f32, y: f32, width: f32, height: f32) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("g", vec![real(gray)]),
        Operation::new("re", vec![real(x), real(y), real(width), real(height)]),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// Stroked horizontal rule
pub fn rule_operations(x: f32, y: f32, length: f32, line_width: f32) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("G", vec![real(0.0)]),
        Operation::new("w", vec![real(line_width)]),
        Operation::new("m", vec![real(x), real(y)]),
        Operation::new("l", vec![real(x + length), real(y)]),
        Operation::new("S", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// Paint an XObject scaled into a rectangle
pub fn xobject_operations(
    name: &str,
    scale_x: f32,
    scale_y: f32,
    translate_x: f32,
    translate_y: f32,
) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                real(scale_x),
                real(0.0),
                real(0.0),
                real(scale_y),
                real(translate_x),
                real(translate_y),
            ],
        ),
        Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]
}

pub fn encode_operations(operations: Vec<Operation>) -> Result<Vec<u8>, OnboardPdfError> {
    Content { operations }
        .encode()
        .map_err(|e| OnboardPdfError::OperationError(format!("Failed to encode content: {}", e)))
}

/// Append a content stream to a page.
///
/// Existing content is wrapped in `q`/`Q` so graphics state it leaves behind
/// does not leak into the appended drawing.
pub fn append_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    content: Vec<u8>,
) -> Result<(), OnboardPdfError> {
    let existing = page_dict_mut(doc, page_id)?.get(b"Contents").ok().cloned();

    let mut contents = match existing {
        Some(Object::Reference(id)) => match doc.get_object(id) {
            Ok(Object::Array(arr)) => arr.clone(),
            _ => vec![Object::Reference(id)],
        },
        Some(Object::Array(arr)) => arr,
        _ => Vec::new(),
    };

    if !contents.is_empty() {
        let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let close_id = doc.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
        contents.insert(0, Object::Reference(open_id));
        contents.push(Object::Reference(close_id));
    }

    let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
    contents.push(Object::Reference(content_id));

    page_dict_mut(doc, page_id)?.set("Contents", Object::Array(contents));
    Ok(())
}

/// Register `target` under `/Resources/<category>/<name>` for a page.
///
/// Inherited resources are copied onto the page first so adding an entry
/// never hides what the page tree provided.
pub fn add_page_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &str,
    name: &str,
    target: ObjectId,
) -> Result<(), OnboardPdfError> {
    let resources_id = ensure_page_resources(doc, page_id)?;

    let category_id = {
        let resources = resources_mut(doc, page_id, resources_id)?;
        match resources.get(category.as_bytes()) {
            Ok(Object::Reference(id)) => Some(*id),
            Ok(Object::Dictionary(_)) => None,
            _ => {
                resources.set(category, Dictionary::new());
                None
            }
        }
    };

    let entries = match category_id {
        Some(id) => doc
            .get_object_mut(id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| OnboardPdfError::OperationError(e.to_string()))?,
        None => resources_mut(doc, page_id, resources_id)?
            .get_mut(category.as_bytes())
            .and_then(Object::as_dict_mut)
            .map_err(|e| OnboardPdfError::OperationError(e.to_string()))?,
    };
    entries.set(name, Object::Reference(target));
    Ok(())
}

/// Make sure the page carries its own `/Resources` entry. Returns the id of
/// the resources dictionary when it is an indirect object.
fn ensure_page_resources(
    doc: &mut Document,
    page_id: ObjectId,
) -> Result<Option<ObjectId>, OnboardPdfError> {
    match page_dict_mut(doc, page_id)?.get(b"Resources") {
        Ok(Object::Reference(id)) => return Ok(Some(*id)),
        Ok(Object::Dictionary(_)) => return Ok(None),
        _ => {}
    }

    match inherited_attribute(doc, page_id, b"Resources") {
        Some(Object::Reference(id)) => {
            page_dict_mut(doc, page_id)?.set("Resources", Object::Reference(id));
            Ok(Some(id))
        }
        Some(Object::Dictionary(dict)) => {
            page_dict_mut(doc, page_id)?.set("Resources", Object::Dictionary(dict));
            Ok(None)
        }
        _ => {
            page_dict_mut(doc, page_id)?.set("Resources", Dictionary::new());
            Ok(None)
        }
    }
}

fn resources_mut(
    doc: &mut Document,
    page_id: ObjectId,
    resources_id: Option<ObjectId>,
) -> Result<&mut Dictionary, OnboardPdfError> {
    let resources = match resources_id {
        Some(id) => doc.get_object_mut(id),
        None => page_dict_mut(doc, page_id)?.get_mut(b"Resources"),
    };
    resources
        .and_then(Object::as_dict_mut)
        .map_err(|e| OnboardPdfError::OperationError(format!("Invalid page resources: {}", e)))
}
