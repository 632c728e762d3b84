//! Interactive form field discovery
//!
//! Walks `/AcroForm/Fields` and flattens the field hierarchy into one
//! descriptor per terminal field, each with the widgets that display it.

use std::collections::{HashMap, HashSet};

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::document::{decode_text_string, page_ids, rect_array};
use crate::error::OnboardPdfError;

/// Widget rectangle as `x, y, width, height` in page space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    fn from_corners([x0, y0, x1, y1]: [f32; 4]) -> Self {
        Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Checkbox,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Checked(bool),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub id: ObjectId,
    /// Zero-based page index, when the widget can be placed on a page
    pub page_index: Option<usize>,
    pub rect: Rect,
    pub has_normal_appearance: bool,
    /// `/AS` state of a checkbox widget: `Some(true)` for any on-state
    pub appearance_on: Option<bool>,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: String,
    pub kind: FieldKind,
    pub value: FieldValue,
    /// Font size from the default appearance string, `None` for auto
    pub font_size: Option<f32>,
    pub widgets: Vec<Widget>,
}

impl FormField {
    /// Whether a given widget of this field should show as checked
    pub fn widget_checked(&self, widget: &Widget) -> bool {
        match widget.appearance_on {
            Some(on) => on,
            None => matches!(self.value, FieldValue::Checked(true)),
        }
    }
}

/// Annotation flag bit 2
const ANNOT_FLAG_HIDDEN: i64 = 1 << 1;
/// Button field flag bit 17
const BUTTON_FLAG_PUSHBUTTON: i64 = 1 << 16;
const MAX_FIELD_DEPTH: usize = 16;

#[derive(Debug, Clone, Default)]
struct Inherited {
    name: Option<String>,
    field_type: Option<Vec<u8>>,
    flags: Option<i64>,
    value: Option<Object>,
    default_appearance: Option<Vec<u8>>,
}

/// Top-level field references from the document's AcroForm.
///
/// A document without an AcroForm has no fields; an AcroForm that is
/// present but malformed is an error.
pub fn acroform_fields(doc: &Document) -> Result<Vec<ObjectId>, OnboardPdfError> {
    let catalog = match doc.catalog() {
        Ok(catalog) => catalog,
        Err(_) => return Ok(Vec::new()),
    };

    let acroform = match catalog.get(b"AcroForm") {
        Ok(obj) => resolve_dict(doc, obj)
            .ok_or_else(|| OnboardPdfError::ParseError("AcroForm is not a dictionary".into()))?,
        Err(_) => return Ok(Vec::new()),
    };

    let fields = match acroform.get(b"Fields") {
        Ok(Object::Array(arr)) => arr,
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(arr)) => arr,
            _ => {
                return Err(OnboardPdfError::ParseError(
                    "AcroForm Fields is not an array".into(),
                ))
            }
        },
        Ok(_) => {
            return Err(OnboardPdfError::ParseError(
                "AcroForm Fields is not an array".into(),
            ))
        }
        Err(_) => return Ok(Vec::new()),
    };

    Ok(fields
        .iter()
        .filter_map(|obj| obj.as_reference().ok())
        .collect())
}

/// Collect every terminal form field in the document
pub fn collect_fields(doc: &Document) -> Result<Vec<FormField>, OnboardPdfError> {
    let roots = acroform_fields(doc)?;
    if roots.is_empty() {
        return Ok(Vec::new());
    }

    let annot_pages = annotation_pages(doc);
    let mut fields = Vec::new();
    let mut seen = HashSet::new();
    for root in roots {
        visit_field(
            doc,
            root,
            &Inherited::default(),
            &annot_pages,
            &mut seen,
            &mut fields,
            0,
        );
    }
    Ok(fields)
}

/// Map every annotation id to the zero-based index of the page listing it
fn annotation_pages(doc: &Document) -> HashMap<ObjectId, usize> {
    let mut map = HashMap::new();
    for (index, page_id) in page_ids(doc).into_iter().enumerate() {
        let Ok(page) = doc.get_dictionary(page_id) else {
            continue;
        };
        let annots = match page.get(b"Annots") {
            Ok(Object::Array(arr)) => arr.clone(),
            Ok(Object::Reference(id)) => match doc.get_object(*id) {
                Ok(Object::Array(arr)) => arr.clone(),
                _ => continue,
            },
            _ => continue,
        };
        for annot in annots {
            if let Ok(id) = annot.as_reference() {
                map.entry(id).or_insert(index);
            }
        }
        map.entry(page_id).or_insert(index);
    }
    map
}

fn visit_field(
    doc: &Document,
    id: ObjectId,
    parent: &Inherited,
    annot_pages: &HashMap<ObjectId, usize>,
    seen: &mut HashSet<ObjectId>,
    out: &mut Vec<FormField>,
    depth: usize,
) {
    // Each field node is walked once, however often it is referenced
    if depth > MAX_FIELD_DEPTH || !seen.insert(id) {
        return;
    }
    let Ok(dict) = doc.get_dictionary(id) else {
        return;
    };

    let inherited = inherit(doc, dict, parent);
    let kids: Vec<ObjectId> = match dict.get(b"Kids") {
        Ok(Object::Array(arr)) => arr.iter().filter_map(|o| o.as_reference().ok()).collect(),
        _ => Vec::new(),
    };

    let (child_fields, widget_kids): (Vec<ObjectId>, Vec<ObjectId>) =
        kids.into_iter().partition(|kid| {
            doc.get_dictionary(*kid)
                .map(|k| k.has(b"T"))
                .unwrap_or(false)
        });

    for child in &child_fields {
        visit_field(doc, *child, &inherited, annot_pages, seen, out, depth + 1);
    }

    let mut widgets: Vec<Widget> = widget_kids
        .iter()
        .filter_map(|kid| read_widget(doc, *kid, annot_pages))
        .collect();

    let is_terminal = child_fields.is_empty();
    if is_terminal && widgets.is_empty() && dict.has(b"Rect") {
        // Field and widget merged into one dictionary
        widgets.extend(read_widget(doc, id, annot_pages));
    }

    if !is_terminal && widgets.is_empty() {
        return;
    }

    let kind = match inherited.field_type.as_deref() {
        Some(b"Tx") | Some(b"Ch") => FieldKind::Text,
        Some(b"Btn") if inherited.flags.unwrap_or(0) & BUTTON_FLAG_PUSHBUTTON == 0 => {
            FieldKind::Checkbox
        }
        _ => FieldKind::Other,
    };

    out.push(FormField {
        name: inherited.name.clone().unwrap_or_default(),
        kind,
        value: read_value(doc, kind, inherited.value.as_ref()),
        font_size: inherited
            .default_appearance
            .as_deref()
            .and_then(font_size_from_da),
        widgets,
    });
}

fn inherit(doc: &Document, dict: &Dictionary, parent: &Inherited) -> Inherited {
    let partial = match dict.get(b"T") {
        Ok(Object::String(bytes, _)) => Some(decode_text_string(bytes)),
        _ => None,
    };
    let name = match (&parent.name, partial) {
        (Some(prefix), Some(part)) => Some(format!("{}.{}", prefix, part)),
        (None, Some(part)) => Some(part),
        (prefix, None) => prefix.clone(),
    };

    let field_type = match dict.get(b"FT") {
        Ok(Object::Name(name)) => Some(name.clone()),
        _ => parent.field_type.clone(),
    };
    let flags = match dict.get(b"Ff") {
        Ok(Object::Integer(flags)) => Some(*flags),
        _ => parent.flags,
    };
    let value = match dict.get(b"V") {
        Ok(Object::Reference(id)) => doc.get_object(*id).ok().cloned(),
        Ok(obj) => Some(obj.clone()),
        Err(_) => parent.value.clone(),
    };
    let default_appearance = match dict.get(b"DA") {
        Ok(Object::String(bytes, _)) => Some(bytes.clone()),
        _ => parent.default_appearance.clone(),
    };

    Inherited {
        name,
        field_type,
        flags,
        value,
        default_appearance,
    }
}

fn read_widget(
    doc: &Document,
    id: ObjectId,
    annot_pages: &HashMap<ObjectId, usize>,
) -> Option<Widget> {
    let dict = doc.get_dictionary(id).ok()?;
    let rect = dict
        .get(b"Rect")
        .ok()
        .and_then(|obj| rect_array(doc, obj))
        .map(Rect::from_corners)?;

    let page_index = dict
        .get(b"P")
        .and_then(Object::as_reference)
        .ok()
        .and_then(|page_id| annot_pages.get(&page_id).copied())
        .or_else(|| annot_pages.get(&id).copied());

    let flags = match dict.get(b"F") {
        Ok(Object::Integer(f)) => *f,
        _ => 0,
    };

    let appearance_on = match dict.get(b"AS") {
        Ok(Object::Name(state)) => Some(state.as_slice() != b"Off"),
        _ => None,
    };

    Some(Widget {
        id,
        page_index,
        rect,
        has_normal_appearance: has_normal_appearance(doc, dict),
        appearance_on,
        hidden: flags & ANNOT_FLAG_HIDDEN != 0,
    })
}

fn has_normal_appearance(doc: &Document, widget: &Dictionary) -> bool {
    widget
        .get(b"AP")
        .ok()
        .and_then(|ap| resolve_dict(doc, ap))
        .map(|ap| ap.has(b"N"))
        .unwrap_or(false)
}

fn read_value(doc: &Document, kind: FieldKind, value: Option<&Object>) -> FieldValue {
    let Some(value) = value else {
        return FieldValue::Empty;
    };

    match kind {
        FieldKind::Checkbox => match value {
            Object::Name(state) => FieldValue::Checked(state.as_slice() != b"Off"),
            _ => FieldValue::Empty,
        },
        FieldKind::Text | FieldKind::Other => {
            let text = match value {
                Object::String(bytes, _) => decode_text_string(bytes),
                // Multi-select choice fields store an array; show the first
                Object::Array(items) => match items.first() {
                    Some(Object::String(bytes, _)) => decode_text_string(bytes),
                    Some(Object::Reference(id)) => match doc.get_object(*id) {
                        Ok(Object::String(bytes, _)) => decode_text_string(bytes),
                        _ => String::new(),
                    },
                    _ => String::new(),
                },
                _ => String::new(),
            };
            if text.trim().is_empty() {
                FieldValue::Empty
            } else {
                FieldValue::Text(text)
            }
        }
    }
}

/// Parse the font size operand of `Tf` out of a default appearance string
/// such as `/Helv 10 Tf 0 g`. Zero (auto size) maps to `None`.
pub fn font_size_from_da(da: &[u8]) -> Option<f32> {
    let text = String::from_utf8_lossy(da);
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let tf = tokens.iter().position(|t| *t == "Tf")?;
    let size: f32 = tokens.get(tf.checked_sub(1)?)?.parse().ok()?;
    (size > 0.0).then_some(size)
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match obj {
        Object::Dictionary(dict) => Some(dict),
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, FixtureField};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_document_without_acroform_has_no_fields() {
        let doc = fixtures::blank_document(2);
        assert!(collect_fields(&doc).unwrap().is_empty());
    }

    #[test]
    fn test_collects_text_and_checkbox_fields() {
        let doc = fixtures::form_document(
            2,
            &[
                FixtureField::text("Employee Name", 0, [72.0, 700.0, 272.0, 720.0], "Jane Doe"),
                FixtureField::checkbox("Consent", 1, [72.0, 600.0, 84.0, 612.0], true),
            ],
        );

        let fields = collect_fields(&doc).unwrap();
        assert_eq!(fields.len(), 2);

        let name = &fields[0];
        assert_eq!(name.name, "Employee Name");
        assert_eq!(name.kind, FieldKind::Text);
        assert_eq!(name.value, FieldValue::Text("Jane Doe".into()));
        assert_eq!(name.font_size, Some(10.0));
        assert_eq!(name.widgets.len(), 1);
        assert_eq!(name.widgets[0].page_index, Some(0));
        assert_eq!(
            name.widgets[0].rect,
            Rect {
                x: 72.0,
                y: 700.0,
                width: 200.0,
                height: 20.0
            }
        );
        assert!(!name.widgets[0].has_normal_appearance);

        let consent = &fields[1];
        assert_eq!(consent.kind, FieldKind::Checkbox);
        assert_eq!(consent.value, FieldValue::Checked(true));
        assert_eq!(consent.widgets[0].page_index, Some(1));
    }

    #[test]
    fn test_hierarchical_names_are_joined() {
        let doc = fixtures::nested_field_document("applicant", "phone", "555-0100");
        let fields = collect_fields(&doc).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "applicant.phone");
        assert_eq!(fields[0].kind, FieldKind::Text);
    }

    #[test]
    fn test_repeated_kid_references_are_walked_once() {
        let doc = fixtures::cyclic_field_document("applicant", "phone");
        let fields = collect_fields(&doc).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "applicant.phone");
        assert_eq!(fields[0].widgets.len(), 1);
    }

    #[test]
    fn test_appearance_stream_is_detected() {
        let doc = fixtures::form_document(
            1,
            &[FixtureField::text("Date", 0, [72.0, 500.0, 172.0, 516.0], "01/02/2026").with_appearance()],
        );
        let fields = collect_fields(&doc).unwrap();
        assert!(fields[0].widgets[0].has_normal_appearance);
    }

    #[test]
    fn test_font_size_from_da() {
        assert_eq!(font_size_from_da(b"/Helv 12 Tf 0 g"), Some(12.0));
        assert_eq!(font_size_from_da(b"/Helv 0 Tf 0 g"), None);
        assert_eq!(font_size_from_da(b"0 g"), None);
    }

    #[test]
    fn test_malformed_acroform_is_an_error() {
        let doc = fixtures::malformed_acroform_document();
        assert!(collect_fields(&doc).is_err());
    }
}
