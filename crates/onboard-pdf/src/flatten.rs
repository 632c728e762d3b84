//! Field flattener
//!
//! Paints each widget's normal appearance into the page content, then
//! removes the widgets and the AcroForm so nothing stays editable.

use std::collections::{BTreeMap, HashSet};

use lopdf::content::Operation;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::content::{
    add_page_resource, append_page_content, encode_operations, real, standard_font,
    text_operations, xobject_operations, BODY_FONT,
};
use crate::document::{page_dict_mut, page_ids, rect_array};
use crate::error::OnboardPdfError;
use crate::fields::{collect_fields, FieldKind, FormField, Widget};
use crate::render::widget_drawing;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlattenOptions {
    /// Synthesize appearances for text and checkbox widgets that lack one
    pub regenerate_missing: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlattenReport {
    /// Appearances painted into page content
    pub stamped: usize,
    /// Appearances synthesized before stamping
    pub regenerated: usize,
    /// Widget annotations removed from pages
    pub removed: usize,
}

struct PendingStamp {
    page_index: usize,
    appearance: ObjectId,
    widget: Widget,
}

pub fn flatten_form(
    doc: &mut Document,
    options: FlattenOptions,
) -> Result<FlattenReport, OnboardPdfError> {
    let mut report = FlattenReport::default();
    if !has_acroform(doc) {
        return Ok(report);
    }

    let fields = collect_fields(doc)?;
    let pages = page_ids(doc);
    let mut pending = Vec::new();
    let mut regen_font: Option<ObjectId> = None;

    for field in &fields {
        for widget in &field.widgets {
            if widget.hidden {
                continue;
            }
            let Some(page_index) = widget.page_index.filter(|i| *i < pages.len()) else {
                continue;
            };

            let appearance = match normal_appearance(doc, field, widget) {
                Some(id) => Some(id),
                None if options.regenerate_missing => {
                    let font_id = *regen_font.get_or_insert_with(|| standard_font(doc, "Helvetica"));
                    let generated = synthesize_appearance(doc, field, widget, font_id);
                    if generated.is_some() {
                        report.regenerated += 1;
                    }
                    generated
                }
                None => None,
            };

            if let Some(appearance) = appearance {
                pending.push(PendingStamp {
                    page_index,
                    appearance,
                    widget: widget.clone(),
                });
            }
        }
    }

    let mut per_page: BTreeMap<usize, Vec<Operation>> = BTreeMap::new();
    for (n, stamp) in pending.iter().enumerate() {
        let name = format!("OnbFlat{}", n);
        let page_id = pages[stamp.page_index];
        let operations = placement_operations(doc, stamp, &name)?;
        add_page_resource(doc, page_id, "XObject", &name, stamp.appearance)?;
        per_page.entry(stamp.page_index).or_default().extend(operations);
        report.stamped += 1;
    }
    for (index, operations) in per_page {
        append_page_content(doc, pages[index], encode_operations(operations)?)?;
    }

    let widget_ids: HashSet<ObjectId> = fields
        .iter()
        .flat_map(|f| f.widgets.iter().map(|w| w.id))
        .collect();
    for page_id in &pages {
        report.removed += remove_widget_annotations(doc, *page_id, &widget_ids)?;
    }
    remove_acroform(doc)?;

    debug!(
        stamped = report.stamped,
        regenerated = report.regenerated,
        removed = report.removed,
        "flattened form"
    );
    Ok(report)
}

fn has_acroform(doc: &Document) -> bool {
    doc.catalog()
        .map(|catalog| catalog.has(b"AcroForm"))
        .unwrap_or(false)
}

/// Stream id of the widget's normal appearance. For state dictionaries the
/// `/AS` state wins, then the field's checked value.
fn normal_appearance(doc: &Document, field: &FormField, widget: &Widget) -> Option<ObjectId> {
    let dict = doc.get_dictionary(widget.id).ok()?;
    let ap = match dict.get(b"AP").ok()? {
        Object::Dictionary(ap) => ap,
        Object::Reference(id) => doc.get_dictionary(*id).ok()?,
        _ => return None,
    };

    match ap.get(b"N").ok()? {
        Object::Reference(id) => match doc.get_object(*id).ok()? {
            Object::Stream(_) => Some(*id),
            Object::Dictionary(states) => select_state(doc, field, widget, dict, states),
            _ => None,
        },
        Object::Dictionary(states) => select_state(doc, field, widget, dict, states),
        _ => None,
    }
}

fn select_state(
    doc: &Document,
    field: &FormField,
    widget: &Widget,
    widget_dict: &lopdf::Dictionary,
    states: &lopdf::Dictionary,
) -> Option<ObjectId> {
    let state: Vec<u8> = match widget_dict.get(b"AS") {
        Ok(Object::Name(name)) => name.clone(),
        _ if field.widget_checked(widget) => states
            .iter()
            .map(|(key, _)| key.clone())
            .find(|key| key.as_slice() != b"Off")?,
        _ => b"Off".to_vec(),
    };

    let id = states.get(&state).ok()?.as_reference().ok()?;
    matches!(doc.get_object(id), Ok(Object::Stream(_))).then_some(id)
}

/// Build a Form XObject showing the field value, `None` when there is
/// nothing to show
fn synthesize_appearance(
    doc: &mut Document,
    field: &FormField,
    widget: &Widget,
    font_id: ObjectId,
) -> Option<ObjectId> {
    if !matches!(field.kind, FieldKind::Text | FieldKind::Checkbox) {
        return None;
    }
    let drawing = widget_drawing(field, widget)?;
    let operations = text_operations(
        BODY_FONT,
        drawing.font_size,
        drawing.x - widget.rect.x,
        drawing.rise,
        &drawing.text,
    );
    let content = encode_operations(operations).ok()?;

    let stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![real(0.0), real(0.0), real(widget.rect.width), real(widget.rect.height)],
            "Resources" => dictionary! {
                "Font" => dictionary! { BODY_FONT => font_id },
            },
        },
        content,
    );
    Some(doc.add_object(stream))
}

/// `cm` that maps the appearance BBox onto the widget rectangle
fn placement_operations(
    doc: &mut Document,
    stamp: &PendingStamp,
    name: &str,
) -> Result<Vec<Operation>, OnboardPdfError> {
    let stream = doc
        .get_object_mut(stamp.appearance)
        .and_then(Object::as_stream_mut)?;
    if !stream.dict.has(b"Subtype") {
        stream.dict.set("Type", "XObject");
        stream.dict.set("Subtype", "Form");
    }
    let bbox = stream.dict.get(b"BBox").ok().cloned();

    let rect = stamp.widget.rect;
    let [bx0, by0, bx1, by1] = bbox
        .and_then(|obj| rect_array(doc, &obj))
        .unwrap_or([0.0, 0.0, rect.width, rect.height]);

    let scale_x = if bx1 > bx0 { rect.width / (bx1 - bx0) } else { 1.0 };
    let scale_y = if by1 > by0 { rect.height / (by1 - by0) } else { 1.0 };

    Ok(xobject_operations(
        name,
        scale_x,
        scale_y,
        rect.x - bx0 * scale_x,
        rect.y - by0 * scale_y,
    ))
}

/// Drop widget annotations from a page, returning how many were removed
fn remove_widget_annotations(
    doc: &mut Document,
    page_id: ObjectId,
    widget_ids: &HashSet<ObjectId>,
) -> Result<usize, OnboardPdfError> {
    let annots = doc.get_dictionary(page_id)?.get(b"Annots").ok().cloned();
    let (annots, array_id) = match annots {
        Some(Object::Array(arr)) => (arr, None),
        Some(Object::Reference(id)) => match doc.get_object(id) {
            Ok(Object::Array(arr)) => (arr.clone(), Some(id)),
            _ => return Ok(0),
        },
        _ => return Ok(0),
    };

    let kept: Vec<Object> = annots
        .iter()
        .filter(|annot| !is_widget(doc, annot, widget_ids))
        .cloned()
        .collect();
    let removed = annots.len() - kept.len();
    if removed == 0 {
        return Ok(0);
    }

    match array_id {
        Some(id) => {
            *doc.get_object_mut(id)? = Object::Array(kept);
        }
        None => {
            let page = page_dict_mut(doc, page_id)?;
            if kept.is_empty() {
                page.remove(b"Annots");
            } else {
                page.set("Annots", kept);
            }
        }
    }
    Ok(removed)
}

fn is_widget(doc: &Document, annot: &Object, widget_ids: &HashSet<ObjectId>) -> bool {
    let dict = match annot {
        Object::Reference(id) => {
            if widget_ids.contains(id) {
                return true;
            }
            match doc.get_dictionary(*id) {
                Ok(dict) => dict,
                Err(_) => return false,
            }
        }
        Object::Dictionary(dict) => dict,
        _ => return false,
    };
    matches!(dict.get(b"Subtype"), Ok(Object::Name(name)) if name.as_slice() == b"Widget")
}

fn remove_acroform(doc: &mut Document) -> Result<(), OnboardPdfError> {
    let root = doc.trailer.get(b"Root").and_then(Object::as_reference)?;
    doc.get_object_mut(root)
        .and_then(Object::as_dict_mut)?
        .remove(b"AcroForm");
    Ok(())
}
