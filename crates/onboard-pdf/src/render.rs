//! Manual field renderer
//!
//! Draws field values straight into page content for forms that carry no
//! appearance streams of their own. Positions come from the widget
//! rectangles corrected by the [`FieldOffsets`] table.

use std::collections::BTreeMap;

use lopdf::content::Operation;
use lopdf::{Document, ObjectId};
use tracing::debug;

use crate::content::{
    add_page_resource, append_page_content, encode_operations, estimate_text_width, fit_text,
    standard_font, text_operations, BODY_FONT,
};
use crate::document::{page_box, page_ids, DocumentKind, PageBox};
use crate::error::OnboardPdfError;
use crate::fields::{collect_fields, FieldKind, FieldValue, FormField, Rect, Widget};
use crate::offsets::FieldOffsets;

/// Inset between the widget border and drawn text
pub const TEXT_PADDING: f32 = 2.0;
pub const DEFAULT_FONT_SIZE: f32 = 10.0;
pub const MIN_FONT_SIZE: f32 = 6.0;
/// Glyph drawn for a checked box
pub const CHECKMARK_GLYPH: &str = "X";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderReport {
    pub drawn: usize,
    /// Widgets left undrawn, including those with their own appearance
    pub skipped: usize,
    /// Widgets moved to a later page because they fell below the bottom edge
    pub relocated: usize,
    /// Widgets that overflowed past the last page
    pub dropped: usize,
}

/// Final position of a widget's text
#[derive(Debug, Clone, Copy, PartialEq)]
struct Placement {
    page_index: usize,
    baseline: f32,
    relocated: bool,
}

/// Draw every field value of a value-only form onto its page
pub fn render_fields(
    doc: &mut Document,
    kind: DocumentKind,
    offsets: &FieldOffsets,
) -> Result<RenderReport, OnboardPdfError> {
    let fields = collect_fields(doc)?;
    let mut report = RenderReport::default();
    if fields.is_empty() {
        return Ok(report);
    }

    let pages = page_ids(doc);
    let boxes: Vec<PageBox> = pages.iter().map(|id| page_box(doc, *id)).collect();
    let mut per_page: BTreeMap<usize, Vec<Operation>> = BTreeMap::new();

    for field in &fields {
        if field.widgets.is_empty() {
            report.skipped += 1;
            continue;
        }
        let offset = offsets.offset(kind, &field.name);

        for widget in &field.widgets {
            // The flattener paints widgets that carry their own appearance
            if widget.has_normal_appearance {
                report.skipped += 1;
                continue;
            }
            let Some(draw) = widget_drawing(field, widget) else {
                report.skipped += 1;
                continue;
            };
            let Some(page_index) = widget.page_index.filter(|i| *i < pages.len()) else {
                debug!(field = %field.name, "widget has no page, skipping");
                report.skipped += 1;
                continue;
            };

            let start = resolve_y(widget.rect.y, &boxes[page_index]) + draw.rise + offset;
            match place(&boxes, page_index, start) {
                Some(placement) => {
                    if placement.relocated {
                        debug!(
                            field = %field.name,
                            from = page_index,
                            to = placement.page_index,
                            "field overflowed onto a later page"
                        );
                        report.relocated += 1;
                    }
                    per_page
                        .entry(placement.page_index)
                        .or_default()
                        .extend(text_operations(
                            BODY_FONT,
                            draw.font_size,
                            draw.x,
                            placement.baseline,
                            &draw.text,
                        ));
                    report.drawn += 1;
                }
                None => {
                    debug!(field = %field.name, "field overflowed past the last page, dropping");
                    report.dropped += 1;
                }
            }
        }
    }

    if per_page.is_empty() {
        return Ok(report);
    }

    let font_id = standard_font(doc, "Helvetica");
    for (index, operations) in per_page {
        draw_on_page(doc, pages[index], font_id, operations)?;
    }

    debug!(
        document = %kind,
        drawn = report.drawn,
        skipped = report.skipped,
        relocated = report.relocated,
        dropped = report.dropped,
        "rendered form fields"
    );
    Ok(report)
}

fn draw_on_page(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
    operations: Vec<Operation>,
) -> Result<(), OnboardPdfError> {
    add_page_resource(doc, page_id, "Font", BODY_FONT, font_id)?;
    let content = encode_operations(operations)?;
    append_page_content(doc, page_id, content)
}

/// What to draw for a widget, relative to its rectangle
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WidgetDrawing {
    pub text: String,
    pub font_size: f32,
    /// Absolute x of the text origin
    pub x: f32,
    /// Baseline height above the rectangle's bottom edge
    pub rise: f32,
}

/// Text and layout for a widget, `None` when there is nothing to show
pub(crate) fn widget_drawing(field: &FormField, widget: &Widget) -> Option<WidgetDrawing> {
    if widget.hidden {
        return None;
    }

    match field.kind {
        FieldKind::Checkbox => {
            if !field.widget_checked(widget) {
                return None;
            }
            let font_size = checkmark_size(field, &widget.rect);
            let glyph_width = estimate_text_width(CHECKMARK_GLYPH, font_size);
            Some(WidgetDrawing {
                text: CHECKMARK_GLYPH.to_string(),
                font_size,
                x: widget.rect.x + (widget.rect.width - glyph_width) / 2.0,
                rise: ((widget.rect.height - font_size * 0.7) / 2.0).max(0.0),
            })
        }
        FieldKind::Text | FieldKind::Other => {
            let FieldValue::Text(value) = &field.value else {
                return None;
            };
            let font_size = text_size(field, &widget.rect);
            let text = fit_text(
                value.trim(),
                widget.rect.width - 2.0 * TEXT_PADDING,
                font_size,
            );
            if text.is_empty() {
                return None;
            }
            Some(WidgetDrawing {
                text,
                font_size,
                x: widget.rect.x + TEXT_PADDING,
                rise: TEXT_PADDING,
            })
        }
    }
}

/// Font size from the field's DA, or fitted to the widget when auto-sized
fn text_size(field: &FormField, rect: &Rect) -> f32 {
    field.font_size.unwrap_or_else(|| {
        (rect.height - 2.0 * TEXT_PADDING).clamp(MIN_FONT_SIZE, DEFAULT_FONT_SIZE)
    })
}

fn checkmark_size(field: &FormField, rect: &Rect) -> f32 {
    field
        .font_size
        .unwrap_or_else(|| (rect.width.min(rect.height) * 0.8).max(MIN_FONT_SIZE))
}

/// Page-space y of a widget's raw rectangle.
///
/// Values within one page height are already page coordinates. Larger
/// magnitudes come from forms laid out as one continuous column and are
/// read as a distance down from the top of the page.
pub fn resolve_y(raw_y: f32, page: &PageBox) -> f32 {
    if raw_y.abs() <= page.height() {
        raw_y
    } else {
        page.top() - raw_y.abs()
    }
}

/// Walk forward while the baseline is below the page's bottom edge,
/// keeping the same distance below the edge as a distance from the next
/// page's top
fn place(boxes: &[PageBox], page_index: usize, baseline: f32) -> Option<Placement> {
    let mut index = page_index;
    let mut baseline = baseline;

    loop {
        let page = boxes.get(index)?;
        if baseline >= page.bottom() {
            return Some(Placement {
                page_index: index,
                baseline,
                relocated: index != page_index,
            });
        }
        let below = page.bottom() - baseline;
        index += 1;
        baseline = boxes.get(index)?.top() - below;
    }
}
