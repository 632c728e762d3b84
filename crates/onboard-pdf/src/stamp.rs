//! Signature stamper
//!
//! Draws the signer's signature, the signing date and (for waivers) the
//! printed name into a white block near the bottom-left of the last page.

use chrono::NaiveDate;
use lopdf::content::Operation;
use lopdf::{Document, ObjectId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::content::{
    add_page_resource, append_page_content, encode_operations, estimate_text_width,
    filled_rect_operations, fit_text, rule_operations, standard_font, text_operations,
    xobject_operations, BODY_FONT,
};
use crate::decode::decode_base64_text;
use crate::document::{page_box, page_ids};
use crate::error::OnboardPdfError;
use crate::image::embed_png;

pub const SIGNATURE_FONT: &str = "OnbSigScript";
pub const SIGNATURE_IMAGE: &str = "OnbSigImage";

const MARGIN_LEFT: f32 = 36.0;
const MARGIN_BOTTOM: f32 = 30.0;
const BLOCK_HEIGHT: f32 = 80.0;
const BLOCK_WIDTH: f32 = 260.0;
const BLOCK_WIDTH_WITH_NAME: f32 = 440.0;
const SIGNATURE_BOX_WIDTH: f32 = 200.0;
const SIGNATURE_BOX_HEIGHT: f32 = 44.0;
const TYPED_FONT_SIZE: f32 = 22.0;
const TYPED_MIN_FONT_SIZE: f32 = 10.0;
const DATE_FONT_SIZE: f32 = 9.0;
const NAME_FONT_SIZE: f32 = 10.0;
const NAME_COLUMN_WIDTH: f32 = 180.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureKind {
    /// PNG captured from a drawing pad
    Drawn,
    /// Name typed by the signer
    Typed,
}

impl SignatureKind {
    /// `draw` (any case) is a drawn signature; every other tag, or none,
    /// is typed
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some(tag) if tag.trim().eq_ignore_ascii_case("draw") => SignatureKind::Drawn,
            _ => SignatureKind::Typed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePayload {
    pub kind: SignatureKind,
    /// PNG data URL or bare base64 for drawn signatures, the text for typed
    pub value: String,
}

impl SignaturePayload {
    pub fn new(value: &str, tag: Option<&str>) -> Self {
        Self {
            kind: SignatureKind::from_tag(tag),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampRequest {
    pub signature: SignaturePayload,
    pub signed_on: NaiveDate,
    pub is_waiver: bool,
    pub printed_name: Option<String>,
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%m/%d/%Y").to_string()
}

/// First non-blank of the profile name and the account name, else the
/// email's local part split on `.`, `_`, `-` and `+` and title-cased
pub fn resolve_printed_name(
    profile_name: Option<&str>,
    user_name: Option<&str>,
    email: Option<&str>,
) -> Option<String> {
    for name in [profile_name, user_name].into_iter().flatten() {
        let name = name.trim();
        if !name.is_empty() {
            return Some(name.to_string());
        }
    }

    let local = email?.split('@').next()?.trim();
    let words: Vec<String> = local
        .split(['.', '_', '-', '+'])
        .filter(|w| !w.is_empty())
        .map(title_case)
        .collect();
    (!words.is_empty()).then(|| words.join(" "))
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Stamp the signature block onto the last page.
///
/// On failure the document is restored to its state before the call.
pub fn stamp_signature(doc: &mut Document, request: &StampRequest) -> Result<(), OnboardPdfError> {
    let snapshot = doc.clone();
    match draw_stamp(doc, request) {
        Ok(()) => Ok(()),
        Err(err) => {
            *doc = snapshot;
            Err(err)
        }
    }
}

fn draw_stamp(doc: &mut Document, request: &StampRequest) -> Result<(), OnboardPdfError> {
    let page_id = *page_ids(doc)
        .last()
        .ok_or_else(|| OnboardPdfError::OperationError("Document has no pages".into()))?;
    let page = page_box(doc, page_id);

    let printed_name = request
        .printed_name
        .as_deref()
        .map(str::trim)
        .filter(|name| request.is_waiver && !name.is_empty());

    let x = page.x0 + MARGIN_LEFT;
    let y = page.bottom() + MARGIN_BOTTOM;
    let width = if printed_name.is_some() {
        BLOCK_WIDTH_WITH_NAME
    } else {
        BLOCK_WIDTH
    };
    let sig_x = x + 8.0;
    let sig_y = y + 26.0;

    let mut operations = filled_rect_operations(1.0, x, y, width, BLOCK_HEIGHT);

    match request.signature.kind {
        SignatureKind::Drawn => {
            let size = draw_image_signature(doc, page_id, &request.signature.value)?;
            operations.extend(fit_image(size, sig_x, sig_y));
        }
        SignatureKind::Typed => {
            let font_id = standard_font(doc, "Helvetica-Oblique");
            add_page_resource(doc, page_id, "Font", SIGNATURE_FONT, font_id)?;
            operations.extend(typed_signature(&request.signature.value, sig_x, sig_y)?);
        }
    }

    let date = format!("Date: {}", format_date(request.signed_on));
    operations.extend(text_operations(BODY_FONT, DATE_FONT_SIZE, sig_x, y + 10.0, &date));

    if let Some(name) = printed_name {
        let label = fit_text(
            &format!("Printed Name: {}", name),
            NAME_COLUMN_WIDTH,
            NAME_FONT_SIZE,
        );
        operations.extend(text_operations(
            BODY_FONT,
            NAME_FONT_SIZE,
            sig_x + SIGNATURE_BOX_WIDTH + 24.0,
            sig_y + 16.0,
            &label,
        ));
    }

    let body_font = standard_font(doc, "Helvetica");
    add_page_resource(doc, page_id, "Font", BODY_FONT, body_font)?;
    append_page_content(doc, page_id, encode_operations(operations)?)?;

    debug!(
        kind = ?request.signature.kind,
        printed_name = printed_name.is_some(),
        "stamped signature"
    );
    Ok(())
}

/// Embed the PNG and register it on the page, returning its size
fn draw_image_signature(
    doc: &mut Document,
    page_id: ObjectId,
    value: &str,
) -> Result<(u32, u32), OnboardPdfError> {
    let png = decode_base64_text(value)
        .map_err(|e| OnboardPdfError::ImageError(e.reason))?;
    let image = embed_png(doc, &png)?;
    add_page_resource(doc, page_id, "XObject", SIGNATURE_IMAGE, image.id)?;
    Ok((image.width, image.height))
}

/// Scale the image into the signature box keeping its aspect ratio
fn fit_image((width, height): (u32, u32), x: f32, y: f32) -> Vec<Operation> {
    let scale = (SIGNATURE_BOX_WIDTH / width as f32).min(SIGNATURE_BOX_HEIGHT / height as f32);
    let draw_width = width as f32 * scale;
    let draw_height = height as f32 * scale;
    xobject_operations(
        SIGNATURE_IMAGE,
        draw_width,
        draw_height,
        x,
        y + (SIGNATURE_BOX_HEIGHT - draw_height) / 2.0,
    )
}

fn typed_signature(value: &str, x: f32, y: f32) -> Result<Vec<Operation>, OnboardPdfError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(OnboardPdfError::OperationError("Signature is empty".into()));
    }

    let natural = estimate_text_width(value, TYPED_FONT_SIZE);
    let font_size = if natural > SIGNATURE_BOX_WIDTH {
        (TYPED_FONT_SIZE * SIGNATURE_BOX_WIDTH / natural).max(TYPED_MIN_FONT_SIZE)
    } else {
        TYPED_FONT_SIZE
    };
    let text = fit_text(value, SIGNATURE_BOX_WIDTH, font_size);

    let mut operations = text_operations(SIGNATURE_FONT, font_size, x, y + 10.0, &text);
    operations.extend(rule_operations(x, y + 6.0, SIGNATURE_BOX_WIDTH, 0.75));
    Ok(operations)
}
