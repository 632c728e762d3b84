//! Field appearance prober
//!
//! Forms exported by some authoring tools carry ready-made appearance
//! streams for their widgets; others only carry values. The prober decides
//! which of the two paths a document takes.

use lopdf::Document;

use crate::error::OnboardPdfError;
use crate::fields::collect_fields;

/// Number of fields inspected before giving up
pub const PROBE_SAMPLE_SIZE: usize = 5;

/// Whether any of the first [`PROBE_SAMPLE_SIZE`] fields has a widget with a
/// normal appearance stream. Errors only when the form itself is malformed.
pub fn probe_appearances(doc: &Document) -> Result<bool, OnboardPdfError> {
    let fields = collect_fields(doc)?;
    Ok(fields
        .iter()
        .take(PROBE_SAMPLE_SIZE)
        .any(|field| field.widgets.iter().any(|w| w.has_normal_appearance)))
}

/// Infallible form of [`probe_appearances`]; a malformed form counts as
/// having no native appearances
pub fn has_native_appearances(doc: &Document) -> bool {
    probe_appearances(doc).unwrap_or(false)
}
