//! Onboarding packet PDF pipeline
//!
//! Takes stored onboarding documents (waiver, disclosure, add-on, or one
//! legacy combined PDF) and produces a single static PDF:
//! - `decode`: normalize stored payloads to PDF bytes
//! - `probe` / `render` / `flatten`: bake form values into page content
//! - `stamp`: draw the signature block on each document's last page
//! - `merge` / `pipeline`: combine everything into the deliverable

pub mod content;
pub mod decode;
pub mod document;
pub mod error;
pub mod fields;
pub mod flatten;
pub mod image;
pub mod merge;
pub mod offsets;
pub mod pipeline;
pub mod policy;
pub mod probe;
pub mod render;
pub mod stamp;

#[cfg(test)]
mod fixtures;

pub use decode::{decode_payload, decode_pdf_payload, DecodeError, DecodedBytes, PayloadEncoding};
pub use document::DocumentKind;
pub use error::OnboardPdfError;
pub use flatten::{flatten_form, FlattenOptions, FlattenReport};
pub use merge::{merge_documents, page_count};
pub use offsets::{FieldOffsets, OffsetEntry};
pub use pipeline::{assemble, plan_sources, AssembleOptions, Assembled, SourcePlan, SourceRecord};
pub use policy::{OnFailure, Stage, StagePolicies};
pub use probe::{has_native_appearances, probe_appearances};
pub use render::{render_fields, RenderReport};
pub use stamp::{
    resolve_printed_name, stamp_signature, SignatureKind, SignaturePayload, StampRequest,
};
