//! Packet assembly
//!
//! Turns one stored record into a single flattened, signed PDF:
//! decode, load, probe, render or regenerate, flatten, save and reload,
//! stamp, then merge.

use chrono::{NaiveDate, Utc};
use lopdf::Document;
use serde::Serialize;
use tracing::{debug, info};

use crate::decode::decode_pdf_payload;
use crate::document::{load, reload, save, DocumentKind};
use crate::error::OnboardPdfError;
use crate::flatten::{flatten_form, FlattenOptions};
use crate::merge::merge_documents;
use crate::offsets::FieldOffsets;
use crate::policy::{abort, OnFailure, Stage, StagePolicies};
use crate::probe::probe_appearances;
use crate::render::render_fields;
use crate::stamp::{stamp_signature, SignaturePayload, StampRequest};

/// Stored payloads and signature for one user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRecord {
    pub pdf_data: Option<Vec<u8>>,
    pub waiver_pdf_data: Option<Vec<u8>>,
    pub disclosure_pdf_data: Option<Vec<u8>>,
    pub addon_pdf_data: Option<Vec<u8>>,
    pub signature: Option<String>,
    pub signature_type: Option<String>,
    pub created_at: Option<NaiveDate>,
}

impl SourceRecord {
    /// Non-empty payload for a document kind
    pub fn payload(&self, kind: DocumentKind) -> Option<&[u8]> {
        let payload = match kind {
            DocumentKind::Waiver => &self.waiver_pdf_data,
            DocumentKind::Disclosure => &self.disclosure_pdf_data,
            DocumentKind::Addon => &self.addon_pdf_data,
            DocumentKind::Legacy => &self.pdf_data,
        };
        payload.as_deref().filter(|bytes| !bytes.is_empty())
    }

    pub fn signature_payload(&self) -> Option<SignaturePayload> {
        let value = self.signature.as_deref()?.trim();
        if value.is_empty() {
            return None;
        }
        Some(SignaturePayload::new(value, self.signature_type.as_deref()))
    }
}

/// Which stored documents make up the packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourcePlan {
    /// Separately stored documents, in packet order
    Separate(Vec<DocumentKind>),
    /// The single combined legacy document
    Legacy,
}

/// Waiver, disclosure and add-on in that order when any exist, otherwise
/// the legacy document. `only` restricts the plan to one kind.
pub fn plan_sources(
    record: &SourceRecord,
    only: Option<DocumentKind>,
) -> Result<SourcePlan, OnboardPdfError> {
    match only {
        Some(DocumentKind::Legacy) => record
            .payload(DocumentKind::Legacy)
            .map(|_| SourcePlan::Legacy)
            .ok_or(OnboardPdfError::NoDocuments),
        Some(kind) => record
            .payload(kind)
            .map(|_| SourcePlan::Separate(vec![kind]))
            .ok_or(OnboardPdfError::NoDocuments),
        None => {
            let separate: Vec<DocumentKind> = DocumentKind::SEPARATE
                .into_iter()
                .filter(|kind| record.payload(*kind).is_some())
                .collect();
            if !separate.is_empty() {
                Ok(SourcePlan::Separate(separate))
            } else if record.payload(DocumentKind::Legacy).is_some() {
                Ok(SourcePlan::Legacy)
            } else {
                Err(OnboardPdfError::NoDocuments)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssembleOptions {
    pub embed_signature: bool,
    /// Name printed beside the signature on the waiver
    pub printed_name: Option<String>,
    /// Restrict the packet to one document kind
    pub only: Option<DocumentKind>,
    pub policies: StagePolicies,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            embed_signature: true,
            printed_name: None,
            only: None,
            policies: StagePolicies::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Assembled {
    pub bytes: Vec<u8>,
    pub plan: SourcePlan,
    pub page_count: u32,
}

/// Build the deliverable PDF for a record
pub fn assemble(
    record: &SourceRecord,
    options: &AssembleOptions,
    offsets: &FieldOffsets,
) -> Result<Assembled, OnboardPdfError> {
    let plan = plan_sources(record, options.only)?;
    let policies = &options.policies;

    let signature = if options.embed_signature {
        record.signature_payload()
    } else {
        None
    };
    if options.embed_signature && signature.is_none() {
        debug!("record has no signature, skipping stamp");
    }
    let signed_on = record
        .created_at
        .unwrap_or_else(|| Utc::now().date_naive());

    let stamp_for = |kind: DocumentKind| {
        signature.clone().map(|signature| StampRequest {
            signature,
            signed_on,
            is_waiver: kind == DocumentKind::Waiver,
            printed_name: options.printed_name.clone(),
        })
    };

    let mut output = match &plan {
        SourcePlan::Legacy => {
            let kind = DocumentKind::Legacy;
            let raw = record.payload(kind).ok_or(OnboardPdfError::NoDocuments)?;
            process_document(raw, kind, stamp_for(kind).as_ref(), policies, offsets)?
                .ok_or(OnboardPdfError::NoDocuments)?
        }
        SourcePlan::Separate(kinds) => {
            let mut documents = Vec::with_capacity(kinds.len());
            for kind in kinds {
                let Some(raw) = record.payload(*kind) else {
                    continue;
                };
                if let Some(doc) =
                    process_document(raw, *kind, stamp_for(*kind).as_ref(), policies, offsets)?
                {
                    documents.push(doc);
                }
            }
            if documents.is_empty() {
                return Err(OnboardPdfError::NoDocuments);
            }
            merge_packet(documents, policies)?
        }
    };

    let bytes = save(&mut output).map_err(|e| abort(Stage::Merge, None, e))?;
    let page_count = output.get_pages().len() as u32;

    info!(
        plan = ?plan,
        pages = page_count,
        bytes = bytes.len(),
        "assembled onboarding packet"
    );

    Ok(Assembled {
        bytes,
        plan,
        page_count,
    })
}

/// Merge under the merge stage policy. When merging may be skipped the
/// first document is delivered on its own.
fn merge_packet(
    documents: Vec<Document>,
    policies: &StagePolicies,
) -> Result<Document, OnboardPdfError> {
    let fallback = match policies.for_stage(Stage::Merge) {
        OnFailure::Continue => documents.first().cloned(),
        OnFailure::Abort => None,
    };

    match policies.apply(Stage::Merge, None, merge_documents(documents))? {
        Some(merged) => Ok(merged),
        None => fallback.ok_or(OnboardPdfError::NoDocuments),
    }
}

/// Run one stored payload through every per-document stage.
///
/// `Ok(None)` means a stage the document cannot do without failed under a
/// `Continue` policy and the document is left out of the packet.
pub fn process_document(
    raw: &[u8],
    kind: DocumentKind,
    stamp: Option<&StampRequest>,
    policies: &StagePolicies,
    offsets: &FieldOffsets,
) -> Result<Option<Document>, OnboardPdfError> {
    let subject = Some(kind);

    let Some(decoded) = policies.apply(Stage::Decode, subject, decode_pdf_payload(raw))? else {
        return Ok(None);
    };
    debug!(document = %kind, encoding = ?decoded.encoding, "decoded payload");

    let Some(mut doc) = policies.apply(Stage::Load, subject, load(&decoded.bytes))? else {
        return Ok(None);
    };

    let native = policies
        .apply(Stage::Probe, subject, probe_appearances(&doc))?
        .unwrap_or(false);

    if !native {
        if let Some(report) =
            policies.apply(Stage::Render, subject, render_fields(&mut doc, kind, offsets))?
        {
            debug!(document = %kind, drawn = report.drawn, "rendered value-only form");
        }
    }

    // Manual path values are already in the page content
    let flatten = FlattenOptions {
        regenerate_missing: native,
    };
    policies.apply(Stage::Flatten, subject, flatten_form(&mut doc, flatten))?;

    let Some(mut doc) = policies.apply(Stage::Reload, subject, reload(&mut doc))? else {
        return Ok(None);
    };

    if let Some(request) = stamp {
        policies.apply(Stage::Stamp, subject, stamp_signature(&mut doc, request))?;
    }

    Ok(Some(doc))
}
