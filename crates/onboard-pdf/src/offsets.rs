//! Per-field vertical corrections for manually rendered forms
//!
//! Value-only forms place their widget rectangles slightly off the printed
//! lines. One table keyed by `(DocumentKind, field name)` holds the
//! corrections in points; positive moves the text up.

use std::collections::HashMap;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::document::DocumentKind;
use crate::error::OnboardPdfError;

lazy_static! {
    static ref BUILTIN_OFFSETS: HashMap<(DocumentKind, &'static str), f32> = {
        let mut table = HashMap::new();

        // Liability waiver
        table.insert((DocumentKind::Waiver, "Employee Name"), -2.0);
        table.insert((DocumentKind::Waiver, "Printed Name"), -2.0);
        table.insert((DocumentKind::Waiver, "Date"), -3.0);
        table.insert((DocumentKind::Waiver, "Emergency Contact"), -1.5);
        table.insert((DocumentKind::Waiver, "Emergency Phone"), -1.5);

        // Background check disclosure
        table.insert((DocumentKind::Disclosure, "Applicant Name"), -3.0);
        table.insert((DocumentKind::Disclosure, "Date of Birth"), -2.5);
        table.insert((DocumentKind::Disclosure, "SSN"), -2.5);
        table.insert((DocumentKind::Disclosure, "Drivers License"), -2.5);
        table.insert((DocumentKind::Disclosure, "Current Address"), -2.0);
        table.insert((DocumentKind::Disclosure, "Authorize"), 1.0);

        // State add-on
        table.insert((DocumentKind::Addon, "Full Name"), -2.0);
        table.insert((DocumentKind::Addon, "Signature Date"), -3.0);
        table.insert((DocumentKind::Addon, "Copy Requested"), 1.0);

        table
    };
}

/// One override row in the JSON offsets file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetEntry {
    pub document: DocumentKind,
    pub field: String,
    pub offset: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldOffsets {
    table: HashMap<(DocumentKind, String), f32>,
}

impl FieldOffsets {
    /// No corrections at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compiled-in corrections for the stock onboarding forms
    pub fn builtin() -> Self {
        let table = BUILTIN_OFFSETS
            .iter()
            .map(|((kind, field), offset)| ((*kind, (*field).to_string()), *offset))
            .collect();
        Self { table }
    }

    /// Built-in table with the entries of a JSON overrides document merged
    /// on top
    pub fn from_json_overrides(json: &str) -> Result<Self, OnboardPdfError> {
        let entries: Vec<OffsetEntry> = serde_json::from_str(json)
            .map_err(|e| OnboardPdfError::ConfigError(format!("Invalid field offsets: {}", e)))?;
        let mut offsets = Self::builtin();
        offsets.apply_overrides(entries);
        Ok(offsets)
    }

    pub fn apply_overrides(&mut self, entries: impl IntoIterator<Item = OffsetEntry>) {
        for entry in entries {
            self.insert(entry.document, &entry.field, entry.offset);
        }
    }

    pub fn insert(&mut self, kind: DocumentKind, field: &str, offset: f32) {
        self.table.insert((kind, field.to_string()), offset);
    }

    /// Correction for a field, matching the fully qualified name first and
    /// then its last segment. Zero when nothing matches.
    pub fn offset(&self, kind: DocumentKind, field: &str) -> f32 {
        if let Some(offset) = self.table.get(&(kind, field.to_string())) {
            return *offset;
        }
        field
            .rsplit_once('.')
            .and_then(|(_, last)| self.table.get(&(kind, last.to_string())))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
