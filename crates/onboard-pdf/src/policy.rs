//! Failure policy per pipeline stage
//!
//! `Continue` logs the failure and skips the stage. For decode, load and
//! reload that means skipping the document; for merge the first document
//! is delivered alone. `Abort` ends the assembly with a [`Stage`] error.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::OnboardPdfError;
use crate::DocumentKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFailure {
    Continue,
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Decode,
    Load,
    Probe,
    Render,
    Flatten,
    Reload,
    Stamp,
    Merge,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Decode => "decode",
            Stage::Load => "load",
            Stage::Probe => "probe",
            Stage::Render => "render",
            Stage::Flatten => "flatten",
            Stage::Reload => "reload",
            Stage::Stamp => "stamp",
            Stage::Merge => "merge",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One policy per stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagePolicies {
    pub decode: OnFailure,
    pub load: OnFailure,
    pub probe: OnFailure,
    pub render: OnFailure,
    pub flatten: OnFailure,
    pub reload: OnFailure,
    pub stamp: OnFailure,
    pub merge: OnFailure,
}

impl Default for StagePolicies {
    fn default() -> Self {
        Self {
            decode: OnFailure::Abort,
            load: OnFailure::Abort,
            probe: OnFailure::Continue,
            render: OnFailure::Abort,
            flatten: OnFailure::Continue,
            reload: OnFailure::Abort,
            stamp: OnFailure::Continue,
            merge: OnFailure::Abort,
        }
    }
}

impl StagePolicies {
    pub fn for_stage(&self, stage: Stage) -> OnFailure {
        match stage {
            Stage::Decode => self.decode,
            Stage::Load => self.load,
            Stage::Probe => self.probe,
            Stage::Render => self.render,
            Stage::Flatten => self.flatten,
            Stage::Reload => self.reload,
            Stage::Stamp => self.stamp,
            Stage::Merge => self.merge,
        }
    }

    /// Apply the stage's policy to a stage result.
    ///
    /// `Ok(Some(value))` on success, `Ok(None)` when the failure was
    /// swallowed, `Err` when the stage aborts the assembly.
    pub fn apply<T>(
        &self,
        stage: Stage,
        kind: Option<DocumentKind>,
        result: Result<T, OnboardPdfError>,
    ) -> Result<Option<T>, OnboardPdfError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) => match self.for_stage(stage) {
                OnFailure::Continue => {
                    warn!(
                        stage = %stage,
                        document = subject(kind),
                        error = %err,
                        "stage failed, continuing"
                    );
                    Ok(None)
                }
                OnFailure::Abort => Err(abort(stage, kind, err)),
            },
        }
    }
}

/// Log a failure that ends the assembly and tag it with its stage
pub fn abort(stage: Stage, kind: Option<DocumentKind>, err: OnboardPdfError) -> OnboardPdfError {
    error!(
        stage = %stage,
        document = subject(kind),
        error = %err,
        "stage failed, aborting"
    );
    OnboardPdfError::Stage {
        stage,
        kind,
        source: Box::new(err),
    }
}

fn subject(kind: Option<DocumentKind>) -> &'static str {
    kind.map(DocumentKind::label).unwrap_or("packet")
}
