use thiserror::Error;

use crate::decode::DecodeError;
use crate::policy::Stage;
use crate::DocumentKind;

#[derive(Error, Debug)]
pub enum OnboardPdfError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Payload is not a PDF (missing %PDF header)")]
    NotPdf,

    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Invalid signature image: {0}")]
    ImageError(String),

    #[error("Failed to serialize PDF: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("No stored documents to assemble")]
    NoDocuments,

    #[error("{stage} failed{}: {source}", subject(.kind))]
    Stage {
        stage: Stage,
        /// `None` for stages that work on the whole packet
        kind: Option<DocumentKind>,
        #[source]
        source: Box<OnboardPdfError>,
    },
}

fn subject(kind: &Option<DocumentKind>) -> String {
    match kind {
        Some(kind) => format!(" for {} document", kind),
        None => String::new(),
    }
}

impl From<lopdf::Error> for OnboardPdfError {
    fn from(err: lopdf::Error) -> Self {
        OnboardPdfError::OperationError(err.to_string())
    }
}
