//! Stored payload normalization
//!
//! Documents reach the pipeline in one of three shapes: raw PDF bytes,
//! base64 text (optionally a `data:` URL), or a Postgres `bytea` hex dump
//! (`\x...`) wrapping either of those. Every caller goes through
//! [`decode_payload`] so the sniffing rules live in one place.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use serde::Serialize;
use thiserror::Error;

use crate::error::OnboardPdfError;

/// Leading bytes of every PDF file
pub const PDF_MAGIC: &[u8] = b"%PDF";

/// Standard alphabet, padding optional. Browsers and storage layers disagree
/// on whether trailing `=` survives the round trip.
const BASE64_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// How a payload was stored before normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadEncoding {
    Binary,
    Base64,
    HexBase64,
    HexBinary,
}

/// Normalized payload bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBytes {
    pub bytes: Vec<u8>,
    pub encoding: PayloadEncoding,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to decode payload: {reason}")]
pub struct DecodeError {
    pub reason: String,
}

impl DecodeError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Detect the storage encoding of `raw` and return the underlying bytes.
///
/// Detection order:
/// 1. bytes already starting with `%PDF` are returned unchanged
/// 2. text starting with `\x` is hex-decoded; the result is either PDF
///    bytes or base64 text, which is decoded once more
/// 3. anything else is treated as base64 text, with an optional data URL
///    prefix and embedded whitespace
pub fn decode_payload(raw: &[u8]) -> Result<DecodedBytes, DecodeError> {
    if raw.starts_with(PDF_MAGIC) {
        return Ok(DecodedBytes {
            bytes: raw.to_vec(),
            encoding: PayloadEncoding::Binary,
        });
    }

    let text = std::str::from_utf8(raw)
        .map_err(|_| DecodeError::new("payload is neither PDF bytes nor UTF-8 text"))?
        .trim();

    if text.is_empty() {
        return Err(DecodeError::new("payload is empty"));
    }

    if let Some(hex_digits) = text.strip_prefix("\\x") {
        let inner = hex::decode(hex_digits.trim())
            .map_err(|e| DecodeError::new(format!("invalid hex payload: {}", e)))?;

        if inner.starts_with(PDF_MAGIC) {
            return Ok(DecodedBytes {
                bytes: inner,
                encoding: PayloadEncoding::HexBinary,
            });
        }

        let inner_text = std::str::from_utf8(&inner)
            .map_err(|_| DecodeError::new("hex payload does not contain base64 text"))?;

        return Ok(DecodedBytes {
            bytes: decode_base64_text(inner_text)?,
            encoding: PayloadEncoding::HexBase64,
        });
    }

    Ok(DecodedBytes {
        bytes: decode_base64_text(text)?,
        encoding: PayloadEncoding::Base64,
    })
}

/// Decode a payload and require the result to be a PDF
pub fn decode_pdf_payload(raw: &[u8]) -> Result<DecodedBytes, OnboardPdfError> {
    let decoded = decode_payload(raw)?;
    if !decoded.bytes.starts_with(PDF_MAGIC) {
        return Err(OnboardPdfError::NotPdf);
    }
    Ok(decoded)
}

/// Strip a `data:<mime>;base64,` prefix if present
pub fn strip_data_url(text: &str) -> &str {
    if text.starts_with("data:") {
        if let Some((_, body)) = text.split_once(',') {
            return body;
        }
    }
    text
}

/// Decode base64 text, tolerating a data URL prefix, whitespace and
/// missing padding
pub fn decode_base64_text(text: &str) -> Result<Vec<u8>, DecodeError> {
    let body = strip_data_url(text.trim());
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    if compact.is_empty() {
        return Err(DecodeError::new("base64 payload is empty"));
    }

    BASE64_LENIENT
        .decode(compact.as_bytes())
        .map_err(|e| DecodeError::new(format!("invalid base64 payload: {}", e)))
}
