//! Opaque payloads: objects whose content is extracted and reinflated
//! verbatim instead of traversed.
//!
//! Binary blobs are the only opaque kind. Their bytes either live inline on
//! the heap or in an external backing store reached through a
//! [`PayloadReader`]. On the wire the content travels as a `data:` URL
//! (`data:<media-type>;base64,<bytes>`).

use std::collections::BTreeMap;

use base64::Engine;
use serde::{Deserialize, Serialize};

/// Media type used when a blob does not declare one.
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// Where the bytes of an opaque object live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpaqueStore {
    /// Bytes held directly by the heap object.
    Inline(Vec<u8>),
    /// Bytes held by an external store, addressed by `key`.
    External { key: String, len: u64 },
}

/// Internal slot of a blob object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpaqueData {
    pub media_type: String,
    pub store: OpaqueStore,
}

impl OpaqueData {
    pub fn inline(media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into(),
            store: OpaqueStore::Inline(bytes),
        }
    }

    pub fn external(media_type: impl Into<String>, key: impl Into<String>, len: u64) -> Self {
        Self {
            media_type: media_type.into(),
            store: OpaqueStore::External {
                key: key.into(),
                len,
            },
        }
    }

    /// Declared size in bytes.
    pub fn len(&self) -> u64 {
        match &self.store {
            OpaqueStore::Inline(bytes) => bytes.len() as u64,
            OpaqueStore::External { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum PayloadError {
    #[error("payload `{key}` is not available from this reader")]
    Unavailable { key: String },
    #[error("payload read for `{key}` was cancelled")]
    Cancelled { key: String },
    #[error("payload read for `{key}` failed: {detail}")]
    Read { key: String, detail: String },
    #[error("invalid payload data url: {detail}")]
    InvalidDataUrl { detail: String },
}

/// Reads the bytes of externally stored payloads.
///
/// The encoder calls this once per opaque object, after the object's index
/// has been reserved. A reader may block on its backing store; returning
/// [`PayloadError::Cancelled`] abandons the whole encode.
pub trait PayloadReader {
    fn read(&mut self, key: &str) -> Result<Vec<u8>, PayloadError>;
}

/// Reader that knows no external payloads; inline blobs still encode.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineOnly;

impl PayloadReader for InlineOnly {
    fn read(&mut self, key: &str) -> Result<Vec<u8>, PayloadError> {
        Err(PayloadError::Unavailable {
            key: key.to_string(),
        })
    }
}

impl PayloadReader for BTreeMap<String, Vec<u8>> {
    fn read(&mut self, key: &str) -> Result<Vec<u8>, PayloadError> {
        self.get(key).cloned().ok_or_else(|| PayloadError::Unavailable {
            key: key.to_string(),
        })
    }
}

/// Extract the full content of an opaque object.
pub fn extract(data: &OpaqueData, reader: &mut dyn PayloadReader) -> Result<Vec<u8>, PayloadError> {
    match &data.store {
        OpaqueStore::Inline(bytes) => Ok(bytes.clone()),
        OpaqueStore::External { key, len } => {
            let bytes = reader.read(key)?;
            if bytes.len() as u64 != *len {
                return Err(PayloadError::Read {
                    key: key.clone(),
                    detail: format!("expected {len} bytes, reader returned {}", bytes.len()),
                });
            }
            Ok(bytes)
        }
    }
}

/// Render extracted bytes as a `data:` URL.
pub fn to_data_url(media_type: &str, bytes: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{media_type};base64,{encoded}")
}

/// Parse a `data:` URL back into inline opaque data.
pub fn from_data_url(text: &str) -> Result<OpaqueData, PayloadError> {
    let rest = text
        .strip_prefix("data:")
        .ok_or_else(|| PayloadError::InvalidDataUrl {
            detail: "missing `data:` scheme".to_string(),
        })?;
    let (header, encoded) = rest
        .split_once(',')
        .ok_or_else(|| PayloadError::InvalidDataUrl {
            detail: "missing `,` separator".to_string(),
        })?;
    let media_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| PayloadError::InvalidDataUrl {
            detail: "only base64 data urls are supported".to_string(),
        })?;
    let media_type = if media_type.is_empty() {
        DEFAULT_MEDIA_TYPE
    } else {
        media_type
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|error| PayloadError::InvalidDataUrl {
            detail: error.to_string(),
        })?;
    Ok(OpaqueData::inline(media_type, bytes))
}
