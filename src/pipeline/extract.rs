//! Content extraction: `law_full_text` → law XML bytes.
//!
//! The API base64-encodes the XML and, for some documents, wraps it in a
//! synthetic `<TmpRootTag>` element. That wrapper is stripped with a literal
//! prefix/suffix trim; nothing here parses XML. Structural validity is the
//! transformer's problem.

use super::source::LawData;
use crate::error::Law2EpubError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;
use tracing::debug;

const WRAPPER_OPEN: &[u8] = b"<TmpRootTag>";
const WRAPPER_CLOSE: &[u8] = b"</TmpRootTag>";

/// Pull the law XML out of an API response.
///
/// # Errors
/// - [`Law2EpubError::ContentMissing`]: no `law_full_text`, or it is `null`
/// - [`Law2EpubError::FormatMismatch`]: `law_full_text` is not a string
/// - [`Law2EpubError::Decode`]: the string is not standard base64
pub fn extract_content(data: &LawData, id: &str) -> Result<Vec<u8>, Law2EpubError> {
    let encoded = match data.law_full_text {
        None | Some(Value::Null) => {
            return Err(Law2EpubError::ContentMissing { id: id.to_string() })
        }
        Some(Value::String(ref s)) => s,
        Some(ref other) => {
            return Err(Law2EpubError::FormatMismatch {
                id: id.to_string(),
                found: json_kind(other),
            })
        }
    };

    let decoded = STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| Law2EpubError::Decode {
            id: id.to_string(),
            detail: e.to_string(),
        })?;

    let content = strip_wrapper(decoded);
    debug!(
        "Decoded XML content length for law ID {}: {} bytes",
        id,
        content.len()
    );
    Ok(content)
}

/// Remove a leading `<TmpRootTag>` and, when present, the trailing
/// `</TmpRootTag>`. Input without the opening tag is returned unchanged.
pub fn strip_wrapper(content: Vec<u8>) -> Vec<u8> {
    if !content.starts_with(WRAPPER_OPEN) {
        return content;
    }
    let inner = &content[WRAPPER_OPEN.len()..];
    inner.strip_suffix(WRAPPER_CLOSE).unwrap_or(inner).to_vec()
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
