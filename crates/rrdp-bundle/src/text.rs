//! Base64 wrapping for text-only transports.

use crate::Result;
use base64::Engine;

/// Encode bytes as standard padded base64.
pub fn encode_text(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode base64 text. Surrounding and embedded whitespace (line breaks from
/// mail or terminal wrapping) is ignored.
pub fn decode_text(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(base64::engine::general_purpose::STANDARD.decode(compact)?)
}
