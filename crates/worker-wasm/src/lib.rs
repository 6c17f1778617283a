//! WASM-compatible wrapper for watermark removal.
//!
//! Exposes upload cleaning to JavaScript for use in browsers and
//! Cloudflare Workers.

use serde::Serialize;
use unmark_engine::{Remover, StripReport};
use wasm_bindgen::prelude::*;

#[wasm_bindgen(start)]
pub fn init() {
    // Set up better panic messages in the console
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Report and naming for a cleaned upload; the bytes travel separately.
#[derive(Debug, Serialize)]
pub struct CleanResult {
    /// Suggested download name.
    pub filename: String,
    pub mime_type: String,
    pub report: StripReport,
}

/// Error thrown to JavaScript.
#[derive(Debug, Serialize, PartialEq)]
pub struct CleanError {
    /// Stable tag such as `unsupported_format` or `corrupt_document`.
    pub kind: String,
    pub message: String,
}

/// Remove watermarks from an uploaded file.
///
/// # Arguments
/// * `data` - The raw bytes of the .pptx or .pdf file
/// * `filename` - The original filename (selects the format)
/// * `scrub_metadata` - Also blank author/title metadata
///
/// # Returns
/// `{ filename, mime_type, data, report }` where `data` is a `Uint8Array`,
/// or throws `{ kind, message }`.
#[wasm_bindgen]
pub fn clean_upload(data: &[u8], filename: &str, scrub_metadata: bool) -> Result<JsValue, JsValue> {
    let (result, bytes) = clean_upload_impl(data, filename, scrub_metadata).map_err(|e| {
        serde_wasm_bindgen::to_value(&e).unwrap_or_else(|_| JsValue::from_str(&e.message))
    })?;

    let value = serde_wasm_bindgen::to_value(&result)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))?;
    let array = js_sys::Uint8Array::from(bytes.as_slice());
    js_sys::Reflect::set(&value, &JsValue::from_str("data"), &array)?;
    Ok(value)
}

fn clean_upload_impl(
    data: &[u8],
    filename: &str,
    scrub_metadata: bool,
) -> Result<(CleanResult, Vec<u8>), CleanError> {
    let cleaned = Remover::new()
        .with_metadata_scrub(scrub_metadata)
        .clean_upload(data, filename)
        .map_err(|e| CleanError {
            kind: e.kind().to_string(),
            message: e.to_string(),
        })?;

    let result = CleanResult {
        filename: cleaned.filename,
        mime_type: cleaned.mime_type.to_string(),
        report: cleaned.report,
    };
    Ok((result, cleaned.bytes))
}
