//! PDF stream compression
//!
//! printpdf writes uncompressed content streams; lopdf re-saves the document
//! with every stream Flate-compressed.

use std::io::Cursor;

use crate::error::RenderError;

/// Compress all streams of a finished PDF
pub fn compress_pdf(uncompressed: Vec<u8>) -> Result<Vec<u8>, RenderError> {
    let mut doc = lopdf::Document::load_mem(&uncompressed).map_err(|e| {
        RenderError::PdfGeneration(format!("Failed to parse PDF for compression: {}", e))
    })?;

    doc.compress();

    let mut output = Cursor::new(Vec::new());
    doc.save_to(&mut output)
        .map_err(|e| RenderError::PdfGeneration(format!("Failed to save compressed PDF: {}", e)))?;

    Ok(output.into_inner())
}

/// Flate-compress a single content stream. Returns `None` when compression
/// would not make the stream smaller.
pub fn deflate_stream(content: &[u8]) -> Option<Vec<u8>> {
    let mut stream = lopdf::Stream::new(lopdf::Dictionary::new(), content.to_vec());
    if let Err(e) = stream.compress() {
        log::debug!("Stream left uncompressed: {}", e);
        return None;
    }
    stream.dict.has(b"Filter").then_some(stream.content)
}
