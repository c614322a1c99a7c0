use serde::Serialize;

use crate::error::ReportError;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const PDF_DISPOSITION: &str = "attachment; filename=\"report.pdf\"";

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

/// Transport-agnostic response for an export call
#[derive(Debug, Clone, PartialEq)]
pub struct ExportResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ExportResponse {
    pub fn pdf(bytes: Vec<u8>, cache_hit: bool) -> Self {
        Self {
            status: 200,
            headers: vec![
                ("Content-Type".to_string(), PDF_CONTENT_TYPE.to_string()),
                ("Content-Disposition".to_string(), PDF_DISPOSITION.to_string()),
                (
                    "X-Cache".to_string(),
                    if cache_hit { "HIT" } else { "MISS" }.to_string(),
                ),
            ],
            body: bytes,
        }
    }

    /// JSON `{ "error": ... }` body. Server errors carry only a generic message.
    pub fn error(err: &ReportError) -> Self {
        let message = err.public_message();
        let body = serde_json::to_vec(&ErrorBody { error: &message })
            .unwrap_or_else(|_| b"{\"error\":\"Internal error\"}".to_vec());
        Self {
            status: err.status_code(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}
