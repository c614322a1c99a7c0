pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod render;
pub mod service;

pub use config::Settings;
pub use error::{RenderError, ReportError};
pub use model::{ReportRequest, WireRequest};
pub use render::BackendKind;
pub use service::{Endpoint, ExportResponse, ReportService};

/// Render a report to PDF bytes on the vector builder.
///
/// This is the simplest entry point for library consumers: no cache, no
/// browser, no endpoint rules. A request with no markup, images or rows still
/// produces a one-page document carrying the title.
///
/// # Example
///
/// ```no_run
/// use report_pdf::{render_report, ReportRequest, Settings, WireRequest};
///
/// let json = std::fs::read("request.json").unwrap();
/// let wire: WireRequest = serde_json::from_slice(&json).unwrap();
/// let request = ReportRequest::from_wire(wire);
///
/// let pdf_bytes = render_report(&request, &Settings::default()).unwrap();
/// std::fs::write("report.pdf", pdf_bytes).unwrap();
/// ```
pub fn render_report(request: &ReportRequest, settings: &Settings) -> Result<Vec<u8>, ReportError> {
    service::render_vector(request, settings)
}
