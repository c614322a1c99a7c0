//! Report export service
//!
//! Validates a request, consults the output cache, runs the selected backend
//! and shapes the outcome as an [`ExportResponse`]. Transport (HTTP routing,
//! download handling) is left to the caller.

pub mod response;

use std::sync::Arc;

pub use response::ExportResponse;

use crate::config::Settings;
use crate::error::{ReportError, RenderError};
use crate::model::{LayoutBlock, ReportRequest, WireRequest};
use crate::parser::normalize;
use crate::pipeline::{cache_key, compress_all, reduce, OutputCache, RenderPool};
use crate::render::backends::{
    spawn_stream, BackendKind, BrowserPrintBackend, DocumentStream, MarkupBackend, PrintJob,
    StreamJob, VectorBackend,
};
use crate::render::{render_blocks, PageGeometry};

/// Which export surface a request arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Full request: markup, stylesheet, images and rows
    Document(BackendKind),
    /// `{ charts, rows }` only; vector and streaming backends
    Charts(BackendKind),
}

impl Endpoint {
    pub fn backend(&self) -> BackendKind {
        match self {
            Endpoint::Document(backend) | Endpoint::Charts(backend) => *backend,
        }
    }
}

/// Layout blocks with images already compressed, plus the page geometry
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub blocks: Vec<LayoutBlock>,
    pub geometry: PageGeometry,
}

/// Output of a successful export
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub cache_hit: bool,
}

/// Decode a JSON request body
pub fn parse_body(body: &[u8]) -> Result<ReportRequest, ReportError> {
    let wire: WireRequest = serde_json::from_slice(body)
        .map_err(|e| ReportError::Input(format!("Invalid request body: {}", e)))?;
    Ok(ReportRequest::from_wire(wire))
}

/// Apply the endpoint's input rules
pub fn validate(endpoint: Endpoint, mut request: ReportRequest) -> Result<ReportRequest, ReportError> {
    match endpoint {
        Endpoint::Document(_) => {
            if request.markup.trim().is_empty() || request.stylesheet.trim().is_empty() {
                return Err(ReportError::Input("HTML and CSS required".into()));
            }
        }
        Endpoint::Charts(backend) => {
            if !backend.uses_layout() {
                return Err(ReportError::Input(format!(
                    "Charts export is not available on the {} backend",
                    backend.as_str()
                )));
            }
            request.markup.clear();
            request.stylesheet.clear();
            if request.submitted_assets() == 0 {
                return Err(ReportError::Input("No charts or table data provided".into()));
            }
        }
    }

    if request.submitted_assets() > 0 && request.images.is_empty() && request.rows.is_empty() {
        return Err(ReportError::Asset(
            "None of the submitted charts or rows could be read".into(),
        ));
    }
    Ok(request)
}

/// Normalize and compress a request for a layout-driven backend
pub fn prepare(
    request: &ReportRequest,
    settings: &Settings,
    backend: BackendKind,
) -> Result<PreparedDocument, ReportError> {
    let normalized = normalize(request, settings);
    let (blocks, dropped) = compress_all(normalized.blocks, settings.images.for_backend(backend));

    let images = blocks
        .iter()
        .filter(|b| matches!(b, LayoutBlock::Image(_)))
        .count();
    if request.submitted_assets() > 0 && images == 0 && request.rows.is_empty() {
        return Err(ReportError::Asset(
            "None of the submitted charts or rows could be read".into(),
        ));
    }
    if dropped > 0 || normalized.skipped_assets > 0 {
        log::warn!(
            "Continuing without {} unusable images",
            dropped + normalized.skipped_assets
        );
    }

    let (width, height) = request.page_size_pt();
    Ok(PreparedDocument {
        blocks,
        geometry: PageGeometry::new(width, height, settings.margin),
    })
}

/// Render a request on the vector builder, synchronously and uncached
pub fn render_vector(request: &ReportRequest, settings: &Settings) -> Result<Vec<u8>, ReportError> {
    let prepared = prepare(request, settings, BackendKind::Vector)?;
    let backend = VectorBackend::new(&request.title, prepared.geometry);
    Ok(render_blocks(
        &prepared.blocks,
        prepared.geometry,
        settings,
        backend,
    )?)
}

fn aborted(err: tokio::task::JoinError) -> ReportError {
    ReportError::Backend(RenderError::TaskAborted(err.to_string()))
}

pub struct ReportService {
    settings: Arc<Settings>,
    cache: Arc<OutputCache>,
    pool: Option<Arc<RenderPool>>,
}

impl ReportService {
    /// Service with the layout-driven backends only
    pub fn new(settings: Settings) -> Self {
        let cache = Arc::new(OutputCache::new(&settings.cache));
        Self {
            settings: Arc::new(settings),
            cache,
            pool: None,
        }
    }

    pub fn with_pool(mut self, pool: Arc<RenderPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Start a headless Chromium pool. A failed start leaves the browser
    /// backend reporting unavailable; the other backends are unaffected.
    pub async fn with_chromium(self) -> Self {
        let pool = Arc::new(RenderPool::chromium(&self.settings.browser));
        if let Err(e) = pool.init().await {
            log::warn!("Browser-print backend unavailable: {}", e);
        }
        self.with_pool(pool)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &OutputCache {
        &self.cache
    }

    pub fn pool(&self) -> Option<&Arc<RenderPool>> {
        self.pool.as_ref()
    }

    /// Handle a JSON request body and produce a response
    pub async fn handle(&self, endpoint: Endpoint, body: &[u8]) -> ExportResponse {
        let result = match parse_body(body) {
            Ok(request) => self.export(endpoint, request).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(rendered) => ExportResponse::pdf(rendered.bytes, rendered.cache_hit),
            Err(e) => {
                if e.status_code() >= 500 {
                    log::error!("PDF generation error: {}", e);
                } else {
                    log::warn!("Rejected request: {}", e);
                }
                ExportResponse::error(&e)
            }
        }
    }

    /// Render a request, serving from the cache when possible
    pub async fn export(
        &self,
        endpoint: Endpoint,
        request: ReportRequest,
    ) -> Result<Rendered, ReportError> {
        let backend = endpoint.backend();
        let request = validate(endpoint, request)?;

        let key = cache_key(&request, backend);
        if let Some(bytes) = self.cache.get(&key) {
            log::info!("Serving {} PDF from cache", backend.as_str());
            return Ok(Rendered {
                bytes,
                cache_hit: true,
            });
        }

        let bytes = match backend {
            BackendKind::Vector => {
                let settings = self.settings.clone();
                tokio::task::spawn_blocking(move || render_vector(&request, &settings))
                    .await
                    .map_err(aborted)??
            }
            BackendKind::Streaming => self.start_stream(request, None).await?.collect().await?,
            BackendKind::BrowserPrint => self.print(request).await?,
        };

        log::info!("Rendered {} PDF ({} bytes)", backend.as_str(), bytes.len());
        self.cache.put(key, bytes.clone());
        Ok(Rendered {
            bytes,
            cache_hit: false,
        })
    }

    /// Render on the streaming builder and return the output as it is produced.
    ///
    /// The finished document is cached even if the consumer stops reading.
    pub async fn render_stream(
        &self,
        endpoint: Endpoint,
        request: ReportRequest,
    ) -> Result<DocumentStream, ReportError> {
        if endpoint.backend() != BackendKind::Streaming {
            return Err(ReportError::Input(
                "Streamed output requires the streaming backend".into(),
            ));
        }
        let request = validate(endpoint, request)?;
        let key = cache_key(&request, BackendKind::Streaming);
        if let Some(bytes) = self.cache.get(&key) {
            return Ok(DocumentStream::from_document(
                bytes,
                self.settings.stream.chunk_size,
            ));
        }

        let cache = self.cache.clone();
        let on_complete: Box<dyn FnOnce(&[u8]) + Send> =
            Box::new(move |document: &[u8]| cache.put(key, document.to_vec()));
        self.start_stream(request, Some(on_complete)).await
    }

    async fn start_stream(
        &self,
        request: ReportRequest,
        on_complete: Option<Box<dyn FnOnce(&[u8]) + Send>>,
    ) -> Result<DocumentStream, ReportError> {
        let settings = self.settings.clone();
        let title = request.title.clone();
        let prepared = tokio::task::spawn_blocking(move || {
            prepare(&request, &settings, BackendKind::Streaming)
        })
        .await
        .map_err(aborted)??;

        Ok(spawn_stream(StreamJob {
            title,
            blocks: prepared.blocks,
            geometry: prepared.geometry,
            settings: (*self.settings).clone(),
            retain: on_complete.is_some(),
            on_complete,
        }))
    }

    async fn print(&self, request: ReportRequest) -> Result<Vec<u8>, ReportError> {
        let pool = self.pool.as_ref().ok_or_else(|| {
            ReportError::Unavailable("browser-print backend is not configured".into())
        })?;
        let backend = BrowserPrintBackend::new(pool.clone());
        backend.ensure_available()?;

        let compress = request.compress;
        let settings = self.settings.clone();
        let job = tokio::task::spawn_blocking(move || PrintJob::from_request(&request, &settings))
            .await
            .map_err(aborted)?;

        let bytes = backend.print(job).await?;
        if !compress {
            return Ok(bytes);
        }
        Ok(reduce(bytes, self.settings.compaction.clone()).await?)
    }

    /// Stop the browser pool, if any
    pub async fn shutdown(&self) {
        if let Some(pool) = &self.pool {
            pool.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EncodedImage;
    use crate::pipeline::pool::tests::FakeEngine;
    use serde_json::json;
    use std::io::Cursor;

    fn png_data_url(width: u32, height: u32) -> String {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([20, 140, 60]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        let mut image = EncodedImage::new(out.into_inner());
        image.media_type = Some("image/png".into());
        image.to_data_url()
    }

    fn rows(n: usize) -> Vec<serde_json::Value> {
        (0..n)
            .map(|i| {
                json!({
                    "id": i,
                    "customer": format!("Customer {}", i),
                    "email": format!("c{}@example.com", i),
                    "amount": 10.5,
                    "status": if i % 2 == 0 { "paid" } else { "pending" },
                    "date": "2024-01-01",
                })
            })
            .collect()
    }

    fn body(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    fn error_message(response: &ExportResponse) -> String {
        let value: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        value["error"].as_str().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn test_document_requires_markup_and_css() {
        let service = ReportService::new(Settings::default());
        let response = service
            .handle(
                Endpoint::Document(BackendKind::Vector),
                &body(json!({ "html": "<p>x</p>" })),
            )
            .await;
        assert_eq!(response.status, 400);
        assert_eq!(error_message(&response), "HTML and CSS required");
    }

    #[tokio::test]
    async fn test_charts_requires_data() {
        let service = ReportService::new(Settings::default());
        let response = service
            .handle(Endpoint::Charts(BackendKind::Vector), &body(json!({ "charts": [] })))
            .await;
        assert_eq!(response.status, 400);
        assert_eq!(error_message(&response), "No charts or table data provided");
    }

    #[tokio::test]
    async fn test_charts_rejects_browser_print() {
        let service = ReportService::new(Settings::default());
        let response = service
            .handle(
                Endpoint::Charts(BackendKind::BrowserPrint),
                &body(json!({ "rows": rows(1) })),
            )
            .await;
        assert_eq!(response.status, 400);
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let service = ReportService::new(Settings::default());
        let response = service
            .handle(Endpoint::Charts(BackendKind::Vector), b"{not json")
            .await;
        assert_eq!(response.status, 400);
        assert!(error_message(&response).starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn test_all_assets_failed() {
        let service = ReportService::new(Settings::default());
        let response = service
            .handle(
                Endpoint::Charts(BackendKind::Vector),
                &body(json!({ "charts": ["data:image/png;base64,!!!"], "rows": [1, 2] })),
            )
            .await;
        assert_eq!(response.status, 400);
    }

    #[tokio::test]
    async fn test_undecodable_images_fail_when_nothing_else_survives() {
        let service = ReportService::new(Settings::default());
        // Valid base64, not an image
        let response = service
            .handle(
                Endpoint::Charts(BackendKind::Vector),
                &body(json!({ "charts": ["data:image/png;base64,aGVsbG8="] })),
            )
            .await;
        assert_eq!(response.status, 400);
    }

    #[tokio::test]
    async fn test_vector_export_and_cache_hit() {
        let service = ReportService::new(Settings::default());
        let request = body(json!({
            "charts": [png_data_url(400, 200)],
            "rows": rows(5),
        }));

        let first = service.handle(Endpoint::Charts(BackendKind::Vector), &request).await;
        assert_eq!(first.status, 200);
        assert_eq!(first.header("X-Cache"), Some("MISS"));
        assert!(lopdf::Document::load_mem(&first.body).is_ok());

        let second = service.handle(Endpoint::Charts(BackendKind::Vector), &request).await;
        assert_eq!(second.header("X-Cache"), Some("HIT"));
        assert_eq!(first.body, second.body);
        assert_eq!(service.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_backends_cache_separately() {
        let service = ReportService::new(Settings::default());
        let request = body(json!({ "rows": rows(3) }));
        service.handle(Endpoint::Charts(BackendKind::Vector), &request).await;
        let streamed = service
            .handle(Endpoint::Charts(BackendKind::Streaming), &request)
            .await;
        assert_eq!(streamed.header("X-Cache"), Some("MISS"));
        assert_eq!(service.cache().len(), 2);
    }

    #[tokio::test]
    async fn test_streaming_export() {
        let service = ReportService::new(Settings::default());
        let response = service
            .handle(
                Endpoint::Document(BackendKind::Streaming),
                &body(json!({
                    "markup": "<h1>Quarterly</h1><p>Summary</p>",
                    "stylesheet": "h1 { color: #333; }",
                    "rows": rows(80),
                })),
            )
            .await;
        assert_eq!(response.status, 200);
        let doc = lopdf::Document::load_mem(&response.body).unwrap();
        assert!(doc.get_pages().len() >= 3);
    }

    #[tokio::test]
    async fn test_render_stream_populates_cache() {
        let service = ReportService::new(Settings::default());
        let request = parse_body(&body(json!({ "rows": rows(10) }))).unwrap();

        let stream = service
            .render_stream(Endpoint::Charts(BackendKind::Streaming), request.clone())
            .await
            .unwrap();
        let bytes = stream.collect().await.unwrap();
        assert_eq!(service.cache().len(), 1);

        let cached = service
            .render_stream(Endpoint::Charts(BackendKind::Streaming), request)
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();
        assert_eq!(bytes, cached);
    }

    #[tokio::test]
    async fn test_browser_without_pool_is_unavailable() {
        let service = ReportService::new(Settings::default());
        let response = service
            .handle(
                Endpoint::Document(BackendKind::BrowserPrint),
                &body(json!({ "html": "<p>x</p>", "css": "p {}" })),
            )
            .await;
        assert_eq!(response.status, 500);
        assert_eq!(error_message(&response), "PDF backend unavailable");
    }

    #[tokio::test]
    async fn test_browser_print_through_pool() {
        let pool = Arc::new(RenderPool::new(Arc::new(FakeEngine::default()), 2));
        pool.init().await.unwrap();
        let service = ReportService::new(Settings::default()).with_pool(pool);

        let response = service
            .handle(
                Endpoint::Document(BackendKind::BrowserPrint),
                &body(json!({ "html": "<p>hello</p>", "css": "p { color: red; }", "compress": false })),
            )
            .await;
        assert_eq!(response.status, 200);
        assert!(response.body.starts_with(b"%PDF"));

        service.shutdown().await;
        let response = service
            .handle(
                Endpoint::Document(BackendKind::BrowserPrint),
                &body(json!({ "html": "<p>other</p>", "css": "p {}" })),
            )
            .await;
        assert_eq!(response.status, 500);
    }
}
