//! Browser-print backend
//!
//! Assembles a standalone HTML document from the request and prints it on a
//! page leased from the [`RenderPool`].

use std::sync::Arc;

use crate::config::{ImageProfile, Settings};
use crate::error::{PoolError, RenderError};
use crate::model::{EncodedImage, Orientation, PageFormat, ReportRequest};
use crate::parser::{minify_css, printable_nodes, resolve_columns, serialize_minified, Node};
use crate::pipeline::images::compress_to_data_url;
use crate::pipeline::pool::RenderPool;
use crate::render::layout::table::cell_text;

use super::MarkupBackend;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrintOptions {
    pub format: PageFormat,
    pub orientation: Orientation,
    pub margin_mm: f32,
    pub print_background: bool,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            format: PageFormat::A4,
            orientation: Orientation::Portrait,
            margin_mm: crate::config::defaults::DEFAULT_PRINT_MARGIN_MM,
            print_background: false,
        }
    }
}

/// A document ready for the browser
#[derive(Debug, Clone, PartialEq)]
pub struct PrintJob {
    pub html: String,
    pub options: PrintOptions,
}

impl PrintJob {
    pub fn from_request(request: &ReportRequest, settings: &Settings) -> Self {
        let options = PrintOptions {
            format: request.page_format,
            orientation: request.orientation,
            margin_mm: settings.browser.print_margin_mm,
            // Backgrounds are dropped when the caller asked for a small file
            print_background: !request.compress,
        };
        Self {
            html: assemble_html(request, &options, settings),
            options,
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Keep stylesheet text from closing the `<style>` element early
fn style_text(css: &str) -> String {
    css.replace("</", "<\\/")
}

/// Re-encode embedded `data:` images with the browser profile. An image that
/// fails to recompress keeps its original source.
fn recompress_images(nodes: &mut [Node], profile: ImageProfile) {
    for node in nodes {
        let Node::Element(el) = node else { continue };
        if el.name == "img" {
            if let Some((_, src)) = el
                .attrs
                .iter_mut()
                .find(|(k, v)| k.eq_ignore_ascii_case("src") && v.trim_start().starts_with("data:"))
            {
                let recompressed = EncodedImage::from_data_url(src.as_str())
                    .and_then(|image| compress_to_data_url(&image, profile));
                match recompressed {
                    Ok(url) => *src = url,
                    Err(e) => log::warn!("Keeping original image source: {}", e),
                }
            }
        }
        recompress_images(&mut el.children, profile);
    }
}

fn page_css(options: &PrintOptions) -> String {
    let mut css = format!(
        "@page {{ size: {} {}; margin: {}mm; }}\n",
        options.format.as_str(),
        options.orientation.as_str(),
        options.margin_mm
    );
    if options.print_background {
        css.push_str("html { -webkit-print-color-adjust: exact; print-color-adjust: exact; }\n");
    } else {
        css.push_str("html { -webkit-print-color-adjust: economy; print-color-adjust: economy; }\n");
    }
    css.push_str("img { max-width: 100%; page-break-inside: avoid; }\n");
    css.push_str("table { width: 100%; border-collapse: collapse; }\n");
    css.push_str("thead { display: table-header-group; }\n");
    css.push_str("tr { page-break-inside: avoid; }\n");
    css
}

fn table_html(request: &ReportRequest, settings: &Settings) -> String {
    let columns = resolve_columns(&request.rows, &settings.table.columns);
    let mut html = String::from("<table class=\"report-rows\"><thead><tr>");
    for column in &columns {
        html.push_str(&format!("<th>{}</th>", escape_text(&column.header)));
    }
    html.push_str("</tr></thead><tbody>");
    for row in &request.rows {
        html.push_str("<tr>");
        for column in &columns {
            html.push_str(&format!("<td>{}</td>", escape_text(&cell_text(column, row))));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

/// Standalone HTML document for a request
pub fn assemble_html(request: &ReportRequest, options: &PrintOptions, settings: &Settings) -> String {
    let profile = settings.images.browser;
    let mut nodes = printable_nodes(&request.markup);
    recompress_images(&mut nodes, profile);

    let mut body = serialize_minified(&nodes);
    for (i, image) in request.images.iter().enumerate() {
        match compress_to_data_url(image, profile) {
            Ok(url) => body.push_str(&format!("<img src=\"{}\" alt=\"chart {}\">", url, i + 1)),
            Err(e) => log::warn!("Skipping image {}: {}", i, e),
        }
    }
    if !request.rows.is_empty() {
        body.push_str(&table_html(request, settings));
    }

    let css = minify_css(&format!("{}{}", page_css(options), request.stylesheet));
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{}</title><style>{}</style></head><body>{}</body></html>",
        escape_text(&request.title),
        style_text(&css),
        body
    )
}

/// Prints through pooled browser pages
pub struct BrowserPrintBackend {
    pool: Arc<RenderPool>,
}

impl BrowserPrintBackend {
    pub fn new(pool: Arc<RenderPool>) -> Self {
        Self { pool }
    }

    /// Fail fast when the pool cannot serve pages
    pub fn ensure_available(&self) -> Result<(), PoolError> {
        let health = self.pool.health();
        if health.is_healthy() {
            Ok(())
        } else {
            Err(PoolError::Unavailable(format!(
                "render pool is {:?}",
                health.state
            )))
        }
    }
}

impl MarkupBackend for BrowserPrintBackend {
    async fn print(&self, job: PrintJob) -> Result<Vec<u8>, RenderError> {
        let mut lease = self
            .pool
            .acquire()
            .await
            .map_err(|e| RenderError::Browser(e.to_string()))?;
        let bytes = lease.print(job).await?;
        if !bytes.starts_with(b"%PDF") {
            return Err(RenderError::Browser("browser output is not a PDF".into()));
        }
        log::debug!("Browser printed {} bytes", bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Record, Scalar};
    use crate::pipeline::pool::tests::FakeEngine;
    use std::io::Cursor;

    fn png_data_url(width: u32, height: u32) -> String {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([0, 90, 200]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        let mut image = EncodedImage::new(out.into_inner());
        image.media_type = Some("image/png".into());
        image.to_data_url()
    }

    fn request(markup: &str) -> ReportRequest {
        ReportRequest {
            markup: markup.to_string(),
            stylesheet: "h1 { color: red; }".to_string(),
            ..ReportRequest::default()
        }
    }

    #[test]
    fn test_page_rule_and_stylesheet() {
        let mut req = request("<h1>Sales</h1>");
        req.orientation = Orientation::Landscape;
        let job = PrintJob::from_request(&req, &Settings::default());

        assert!(job.html.contains("@page{size: A4 landscape;margin: 10mm;}"));
        assert!(job.html.contains("h1{color: red;}"));
        assert!(job.html.contains("<h1>Sales</h1>"));
        assert!(!job.options.print_background);
    }

    #[test]
    fn test_uncompressed_prints_backgrounds() {
        let mut req = request("<p>x</p>");
        req.compress = false;
        let job = PrintJob::from_request(&req, &Settings::default());
        assert!(job.options.print_background);
        assert!(job.html.contains("print-color-adjust: exact"));
    }

    #[test]
    fn test_markup_and_stylesheet_minified() {
        let mut req = request("<section>\n  <!-- draft -->\n  <h1>Q3\n   Sales</h1>\n</section>");
        req.stylesheet = "/* brand */\nh1 {\n  color: red;\n}\n".to_string();
        let job = PrintJob::from_request(&req, &Settings::default());

        assert!(job.html.contains("<section> <h1>Q3 Sales</h1> </section>"));
        assert!(job.html.contains("h1{color: red;}"));
        assert!(!job.html.contains("draft"));
        assert!(!job.html.contains("brand"));
        assert!(!job.html.contains('\n'));
    }

    #[test]
    fn test_stylesheet_cannot_close_style_element() {
        let mut req = request("<p>body</p>");
        req.stylesheet = "p { color: red; }</style><script>alert(1)</script><style>".to_string();
        let job = PrintJob::from_request(&req, &Settings::default());

        assert_eq!(job.html.matches("</style>").count(), 1);
        assert!(job.html.contains("<\\/style>"));
        assert!(!job.html.contains("</script>"));
    }

    #[test]
    fn test_excluded_elements_removed() {
        let job = PrintJob::from_request(
            &request("<div class=\"no-export\">menu</div><p data-pdf-exclude>x</p><p>kept</p>"),
            &Settings::default(),
        );
        assert!(!job.html.contains("menu"));
        assert!(job.html.contains("<p>kept</p>"));
    }

    #[test]
    fn test_embedded_images_recompressed() {
        let markup = format!("<img src=\"{}\">", png_data_url(900, 300));
        let job = PrintJob::from_request(&request(&markup), &Settings::default());
        assert!(job.html.contains("src=\"data:image/jpeg;base64,"));
        assert!(!job.html.contains("data:image/png"));
    }

    #[test]
    fn test_rows_become_table() {
        let mut row = Record::new();
        row.insert("id".into(), Scalar::Text("7".into()));
        row.insert("status".into(), Scalar::Text("<paid>".into()));
        let mut req = request("");
        req.rows = vec![row];

        let job = PrintJob::from_request(&req, &Settings::default());
        assert!(job.html.contains("<th>Status</th>"));
        assert!(job.html.contains("<td>&lt;paid&gt;</td>"));
    }

    #[tokio::test]
    async fn test_prints_through_pool() {
        let pool = Arc::new(RenderPool::new(Arc::new(FakeEngine::default()), 1));
        let backend = BrowserPrintBackend::new(pool.clone());
        assert!(backend.ensure_available().is_err());

        pool.init().await.unwrap();
        backend.ensure_available().unwrap();
        let job = PrintJob::from_request(&request("<p>hello</p>"), &Settings::default());
        let pdf = backend.print(job).await.unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }
}
