use std::fs;
use std::io::Cursor;
use std::path::PathBuf;
use std::process::Command;

use report_pdf::config::Settings;
use report_pdf::model::{EncodedImage, ImageBlock, LayoutBlock, ReportRequest, WireRequest};
use report_pdf::parser::normalize;
use report_pdf::pipeline::reducer;
use report_pdf::render::layout::{layout_document, PageGeometry, PlacementKind};
use report_pdf::service::{prepare, Endpoint, ReportService};
use report_pdf::{render_report, BackendKind};

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_fixture(name: &str) -> ReportRequest {
    let content = fs::read(fixtures_path().join(name)).expect("Failed to read fixture");
    let wire: WireRequest = serde_json::from_slice(&content).expect("Failed to parse fixture");
    ReportRequest::from_wire(wire)
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

fn page_count(bytes: &[u8]) -> usize {
    lopdf::Document::load_mem(bytes)
        .expect("Output is not a readable PDF")
        .get_pages()
        .len()
}

#[test]
fn test_parse_fixture() {
    let request = load_fixture("sales_report.json");
    assert_eq!(request.title, "Quarterly Sales Report");
    assert_eq!(request.rows.len(), 60);
    assert!(request.markup.contains("<h1>"));
    assert!(request.stylesheet.contains(".lead"));
    assert_eq!(request.discarded_assets, 0);
}

#[test]
fn test_normalize_fixture() {
    let request = load_fixture("sales_report.json");
    let normalized = normalize(&request, &Settings::default());

    let texts: Vec<&str> = normalized
        .blocks
        .iter()
        .filter_map(|b| match b {
            LayoutBlock::Text(t) => Some(t.content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(texts[0], "Quarterly Sales Report");
    assert!(texts.contains(&"Quarterly Sales"));
    assert!(texts.contains(&"Revenue grew 12% over the previous quarter."));
    assert!(texts.contains(&"North region led growth"));
    assert!(!texts.iter().any(|t| t.contains("Dashboard")));
    assert!(!texts.iter().any(|t| t.contains("Export controls")));

    assert!(normalized
        .blocks
        .iter()
        .any(|b| matches!(b, LayoutBlock::LineBreak)));
    assert!(matches!(normalized.blocks.last(), Some(LayoutBlock::Table(_))));
}

#[test]
fn test_empty_request_is_single_title_page() {
    let pdf = render_report(&ReportRequest::default(), &Settings::default())
        .expect("Failed to generate PDF");
    assert!(pdf.starts_with(b"%PDF"));
    assert_eq!(page_count(&pdf), 1);
}

#[test]
fn test_table_header_repeats_and_no_row_lost() {
    let mut request = load_fixture("sales_report.json");
    let more = request.rows.clone();
    request.rows.extend(more);
    let settings = Settings::default();

    let prepared = prepare(&request, &settings, BackendKind::Vector).unwrap();
    let layout = layout_document(&prepared.blocks, prepared.geometry, &settings);
    assert!(layout.page_count() >= 3);

    let mut rows_seen = Vec::new();
    for page in &layout.pages {
        let table: Vec<&PlacementKind> = page
            .placements
            .iter()
            .filter(|p| matches!(p.kind, PlacementKind::TableHeader | PlacementKind::TableRow { .. }))
            .map(|p| &p.kind)
            .collect();
        if table.is_empty() {
            continue;
        }
        assert_eq!(table[0], &PlacementKind::TableHeader, "page {}", page.number);
        assert!(table.len() >= 2, "page {} has a header without rows", page.number);
        for kind in table {
            if let PlacementKind::TableRow { row } = kind {
                rows_seen.push(*row);
            }
        }
    }
    let expected: Vec<usize> = (0..120).collect();
    assert_eq!(rows_seen, expected);
}

#[test]
fn test_oversized_image_gets_own_page() {
    let settings = Settings::default();
    let geometry = PageGeometry::new(595.28, 841.89, settings.margin);
    let tall = ImageBlock {
        bytes: png(10, 10),
        intrinsic_width: 100,
        intrinsic_height: 1000,
    };
    let blocks = vec![
        LayoutBlock::text("Before"),
        LayoutBlock::Image(tall),
        LayoutBlock::text("After"),
    ];

    let layout = layout_document(&blocks, geometry, &settings);
    assert_eq!(layout.page_count(), 3);
    let image_page = &layout.pages[1];
    assert_eq!(image_page.placements.len(), 1);
    assert_eq!(image_page.placements[0].kind, PlacementKind::Image);
    let placed = &image_page.placements[0];
    assert!((placed.width - geometry.usable_width()).abs() < 0.01);
    assert!((placed.height - geometry.usable_width() * 10.0).abs() < 0.01);
    assert!(placed.height > geometry.usable_height());
}

#[test]
fn test_column_widths_fill_usable_width() {
    let request = load_fixture("sales_report.json");
    let settings = Settings::default();
    let prepared = prepare(&request, &settings, BackendKind::Vector).unwrap();
    let layout = layout_document(&prepared.blocks, prepared.geometry, &settings);

    for widths in layout.column_widths.values() {
        let total: f32 = widths.iter().sum();
        assert!((total - prepared.geometry.usable_width()).abs() < 0.01);
    }
    assert_eq!(layout.column_widths.len(), 1);
}

#[test]
fn test_layout_is_deterministic() {
    let request = load_fixture("sales_report.json");
    let settings = Settings::default();
    let prepared = prepare(&request, &settings, BackendKind::Vector).unwrap();
    let first = layout_document(&prepared.blocks, prepared.geometry, &settings);
    let second = layout_document(&prepared.blocks, prepared.geometry, &settings);
    assert_eq!(first, second);
}

#[test]
fn test_landscape_changes_pagination() {
    let mut request = load_fixture("sales_report.json");
    let settings = Settings::default();
    let portrait = prepare(&request, &settings, BackendKind::Vector).unwrap();
    request.orientation = report_pdf::model::Orientation::Landscape;
    let landscape = prepare(&request, &settings, BackendKind::Vector).unwrap();

    assert!(landscape.geometry.width > landscape.geometry.height);
    let p = layout_document(&portrait.blocks, portrait.geometry, &settings);
    let l = layout_document(&landscape.blocks, landscape.geometry, &settings);
    assert!(l.page_count() > p.page_count());
}

#[tokio::test]
async fn test_vector_and_streaming_agree_on_pages() {
    let request = load_fixture("sales_report.json");
    let service = ReportService::new(Settings::default());

    let vector = service
        .export(Endpoint::Document(BackendKind::Vector), request.clone())
        .await
        .expect("Vector export failed");
    let streamed = service
        .export(Endpoint::Document(BackendKind::Streaming), request)
        .await
        .expect("Streaming export failed");

    assert!(!vector.cache_hit && !streamed.cache_hit);
    assert_eq!(page_count(&vector.bytes), page_count(&streamed.bytes));
}

#[tokio::test]
async fn test_charts_with_images_and_rows() {
    let mut request = ReportRequest::default();
    for _ in 0..3 {
        let mut image = EncodedImage::new(png(600, 300));
        image.media_type = Some("image/png".into());
        request.images.push(image);
    }
    request.rows = load_fixture("sales_report.json").rows;

    let service = ReportService::new(Settings::default());
    let rendered = service
        .export(Endpoint::Charts(BackendKind::Vector), request.clone())
        .await
        .unwrap();
    assert!(page_count(&rendered.bytes) >= 3);

    let again = service
        .export(Endpoint::Charts(BackendKind::Vector), request)
        .await
        .unwrap();
    assert!(again.cache_hit);
    assert_eq!(again.bytes, rendered.bytes);
}

#[tokio::test]
async fn test_compaction_without_tool_keeps_original() {
    let bytes = vec![b'x'; 6 * 1024 * 1024];
    let mut compaction = Settings::default().compaction;
    compaction.binary = PathBuf::from("/nonexistent/gs");

    let out = reducer::reduce(bytes.clone(), compaction).await.unwrap();
    assert_eq!(out.len(), bytes.len());
    assert_eq!(out, bytes);
}

#[test]
fn test_cli_writes_pdf() {
    let output_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = output_dir.path().join("report.pdf");

    let status = Command::new(env!("CARGO_BIN_EXE_report-pdf"))
        .arg(fixtures_path().join("sales_report.json"))
        .args(["--backend", "streaming", "-o"])
        .arg(&output)
        .status()
        .expect("Failed to run report-pdf");
    assert!(status.success());

    let bytes = fs::read(&output).expect("PDF not written");
    assert!(page_count(&bytes) >= 2);
}
