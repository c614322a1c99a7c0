use anyhow::{Context, Result};
use clap::Parser;
use std::fs;

use report_pdf::cli::Args;
use report_pdf::config::Settings;
use report_pdf::model::{ReportRequest, WireRequest};
use report_pdf::render::BackendKind;
use report_pdf::service::{Endpoint, ReportService};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    // Read input file
    let body = fs::read(&args.input)
        .with_context(|| format!("Failed to read input file: {}", args.input.display()))?;
    let wire: WireRequest =
        serde_json::from_slice(&body).with_context(|| "Failed to parse request JSON")?;

    let mut request = ReportRequest::from_wire(wire);
    if let Some(format) = args.page_size {
        request.page_format = format;
    }
    if let Some(orientation) = args.orientation {
        request.orientation = orientation;
    }

    log::info!(
        "Loaded request with {} images and {} rows",
        request.images.len(),
        request.rows.len()
    );

    let settings = Settings::from_args(&args).map_err(|e| anyhow::anyhow!("{}", e))?;

    let mut service = ReportService::new(settings);
    if args.backend == BackendKind::BrowserPrint {
        service = service.with_chromium().await;
    }

    let endpoint = if args.charts_only {
        Endpoint::Charts(args.backend)
    } else {
        Endpoint::Document(args.backend)
    };

    let result = service.export(endpoint, request).await;
    service.shutdown().await;
    let rendered = result
        .with_context(|| format!("Failed to generate PDF with the {} backend", args.backend.as_str()))?;

    // Write output
    let output_path = args.output_path();
    fs::write(&output_path, &rendered.bytes)
        .with_context(|| format!("Failed to write output file: {}", output_path.display()))?;

    println!("Successfully wrote PDF to {}", output_path.display());

    Ok(())
}
