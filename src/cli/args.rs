use clap::Parser;
use std::path::PathBuf;

use crate::model::{Orientation, PageFormat, TableColumn};
use crate::render::backends::BackendKind;

#[derive(Parser, Debug)]
#[command(name = "report-pdf")]
#[command(
    author,
    version,
    about = "Render a report request (charts, rows, markup) into a paginated PDF"
)]
pub struct Args {
    /// Request JSON file path
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output PDF file path (defaults to input with .pdf extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Rendering backend
    #[arg(short = 'b', long, value_enum, default_value = "vector")]
    pub backend: BackendKind,

    /// Treat the input as a charts-only request ({ "charts": [...], "rows": [...] })
    #[arg(long)]
    pub charts_only: bool,

    /// Page size (overrides the request)
    #[arg(short = 's', long, value_enum)]
    pub page_size: Option<PageFormat>,

    /// Page orientation (overrides the request)
    #[arg(long, value_enum)]
    pub orientation: Option<Orientation>,

    /// Page margin in points
    #[arg(short = 'm', long)]
    pub margin: Option<f32>,

    /// Table row height in points
    #[arg(long)]
    pub row_height: Option<f32>,

    /// Table columns as "Header:key:width,..." (e.g. "ID:id:50,Email:email:200")
    #[arg(long)]
    pub columns: Option<String>,

    /// Headless browser binary for the browser-print backend
    #[arg(long)]
    pub browser: Option<PathBuf>,

    /// Ghostscript-compatible binary used to compact large output
    #[arg(long)]
    pub gs: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Get the output path, defaulting to input with .pdf extension
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.input.with_extension("pdf"))
    }
}

/// Parse a column specification: "Header:key:width,Header:key:width"
///
/// The width may be omitted ("Header:key"), in which case 100pt is used.
pub fn parse_column_spec(spec: &str) -> Result<Vec<TableColumn>, String> {
    let mut columns = Vec::new();

    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let fields: Vec<&str> = part.split(':').map(str::trim).collect();
        let (header, key, width) = match fields.as_slice() {
            [header, key] => (*header, *key, 100.0),
            [header, key, width] => {
                let width: f32 = width
                    .parse()
                    .map_err(|_| format!("Invalid width: {}", width))?;
                (*header, *key, width)
            }
            _ => return Err(format!("Invalid column: {}", part)),
        };

        if key.is_empty() {
            return Err(format!("Missing field key: {}", part));
        }
        if width <= 0.0 {
            return Err(format!("Width must be positive: {}", part));
        }
        columns.push(TableColumn::new(header, key, width));
    }

    if columns.is_empty() {
        return Err("No columns given".to_string());
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_column() {
        let result = parse_column_spec("ID:id:50").unwrap();
        assert_eq!(result, vec![TableColumn::new("ID", "id", 50.0)]);
    }

    #[test]
    fn test_parse_default_width() {
        let result = parse_column_spec("Status:status").unwrap();
        assert_eq!(result[0].width, 100.0);
    }

    #[test]
    fn test_parse_mixed() {
        let result = parse_column_spec("ID:id:50, Email:email:200 ,Date:date").unwrap();
        let keys: Vec<&str> = result.iter().map(|c| c.field_key.as_str()).collect();
        assert_eq!(keys, vec!["id", "email", "date"]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_column_spec("").is_err());
        assert!(parse_column_spec("ID").is_err());
        assert!(parse_column_spec("ID:id:wide").is_err());
        assert!(parse_column_spec("ID:id:-5").is_err());
    }

    #[test]
    fn test_output_path_default() {
        let args = Args::parse_from(["report-pdf", "request.json"]);
        assert_eq!(args.output_path(), PathBuf::from("request.pdf"));
        assert_eq!(args.backend, BackendKind::Vector);
    }
}
