//! Report request model
//!
//! `WireRequest` mirrors the JSON body sent by the dashboard. `ReportRequest`
//! is the accepted, immutable form: images are decoded and rows are coerced
//! into ordered records.

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use clap::ValueEnum;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::AssetError;

/// Paper format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Deserialize)]
#[serde(try_from = "String")]
pub enum PageFormat {
    A3,
    #[default]
    A4,
    A5,
    Letter,
    Legal,
    Tabloid,
}

impl PageFormat {
    /// Portrait dimensions in points (width, height)
    pub fn dimensions_pt(&self) -> (f32, f32) {
        match self {
            PageFormat::A3 => (841.89, 1190.55),
            PageFormat::A4 => (595.28, 841.89),
            PageFormat::A5 => (419.53, 595.28),
            PageFormat::Letter => (612.0, 792.0),
            PageFormat::Legal => (612.0, 1008.0),
            PageFormat::Tabloid => (792.0, 1224.0),
        }
    }

    /// Name as used in CSS `@page { size: ... }`
    pub fn as_str(&self) -> &'static str {
        match self {
            PageFormat::A3 => "A3",
            PageFormat::A4 => "A4",
            PageFormat::A5 => "A5",
            PageFormat::Letter => "Letter",
            PageFormat::Legal => "Legal",
            PageFormat::Tabloid => "Tabloid",
        }
    }
}

impl TryFrom<String> for PageFormat {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "a3" => Ok(PageFormat::A3),
            "a4" => Ok(PageFormat::A4),
            "a5" => Ok(PageFormat::A5),
            "letter" => Ok(PageFormat::Letter),
            "legal" => Ok(PageFormat::Legal),
            "tabloid" => Ok(PageFormat::Tabloid),
            other => Err(format!("unsupported page format: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
        }
    }

    /// Apply to portrait dimensions
    pub fn apply(&self, (w, h): (f32, f32)) -> (f32, f32) {
        match self {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }
}

/// A single table cell value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl Scalar {
    /// Coerce any JSON value; nested arrays/objects are stringified
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Scalar::Null,
            serde_json::Value::Bool(b) => Scalar::Bool(b),
            serde_json::Value::Number(n) => Scalar::Number(n),
            serde_json::Value::String(s) => Scalar::Text(s),
            nested => Scalar::Text(nested.to_string()),
        }
    }

    /// Text shown in a table cell
    pub fn display(&self) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Number(n) => n.to_string(),
            Scalar::Text(s) => s.clone(),
        }
    }
}

/// One table row: field name -> value, in source order
pub type Record = IndexMap<String, Scalar>;

/// A raster image supplied by the chart surface
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub media_type: Option<String>,
}

impl EncodedImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            media_type: None,
        }
    }

    /// Decode a `data:image/...;base64,` URL or a bare base64 payload
    pub fn from_data_url(src: &str) -> Result<Self, AssetError> {
        let src = src.trim();
        let (media_type, payload) = match src.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest
                    .split_once(',')
                    .ok_or_else(|| AssetError::InvalidDataUrl("missing ',' separator".into()))?;
                if !header.ends_with(";base64") {
                    return Err(AssetError::InvalidDataUrl(format!(
                        "unsupported encoding in '{}'",
                        header
                    )));
                }
                let media = header.trim_end_matches(";base64");
                (Some(media.to_string()), payload)
            }
            None => (None, src),
        };

        let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = BASE64_STD
            .decode(cleaned.as_bytes())
            .map_err(|e| AssetError::InvalidDataUrl(e.to_string()))?;
        if bytes.is_empty() {
            return Err(AssetError::InvalidDataUrl("empty payload".into()));
        }
        Ok(Self { bytes, media_type })
    }

    /// Re-encode as a data URL
    pub fn to_data_url(&self) -> String {
        let media = self.media_type.as_deref().unwrap_or("image/jpeg");
        format!("data:{};base64,{}", media, BASE64_STD.encode(&self.bytes))
    }
}

/// Request body as received
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireRequest {
    #[serde(default, alias = "html")]
    pub markup: Option<String>,
    #[serde(default, alias = "css")]
    pub stylesheet: Option<String>,
    #[serde(default, alias = "charts")]
    pub images: Vec<String>,
    #[serde(default)]
    pub rows: Vec<serde_json::Value>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "format")]
    pub page_format: Option<PageFormat>,
    #[serde(default)]
    pub orientation: Option<Orientation>,
    #[serde(default)]
    pub compress: Option<bool>,
}

/// An accepted report request. Immutable once built; fully determines output.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    pub markup: String,
    pub stylesheet: String,
    pub images: Vec<EncodedImage>,
    pub rows: Vec<Record>,
    pub title: String,
    pub page_format: PageFormat,
    pub orientation: Orientation,
    pub compress: bool,
    /// Images/rows dropped while accepting the request
    pub discarded_assets: usize,
}

impl Default for ReportRequest {
    fn default() -> Self {
        Self {
            markup: String::new(),
            stylesheet: String::new(),
            images: Vec::new(),
            rows: Vec::new(),
            title: crate::config::defaults::DEFAULT_TITLE.to_string(),
            page_format: PageFormat::default(),
            orientation: Orientation::default(),
            compress: true,
            discarded_assets: 0,
        }
    }
}

impl ReportRequest {
    /// Accept a wire request. Undecodable images and non-object rows are
    /// skipped with a warning rather than failing the request.
    pub fn from_wire(wire: WireRequest) -> Self {
        let mut discarded = 0;

        let images = wire
            .images
            .iter()
            .enumerate()
            .filter_map(|(i, src)| match EncodedImage::from_data_url(src) {
                Ok(img) => Some(img),
                Err(e) => {
                    log::warn!("Skipping image {}: {}", i, e);
                    discarded += 1;
                    None
                }
            })
            .collect();

        let rows = wire
            .rows
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| match value {
                serde_json::Value::Object(map) => Some(
                    map.into_iter()
                        .map(|(k, v)| (k, Scalar::from_json(v)))
                        .collect::<Record>(),
                ),
                _ => {
                    log::warn!("{}", AssetError::InvalidRow { index });
                    discarded += 1;
                    None
                }
            })
            .collect();

        let defaults = ReportRequest::default();
        Self {
            markup: wire.markup.unwrap_or_default(),
            stylesheet: wire.stylesheet.unwrap_or_default(),
            images,
            rows,
            title: wire
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or(defaults.title),
            page_format: wire.page_format.unwrap_or(defaults.page_format),
            orientation: wire.orientation.unwrap_or(defaults.orientation),
            compress: wire.compress.unwrap_or(defaults.compress),
            discarded_assets: discarded,
        }
    }

    /// Number of images and rows the caller submitted
    pub fn submitted_assets(&self) -> usize {
        self.images.len() + self.rows.len() + self.discarded_assets
    }

    /// Page size in points with orientation applied
    pub fn page_size_pt(&self) -> (f32, f32) {
        self.orientation.apply(self.page_format.dimensions_pt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 transparent PNG
    const PIXEL_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    #[test]
    fn test_data_url_decoding() {
        let img = EncodedImage::from_data_url(&format!("data:image/png;base64,{}", PIXEL_PNG))
            .unwrap();
        assert_eq!(img.media_type.as_deref(), Some("image/png"));
        assert!(img.bytes.starts_with(&[0x89, b'P', b'N', b'G']));

        let bare = EncodedImage::from_data_url(PIXEL_PNG).unwrap();
        assert_eq!(bare.bytes, img.bytes);
    }

    #[test]
    fn test_invalid_data_url() {
        assert!(EncodedImage::from_data_url("data:image/png,rawbytes").is_err());
        assert!(EncodedImage::from_data_url("data:image/png;base64,***").is_err());
    }

    #[test]
    fn test_wire_request_aliases() {
        let body = r#"{
            "html": "<p>Hi</p>",
            "css": "p { color: red }",
            "charts": ["data:image/png;base64,%PNG%", "garbage!!"],
            "rows": [{"id": 1, "status": "paid"}, 42],
            "format": "letter",
            "orientation": "landscape",
            "compress": false
        }"#
        .replace("%PNG%", PIXEL_PNG);
        let wire: WireRequest = serde_json::from_str(&body).unwrap();
        let request = ReportRequest::from_wire(wire);

        assert_eq!(request.markup, "<p>Hi</p>");
        assert_eq!(request.stylesheet, "p { color: red }");
        assert_eq!(request.images.len(), 1);
        assert_eq!(request.rows.len(), 1);
        assert_eq!(request.discarded_assets, 2);
        assert_eq!(request.submitted_assets(), 4);
        assert_eq!(request.page_format, PageFormat::Letter);
        assert_eq!(request.page_size_pt(), (792.0, 612.0));
        assert!(!request.compress);
        assert_eq!(request.title, "Report");
    }

    #[test]
    fn test_row_field_order_preserved() {
        let wire: WireRequest =
            serde_json::from_str(r#"{"rows": [{"z": 1, "a": "x", "m": null}]}"#).unwrap();
        let request = ReportRequest::from_wire(wire);
        let keys: Vec<&str> = request.rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(request.rows[0]["m"].display(), "");
    }
}
