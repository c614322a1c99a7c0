use std::path::PathBuf;
use std::time::Duration;

use crate::cli::{parse_column_spec, Args};
use crate::model::{Color, TableColumn};
use crate::render::backends::BackendKind;

use super::defaults::*;

/// Target width ceiling and JPEG quality for re-encoded images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageProfile {
    pub max_width: u32,
    /// JPEG quality, 1-100
    pub quality: u8,
}

/// Per-backend image fidelity. Kept as configuration because the backends
/// deliberately trade size for accuracy differently.
#[derive(Debug, Clone)]
pub struct ImageProfiles {
    pub vector: ImageProfile,
    pub streaming: ImageProfile,
    pub browser: ImageProfile,
}

impl Default for ImageProfiles {
    fn default() -> Self {
        Self {
            vector: ImageProfile {
                max_width: VECTOR_IMAGE_MAX_WIDTH,
                quality: VECTOR_IMAGE_QUALITY,
            },
            streaming: ImageProfile {
                max_width: STREAMING_IMAGE_MAX_WIDTH,
                quality: STREAMING_IMAGE_QUALITY,
            },
            browser: ImageProfile {
                max_width: BROWSER_IMAGE_MAX_WIDTH,
                quality: BROWSER_IMAGE_QUALITY,
            },
        }
    }
}

impl ImageProfiles {
    pub fn for_backend(&self, backend: BackendKind) -> ImageProfile {
        match backend {
            BackendKind::Vector => self.vector,
            BackendKind::Streaming => self.streaming,
            BackendKind::BrowserPrint => self.browser,
        }
    }
}

/// Table geometry and styling
#[derive(Debug, Clone)]
pub struct TableSettings {
    pub columns: Vec<TableColumn>,
    pub row_height: f32,
    pub font_size: f32,
    pub header_font_size: f32,
    pub cell_padding: f32,
    pub status_field: String,
    pub muted_field: String,

    pub header_background: Color,
    pub header_text: Color,
    pub even_row_background: Color,
    pub odd_row_background: Color,
    pub odd_row_opacity: f32,
    pub text: Color,
    pub muted_text: Color,
    pub pending: Color,
    pub failed: Color,
    pub paid: Color,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            columns: DEFAULT_COLUMNS
                .iter()
                .map(|(header, key, width)| TableColumn::new(*header, *key, *width))
                .collect(),
            row_height: DEFAULT_ROW_HEIGHT,
            font_size: DEFAULT_TABLE_FONT_SIZE,
            header_font_size: DEFAULT_TABLE_HEADER_FONT_SIZE,
            cell_padding: DEFAULT_CELL_PADDING,
            status_field: DEFAULT_STATUS_FIELD.to_string(),
            muted_field: DEFAULT_MUTED_FIELD.to_string(),

            header_background: Color::gray(0.94),
            header_text: Color::gray(0.4),
            even_row_background: Color::gray(1.0),
            odd_row_background: Color::gray(0.94),
            odd_row_opacity: 0.3,
            text: Color::gray(0.0),
            muted_text: Color::gray(0.6),
            pending: Color::new(0.98, 0.65, 0.22),
            failed: Color::new(0.91, 0.11, 0.11),
            paid: Color::new(0.2, 0.8, 0.2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub capacity: usize,
    pub ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

/// Ghostscript `-dPDFSETTINGS` quality presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompactionPreset {
    #[default]
    Screen,
    Ebook,
    Printer,
    Prepress,
}

impl CompactionPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompactionPreset::Screen => "screen",
            CompactionPreset::Ebook => "ebook",
            CompactionPreset::Printer => "printer",
            CompactionPreset::Prepress => "prepress",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompactionSettings {
    pub binary: PathBuf,
    pub threshold_bytes: usize,
    pub preset: CompactionPreset,
}

impl Default for CompactionSettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_COMPACTION_BINARY),
            threshold_bytes: DEFAULT_COMPACTION_THRESHOLD,
            preset: CompactionPreset::Screen,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Explicit browser binary; searched on PATH when unset
    pub binary: Option<PathBuf>,
    pub max_pages: usize,
    pub print_margin_mm: f32,
    pub print_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            binary: None,
            max_pages: DEFAULT_MAX_BROWSER_PAGES,
            print_margin_mm: DEFAULT_PRINT_MARGIN_MM,
            print_timeout: Duration::from_secs(DEFAULT_PRINT_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_BROWSER_IDLE_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub chunk_size: usize,
    pub channel_capacity: usize,
    pub max_cached_bytes: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_STREAM_CHUNK_SIZE,
            channel_capacity: DEFAULT_STREAM_CHANNEL_CAPACITY,
            max_cached_bytes: DEFAULT_STREAM_MAX_CACHED_BYTES,
        }
    }
}

/// Runtime settings for report generation
#[derive(Debug, Clone)]
pub struct Settings {
    // Page geometry (points). Width/height come from the request's format.
    pub margin: f32,

    // Flow
    pub line_height: f32,
    pub block_spacing: f32,

    // Typography (points)
    pub title_font_size: f32,
    pub body_font_size: f32,
    pub title_color: Color,
    pub text_color: Color,

    pub table: TableSettings,
    pub images: ImageProfiles,
    pub cache: CacheSettings,
    pub compaction: CompactionSettings,
    pub browser: BrowserSettings,
    pub stream: StreamSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            margin: DEFAULT_PAGE_MARGIN,
            line_height: DEFAULT_LINE_HEIGHT,
            block_spacing: DEFAULT_BLOCK_SPACING,
            title_font_size: DEFAULT_TITLE_FONT_SIZE,
            body_font_size: DEFAULT_BODY_FONT_SIZE,
            title_color: Color::gray(0.2),
            text_color: Color::gray(0.0),
            table: TableSettings::default(),
            images: ImageProfiles::default(),
            cache: CacheSettings::default(),
            compaction: CompactionSettings::default(),
            browser: BrowserSettings::default(),
            stream: StreamSettings::default(),
        }
    }
}

impl Settings {
    /// Create settings from CLI arguments
    pub fn from_args(args: &Args) -> Result<Self, String> {
        let mut settings = Settings::default();

        if let Some(margin) = args.margin {
            settings.margin = margin;
        }
        if let Some(row_height) = args.row_height {
            settings.table.row_height = row_height;
        }
        if let Some(ref spec) = args.columns {
            settings.table.columns = parse_column_spec(spec)?;
        }
        if let Some(ref binary) = args.browser {
            settings.browser.binary = Some(binary.clone());
        }
        if let Some(ref gs) = args.gs {
            settings.compaction.binary = gs.clone();
        }
        Ok(settings)
    }

    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_block_spacing(mut self, spacing: f32) -> Self {
        self.block_spacing = spacing;
        self
    }

    pub fn with_row_height(mut self, row_height: f32) -> Self {
        self.table.row_height = row_height;
        self
    }

    pub fn with_cache(mut self, capacity: usize, ttl: Duration) -> Self {
        self.cache = CacheSettings { capacity, ttl };
        self
    }

    pub fn with_compaction_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.compaction.binary = binary.into();
        self
    }

    /// Line height used for text at `font_size`
    pub fn line_height_for(&self, font_size: f32) -> f32 {
        self.line_height.max(font_size * 1.2)
    }

    /// Default size for heading level 1-6
    pub fn heading_font_size(&self, level: u8) -> f32 {
        match level {
            1 => 24.0,
            2 => 20.0,
            3 => 16.0,
            4 => 14.0,
            5 => 12.0,
            _ => 11.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_columns() {
        let settings = Settings::default();
        let keys: Vec<&str> = settings
            .table
            .columns
            .iter()
            .map(|c| c.field_key.as_str())
            .collect();
        assert_eq!(keys, ["id", "customer", "email", "amount", "status", "date"]);
        let total: f32 = settings.table.columns.iter().map(|c| c.width).sum();
        assert_eq!(total, 630.0);
    }

    #[test]
    fn test_image_profiles() {
        let profiles = ImageProfiles::default();
        assert_eq!(profiles.for_backend(BackendKind::BrowserPrint).quality, 30);
        assert_eq!(profiles.for_backend(BackendKind::Vector).quality, 98);
        assert_eq!(profiles.for_backend(BackendKind::BrowserPrint).max_width, 400);
    }

    #[test]
    fn test_line_height_grows_with_font() {
        let settings = Settings::default();
        assert_eq!(settings.line_height_for(10.0), 14.0);
        assert!((settings.line_height_for(24.0) - 28.8).abs() < 1e-4);
    }
}
