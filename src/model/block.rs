//! Backend-agnostic layout blocks produced by the content normalizer

use super::color::Color;
use super::request::Record;

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl Align {
    pub fn from_css(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" | "start" | "justify" => Some(Align::Left),
            "center" => Some(Align::Center),
            "right" | "end" => Some(Align::Right),
            _ => None,
        }
    }
}

/// Style hints extracted from markup. Unset fields fall back to settings.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StyleHints {
    pub font_size: Option<f32>,
    pub color: Option<Color>,
    pub align: Option<Align>,
    pub bold: Option<bool>,
}

impl StyleHints {
    /// Fields set in `other` override fields in `self`
    pub fn merged_with(self, other: &StyleHints) -> StyleHints {
        StyleHints {
            font_size: other.font_size.or(self.font_size),
            color: other.color.or(self.color),
            align: other.align.or(self.align),
            bold: other.bold.or(self.bold),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == StyleHints::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlock {
    pub bytes: Vec<u8>,
    pub intrinsic_width: u32,
    pub intrinsic_height: u32,
}

impl ImageBlock {
    /// Height when scaled to `width`, preserving aspect ratio
    pub fn scaled_height(&self, width: f32) -> f32 {
        if self.intrinsic_width == 0 {
            return 0.0;
        }
        self.intrinsic_height as f32 * width / self.intrinsic_width as f32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub content: String,
    pub hints: StyleHints,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableColumn {
    pub header: String,
    pub field_key: String,
    /// Nominal width in points, before scaling to the usable page width
    pub width: f32,
}

impl TableColumn {
    pub fn new(header: impl Into<String>, field_key: impl Into<String>, width: f32) -> Self {
        Self {
            header: header.into(),
            field_key: field_key.into(),
            width,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableBlock {
    pub columns: Vec<TableColumn>,
    pub rows: Vec<Record>,
}

/// One layout-level unit of content
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutBlock {
    Image(ImageBlock),
    Text(TextBlock),
    Table(TableBlock),
    LineBreak,
}

impl LayoutBlock {
    pub fn text(content: impl Into<String>) -> Self {
        LayoutBlock::Text(TextBlock {
            content: content.into(),
            hints: StyleHints::default(),
        })
    }

    pub fn styled_text(content: impl Into<String>, hints: StyleHints) -> Self {
        LayoutBlock::Text(TextBlock {
            content: content.into(),
            hints,
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LayoutBlock::Image(_) => "image",
            LayoutBlock::Text(_) => "text",
            LayoutBlock::Table(_) => "table",
            LayoutBlock::LineBreak => "line-break",
        }
    }
}
