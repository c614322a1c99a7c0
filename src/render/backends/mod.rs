//! Rendering backends
//!
//! The vector and streaming builders implement [`DrawBackend`] and receive
//! primitive calls from the layout painter. The browser-print backend works on
//! assembled markup instead and implements [`MarkupBackend`].

pub mod browser;
pub mod pdf_writer;
pub mod streaming;
pub mod vector;

use std::future::Future;

use clap::ValueEnum;
use serde::Deserialize;

use crate::error::RenderError;
use crate::model::{Align, Color};

use super::helpers::Face;

pub use browser::{BrowserPrintBackend, PrintJob, PrintOptions};
pub use streaming::{spawn_stream, DocumentStream, StreamJob, StreamSummary, StreamingBackend};
pub use vector::VectorBackend;

/// Which backend renders a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    #[default]
    Vector,
    Streaming,
    BrowserPrint,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Vector => "vector",
            BackendKind::Streaming => "streaming",
            BackendKind::BrowserPrint => "browser-print",
        }
    }

    /// True for backends driven by the page layout engine
    pub fn uses_layout(&self) -> bool {
        !matches!(self, BackendKind::BrowserPrint)
    }
}

/// A point in page space, in points, origin at the top-left
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// How a run of text is drawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font_size: f32,
    pub face: Face,
    pub color: Color,
    pub align: Align,
}

/// Drawing primitives shared by the vector and streaming builders.
///
/// For `draw_text`, `position.y` is the baseline and `position.x` is the
/// anchor selected by the style's alignment: the left edge, the center or the
/// right edge of the text.
pub trait DrawBackend {
    type Output;

    fn draw_text(
        &mut self,
        content: &str,
        position: Point,
        style: &TextStyle,
    ) -> Result<(), RenderError>;

    /// Fill a rectangle whose top-left corner is `position`
    fn draw_rect(
        &mut self,
        position: Point,
        size: Size,
        color: Color,
        opacity: f32,
    ) -> Result<(), RenderError>;

    fn embed_image(&mut self, bytes: &[u8], position: Point, size: Size)
        -> Result<(), RenderError>;

    fn new_page(&mut self) -> Result<(), RenderError>;

    fn finalize(self) -> Result<Self::Output, RenderError>;
}

/// Backends that print assembled markup rather than primitives
pub trait MarkupBackend {
    fn print(&self, job: PrintJob) -> impl Future<Output = Result<Vec<u8>, RenderError>> + Send;
}

/// Left edge of a text run anchored at `x`
pub fn aligned_start(x: f32, text_width: f32, align: Align) -> f32 {
    match align {
        Align::Left => x,
        Align::Center => x - text_width / 2.0,
        Align::Right => x - text_width,
    }
}
