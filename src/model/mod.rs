pub mod block;
pub mod color;
pub mod request;

pub use block::{Align, ImageBlock, LayoutBlock, StyleHints, TableBlock, TableColumn, TextBlock};
pub use color::Color;
pub use request::{
    EncodedImage, Orientation, PageFormat, Record, ReportRequest, Scalar, WireRequest,
};
