//! Helper utilities for PDF rendering

pub mod colors;
pub mod compress;
pub mod layer;
pub mod text_metrics;

pub use colors::{rgb_operands, to_pdf_color};
pub use compress::{compress_pdf, deflate_stream};
pub use layer::LayerBuilder;
pub use text_metrics::{measurer, win_ansi_byte, win_ansi_text, Face, HelveticaMeasurer};
