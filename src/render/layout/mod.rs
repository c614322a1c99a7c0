//! Page layout engine
//!
//! `engine` paginates blocks into placements, `paint` replays the placements
//! onto a [`DrawBackend`](crate::render::backends::DrawBackend).

pub mod engine;
pub mod page;
pub mod paint;
pub mod table;

pub use engine::{
    layout_document, text_style, DocumentLayout, LaidOutPage, LayoutEngine, Placement,
    PlacementKind,
};
pub use page::{Page, PageGeometry};
pub use paint::paint;
pub use table::scale_columns;
