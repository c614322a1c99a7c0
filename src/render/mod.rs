//! PDF rendering modules

pub mod backends;
pub mod helpers;
pub mod layout;

// Re-export commonly used items for convenience
pub use backends::{BackendKind, DrawBackend, MarkupBackend, VectorBackend};
pub use layout::{layout_document, paint, DocumentLayout, PageGeometry};

use crate::config::Settings;
use crate::error::RenderError;
use crate::model::LayoutBlock;

/// Lay out `blocks` and paint them onto `backend`, returning its output
pub fn render_blocks<B: DrawBackend>(
    blocks: &[LayoutBlock],
    geometry: PageGeometry,
    settings: &Settings,
    mut backend: B,
) -> Result<B::Output, RenderError> {
    let layout = layout_document(blocks, geometry, settings);
    log::debug!(
        "Laid out {} blocks on {} pages",
        blocks.len(),
        layout.page_count()
    );
    paint(&layout, blocks, settings, &mut backend)?;
    backend.finalize()
}
