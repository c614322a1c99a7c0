//! Vector builder on printpdf
//!
//! Each page collects ops in a [`LayerBuilder`]; the document is assembled and
//! stream-compressed with lopdf on finalize.

use printpdf::{Mm, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, RawImage};

use crate::error::RenderError;
use crate::model::Color;
use crate::render::helpers::{compress_pdf, measurer, to_pdf_color, LayerBuilder};
use crate::render::layout::PageGeometry;

use super::{aligned_start, DrawBackend, Point, Size, TextStyle};

/// Millimetres per point
const MM_PER_PT: f32 = 0.352_778;

pub struct VectorBackend {
    doc: PdfDocument,
    width: f32,
    height: f32,
    pages: Vec<LayerBuilder>,
    current: LayerBuilder,
}

impl VectorBackend {
    pub fn new(title: &str, geometry: PageGeometry) -> Self {
        Self {
            doc: PdfDocument::new(title),
            width: geometry.width,
            height: geometry.height,
            pages: Vec::new(),
            current: LayerBuilder::new(),
        }
    }

    /// Flip a top-down y coordinate into PDF space
    fn pdf_y(&self, y: f32) -> f32 {
        self.height - y
    }
}

impl DrawBackend for VectorBackend {
    type Output = Vec<u8>;

    fn draw_text(
        &mut self,
        content: &str,
        position: Point,
        style: &TextStyle,
    ) -> Result<(), RenderError> {
        let width = measurer(style.face).width_pt(content, style.font_size);
        let x = aligned_start(position.x, width, style.align);
        let y = self.pdf_y(position.y);

        self.current.set_fill_color(to_pdf_color(style.color));
        self.current
            .use_text(content, style.font_size, x, y, style.face);
        Ok(())
    }

    fn draw_rect(
        &mut self,
        position: Point,
        size: Size,
        color: Color,
        opacity: f32,
    ) -> Result<(), RenderError> {
        let fill = color.over_white(opacity);
        let bottom = self.pdf_y(position.y + size.height);

        self.current.save_graphics_state();
        self.current.set_fill_color(to_pdf_color(fill));
        self.current
            .fill_rect(position.x, bottom, size.width, size.height);
        self.current.restore_graphics_state();
        Ok(())
    }

    fn embed_image(
        &mut self,
        bytes: &[u8],
        position: Point,
        size: Size,
    ) -> Result<(), RenderError> {
        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let raw = RawImage::decode_from_bytes(bytes, &mut warnings)
            .map_err(|e| RenderError::ImageEmbed(e.to_string()))?;
        let pixels = (raw.width as u32, raw.height as u32);
        let id = self.doc.add_image(&raw);

        let bottom = self.pdf_y(position.y + size.height);
        self.current
            .use_image(id, pixels, position.x, bottom, size.width, size.height);
        Ok(())
    }

    fn new_page(&mut self) -> Result<(), RenderError> {
        let finished = std::mem::take(&mut self.current);
        self.pages.push(finished);
        Ok(())
    }

    fn finalize(mut self) -> Result<Vec<u8>, RenderError> {
        let last = std::mem::take(&mut self.current);
        self.pages.push(last);

        let page_w = Mm(self.width * MM_PER_PT);
        let page_h = Mm(self.height * MM_PER_PT);
        let pages: Vec<PdfPage> = self
            .pages
            .into_iter()
            .map(|layer| PdfPage::new(page_w, page_h, layer.into_ops()))
            .collect();
        let page_count = pages.len();

        self.doc.with_pages(pages);
        let mut warnings = Vec::new();
        let bytes = self.doc.save(&PdfSaveOptions::default(), &mut warnings);
        if bytes.is_empty() {
            return Err(RenderError::PdfGeneration("printpdf produced no output".into()));
        }
        log::debug!("Vector backend wrote {} pages", page_count);

        match compress_pdf(bytes.clone()) {
            Ok(compressed) => Ok(compressed),
            Err(e) => {
                log::warn!("Keeping uncompressed output: {}", e);
                Ok(bytes)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Align;
    use crate::render::helpers::Face;
    use std::io::Cursor;

    fn geometry() -> PageGeometry {
        PageGeometry::new(595.28, 841.89, 40.0)
    }

    fn style() -> TextStyle {
        TextStyle {
            font_size: 12.0,
            face: Face::Regular,
            color: Color::gray(0.0),
            align: Align::Left,
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 120, 200]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_pages_and_header() {
        let mut backend = VectorBackend::new("Report", geometry());
        backend
            .draw_text("Page one", Point::new(40.0, 60.0), &style())
            .unwrap();
        backend.new_page().unwrap();
        backend
            .draw_rect(Point::new(40.0, 40.0), Size::new(100.0, 25.0), Color::gray(0.94), 0.3)
            .unwrap();
        let bytes = backend.finalize().unwrap();

        assert_eq!(&bytes[0..5], b"%PDF-");
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_embed_image() {
        let mut backend = VectorBackend::new("Report", geometry());
        backend
            .embed_image(&png(8, 4), Point::new(40.0, 40.0), Size::new(200.0, 100.0))
            .unwrap();
        let bytes = backend.finalize().unwrap();
        assert!(lopdf::Document::load_mem(&bytes).is_ok());
    }

    #[test]
    fn test_bad_image_fails_only_the_embed() {
        let mut backend = VectorBackend::new("Report", geometry());
        let result =
            backend.embed_image(b"garbage", Point::new(40.0, 40.0), Size::new(10.0, 10.0));
        assert!(matches!(result, Err(RenderError::ImageEmbed(_))));
        assert!(backend.finalize().is_ok());
    }
}
