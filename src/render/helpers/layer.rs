//! Op collector for printpdf 0.8
//!
//! `LayerBuilder` collects drawing operations for one page into a `Vec<Op>`.
//! Coordinates are PDF points with the origin at the bottom-left.

use printpdf::{
    Color, LinePoint, Op, PaintMode, Point, Polygon, PolygonRing, Pt, TextItem, WindingOrder,
    XObjectId, XObjectTransform,
};

use super::text_metrics::{win_ansi_text, Face};

/// A builder that collects PDF operations for one page
#[derive(Default)]
pub struct LayerBuilder {
    ops: Vec<Op>,
}

impl LayerBuilder {
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Get the collected operations
    pub fn into_ops(self) -> Vec<Op> {
        self.ops
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn set_fill_color(&mut self, color: Color) {
        self.ops.push(Op::SetFillColor { col: color });
    }

    /// Draw a single line of text with its baseline at (`x`, `y`)
    pub fn use_text(&mut self, text: &str, font_size: f32, x: f32, y: f32, face: Face) {
        if text.is_empty() {
            return;
        }
        let font = face.builtin();

        self.ops.push(Op::StartTextSection);
        self.ops.push(Op::SetTextCursor {
            pos: Point { x: Pt(x), y: Pt(y) },
        });
        self.ops.push(Op::SetFontSizeBuiltinFont {
            size: Pt(font_size),
            font,
        });
        self.ops.push(Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(win_ansi_text(text))],
            font,
        });
        self.ops.push(Op::EndTextSection);
    }

    /// Add a filled rectangle from its lower-left corner
    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let corner = |x: f32, y: f32| LinePoint {
            p: Point { x: Pt(x), y: Pt(y) },
            bezier: false,
        };

        let polygon = Polygon {
            rings: vec![PolygonRing {
                points: vec![
                    corner(x, y),
                    corner(x + width, y),
                    corner(x + width, y + height),
                    corner(x, y + height),
                ],
            }],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        };

        self.ops.push(Op::DrawPolygon { polygon });
    }

    /// Place a registered image so it fills `width` x `height` points with
    /// its lower-left corner at (`x`, `y`)
    pub fn use_image(
        &mut self,
        id: XObjectId,
        pixel_size: (u32, u32),
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) {
        // At 72 dpi one pixel maps to one point
        let scale = |target: f32, px: u32| if px > 0 { target / px as f32 } else { 1.0 };

        self.ops.push(Op::UseXobject {
            id,
            transform: XObjectTransform {
                translate_x: Some(Pt(x)),
                translate_y: Some(Pt(y)),
                scale_x: Some(scale(width, pixel_size.0)),
                scale_y: Some(scale(height, pixel_size.1)),
                rotate: None,
                dpi: Some(72.0),
            },
        });
    }

    pub fn save_graphics_state(&mut self) {
        self.ops.push(Op::SaveGraphicsState);
    }

    pub fn restore_graphics_state(&mut self) {
        self.ops.push(Op::RestoreGraphicsState);
    }
}
