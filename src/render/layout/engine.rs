//! Pagination
//!
//! Blocks are placed top to bottom with a single running cursor. A block that
//! does not fit below the cursor starts a new page, unless the page is still
//! empty. Tables repeat their header on every page they reach, and an image
//! taller than the usable area gets a page to itself.

use std::collections::BTreeMap;

use crate::config::Settings;
use crate::model::{Align, ImageBlock, LayoutBlock, StyleHints, TableBlock, TextBlock};
use crate::render::backends::TextStyle;
use crate::render::helpers::{measurer, Face};

use super::page::{Page, PageGeometry};
use super::table::scale_columns;

/// What a placement draws
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementKind {
    /// One wrapped line of a text block
    TextLine { text: String },
    Image,
    TableHeader,
    /// Data row by index into the table's rows
    TableRow { row: usize },
}

/// A positioned piece of a block. Coordinates are points from the top-left.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// Index of the source block
    pub block: usize,
    pub kind: PlacementKind,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LaidOutPage {
    /// 1-based
    pub number: usize,
    pub placements: Vec<Placement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLayout {
    pub geometry: PageGeometry,
    pub pages: Vec<LaidOutPage>,
    /// Scaled column widths per table block index
    pub column_widths: BTreeMap<usize, Vec<f32>>,
}

impl DocumentLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn placements(&self) -> impl Iterator<Item = (usize, &Placement)> {
        self.pages
            .iter()
            .flat_map(|p| p.placements.iter().map(move |pl| (p.number, pl)))
    }
}

/// Resolve the drawing style of a text block
pub fn text_style(hints: &StyleHints, settings: &Settings) -> TextStyle {
    TextStyle {
        font_size: hints.font_size.unwrap_or(settings.body_font_size),
        face: Face::from_bold(hints.bold.unwrap_or(false)),
        color: hints.color.unwrap_or(settings.text_color),
        align: hints.align.unwrap_or(Align::Left),
    }
}

/// Lays blocks out onto pages
pub struct LayoutEngine<'a> {
    settings: &'a Settings,
    geometry: PageGeometry,
    page: Page,
    pages: Vec<LaidOutPage>,
    column_widths: BTreeMap<usize, Vec<f32>>,
    /// The current page holds an oversized image and takes nothing else
    page_sealed: bool,
}

impl<'a> LayoutEngine<'a> {
    pub fn new(settings: &'a Settings, geometry: PageGeometry) -> Self {
        Self {
            settings,
            geometry,
            page: Page::new(geometry),
            pages: vec![LaidOutPage {
                number: 1,
                placements: Vec::new(),
            }],
            column_widths: BTreeMap::new(),
            page_sealed: false,
        }
    }

    /// Lay out all blocks. The last page is kept even when partially filled.
    pub fn layout(mut self, blocks: &[LayoutBlock]) -> DocumentLayout {
        for (index, block) in blocks.iter().enumerate() {
            if self.page_sealed {
                self.break_page();
            }

            match block {
                LayoutBlock::Text(text) => self.place_text(index, text),
                LayoutBlock::Image(image) => self.place_image(index, image),
                LayoutBlock::Table(table) => self.place_table(index, table),
                LayoutBlock::LineBreak => {
                    let height = self.settings.line_height_for(self.settings.body_font_size);
                    self.page.advance(height);
                    continue;
                }
            }

            if !self.page_sealed {
                self.page.advance(self.settings.block_spacing);
            }
        }

        log::debug!(
            "Laid out {} blocks onto {} pages",
            blocks.len(),
            self.pages.len()
        );

        DocumentLayout {
            geometry: self.geometry,
            pages: self.pages,
            column_widths: self.column_widths,
        }
    }

    fn break_page(&mut self) {
        let number = self.pages.len() + 1;
        self.pages.push(LaidOutPage {
            number,
            placements: Vec::new(),
        });
        self.page.reset();
        self.page_sealed = false;
    }

    /// Start a new page if `height` does not fit and the page has content
    fn ensure_room(&mut self, height: f32) {
        if !self.page.fits(height) && !self.page.is_fresh() {
            self.break_page();
        }
    }

    fn place(&mut self, block: usize, kind: PlacementKind, x: f32, width: f32, height: f32) {
        let placement = Placement {
            block,
            kind,
            x,
            y: self.page.cursor_y,
            width,
            height,
        };
        if let Some(page) = self.pages.last_mut() {
            page.placements.push(placement);
        }
        self.page.advance(height);
    }

    fn place_text(&mut self, index: usize, text: &TextBlock) {
        let style = text_style(&text.hints, self.settings);
        let line_height = self.settings.line_height_for(style.font_size);
        let width = self.geometry.usable_width();
        let lines = measurer(style.face).wrap(&text.content, style.font_size, width);

        self.ensure_room(line_height * lines.len() as f32);
        for line in lines {
            // Blocks taller than the remaining space continue line by line
            self.ensure_room(line_height);
            self.place(
                index,
                PlacementKind::TextLine { text: line },
                self.geometry.margin,
                width,
                line_height,
            );
        }
    }

    fn place_image(&mut self, index: usize, image: &ImageBlock) {
        let width = self.geometry.usable_width();
        let height = image.scaled_height(width);
        if height <= 0.0 {
            log::warn!("Skipping image block {} with no pixels", index);
            return;
        }

        if height > self.geometry.usable_height() {
            // Alone on its own page at full width; the overflow runs off the bottom
            if !self.page.is_fresh() {
                self.break_page();
            }
            log::debug!(
                "Image block {} overflows the page by {:.1}pt",
                index,
                height - self.geometry.usable_height()
            );
            self.place(index, PlacementKind::Image, self.geometry.margin, width, height);
            self.page_sealed = true;
            return;
        }

        self.ensure_room(height);
        self.place(index, PlacementKind::Image, self.geometry.margin, width, height);
    }

    fn place_table(&mut self, index: usize, table: &TableBlock) {
        let row_height = self.settings.table.row_height;
        let widths = scale_columns(&table.columns, self.geometry.usable_width());
        let width: f32 = widths.iter().sum();
        let x = self.geometry.margin;
        self.column_widths.insert(index, widths);

        // Header plus the first data row must fit together
        let first = if table.rows.is_empty() { 1.0 } else { 2.0 };
        self.ensure_room(row_height * first);
        self.place(index, PlacementKind::TableHeader, x, width, row_height);

        for row in 0..table.rows.len() {
            if !self.page.fits(row_height) {
                self.break_page();
                self.place(index, PlacementKind::TableHeader, x, width, row_height);
            }
            self.place(index, PlacementKind::TableRow { row }, x, width, row_height);
        }
    }
}

/// Lay out `blocks` on pages of the given geometry
pub fn layout_document(
    blocks: &[LayoutBlock],
    geometry: PageGeometry,
    settings: &Settings,
) -> DocumentLayout {
    LayoutEngine::new(settings, geometry).layout(blocks)
}
