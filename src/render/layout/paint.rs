//! Turns a laid-out document into backend primitive calls

use crate::config::Settings;
use crate::error::RenderError;
use crate::model::{Align, LayoutBlock, TableBlock};
use crate::render::backends::{DrawBackend, Point, Size, TextStyle};
use crate::render::helpers::{measurer, Face};

use super::engine::{text_style, DocumentLayout, Placement, PlacementKind};
use super::table::{cell_color, cell_text, row_background};

/// Baseline for text of `font_size` centered in a box starting at `top`
fn baseline(top: f32, box_height: f32, font_size: f32) -> f32 {
    // Helvetica cap height is 718/1000 em
    top + (box_height + font_size * 0.718) / 2.0
}

/// Paint every page of `layout` onto `backend`.
///
/// Image embeds that fail are logged and skipped; any other primitive error
/// aborts painting.
pub fn paint<B: DrawBackend>(
    layout: &DocumentLayout,
    blocks: &[LayoutBlock],
    settings: &Settings,
    backend: &mut B,
) -> Result<(), RenderError> {
    for (index, page) in layout.pages.iter().enumerate() {
        if index > 0 {
            backend.new_page()?;
        }
        for placement in &page.placements {
            let Some(block) = blocks.get(placement.block) else {
                log::warn!("Placement refers to missing block {}", placement.block);
                continue;
            };
            paint_placement(layout, block, placement, settings, backend)?;
        }
    }
    Ok(())
}

fn paint_placement<B: DrawBackend>(
    layout: &DocumentLayout,
    block: &LayoutBlock,
    placement: &Placement,
    settings: &Settings,
    backend: &mut B,
) -> Result<(), RenderError> {
    match (&placement.kind, block) {
        (PlacementKind::TextLine { text }, LayoutBlock::Text(source)) => {
            let style = text_style(&source.hints, settings);
            let x = match style.align {
                Align::Left => placement.x,
                Align::Center => placement.x + placement.width / 2.0,
                Align::Right => placement.x + placement.width,
            };
            let y = baseline(placement.y, placement.height, style.font_size);
            backend.draw_text(text, Point::new(x, y), &style)
        }
        (PlacementKind::Image, LayoutBlock::Image(image)) => {
            let result = backend.embed_image(
                &image.bytes,
                Point::new(placement.x, placement.y),
                Size::new(placement.width, placement.height),
            );
            if let Err(e) = result {
                log::warn!("Skipping image block {}: {}", placement.block, e);
            }
            Ok(())
        }
        (PlacementKind::TableHeader, LayoutBlock::Table(table)) => {
            let widths = column_widths(layout, placement, table);
            paint_header(table, &widths, placement, settings, backend)
        }
        (PlacementKind::TableRow { row }, LayoutBlock::Table(table)) => {
            let widths = column_widths(layout, placement, table);
            paint_row(table, *row, &widths, placement, settings, backend)
        }
        (kind, block) => {
            log::warn!(
                "Placement {:?} does not match {} block {}",
                kind,
                block.kind(),
                placement.block
            );
            Ok(())
        }
    }
}

fn column_widths(layout: &DocumentLayout, placement: &Placement, table: &TableBlock) -> Vec<f32> {
    layout
        .column_widths
        .get(&placement.block)
        .cloned()
        .unwrap_or_else(|| super::table::scale_columns(&table.columns, placement.width))
}

/// Draw one cell's text, truncated to the column
fn paint_cell<B: DrawBackend>(
    text: &str,
    x: f32,
    column_width: f32,
    placement: &Placement,
    style: &TextStyle,
    padding: f32,
    backend: &mut B,
) -> Result<(), RenderError> {
    let available = (column_width - 2.0 * padding).max(0.0);
    let fitted = measurer(style.face).truncate(text, style.font_size, available);
    if fitted.is_empty() {
        return Ok(());
    }
    let y = baseline(placement.y, placement.height, style.font_size);
    backend.draw_text(&fitted, Point::new(x + padding, y), style)
}

fn paint_header<B: DrawBackend>(
    table: &TableBlock,
    widths: &[f32],
    placement: &Placement,
    settings: &Settings,
    backend: &mut B,
) -> Result<(), RenderError> {
    let ts = &settings.table;
    backend.draw_rect(
        Point::new(placement.x, placement.y),
        Size::new(placement.width, placement.height),
        ts.header_background,
        1.0,
    )?;

    let style = TextStyle {
        font_size: ts.header_font_size,
        face: Face::Bold,
        color: ts.header_text,
        align: Align::Left,
    };
    let mut x = placement.x;
    for (column, width) in table.columns.iter().zip(widths) {
        paint_cell(&column.header, x, *width, placement, &style, ts.cell_padding, backend)?;
        x += width;
    }
    Ok(())
}

fn paint_row<B: DrawBackend>(
    table: &TableBlock,
    row_index: usize,
    widths: &[f32],
    placement: &Placement,
    settings: &Settings,
    backend: &mut B,
) -> Result<(), RenderError> {
    let ts = &settings.table;
    let Some(row) = table.rows.get(row_index) else {
        return Ok(());
    };

    let (background, opacity) = row_background(ts, row_index);
    backend.draw_rect(
        Point::new(placement.x, placement.y),
        Size::new(placement.width, placement.height),
        background,
        opacity,
    )?;

    let mut x = placement.x;
    for (column, width) in table.columns.iter().zip(widths) {
        let style = TextStyle {
            font_size: ts.font_size,
            face: Face::Regular,
            color: cell_color(ts, column, row),
            align: Align::Left,
        };
        paint_cell(&cell_text(column, row), x, *width, placement, &style, ts.cell_padding, backend)?;
        x += width;
    }
    Ok(())
}
