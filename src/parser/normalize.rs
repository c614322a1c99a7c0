//! Request → ordered layout blocks
//!
//! Output order is fixed: the title, blocks from the markup in source order,
//! request images in order, then one table when any rows survived.

use std::io::Cursor;

use crate::config::Settings;
use crate::model::{
    Align, ImageBlock, LayoutBlock, Record, ReportRequest, StyleHints, TableBlock, TableColumn,
};

use super::markup::{decode_entities, parse_fragment, Element, Node};
use super::style::{parse_declarations, Stylesheet};

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "li", "section", "article", "header",
    "footer", "blockquote", "td", "th", "caption", "figcaption", "pre",
];

const INLINE_TAGS: &[&str] = &[
    "span", "b", "strong", "i", "em", "u", "a", "small", "code", "label", "sup", "sub", "mark",
];

/// Elements whose content never reaches the document
const SKIPPED_TAGS: &[&str] = &["head", "script", "style", "template", "noscript", "svg"];

/// Class tokens that exclude an element from export
const EXCLUDE_CLASSES: &[&str] = &["print:hidden", "no-export"];

/// Result of normalization
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub blocks: Vec<LayoutBlock>,
    /// Markup images that could not be decoded
    pub skipped_assets: usize,
}

/// True when an element is flagged to be left out of the export
pub fn is_excluded(element: &Element) -> bool {
    EXCLUDE_CLASSES.iter().any(|c| element.has_class(c))
        || element
            .attr("data-export")
            .map(|v| v.trim().eq_ignore_ascii_case("exclude"))
            .unwrap_or(false)
        || element.has_attr("data-pdf-exclude")
}

fn heading_level(name: &str) -> Option<u8> {
    match name.as_bytes() {
        [b'h', level @ b'1'..=b'6'] => Some(level - b'0'),
        _ => None,
    }
}

/// Decode an image and read its pixel dimensions without a full decode
pub fn probe_image(bytes: &[u8]) -> Result<ImageBlock, image::ImageError> {
    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()?;
    Ok(ImageBlock {
        bytes: bytes.to_vec(),
        intrinsic_width: width,
        intrinsic_height: height,
    })
}

/// Tree walker state
struct Walker<'a> {
    settings: &'a Settings,
    stylesheet: Stylesheet,
    blocks: Vec<LayoutBlock>,
    text: String,
    text_hints: StyleHints,
    skipped: usize,
}

impl<'a> Walker<'a> {
    fn new(settings: &'a Settings, stylesheet: Stylesheet) -> Self {
        Self {
            settings,
            stylesheet,
            blocks: Vec::new(),
            text: String::new(),
            text_hints: StyleHints::default(),
            skipped: 0,
        }
    }

    fn push_text(&mut self, raw: &str, hints: StyleHints) {
        let decoded = decode_entities(raw);
        if self.text.trim().is_empty() {
            self.text_hints = hints;
        }
        for (i, word) in decoded.split_whitespace().enumerate() {
            let needs_space = (i > 0 || decoded.starts_with(char::is_whitespace))
                && !self.text.is_empty()
                && !self.text.ends_with(' ');
            if needs_space {
                self.text.push(' ');
            }
            self.text.push_str(word);
        }
        if decoded.ends_with(char::is_whitespace) && !self.text.is_empty() {
            self.text.push(' ');
        }
    }

    /// End the current text run
    fn flush(&mut self) {
        let content = self.text.trim();
        if !content.is_empty() {
            self.blocks
                .push(LayoutBlock::styled_text(content, self.text_hints));
        }
        self.text.clear();
        self.text_hints = StyleHints::default();
    }

    fn block_hints(&self, element: &Element, inherited: StyleHints) -> StyleHints {
        let mut hints = inherited;
        if let Some(level) = heading_level(&element.name) {
            hints = hints.merged_with(&StyleHints {
                font_size: Some(self.settings.heading_font_size(level)),
                bold: Some(true),
                ..StyleHints::default()
            });
        }
        hints = hints.merged_with(&self.stylesheet.hints_for(element));
        if let Some(style) = element.attr("style") {
            hints = hints.merged_with(&parse_declarations(style));
        }
        hints
    }

    fn image(&mut self, element: &Element) {
        let Some(src) = element.attr("src") else {
            return;
        };
        if !src.trim_start().starts_with("data:") {
            log::debug!("Ignoring non-inline image source");
            return;
        }
        let decoded = crate::model::EncodedImage::from_data_url(src)
            .map_err(|e| e.to_string())
            .and_then(|img| probe_image(&img.bytes).map_err(|e| e.to_string()));
        match decoded {
            Ok(block) => self.blocks.push(LayoutBlock::Image(block)),
            Err(e) => {
                log::warn!("Skipping markup image: {}", e);
                self.skipped += 1;
            }
        }
    }

    fn walk(&mut self, nodes: &[Node], hints: StyleHints) {
        for node in nodes {
            match node {
                Node::Text(raw) => self.push_text(raw, hints),
                Node::Element(element) => self.element(element, hints),
            }
        }
    }

    fn element(&mut self, element: &Element, inherited: StyleHints) {
        if is_excluded(element) || SKIPPED_TAGS.contains(&element.name.as_str()) {
            return;
        }

        match element.name.as_str() {
            "br" | "hr" => {
                self.flush();
                self.blocks.push(LayoutBlock::LineBreak);
            }
            "img" => {
                self.flush();
                self.image(element);
            }
            name if INLINE_TAGS.contains(&name) => self.walk(&element.children, inherited),
            name if BLOCK_TAGS.contains(&name) => {
                self.flush();
                let hints = self.block_hints(element, inherited);
                self.walk(&element.children, hints);
                self.flush();
            }
            _ => {
                self.flush();
                self.walk(&element.children, inherited);
                self.flush();
            }
        }
    }
}

/// Columns for the data table
///
/// Configured columns apply when the first row carries any configured key.
/// Otherwise the first row's own keys become columns of equal width.
pub fn resolve_columns(rows: &[Record], configured: &[TableColumn]) -> Vec<TableColumn> {
    let Some(first) = rows.first() else {
        return configured.to_vec();
    };
    if configured.iter().any(|c| first.contains_key(&c.field_key)) {
        return configured.to_vec();
    }
    first
        .keys()
        .map(|key| TableColumn::new(key.clone(), key.clone(), 100.0))
        .collect()
}

/// Normalize a request into layout blocks
pub fn normalize(request: &ReportRequest, settings: &Settings) -> Normalized {
    let title_hints = StyleHints {
        font_size: Some(settings.title_font_size),
        color: Some(settings.title_color),
        align: Some(Align::Center),
        bold: Some(true),
    };

    let mut walker = Walker::new(settings, Stylesheet::parse(&request.stylesheet));
    walker
        .blocks
        .push(LayoutBlock::styled_text(request.title.clone(), title_hints));

    if !request.markup.trim().is_empty() {
        let tree = parse_fragment(&request.markup);
        walker.walk(&tree, StyleHints::default());
        walker.flush();
    }

    for (i, image) in request.images.iter().enumerate() {
        match probe_image(&image.bytes) {
            Ok(block) => walker.blocks.push(LayoutBlock::Image(block)),
            Err(e) => {
                log::warn!("Skipping image {}: {}", i, e);
                walker.skipped += 1;
            }
        }
    }

    if !request.rows.is_empty() {
        walker.blocks.push(LayoutBlock::Table(TableBlock {
            columns: resolve_columns(&request.rows, &settings.table.columns),
            rows: request.rows.clone(),
        }));
    }

    log::debug!(
        "Normalized request into {} blocks ({} assets skipped)",
        walker.blocks.len(),
        walker.skipped
    );

    Normalized {
        blocks: walker.blocks,
        skipped_assets: walker.skipped,
    }
}

fn strip_excluded(nodes: Vec<Node>) -> Vec<Node> {
    nodes
        .into_iter()
        .filter_map(|node| match node {
            Node::Element(el) if is_excluded(&el) => None,
            Node::Element(mut el) => {
                el.children = strip_excluded(el.children);
                Some(Node::Element(el))
            }
            text => Some(text),
        })
        .collect()
}

/// Parsed markup with excluded elements removed
pub fn printable_nodes(markup: &str) -> Vec<Node> {
    strip_excluded(parse_fragment(markup))
}
