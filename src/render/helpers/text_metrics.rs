//! Text measurement for the builtin Helvetica faces
//!
//! Widths come from the Adobe AFM files (1000 units per em). All backends use
//! these metrics so line wrapping and cell truncation agree between them.

use std::sync::OnceLock;

use printpdf::BuiltinFont;

/// Ellipsis appended to truncated cell text
pub const ELLIPSIS: &str = "...";

/// Typeface used for a run of text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Face {
    #[default]
    Regular,
    Bold,
}

impl Face {
    pub fn from_bold(bold: bool) -> Self {
        if bold {
            Face::Bold
        } else {
            Face::Regular
        }
    }

    pub fn builtin(&self) -> BuiltinFont {
        match self {
            Face::Regular => BuiltinFont::Helvetica,
            Face::Bold => BuiltinFont::HelveticaBold,
        }
    }

    /// PostScript name used in `/BaseFont`
    pub fn base_font(&self) -> &'static str {
        match self {
            Face::Regular => "Helvetica",
            Face::Bold => "Helvetica-Bold",
        }
    }
}

/// Measures strings set in one Helvetica face
pub struct HelveticaMeasurer {
    widths: &'static [u16; 128],
}

impl HelveticaMeasurer {
    fn char_width(&self, c: char) -> u16 {
        if !c.is_ascii() {
            return 556;
        }
        match self.widths[c as usize] {
            0 => 278,
            w => w,
        }
    }

    /// Width in points
    pub fn width_pt(&self, text: &str, font_size: f32) -> f32 {
        let units: u32 = text.chars().map(|c| self.char_width(c) as u32).sum();
        units as f32 / 1000.0 * font_size
    }

    /// Greedy word wrap to `max_width` points. Words wider than a line are
    /// broken by character. Always returns at least one line.
    pub fn wrap(&self, text: &str, font_size: f32, max_width: f32) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = String::new();

        for word in text.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{} {}", current, word)
            };

            if self.width_pt(&candidate, font_size) <= max_width {
                current = candidate;
                continue;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }

            if self.width_pt(word, font_size) <= max_width {
                current = word.to_string();
            } else {
                for c in word.chars() {
                    current.push(c);
                    if self.width_pt(&current, font_size) > max_width && current.chars().count() > 1
                    {
                        current.pop();
                        lines.push(std::mem::take(&mut current));
                        current.push(c);
                    }
                }
            }
        }

        if !current.is_empty() || lines.is_empty() {
            lines.push(current);
        }
        lines
    }

    /// Shorten `text` with a trailing ellipsis so it fits in `max_width` points
    pub fn truncate(&self, text: &str, font_size: f32, max_width: f32) -> String {
        if self.width_pt(text, font_size) <= max_width {
            return text.to_string();
        }

        let budget = max_width - self.width_pt(ELLIPSIS, font_size);
        if budget <= 0.0 {
            return String::new();
        }

        let mut out = String::new();
        let mut used = 0.0;
        for c in text.chars() {
            let w = self.char_width(c) as f32 / 1000.0 * font_size;
            if used + w > budget {
                break;
            }
            used += w;
            out.push(c);
        }
        let mut out = out.trim_end().to_string();
        out.push_str(ELLIPSIS);
        out
    }
}

/// Get the measurer for a face
pub fn measurer(face: Face) -> &'static HelveticaMeasurer {
    static REGULAR: OnceLock<HelveticaMeasurer> = OnceLock::new();
    static BOLD: OnceLock<HelveticaMeasurer> = OnceLock::new();
    match face {
        Face::Regular => REGULAR.get_or_init(|| HelveticaMeasurer {
            widths: &HELVETICA_WIDTHS,
        }),
        Face::Bold => BOLD.get_or_init(|| HelveticaMeasurer {
            widths: &HELVETICA_BOLD_WIDTHS,
        }),
    }
}

/// Map text onto the WinAnsi repertoire of the builtin fonts.
/// Characters outside it become `?`.
pub fn win_ansi_text(text: &str) -> String {
    text.chars()
        .map(|c| if win_ansi_byte(c).is_some() { c } else { '?' })
        .collect()
}

/// WinAnsiEncoding byte for a character
pub fn win_ansi_byte(c: char) -> Option<u8> {
    let byte = match c {
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{2122}' => 0x99,
        '\u{00A0}' => 0x20,
        c if (c as u32) < 0x80 || (0xA0..=0xFF).contains(&(c as u32)) => c as u8,
        _ => return None,
    };
    Some(byte)
}

/// Helvetica character widths
#[rustfmt::skip]
static HELVETICA_WIDTHS: [u16; 128] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, 0,
];

/// Helvetica-Bold character widths
#[rustfmt::skip]
static HELVETICA_BOLD_WIDTHS: [u16; 128] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, 0,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_measurement() {
        let m = measurer(Face::Regular);
        // "Hello" = 722 + 556 + 222 + 222 + 556 = 2278 units
        assert!((m.width_pt("Hello", 10.0) - 22.78).abs() < 1e-3);
        assert!(measurer(Face::Bold).width_pt("Hello", 10.0) > m.width_pt("Hello", 10.0));
    }

    #[test]
    fn test_wrap_respects_width() {
        let m = measurer(Face::Regular);
        let text = "The quick brown fox jumps over the lazy dog again and again";
        let lines = m.wrap(text, 12.0, 120.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(m.width_pt(line, 12.0) <= 120.0, "line too wide: {}", line);
        }
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn test_wrap_breaks_long_words() {
        let m = measurer(Face::Regular);
        let lines = m.wrap(&"W".repeat(40), 12.0, 50.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat().len(), 40);
    }

    #[test]
    fn test_wrap_empty_gives_one_line() {
        assert_eq!(measurer(Face::Regular).wrap("", 12.0, 100.0), vec![String::new()]);
    }

    #[test]
    fn test_truncate_with_ellipsis() {
        let m = measurer(Face::Regular);
        assert_eq!(m.truncate("short", 10.0, 100.0), "short");

        let long = "averyveryverylongemailaddress@example.com";
        let cut = m.truncate(long, 10.0, 60.0);
        assert!(cut.ends_with(ELLIPSIS));
        assert!(m.width_pt(&cut, 10.0) <= 60.0);
    }

    #[test]
    fn test_win_ansi_mapping() {
        assert_eq!(win_ansi_text("Café €5 \u{4e2d}"), "Café €5 ?");
        assert_eq!(win_ansi_byte('é'), Some(0xE9));
        assert_eq!(win_ansi_byte('\u{2026}'), Some(0x85));
    }
}
