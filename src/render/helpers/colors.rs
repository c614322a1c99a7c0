use printpdf::Rgb;

use crate::model::Color;

/// Convert to a printpdf fill color
pub fn to_pdf_color(color: Color) -> printpdf::Color {
    printpdf::Color::Rgb(Rgb {
        r: color.r,
        g: color.g,
        b: color.b,
        icc_profile: None,
    })
}

/// PDF operator operands (`r g b`) for a fill color
pub fn rgb_operands(color: Color) -> String {
    format!("{:.3} {:.3} {:.3}", color.r, color.g, color.b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_operands() {
        assert_eq!(rgb_operands(Color::new(1.0, 0.5, 0.0)), "1.000 0.500 0.000");
    }
}
