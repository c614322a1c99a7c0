use crate::error::ConfigError;

/// An RGB color with components in 0.0-1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub const fn gray(level: f32) -> Self {
        Self::new(level, level, level)
    }

    /// Composite this color at `opacity` over a white background.
    ///
    /// Pages are always white, so this gives the same visual result as a
    /// transparent fill without needing graphics-state support in every backend.
    pub fn over_white(self, opacity: f32) -> Self {
        let a = opacity.clamp(0.0, 1.0);
        Self {
            r: self.r * a + (1.0 - a),
            g: self.g * a + (1.0 - a),
            b: self.b * a + (1.0 - a),
        }
    }

    /// CSS hex form (`#rrggbb`)
    pub fn to_hex(self) -> String {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", c(self.r), c(self.g), c(self.b))
    }

    /// Parse a CSS color: `#rgb`, `#rrggbb`, `rgb(r, g, b)` or a basic named color.
    pub fn parse_css(value: &str) -> Result<Self, ConfigError> {
        let value = value.trim().to_ascii_lowercase();
        if let Some(hex) = value.strip_prefix('#') {
            return parse_hex(hex).ok_or(ConfigError::InvalidColor(value.clone()));
        }
        if let Some(args) = value
            .strip_prefix("rgba(")
            .or_else(|| value.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let parts: Vec<&str> = args.split(',').map(str::trim).collect();
            if parts.len() < 3 {
                return Err(ConfigError::InvalidColor(value.clone()));
            }
            let mut channels = [0.0f32; 3];
            for (slot, part) in channels.iter_mut().zip(&parts) {
                let n: f32 = part
                    .parse()
                    .map_err(|_| ConfigError::InvalidColor(value.clone()))?;
                *slot = (n / 255.0).clamp(0.0, 1.0);
            }
            return Ok(Self::new(channels[0], channels[1], channels[2]));
        }
        named_color(&value).ok_or(ConfigError::InvalidColor(value))
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return None,
    };
    let byte = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok();
    Some(Color::new(
        byte(0)? as f32 / 255.0,
        byte(2)? as f32 / 255.0,
        byte(4)? as f32 / 255.0,
    ))
}

fn named_color(name: &str) -> Option<Color> {
    let c = match name {
        "black" => Color::gray(0.0),
        "white" => Color::gray(1.0),
        "gray" | "grey" => Color::gray(0.5),
        "silver" => Color::gray(0.75),
        "red" => Color::new(1.0, 0.0, 0.0),
        "green" => Color::new(0.0, 0.5, 0.0),
        "darkgreen" => Color::new(0.0, 0.39, 0.0),
        "blue" => Color::new(0.0, 0.0, 1.0),
        "navy" => Color::new(0.0, 0.0, 0.5),
        "orange" => Color::new(1.0, 0.65, 0.0),
        "purple" => Color::new(0.5, 0.0, 0.5),
        "teal" => Color::new(0.0, 0.5, 0.5),
        _ => return None,
    };
    Some(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!(Color::parse_css("#fff").unwrap(), Color::gray(1.0));
        let c = Color::parse_css("#006400").unwrap();
        assert!((c.g - 100.0 / 255.0).abs() < 1e-6);
        assert_eq!(c.to_hex(), "#006400");
    }

    #[test]
    fn test_parse_rgb_function() {
        let c = Color::parse_css("rgb(255, 0, 128)").unwrap();
        assert!((c.r - 1.0).abs() < 1e-6);
        assert!((c.b - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_color() {
        assert!(Color::parse_css("not-a-color").is_err());
        assert!(Color::parse_css("#12").is_err());
    }

    #[test]
    fn test_over_white() {
        let tint = Color::gray(0.94).over_white(0.3);
        assert!((tint.r - 0.982).abs() < 1e-4);
        assert_eq!(Color::gray(0.2).over_white(1.0), Color::gray(0.2));
    }
}
