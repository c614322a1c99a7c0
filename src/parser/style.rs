//! Style hints from inline `style` attributes and simple stylesheets
//!
//! Only `font-size`, `color`, `text-align` and `font-weight` are understood.
//! Stylesheet support covers `tag { }` and `.class { }` rules, optionally in
//! comma lists. At-rules and compound selectors are skipped.

use crate::model::{Align, Color, StyleHints};

use super::markup::Element;

/// Points per CSS pixel
const PX_TO_PT: f32 = 0.75;

/// Base size for `em`/`rem` units, in points
const EM_BASE_PT: f32 = 12.0;

/// Parse a CSS length into points
pub fn parse_font_size(value: &str) -> Option<f32> {
    let value = value.trim().to_ascii_lowercase();
    let (number, factor) = if let Some(n) = value.strip_suffix("px") {
        (n, PX_TO_PT)
    } else if let Some(n) = value.strip_suffix("pt") {
        (n, 1.0)
    } else if let Some(n) = value.strip_suffix("rem") {
        (n, EM_BASE_PT)
    } else if let Some(n) = value.strip_suffix("em") {
        (n, EM_BASE_PT)
    } else {
        (value.as_str(), PX_TO_PT)
    };

    let size: f32 = number.trim().parse().ok()?;
    let size = size * factor;
    (size > 0.0 && size.is_finite()).then_some(size)
}

fn parse_font_weight(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "bold" | "bolder" => Some(true),
        "normal" | "lighter" => Some(false),
        numeric => numeric.parse::<u16>().ok().map(|w| w >= 600),
    }
}

/// Parse a declaration list (`a: b; c: d`)
pub fn parse_declarations(block: &str) -> StyleHints {
    let mut hints = StyleHints::default();

    for declaration in block.split(';') {
        let Some((property, value)) = declaration.split_once(':') else {
            continue;
        };
        let value = value.trim().trim_end_matches("!important").trim();
        match property.trim().to_ascii_lowercase().as_str() {
            "font-size" => hints.font_size = parse_font_size(value).or(hints.font_size),
            "color" => match Color::parse_css(value) {
                Ok(color) => hints.color = Some(color),
                Err(e) => log::debug!("Ignoring style value: {}", e),
            },
            "text-align" => hints.align = Align::from_css(value).or(hints.align),
            "font-weight" => hints.bold = parse_font_weight(value).or(hints.bold),
            _ => {}
        }
    }

    hints
}

#[derive(Debug, Clone, PartialEq)]
enum Selector {
    Tag(String),
    Class(String),
}

impl Selector {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let is_ident = |s: &str| {
            !s.is_empty()
                && s.chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        };
        if let Some(class) = raw.strip_prefix('.') {
            // Escaped colons, e.g. `.print\:hidden`
            let class = class.replace("\\:", ":");
            let plain = class.replace(':', "");
            return is_ident(&plain).then_some(Selector::Class(class));
        }
        is_ident(raw).then(|| Selector::Tag(raw.to_ascii_lowercase()))
    }

    fn matches(&self, element: &Element) -> bool {
        match self {
            Selector::Tag(name) => element.name == *name,
            Selector::Class(class) => element.has_class(class),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Rule {
    selector: Selector,
    hints: StyleHints,
}

/// Parsed stylesheet of simple rules, in source order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stylesheet {
    rules: Vec<Rule>,
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        rest = match rest[start + 2..].find("*/") {
            Some(end) => &rest[start + 2 + end + 2..],
            None => "",
        };
    }
    out.push_str(rest);
    out
}

fn is_css_punct(c: char) -> bool {
    matches!(c, '{' | '}' | ';' | ',')
}

/// Compact a stylesheet: comments dropped, whitespace runs collapsed to one
/// space and removed next to `{ } ; ,`. Quoted strings are kept as written.
pub fn minify_css(css: &str) -> String {
    let css = strip_comments(css);
    let mut out = String::with_capacity(css.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut pending_space = false;

    for c in css.chars() {
        if let Some(q) = quote {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() && !is_css_punct(c) && !out.ends_with(is_css_punct) {
            out.push(' ');
        }
        pending_space = false;
        if c == '"' || c == '\'' {
            quote = Some(c);
        }
        out.push(c);
    }
    out
}

/// Skip a `{ ... }` block starting at the first `{` in `input`, honoring nesting
fn skip_block(input: &str) -> &str {
    let Some(open) = input.find('{') else {
        // Statement at-rule such as `@import url(x);`
        return input.find(';').map(|i| &input[i + 1..]).unwrap_or("");
    };
    if input[..open].contains(';') {
        let semi = input.find(';').unwrap_or(open);
        return &input[semi + 1..];
    }

    let mut depth = 0usize;
    for (i, c) in input[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return &input[open + i + 1..];
                }
            }
            _ => {}
        }
    }
    ""
}

impl Stylesheet {
    pub fn parse(css: &str) -> Self {
        let css = strip_comments(css);
        let mut rules = Vec::new();
        let mut rest = css.as_str();

        loop {
            rest = rest.trim_start();
            if rest.is_empty() {
                break;
            }
            if rest.starts_with('@') {
                rest = skip_block(rest);
                continue;
            }

            let Some(open) = rest.find('{') else { break };
            let Some(close) = rest[open..].find('}').map(|i| open + i) else {
                break;
            };
            let selectors = &rest[..open];
            let hints = parse_declarations(&rest[open + 1..close]);
            rest = &rest[close + 1..];

            if hints.is_empty() {
                continue;
            }
            for raw in selectors.split(',') {
                match Selector::parse(raw) {
                    Some(selector) => rules.push(Rule { selector, hints }),
                    None => log::debug!("Skipping unsupported selector '{}'", raw.trim()),
                }
            }
        }

        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Hints from matching rules. Class rules win over tag rules; later rules
    /// win within the same kind.
    pub fn hints_for(&self, element: &Element) -> StyleHints {
        let tag_hints = self
            .rules
            .iter()
            .filter(|r| matches!(r.selector, Selector::Tag(_)) && r.selector.matches(element))
            .fold(StyleHints::default(), |acc, r| acc.merged_with(&r.hints));

        self.rules
            .iter()
            .filter(|r| matches!(r.selector, Selector::Class(_)) && r.selector.matches(element))
            .fold(tag_hints, |acc, r| acc.merged_with(&r.hints))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::markup::{parse_fragment, Node};

    fn first_element(markup: &str) -> Element {
        match parse_fragment(markup).into_iter().next() {
            Some(Node::Element(e)) => e,
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn test_font_size_units() {
        assert_eq!(parse_font_size("16px"), Some(12.0));
        assert_eq!(parse_font_size("14pt"), Some(14.0));
        assert_eq!(parse_font_size("1.5em"), Some(18.0));
        assert_eq!(parse_font_size("2rem"), Some(24.0));
        assert_eq!(parse_font_size("large"), None);
        assert_eq!(parse_font_size("-4px"), None);
    }

    #[test]
    fn test_inline_declarations() {
        let hints =
            parse_declarations("font-size: 20px; color: #333; text-align: center; font-weight: 700");
        assert_eq!(hints.font_size, Some(15.0));
        assert_eq!(hints.color, Some(Color::parse_css("#333").unwrap()));
        assert_eq!(hints.align, Some(Align::Center));
        assert_eq!(hints.bold, Some(true));
    }

    #[test]
    fn test_unknown_properties_ignored() {
        let hints = parse_declarations("margin: 4px; color: notacolor; display:block");
        assert!(hints.is_empty());
    }

    #[test]
    fn test_stylesheet_rules() {
        let sheet = Stylesheet::parse(
            "/* header */ h1, .title { color: red } p { text-align: right }
             @media print { p { color: blue } }
             div p { color: green }
             .lead { font-size: 18pt }",
        );

        let h1 = first_element("<h1>x</h1>");
        assert_eq!(sheet.hints_for(&h1).color, Some(Color::new(1.0, 0.0, 0.0)));

        let p = first_element(r#"<p class="lead">x</p>"#);
        let hints = sheet.hints_for(&p);
        assert_eq!(hints.align, Some(Align::Right));
        assert_eq!(hints.font_size, Some(18.0));
        // Neither the @media body nor the compound selector applies
        assert_eq!(hints.color, None);
    }

    #[test]
    fn test_class_beats_tag() {
        let sheet = Stylesheet::parse(".warn { color: #ff0000 } p { color: #0000ff }");
        let p = first_element(r#"<p class="warn">x</p>"#);
        assert_eq!(sheet.hints_for(&p).color, Some(Color::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_empty_and_malformed_stylesheets() {
        assert!(Stylesheet::parse("").is_empty());
        assert!(Stylesheet::parse("p { color: red").is_empty());
        assert!(Stylesheet::parse("@import url(x.css);").is_empty());
    }

    #[test]
    fn test_minify_css() {
        let css = "/* head */\nh1 ,  .lead {\n  color : red;\n  font-family: \"Open  Sans\";\n}\n\np { margin: 0 auto }\n";
        assert_eq!(
            minify_css(css),
            "h1,.lead{color : red;font-family: \"Open  Sans\";}p{margin: 0 auto}"
        );
    }
}
