//! Constrained markup parser
//!
//! Tokenizes an HTML fragment with nom and builds a small element tree.
//! Only the structure needed for block extraction is modelled: elements with
//! attributes, and text. Anything that does not parse as a tag is kept as
//! literal text.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_till1, take_until, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::opt,
    multi::many0,
    sequence::{delimited, preceded},
    IResult, Parser,
};

/// Elements that never have children
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose content is raw text up to the matching end tag
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Elements whose text keeps its whitespace when minified
const PRESERVE_WHITESPACE: &[&str] = &["pre", "textarea", "script", "style"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    StartTag {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    /// Source text with entities left intact
    Text(String),
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    fn new(name: String, attrs: Vec<(String, String)>) -> Self {
        Self {
            name,
            attrs,
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Source text with entities left intact
    Text(String),
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':'
}

fn tag_name(input: &str) -> IResult<&str, &str> {
    let (rest, name) = take_while1(is_name_char)(input)?;
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Alpha,
        )));
    }
    Ok((rest, name))
}

fn attr_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| {
        !c.is_whitespace() && !matches!(c, '=' | '>' | '/' | '"' | '\'' | '<')
    })(input)
}

fn attr_value(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_till(|c| c == '"'), char('"')),
        delimited(char('\''), take_till(|c| c == '\''), char('\'')),
        take_till1(|c: char| c.is_whitespace() || matches!(c, '>' | '"' | '\'')),
    ))
    .parse(input)
}

/// Parse ` name="value"`, ` name=value` or a bare ` name`
fn attribute(input: &str) -> IResult<&str, (String, String)> {
    let (input, _) = multispace1(input)?;
    let (input, name) = attr_name(input)?;
    let (input, value) =
        opt(preceded((multispace0, char('='), multispace0), attr_value)).parse(input)?;
    Ok((
        input,
        (name.to_ascii_lowercase(), value.unwrap_or("").to_string()),
    ))
}

fn start_tag(input: &str) -> IResult<&str, Token> {
    let (input, _) = char('<')(input)?;
    let (input, name) = tag_name(input)?;
    let (input, attrs) = many0(attribute).parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, slash) = opt(char('/')).parse(input)?;
    let (input, _) = char('>')(input)?;

    Ok((
        input,
        Token::StartTag {
            name: name.to_ascii_lowercase(),
            attrs,
            self_closing: slash.is_some(),
        },
    ))
}

fn end_tag(input: &str) -> IResult<&str, Token> {
    let (input, _) = tag("</")(input)?;
    let (input, name) = tag_name(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char('>')(input)?;
    Ok((
        input,
        Token::EndTag {
            name: name.to_ascii_lowercase(),
        },
    ))
}

fn comment(input: &str) -> IResult<&str, Token> {
    let (input, _) = delimited(tag("<!--"), take_until("-->"), tag("-->")).parse(input)?;
    Ok((input, Token::Comment))
}

/// `<!DOCTYPE ...>` and `<?xml ...?>`
fn declaration(input: &str) -> IResult<&str, Token> {
    let (input, _) = (
        alt((tag("<!"), tag("<?"))),
        take_till(|c| c == '>'),
        char('>'),
    )
        .parse(input)?;
    Ok((input, Token::Comment))
}

fn markup_token(input: &str) -> IResult<&str, Token> {
    alt((comment, declaration, end_tag, start_tag)).parse(input)
}

/// Split raw text content off for `<script>`/`<style>`. Returns (content, rest).
fn split_raw_text<'a>(input: &'a str, name: &str) -> (&'a str, &'a str) {
    let closing = format!("</{}", name);
    let lowered = input.to_ascii_lowercase();
    match lowered.find(&closing) {
        Some(idx) => (&input[..idx], &input[idx..]),
        None => (input, ""),
    }
}

/// Tokenize a markup fragment. Never fails: fragments that do not form a
/// valid tag become text tokens with the `<` escaped.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = input;

    while !rest.is_empty() {
        if !rest.starts_with('<') {
            let end = rest.find('<').unwrap_or(rest.len());
            tokens.push(Token::Text(rest[..end].to_string()));
            rest = &rest[end..];
            continue;
        }

        match markup_token(rest) {
            Ok((next, token)) => {
                rest = next;
                let raw_name = match &token {
                    Token::StartTag {
                        name,
                        self_closing: false,
                        ..
                    } if RAW_TEXT_ELEMENTS.contains(&name.as_str()) => Some(name.clone()),
                    _ => None,
                };
                tokens.push(token);
                if let Some(name) = raw_name {
                    let (content, after) = split_raw_text(rest, &name);
                    if !content.is_empty() {
                        tokens.push(Token::Text(content.to_string()));
                    }
                    rest = after;
                }
            }
            Err(_) => {
                // Not a tag: keep the fragment up to the next '<' as literal text
                let end = rest[1..].find('<').map(|i| i + 1).unwrap_or(rest.len());
                tokens.push(Token::Text(format!("&lt;{}", &rest[1..end])));
                rest = &rest[end..];
            }
        }
    }

    tokens
}

/// Parse a markup fragment into a list of top-level nodes.
///
/// End tags close back to the nearest open element of the same name; end tags
/// with no open match are dropped. Elements left open at the end are closed.
pub fn parse_fragment(input: &str) -> Vec<Node> {
    // stack[0] is a synthetic root
    let mut stack: Vec<Element> = vec![Element::new(String::new(), Vec::new())];

    fn close_top(stack: &mut Vec<Element>) {
        if stack.len() > 1 {
            if let Some(done) = stack.pop() {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Element(done));
                }
            }
        }
    }

    for token in tokenize(input) {
        match token {
            Token::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.children.push(Node::Text(text));
                }
            }
            Token::Comment => {}
            Token::StartTag {
                name,
                attrs,
                self_closing,
            } => {
                // A new paragraph or list item implicitly ends an open one
                if (name == "p" || name == "li")
                    && stack.last().map(|e| e.name == name).unwrap_or(false)
                {
                    close_top(&mut stack);
                }

                let element = Element::new(name, attrs);
                if self_closing || element.is_void() {
                    if let Some(current) = stack.last_mut() {
                        current.children.push(Node::Element(element));
                    }
                } else {
                    stack.push(element);
                }
            }
            Token::EndTag { name } => {
                let open_at = stack.iter().rposition(|e| e.name == name);
                if let Some(idx) = open_at.filter(|&i| i > 0) {
                    while stack.len() > idx {
                        close_top(&mut stack);
                    }
                }
            }
        }
    }

    while stack.len() > 1 {
        close_top(&mut stack);
    }
    stack.pop().map(|root| root.children).unwrap_or_default()
}

/// Serialize nodes back to markup
pub fn serialize(nodes: &[Node]) -> String {
    write_nodes(nodes, false)
}

/// Like [`serialize`], with every run of whitespace in text collapsed to a
/// single space outside `pre`, `textarea`, `script` and `style`
pub fn serialize_minified(nodes: &[Node]) -> String {
    write_nodes(nodes, true)
}

fn write_nodes(nodes: &[Node], collapse: bool) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(&mut out, node, collapse);
    }
    out
}

fn write_node(out: &mut String, node: &Node, collapse: bool) {
    match node {
        Node::Text(text) if collapse => push_collapsed(out, text),
        Node::Text(text) => out.push_str(text),
        Node::Element(el) => {
            out.push('<');
            out.push_str(&el.name);
            for (k, v) in &el.attrs {
                out.push(' ');
                out.push_str(k);
                out.push_str("=\"");
                out.push_str(&v.replace('"', "&quot;"));
                out.push('"');
            }
            out.push('>');
            if el.is_void() {
                return;
            }
            let collapse = collapse && !PRESERVE_WHITESPACE.contains(&el.name.as_str());
            for child in &el.children {
                write_node(out, child, collapse);
            }
            out.push_str("</");
            out.push_str(&el.name);
            out.push('>');
        }
    }
}

fn push_collapsed(out: &mut String, text: &str) {
    // Adjacent text nodes (split by a dropped comment) share one space
    let mut in_space = out.ends_with(' ');
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
}

/// Decode the common named entities and numeric character references
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let decoded = after.find(';').filter(|&semi| semi <= 10).and_then(|semi| {
            let entity = &after[..semi];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                "nbsp" => Some(' '),
                _ => entity.strip_prefix('#').and_then(|num| {
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };
            c.map(|c| (c, semi))
        });

        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &after[semi + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
