//! HTML front end: a minimal tag splitter feeding the tag interpreter, plus
//! the CSS, list and table machinery the interpreter drives.

pub mod css;
mod interpreter;
pub mod list;
pub mod style;
pub mod table;

use std::sync::OnceLock;

use regex::Regex;

pub use interpreter::{HtmlRenderer, supported_tags};

/// One element of the alternating text/tag sequence.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Text(String),
    Open { name: String, attrs: Attributes },
    Close(String),
}

/// Tag attributes in source order. Names are lowercased, values have their
/// entities decoded.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.iter().any(|(n, _)| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Attributes {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Attributes(
            pairs
                .iter()
                .map(|(n, v)| (n.to_ascii_lowercase(), v.to_string()))
                .collect(),
        )
    }
}

static ATTRIBUTE_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

fn attribute_regex() -> Option<&'static Regex> {
    ATTRIBUTE_REGEX
        .get_or_init(|| {
            Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#).ok()
        })
        .as_ref()
}

fn parse_attributes(src: &str) -> Attributes {
    let Some(re) = attribute_regex() else {
        return Attributes::default();
    };
    let attrs = re
        .captures_iter(src)
        .map(|cap| {
            let name = cap[1].to_ascii_lowercase();
            let value = cap
                .get(2)
                .or_else(|| cap.get(3))
                .or_else(|| cap.get(4))
                .map(|m| decode_entities(m.as_str()))
                .unwrap_or_default();
            (name, value)
        })
        .collect();
    Attributes(attrs)
}

/// Elements whose content is raw text up to the matching close tag.
const RAW_TEXT: &[&str] = &["script", "style"];

/// Split `html` into text and tag tokens. Comments, doctypes and processing
/// instructions are dropped; `<script>` and `<style>` bodies come through as
/// one raw text token.
pub fn tokenize(html: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = html;
    while !rest.is_empty() {
        let Some(lt) = rest.find('<') else {
            push_text(&mut tokens, rest);
            break;
        };
        push_text(&mut tokens, &rest[..lt]);
        rest = &rest[lt..];

        if let Some(body) = rest.strip_prefix("<!--") {
            rest = body.find("-->").map_or("", |end| &body[end + 3..]);
            continue;
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            rest = rest.find('>').map_or("", |end| &rest[end + 1..]);
            continue;
        }
        let Some(gt) = rest.find('>') else {
            push_text(&mut tokens, rest);
            break;
        };
        let inner = &rest[1..gt];
        rest = &rest[gt + 1..];

        if let Some(name) = inner.strip_prefix('/') {
            let name = name.trim().to_ascii_lowercase();
            if !name.is_empty() {
                tokens.push(Token::Close(name));
            }
            continue;
        }
        let inner = inner.trim_end_matches('/');
        let name_end = inner
            .find(|c: char| c.is_whitespace())
            .unwrap_or(inner.len());
        let name = inner[..name_end].to_ascii_lowercase();
        if name.is_empty() || !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
            push_text(&mut tokens, &format!("<{inner}>"));
            continue;
        }
        let attrs = parse_attributes(&inner[name_end..]);
        let raw = RAW_TEXT.contains(&name.as_str());
        tokens.push(Token::Open {
            name: name.clone(),
            attrs,
        });
        if raw {
            let close = format!("</{name}");
            let end = rest.to_ascii_lowercase().find(&close).unwrap_or(rest.len());
            if end > 0 {
                tokens.push(Token::Text(rest[..end].to_string()));
            }
            rest = &rest[end..];
        }
    }
    tokens
}

fn push_text(tokens: &mut Vec<Token>, text: &str) {
    if !text.is_empty() {
        tokens.push(Token::Text(decode_entities(text)));
    }
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "euro" => '€',
        "cent" => '¢',
        "pound" => '£',
        "yen" => '¥',
        "sect" => '§',
        "para" => '¶',
        "deg" => '°',
        "plusmn" => '±',
        "times" => '×',
        "divide" => '÷',
        "middot" => '·',
        "bull" => '•',
        "hellip" => '…',
        "ndash" => '–',
        "mdash" => '—',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "laquo" => '«',
        "raquo" => '»',
        "iexcl" => '¡',
        "iquest" => '¿',
        "szlig" => 'ß',
        "auml" => 'ä',
        "ouml" => 'ö',
        "uuml" => 'ü',
        "Auml" => 'Ä',
        "Ouml" => 'Ö',
        "Uuml" => 'Ü',
        "eacute" => 'é',
        "egrave" => 'è',
        "ecirc" => 'ê',
        "aacute" => 'á',
        "agrave" => 'à',
        "acirc" => 'â',
        "ccedil" => 'ç',
        "ntilde" => 'ñ',
        "oacute" => 'ó',
        "uacute" => 'ú',
        "iacute" => 'í',
        _ => return None,
    };
    Some(c)
}

/// Replace character references (`&amp;`, `&#233;`, `&#xE9;`). Unknown
/// references are kept verbatim.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest[1..].find(';').filter(|&end| end <= 10).and_then(|end| {
            let name = &rest[1..end + 1];
            let c = if let Some(num) = name.strip_prefix('#') {
                let code = match num.strip_prefix(['x', 'X']) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => num.parse().ok(),
                };
                code.and_then(char::from_u32)
            } else {
                named_entity(name)
            };
            c.map(|c| (c, end + 2))
        });
        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternates_text_and_tags() {
        let tokens = tokenize("<p class=\"a b\" id=x>Hi <b>there</b></p>");
        assert_eq!(tokens.len(), 6);
        match &tokens[0] {
            Token::Open { name, attrs } => {
                assert_eq!(name, "p");
                assert_eq!(attrs.get("class"), Some("a b"));
                assert_eq!(attrs.get("id"), Some("x"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(tokens[1], Token::Text("Hi ".into()));
        assert_eq!(tokens[5], Token::Close("p".into()));
    }

    #[test]
    fn skips_comments_and_keeps_style_raw() {
        let tokens = tokenize("<!DOCTYPE html><!-- <b>no</b> --><style>p > b { color: red }</style>x");
        assert_eq!(tokens[0], Token::Open { name: "style".into(), attrs: Attributes::default() });
        assert_eq!(tokens[1], Token::Text("p > b { color: red }".into()));
        assert_eq!(tokens[2], Token::Close("style".into()));
        assert_eq!(tokens[3], Token::Text("x".into()));
    }

    #[test]
    fn self_closing_and_bare_attributes() {
        let tokens = tokenize("<br/><input type='checkbox' checked>");
        assert!(matches!(&tokens[0], Token::Open { name, .. } if name == "br"));
        match &tokens[1] {
            Token::Open { attrs, .. } => {
                assert!(attrs.has("checked"));
                assert_eq!(attrs.get("type"), Some("checkbox"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn entities_decode() {
        assert_eq!(decode_entities("a &amp; b &#65;&#x42; &bogus; &"), "a & b AB &bogus; &");
        assert_eq!(decode_entities("x&nbsp;y"), "x\u{a0}y");
    }
}
