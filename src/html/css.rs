//! Single-level CSS: `<style>` blocks, linked sheets and inline `style`
//! attributes reduced to `selector -> {PROPERTY: value}` maps.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use regex::Regex;

use crate::pdf::Color;

/// Declarations with uppercase property names; the last declaration wins.
pub type Properties = BTreeMap<String, String>;

static COMMENT_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static RULE_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

fn comment_regex() -> Option<&'static Regex> {
    COMMENT_REGEX
        .get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").ok())
        .as_ref()
}

fn rule_regex() -> Option<&'static Regex> {
    RULE_REGEX
        .get_or_init(|| Regex::new(r"([^{}]+)\{([^{}]*)\}").ok())
        .as_ref()
}

/// Parse `a: b; c: d` into a property map.
pub fn parse_declarations(block: &str) -> Properties {
    let mut props = Properties::new();
    for decl in block.split(';') {
        let Some((name, value)) = decl.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_uppercase();
        let value = value.trim().trim_end_matches("!important").trim();
        if !name.is_empty() && !value.is_empty() {
            props.insert(name, value.to_string());
        }
    }
    props
}

#[derive(Clone, Debug, Default)]
pub struct StyleSheet {
    rules: HashMap<String, Properties>,
}

impl StyleSheet {
    pub fn parse(css: &str) -> Self {
        let mut sheet = Self::default();
        sheet.add_css(css);
        sheet
    }

    /// Merge the rules of `css` into the sheet. Selectors other than `tag`,
    /// `.class`, `tag.class` and `#id` are ignored.
    pub fn add_css(&mut self, css: &str) {
        let css = match comment_regex() {
            Some(re) => re.replace_all(css, "").into_owned(),
            None => css.to_string(),
        };
        let Some(re) = rule_regex() else {
            return;
        };
        for cap in re.captures_iter(&css) {
            let props = parse_declarations(&cap[2]);
            for selector in cap[1].split(',') {
                let selector = selector.trim().to_ascii_lowercase();
                if selector.is_empty() || !is_simple_selector(&selector) {
                    if !selector.is_empty() {
                        log::debug!("Ignoring CSS selector {selector:?}");
                    }
                    continue;
                }
                let entry = self.rules.entry(selector).or_default();
                for (k, v) in &props {
                    entry.insert(k.clone(), v.clone());
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule(&self, selector: &str) -> Option<&Properties> {
        self.rules.get(&selector.to_ascii_lowercase())
    }

    /// Properties for an element, cascaded tag, class, tag.class, id, then
    /// the inline `style` attribute.
    pub fn resolve(&self, tag: &str, class: Option<&str>, id: Option<&str>, inline: Option<&str>) -> Properties {
        let tag = tag.to_ascii_lowercase();
        let mut props = Properties::new();
        let mut merge = |selector: &str| {
            if let Some(rule) = self.rules.get(selector) {
                for (k, v) in rule {
                    props.insert(k.clone(), v.clone());
                }
            }
        };
        merge(&tag);
        let classes: Vec<String> = class
            .map(|c| c.split_whitespace().map(str::to_ascii_lowercase).collect())
            .unwrap_or_default();
        for class in &classes {
            merge(&format!(".{class}"));
        }
        for class in &classes {
            merge(&format!("{tag}.{class}"));
        }
        if let Some(id) = id {
            merge(&format!("#{}", id.trim().to_ascii_lowercase()));
        }
        if let Some(inline) = inline {
            props.extend(parse_declarations(inline));
        }
        props
    }
}

fn is_simple_selector(selector: &str) -> bool {
    let valid = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if let Some(id) = selector.strip_prefix('#') {
        return valid(id);
    }
    match selector.split_once('.') {
        Some(("", class)) => valid(class),
        Some((tag, class)) => valid(tag) && valid(class),
        None => valid(selector),
    }
}

/// Convert a CSS length to user units. Bare numbers are pixels;
/// percentages are taken of `reference` (already in user units) and `em`
/// of `font_size_pt`.
pub fn convert_size(value: &str, k: f32, reference: f32, font_size_pt: f32) -> Option<f32> {
    let v = value.trim().to_ascii_lowercase();
    if let Some(pct) = v.strip_suffix('%') {
        return pct.trim().parse::<f32>().ok().map(|p| reference * p / 100.0);
    }
    let split = v
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(v.len());
    let (num, unit) = v.split_at(split);
    let num: f32 = num.parse().ok()?;
    let points = match unit.trim() {
        "" | "px" => num * 0.75,
        "pt" => num,
        "pc" => num * 12.0,
        "mm" => num * 72.0 / 25.4,
        "cm" => num * 72.0 / 2.54,
        "in" => num * 72.0,
        "em" => num * font_size_pt,
        _ => return None,
    };
    Some(points / k)
}

/// Font size keyword or length, in points.
pub fn font_size_pt(value: &str, current_pt: f32) -> Option<f32> {
    let v = value.trim().to_ascii_lowercase();
    let keyword = match v.as_str() {
        "xx-small" => Some(7.0),
        "x-small" => Some(7.5),
        "small" => Some(10.0),
        "medium" => Some(12.0),
        "large" => Some(13.5),
        "x-large" => Some(18.0),
        "xx-large" => Some(24.0),
        "smaller" => Some(current_pt * 0.83),
        "larger" => Some(current_pt * 1.2),
        _ => None,
    };
    keyword.or_else(|| convert_size(&v, 1.0, current_pt, current_pt))
}

/// Families the renderer can map to a core font, in lookup order.
const KNOWN_FAMILIES: &[&str] = &[
    "arial",
    "helvetica",
    "verdana",
    "sans-serif",
    "sans",
    "times new roman",
    "times",
    "serif",
    "courier new",
    "courier",
    "monospace",
    "symbol",
    "zapfdingbats",
];

/// First name in a `font-family` list that the renderer knows.
pub fn known_font_family(list: &str) -> Option<&'static str> {
    list.split(',')
        .map(|f| f.trim().trim_matches(['"', '\'']).to_ascii_lowercase())
        .find_map(|f| KNOWN_FAMILIES.iter().copied().find(|&known| known == f))
}

pub fn parse_color(value: &str) -> Option<Color> {
    let v = value.trim().to_ascii_lowercase();
    let named = |r, g, b| Some(Color { r, g, b });
    match v.as_str() {
        "black" => return named(0, 0, 0),
        "white" => return named(255, 255, 255),
        "red" => return named(255, 0, 0),
        "green" => return named(0, 128, 0),
        "lime" => return named(0, 255, 0),
        "blue" => return named(0, 0, 255),
        "navy" => return named(0, 0, 128),
        "yellow" => return named(255, 255, 0),
        "cyan" | "aqua" => return named(0, 255, 255),
        "magenta" | "fuchsia" => return named(255, 0, 255),
        "gray" | "grey" => return named(128, 128, 128),
        "silver" => return named(192, 192, 192),
        "maroon" => return named(128, 0, 0),
        "olive" => return named(128, 128, 0),
        "purple" => return named(128, 0, 128),
        "teal" => return named(0, 128, 128),
        "orange" => return named(255, 165, 0),
        _ => {}
    }
    if let Some(hex) = v.strip_prefix('#') {
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        return match hex.len() {
            3 => Some(Color {
                r: channel(&hex[0..1])? * 17,
                g: channel(&hex[1..2])? * 17,
                b: channel(&hex[2..3])? * 17,
            }),
            6 => Some(Color {
                r: channel(&hex[0..2])?,
                g: channel(&hex[2..4])?,
                b: channel(&hex[4..6])?,
            }),
            _ => None,
        };
    }
    if let Some(inner) = v.strip_prefix("rgb(").and_then(|s| s.strip_suffix(')')) {
        let parts: Vec<u8> = inner
            .split(',')
            .map(|p| p.trim().parse::<f32>().ok().map(|n| n.clamp(0.0, 255.0) as u8))
            .collect::<Option<_>>()?;
        if let [r, g, b] = parts[..] {
            return Some(Color { r, g, b });
        }
    }
    None
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BorderStyle {
    None,
    Solid,
    Dotted,
    Dashed,
}

/// `border` shorthand: style and color. Widths are accepted and ignored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BorderSpec {
    pub style: BorderStyle,
    pub color: Color,
}

pub fn parse_border(value: &str) -> BorderSpec {
    let mut spec = BorderSpec {
        style: BorderStyle::Solid,
        color: Color::BLACK,
    };
    for part in value.split_whitespace() {
        match part.to_ascii_lowercase().as_str() {
            "none" | "hidden" => spec.style = BorderStyle::None,
            "solid" | "double" | "groove" | "ridge" | "inset" | "outset" => spec.style = BorderStyle::Solid,
            "dotted" => spec.style = BorderStyle::Dotted,
            "dashed" => spec.style = BorderStyle::Dashed,
            other => {
                if let Some(color) = parse_color(other) {
                    spec.color = color;
                }
            }
        }
    }
    spec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_hex_colors_are_rejected() {
        assert_eq!(parse_color("#éa"), None);
        assert_eq!(parse_color("#aé"), None);
        assert_eq!(parse_color("#ffé0"), None);
        assert_eq!(parse_color("#+f+f+f"), None);
        assert_eq!(parse_color("#12"), None);
        assert_eq!(parse_color("#GGGGGG"), None);
        assert_eq!(parse_color("#0a0"), Some(Color { r: 0, g: 170, b: 0 }));
    }

    #[test]
    fn cascade_order() {
        let sheet = StyleSheet::parse(
            "/* base */ p { color: red; font-size: 10pt }
             .note { color: blue }
             p.note { font-weight: bold }
             #main { color: green }
             div > p { color: black }",
        );
        let props = sheet.resolve("P", Some("note"), Some("main"), Some("font-size: 14pt"));
        assert_eq!(props["COLOR"], "green");
        assert_eq!(props["FONT-WEIGHT"], "bold");
        assert_eq!(props["FONT-SIZE"], "14pt");
        assert!(sheet.rule("div > p").is_none());
    }

    #[test]
    fn last_declaration_wins() {
        let props = parse_declarations("color: red; COLOR: blue;; bogus");
        assert_eq!(props.len(), 1);
        assert_eq!(props["COLOR"], "blue");
    }

    #[test]
    fn size_units() {
        let k = 72.0 / 25.4;
        let mm = |v: &str| convert_size(v, k, 100.0, 10.0).unwrap();
        assert!((mm("10mm") - 10.0).abs() < 1e-4);
        assert!((mm("1cm") - 10.0).abs() < 1e-4);
        assert!((mm("1in") - 25.4).abs() < 1e-3);
        assert!((mm("96px") - 25.4).abs() < 1e-3);
        assert!((mm("72pt") - 25.4).abs() < 1e-3);
        assert!((mm("6pc") - 25.4).abs() < 1e-3);
        assert_eq!(mm("50%"), 50.0);
        assert!(convert_size("auto", k, 0.0, 10.0).is_none());
    }

    #[test]
    fn colors_and_families() {
        assert_eq!(parse_color("#f00"), Some(Color { r: 255, g: 0, b: 0 }));
        assert_eq!(parse_color("rgb(1, 2, 3)"), Some(Color { r: 1, g: 2, b: 3 }));
        assert_eq!(parse_color("navy"), Some(Color { r: 0, g: 0, b: 128 }));
        assert_eq!(parse_color("#12"), None);
        assert_eq!(known_font_family("'Open Sans', Verdana, serif"), Some("verdana"));
        assert_eq!(known_font_family("Comic Sans"), None);
        let border = parse_border("1px dotted #333");
        assert_eq!(border.style, BorderStyle::Dotted);
        assert_eq!(border.color, Color::gray(0x33));
    }
}
