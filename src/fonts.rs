mod standard;

use std::fmt;
use std::path::{Path, PathBuf};

use ttf_parser::Face;

use crate::error::Error;

pub use standard::core_family;

/// Bold/italic/underline bitmask. Registry keys only use bold and italic;
/// underline is drawn, not a separate face.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FontStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl FontStyle {
    pub const REGULAR: FontStyle = FontStyle {
        bold: false,
        italic: false,
        underline: false,
    };

    /// Parse an FPDF-style flag string such as `"BI"` or `"u"`.
    pub fn parse(flags: &str) -> Self {
        let upper = flags.to_ascii_uppercase();
        FontStyle {
            bold: upper.contains('B'),
            italic: upper.contains('I'),
            underline: upper.contains('U'),
        }
    }

    /// Face suffix used in registry keys: "", "B", "I" or "BI".
    pub fn face_suffix(self) -> &'static str {
        match (self.bold, self.italic) {
            (true, true) => "BI",
            (true, false) => "B",
            (false, true) => "I",
            (false, false) => "",
        }
    }

    pub fn face(self) -> FontStyle {
        FontStyle {
            underline: false,
            ..self
        }
    }
}

impl fmt::Display for FontStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.face_suffix())?;
        if self.underline {
            f.write_str("U")?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FontKind {
    /// One of the 14 standard fonts, referenced by name only.
    Core,
    Type1,
    TrueType,
}

/// Font program to embed alongside the font dictionary.
#[derive(Clone, Debug)]
pub struct FontFile {
    pub data: Vec<u8>,
    /// Data is already zlib-compressed (`/Filter /FlateDecode`).
    pub compressed: bool,
    /// `/Length1`: clear-text segment for Type1, original size for TrueType.
    pub length1: usize,
    /// `/Length2`: binary segment (Type1 only).
    pub length2: Option<usize>,
}

/// Everything the writer needs to know about one face.
#[derive(Clone, Debug)]
pub struct FontMetrics {
    pub kind: FontKind,
    /// PostScript name written as `/BaseFont`.
    pub name: String,
    /// Font descriptor entries in write order (`Ascent`, `Descent`, ...).
    pub descriptor: Vec<(String, String)>,
    /// Advance widths in 1/1000 em for each WinAnsi byte.
    pub widths: [u16; 256],
    /// `/Differences` array body for fonts with their own encoding.
    pub differences: Option<String>,
    pub underline_position: i32,
    pub underline_thickness: i32,
    pub file: Option<FontFile>,
}

impl FontMetrics {
    pub fn char_width(&self, ch: char) -> u16 {
        self.widths[self.encode_char(ch) as usize]
    }

    /// Width of `text` in points at `size_pt`.
    pub fn string_width(&self, text: &str, size_pt: f32) -> f32 {
        let units: u32 = text.chars().map(|ch| self.char_width(ch) as u32).sum();
        units as f32 * size_pt / 1000.0
    }

    /// Symbolic fonts use their own byte encoding; everything else is WinAnsi.
    pub fn is_symbolic(&self) -> bool {
        self.kind == FontKind::Core && (self.name == "Symbol" || self.name == "ZapfDingbats")
    }

    pub fn encode_char(&self, ch: char) -> u8 {
        if self.is_symbolic() || self.differences.is_some() {
            let cp = ch as u32;
            if cp < 256 { cp as u8 } else { b'?' }
        } else {
            char_to_winansi(ch)
        }
    }

    pub fn encode(&self, text: &str) -> Vec<u8> {
        text.chars().map(|ch| self.encode_char(ch)).collect()
    }

    /// Derive metrics from a TrueType/OpenType file and keep the whole file
    /// (zlib-compressed) for embedding.
    pub fn from_truetype(font_data: &[u8], face_index: u32) -> Result<Self, Error> {
        let face = Face::parse(font_data, face_index)
            .map_err(|e| Error::unsupported(format!("TrueType parse failed: {e}")))?;

        let units = face.units_per_em() as f32;
        let scale = |v: f32| (v / units * 1000.0).round();
        let ascent = scale(face.ascender() as f32);
        let descent = scale(face.descender() as f32);
        let cap_height = face
            .capital_height()
            .map(|h| scale(h as f32))
            .unwrap_or(ascent);
        let bb = face.global_bounding_box();
        let italic_angle = face.italic_angle();

        let mut widths = [0u16; 256];
        for byte in 0..=255u8 {
            widths[byte as usize] = face
                .glyph_index(winansi_to_char(byte))
                .and_then(|gid| face.glyph_hor_advance(gid))
                .map(|adv| scale(adv as f32) as u16)
                .unwrap_or(0);
        }
        let missing_width = widths[b' ' as usize];
        for w in widths.iter_mut().filter(|w| **w == 0) {
            *w = missing_width;
        }

        let mut flags = 32;
        if face.is_monospaced() {
            flags += 1;
        }
        if italic_angle != 0.0 {
            flags += 64;
        }

        let name = postscript_name(&face).unwrap_or_else(|| "TrueTypeFont".to_string());
        let (up, ut) = face
            .underline_metrics()
            .map(|m| (scale(m.position as f32) as i32, scale(m.thickness as f32) as i32))
            .unwrap_or((-100, 50));

        let descriptor = vec![
            ("Ascent".to_string(), format!("{ascent}")),
            ("Descent".to_string(), format!("{descent}")),
            ("CapHeight".to_string(), format!("{cap_height}")),
            ("Flags".to_string(), flags.to_string()),
            (
                "FontBBox".to_string(),
                format!(
                    "[{} {} {} {}]",
                    scale(bb.x_min as f32),
                    scale(bb.y_min as f32),
                    scale(bb.x_max as f32),
                    scale(bb.y_max as f32)
                ),
            ),
            ("ItalicAngle".to_string(), format!("{}", italic_angle.round())),
            ("StemV".to_string(), if face.is_bold() { "120" } else { "70" }.to_string()),
            ("MissingWidth".to_string(), missing_width.to_string()),
        ];

        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(font_data, 6);
        Ok(FontMetrics {
            kind: FontKind::TrueType,
            name,
            descriptor,
            widths,
            differences: None,
            underline_position: up,
            underline_thickness: ut,
            file: Some(FontFile {
                data: compressed,
                compressed: true,
                length1: font_data.len(),
                length2: None,
            }),
        })
    }

    /// Build Type1 metrics from an AFM file, optionally with the PFB program.
    pub fn from_afm(afm: &str, pfb: Option<&[u8]>) -> Result<Self, Error> {
        let mut name = None;
        let mut up = -100;
        let mut ut = 50;
        let mut ascent = 0.0f32;
        let mut descent = 0.0f32;
        let mut cap_height = None;
        let mut italic_angle = 0.0f32;
        let mut stem_v = 70.0f32;
        let mut bbox = [0.0f32; 4];
        let mut fixed_pitch = false;
        let mut font_specific = false;
        let mut by_code: Vec<(u8, u16, String)> = Vec::new();
        let mut by_name: Vec<(String, u16)> = Vec::new();

        for line in afm.lines() {
            let mut parts = line.split_whitespace();
            let Some(key) = parts.next() else {
                continue;
            };
            let rest: Vec<&str> = parts.collect();
            let num = |i: usize| rest.get(i).and_then(|v| v.parse::<f32>().ok());
            match key {
                "FontName" => name = rest.first().map(|s| s.to_string()),
                "UnderlinePosition" => up = num(0).unwrap_or(-100.0) as i32,
                "UnderlineThickness" => ut = num(0).unwrap_or(50.0) as i32,
                "Ascender" => ascent = num(0).unwrap_or(0.0),
                "Descender" => descent = num(0).unwrap_or(0.0),
                "CapHeight" => cap_height = num(0),
                "ItalicAngle" => italic_angle = num(0).unwrap_or(0.0),
                "StdVW" => stem_v = num(0).unwrap_or(70.0),
                "IsFixedPitch" => fixed_pitch = rest.first() == Some(&"true"),
                "EncodingScheme" => font_specific = rest.first() == Some(&"FontSpecific"),
                "FontBBox" => {
                    for (i, slot) in bbox.iter_mut().enumerate() {
                        *slot = num(i).unwrap_or(0.0);
                    }
                }
                "C" => {
                    // C 32 ; WX 278 ; N space ; B 0 0 0 0 ;
                    let code = num(0).map(|c| c as i32).unwrap_or(-1);
                    let mut wx = None;
                    let mut glyph = String::new();
                    let fields = line.split(';').map(str::trim);
                    for field in fields {
                        let mut kv = field.split_whitespace();
                        match (kv.next(), kv.next()) {
                            (Some("WX"), Some(v)) => wx = v.parse::<f32>().ok(),
                            (Some("N"), Some(v)) => glyph = v.to_string(),
                            _ => {}
                        }
                    }
                    let Some(wx) = wx else {
                        continue;
                    };
                    if (0..=255).contains(&code) {
                        by_code.push((code as u8, wx as u16, glyph.clone()));
                    }
                    if !glyph.is_empty() {
                        by_name.push((glyph, wx as u16));
                    }
                }
                _ => {}
            }
        }

        let name = name.ok_or_else(|| Error::MissingResource("AFM file has no FontName".into()))?;
        let missing_width = by_code
            .iter()
            .find(|(c, _, _)| *c == b' ')
            .map(|(_, w, _)| *w)
            .unwrap_or(250);
        let mut widths = [missing_width; 256];
        for (code, w, _) in &by_code {
            widths[*code as usize] = *w;
        }

        let differences = if font_specific {
            let body: Vec<String> = by_code
                .iter()
                .filter(|(c, _, g)| *c >= 32 && !g.is_empty())
                .map(|(c, _, g)| format!("{c} /{g}"))
                .collect();
            Some(body.join(" "))
        } else {
            // Standard-encoded AFMs list accented glyphs unencoded; place
            // them at their WinAnsi positions by name.
            for (glyph, w) in &by_name {
                if let Some(byte) = winansi_code_for_glyph(glyph) {
                    widths[byte as usize] = *w;
                }
            }
            None
        };

        let mut flags = if font_specific { 4 } else { 32 };
        if fixed_pitch {
            flags += 1;
        }
        if italic_angle != 0.0 {
            flags += 64;
        }
        let descriptor = vec![
            ("Ascent".to_string(), format!("{ascent}")),
            ("Descent".to_string(), format!("{descent}")),
            ("CapHeight".to_string(), format!("{}", cap_height.unwrap_or(ascent))),
            ("Flags".to_string(), flags.to_string()),
            (
                "FontBBox".to_string(),
                format!("[{} {} {} {}]", bbox[0], bbox[1], bbox[2], bbox[3]),
            ),
            ("ItalicAngle".to_string(), format!("{italic_angle}")),
            ("StemV".to_string(), format!("{stem_v}")),
            ("MissingWidth".to_string(), missing_width.to_string()),
        ];

        let file = pfb.map(parse_pfb).transpose()?;
        Ok(FontMetrics {
            kind: FontKind::Type1,
            name,
            descriptor,
            widths,
            differences,
            underline_position: up,
            underline_thickness: ut,
            file,
        })
    }
}

/// Split a PFB into the clear-text and binary segments, dropping the segment
/// headers and the trailing zeros segment.
fn parse_pfb(data: &[u8]) -> Result<FontFile, Error> {
    let mut pos = 0usize;
    let mut clear = Vec::new();
    let mut binary = Vec::new();
    while pos + 2 <= data.len() {
        if data[pos] != 0x80 {
            return Err(Error::unsupported("PFB segment marker missing"));
        }
        let seg_type = data[pos + 1];
        if seg_type == 3 {
            break;
        }
        if pos + 6 > data.len() {
            return Err(Error::unsupported("PFB segment header truncated"));
        }
        let len = u32::from_le_bytes([data[pos + 2], data[pos + 3], data[pos + 4], data[pos + 5]])
            as usize;
        let start = pos + 6;
        let end = start
            .checked_add(len)
            .filter(|&e| e <= data.len())
            .ok_or_else(|| Error::unsupported("PFB segment overruns file"))?;
        match seg_type {
            1 if binary.is_empty() => clear.extend_from_slice(&data[start..end]),
            1 => break,
            2 => binary.extend_from_slice(&data[start..end]),
            other => return Err(Error::unsupported(format!("PFB segment type {other}"))),
        }
        pos = end;
    }
    if clear.is_empty() || binary.is_empty() {
        return Err(Error::unsupported("PFB file has no font program"));
    }
    let length1 = clear.len();
    let length2 = binary.len();
    clear.extend_from_slice(&binary);
    Ok(FontFile {
        data: clear,
        compressed: false,
        length1,
        length2: Some(length2),
    })
}

fn postscript_name(face: &Face) -> Option<String> {
    for name in face.names() {
        if name.name_id == ttf_parser::name_id::POST_SCRIPT_NAME
            && let Some(s) = name.to_string()
        {
            return Some(s.replace(' ', ""));
        }
    }
    for name in face.names() {
        if name.name_id == ttf_parser::name_id::FAMILY
            && name.is_unicode()
            && let Some(s) = name.to_string()
        {
            return Some(s.replace(' ', ""));
        }
    }
    None
}

/// Source of per-family, per-style metrics.
pub trait MetricsProvider {
    fn load(&self, family: &str, style: FontStyle) -> Result<FontMetrics, Error>;
}

/// Built-in core font metrics, then `<family><style>.ttf` / `.afm` files
/// from the configured directories.
pub struct FontLibrary {
    dirs: Vec<PathBuf>,
}

impl FontLibrary {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    fn candidate_stems(family: &str, style: FontStyle) -> Vec<String> {
        let family = family.to_lowercase().replace(' ', "");
        let suffix = style.face_suffix().to_lowercase();
        let long = match (style.bold, style.italic) {
            (true, true) => "-BoldItalic",
            (true, false) => "-Bold",
            (false, true) => "-Italic",
            (false, false) => "-Regular",
        };
        vec![
            format!("{family}{suffix}"),
            format!("{family}{long}").to_lowercase(),
        ]
    }

    fn find_file(&self, family: &str, style: FontStyle, ext: &str) -> Option<PathBuf> {
        let stems = Self::candidate_stems(family, style);
        for dir in &self.dirs {
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let matches_ext = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(ext));
                let stem = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(|s| s.to_lowercase());
                if matches_ext && stem.is_some_and(|s| stems.contains(&s)) {
                    return Some(path);
                }
            }
        }
        None
    }
}

impl MetricsProvider for FontLibrary {
    fn load(&self, family: &str, style: FontStyle) -> Result<FontMetrics, Error> {
        if let Some(metrics) = standard::core_metrics(family, style) {
            return Ok(metrics);
        }

        let t0 = std::time::Instant::now();
        if let Some(path) = self.find_file(family, style, "ttf") {
            let data = read_font_file(&path)?;
            let metrics = FontMetrics::from_truetype(&data, 0)?;
            log::debug!(
                "Loaded TrueType metrics {family}/{} from {} in {:.1}ms",
                style.face_suffix(),
                path.display(),
                t0.elapsed().as_secs_f64() * 1000.0
            );
            return Ok(metrics);
        }
        if let Some(path) = self.find_file(family, style, "afm") {
            let afm = String::from_utf8_lossy(&read_font_file(&path)?).into_owned();
            let pfb_path = path.with_extension("pfb");
            let pfb = std::fs::read(&pfb_path).ok();
            if pfb.is_none() {
                log::warn!("No PFB next to {}: font will not be embedded", path.display());
            }
            let metrics = FontMetrics::from_afm(&afm, pfb.as_deref())?;
            log::debug!(
                "Loaded Type1 metrics {family}/{} from {} in {:.1}ms",
                style.face_suffix(),
                path.display(),
                t0.elapsed().as_secs_f64() * 1000.0
            );
            return Ok(metrics);
        }

        Err(Error::MissingResource(format!(
            "font metrics for {family} {} not found",
            if style.face_suffix().is_empty() { "regular" } else { style.face_suffix() }
        )))
    }
}

fn read_font_file(path: &Path) -> Result<Vec<u8>, Error> {
    std::fs::read(path)
        .map_err(|e| Error::MissingResource(format!("{}: {}", path.display(), e)))
}

/// Windows-1252 (WinAnsi) byte to Unicode char mapping.
/// Bytes 0x80-0x9F are remapped; all others map directly to their Unicode codepoint.
pub(crate) fn winansi_to_char(byte: u8) -> char {
    match byte {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}', // bullet
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        _ => byte as char,
    }
}

/// Map a single Unicode char to its WinAnsi byte; unmappable chars become `?`.
pub(crate) fn char_to_winansi(c: char) -> u8 {
    match c as u32 {
        0x0000..=0x007F => c as u8,
        0x00A0..=0x00FF => c as u8,
        0x20AC => 0x80,
        0x201A => 0x82,
        0x0192 => 0x83,
        0x201E => 0x84,
        0x2026 => 0x85,
        0x2020 => 0x86,
        0x2021 => 0x87,
        0x02C6 => 0x88,
        0x2030 => 0x89,
        0x0160 => 0x8A,
        0x2039 => 0x8B,
        0x0152 => 0x8C,
        0x017D => 0x8E,
        0x2018 => 0x91,
        0x2019 => 0x92,
        0x201C => 0x93,
        0x201D => 0x94,
        0x2022 => 0x95,
        0x2013 => 0x96,
        0x2014 => 0x97,
        0x02DC => 0x98,
        0x2122 => 0x99,
        0x0161 => 0x9A,
        0x203A => 0x9B,
        0x0153 => 0x9C,
        0x017E => 0x9E,
        0x0178 => 0x9F,
        _ => b'?',
    }
}

/// Glyph names of the WinAnsi upper half that standard-encoded AFMs leave unencoded.
fn winansi_code_for_glyph(glyph: &str) -> Option<u8> {
    const HIGH: [(&str, u8); 27] = [
        ("Euro", 0x80),
        ("quotesinglbase", 0x82),
        ("florin", 0x83),
        ("quotedblbase", 0x84),
        ("ellipsis", 0x85),
        ("dagger", 0x86),
        ("daggerdbl", 0x87),
        ("circumflex", 0x88),
        ("perthousand", 0x89),
        ("Scaron", 0x8A),
        ("guilsinglleft", 0x8B),
        ("OE", 0x8C),
        ("Zcaron", 0x8E),
        ("quoteleft", 0x91),
        ("quoteright", 0x92),
        ("quotedblleft", 0x93),
        ("quotedblright", 0x94),
        ("bullet", 0x95),
        ("endash", 0x96),
        ("emdash", 0x97),
        ("tilde", 0x98),
        ("trademark", 0x99),
        ("scaron", 0x9A),
        ("guilsinglright", 0x9B),
        ("oe", 0x9C),
        ("zcaron", 0x9E),
        ("Ydieresis", 0x9F),
    ];
    const LATIN1: [&str; 64] = [
        "Agrave", "Aacute", "Acircumflex", "Atilde", "Adieresis", "Aring", "AE", "Ccedilla",
        "Egrave", "Eacute", "Ecircumflex", "Edieresis", "Igrave", "Iacute", "Icircumflex",
        "Idieresis", "Eth", "Ntilde", "Ograve", "Oacute", "Ocircumflex", "Otilde", "Odieresis",
        "multiply", "Oslash", "Ugrave", "Uacute", "Ucircumflex", "Udieresis", "Yacute", "Thorn",
        "germandbls", "agrave", "aacute", "acircumflex", "atilde", "adieresis", "aring", "ae",
        "ccedilla", "egrave", "eacute", "ecircumflex", "edieresis", "igrave", "iacute",
        "icircumflex", "idieresis", "eth", "ntilde", "ograve", "oacute", "ocircumflex", "otilde",
        "odieresis", "divide", "oslash", "ugrave", "uacute", "ucircumflex", "udieresis", "yacute",
        "thorn", "ydieresis",
    ];
    if let Some(&(_, code)) = HIGH.iter().find(|(n, _)| *n == glyph) {
        return Some(code);
    }
    LATIN1
        .iter()
        .position(|n| *n == glyph)
        .map(|i| 0xC0 + i as u8)
}

/// Convert a UTF-8 string to WinAnsi (Windows-1252) bytes.
pub(crate) fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars().map(char_to_winansi).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_flags_round_trip_through_display() {
        let style = FontStyle::parse("ub");
        assert!(style.bold && style.underline && !style.italic);
        assert_eq!(style.to_string(), "BU");
        assert_eq!(style.face().face_suffix(), "B");
    }

    #[test]
    fn winansi_maps_typographic_quotes_and_rejects_cjk() {
        assert_eq!(to_winansi_bytes("\u{201C}a\u{201D}"), vec![0x93, b'a', 0x94]);
        assert_eq!(char_to_winansi('\u{4E2D}'), b'?');
        assert_eq!(winansi_to_char(0x80), '\u{20AC}');
    }

    #[test]
    fn afm_widths_land_on_winansi_positions() {
        let afm = "StartFontMetrics 4.1\n\
                   FontName Demo-Roman\n\
                   UnderlinePosition -90\n\
                   UnderlineThickness 40\n\
                   Ascender 700\nDescender -200\n\
                   FontBBox -10 -200 1000 900\n\
                   C 32 ; WX 250 ; N space ; B 0 0 0 0 ;\n\
                   C 65 ; WX 700 ; N A ; B 0 0 0 0 ;\n\
                   C -1 ; WX 710 ; N Eacute ; B 0 0 0 0 ;\n\
                   C -1 ; WX 1000 ; N emdash ; B 0 0 0 0 ;\n";
        let m = FontMetrics::from_afm(afm, None).unwrap();
        assert_eq!(m.name, "Demo-Roman");
        assert_eq!(m.kind, FontKind::Type1);
        assert_eq!(m.widths[b'A' as usize], 700);
        assert_eq!(m.widths[0xC9], 710);
        assert_eq!(m.widths[0x97], 1000);
        assert_eq!(m.widths[b'z' as usize], 250);
        assert_eq!(m.underline_position, -90);
        assert!(m.file.is_none());
    }

    #[test]
    fn pfb_segments_are_unwrapped() {
        let mut pfb = vec![0x80, 1, 3, 0, 0, 0];
        pfb.extend_from_slice(b"abc");
        pfb.extend_from_slice(&[0x80, 2, 2, 0, 0, 0, 0xde, 0xad]);
        pfb.extend_from_slice(&[0x80, 1, 1, 0, 0, 0, b'0', 0x80, 3]);
        let file = parse_pfb(&pfb).unwrap();
        assert_eq!(file.data, b"abc\xde\xad");
        assert_eq!(file.length1, 3);
        assert_eq!(file.length2, Some(2));
    }

    #[test]
    fn unknown_family_is_missing_resource() {
        let lib = FontLibrary::new(Vec::new());
        let err = lib.load("nosuchfamily", FontStyle::REGULAR).unwrap_err();
        assert!(matches!(err, Error::MissingResource(_)));
    }
}
