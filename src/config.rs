use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn parse(val: &str) -> Option<Self> {
        match val.to_ascii_lowercase().as_str() {
            "p" | "portrait" => Some(Orientation::Portrait),
            "l" | "landscape" => Some(Orientation::Landscape),
            _ => None,
        }
    }
}

/// User unit; every coordinate passed to the drawing API is expressed in it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unit {
    Pt,
    Mm,
    Cm,
    In,
}

impl Unit {
    /// Points per user unit.
    pub fn scale(self) -> f32 {
        match self {
            Unit::Pt => 1.0,
            Unit::Mm => 72.0 / 25.4,
            Unit::Cm => 72.0 / 2.54,
            Unit::In => 72.0,
        }
    }

    pub fn parse(val: &str) -> Option<Self> {
        match val.to_ascii_lowercase().as_str() {
            "pt" => Some(Unit::Pt),
            "mm" => Some(Unit::Mm),
            "cm" => Some(Unit::Cm),
            "in" => Some(Unit::In),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PageFormat {
    A3,
    A4,
    A5,
    Letter,
    Legal,
    /// Portrait width and height in points.
    Custom { width: f32, height: f32 },
}

impl PageFormat {
    /// Portrait (width, height) in points.
    pub fn size_pt(self) -> (f32, f32) {
        match self {
            PageFormat::A3 => (841.89, 1190.55),
            PageFormat::A4 => (595.28, 841.89),
            PageFormat::A5 => (420.94, 595.28),
            PageFormat::Letter => (612.0, 792.0),
            PageFormat::Legal => (612.0, 1008.0),
            PageFormat::Custom { width, height } => (width, height),
        }
    }

    pub fn parse(val: &str) -> Option<Self> {
        match val.to_ascii_lowercase().as_str() {
            "a3" => Some(PageFormat::A3),
            "a4" => Some(PageFormat::A4),
            "a5" => Some(PageFormat::A5),
            "letter" => Some(PageFormat::Letter),
            "legal" => Some(PageFormat::Legal),
            _ => None,
        }
    }
}

/// Page margins in points.
#[derive(Clone, Copy, Debug)]
pub struct Margins {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Default for Margins {
    fn default() -> Self {
        // 1cm all around, 2cm at the bottom for the page-break trigger
        Self {
            left: 28.35,
            top: 28.35,
            right: 28.35,
            bottom: 56.7,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub format: PageFormat,
    pub orientation: Orientation,
    pub unit: Unit,
    pub margins: Margins,
    pub font_family: String,
    pub font_size: f32, // points
    pub compress: bool,
    /// Directory or URL prefix that relative `src`/`href` values resolve against.
    pub base_path: String,
    pub font_dirs: Vec<PathBuf>,
    pub bookmark_headings: bool,
    pub repeat_table_header: bool,
    pub page_numbers: bool,
    /// Placeholder replaced by the total page count when the document closes.
    pub alias_nb_pages: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            format: PageFormat::A4,
            orientation: Orientation::Portrait,
            unit: Unit::Mm,
            margins: Margins::default(),
            font_family: "arial".to_string(),
            font_size: 11.0,
            compress: true,
            base_path: String::new(),
            font_dirs: Vec::new(),
            bookmark_headings: true,
            repeat_table_header: true,
            page_numbers: false,
            alias_nb_pages: "{nb}".to_string(),
            title: None,
            author: None,
            subject: None,
            keywords: None,
            creator: None,
        }
    }
}

impl Config {
    /// Defaults overridden by `HTMLIDE_FONTS` (font directory list),
    /// `HTMLIDE_BASE_PATH` and `HTMLIDE_NO_COMPRESS`.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(val) = std::env::var("HTMLIDE_FONTS") {
            let sep = if cfg!(windows) { ';' } else { ':' };
            for part in val.split(sep) {
                let trimmed = part.trim();
                if !trimmed.is_empty() {
                    config.font_dirs.push(PathBuf::from(trimmed));
                }
            }
        }
        if let Ok(val) = std::env::var("HTMLIDE_BASE_PATH") {
            config.base_path = val;
        }
        if std::env::var("HTMLIDE_NO_COMPRESS").is_ok() {
            config.compress = false;
        }

        log::debug!(
            "Config from env: {} font dirs, base_path={:?}, compress={}",
            config.font_dirs.len(),
            config.base_path,
            config.compress
        );
        config
    }

    /// Page size in points after applying the orientation.
    pub fn page_size_pt(&self) -> (f32, f32) {
        let (w, h) = self.format.size_pt();
        match self.orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }
}
