//! htmlide-pdf - Render an HTML file to PDF

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use htmlide_pdf::config::{Orientation, PageFormat, Unit};
use htmlide_pdf::pdf::CgiResponse;
use htmlide_pdf::{Config, Error, HtmlRenderer};

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum Format {
    A3,
    #[default]
    A4,
    A5,
    Letter,
    Legal,
}

impl From<Format> for PageFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::A3 => PageFormat::A3,
            Format::A4 => PageFormat::A4,
            Format::A5 => PageFormat::A5,
            Format::Letter => PageFormat::Letter,
            Format::Legal => PageFormat::Legal,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum UnitArg {
    Pt,
    #[default]
    Mm,
    Cm,
    In,
}

impl From<UnitArg> for Unit {
    fn from(u: UnitArg) -> Self {
        match u {
            UnitArg::Pt => Unit::Pt,
            UnitArg::Mm => Unit::Mm,
            UnitArg::Cm => Unit::Cm,
            UnitArg::In => Unit::In,
        }
    }
}

/// Render an HTML file with inline and linked CSS to PDF.
#[derive(Parser, Debug)]
#[command(name = "htmlide-pdf")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// HTML file to render
    input: PathBuf,

    /// Output path (defaults to the input with a .pdf extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Page format
    #[arg(long, value_enum, default_value_t = Format::A4)]
    format: Format,

    /// Landscape pages
    #[arg(long)]
    landscape: bool,

    /// User unit for page geometry
    #[arg(long, value_enum, default_value_t = UnitArg::Mm)]
    unit: UnitArg,

    /// Directory or URL prefix that relative src/href values resolve against
    #[arg(long)]
    base_path: Option<String>,

    /// Directory searched for TrueType or AFM/PFB font files (repeatable)
    #[arg(long = "font-dir")]
    font_dirs: Vec<PathBuf>,

    /// Write page streams uncompressed
    #[arg(long)]
    no_compress: bool,

    /// Document title (overrides <title>)
    #[arg(long)]
    title: Option<String>,

    /// Print "page/total" in the footer of every page
    #[arg(long)]
    page_numbers: bool,

    /// Write the PDF to stdout with HTTP headers for inline display
    #[arg(long)]
    cgi: bool,
}

fn run(args: Args) -> Result<(), Error> {
    let mut config = Config::from_env();
    config.format = args.format.into();
    config.unit = args.unit.into();
    if args.landscape {
        config.orientation = Orientation::Landscape;
    }
    if let Some(base) = args.base_path {
        config.base_path = base;
    }
    config.font_dirs.extend(args.font_dirs);
    if args.no_compress {
        config.compress = false;
    }
    if args.title.is_some() {
        config.title = args.title;
    }
    config.page_numbers |= args.page_numbers;

    if !args.cgi {
        let output = args
            .output
            .unwrap_or_else(|| args.input.with_extension("pdf"));
        return htmlide_pdf::convert_html_to_pdf(&args.input, &output, &config);
    }

    if config.base_path.is_empty() {
        if let Some(dir) = args.input.parent().and_then(|p| p.to_str()).filter(|d| !d.is_empty()) {
            config.base_path = format!("{dir}/");
        }
    }
    let html = std::fs::read_to_string(&args.input)?;
    let mut renderer = HtmlRenderer::new(&config)?;
    renderer.write_html(&html)?;
    let mut doc = renderer.finish()?;
    let name = args
        .input
        .with_extension("pdf")
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("doc.pdf")
        .to_string();
    let mut response = CgiResponse::new(io::stdout().lock());
    doc.send_inline(&name, &mut response)
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("htmlide-pdf: {e}");
            ExitCode::FAILURE
        }
    }
}
