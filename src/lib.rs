pub mod config;
mod error;
pub mod fonts;
pub mod html;
pub mod pdf;
pub mod resource;

pub use config::Config;
pub use error::Error;
pub use html::HtmlRenderer;
pub use pdf::Document;

use std::path::Path;
use std::time::Instant;

/// Render an HTML string to PDF bytes.
pub fn render_html(html: &str, config: &Config) -> Result<Vec<u8>, Error> {
    let mut renderer = HtmlRenderer::new(config)?;
    renderer.write_html(html)?;
    let mut doc = renderer.finish()?;
    Ok(doc.output_bytes()?.to_vec())
}

pub fn convert_html_to_pdf(input: &Path, output: &Path, config: &Config) -> Result<(), Error> {
    let t0 = Instant::now();

    let html = std::fs::read_to_string(input).map_err(Error::Io)?;
    let mut config = config.clone();
    if config.base_path.is_empty() {
        if let Some(dir) = input.parent().and_then(|p| p.to_str()).filter(|d| !d.is_empty()) {
            config.base_path = format!("{dir}/");
        }
    }
    let t_parse = t0.elapsed();

    let mut renderer = HtmlRenderer::new(&config)?;
    renderer.write_html(&html)?;
    let mut doc = renderer.finish()?;
    let bytes = doc.output_bytes()?.to_vec();
    let t_render = t0.elapsed();

    std::fs::write(output, &bytes).map_err(Error::Io)?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: parse={:.1}ms, render={:.1}ms, write={:.1}ms, total={:.1}ms (output {} bytes, {} pages)",
        t_parse.as_secs_f64() * 1000.0,
        (t_render - t_parse).as_secs_f64() * 1000.0,
        (t_total - t_render).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        bytes.len(),
        doc.page_no(),
    );

    Ok(())
}
