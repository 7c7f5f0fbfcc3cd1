mod common;

use common::*;
use htmlide_pdf::pdf::{CgiResponse, ResponseSink};
use htmlide_pdf::{Config, Error};

/// Records headers and body separately.
#[derive(Default)]
struct RecordingSink {
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ResponseSink for RecordingSink {
    fn headers_sent(&self) -> bool {
        !self.body.is_empty()
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        self.headers.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn write_body(&mut self, body: &[u8]) -> Result<(), Error> {
        self.body.extend_from_slice(body);
        Ok(())
    }
}

impl RecordingSink {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }
}

#[test]
fn save_writes_the_same_bytes() {
    let dir = scratch_dir("save");
    let path = dir.join("out.pdf");
    let mut doc = render_document("<p>saved</p>");
    doc.save(&path).unwrap();
    let on_disk = std::fs::read(&path).unwrap();
    assert_eq!(on_disk, doc.output_bytes().unwrap());
}

#[test]
fn download_headers_describe_the_body() {
    let mut doc = render_document("<p>download</p>");
    let mut sink = RecordingSink::default();
    doc.send_download("report.pdf", &mut sink).unwrap();

    assert_eq!(sink.header("Content-Type"), Some("application/x-download"));
    assert_eq!(
        sink.header("Content-Disposition"),
        Some("attachment; filename=\"report.pdf\"")
    );
    let length: usize = sink.header("Content-Length").unwrap().parse().unwrap();
    assert_eq!(length, sink.body.len());
    assert!(sink.body.starts_with(b"%PDF-"));
}

#[test]
fn empty_name_falls_back_to_default() {
    let mut doc = render_document("<p>x</p>");
    let mut sink = RecordingSink::default();
    doc.send_inline("", &mut sink).unwrap();
    assert_eq!(sink.header("Content-Disposition"), Some("inline; filename=\"doc.pdf\""));
}

#[test]
fn sending_after_output_started_is_rejected() {
    let mut doc = render_document("<p>late</p>");
    let mut sink = CgiResponse::new(Vec::new());
    sink.write_body(b"<html>oops</html>").unwrap();
    assert!(matches!(doc.send_inline("late.pdf", &mut sink), Err(Error::Structural(_))));
    assert_eq!(sink.into_inner(), b"\r\n<html>oops</html>");
}

#[test]
fn convert_resolves_images_next_to_the_input() {
    let dir = scratch_dir("convert");
    std::fs::write(dir.join("pic.png"), png_fixture(3, 3)).unwrap();
    std::fs::write(dir.join("page.html"), r#"<p>with picture</p><img src="pic.png">"#).unwrap();
    let output = dir.join("page.pdf");

    init_logging();
    htmlide_pdf::convert_html_to_pdf(&dir.join("page.html"), &output, &Config::default()).unwrap();
    let pdf = std::fs::read(&output).unwrap();
    assert!(pdf.starts_with(b"%PDF-1.3"));
    assert_eq!(count(&pdf, "/Width 3"), 1);
}

#[test]
fn convert_reports_missing_input() {
    let dir = scratch_dir("missing-input");
    let result = htmlide_pdf::convert_html_to_pdf(&dir.join("absent.html"), &dir.join("absent.pdf"), &config());
    assert!(matches!(result, Err(Error::Io(_))));
}
