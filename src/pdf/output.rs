use std::io::Write;
use std::path::Path;

use crate::error::Error;

use super::{Document, State};

/// Destination for an HTTP-style response: headers first, then the body.
pub trait ResponseSink {
    fn headers_sent(&self) -> bool;
    fn set_header(&mut self, name: &str, value: &str) -> Result<(), Error>;
    fn write_body(&mut self, body: &[u8]) -> Result<(), Error>;
}

/// CGI response on any writer: header lines, a blank line, then the body.
pub struct CgiResponse<W: Write> {
    out: W,
    headers: Vec<(String, String)>,
    sent: bool,
}

impl<W: Write> CgiResponse<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            headers: Vec::new(),
            sent: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ResponseSink for CgiResponse<W> {
    fn headers_sent(&self) -> bool {
        self.sent
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        if self.sent {
            return Err(Error::structural(format!("header {name} set after the body started")));
        }
        self.headers.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn write_body(&mut self, body: &[u8]) -> Result<(), Error> {
        if !self.sent {
            for (name, value) in &self.headers {
                write!(self.out, "{name}: {value}\r\n")?;
            }
            self.out.write_all(b"\r\n")?;
            self.sent = true;
        }
        self.out.write_all(body)?;
        self.out.flush()?;
        Ok(())
    }
}

impl Document {
    /// Finalize (if needed) and return the document bytes.
    pub fn output_bytes(&mut self) -> Result<&[u8], Error> {
        if self.state != State::Finalized {
            self.close()?;
        }
        Ok(&self.buffer)
    }

    pub fn save(&mut self, path: &Path) -> Result<(), Error> {
        let bytes = self.output_bytes()?;
        std::fs::write(path, bytes)?;
        log::info!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    /// Send the document for display in the client.
    pub fn send_inline(&mut self, name: &str, sink: &mut dyn ResponseSink) -> Result<(), Error> {
        self.send(name, "inline", "application/pdf", sink)
    }

    /// Send the document as a download attachment.
    pub fn send_download(&mut self, name: &str, sink: &mut dyn ResponseSink) -> Result<(), Error> {
        self.send(name, "attachment", "application/x-download", sink)
    }

    fn send(
        &mut self,
        name: &str,
        disposition: &str,
        content_type: &str,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), Error> {
        if sink.headers_sent() {
            return Err(Error::structural("some data has already been output, can't send PDF file"));
        }
        let name = if name.is_empty() { "doc.pdf" } else { name };
        let bytes = self.output_bytes()?;
        sink.set_header("Content-Type", content_type)?;
        sink.set_header("Content-Length", &bytes.len().to_string())?;
        sink.set_header("Content-Disposition", &format!("{disposition}; filename=\"{name}\""))?;
        sink.write_body(bytes)
    }
}
